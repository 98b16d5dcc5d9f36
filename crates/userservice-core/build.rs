/// Builds the gRPC client and server code for `users.proto` using
/// `tonic-prost-build`.
///
/// Alongside the message types and service bindings, a file descriptor set is
/// written to `OUT_DIR/users_descriptor.bin` so the server can expose the
/// schema through gRPC reflection.
///
/// # Files and Paths
///
/// - Proto file: `proto/users.proto`
/// - Includes: `proto/`
///
/// # Panics
///
/// This function will `panic!` if code generation fails.
///
/// # Output
///
/// Generated code is included in Rust via:
///
/// ```rust
/// pub mod proto {
///     tonic::include_proto!("users");
/// }
/// ```
use std::env;
use std::path::PathBuf;

fn main() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    let descriptor_path = out_dir.join("users_descriptor.bin");

    println!("cargo:rerun-if-changed=proto/users.proto");

    tonic_prost_build::configure()
        .file_descriptor_set_path(&descriptor_path)
        .compile_protos(&["proto/users.proto"], &["proto"])
        .unwrap();
}
