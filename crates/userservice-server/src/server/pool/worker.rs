use crate::server::{
    streaming::{
        processor::handle_call,
        request::{Call, WorkRequest},
    },
    telemetry::increment_call_errors,
};
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use userservice_core::Error;

/// Worker task responsible for processing [`WorkRequest`] messages.
///
/// All workers share one queue receiver; a worker holds the lock only while
/// waiting for its next request, then runs that request to completion. The
/// loop ends when a shutdown request is received or the queue closes.
///
/// # Arguments
///
/// - `worker_id`: Numeric identifier for this worker (used for logs).
/// - `queue`: Shared receiving end of the pool's work queue.
/// - `shutdown_token`: Cancelled once the pool gives up waiting for in-flight
///   calls to drain.
///
/// # Request Types
///
/// - [`WorkRequest::Call`]: Runs the call via [`handle_call`], unless
///   shutdown cancels it first.
/// - [`WorkRequest::Shutdown`]: Acknowledges and stops the worker.
pub async fn worker_loop(
    worker_id: usize,
    queue: Arc<Mutex<mpsc::Receiver<WorkRequest>>>,
    shutdown_token: CancellationToken,
) {
    tracing::trace!("Worker {worker_id} started");

    loop {
        let Some(work) = queue.lock().await.recv().await else {
            break;
        };

        match work {
            WorkRequest::Call { call, guard } => {
                run_call(worker_id, call, &shutdown_token).await;
                drop(guard);
            }
            WorkRequest::Shutdown { response } => {
                tracing::debug!("Worker {worker_id} received shutdown signal");

                if response.send(()).is_err() {
                    tracing::error!("Worker {worker_id} failed to acknowledge shutdown");
                }
                break;
            }
        }
    }

    tracing::trace!("Worker {worker_id} stopped");
}

async fn run_call(worker_id: usize, call: Call, shutdown_token: &CancellationToken) {
    let rpc = call.name();

    if shutdown_token.is_cancelled() {
        tracing::debug!("Worker {worker_id} dropping queued {rpc} after shutdown");
        increment_call_errors(rpc);
        call.abort(Error::ServiceShutdown);
        return;
    }

    let fail_stream = call.reserve_failer().await;
    tokio::select! {
        biased;
        () = shutdown_token.cancelled() => {
            tracing::debug!("Worker {worker_id} cancelled in-flight {rpc}");
            increment_call_errors(rpc);
            if let Some(fail) = fail_stream {
                fail(Error::ServiceShutdown.into());
            }
        }
        () = handle_call(worker_id, call) => {}
    }
}
