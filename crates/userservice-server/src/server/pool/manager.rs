//! Bounded worker pool for RPC execution.
//!
//! This module defines the [`WorkerPool`] struct, which owns a fixed number of
//! asynchronous worker tasks that execute dispatched calls. All workers pull
//! from one shared bounded queue, so a call is picked up by whichever worker
//! frees up first. When the queue is full, dispatch waits for a slot rather
//! than rejecting the call.
//!
//! Shutdown is coordinated through a shared [`CancellationToken`] and an
//! in-flight counter maintained by [`InflightGuard`].

use super::worker::worker_loop;
use crate::server::{
    config::ServerConfig,
    streaming::request::{Call, WorkRequest},
    telemetry::{decrement_calls_inflight, increment_calls_inflight, record_call_duration},
};
use core::time::Duration;
use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Instant,
};
use tokio::{
    sync::{Mutex, mpsc, oneshot},
    time::{sleep, timeout},
};
use tokio_util::sync::CancellationToken;
use userservice_core::Error;

/// Per-worker deadline for acknowledging a shutdown request.
const WORKER_ACK_TIMEOUT: Duration = Duration::from_secs(3);

/// Counts a call as in flight from dispatch until it is dropped by a worker.
///
/// Also records the end-to-end call duration when released.
pub struct InflightGuard {
    rpc: &'static str,
    inflight: Arc<AtomicUsize>,
    start: Instant,
}

impl InflightGuard {
    fn new(rpc: &'static str, inflight: &Arc<AtomicUsize>) -> Self {
        inflight.fetch_add(1, Ordering::AcqRel);
        increment_calls_inflight();
        Self {
            rpc,
            inflight: Arc::clone(inflight),
            start: Instant::now(),
        }
    }
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        self.inflight.fetch_sub(1, Ordering::AcqRel);
        decrement_calls_inflight();
        record_call_duration(self.rpc, self.start.elapsed().as_secs_f64() * 1000.0);
    }
}

/// A fixed-size pool of asynchronous workers that execute [`Call`]s.
pub struct WorkerPool {
    queue: mpsc::Sender<WorkRequest>,
    num_workers: usize,
    inflight: Arc<AtomicUsize>,
    draining: AtomicBool,
    shutdown_token: CancellationToken,
    shutdown_timeout: Duration,
}

impl WorkerPool {
    /// Spawns `config.num_workers` workers sharing one queue of
    /// `config.queue_depth` slots.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(config: &ServerConfig) -> Self {
        let (queue, rx) = mpsc::channel(config.queue_depth);
        let rx = Arc::new(Mutex::new(rx));
        let shutdown_token = CancellationToken::new();

        for worker_id in 0..config.num_workers {
            tokio::spawn(worker_loop(
                worker_id,
                Arc::clone(&rx),
                shutdown_token.clone(),
            ));
        }

        Self {
            queue,
            num_workers: config.num_workers,
            inflight: Arc::new(AtomicUsize::new(0)),
            draining: AtomicBool::new(false),
            shutdown_token,
            shutdown_timeout: config.shutdown_timeout,
        }
    }

    /// Number of calls dispatched and not yet finished, queued ones included.
    pub fn inflight(&self) -> usize {
        self.inflight.load(Ordering::Acquire)
    }

    /// Queues a [`Call`] for the next free worker.
    ///
    /// Waits for a queue slot when the pool is saturated.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The service is shutting down.
    /// - The queue is closed.
    pub async fn dispatch(&self, call: Call) -> Result<(), Error> {
        if self.draining.load(Ordering::Acquire) || self.shutdown_token.is_cancelled() {
            return Err(Error::ServiceShutdown);
        }

        let guard = InflightGuard::new(call.name(), &self.inflight);
        self.queue
            .send(WorkRequest::Call { call, guard })
            .await
            .map_err(|_| Error::ChannelError {
                context: "Worker queue closed".to_string(),
            })
    }

    /// Gracefully shuts down all workers in the pool.
    ///
    /// - Stops admitting new calls.
    /// - Waits up to the configured shutdown timeout for in-flight calls.
    /// - Cancels the shared [`CancellationToken`] so remaining calls abort.
    /// - Sends one [`WorkRequest::Shutdown`] per worker and waits (up to 3
    ///   seconds each) for acknowledgements.
    pub async fn shutdown(&self) -> Result<(), Error> {
        // === Phase 0: Stop accepting new calls ===
        tracing::info!("Refusing new calls");
        self.draining.store(true, Ordering::Release);

        // === Phase 1: Wait for in-flight calls to drain ===
        tracing::info!("Draining in-flight calls ({} active)", self.inflight());
        let drain_result = timeout(self.shutdown_timeout, async {
            while self.inflight() > 0 {
                sleep(Duration::from_millis(50)).await;
            }
        })
        .await;

        match drain_result {
            Ok(()) => tracing::debug!("All in-flight calls drained"),
            Err(_) => tracing::warn!(
                "Graceful drain timed out ({} calls still active)",
                self.inflight()
            ),
        }

        // === Phase 2: Cancel any remaining work ===
        tracing::debug!("Cancelling remaining work via shutdown token");
        self.shutdown_token.cancel();

        // === Phase 3: Notify workers to shut down ===
        // Each worker consumes exactly one shutdown request and then stops
        // reading from the queue, so one request per worker stops them all.
        tracing::debug!("Notifying all workers to shut down");
        let mut shutdown_handles = Vec::with_capacity(self.num_workers);

        for i in 0..self.num_workers {
            let (tx, rx) = oneshot::channel();
            if let Err(e) = self.queue.send(WorkRequest::Shutdown { response: tx }).await {
                tracing::error!("Failed to send shutdown request {i}: {e}");
            } else {
                shutdown_handles.push((i, rx));
            }
        }

        let timeout_futures = shutdown_handles.into_iter().map(|(i, rx)| async move {
            match timeout(WORKER_ACK_TIMEOUT, rx).await {
                Ok(Ok(())) => tracing::trace!("Shutdown request {i} acknowledged"),
                Ok(Err(e)) => tracing::error!("Shutdown request {i} dropped: {e}"),
                Err(_) => tracing::warn!("Shutdown request {i} timed out"),
            }
        });

        futures::future::join_all(timeout_futures).await;

        tracing::info!("Worker pool shutdown complete");
        Ok(())
    }
}
