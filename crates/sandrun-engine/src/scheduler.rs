//! Bounded-concurrency invocation scheduler.
//!
//! W independent worker loops, each repeating fetch → invoke → submit until
//! cancellation. Workers share the API client and the handler, nothing else;
//! a work item is owned by exactly one worker from fetch to outcome.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt as _;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{Instrument as _, debug, error, info_span, warn};

use sandrun_core::error::{ERROR_TYPE_HANDLER, ErrorReport};
use sandrun_core::handler::{Handler, Invocation};

use crate::client::RuntimeApi;

/// Pause after a failed fetch so a broken control plane is not hammered in a
/// tight loop.
const FETCH_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Handle to a set of running worker loops.
pub struct WorkerPool {
    shutdown_tx: watch::Sender<bool>,
    joins: JoinSet<()>,
}

impl WorkerPool {
    /// Spawn `count` independent worker loops sharing `api` and `handler`.
    pub fn spawn(count: usize, api: Arc<dyn RuntimeApi>, handler: Arc<dyn Handler>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut joins = JoinSet::new();
        for worker_idx in 0..count {
            let api = Arc::clone(&api);
            let handler = Arc::clone(&handler);
            let shutdown_rx = shutdown_rx.clone();
            joins.spawn(worker_loop(worker_idx, api, handler, shutdown_rx));
        }

        Self { shutdown_tx, joins }
    }

    /// Ask every worker to stop before its next fetch. In-flight work,
    /// including a long-poll already on the wire, is left to finish and
    /// submit its outcome.
    pub fn request_stop(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Wait for all workers to drain.
    pub async fn join(mut self) {
        while let Some(res) = self.joins.join_next().await {
            if let Err(err) = res {
                error!("worker task join error: {err:#}");
            }
        }
    }
}

async fn worker_loop(
    worker_idx: usize,
    api: Arc<dyn RuntimeApi>,
    handler: Arc<dyn Handler>,
    shutdown_rx: watch::Receiver<bool>,
) {
    debug!(worker_idx, "worker started");

    // The shutdown flag is consulted only between iterations: an issued
    // long-poll must complete so its item is never dropped on the floor.
    while !*shutdown_rx.borrow() {
        let invocation = match api.next_invocation().await {
            Ok(invocation) => invocation,
            Err(err) => {
                warn!(worker_idx, "fetch failed: {err:#}");
                tokio::time::sleep(FETCH_RETRY_DELAY).await;
                continue;
            }
        };

        process_one(worker_idx, api.as_ref(), handler.as_ref(), invocation).await;
    }

    debug!(worker_idx, "worker stopped");
}

/// Run one invocation through the handler boundary and submit exactly one
/// outcome for it.
async fn process_one(
    worker_idx: usize,
    api: &dyn RuntimeApi,
    handler: &dyn Handler,
    invocation: Invocation,
) {
    let Invocation { payload, context } = invocation;
    let request_id = context.request_id.clone();
    let span = info_span!("invocation", worker_idx, %request_id);

    async {
        debug!("invocation started");

        // Nothing the handler does may escape this boundary: errors and
        // panics both become failure outcomes and the loop keeps going.
        let outcome = AssertUnwindSafe(handler.invoke(payload, context)).catch_unwind().await;

        let submitted = match outcome {
            Ok(Ok(output)) => api.post_response(&request_id, output).await,
            Ok(Err(err)) => {
                warn!("handler failed: {err:#}");
                let report = ErrorReport::new(ERROR_TYPE_HANDLER, &err);
                api.post_invocation_error(&request_id, &report).await
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!("handler panicked: {message}");
                api.post_invocation_error(&request_id, &ErrorReport::panic(message)).await
            }
        };

        // A failed submit abandons this item only; the worker moves on.
        if let Err(err) = submitted {
            error!("outcome submission failed: {err:#}");
        }
    }
    .instrument(span)
    .await
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}
