//! Bootstrap orchestration: optional user initialization, the optional
//! snapshot/restore handshake, then steady-state invocation processing.
//!
//! Failures before steady state are fatal: they are reported to the control
//! plane on the channel matching the phase, and the resulting error must
//! propagate out of `main` so the process exits non-zero.

use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::watch;
use tracing::{debug, error, info};

use sandrun_core::config::ProcessConfig;
use sandrun_core::error::{
    ERROR_TYPE_AFTER_RESTORE, ERROR_TYPE_BEFORE_CHECKPOINT, ERROR_TYPE_INIT, ERROR_TYPE_RESTORE,
    ErrorReport, RuntimeError,
};
use sandrun_core::handler::Handler;

use crate::client::RuntimeApi;
use crate::hooks::HooksRegistry;
use crate::scheduler::WorkerPool;

/// Lifecycle phase of the runtime process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Built but not started.
    Idle,
    /// Running the user initializer.
    Initializing,
    /// Parked on the restore gate (snapshot mode only).
    AwaitingRestore,
    /// Steady-state invocation processing.
    Running,
    /// Drained and finished.
    Stopped,
}

/// The one-shot user initializer, run before any work is fetched.
///
/// `Ok(true)` proceeds to steady state, `Ok(false)` declines and stops the
/// process silently, `Err` is fatal and reported on the init channel.
pub type Initializer = Box<dyn FnOnce() -> BoxFuture<'static, anyhow::Result<bool>> + Send>;

/// Sequences the process lifecycle around the worker pool.
pub struct Bootstrap {
    config: ProcessConfig,
    api: Arc<dyn RuntimeApi>,
    handler: Arc<dyn Handler>,
    hooks: HooksRegistry,
    initializer: Option<Initializer>,
    shutdown_rx: watch::Receiver<bool>,
    phase_tx: watch::Sender<Phase>,
}

impl Bootstrap {
    /// Assemble a bootstrap. `shutdown_rx` is the external cancellation
    /// signal observed during steady state.
    pub fn new(
        config: ProcessConfig,
        api: Arc<dyn RuntimeApi>,
        handler: Arc<dyn Handler>,
        hooks: HooksRegistry,
        initializer: Option<Initializer>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        let (phase_tx, _) = watch::channel(Phase::Idle);
        Self {
            config,
            api,
            handler,
            hooks,
            initializer,
            shutdown_rx,
            phase_tx,
        }
    }

    /// Subscribe to lifecycle phase transitions.
    pub fn phases(&self) -> watch::Receiver<Phase> {
        self.phase_tx.subscribe()
    }

    /// Drive the lifecycle to completion.
    pub async fn run(mut self) -> Result<(), RuntimeError> {
        self.enter(Phase::Initializing);
        if let Some(initializer) = self.initializer.take() {
            match initializer().await {
                Ok(true) => {}
                Ok(false) => {
                    // Deliberate non-fatal stop; nothing is reported.
                    info!("initializer declined; stopping");
                    self.enter(Phase::Stopped);
                    return Ok(());
                }
                Err(err) => {
                    let report = ErrorReport::new(ERROR_TYPE_INIT, &err);
                    if let Err(post_err) = self.api.post_init_error(&report).await {
                        error!("failed to report init error: {post_err:#}");
                    }
                    self.enter(Phase::Stopped);
                    return Err(RuntimeError::Init(err));
                }
            }
        }

        if self.config.snapshot_mode {
            if let Err(err) = self.restore_handshake().await {
                self.enter(Phase::Stopped);
                return Err(err);
            }
        }

        self.enter(Phase::Running);
        info!(workers = self.config.worker_count, "entering steady state");
        let pool = WorkerPool::spawn(
            self.config.worker_count,
            Arc::clone(&self.api),
            Arc::clone(&self.handler),
        );

        // Park until external cancellation; a dropped sender counts as one.
        let mut shutdown_rx = self.shutdown_rx.clone();
        while !*shutdown_rx.borrow_and_update() {
            if shutdown_rx.changed().await.is_err() {
                break;
            }
        }

        info!("stop requested; draining in-flight invocations");
        pool.request_stop();
        pool.join().await;
        self.enter(Phase::Stopped);
        Ok(())
    }

    async fn restore_handshake(&mut self) -> Result<(), RuntimeError> {
        if let Err(err) = self.hooks.run_before_checkpoint().await {
            // The handshake has not started yet, so this goes to the init
            // channel.
            let report = ErrorReport::new(ERROR_TYPE_BEFORE_CHECKPOINT, &err);
            if let Err(post_err) = self.api.post_init_error(&report).await {
                error!("failed to report before-checkpoint error: {post_err:#}");
            }
            return Err(RuntimeError::Restore(err));
        }

        self.enter(Phase::AwaitingRestore);
        // The sandbox may be frozen inside this call for arbitrarily long;
        // it returns once the snapshot has been resumed.
        if let Err(err) = self.api.next_restore().await {
            let report = ErrorReport::new(ERROR_TYPE_RESTORE, &err);
            if let Err(post_err) = self.api.post_restore_error(&report).await {
                error!("failed to report restore-gate error: {post_err:#}");
            }
            return Err(RuntimeError::Restore(err));
        }

        if let Err(err) = self.hooks.run_after_restore().await {
            let report = ErrorReport::new(ERROR_TYPE_AFTER_RESTORE, &err);
            if let Err(post_err) = self.api.post_restore_error(&report).await {
                error!("failed to report after-restore error: {post_err:#}");
            }
            return Err(RuntimeError::Restore(err));
        }

        Ok(())
    }

    fn enter(&self, phase: Phase) {
        debug!(?phase, "phase transition");
        // send_replace records the phase even when nobody subscribed.
        let _ = self.phase_tx.send_replace(phase);
    }
}
