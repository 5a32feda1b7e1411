//! User-facing runtime builder and process entry point.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

use sandrun_core::config::ProcessConfig;
use sandrun_core::error::RuntimeError;
use sandrun_core::handler::Handler;
use sandrun_engine::bootstrap::{Bootstrap, Initializer};
use sandrun_engine::client::RuntimeApiClient;
use sandrun_engine::hooks::HooksRegistry;

/// Builder for the runtime process: handler, optional initializer, optional
/// snapshot lifecycle hooks.
pub struct Runtime {
    config: ProcessConfig,
    handler: Arc<dyn Handler>,
    hooks: HooksRegistry,
    initializer: Option<Initializer>,
}

impl Runtime {
    /// Derive configuration from the environment and use `handler` for every
    /// invocation.
    pub fn from_env(handler: impl Handler + 'static) -> Result<Self, RuntimeError> {
        Ok(Self::with_config(ProcessConfig::from_env()?, handler))
    }

    /// Use an explicit configuration instead of the environment.
    pub fn with_config(config: ProcessConfig, handler: impl Handler + 'static) -> Self {
        Self {
            config,
            handler: Arc::new(handler),
            hooks: HooksRegistry::new(),
            initializer: None,
        }
    }

    /// Register the one-shot initializer, run before any work is fetched.
    /// `Ok(true)` proceeds, `Ok(false)` declines and stops silently, `Err`
    /// is fatal and reported to the control plane.
    pub fn initializer<F, Fut>(mut self, init: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<bool>> + Send + 'static,
    {
        let init: Initializer = Box::new(move || Box::pin(init()));
        self.initializer = Some(init);
        self
    }

    /// Register a callback to run immediately before the sandbox is
    /// checkpointed. Never invoked outside snapshot mode.
    pub fn on_before_checkpoint<F, Fut>(mut self, hook: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.hooks.on_before_checkpoint(hook);
        self
    }

    /// Register a callback to run immediately after the sandbox resumes from
    /// a snapshot. Never invoked outside snapshot mode.
    pub fn on_after_restore<F, Fut>(mut self, hook: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.hooks.on_after_restore(hook);
        self
    }

    /// Run the process lifecycle to completion.
    ///
    /// Fatal failures come back as `Err` after being reported to the control
    /// plane; propagate them from `main` so the process exits non-zero, as
    /// the sandbox tooling requires.
    pub async fn run(self) -> Result<(), RuntimeError> {
        let api = Arc::new(RuntimeApiClient::new(&self.config.endpoint)?);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        spawn_signal_listener(shutdown_tx);

        Bootstrap::new(
            self.config,
            api,
            self.handler,
            self.hooks,
            self.initializer,
            shutdown_rx,
        )
        .run()
        .await
    }
}

/// Convenience entry point: configuration from the environment, `handler`
/// for every invocation.
pub async fn run(handler: impl Handler + 'static) -> Result<(), RuntimeError> {
    Runtime::from_env(handler)?.run().await
}

/// First stop signal drains gracefully; a second one exits on the spot.
fn spawn_signal_listener(shutdown_tx: watch::Sender<bool>) {
    tokio::spawn(async move {
        let mut stops: u32 = 0;
        loop {
            if wait_for_signal().await.is_err() {
                return;
            }
            stops += 1;
            if stops == 1 {
                info!("stop signal received; draining in-flight invocations");
                if shutdown_tx.send(true).is_err() {
                    return;
                }
            } else {
                warn!("second stop signal; exiting immediately");
                std::process::exit(130);
            }
        }
    });
}

#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        res = tokio::signal::ctrl_c() => res,
        _ = sigterm.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
