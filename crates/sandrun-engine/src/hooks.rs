//! Registry for snapshot lifecycle callbacks.
//!
//! Built while the runtime is being assembled, then moved into the bootstrap:
//! single writer before the handshake, drained at most once during it, never
//! touched afterwards. No locking is needed under that discipline.

use std::future::Future;

use anyhow::Context as _;
use futures::future::BoxFuture;

type Hook = Box<dyn FnOnce() -> BoxFuture<'static, anyhow::Result<()>> + Send>;

/// Ordered, append-only lists of before-checkpoint and after-restore
/// callbacks. Registration order is invocation order.
#[derive(Default)]
pub struct HooksRegistry {
    before_checkpoint: Vec<Hook>,
    after_restore: Vec<Hook>,
}

impl HooksRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a callback that runs immediately before the sandbox is
    /// checkpointed.
    pub fn on_before_checkpoint<F, Fut>(&mut self, hook: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.before_checkpoint.push(Box::new(move || Box::pin(hook())));
    }

    /// Append a callback that runs immediately after the sandbox resumes
    /// from a snapshot.
    pub fn on_after_restore<F, Fut>(&mut self, hook: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.after_restore.push(Box::new(move || Box::pin(hook())));
    }

    /// Drain and run the before-checkpoint list in registration order. The
    /// first failure short-circuits the remainder. A second call is a no-op.
    pub async fn run_before_checkpoint(&mut self) -> anyhow::Result<()> {
        run_list("before-checkpoint", std::mem::take(&mut self.before_checkpoint)).await
    }

    /// Drain and run the after-restore list in registration order, with the
    /// same short-circuit and run-once semantics.
    pub async fn run_after_restore(&mut self) -> anyhow::Result<()> {
        run_list("after-restore", std::mem::take(&mut self.after_restore)).await
    }
}

async fn run_list(kind: &str, hooks: Vec<Hook>) -> anyhow::Result<()> {
    let total = hooks.len();
    for (idx, hook) in hooks.into_iter().enumerate() {
        hook()
            .await
            .with_context(|| format!("{kind} hook {} of {total} failed", idx + 1))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use super::HooksRegistry;

    #[tokio::test]
    async fn hooks_run_in_registration_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut registry = HooksRegistry::new();
        for label in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            registry.on_before_checkpoint(move || async move {
                order.lock().unwrap().push(label);
                Ok(())
            });
        }

        registry.run_before_checkpoint().await.unwrap();
        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn a_failing_hook_short_circuits_the_rest() {
        let ran_after = Arc::new(AtomicUsize::new(0));
        let mut registry = HooksRegistry::new();
        registry.on_after_restore(|| async { Ok(()) });
        registry.on_after_restore(|| async { anyhow::bail!("refused to warm up") });
        {
            let ran_after = Arc::clone(&ran_after);
            registry.on_after_restore(move || async move {
                ran_after.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }

        let err = registry.run_after_restore().await.unwrap_err();
        assert!(err.to_string().contains("after-restore hook 2 of 3"));
        assert_eq!(ran_after.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn each_list_is_drained_at_most_once() {
        let runs = Arc::new(AtomicUsize::new(0));
        let mut registry = HooksRegistry::new();
        {
            let runs = Arc::clone(&runs);
            registry.on_before_checkpoint(move || async move {
                runs.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }

        registry.run_before_checkpoint().await.unwrap();
        registry.run_before_checkpoint().await.unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }
}
