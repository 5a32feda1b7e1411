//! Adapters turning plain async functions into [`Handler`]s.

use std::future::Future;

use async_trait::async_trait;

use sandrun_core::context::Context;
use sandrun_core::handler::{Handler, InvocationOutput};

/// Wrap a plain async function or closure as a [`Handler`].
///
/// The function receives the raw payload and the invocation context, and may
/// return anything convertible into an [`InvocationOutput`].
pub fn handler_fn<F>(f: F) -> HandlerFn<F> {
    HandlerFn { f }
}

/// [`Handler`] implementation produced by [`handler_fn`].
pub struct HandlerFn<F> {
    f: F,
}

#[async_trait]
impl<F, Fut, Out> Handler for HandlerFn<F>
where
    F: Fn(Vec<u8>, Context) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Out>> + Send,
    Out: Into<InvocationOutput> + Send,
{
    async fn invoke(&self, payload: Vec<u8>, context: Context) -> anyhow::Result<InvocationOutput> {
        (self.f)(payload, context).await.map(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use sandrun_core::context::{Context, InvocationHeaders};
    use sandrun_core::handler::Handler;

    use super::handler_fn;

    fn context() -> Context {
        Context::from_headers(InvocationHeaders {
            request_id: Some("req-1".to_string()),
            ..InvocationHeaders::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn closures_become_handlers_with_output_conversion() {
        let handler = handler_fn(|payload: Vec<u8>, _ctx: Context| async move {
            anyhow::Ok(String::from_utf8(payload).unwrap().to_uppercase())
        });

        let out = handler.invoke(b"ping".to_vec(), context()).await.unwrap();
        assert_eq!(out.payload, b"PING");
        assert!(!out.dispose);
    }

    #[tokio::test]
    async fn closure_errors_surface_as_handler_errors() {
        let handler = handler_fn(|_payload: Vec<u8>, _ctx: Context| async move {
            Err::<Vec<u8>, _>(anyhow::anyhow!("nope"))
        });

        assert!(handler.invoke(Vec::new(), context()).await.is_err());
    }
}
