//! The handler contract: the single capability the runtime requires from
//! user code.

use async_trait::async_trait;

use crate::context::Context;

/// One unit of work handed out by the control plane.
///
/// Owned exclusively by the worker loop that fetched it until its outcome is
/// submitted.
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Raw request payload.
    pub payload: Vec<u8>,
    /// Execution metadata for this invocation.
    pub context: Context,
}

/// Output of a successful invocation.
#[derive(Debug, Clone, Default)]
pub struct InvocationOutput {
    /// Response payload delivered to the control plane.
    pub payload: Vec<u8>,
    /// Hint that the transport connection used to deliver this payload
    /// should be torn down rather than reused.
    pub dispose: bool,
}

impl InvocationOutput {
    /// Output that keeps the transport connection for reuse.
    pub fn new(payload: Vec<u8>) -> Self {
        Self { payload, dispose: false }
    }

    /// Output that asks the transport to drop its connection afterwards.
    pub fn disposing(payload: Vec<u8>) -> Self {
        Self { payload, dispose: true }
    }
}

impl From<Vec<u8>> for InvocationOutput {
    fn from(payload: Vec<u8>) -> Self {
        Self::new(payload)
    }
}

impl From<String> for InvocationOutput {
    fn from(payload: String) -> Self {
        Self::new(payload.into_bytes())
    }
}

/// Processes one payload at a time: bytes in, context, bytes out or error.
///
/// Errors become per-invocation failure reports and never stop the worker
/// loop that called the handler. Implementations are shared across workers,
/// so they must tolerate concurrent invocations.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Process one invocation payload.
    async fn invoke(&self, payload: Vec<u8>, context: Context) -> anyhow::Result<InvocationOutput>;
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::{Handler, InvocationOutput};
    use crate::context::{Context, InvocationHeaders};

    struct Echo;

    #[async_trait]
    impl Handler for Echo {
        async fn invoke(&self, payload: Vec<u8>, _: Context) -> anyhow::Result<InvocationOutput> {
            Ok(payload.into())
        }
    }

    fn context() -> Context {
        Context::from_headers(InvocationHeaders {
            request_id: Some("req-1".to_string()),
            ..InvocationHeaders::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn echo_handler_round_trips_payloads() {
        let out = Echo.invoke(b"ping".to_vec(), context()).await.unwrap();
        assert_eq!(out.payload, b"ping");
        assert!(!out.dispose);
    }

    #[test]
    fn output_conversions_preserve_the_dispose_default() {
        let from_string: InvocationOutput = "hi".to_string().into();
        assert_eq!(from_string.payload, b"hi");
        assert!(!from_string.dispose);
        assert!(InvocationOutput::disposing(Vec::new()).dispose);
    }
}
