//! Helpers shared by the engine's test modules.

use std::time::Duration;

use sandrun_core::context::{Context, InvocationHeaders};
use sandrun_core::handler::Invocation;

pub(crate) fn invocation(request_id: &str, payload: &[u8]) -> Invocation {
    Invocation {
        payload: payload.to_vec(),
        context: Context::from_headers(InvocationHeaders {
            request_id: Some(request_id.to_string()),
            ..InvocationHeaders::default()
        })
        .unwrap(),
    }
}

// Sleeping (not yielding) lets the paused clock auto-advance past any timers
// the workers are parked on.
pub(crate) async fn wait_for<F: Fn() -> bool>(condition: F) {
    for _ in 0..10_000 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("condition not reached");
}
