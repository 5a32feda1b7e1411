#![forbid(unsafe_code)]
#![deny(unreachable_pub)]
#![deny(missing_docs)]

//! sandrun — a concurrent custom-runtime client for function sandboxes.
//!
//! The runtime long-polls the sandbox's control plane for invocations, hands
//! each payload to your [`Handler`], and submits exactly one outcome per
//! invocation, across one or more independent worker loops. Snapshot-aware
//! sandboxes additionally get before-checkpoint and after-restore hooks
//! around the restore handshake.
//!
//! ```no_run
//! use sandrun::{Context, handler_fn};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), sandrun::RuntimeError> {
//!     let handler = handler_fn(|payload: Vec<u8>, _ctx: Context| async move {
//!         anyhow::Ok(payload)
//!     });
//!     sandrun::run(handler).await
//! }
//! ```

mod adapter;
mod runtime;

pub use adapter::{HandlerFn, handler_fn};
pub use runtime::{Runtime, run};

pub use sandrun_core::config::ProcessConfig;
pub use sandrun_core::context::{ClientApplication, ClientContext, CognitoIdentity, Context};
pub use sandrun_core::error::{ConfigError, ErrorReport, RuntimeError};
pub use sandrun_core::handler::{Handler, Invocation, InvocationOutput};
pub use sandrun_engine::{Phase, RuntimeApi, RuntimeApiClient};
