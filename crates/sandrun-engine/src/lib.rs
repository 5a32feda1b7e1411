#![forbid(unsafe_code)]
#![deny(unreachable_pub)]
#![deny(missing_docs)]

//! Engine for the `sandrun` runtime client: the control-plane HTTP client,
//! the snapshot lifecycle hook registry, the bounded-concurrency invocation
//! scheduler, and the bootstrap orchestrator that sequences them.

pub mod bootstrap;
pub mod client;
pub mod hooks;
pub mod scheduler;

#[cfg(test)]
mod testutil;

pub use bootstrap::{Bootstrap, Initializer, Phase};
pub use client::{RuntimeApi, RuntimeApiClient};
pub use hooks::HooksRegistry;
pub use scheduler::WorkerPool;
