#![forbid(unsafe_code)]
#![deny(unreachable_pub)]
#![deny(missing_docs)]

//! Shared domain types for the `sandrun` runtime client: process
//! configuration, the per-invocation execution context, the error taxonomy,
//! and the handler contract. No IO lives here.

pub mod config;
pub mod context;
pub mod error;
pub mod handler;
