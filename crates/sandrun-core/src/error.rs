//! Error taxonomy and the wire format for control-plane error reports.

use serde::Serialize;

/// Error type reported when the user initializer fails.
pub const ERROR_TYPE_INIT: &str = "Runtime.InitError";
/// Error type reported when a before-checkpoint hook fails.
pub const ERROR_TYPE_BEFORE_CHECKPOINT: &str = "Runtime.BeforeCheckpointError";
/// Error type reported when an after-restore hook fails.
pub const ERROR_TYPE_AFTER_RESTORE: &str = "Runtime.AfterRestoreError";
/// Error type reported when the restore gate itself fails.
pub const ERROR_TYPE_RESTORE: &str = "Runtime.RestoreError";
/// Error type reported when the handler returns an error.
pub const ERROR_TYPE_HANDLER: &str = "Runtime.HandlerError";
/// Error type reported when the handler panics.
pub const ERROR_TYPE_HANDLER_PANIC: &str = "Runtime.HandlerPanic";

/// JSON body posted to the control plane's error endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorReport {
    /// Canonical error class, also sent as a request header.
    #[serde(rename = "errorType")]
    pub error_type: String,
    /// Human-readable failure description.
    #[serde(rename = "errorMessage")]
    pub error_message: String,
    /// Cause chain, outermost first. Not a machine stack trace.
    #[serde(rename = "stackTrace")]
    pub stack_trace: Vec<String>,
}

impl ErrorReport {
    /// Build a report for `err`, classified as `error_type`.
    pub fn new(error_type: &str, err: &anyhow::Error) -> Self {
        Self {
            error_type: error_type.to_string(),
            error_message: err.to_string(),
            stack_trace: err.chain().skip(1).map(|cause| cause.to_string()).collect(),
        }
    }

    /// Build a report for a caught handler panic.
    pub fn panic(message: String) -> Self {
        Self {
            error_type: ERROR_TYPE_HANDLER_PANIC.to_string(),
            error_message: message,
            stack_trace: Vec::new(),
        }
    }
}

/// Startup configuration failures. Always fatal before any network call.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The control-plane endpoint variable is unset or blank.
    #[error("AWS_LAMBDA_RUNTIME_API is not set")]
    MissingEndpoint,
    /// The endpoint could not be turned into a usable URL.
    #[error("invalid control-plane endpoint {endpoint:?}: {reason}")]
    InvalidEndpoint {
        /// The offending endpoint value.
        endpoint: String,
        /// Why it was rejected.
        reason: String,
    },
    /// The explicit worker-count override was not a positive integer.
    #[error("invalid worker count override {0:?}: expected a positive integer")]
    InvalidWorkerCount(String),
}

/// Fatal runtime failures: each stops the process with a non-zero exit after
/// being reported to the control plane (configuration failures stop before
/// anything is reported). Per-invocation handler failures are deliberately
/// absent; they are reported per item and never surface here.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// The environment did not yield a usable configuration.
    #[error("configuration error")]
    Config(#[from] ConfigError),
    /// The user initializer failed; reported via the init-error endpoint.
    #[error("initialization failed")]
    Init(#[source] anyhow::Error),
    /// A lifecycle hook or the restore gate failed.
    #[error("restore failed")]
    Restore(#[source] anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::{ERROR_TYPE_HANDLER, ErrorReport};

    #[test]
    fn report_carries_the_cause_chain() {
        let root = anyhow::anyhow!("connection refused");
        let err = root.context("posting outcome");
        let report = ErrorReport::new(ERROR_TYPE_HANDLER, &err);

        assert_eq!(report.error_type, ERROR_TYPE_HANDLER);
        assert_eq!(report.error_message, "posting outcome");
        assert_eq!(report.stack_trace, vec!["connection refused".to_string()]);
    }

    #[test]
    fn report_serializes_with_wire_field_names() {
        let report = ErrorReport::panic("boom".to_string());
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["errorType"], "Runtime.HandlerPanic");
        assert_eq!(json["errorMessage"], "boom");
        assert!(json["stackTrace"].as_array().unwrap().is_empty());
    }
}
