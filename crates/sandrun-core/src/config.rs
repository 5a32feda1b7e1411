//! Process configuration sourced from the sandbox environment.
//!
//! Everything here is read exactly once at startup and is immutable for the
//! process lifetime; workers share it without synchronization.

use std::env;

use crate::error::ConfigError;

/// Names the control-plane endpoint, either `host:port` or a full URL.
pub const ENV_RUNTIME_API: &str = "AWS_LAMBDA_RUNTIME_API";

/// Describes how the sandbox was initialized.
pub const ENV_INITIALIZATION_TYPE: &str = "AWS_LAMBDA_INITIALIZATION_TYPE";

/// Initialization type that enables the snapshot/restore handshake.
pub const INIT_TYPE_SNAPSHOT: &str = "snap-start";

/// Platform-provided per-sandbox max concurrency; the default worker count
/// derives from it.
pub const ENV_MAX_CONCURRENCY: &str = "AWS_LAMBDA_MAX_CONCURRENCY";

/// Explicit worker-count override. Checked before [`ENV_MAX_CONCURRENCY`];
/// must parse as a positive integer.
pub const ENV_WORKER_COUNT: &str = "SANDRUN_WORKER_COUNT";

/// Read-once process configuration.
#[derive(Debug, Clone)]
pub struct ProcessConfig {
    /// Control-plane base endpoint, normalized to a full URL.
    pub endpoint: String,
    /// Whether the snapshot/restore handshake runs before steady state.
    pub snapshot_mode: bool,
    /// Number of independent worker loops. Always >= 1.
    pub worker_count: usize,
}

impl ProcessConfig {
    /// Derive the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let endpoint = nonempty(env::var(ENV_RUNTIME_API).ok()).ok_or(ConfigError::MissingEndpoint)?;
        let snapshot_mode = env::var(ENV_INITIALIZATION_TYPE)
            .map(|v| v.trim() == INIT_TYPE_SNAPSHOT)
            .unwrap_or(false);
        let worker_count = derive_worker_count(
            env::var(ENV_WORKER_COUNT).ok().as_deref(),
            env::var(ENV_MAX_CONCURRENCY).ok().as_deref(),
        )?;

        Ok(Self {
            endpoint: normalize_endpoint(&endpoint),
            snapshot_mode,
            worker_count,
        })
    }
}

fn nonempty(raw: Option<String>) -> Option<String> {
    raw.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Worker count resolution: an explicit override wins and must be a positive
/// integer; otherwise the platform max-concurrency value when positive;
/// otherwise 1.
fn derive_worker_count(
    override_raw: Option<&str>,
    max_concurrency_raw: Option<&str>,
) -> Result<usize, ConfigError> {
    if let Some(raw) = override_raw.map(str::trim).filter(|s| !s.is_empty()) {
        return match raw.parse::<usize>() {
            Ok(n) if n > 0 => Ok(n),
            _ => Err(ConfigError::InvalidWorkerCount(raw.to_string())),
        };
    }

    // The platform value is advisory: absent, non-numeric, or non-positive
    // all fall back to a single worker.
    let max = max_concurrency_raw
        .and_then(|raw| raw.trim().parse::<i64>().ok())
        .unwrap_or(0);
    Ok(if max > 0 { max as usize } else { 1 })
}

/// Accepts the bare `host:port` form the control plane hands out and turns
/// it into a URL the HTTP client can parse.
fn normalize_endpoint(endpoint: &str) -> String {
    if endpoint.contains("://") {
        endpoint.to_string()
    } else {
        format!("http://{endpoint}")
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{derive_worker_count, normalize_endpoint};

    #[rstest]
    #[case(None, None, 1)]
    #[case(None, Some("5"), 5)]
    #[case(None, Some("0"), 1)]
    #[case(None, Some("-3"), 1)]
    #[case(None, Some("not-a-number"), 1)]
    #[case(Some("8"), Some("5"), 8)]
    #[case(Some("2"), None, 2)]
    #[case(Some(" 3 "), None, 3)]
    fn worker_count_derivation(
        #[case] override_raw: Option<&str>,
        #[case] max_raw: Option<&str>,
        #[case] expected: usize,
    ) {
        assert_eq!(derive_worker_count(override_raw, max_raw).unwrap(), expected);
    }

    #[rstest]
    #[case("0")]
    #[case("-1")]
    #[case("abc")]
    #[case("1.5")]
    fn invalid_override_is_a_configuration_error(#[case] raw: &str) {
        assert!(derive_worker_count(Some(raw), Some("5")).is_err());
    }

    #[test]
    fn empty_override_falls_back_to_derivation() {
        assert_eq!(derive_worker_count(Some("  "), Some("5")).unwrap(), 5);
    }

    #[test]
    fn endpoint_normalization_adds_scheme_once() {
        assert_eq!(normalize_endpoint("127.0.0.1:9001"), "http://127.0.0.1:9001");
        assert_eq!(normalize_endpoint("http://127.0.0.1:9001"), "http://127.0.0.1:9001");
    }
}
