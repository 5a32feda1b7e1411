//! Per-invocation execution context, parsed from control-plane headers.

use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use serde::Deserialize;

/// Raw header values attached to a fetched invocation, before parsing.
///
/// The transport layer fills in whatever headers the control plane sent;
/// parsing decides what is mandatory.
#[derive(Debug, Clone, Default)]
pub struct InvocationHeaders {
    /// Unique id of this invocation; the sole correlation key for outcomes.
    pub request_id: Option<String>,
    /// Absolute deadline, epoch milliseconds.
    pub deadline_ms: Option<String>,
    /// Descriptor of the function being invoked.
    pub function_arn: Option<String>,
    /// Opaque trace token, forwarded to downstream calls.
    pub trace_id: Option<String>,
    /// JSON record describing the calling client application.
    pub client_context: Option<String>,
    /// JSON record describing the caller identity.
    pub cognito_identity: Option<String>,
}

/// Client application record forwarded by mobile callers.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientApplication {
    /// Installation id of the calling app.
    #[serde(default)]
    pub installation_id: Option<String>,
    /// Title of the calling app.
    #[serde(default)]
    pub app_title: Option<String>,
    /// Version name of the calling app.
    #[serde(default)]
    pub app_version_name: Option<String>,
    /// Version code of the calling app.
    #[serde(default)]
    pub app_version_code: Option<String>,
    /// Package name of the calling app.
    #[serde(default)]
    pub app_package_name: Option<String>,
}

/// Caller-supplied context record, decoded from its JSON header.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientContext {
    /// Calling application, when the caller supplied one.
    #[serde(default)]
    pub client: Option<ClientApplication>,
    /// Free-form key/value pairs set by the caller.
    #[serde(default)]
    pub custom: HashMap<String, String>,
    /// Caller environment description.
    #[serde(default)]
    pub env: HashMap<String, String>,
}

/// Caller identity record, decoded from its JSON header.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CognitoIdentity {
    /// Identity id of the caller.
    #[serde(default, rename = "cognitoIdentityId")]
    pub identity_id: Option<String>,
    /// Identity pool the caller belongs to.
    #[serde(default, rename = "cognitoIdentityPoolId")]
    pub identity_pool_id: Option<String>,
}

/// The fetched invocation carried no request id, so no outcome could ever be
/// correlated with it.
#[derive(Debug, thiserror::Error)]
#[error("invocation response is missing the request-id header")]
pub struct MissingRequestId;

/// Immutable execution metadata for one invocation.
///
/// Constructed once per fetched work item and owned by the worker processing
/// it; the trace token travels here and nowhere else.
#[derive(Debug, Clone)]
pub struct Context {
    /// Unique id of this invocation.
    pub request_id: String,
    /// Absolute deadline, epoch milliseconds. Zero when the control plane
    /// sent none (remaining time then clamps to zero).
    pub deadline_ms: i64,
    /// Descriptor of the function being invoked.
    pub invoked_function_arn: String,
    /// Opaque trace token for downstream propagation.
    pub trace_id: Option<String>,
    /// Calling application context, when supplied.
    pub client_context: Option<ClientContext>,
    /// Caller identity, when supplied.
    pub identity: Option<CognitoIdentity>,
}

impl Context {
    /// Parse the raw header set into a context.
    ///
    /// Only the request id is mandatory. A missing or unparsable deadline
    /// degrades to zero remaining time, and malformed JSON records degrade
    /// to `None`; neither fails the fetch.
    pub fn from_headers(headers: InvocationHeaders) -> Result<Self, MissingRequestId> {
        let request_id = headers
            .request_id
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or(MissingRequestId)?;

        let deadline_ms = headers
            .deadline_ms
            .as_deref()
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .unwrap_or(0);

        Ok(Self {
            request_id,
            deadline_ms,
            invoked_function_arn: headers.function_arn.unwrap_or_default(),
            trace_id: headers.trace_id.filter(|s| !s.is_empty()),
            client_context: parse_json_header(headers.client_context.as_deref()),
            identity: parse_json_header(headers.cognito_identity.as_deref()),
        })
    }

    /// Wall-clock time left before the deadline, recomputed on every call
    /// and clamped at zero. Handlers may poll this during long work.
    pub fn remaining_time(&self) -> Duration {
        let left = self.deadline_ms - Utc::now().timestamp_millis();
        Duration::from_millis(left.max(0) as u64)
    }
}

fn parse_json_header<T: for<'de> Deserialize<'de>>(raw: Option<&str>) -> Option<T> {
    serde_json::from_str(raw?).ok()
}
