//! Narrow client for the control plane's fixed HTTP surface.
//!
//! Six operations, no internal retries: a transport failure surfaces to the
//! caller, which classifies it by the phase it interrupted. The underlying
//! connection pool is shared safely across workers.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CONNECTION, HeaderMap};
use reqwest::{Response, Url};

use sandrun_core::context::{Context, InvocationHeaders};
use sandrun_core::error::{ConfigError, ErrorReport};
use sandrun_core::handler::{Invocation, InvocationOutput};

/// Wire protocol version shared by every path.
const API_VERSION: &str = "2018-06-01";

/// Read timeout for control-plane calls. Long polls may park for the whole
/// sandbox lifetime, including checkpoint pauses, so this is a very large
/// fixed bound rather than a real timeout.
const BLOCKING_CALL_TIMEOUT: Duration = Duration::from_millis(100_000_000);

const HEADER_REQUEST_ID: &str = "Lambda-Runtime-Aws-Request-Id";
const HEADER_DEADLINE_MS: &str = "Lambda-Runtime-Deadline-Ms";
const HEADER_FUNCTION_ARN: &str = "Lambda-Runtime-Invoked-Function-Arn";
const HEADER_TRACE_ID: &str = "Lambda-Runtime-Trace-Id";
const HEADER_CLIENT_CONTEXT: &str = "Lambda-Runtime-Client-Context";
const HEADER_COGNITO_IDENTITY: &str = "Lambda-Runtime-Cognito-Identity";
const HEADER_ERROR_TYPE: &str = "Lambda-Runtime-Function-Error-Type";

/// The fixed set of control-plane operations.
///
/// Implemented by [`RuntimeApiClient`] over HTTP; the scheduler and bootstrap
/// only see this trait, so tests substitute in-process fakes.
#[async_trait]
pub trait RuntimeApi: Send + Sync {
    /// Long-poll for the next unit of work. Blocks until the control plane
    /// offers one; may park indefinitely.
    async fn next_invocation(&self) -> anyhow::Result<Invocation>;

    /// Submit the success outcome for one invocation. Call exactly once per
    /// request id.
    async fn post_response(&self, request_id: &str, output: InvocationOutput)
    -> anyhow::Result<()>;

    /// Submit the failure outcome for one invocation.
    async fn post_invocation_error(
        &self,
        request_id: &str,
        report: &ErrorReport,
    ) -> anyhow::Result<()>;

    /// Report a fatal initialization-phase failure. Called at most once.
    async fn post_init_error(&self, report: &ErrorReport) -> anyhow::Result<()>;

    /// Long-poll gate that returns once the sandbox has been resumed from a
    /// snapshot. Snapshot mode only.
    async fn next_restore(&self) -> anyhow::Result<()>;

    /// Report a fatal failure in the restore handshake.
    async fn post_restore_error(&self, report: &ErrorReport) -> anyhow::Result<()>;
}

/// HTTP implementation of [`RuntimeApi`].
pub struct RuntimeApiClient {
    http: reqwest::Client,
    base: Url,
}

impl RuntimeApiClient {
    /// Build a client for the given endpoint URL.
    pub fn new(endpoint: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            reason,
        };

        let base = Url::parse(endpoint).map_err(|err| invalid(err.to_string()))?;
        let http = reqwest::Client::builder()
            .user_agent(concat!("sandrun/", env!("CARGO_PKG_VERSION")))
            .timeout(BLOCKING_CALL_TIMEOUT)
            .pool_idle_timeout(None)
            .build()
            .map_err(|err| invalid(err.to_string()))?;

        Ok(Self { http, base })
    }

    fn url(&self, path: &str) -> anyhow::Result<Url> {
        Ok(self.base.join(&format!("{API_VERSION}/{path}"))?)
    }
}

#[async_trait]
impl RuntimeApi for RuntimeApiClient {
    async fn next_invocation(&self) -> anyhow::Result<Invocation> {
        let url = self.url("runtime/invocation/next")?;
        let res = self.http.get(url).send().await?;
        let res = accepted("next invocation", res).await?;

        let headers = InvocationHeaders {
            request_id: header_string(res.headers(), HEADER_REQUEST_ID),
            deadline_ms: header_string(res.headers(), HEADER_DEADLINE_MS),
            function_arn: header_string(res.headers(), HEADER_FUNCTION_ARN),
            trace_id: header_string(res.headers(), HEADER_TRACE_ID),
            client_context: header_string(res.headers(), HEADER_CLIENT_CONTEXT),
            cognito_identity: header_string(res.headers(), HEADER_COGNITO_IDENTITY),
        };
        let payload = res.bytes().await?.to_vec();
        let context = Context::from_headers(headers)?;

        Ok(Invocation { payload, context })
    }

    async fn post_response(
        &self,
        request_id: &str,
        output: InvocationOutput,
    ) -> anyhow::Result<()> {
        let url = self.url(&format!("runtime/invocation/{request_id}/response"))?;
        let mut req = self.http.post(url).body(output.payload);
        if output.dispose {
            req = req.header(CONNECTION, "close");
        }
        accepted("post response", req.send().await?).await?;
        Ok(())
    }

    async fn post_invocation_error(
        &self,
        request_id: &str,
        report: &ErrorReport,
    ) -> anyhow::Result<()> {
        let url = self.url(&format!("runtime/invocation/{request_id}/error"))?;
        let res = self
            .http
            .post(url)
            .header(HEADER_ERROR_TYPE, report.error_type.as_str())
            .json(report)
            .send()
            .await?;
        accepted("post invocation error", res).await?;
        Ok(())
    }

    async fn post_init_error(&self, report: &ErrorReport) -> anyhow::Result<()> {
        let url = self.url("runtime/init/error")?;
        let res = self
            .http
            .post(url)
            .header(HEADER_ERROR_TYPE, report.error_type.as_str())
            .json(report)
            .send()
            .await?;
        accepted("post init error", res).await?;
        Ok(())
    }

    async fn next_restore(&self) -> anyhow::Result<()> {
        let url = self.url("runtime/restore/next")?;
        accepted("next restore", self.http.get(url).send().await?).await?;
        Ok(())
    }

    async fn post_restore_error(&self, report: &ErrorReport) -> anyhow::Result<()> {
        let url = self.url("runtime/restore/error")?;
        let res = self
            .http
            .post(url)
            .header(HEADER_ERROR_TYPE, report.error_type.as_str())
            .json(report)
            .send()
            .await?;
        accepted("post restore error", res).await?;
        Ok(())
    }
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_string)
}

async fn accepted(op: &str, res: Response) -> anyhow::Result<Response> {
    if res.status().is_success() {
        return Ok(res);
    }
    let status = res.status();
    let body = res.text().await.unwrap_or_default();
    anyhow::bail!("{op}: http {status}: {body}")
}

#[cfg(test)]
mod tests {
    use super::RuntimeApiClient;

    #[test]
    fn paths_carry_the_protocol_version() {
        let client = RuntimeApiClient::new("http://127.0.0.1:9001").unwrap();
        let url = client.url("runtime/invocation/next").unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:9001/2018-06-01/runtime/invocation/next");

        let url = client.url("runtime/invocation/req-7/response").unwrap();
        assert_eq!(
            url.as_str(),
            "http://127.0.0.1:9001/2018-06-01/runtime/invocation/req-7/response"
        );
    }

    #[test]
    fn a_bare_host_port_endpoint_is_rejected_before_any_request() {
        assert!(RuntimeApiClient::new("127.0.0.1:9001").is_err());
    }
}
