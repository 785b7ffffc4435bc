//! Resource clients for the management API.
//!
//! [`ApiClient`] binds the request pipeline to one invocation: it resolves
//! endpoints against the installed API host, attaches the installed
//! credential, decodes JSON responses, and prints progress markers around
//! write operations. Resource-specific calls live in sibling modules as
//! additional `impl ApiClient` blocks.

mod account;
mod configs;
mod environments;
mod flags;
mod products;
mod sdk_keys;
mod tags;

use std::future::Future;

use anyhow::anyhow;
use flagdeck_config::Credential;
use reqwest::Method;
use serde::Serialize;
use serde::de::DeserializeOwned;
use url::Url;

use crate::cancel::Cancellation;
use crate::context::ExecutionContext;
use crate::error::{CliError, CliResult};
use crate::output::Style;
use crate::pipeline::{PipelineError, RequestSnapshot, TransportResponse};

const SUCCESS_MARKER: &str = "Ok.";
const FAILURE_MARKER: &str = "Failed.";

/// Client for one invocation, bound to a host, credential and cancellation signal.
#[derive(Debug)]
pub struct ApiClient<'a> {
    ctx: &'a ExecutionContext,
    cancel: &'a Cancellation,
    host: Url,
    credential: Option<Credential>,
}

impl<'a> ApiClient<'a> {
    /// Client using the host and credential installed in the context.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::Failure`] when no API host has been installed.
    pub fn new(ctx: &'a ExecutionContext, cancel: &'a Cancellation) -> CliResult<Self> {
        let host = ctx
            .api_host()
            .cloned()
            .ok_or_else(|| CliError::failure(anyhow!("API host is not configured")))?;
        Ok(Self {
            ctx,
            cancel,
            host,
            credential: ctx.credential().cloned(),
        })
    }

    /// Client for an explicit host and credential, bypassing the context.
    #[must_use]
    pub const fn with_target(
        ctx: &'a ExecutionContext,
        cancel: &'a Cancellation,
        host: Url,
        credential: Credential,
    ) -> Self {
        Self {
            ctx,
            cancel,
            host,
            credential: Some(credential),
        }
    }

    /// Resolve path segments beneath the API host, percent-encoding each one.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidUrl`] when the host cannot carry a path.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url, PipelineError> {
        let mut url = self.host.clone();
        url.path_segments_mut()
            .map_err(|()| PipelineError::InvalidUrl {
                path: segments.join("/"),
                source: url::ParseError::RelativeUrlWithCannotBeABaseBase,
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Execute one call through the pipeline.
    ///
    /// # Errors
    ///
    /// Returns the classified pipeline failure.
    pub async fn execute<B>(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<&B>,
    ) -> CliResult<TransportResponse>
    where
        B: Serialize + ?Sized + Sync,
    {
        let snapshot = RequestSnapshot::capture(method, self.endpoint(segments)?, body)?;
        let response = self
            .ctx
            .pipeline()
            .execute(&snapshot, self.credential.as_ref(), self.cancel)
            .await?;
        Ok(response)
    }

    /// `GET` a JSON document.
    ///
    /// # Errors
    ///
    /// Returns the pipeline failure or [`PipelineError::Decode`].
    pub async fn get<T: DeserializeOwned>(&self, segments: &[&str]) -> CliResult<T> {
        let response = self.execute::<()>(Method::GET, segments, None).await?;
        decode(&response)
    }

    /// Send a JSON body and decode the JSON response.
    ///
    /// # Errors
    ///
    /// Returns the pipeline failure or [`PipelineError::Decode`].
    pub async fn send_json<T, B>(&self, method: Method, segments: &[&str], body: &B) -> CliResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized + Sync,
    {
        let response = self.execute(method, segments, Some(body)).await?;
        decode(&response)
    }

    /// Send a request whose response body is ignored.
    ///
    /// # Errors
    ///
    /// Returns the pipeline failure.
    pub async fn send<B>(&self, method: Method, segments: &[&str], body: Option<&B>) -> CliResult<()>
    where
        B: Serialize + ?Sized + Sync,
    {
        self.execute(method, segments, body).await.map(|_| ())
    }

    /// Run a write operation between "`{label}... `" and a result marker.
    ///
    /// # Errors
    ///
    /// Returns the operation's error unchanged.
    pub async fn with_progress<T, F>(&self, label: &str, operation: F) -> CliResult<T>
    where
        F: Future<Output = CliResult<T>> + Send,
    {
        let output = self.ctx.output();
        output.write(&format!("{label}... "));
        let result = operation.await;
        match &result {
            Ok(_) => output.write_styled(SUCCESS_MARKER, Style::Green),
            Err(_) => output.write_styled(FAILURE_MARKER, Style::Red),
        }
        output.line();
        result
    }
}

fn decode<T: DeserializeOwned>(response: &TransportResponse) -> CliResult<T> {
    serde_json::from_slice(&response.body)
        .map_err(|source| CliError::from(PipelineError::Decode { source }))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use flagdeck_config::MemoryConfigProvider;
    use httpmock::MockServer;

    use crate::output::BufferedOutput;
    use crate::pipeline::{DEFAULT_MAX_ATTEMPTS, ReqwestTransport, RequestPipeline, RetryPolicy};

    /// Context pointed at a mock server with an installed credential.
    pub(crate) fn mock_context(
        server: &MockServer,
        output: &Arc<BufferedOutput>,
        credential: Option<Credential>,
    ) -> ExecutionContext {
        let transport = ReqwestTransport::new(Duration::from_secs(5)).expect("transport");
        let ctx = ExecutionContext::new(
            output.clone(),
            Arc::new(MemoryConfigProvider::default()),
            RequestPipeline::new(
                Arc::new(transport),
                RetryPolicy::immediate(DEFAULT_MAX_ATTEMPTS),
            ),
        );
        let host = flagdeck_config::model::normalize_api_host(&server.base_url()).expect("host");
        ctx.install_api_host(host).expect("host installed");
        if let Some(credential) = credential {
            ctx.install_credential(credential).expect("credential installed");
        }
        ctx
    }

    #[test]
    fn endpoint_encodes_segments() {
        let server = MockServer::start();
        let output = Arc::new(BufferedOutput::new());
        let ctx = mock_context(&server, &output, None);
        let cancel = Cancellation::never();
        let client = ApiClient::new(&ctx, &cancel).expect("client");

        let url = client.endpoint(&["v1", "products", "a b/c", "tags"]).expect("url");
        assert!(url.as_str().ends_with("/v1/products/a%20b%2Fc/tags"));
    }

    #[tokio::test]
    async fn progress_markers_wrap_operation() {
        let server = MockServer::start_async().await;
        let output = Arc::new(BufferedOutput::new());
        let ctx = mock_context(&server, &output, None);
        let cancel = Cancellation::never();
        let client = ApiClient::new(&ctx, &cancel).expect("client");

        let ok: CliResult<u8> = client.with_progress("Updating Tag", async { Ok(1) }).await;
        assert!(ok.is_ok());
        let failed: CliResult<u8> = client
            .with_progress("Deleting Tag", async { Err(CliError::validation("no")) })
            .await;
        assert!(failed.is_err());

        assert_eq!(
            output.stdout(),
            "Updating Tag... Ok.\nDeleting Tag... Failed.\n"
        );
    }

    #[tokio::test]
    async fn decode_failures_are_classified() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(httpmock::Method::GET).path("/v1/me");
            then.status(200).body("not json");
        });
        let output = Arc::new(BufferedOutput::new());
        let ctx = mock_context(&server, &output, None);
        let cancel = Cancellation::never();
        let client = ApiClient::new(&ctx, &cancel).expect("client");

        let err = client.me().await.expect_err("decode failure");
        assert!(matches!(
            err,
            CliError::Pipeline(PipelineError::Decode { .. })
        ));
        mock.assert();
    }
}
