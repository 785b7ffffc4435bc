//! Per-invocation execution context.
//!
//! Built once in `run` and passed by reference through the middleware chain
//! into every handler. The credential and API host are write-once: the
//! middleware installs them before dispatch and nothing downstream mutates
//! them.

use std::fmt;
use std::sync::Arc;

use anyhow::anyhow;
use flagdeck_config::{ConfigProvider, Credential};
use once_cell::sync::OnceCell;
use url::Url;

use crate::error::{CliError, CliResult};
use crate::output::OutputSink;
use crate::pipeline::RequestPipeline;

/// Shared state for one CLI invocation.
pub struct ExecutionContext {
    output: Arc<dyn OutputSink>,
    config: Arc<dyn ConfigProvider>,
    pipeline: RequestPipeline,
    credential: OnceCell<Credential>,
    api_host: OnceCell<Url>,
}

impl ExecutionContext {
    /// Context with no credential installed yet.
    #[must_use]
    pub fn new(
        output: Arc<dyn OutputSink>,
        config: Arc<dyn ConfigProvider>,
        pipeline: RequestPipeline,
    ) -> Self {
        Self {
            output,
            config,
            pipeline,
            credential: OnceCell::new(),
            api_host: OnceCell::new(),
        }
    }

    /// Output sink for user-facing text.
    #[must_use]
    pub fn output(&self) -> &dyn OutputSink {
        self.output.as_ref()
    }

    /// Persisted configuration collaborator.
    #[must_use]
    pub fn config(&self) -> &dyn ConfigProvider {
        self.config.as_ref()
    }

    /// Request pipeline shared by every resource client.
    #[must_use]
    pub const fn pipeline(&self) -> &RequestPipeline {
        &self.pipeline
    }

    /// Installed credential, if any.
    #[must_use]
    pub fn credential(&self) -> Option<&Credential> {
        self.credential.get()
    }

    /// Installed API base URL, if any.
    #[must_use]
    pub fn api_host(&self) -> Option<&Url> {
        self.api_host.get()
    }

    /// Install the credential. Succeeds once per invocation.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::Failure`] when a credential is already installed.
    pub fn install_credential(&self, credential: Credential) -> CliResult<()> {
        self.credential
            .set(credential)
            .map_err(|_| CliError::failure(anyhow!("credential is already installed")))
    }

    /// Install the API base URL. Succeeds once per invocation.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::Failure`] when a host is already installed.
    pub fn install_api_host(&self, host: Url) -> CliResult<()> {
        self.api_host
            .set(host)
            .map_err(|_| CliError::failure(anyhow!("API host is already installed")))
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ExecutionContext")
            .field("pipeline", &self.pipeline)
            .field("credential", &self.credential.get())
            .field("api_host", &self.api_host.get().map(Url::as_str))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::BufferedOutput;
    use crate::pipeline::{ReqwestTransport, RetryPolicy};
    use flagdeck_config::MemoryConfigProvider;
    use std::time::Duration;

    fn context() -> ExecutionContext {
        let transport = ReqwestTransport::new(Duration::from_secs(1)).expect("transport");
        ExecutionContext::new(
            Arc::new(BufferedOutput::new()),
            Arc::new(MemoryConfigProvider::default()),
            RequestPipeline::new(Arc::new(transport), RetryPolicy::default()),
        )
    }

    #[test]
    fn credential_is_write_once() {
        let ctx = context();
        assert!(ctx.credential().is_none());

        ctx.install_credential(Credential::new("first", "secret"))
            .expect("first install");
        assert!(ctx.install_credential(Credential::new("second", "secret")).is_err());
        assert_eq!(ctx.credential().map(|c| c.username.as_str()), Some("first"));
    }

    #[test]
    fn debug_output_hides_password() {
        let ctx = context();
        ctx.install_credential(Credential::new("user", "hunter2"))
            .expect("install");
        assert!(!format!("{ctx:?}").contains("hunter2"));
    }
}
