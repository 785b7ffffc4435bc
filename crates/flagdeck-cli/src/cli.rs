//! Invocation entry points.
//!
//! `run` wires the production collaborators; `run_with` takes them from a
//! [`Runtime`] so tests can substitute output, configuration and transport.
//! Both return the process exit code and never panic on bad input.

use std::ffi::OsString;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use clap::error::ErrorKind;
use flagdeck_config::{ConfigProvider, FileConfigProvider};
use tracing::{debug, info};
use uuid::Uuid;

use crate::cancel::Cancellation;
use crate::commands::command_tree;
use crate::context::ExecutionContext;
use crate::error::{CliError, CliResult, EXIT_ERROR, EXIT_OK, report};
use crate::middleware::{Invocation, Next, default_chain};
use crate::output::{OutputSink, TerminalOutput};
use crate::pipeline::{ReqwestTransport, RequestPipeline, RetryPolicy, Transport};
use crate::tree::{CommandTree, DEFAULT_TIMEOUT_SECS, TIMEOUT_ARG};

/// Collaborators of one invocation.
#[derive(Clone)]
pub struct Runtime {
    output: Arc<dyn OutputSink>,
    config: Arc<dyn ConfigProvider>,
    transport: Option<Arc<dyn Transport>>,
    retry: RetryPolicy,
}

impl Runtime {
    /// Runtime using the `reqwest` transport and the default retry policy.
    #[must_use]
    pub fn new(output: Arc<dyn OutputSink>, config: Arc<dyn ConfigProvider>) -> Self {
        Self {
            output,
            config,
            transport: None,
            retry: RetryPolicy::default(),
        }
    }

    /// Replace the retry policy.
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Replace the HTTP transport; `--timeout` is then ignored.
    #[must_use]
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    fn transport(&self, timeout: Duration) -> CliResult<Arc<dyn Transport>> {
        match &self.transport {
            Some(transport) => Ok(Arc::clone(transport)),
            None => Ok(Arc::new(ReqwestTransport::new(timeout)?)),
        }
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Runtime")
            .field("retry", &self.retry)
            .field("custom_transport", &self.transport.is_some())
            .finish_non_exhaustive()
    }
}

/// Run the CLI against the process arguments, terminal and config file.
pub async fn run(cancel: &Cancellation) -> i32 {
    let output: Arc<dyn OutputSink> = Arc::new(TerminalOutput::new());
    let config = match FileConfigProvider::from_env() {
        Ok(config) => config,
        Err(err) => return report(&CliError::from(err), output.as_ref()),
    };
    debug!(path = %config.path().display(), "using configuration file");
    let runtime = Runtime::new(output, Arc::new(config));
    run_with(std::env::args_os(), &runtime, cancel).await
}

/// Run one invocation with explicit collaborators.
pub async fn run_with<I, T>(args: I, runtime: &Runtime, cancel: &Cancellation) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let output = runtime.output.as_ref();
    let tree = match command_tree() {
        Ok(tree) => tree,
        Err(err) => return report(&CliError::from(err), output),
    };
    let matches = match tree.to_clap().try_get_matches_from(args) {
        Ok(matches) => matches,
        Err(err) => return report_parse_error(&err, output),
    };

    let invocation_id = Uuid::new_v4();
    let outcome = invoke(&tree, &matches, runtime, cancel).await;
    let code = match outcome {
        Ok(()) => EXIT_OK,
        Err(err) => report(&err, output),
    };
    info!(%invocation_id, exit_code = code, "invocation finished");
    code
}

async fn invoke(
    tree: &CommandTree,
    matches: &clap::ArgMatches,
    runtime: &Runtime,
    cancel: &Cancellation,
) -> CliResult<()> {
    let timeout = matches
        .try_get_one::<u64>(TIMEOUT_ARG)
        .ok()
        .flatten()
        .copied()
        .unwrap_or(DEFAULT_TIMEOUT_SECS);
    let pipeline = RequestPipeline::new(runtime.transport(Duration::from_secs(timeout))?, runtime.retry);
    let context = ExecutionContext::new(
        Arc::clone(&runtime.output),
        Arc::clone(&runtime.config),
        pipeline,
    );

    let selection = tree.resolve(matches)?;
    debug!(command = %tree.selection_path(&selection), timeout_secs = timeout, "invoking");
    let invocation = Invocation {
        matches,
        selection,
        context: &context,
        cancel,
        tree,
    };
    let chain = default_chain();
    Next::new(&chain).run(&invocation).await
}

/// Print a `clap` parse outcome; help and version requests are successes.
fn report_parse_error(err: &clap::Error, output: &dyn OutputSink) -> i32 {
    let rendered = err.render().to_string();
    match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
            output.write(&rendered);
            EXIT_OK
        }
        _ => {
            output.error(rendered.trim_end());
            EXIT_ERROR
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flagdeck_config::MemoryConfigProvider;

    use crate::output::BufferedOutput;

    fn runtime(output: &Arc<BufferedOutput>) -> Runtime {
        Runtime::new(output.clone(), Arc::new(MemoryConfigProvider::default()))
    }

    #[tokio::test]
    async fn help_exits_successfully() {
        let output = Arc::new(BufferedOutput::new());
        let code = run_with(["flagdeck", "--help"], &runtime(&output), &Cancellation::never()).await;
        assert_eq!(code, EXIT_OK);
        assert!(output.stdout().contains("Usage: flagdeck"));
        assert!(output.stderr().is_empty());
    }

    #[tokio::test]
    async fn version_exits_successfully() {
        let output = Arc::new(BufferedOutput::new());
        let code = run_with(["flagdeck", "--version"], &runtime(&output), &Cancellation::never()).await;
        assert_eq!(code, EXIT_OK);
        assert!(output.stdout().contains(env!("CARGO_PKG_VERSION")));
    }

    #[tokio::test]
    async fn unknown_arguments_exit_with_error() {
        let output = Arc::new(BufferedOutput::new());
        let code = run_with(["flagdeck", "--bogus"], &runtime(&output), &Cancellation::never()).await;
        assert_eq!(code, EXIT_ERROR);
        assert!(output.stderr().contains("--bogus"));
    }

    #[tokio::test]
    async fn group_without_subcommand_prints_help() {
        let output = Arc::new(BufferedOutput::new());
        let code = run_with(["flagdeck", "flag"], &runtime(&output), &Cancellation::never()).await;
        assert_eq!(code, EXIT_ERROR);
        let stderr = output.stderr();
        assert!(stderr.starts_with("'flagdeck flag' requires a subcommand.\n\n"));
        assert!(stderr.contains("Usage: flagdeck flag"));
    }

    #[tokio::test]
    async fn timeout_option_is_validated_by_clap() {
        let output = Arc::new(BufferedOutput::new());
        let code = run_with(
            ["flagdeck", "--timeout", "soon", "cat"],
            &runtime(&output),
            &Cancellation::never(),
        )
        .await;
        assert_eq!(code, EXIT_ERROR);
        assert!(output.stderr().contains("soon"));
    }
}
