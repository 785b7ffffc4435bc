//! Ordered middleware wrapping every invocation.
//!
//! Each step receives the invocation plus a [`Next`] handle and either passes
//! control on or short-circuits with an error. The chain always ends in
//! dispatch to the selected handler; the top-level error handler sits outside
//! the chain in `cli::run_with`.

use async_trait::async_trait;
use clap::ArgMatches;
use tracing::{debug, instrument};

use crate::cancel::Cancellation;
use crate::context::ExecutionContext;
use crate::error::{CliError, CliResult};
use crate::tree::{CommandTree, Selection, VERBOSE_ARG};

const MISSING_CREDENTIAL: &str = "No credential configured. Run 'flagdeck setup' or set \
FLAGDECK_API_USER and FLAGDECK_API_PASS.";

/// Everything a middleware step or handler can see about the invocation.
#[derive(Debug, Clone, Copy)]
pub struct Invocation<'a> {
    /// Matches of the root command.
    pub matches: &'a ArgMatches,
    /// Command chosen by the command line.
    pub selection: Selection<'a>,
    /// Shared execution context.
    pub context: &'a ExecutionContext,
    /// Cancellation signal for the whole invocation.
    pub cancel: &'a Cancellation,
    /// Tree the selection was resolved against.
    pub tree: &'a CommandTree,
}

#[async_trait]
/// One step of the chain.
pub trait Middleware: Send + Sync {
    /// Run the step, calling `next.run(invocation)` to continue.
    async fn handle(&self, invocation: &Invocation<'_>, next: Next<'_>) -> CliResult<()>;
}

/// Remaining steps of the chain.
#[derive(Clone, Copy)]
pub struct Next<'c> {
    remaining: &'c [Box<dyn Middleware>],
}

impl<'c> Next<'c> {
    /// Handle positioned at the start of `chain`.
    #[must_use]
    pub const fn new(chain: &'c [Box<dyn Middleware>]) -> Self {
        Self { remaining: chain }
    }

    /// Continue with the next step, or dispatch when none remain.
    ///
    /// # Errors
    ///
    /// Propagates the first error produced by a step or the handler.
    pub async fn run(self, invocation: &Invocation<'_>) -> CliResult<()> {
        match self.remaining.split_first() {
            Some((step, rest)) => step.handle(invocation, Next { remaining: rest }).await,
            None => dispatch(invocation).await,
        }
    }
}

/// Default chain: verbosity, then credential installation.
#[must_use]
pub fn default_chain() -> Vec<Box<dyn Middleware>> {
    vec![Box::new(VerbosityStep), Box::new(CredentialStep)]
}

/// Resolves the global verbose flag onto the output sink.
#[derive(Debug, Clone, Copy, Default)]
pub struct VerbosityStep;

#[async_trait]
impl Middleware for VerbosityStep {
    async fn handle(&self, invocation: &Invocation<'_>, next: Next<'_>) -> CliResult<()> {
        let verbose = flag_set(invocation.selection.matches(), VERBOSE_ARG)
            || flag_set(invocation.matches, VERBOSE_ARG);
        invocation.context.output().set_verbose(verbose);
        next.run(invocation).await
    }
}

/// Loads configuration and installs the API host and credential.
///
/// Commands that require authentication never reach dispatch without a
/// credential.
#[derive(Debug, Clone, Copy, Default)]
pub struct CredentialStep;

#[async_trait]
impl Middleware for CredentialStep {
    #[instrument(name = "middleware.credential", skip_all)]
    async fn handle(&self, invocation: &Invocation<'_>, next: Next<'_>) -> CliResult<()> {
        let context = invocation.context;
        let config = tokio::select! {
            biased;
            () = invocation.cancel.cancelled() => return Err(CliError::Cancelled),
            loaded = context.config().get_config() => loaded?,
        };

        context.install_api_host(config.api_url()?)?;
        match config.auth {
            Some(credential) => {
                debug!(username = %credential.username, "credential installed");
                context.install_credential(credential)?;
            }
            None if needs_credential(invocation) => {
                return Err(CliError::validation(MISSING_CREDENTIAL));
            }
            None => debug!("no credential configured"),
        }

        next.run(invocation).await
    }
}

fn needs_credential(invocation: &Invocation<'_>) -> bool {
    let tree = invocation.tree;
    tree.requires_auth(&invocation.selection) && tree.handler(&invocation.selection).is_some()
}

async fn dispatch(invocation: &Invocation<'_>) -> CliResult<()> {
    let tree = invocation.tree;
    let Some(handler) = tree.handler(&invocation.selection) else {
        return Err(tree.not_runnable(&invocation.selection));
    };

    debug!(command = %tree.selection_path(&invocation.selection), "dispatching");
    handler(
        invocation.selection.matches(),
        invocation.context,
        invocation.cancel,
    )
    .await
}

fn flag_set(matches: &ArgMatches, name: &str) -> bool {
    matches
        .try_get_one::<bool>(name)
        .ok()
        .flatten()
        .copied()
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use flagdeck_config::{CliConfig, Credential, MemoryConfigProvider};

    use crate::cancel::CancellationSource;
    use crate::output::{BufferedOutput, OutputSink};
    use crate::pipeline::{ReqwestTransport, RequestPipeline, RetryPolicy};
    use crate::tree::{
        Affinity, CommandDescriptor, CommandTreeBuilder, HandlerFuture, InlineCommand,
    };

    fn report_credential<'a>(
        _args: &'a ArgMatches,
        ctx: &'a ExecutionContext,
        _cancel: &'a Cancellation,
    ) -> HandlerFuture<'a> {
        Box::pin(async move {
            let user = ctx
                .credential()
                .map_or("<none>", |credential| credential.username.as_str());
            ctx.output().write_line(&format!("dispatched as {user}"));
            Ok(())
        })
    }

    fn tree() -> CommandTree {
        let mut builder = CommandTreeBuilder::new();
        builder
            .register(CommandDescriptor::root("flagdeck", "Root"))
            .register(
                CommandDescriptor::new("tag", "Manage tags", Affinity::ChildOf(&[]))
                    .inline(InlineCommand::new("update", "Update a tag", report_credential)),
            )
            .register(
                CommandDescriptor::new("cat", "Mascot", Affinity::ChildOf(&[]))
                    .handler(report_credential)
                    .without_auth(),
            );
        builder.build().expect("valid tree")
    }

    fn context(config: CliConfig, output: &Arc<BufferedOutput>) -> ExecutionContext {
        let transport = ReqwestTransport::new(std::time::Duration::from_secs(1)).expect("transport");
        ExecutionContext::new(
            output.clone(),
            Arc::new(MemoryConfigProvider::new(config)),
            RequestPipeline::new(Arc::new(transport), RetryPolicy::default()),
        )
    }

    async fn invoke(
        args: &[&str],
        config: CliConfig,
        cancel: &Cancellation,
    ) -> (CliResult<()>, Arc<BufferedOutput>) {
        let tree = tree();
        let matches = tree
            .to_clap()
            .try_get_matches_from(args)
            .expect("valid arguments");
        let selection = tree.resolve(&matches).expect("resolvable");
        let output = Arc::new(BufferedOutput::new());
        let ctx = context(config, &output);
        let invocation = Invocation {
            matches: &matches,
            selection,
            context: &ctx,
            cancel,
            tree: &tree,
        };
        let chain = default_chain();
        let result = Next::new(&chain).run(&invocation).await;
        (result, output)
    }

    fn authenticated() -> CliConfig {
        CliConfig {
            auth: Some(Credential::new("alice", "secret")),
            ..CliConfig::default()
        }
    }

    #[tokio::test]
    async fn credential_is_installed_before_dispatch() {
        let (result, output) = invoke(
            &["flagdeck", "tag", "update", "--verbose"],
            authenticated(),
            &Cancellation::never(),
        )
        .await;
        assert!(result.is_ok());
        assert_eq!(output.stdout(), "dispatched as alice\n");
        assert!(output.is_verbose());
    }

    #[tokio::test]
    async fn missing_credential_stops_before_dispatch() {
        let (result, output) = invoke(
            &["flagdeck", "tag", "update"],
            CliConfig::default(),
            &Cancellation::never(),
        )
        .await;
        assert!(matches!(result, Err(CliError::Validation(_))));
        assert!(output.stdout().is_empty());
    }

    #[tokio::test]
    async fn commands_without_auth_run_without_credential() {
        let (result, output) =
            invoke(&["flagdeck", "cat"], CliConfig::default(), &Cancellation::never()).await;
        assert!(result.is_ok());
        assert_eq!(output.stdout(), "dispatched as <none>\n");
    }

    #[tokio::test]
    async fn cancelled_invocation_never_dispatches() {
        let source = CancellationSource::new();
        source.cancel();
        let (result, output) =
            invoke(&["flagdeck", "cat"], authenticated(), &source.signal()).await;
        assert!(matches!(result, Err(CliError::Cancelled)));
        assert!(output.stdout().is_empty());
    }

    #[tokio::test]
    async fn group_without_subcommand_reports_help() {
        let (result, _output) =
            invoke(&["flagdeck", "tag"], CliConfig::default(), &Cancellation::never()).await;
        assert!(matches!(result, Err(CliError::Configuration { .. })));
    }
}
