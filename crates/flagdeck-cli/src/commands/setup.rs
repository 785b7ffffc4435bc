use clap::ArgMatches;
use flagdeck_config::model::normalize_api_host;
use flagdeck_config::{CliConfig, Credential};

use super::args;
use crate::api::ApiClient;
use crate::cancel::Cancellation;
use crate::context::ExecutionContext;
use crate::error::CliError;
use crate::output::Style;
use crate::tree::{Affinity, CommandDescriptor, HandlerFuture, OptionSpec};

const API_HOST_ARG: &str = "api-host";
const USERNAME_ARG: &str = "username";
const PASSWORD_ARG: &str = "password";

pub(crate) fn descriptor() -> CommandDescriptor {
    CommandDescriptor::new(
        "setup",
        "Store the API host and credential used by every other command",
        Affinity::ChildOf(&[]),
    )
    .option(
        OptionSpec::value(API_HOST_ARG, "Management API host; defaults to the stored host")
            .short('H'),
    )
    .option(OptionSpec::value(USERNAME_ARG, "Basic auth user name").short('u').required())
    .option(OptionSpec::value(PASSWORD_ARG, "Basic auth password").short('p').required())
    .handler(run)
    .without_auth()
}

fn run<'a>(
    args: &'a ArgMatches,
    ctx: &'a ExecutionContext,
    cancel: &'a Cancellation,
) -> HandlerFuture<'a> {
    Box::pin(async move {
        let credential = Credential::new(
            args::required(args, USERNAME_ARG)?,
            args::required(args, PASSWORD_ARG)?,
        );
        let current = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(CliError::Cancelled),
            loaded = ctx.config().get_config() => loaded?,
        };
        let host = normalize_api_host(args::optional(args, API_HOST_ARG).unwrap_or(&current.api_host))?;

        let client = ApiClient::with_target(ctx, cancel, host.clone(), credential.clone());
        let me = client
            .with_progress("Verifying credentials", client.me())
            .await?;

        let config = CliConfig {
            api_host: host.to_string(),
            auth: Some(credential),
        };
        tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(CliError::Cancelled),
            saved = ctx.config().save_config(&config) => saved?,
        }

        let output = ctx.output();
        output.write("Setup complete. Authenticated as ");
        output.write_styled(&me.email, Style::Cyan);
        output.write_line(".");
        output.verbose(&format!("API host: {host}"));
        Ok(())
    })
}
