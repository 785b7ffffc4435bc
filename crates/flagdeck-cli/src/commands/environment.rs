use clap::ArgMatches;
use flagdeck_api_models::{Environment, EnvironmentRequest};

use super::{args, json_option, or_dash, print_list, product_filter, product_scope};
use crate::api::ApiClient;
use crate::cancel::Cancellation;
use crate::context::ExecutionContext;
use crate::error::CliError;
use crate::tree::{Affinity, CommandDescriptor, HandlerFuture, InlineCommand, OptionSpec};

const PRODUCT_ID_ARG: &str = "product-id";
const ENVIRONMENT_ID_ARG: &str = "environment-id";
const NAME_ARG: &str = "name";
const COLOR_ARG: &str = "color";
const DESCRIPTION_ARG: &str = "description";

pub(crate) fn descriptor() -> CommandDescriptor {
    CommandDescriptor::new("environment", "Manage environments", Affinity::ChildOf(&[]))
        .alias("e")
        .inline(
            InlineCommand::new("ls", "List environments", list)
                .option(product_filter())
                .option(json_option()),
        )
        .inline(
            InlineCommand::new("create", "Create an environment", create)
                .alias("cr")
                .option(
                    OptionSpec::value(PRODUCT_ID_ARG, "Product owning the environment")
                        .short('p')
                        .required(),
                )
                .option(OptionSpec::value(NAME_ARG, "Environment name").short('n').required())
                .option(OptionSpec::value(COLOR_ARG, "Display color").short('c'))
                .option(OptionSpec::value(DESCRIPTION_ARG, "Environment description").short('d')),
        )
        .inline(
            InlineCommand::new("update", "Change an environment", update)
                .alias("up")
                .option(
                    OptionSpec::value(ENVIRONMENT_ID_ARG, "Environment to update")
                        .short('i')
                        .required(),
                )
                .option(OptionSpec::value(NAME_ARG, "New name").short('n'))
                .option(OptionSpec::value(COLOR_ARG, "New display color").short('c'))
                .option(OptionSpec::value(DESCRIPTION_ARG, "New description").short('d')),
        )
        .inline(
            InlineCommand::new("rm", "Delete an environment", remove).option(
                OptionSpec::value(ENVIRONMENT_ID_ARG, "Environment to delete")
                    .short('i')
                    .required(),
            ),
        )
}

fn list<'a>(
    args: &'a ArgMatches,
    ctx: &'a ExecutionContext,
    cancel: &'a Cancellation,
) -> HandlerFuture<'a> {
    Box::pin(async move {
        let client = ApiClient::new(ctx, cancel)?;
        let mut environments = Vec::new();
        for product_id in product_scope(&client, args).await? {
            environments.extend(client.list_environments(&product_id).await?);
        }
        print_list(
            args,
            ctx,
            &environments,
            &["ID", "NAME", "COLOR", "DESCRIPTION", "PRODUCT"],
            |environment: &Environment| {
                vec![
                    environment.environment_id.clone(),
                    environment.name.clone(),
                    or_dash(environment.color.as_deref()),
                    or_dash(environment.description.as_deref()),
                    or_dash(environment.product.as_ref().map(|product| product.name.as_str())),
                ]
            },
        )
    })
}

fn create<'a>(
    args: &'a ArgMatches,
    ctx: &'a ExecutionContext,
    cancel: &'a Cancellation,
) -> HandlerFuture<'a> {
    Box::pin(async move {
        let product_id = args::required(args, PRODUCT_ID_ARG)?;
        let request = EnvironmentRequest {
            name: args::required(args, NAME_ARG)?.to_string(),
            color: args::optional(args, COLOR_ARG).map(str::to_string),
            description: args::optional(args, DESCRIPTION_ARG).map(str::to_string),
        };
        let environment = ApiClient::new(ctx, cancel)?
            .create_environment(product_id, &request)
            .await?;
        ctx.output().write_line(&environment.environment_id);
        Ok(())
    })
}

fn update<'a>(
    args: &'a ArgMatches,
    ctx: &'a ExecutionContext,
    cancel: &'a Cancellation,
) -> HandlerFuture<'a> {
    Box::pin(async move {
        let environment_id = args::required(args, ENVIRONMENT_ID_ARG)?;
        let name = args::optional(args, NAME_ARG);
        let color = args::optional(args, COLOR_ARG);
        let description = args::optional(args, DESCRIPTION_ARG);
        if name.is_none() && color.is_none() && description.is_none() {
            return Err(CliError::validation(
                "Nothing to update, pass --name, --color or --description.",
            ));
        }

        let client = ApiClient::new(ctx, cancel)?;
        let current = client.get_environment(environment_id).await?;
        let request = EnvironmentRequest {
            name: name.map_or(current.name, str::to_string),
            color: color.map(str::to_string).or(current.color),
            description: description.map(str::to_string).or(current.description),
        };
        client.update_environment(environment_id, &request).await
    })
}

fn remove<'a>(
    args: &'a ArgMatches,
    ctx: &'a ExecutionContext,
    cancel: &'a Cancellation,
) -> HandlerFuture<'a> {
    Box::pin(async move {
        let environment_id = args::required(args, ENVIRONMENT_ID_ARG)?;
        ApiClient::new(ctx, cancel)?
            .delete_environment(environment_id)
            .await
    })
}
