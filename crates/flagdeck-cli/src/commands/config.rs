use clap::ArgMatches;
use flagdeck_api_models::{Config, ConfigRequest};

use super::{args, json_option, or_dash, print_list, product_filter, product_scope};
use crate::api::ApiClient;
use crate::cancel::Cancellation;
use crate::context::ExecutionContext;
use crate::error::CliError;
use crate::tree::{Affinity, CommandDescriptor, HandlerFuture, InlineCommand, OptionSpec};

const PRODUCT_ID_ARG: &str = "product-id";
const CONFIG_ID_ARG: &str = "config-id";
const NAME_ARG: &str = "name";
const DESCRIPTION_ARG: &str = "description";

pub(crate) fn descriptor() -> CommandDescriptor {
    CommandDescriptor::new("config", "Manage configs", Affinity::ChildOf(&[]))
        .alias("c")
        .inline(
            InlineCommand::new("ls", "List configs", list)
                .option(product_filter())
                .option(json_option()),
        )
        .inline(
            InlineCommand::new("create", "Create a config", create)
                .alias("cr")
                .option(
                    OptionSpec::value(PRODUCT_ID_ARG, "Product owning the config")
                        .short('p')
                        .required(),
                )
                .option(OptionSpec::value(NAME_ARG, "Config name").short('n').required())
                .option(OptionSpec::value(DESCRIPTION_ARG, "Config description").short('d')),
        )
        .inline(
            InlineCommand::new("update", "Rename or describe a config", update)
                .alias("up")
                .option(
                    OptionSpec::value(CONFIG_ID_ARG, "Config to update")
                        .short('i')
                        .required(),
                )
                .option(OptionSpec::value(NAME_ARG, "New name").short('n'))
                .option(OptionSpec::value(DESCRIPTION_ARG, "New description").short('d')),
        )
        .inline(
            InlineCommand::new("rm", "Delete a config", remove).option(
                OptionSpec::value(CONFIG_ID_ARG, "Config to delete")
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
        let mut configs = Vec::new();
        for product_id in product_scope(&client, args).await? {
            configs.extend(client.list_configs(&product_id).await?);
        }
        print_list(
            args,
            ctx,
            &configs,
            &["ID", "NAME", "DESCRIPTION", "PRODUCT"],
            |config: &Config| {
                vec![
                    config.config_id.clone(),
                    config.name.clone(),
                    or_dash(config.description.as_deref()),
                    or_dash(config.product.as_ref().map(|product| product.name.as_str())),
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
        let request = ConfigRequest {
            name: args::required(args, NAME_ARG)?.to_string(),
            description: args::optional(args, DESCRIPTION_ARG).map(str::to_string),
        };
        let config = ApiClient::new(ctx, cancel)?
            .create_config(product_id, &request)
            .await?;
        ctx.output().write_line(&config.config_id);
        Ok(())
    })
}

fn update<'a>(
    args: &'a ArgMatches,
    ctx: &'a ExecutionContext,
    cancel: &'a Cancellation,
) -> HandlerFuture<'a> {
    Box::pin(async move {
        let config_id = args::required(args, CONFIG_ID_ARG)?;
        let name = args::optional(args, NAME_ARG);
        let description = args::optional(args, DESCRIPTION_ARG);
        if name.is_none() && description.is_none() {
            return Err(CliError::validation(
                "Nothing to update, pass --name or --description.",
            ));
        }

        let client = ApiClient::new(ctx, cancel)?;
        let current = client.get_config(config_id).await?;
        let request = ConfigRequest {
            name: name.map_or(current.name, str::to_string),
            description: description.map(str::to_string).or(current.description),
        };
        client.update_config(config_id, &request).await
    })
}

fn remove<'a>(
    args: &'a ArgMatches,
    ctx: &'a ExecutionContext,
    cancel: &'a Cancellation,
) -> HandlerFuture<'a> {
    Box::pin(async move {
        let config_id = args::required(args, CONFIG_ID_ARG)?;
        ApiClient::new(ctx, cancel)?.delete_config(config_id).await
    })
}
