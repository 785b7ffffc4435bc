use clap::ArgMatches;
use flagdeck_api_models::SdkKeys;
use serde::Serialize;

use super::{args, json_option, or_dash, print_list};
use crate::api::ApiClient;
use crate::cancel::Cancellation;
use crate::context::ExecutionContext;
use crate::error::CliResult;
use crate::tree::{Affinity, CommandDescriptor, HandlerFuture, OptionSpec};

const CONFIG_ID_ARG: &str = "config-id";
const ENVIRONMENT_ID_ARG: &str = "environment-id";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct KeyRow {
    config_id: String,
    config_name: String,
    environment_id: String,
    environment_name: String,
    keys: SdkKeys,
}

pub(crate) fn descriptor() -> CommandDescriptor {
    CommandDescriptor::new(
        "sdk-key",
        "List SDK keys per config and environment",
        Affinity::ChildOf(&[]),
    )
    .alias("k")
    .option(OptionSpec::value(CONFIG_ID_ARG, "Only show keys of this config").short('c'))
    .option(OptionSpec::value(ENVIRONMENT_ID_ARG, "Only show keys of this environment").short('e'))
    .option(json_option())
    .handler(run)
}

fn run<'a>(
    args: &'a ArgMatches,
    ctx: &'a ExecutionContext,
    cancel: &'a Cancellation,
) -> HandlerFuture<'a> {
    Box::pin(async move {
        let client = ApiClient::new(ctx, cancel)?;
        let rows = collect(&client, args).await?;
        print_list(
            args,
            ctx,
            &rows,
            &["CONFIG", "ENVIRONMENT", "PRIMARY", "SECONDARY"],
            |row: &KeyRow| {
                vec![
                    row.config_name.clone(),
                    row.environment_name.clone(),
                    row.keys.primary.clone(),
                    or_dash(row.keys.secondary.as_deref()),
                ]
            },
        )
    })
}

async fn collect(client: &ApiClient<'_>, args: &ArgMatches) -> CliResult<Vec<KeyRow>> {
    let config_filter = args::optional(args, CONFIG_ID_ARG);
    let environment_filter = args::optional(args, ENVIRONMENT_ID_ARG);

    if let (Some(config_id), Some(environment_id)) = (config_filter, environment_filter) {
        let keys = client.sdk_keys(config_id, environment_id).await?;
        return Ok(vec![KeyRow {
            config_id: config_id.to_string(),
            config_name: config_id.to_string(),
            environment_id: environment_id.to_string(),
            environment_name: environment_id.to_string(),
            keys,
        }]);
    }

    let mut rows = Vec::new();
    for product in client.list_products().await? {
        let configs = client.list_configs(&product.product_id).await?;
        let environments = client.list_environments(&product.product_id).await?;
        for config in &configs {
            if config_filter.is_some_and(|id| id != config.config_id) {
                continue;
            }
            for environment in &environments {
                if environment_filter.is_some_and(|id| id != environment.environment_id) {
                    continue;
                }
                let keys = client
                    .sdk_keys(&config.config_id, &environment.environment_id)
                    .await?;
                rows.push(KeyRow {
                    config_id: config.config_id.clone(),
                    config_name: config.name.clone(),
                    environment_id: environment.environment_id.clone(),
                    environment_name: environment.name.clone(),
                    keys,
                });
            }
        }
    }
    Ok(rows)
}
