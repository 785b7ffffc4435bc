use clap::ArgMatches;
use flagdeck_api_models::{FlagValueRequest, PercentageItemRequest, SettingType};

use super::args;
use super::flag::{flag_id, flag_id_option};
use super::flag_value::{ENVIRONMENT_ID_ARG, environment_option, load_writable, parse_value};
use crate::api::ApiClient;
use crate::cancel::Cancellation;
use crate::context::ExecutionContext;
use crate::error::{CliError, CliResult};
use crate::tree::{Affinity, ArgumentSpec, CommandDescriptor, HandlerFuture, InlineCommand};

const RULES_ARG: &str = "rules";

pub(crate) fn descriptor() -> CommandDescriptor {
    CommandDescriptor::new(
        "percentage",
        "Manage percentage rollout of a flag",
        Affinity::ChildOf(&["flag"]),
    )
    .alias("%")
    .inline(
        InlineCommand::new("update", "Replace the percentage rules", update)
            .alias("up")
            .option(flag_id_option("Flag to update"))
            .option(environment_option("Environment to update").required())
            .argument(
                ArgumentSpec::new(RULES_ARG, "Rules as <percentage>:<value>, e.g. 30:true 70:false")
                    .many(),
            ),
    )
    .inline(
        InlineCommand::new("clear", "Remove every percentage rule", clear)
            .alias("clr")
            .option(flag_id_option("Flag to clear"))
            .option(environment_option("Environment to clear").required()),
    )
}

/// Parse `<percentage>:<value>` rules; the percentages must add up to 100.
fn parse_rules(setting_type: SettingType, raw: &[&str]) -> CliResult<Vec<PercentageItemRequest>> {
    let mut total = 0_u32;
    let mut items = Vec::with_capacity(raw.len());
    for rule in raw {
        let (percentage, value) = rule.split_once(':').ok_or_else(|| {
            CliError::validation(format!(
                "Invalid rule '{rule}', expected <percentage>:<value>."
            ))
        })?;
        let percentage: u8 = percentage
            .trim()
            .parse()
            .ok()
            .filter(|percentage| *percentage <= 100)
            .ok_or_else(|| {
                CliError::validation(format!(
                    "Invalid percentage in '{rule}', expected a number between 0 and 100."
                ))
            })?;
        total += u32::from(percentage);
        items.push(PercentageItemRequest {
            percentage,
            value: parse_value(setting_type, value)?,
        });
    }
    if total != 100 {
        return Err(CliError::validation(format!(
            "Percentages must add up to 100, got {total}."
        )));
    }
    Ok(items)
}

fn update<'a>(
    args: &'a ArgMatches,
    ctx: &'a ExecutionContext,
    cancel: &'a Cancellation,
) -> HandlerFuture<'a> {
    Box::pin(async move {
        let flag_id = flag_id(args)?;
        let environment_id = args::required(args, ENVIRONMENT_ID_ARG)?;
        let rules = args::many(args, RULES_ARG);

        let client = ApiClient::new(ctx, cancel)?;
        let (current, setting_type) = load_writable(&client, environment_id, flag_id).await?;
        let mut request = FlagValueRequest::from(&current);
        request.rollout_percentage_items = parse_rules(setting_type, &rules)?;

        client
            .replace_flag_value(environment_id, flag_id, &request, "Updating Percentage Rules")
            .await
            .map(|_| ())
    })
}

fn clear<'a>(
    args: &'a ArgMatches,
    ctx: &'a ExecutionContext,
    cancel: &'a Cancellation,
) -> HandlerFuture<'a> {
    Box::pin(async move {
        let flag_id = flag_id(args)?;
        let environment_id = args::required(args, ENVIRONMENT_ID_ARG)?;

        let client = ApiClient::new(ctx, cancel)?;
        let (current, _) = load_writable(&client, environment_id, flag_id).await?;
        let mut request = FlagValueRequest::from(&current);
        request.rollout_percentage_items.clear();

        client
            .replace_flag_value(environment_id, flag_id, &request, "Clearing Percentage Rules")
            .await
            .map(|_| ())
    })
}
