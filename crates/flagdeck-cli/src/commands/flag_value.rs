use std::fmt::Write as _;

use clap::ArgMatches;
use flagdeck_api_models::{FlagValue, FlagValueRequest, SettingType};
use serde_json::Value;

use super::flag::{flag_id, flag_id_option};
use super::{JSON_ARG, args, json_option};
use crate::api::ApiClient;
use crate::cancel::Cancellation;
use crate::context::ExecutionContext;
use crate::error::{CliError, CliResult};
use crate::output::render_json;
use crate::tree::{Affinity, CommandDescriptor, HandlerFuture, InlineCommand, OptionSpec};

pub(crate) const ENVIRONMENT_ID_ARG: &str = "environment-id";
pub(crate) const FLAG_VALUE_ARG: &str = "flag-value";

pub(crate) fn environment_option(about: &'static str) -> OptionSpec {
    OptionSpec::value(ENVIRONMENT_ID_ARG, about).short('e')
}

pub(crate) fn descriptor() -> CommandDescriptor {
    CommandDescriptor::new(
        "value",
        "Show and change flag values per environment",
        Affinity::ChildOf(&["flag"]),
    )
    .alias("v")
    .inline(
        InlineCommand::new("show", "Show the value, rules and rollout of a flag", show)
            .alias("sh")
            .option(flag_id_option("Flag to show"))
            .option(environment_option("Only show this environment"))
            .option(json_option()),
    )
    .inline(
        InlineCommand::new("update", "Change the served value of a flag", update)
            .alias("up")
            .option(flag_id_option("Flag to update"))
            .option(environment_option("Environment to update").required())
            .option(
                OptionSpec::value(FLAG_VALUE_ARG, "New value, parsed by the flag's type")
                    .short('f')
                    .required(),
            ),
    )
}

/// Parse a textual value according to the flag's type.
pub(crate) fn parse_value(setting_type: SettingType, raw: &str) -> CliResult<Value> {
    setting_type.parse_value(raw).ok_or_else(|| {
        CliError::validation(format!(
            "'{raw}' is not a valid {} value.",
            setting_type.as_str()
        ))
    })
}

/// Current value of a flag in one environment, with the flag's type.
///
/// Fails when the credential may only read the value, so callers can go
/// straight into a read-modify-write.
pub(crate) async fn load_writable(
    client: &ApiClient<'_>,
    environment_id: &str,
    flag_id: i64,
) -> CliResult<(FlagValue, SettingType)> {
    let current = client.get_flag_value(environment_id, flag_id).await?;
    if current.read_only {
        return Err(CliError::validation(format!(
            "Flag {flag_id} is read-only in environment {environment_id}."
        )));
    }
    let setting_type = match &current.setting {
        Some(flag) => flag.setting_type,
        None => client.get_flag(flag_id).await?.setting_type,
    };
    Ok((current, setting_type))
}

fn show<'a>(
    args: &'a ArgMatches,
    ctx: &'a ExecutionContext,
    cancel: &'a Cancellation,
) -> HandlerFuture<'a> {
    Box::pin(async move {
        let flag_id = flag_id(args)?;
        let client = ApiClient::new(ctx, cancel)?;

        let environments = match args::optional(args, ENVIRONMENT_ID_ARG) {
            Some(environment_id) => vec![(environment_id.to_string(), None)],
            None => {
                let flag = client.get_flag(flag_id).await?;
                let config_id = flag.config_id.ok_or_else(|| {
                    CliError::validation("Cannot resolve the flag's environments, pass --environment-id.")
                })?;
                let product_id = client
                    .get_config(&config_id)
                    .await?
                    .product
                    .map(|product| product.product_id)
                    .ok_or_else(|| {
                        CliError::validation(
                            "Cannot resolve the flag's environments, pass --environment-id.",
                        )
                    })?;
                client
                    .list_environments(&product_id)
                    .await?
                    .into_iter()
                    .map(|environment| (environment.environment_id, Some(environment.name)))
                    .collect()
            }
        };

        let mut values = Vec::with_capacity(environments.len());
        for (environment_id, name) in environments {
            let value = client.get_flag_value(&environment_id, flag_id).await?;
            values.push((environment_id, name, value));
        }

        let output = ctx.output();
        if args::flag(args, JSON_ARG) {
            let documents: Vec<&FlagValue> = values.iter().map(|(_, _, value)| value).collect();
            output.write_line(&render_json(&documents)?);
            return Ok(());
        }
        for (index, (environment_id, name, value)) in values.iter().enumerate() {
            if index > 0 {
                output.line();
            }
            match name {
                Some(name) => output.write_line(&format!("{name} ({environment_id})")),
                None => output.write_line(&format!("Environment {environment_id}")),
            }
            output.write(&render_value(value));
        }
        Ok(())
    })
}

fn update<'a>(
    args: &'a ArgMatches,
    ctx: &'a ExecutionContext,
    cancel: &'a Cancellation,
) -> HandlerFuture<'a> {
    Box::pin(async move {
        let flag_id = flag_id(args)?;
        let environment_id = args::required(args, ENVIRONMENT_ID_ARG)?;
        let raw = args::required(args, FLAG_VALUE_ARG)?;

        let client = ApiClient::new(ctx, cancel)?;
        let (current, setting_type) = load_writable(&client, environment_id, flag_id).await?;
        let mut request = FlagValueRequest::from(&current);
        request.value = parse_value(setting_type, raw)?;

        client
            .replace_flag_value(environment_id, flag_id, &request, "Updating Flag Value")
            .await
            .map(|_| ())
    })
}

/// Human-readable rendering of a value with its rules.
pub(crate) fn render_value(value: &FlagValue) -> String {
    let mut rendered = format!("  Default value: {}\n", display_value(&value.value));
    if !value.rollout_rules.is_empty() {
        rendered.push_str("  Targeting rules:\n");
        for (index, rule) in value.rollout_rules.iter().enumerate() {
            let _ = writeln!(
                rendered,
                "    {}. When {} {} '{}' then {}",
                index + 1,
                rule.comparison_attribute,
                rule.comparator,
                rule.comparison_value,
                display_value(&rule.value)
            );
        }
    }
    if !value.rollout_percentage_items.is_empty() {
        rendered.push_str("  Percentage rules:\n");
        for item in &value.rollout_percentage_items {
            let _ = writeln!(rendered, "    {}%: {}", item.percentage, display_value(&item.value));
        }
    }
    rendered
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
