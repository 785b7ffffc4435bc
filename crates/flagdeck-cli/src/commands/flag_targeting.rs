use clap::ArgMatches;
use flagdeck_api_models::{FlagValueRequest, TargetingRuleRequest};

use super::args;
use super::flag::{flag_id, flag_id_option};
use super::flag_value::{
    ENVIRONMENT_ID_ARG, FLAG_VALUE_ARG, environment_option, load_writable, parse_value,
};
use crate::api::ApiClient;
use crate::cancel::Cancellation;
use crate::context::ExecutionContext;
use crate::error::{CliError, CliResult};
use crate::tree::{Affinity, CommandDescriptor, HandlerFuture, InlineCommand, OptionSpec};

const ATTRIBUTE_ARG: &str = "attribute";
const COMPARATOR_ARG: &str = "comparator";
const COMPARE_TO_ARG: &str = "compare-to";
const POSITION_ARG: &str = "position";
const FROM_ARG: &str = "from";
const TO_ARG: &str = "to";

const COMPARATORS: [&str; 18] = [
    "isOneOf",
    "isNotOneOf",
    "contains",
    "doesNotContain",
    "semVerIsOneOf",
    "semVerIsNotOneOf",
    "semVerLess",
    "semVerLessOrEquals",
    "semVerGreater",
    "semVerGreaterOrEquals",
    "numberEquals",
    "numberDoesNotEqual",
    "numberLess",
    "numberLessOrEquals",
    "numberGreater",
    "numberGreaterOrEquals",
    "sensitiveIsOneOf",
    "sensitiveIsNotOneOf",
];

pub(crate) fn descriptor() -> CommandDescriptor {
    CommandDescriptor::new(
        "targeting",
        "Manage targeting rules of a flag",
        Affinity::ChildOf(&["flag"]),
    )
    .alias("t")
    .inline(
        rule_options(InlineCommand::new("create", "Append a targeting rule", create).alias("cr"), true),
    )
    .inline(
        rule_options(
            InlineCommand::new("update", "Change a targeting rule", update).alias("up"),
            false,
        )
        .option(position_option(POSITION_ARG, "Position of the rule, starting at 1").short('p')),
    )
    .inline(
        InlineCommand::new("rm", "Delete a targeting rule", remove)
            .option(flag_id_option("Flag owning the rule"))
            .option(environment_option("Environment of the rule").required())
            .option(position_option(POSITION_ARG, "Position of the rule, starting at 1").short('p')),
    )
    .inline(
        InlineCommand::new("move", "Move a targeting rule to another position", move_rule)
            .alias("mv")
            .option(flag_id_option("Flag owning the rule"))
            .option(environment_option("Environment of the rule").required())
            .option(position_option(FROM_ARG, "Current position of the rule"))
            .option(position_option(TO_ARG, "New position of the rule")),
    )
}

fn rule_options(command: InlineCommand, required: bool) -> InlineCommand {
    let mark = |option: OptionSpec| if required { option.required() } else { option };
    command
        .option(flag_id_option("Flag owning the rule"))
        .option(environment_option("Environment of the rule").required())
        .option(mark(
            OptionSpec::value(ATTRIBUTE_ARG, "User attribute to compare").short('a'),
        ))
        .option(mark(
            OptionSpec::value(COMPARATOR_ARG, "Comparator, e.g. contains or semVerLess").short('c'),
        ))
        .option(mark(
            OptionSpec::value(COMPARE_TO_ARG, "Value the attribute is compared to").short('t'),
        ))
        .option(mark(
            OptionSpec::value(FLAG_VALUE_ARG, "Value served when the rule matches").short('f'),
        ))
}

fn position_option(name: &'static str, about: &'static str) -> OptionSpec {
    OptionSpec::value(name, about).required()
}

/// Canonical spelling of a comparator, matched case-insensitively.
fn parse_comparator(raw: &str) -> CliResult<&'static str> {
    COMPARATORS
        .iter()
        .copied()
        .find(|known| known.eq_ignore_ascii_case(raw.trim()))
        .ok_or_else(|| {
            CliError::validation(format!(
                "Invalid comparator '{raw}', expected one of: {}.",
                COMPARATORS.join(", ")
            ))
        })
}

fn create<'a>(
    args: &'a ArgMatches,
    ctx: &'a ExecutionContext,
    cancel: &'a Cancellation,
) -> HandlerFuture<'a> {
    Box::pin(async move {
        let flag_id = flag_id(args)?;
        let environment_id = args::required(args, ENVIRONMENT_ID_ARG)?;
        let comparator = parse_comparator(args::required(args, COMPARATOR_ARG)?)?;

        let client = ApiClient::new(ctx, cancel)?;
        let (current, setting_type) = load_writable(&client, environment_id, flag_id).await?;
        let mut request = FlagValueRequest::from(&current);
        request.rollout_rules.push(TargetingRuleRequest {
            comparison_attribute: args::required(args, ATTRIBUTE_ARG)?.to_string(),
            comparator: comparator.to_string(),
            comparison_value: args::required(args, COMPARE_TO_ARG)?.to_string(),
            value: parse_value(setting_type, args::required(args, FLAG_VALUE_ARG)?)?,
        });

        client
            .replace_flag_value(environment_id, flag_id, &request, "Creating Targeting Rule")
            .await
            .map(|_| ())
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
        let attribute = args::optional(args, ATTRIBUTE_ARG);
        let comparator = args::optional(args, COMPARATOR_ARG)
            .map(parse_comparator)
            .transpose()?;
        let compare_to = args::optional(args, COMPARE_TO_ARG);
        let raw_value = args::optional(args, FLAG_VALUE_ARG);
        if attribute.is_none() && comparator.is_none() && compare_to.is_none() && raw_value.is_none()
        {
            return Err(CliError::validation(
                "Nothing to update, pass --attribute, --comparator, --compare-to or --flag-value.",
            ));
        }

        let client = ApiClient::new(ctx, cancel)?;
        let (current, setting_type) = load_writable(&client, environment_id, flag_id).await?;
        let mut request = FlagValueRequest::from(&current);
        let index = args::position(args, POSITION_ARG, request.rollout_rules.len())?;
        let rule = &mut request.rollout_rules[index];
        if let Some(attribute) = attribute {
            rule.comparison_attribute = attribute.to_string();
        }
        if let Some(comparator) = comparator {
            rule.comparator = comparator.to_string();
        }
        if let Some(compare_to) = compare_to {
            rule.comparison_value = compare_to.to_string();
        }
        if let Some(raw) = raw_value {
            rule.value = parse_value(setting_type, raw)?;
        }

        client
            .replace_flag_value(environment_id, flag_id, &request, "Updating Targeting Rule")
            .await
            .map(|_| ())
    })
}

fn remove<'a>(
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
        let index = args::position(args, POSITION_ARG, request.rollout_rules.len())?;
        request.rollout_rules.remove(index);

        client
            .replace_flag_value(environment_id, flag_id, &request, "Deleting Targeting Rule")
            .await
            .map(|_| ())
    })
}

fn move_rule<'a>(
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
        let len = request.rollout_rules.len();
        let from = args::position(args, FROM_ARG, len)?;
        let to = args::position(args, TO_ARG, len)?;
        if from == to {
            ctx.output().write_line("The rule is already at that position.");
            return Ok(());
        }
        let rule = request.rollout_rules.remove(from);
        request.rollout_rules.insert(to, rule);

        client
            .replace_flag_value(environment_id, flag_id, &request, "Moving Targeting Rule")
            .await
            .map(|_| ())
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use flagdeck_config::{CliConfig, Credential, MemoryConfigProvider};
    use httpmock::prelude::*;
    use serde_json::{Value, json};

    use super::*;
    use crate::cli::{Runtime, run_with};
    use crate::error::{EXIT_ERROR, EXIT_OK};
    use crate::output::BufferedOutput;

    fn runtime(server: &MockServer, output: &Arc<BufferedOutput>) -> Runtime {
        Runtime::new(
            output.clone(),
            Arc::new(MemoryConfigProvider::new(CliConfig {
                api_host: server.base_url(),
                auth: Some(Credential::new("u", "p")),
            })),
        )
    }

    fn rule(attribute: &str, value: bool) -> Value {
        json!({
            "comparisonAttribute": attribute,
            "comparator": "contains",
            "comparisonValue": "x",
            "value": value
        })
    }

    fn rule_request(attribute: &str, value: bool) -> Value {
        json!({
            "ComparisonAttribute": attribute,
            "Comparator": "contains",
            "ComparisonValue": "x",
            "Value": value
        })
    }

    fn current_value(server: &MockServer) -> httpmock::Mock<'_> {
        server.mock(|when, then| {
            when.method(GET).path("/v1/environments/e1/settings/5/value");
            then.status(200).json_body(json!({
                "setting": {"settingId": 5, "key": "on", "name": "On", "settingType": "boolean"},
                "value": false,
                "rolloutRules": [rule("A", true), rule("B", false), rule("C", true)]
            }));
        })
    }

    #[test]
    fn comparators_are_canonicalised() {
        assert_eq!(parse_comparator("SEMVERLESS").ok(), Some("semVerLess"));
        assert!(parse_comparator("startsWith").is_err());
    }

    #[tokio::test]
    async fn create_appends_rule() {
        let server = MockServer::start_async().await;
        let current = current_value(&server);
        let replace = server.mock(|when, then| {
            when.method(PUT)
                .path("/v1/environments/e1/settings/5/value")
                .json_body(json!({
                    "Value": false,
                    "RolloutRules": [
                        rule_request("A", true),
                        rule_request("B", false),
                        rule_request("C", true),
                        {
                            "ComparisonAttribute": "Email",
                            "Comparator": "contains",
                            "ComparisonValue": "@example.com",
                            "Value": true
                        }
                    ],
                    "RolloutPercentageItems": []
                }));
            then.status(200).json_body(json!({"value": false}));
        });
        let output = Arc::new(BufferedOutput::new());

        let code = run_with(
            [
                "flagdeck", "flag", "targeting", "create", "-i", "5", "-e", "e1", "-a", "Email",
                "-c", "contains", "-t", "@example.com", "-f", "true",
            ],
            &runtime(&server, &output),
            &Cancellation::never(),
        )
        .await;

        assert_eq!(code, EXIT_OK, "stderr: {}", output.stderr());
        current.assert();
        replace.assert();
    }

    #[tokio::test]
    async fn move_reorders_rules() {
        let server = MockServer::start_async().await;
        let current = current_value(&server);
        let replace = server.mock(|when, then| {
            when.method(PUT)
                .path("/v1/environments/e1/settings/5/value")
                .json_body(json!({
                    "Value": false,
                    "RolloutRules": [
                        rule_request("C", true),
                        rule_request("A", true),
                        rule_request("B", false)
                    ],
                    "RolloutPercentageItems": []
                }));
            then.status(200).json_body(json!({"value": false}));
        });
        let output = Arc::new(BufferedOutput::new());

        let code = run_with(
            ["flagdeck", "flag", "t", "mv", "-i", "5", "-e", "e1", "--from", "3", "--to", "1"],
            &runtime(&server, &output),
            &Cancellation::never(),
        )
        .await;

        assert_eq!(code, EXIT_OK, "stderr: {}", output.stderr());
        current.assert();
        replace.assert();
        assert_eq!(output.stdout(), "Moving Targeting Rule... Ok.\n");
    }

    #[tokio::test]
    async fn out_of_range_position_writes_nothing() {
        let server = MockServer::start_async().await;
        let current = current_value(&server);
        let replace = server.mock(|when, then| {
            when.method(PUT).path("/v1/environments/e1/settings/5/value");
            then.status(200).json_body(json!({"value": false}));
        });
        let output = Arc::new(BufferedOutput::new());

        let code = run_with(
            ["flagdeck", "flag", "targeting", "rm", "-i", "5", "-e", "e1", "-p", "4"],
            &runtime(&server, &output),
            &Cancellation::never(),
        )
        .await;

        assert_eq!(code, EXIT_ERROR);
        current.assert();
        replace.assert_calls(0);
        assert_eq!(output.stderr(), "--position must be between 1 and 3, got '4'.\n");
    }
}
