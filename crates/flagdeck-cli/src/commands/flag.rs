use clap::ArgMatches;
use flagdeck_api_models::{CreateFlagRequest, Flag, PatchOperation, SettingType};

use super::{args, json_option, or_dash, print_list, product_scope};
use crate::api::ApiClient;
use crate::cancel::Cancellation;
use crate::context::ExecutionContext;
use crate::error::{CliError, CliResult};
use crate::tree::{Affinity, CommandDescriptor, HandlerFuture, InlineCommand, OptionSpec};

const CONFIG_ID_ARG: &str = "config-id";
const FLAG_ID_ARG: &str = "flag-id";
const TAG_NAME_ARG: &str = "tag-name";
const TAG_IDS_ARG: &str = "tag-ids";
const KEY_ARG: &str = "key";
const NAME_ARG: &str = "name";
const HINT_ARG: &str = "hint";
const TYPE_ARG: &str = "type";

/// `--flag-id` option shared by every flag subcommand.
pub(crate) fn flag_id_option(about: &'static str) -> OptionSpec {
    OptionSpec::value(FLAG_ID_ARG, about)
        .short('i')
        .alias("setting-id")
        .required()
}

/// Value of `--flag-id`.
pub(crate) fn flag_id(args: &ArgMatches) -> CliResult<i64> {
    args::id(args, FLAG_ID_ARG)
}

pub(crate) fn descriptor() -> CommandDescriptor {
    CommandDescriptor::new("flag", "Manage feature flags", Affinity::ChildOf(&[]))
        .alias("setting")
        .alias("f")
        .inline(
            InlineCommand::new("ls", "List flags", list)
                .option(OptionSpec::value(CONFIG_ID_ARG, "Only list flags of this config").short('c'))
                .option(OptionSpec::value(TAG_NAME_ARG, "Only list flags carrying this tag").short('n'))
                .option(json_option()),
        )
        .inline(
            InlineCommand::new("create", "Create a flag", create)
                .alias("cr")
                .option(
                    OptionSpec::value(CONFIG_ID_ARG, "Config owning the flag")
                        .short('c')
                        .required(),
                )
                .option(OptionSpec::value(KEY_ARG, "Key used by SDKs").short('k').required())
                .option(OptionSpec::value(NAME_ARG, "Display name").short('n').required())
                .option(
                    OptionSpec::value(TYPE_ARG, "Value type: boolean, string, int or double")
                        .short('t')
                        .required(),
                )
                .option(OptionSpec::value(HINT_ARG, "Hint shown in the dashboard").short('H'))
                .option(OptionSpec::many(TAG_IDS_ARG, "Tags to attach").short('g')),
        )
        .inline(
            InlineCommand::new("update", "Rename a flag or change its hint", update)
                .alias("up")
                .option(flag_id_option("Flag to update"))
                .option(OptionSpec::value(NAME_ARG, "New display name").short('n'))
                .option(OptionSpec::value(HINT_ARG, "New hint").short('H')),
        )
        .inline(InlineCommand::new("rm", "Delete a flag", remove).option(flag_id_option("Flag to delete")))
        .inline(
            InlineCommand::new("attach", "Attach tags to a flag", attach)
                .alias("at")
                .option(flag_id_option("Flag to tag"))
                .option(OptionSpec::many(TAG_IDS_ARG, "Tags to attach").short('g').required()),
        )
        .inline(
            InlineCommand::new("detach", "Detach tags from a flag", detach)
                .alias("dt")
                .option(flag_id_option("Flag to untag"))
                .option(OptionSpec::many(TAG_IDS_ARG, "Tags to detach").short('g').required()),
        )
}

fn list<'a>(
    args: &'a ArgMatches,
    ctx: &'a ExecutionContext,
    cancel: &'a Cancellation,
) -> HandlerFuture<'a> {
    Box::pin(async move {
        let client = ApiClient::new(ctx, cancel)?;
        let config_ids = match args::optional(args, CONFIG_ID_ARG) {
            Some(config_id) => vec![config_id.to_string()],
            None => {
                let mut config_ids = Vec::new();
                for product_id in product_scope(&client, args).await? {
                    config_ids.extend(
                        client
                            .list_configs(&product_id)
                            .await?
                            .into_iter()
                            .map(|config| config.config_id),
                    );
                }
                config_ids
            }
        };

        let mut flags = Vec::new();
        for config_id in &config_ids {
            flags.extend(client.list_flags(config_id).await?);
        }
        if let Some(tag_name) = args::optional(args, TAG_NAME_ARG) {
            flags.retain(|flag| has_tag(flag, tag_name));
        }

        print_list(
            args,
            ctx,
            &flags,
            &["ID", "KEY", "NAME", "TYPE", "TAGS", "HINT"],
            |flag: &Flag| {
                vec![
                    flag.setting_id.to_string(),
                    flag.key.clone(),
                    flag.name.clone(),
                    flag.setting_type.as_str().to_string(),
                    tag_names(flag),
                    or_dash(flag.hint.as_deref()),
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
        let config_id = args::required(args, CONFIG_ID_ARG)?;
        let raw_type = args::required(args, TYPE_ARG)?;
        let setting_type = SettingType::parse(raw_type).ok_or_else(|| {
            CliError::validation(format!(
                "Invalid type '{raw_type}', expected boolean, string, int or double."
            ))
        })?;
        let request = CreateFlagRequest {
            key: args::required(args, KEY_ARG)?.to_string(),
            name: args::required(args, NAME_ARG)?.to_string(),
            hint: args::optional(args, HINT_ARG).map(str::to_string),
            setting_type,
            tag_ids: args::ids(args, TAG_IDS_ARG)?,
        };
        let flag = ApiClient::new(ctx, cancel)?
            .create_flag(config_id, &request)
            .await?;
        ctx.output().write_line(&flag.setting_id.to_string());
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
        let operations: Vec<PatchOperation> = [("/name", NAME_ARG), ("/hint", HINT_ARG)]
            .into_iter()
            .filter_map(|(path, name)| {
                args::optional(args, name).map(|value| PatchOperation::replace(path, value))
            })
            .collect();
        if operations.is_empty() {
            return Err(CliError::validation("Nothing to update, pass --name or --hint."));
        }

        ApiClient::new(ctx, cancel)?
            .patch_flag(flag_id, &operations, "Updating Flag")
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
        ApiClient::new(ctx, cancel)?.delete_flag(flag_id).await
    })
}

fn attach<'a>(
    args: &'a ArgMatches,
    ctx: &'a ExecutionContext,
    cancel: &'a Cancellation,
) -> HandlerFuture<'a> {
    Box::pin(async move {
        let flag_id = flag_id(args)?;
        let tag_ids = args::ids(args, TAG_IDS_ARG)?;
        let client = ApiClient::new(ctx, cancel)?;
        let flag = client.get_flag(flag_id).await?;

        let operations = attach_operations(&flag, &tag_ids);
        if operations.is_empty() {
            ctx.output().write_line("Tags are already attached.");
            return Ok(());
        }
        client
            .patch_flag(flag_id, &operations, "Attaching Tags")
            .await
            .map(|_| ())
    })
}

fn detach<'a>(
    args: &'a ArgMatches,
    ctx: &'a ExecutionContext,
    cancel: &'a Cancellation,
) -> HandlerFuture<'a> {
    Box::pin(async move {
        let flag_id = flag_id(args)?;
        let tag_ids = args::ids(args, TAG_IDS_ARG)?;
        let client = ApiClient::new(ctx, cancel)?;
        let flag = client.get_flag(flag_id).await?;

        let operations = detach_operations(&flag, &tag_ids);
        if operations.is_empty() {
            ctx.output().write_line("None of the tags are attached.");
            return Ok(());
        }
        client
            .patch_flag(flag_id, &operations, "Detaching Tags")
            .await
            .map(|_| ())
    })
}

/// `add` operations for tags not yet on the flag, in argument order.
fn attach_operations(flag: &Flag, tag_ids: &[i64]) -> Vec<PatchOperation> {
    let mut seen = Vec::new();
    tag_ids
        .iter()
        .copied()
        .filter(|id| !flag.tags.iter().any(|tag| tag.tag_id == *id))
        .filter(|id| {
            let fresh = !seen.contains(id);
            seen.push(*id);
            fresh
        })
        .map(|id| PatchOperation::add("/tags/-", id))
        .collect()
}

/// `remove` operations for attached tags, highest index first so earlier
/// removals do not shift later ones.
fn detach_operations(flag: &Flag, tag_ids: &[i64]) -> Vec<PatchOperation> {
    flag.tags
        .iter()
        .enumerate()
        .rev()
        .filter(|(_, tag)| tag_ids.contains(&tag.tag_id))
        .map(|(index, _)| PatchOperation::remove(format!("/tags/{index}")))
        .collect()
}

fn has_tag(flag: &Flag, tag_name: &str) -> bool {
    flag.tags
        .iter()
        .any(|tag| tag.name.eq_ignore_ascii_case(tag_name))
}

fn tag_names(flag: &Flag) -> String {
    if flag.tags.is_empty() {
        return "-".to_string();
    }
    flag.tags
        .iter()
        .map(|tag| tag.name.as_str())
        .collect::<Vec<_>>()
        .join(",")
}
