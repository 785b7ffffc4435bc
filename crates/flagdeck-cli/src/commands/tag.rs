use clap::ArgMatches;
use flagdeck_api_models::{Tag, TagRequest};

use super::{args, json_option, or_dash, print_list, product_filter, product_scope};
use crate::api::ApiClient;
use crate::cancel::Cancellation;
use crate::context::ExecutionContext;
use crate::error::{CliError, CliResult};
use crate::tree::{Affinity, CommandDescriptor, HandlerFuture, InlineCommand, OptionSpec};

const PRODUCT_ID_ARG: &str = "product-id";
const TAG_ID_ARG: &str = "tag-id";
const NAME_ARG: &str = "name";
const COLOR_ARG: &str = "color";

/// Named colors accepted by the service besides `#rrggbb` values.
pub(crate) const TAG_PALETTE: [&str; 6] = ["panther", "whale", "salmon", "lizard", "canary", "koala"];

pub(crate) fn descriptor() -> CommandDescriptor {
    CommandDescriptor::new("tag", "Manage tags", Affinity::ChildOf(&[]))
        .alias("t")
        .inline(
            InlineCommand::new("ls", "List tags", list)
                .option(product_filter())
                .option(json_option()),
        )
        .inline(
            InlineCommand::new("create", "Create a tag", create)
                .alias("cr")
                .option(
                    OptionSpec::value(PRODUCT_ID_ARG, "Product owning the tag")
                        .short('p')
                        .required(),
                )
                .option(OptionSpec::value(NAME_ARG, "Tag name").short('n').required())
                .option(OptionSpec::value(COLOR_ARG, "Palette name or #rrggbb").short('c')),
        )
        .inline(
            InlineCommand::new("update", "Rename or recolor a tag", update)
                .alias("up")
                .option(OptionSpec::value(TAG_ID_ARG, "Tag to update").short('i').required())
                .option(OptionSpec::value(NAME_ARG, "New name").short('n'))
                .option(OptionSpec::value(COLOR_ARG, "New palette name or #rrggbb").short('c')),
        )
        .inline(
            InlineCommand::new("rm", "Delete a tag", remove)
                .option(OptionSpec::value(TAG_ID_ARG, "Tag to delete").short('i').required()),
        )
}

/// Canonical form of a tag color, rejecting anything the service would not accept.
pub(crate) fn parse_color(raw: &str) -> CliResult<String> {
    let color = raw.trim().to_ascii_lowercase();
    let is_hex = color.len() == 7
        && color.starts_with('#')
        && color[1..].chars().all(|ch| ch.is_ascii_hexdigit());
    if is_hex || TAG_PALETTE.contains(&color.as_str()) {
        Ok(color)
    } else {
        Err(CliError::validation(format!(
            "Invalid color '{raw}', expected #rrggbb or one of: {}.",
            TAG_PALETTE.join(", ")
        )))
    }
}

fn color_arg(args: &ArgMatches) -> CliResult<Option<String>> {
    args::optional(args, COLOR_ARG).map(parse_color).transpose()
}

fn list<'a>(
    args: &'a ArgMatches,
    ctx: &'a ExecutionContext,
    cancel: &'a Cancellation,
) -> HandlerFuture<'a> {
    Box::pin(async move {
        let client = ApiClient::new(ctx, cancel)?;
        let mut tags = Vec::new();
        for product_id in product_scope(&client, args).await? {
            tags.extend(client.list_tags(&product_id).await?);
        }
        print_list(args, ctx, &tags, &["ID", "NAME", "COLOR", "PRODUCT"], |tag: &Tag| {
            vec![
                tag.tag_id.to_string(),
                tag.name.clone(),
                or_dash(tag.color.as_deref()),
                or_dash(tag.product.as_ref().map(|product| product.name.as_str())),
            ]
        })
    })
}

fn create<'a>(
    args: &'a ArgMatches,
    ctx: &'a ExecutionContext,
    cancel: &'a Cancellation,
) -> HandlerFuture<'a> {
    Box::pin(async move {
        let product_id = args::required(args, PRODUCT_ID_ARG)?;
        let request = TagRequest {
            name: args::required(args, NAME_ARG)?.to_string(),
            color: color_arg(args)?,
        };
        let tag = ApiClient::new(ctx, cancel)?
            .create_tag(product_id, &request)
            .await?;
        ctx.output().write_line(&tag.tag_id.to_string());
        Ok(())
    })
}

fn update<'a>(
    args: &'a ArgMatches,
    ctx: &'a ExecutionContext,
    cancel: &'a Cancellation,
) -> HandlerFuture<'a> {
    Box::pin(async move {
        let tag_id = args::id(args, TAG_ID_ARG)?;
        let name = args::optional(args, NAME_ARG);
        let color = color_arg(args)?;
        if name.is_none() && color.is_none() {
            return Err(CliError::validation("Nothing to update, pass --name or --color."));
        }

        let client = ApiClient::new(ctx, cancel)?;
        let current = client.get_tag(tag_id).await?;
        let request = TagRequest {
            name: name.map_or(current.name, str::to_string),
            color: color.or(current.color),
        };
        client.update_tag(tag_id, &request).await
    })
}

fn remove<'a>(
    args: &'a ArgMatches,
    ctx: &'a ExecutionContext,
    cancel: &'a Cancellation,
) -> HandlerFuture<'a> {
    Box::pin(async move {
        let tag_id = args::id(args, TAG_ID_ARG)?;
        ApiClient::new(ctx, cancel)?.delete_tag(tag_id).await
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colors_accept_palette_and_hex() -> CliResult<()> {
        assert_eq!(parse_color("Salmon")?, "salmon");
        assert_eq!(parse_color("#FF0000")?, "#ff0000");
        assert!(parse_color("#ff00").is_err());
        assert!(parse_color("purple").is_err());
        assert!(parse_color("#gg0000").is_err());
        Ok(())
    }
}
