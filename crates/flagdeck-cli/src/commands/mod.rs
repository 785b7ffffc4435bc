//! Command descriptors and their handlers.
//!
//! Every module contributes one descriptor; `command_tree` hands them to the
//! builder in whatever order they are listed here, and placement comes from
//! each descriptor's affinity.

mod args;
mod cat;
mod config;
mod environment;
mod flag;
mod flag_percentage;
mod flag_targeting;
mod flag_value;
mod list_all;
mod product;
mod sdk_key;
mod setup;
mod tag;

use clap::ArgMatches;
use serde::Serialize;

use crate::api::ApiClient;
use crate::context::ExecutionContext;
use crate::error::CliResult;
use crate::output::{render_json, render_table};
use crate::tree::{CommandDescriptor, CommandTree, CommandTreeBuilder, OptionSpec, TreeError};

/// Name of the root command.
pub const ROOT_NAME: &str = "flagdeck";

const JSON_ARG: &str = "json";
const PRODUCT_ID_ARG: &str = "product-id";

/// Every descriptor of the CLI, root included.
#[must_use]
pub fn descriptors() -> Vec<CommandDescriptor> {
    vec![
        CommandDescriptor::root(
            ROOT_NAME,
            "Manage feature flags, targeting rules and environments from the command line",
        ),
        setup::descriptor(),
        list_all::descriptor(),
        product::descriptor(),
        config::descriptor(),
        environment::descriptor(),
        tag::descriptor(),
        flag::descriptor(),
        flag_value::descriptor(),
        flag_targeting::descriptor(),
        flag_percentage::descriptor(),
        sdk_key::descriptor(),
        cat::descriptor(),
    ]
}

/// Assemble the full command tree.
///
/// # Errors
///
/// Returns the [`TreeError`] raised by the builder.
pub fn command_tree() -> Result<CommandTree, TreeError> {
    let mut builder = CommandTreeBuilder::new();
    builder.register_all(descriptors());
    builder.build()
}

fn json_option() -> OptionSpec {
    OptionSpec::flag(JSON_ARG, "Print the raw JSON payload")
}

/// Print `items` as JSON when `--json` is set, otherwise as a table.
fn print_list<T, F>(
    args: &ArgMatches,
    ctx: &ExecutionContext,
    items: &[T],
    headers: &[&str],
    row: F,
) -> CliResult<()>
where
    T: Serialize,
    F: Fn(&T) -> Vec<String>,
{
    if args::flag(args, JSON_ARG) {
        ctx.output().write_line(&render_json(items)?);
    } else {
        let rows: Vec<Vec<String>> = items.iter().map(row).collect();
        ctx.output().write(&render_table(headers, &rows));
    }
    Ok(())
}

fn product_filter() -> OptionSpec {
    OptionSpec::value(PRODUCT_ID_ARG, "Only list items of this product").short('p')
}

/// Products addressed by an optional `--product-id`; all products otherwise.
async fn product_scope(client: &ApiClient<'_>, args: &ArgMatches) -> CliResult<Vec<String>> {
    match args::optional(args, PRODUCT_ID_ARG) {
        Some(product_id) => Ok(vec![product_id.to_string()]),
        None => Ok(client
            .list_products()
            .await?
            .into_iter()
            .map(|product| product.product_id)
            .collect()),
    }
}

fn or_dash(value: Option<&str>) -> String {
    value
        .filter(|value| !value.is_empty())
        .unwrap_or("-")
        .to_string()
}
