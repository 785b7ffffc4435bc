use clap::ArgMatches;
use flagdeck_api_models::{Product, ProductRequest};

use super::{args, json_option, or_dash, print_list};
use crate::api::ApiClient;
use crate::cancel::Cancellation;
use crate::context::ExecutionContext;
use crate::error::CliError;
use crate::tree::{Affinity, CommandDescriptor, HandlerFuture, InlineCommand, OptionSpec};

const ORGANIZATION_ID_ARG: &str = "organization-id";
const PRODUCT_ID_ARG: &str = "product-id";
const NAME_ARG: &str = "name";
const DESCRIPTION_ARG: &str = "description";

pub(crate) fn descriptor() -> CommandDescriptor {
    CommandDescriptor::new("product", "Manage products", Affinity::ChildOf(&[]))
        .alias("p")
        .inline(InlineCommand::new("ls", "List products", list).option(json_option()))
        .inline(
            InlineCommand::new("create", "Create a product", create)
                .alias("cr")
                .option(
                    OptionSpec::value(ORGANIZATION_ID_ARG, "Organization owning the product")
                        .short('o')
                        .required(),
                )
                .option(OptionSpec::value(NAME_ARG, "Product name").short('n').required())
                .option(OptionSpec::value(DESCRIPTION_ARG, "Product description").short('d')),
        )
        .inline(
            InlineCommand::new("update", "Rename or describe a product", update)
                .alias("up")
                .option(
                    OptionSpec::value(PRODUCT_ID_ARG, "Product to update")
                        .short('i')
                        .required(),
                )
                .option(OptionSpec::value(NAME_ARG, "New name").short('n'))
                .option(OptionSpec::value(DESCRIPTION_ARG, "New description").short('d')),
        )
        .inline(
            InlineCommand::new("rm", "Delete a product", remove).option(
                OptionSpec::value(PRODUCT_ID_ARG, "Product to delete")
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
        let products = client.list_products().await?;
        print_list(
            args,
            ctx,
            &products,
            &["ID", "NAME", "DESCRIPTION", "ORGANIZATION"],
            |product: &Product| {
                vec![
                    product.product_id.clone(),
                    product.name.clone(),
                    or_dash(product.description.as_deref()),
                    or_dash(product.organization.as_ref().map(|org| org.name.as_str())),
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
        let organization_id = args::required(args, ORGANIZATION_ID_ARG)?;
        let request = ProductRequest {
            name: args::required(args, NAME_ARG)?.to_string(),
            description: args::optional(args, DESCRIPTION_ARG).map(str::to_string),
        };
        let client = ApiClient::new(ctx, cancel)?;
        let product = client.create_product(organization_id, &request).await?;
        ctx.output().write_line(&product.product_id);
        Ok(())
    })
}

fn update<'a>(
    args: &'a ArgMatches,
    ctx: &'a ExecutionContext,
    cancel: &'a Cancellation,
) -> HandlerFuture<'a> {
    Box::pin(async move {
        let product_id = args::required(args, PRODUCT_ID_ARG)?;
        let name = args::optional(args, NAME_ARG);
        let description = args::optional(args, DESCRIPTION_ARG);
        if name.is_none() && description.is_none() {
            return Err(CliError::validation(
                "Nothing to update, pass --name or --description.",
            ));
        }

        let client = ApiClient::new(ctx, cancel)?;
        let current = client.get_product(product_id).await?;
        let request = ProductRequest {
            name: name.map_or(current.name, str::to_string),
            description: description.map(str::to_string).or(current.description),
        };
        client.update_product(product_id, &request).await
    })
}

fn remove<'a>(
    args: &'a ArgMatches,
    ctx: &'a ExecutionContext,
    cancel: &'a Cancellation,
) -> HandlerFuture<'a> {
    Box::pin(async move {
        let product_id = args::required(args, PRODUCT_ID_ARG)?;
        ApiClient::new(ctx, cancel)?.delete_product(product_id).await
    })
}
