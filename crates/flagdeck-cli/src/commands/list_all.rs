use clap::ArgMatches;
use flagdeck_api_models::{Config, Environment, Product};
use serde::Serialize;

use super::{JSON_ARG, args, json_option};
use crate::api::ApiClient;
use crate::cancel::Cancellation;
use crate::context::ExecutionContext;
use crate::output::{render_json, render_table};
use crate::tree::{Affinity, CommandDescriptor, HandlerFuture};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProductOverview {
    product: Product,
    configs: Vec<Config>,
    environments: Vec<Environment>,
}

pub(crate) fn descriptor() -> CommandDescriptor {
    CommandDescriptor::new(
        "list-all",
        "List every product with its configs and environments",
        Affinity::ChildOf(&[]),
    )
    .alias("ls")
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
        let mut overview = Vec::new();
        for product in client.list_products().await? {
            let configs = client.list_configs(&product.product_id).await?;
            let environments = client.list_environments(&product.product_id).await?;
            overview.push(ProductOverview {
                product,
                configs,
                environments,
            });
        }

        if args::flag(args, JSON_ARG) {
            ctx.output().write_line(&render_json(&overview)?);
        } else {
            ctx.output().write(&render_table(
                &["PRODUCT", "KIND", "ID", "NAME"],
                &rows(&overview),
            ));
        }
        Ok(())
    })
}

fn rows(overview: &[ProductOverview]) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    for entry in overview {
        let product = &entry.product.name;
        rows.push(vec![
            product.clone(),
            "product".into(),
            entry.product.product_id.clone(),
            product.clone(),
        ]);
        rows.extend(entry.configs.iter().map(|config| {
            vec![
                product.clone(),
                "config".into(),
                config.config_id.clone(),
                config.name.clone(),
            ]
        }));
        rows.extend(entry.environments.iter().map(|environment| {
            vec![
                product.clone(),
                "environment".into(),
                environment.environment_id.clone(),
                environment.name.clone(),
            ]
        }));
    }
    rows
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use flagdeck_config::{CliConfig, Credential, MemoryConfigProvider};
    use httpmock::prelude::*;
    use serde_json::json;

    use crate::cancel::Cancellation;
    use crate::cli::{Runtime, run_with};
    use crate::error::EXIT_OK;
    use crate::output::BufferedOutput;

    #[tokio::test]
    async fn lists_products_with_children() {
        let server = MockServer::start_async().await;
        let products = server.mock(|when, then| {
            when.method(GET).path("/v1/products");
            then.status(200)
                .json_body(json!([{"productId": "p1", "name": "Shop"}]));
        });
        let configs = server.mock(|when, then| {
            when.method(GET).path("/v1/products/p1/configs");
            then.status(200)
                .json_body(json!([{"configId": "c1", "name": "Main"}]));
        });
        let environments = server.mock(|when, then| {
            when.method(GET).path("/v1/products/p1/environments");
            then.status(200)
                .json_body(json!([{"environmentId": "e1", "name": "Production"}]));
        });

        let output = Arc::new(BufferedOutput::new());
        let config = MemoryConfigProvider::new(CliConfig {
            api_host: server.base_url(),
            auth: Some(Credential::new("u", "p")),
        });
        let runtime = Runtime::new(output.clone(), Arc::new(config));

        let code = run_with(["flagdeck", "ls"], &runtime, &Cancellation::never()).await;

        assert_eq!(code, EXIT_OK, "stderr: {}", output.stderr());
        products.assert();
        configs.assert();
        environments.assert();
        let stdout = output.stdout();
        assert!(stdout.starts_with("PRODUCT"));
        assert!(stdout.contains("config       c1"));
        assert!(stdout.contains("Production"));
    }
}
