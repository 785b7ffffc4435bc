use flagdeck_api_models::{Environment, EnvironmentRequest};
use reqwest::Method;

use super::ApiClient;
use crate::error::CliResult;

impl ApiClient<'_> {
    /// Environments of a product.
    pub async fn list_environments(&self, product_id: &str) -> CliResult<Vec<Environment>> {
        self.get(&["v1", "products", product_id, "environments"])
            .await
    }

    /// Single environment.
    pub async fn get_environment(&self, environment_id: &str) -> CliResult<Environment> {
        self.get(&["v1", "environments", environment_id]).await
    }

    /// Create an environment under a product.
    pub async fn create_environment(
        &self,
        product_id: &str,
        request: &EnvironmentRequest,
    ) -> CliResult<Environment> {
        self.with_progress(
            "Creating Environment",
            self.send_json(
                Method::POST,
                &["v1", "products", product_id, "environments"],
                request,
            ),
        )
        .await
    }

    /// Replace an environment's name, color and description.
    pub async fn update_environment(
        &self,
        environment_id: &str,
        request: &EnvironmentRequest,
    ) -> CliResult<()> {
        self.with_progress(
            "Updating Environment",
            self.send(
                Method::PUT,
                &["v1", "environments", environment_id],
                Some(request),
            ),
        )
        .await
    }

    /// Delete an environment.
    pub async fn delete_environment(&self, environment_id: &str) -> CliResult<()> {
        self.with_progress(
            "Deleting Environment",
            self.send::<()>(Method::DELETE, &["v1", "environments", environment_id], None),
        )
        .await
    }
}
