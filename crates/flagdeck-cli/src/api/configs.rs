use flagdeck_api_models::{Config, ConfigRequest};
use reqwest::Method;

use super::ApiClient;
use crate::error::CliResult;

impl ApiClient<'_> {
    /// Configs of a product.
    pub async fn list_configs(&self, product_id: &str) -> CliResult<Vec<Config>> {
        self.get(&["v1", "products", product_id, "configs"]).await
    }

    /// Single config.
    pub async fn get_config(&self, config_id: &str) -> CliResult<Config> {
        self.get(&["v1", "configs", config_id]).await
    }

    /// Create a config under a product.
    pub async fn create_config(&self, product_id: &str, request: &ConfigRequest) -> CliResult<Config> {
        self.with_progress(
            "Creating Config",
            self.send_json(Method::POST, &["v1", "products", product_id, "configs"], request),
        )
        .await
    }

    /// Replace a config's name and description.
    pub async fn update_config(&self, config_id: &str, request: &ConfigRequest) -> CliResult<()> {
        self.with_progress(
            "Updating Config",
            self.send(Method::PUT, &["v1", "configs", config_id], Some(request)),
        )
        .await
    }

    /// Delete a config.
    pub async fn delete_config(&self, config_id: &str) -> CliResult<()> {
        self.with_progress(
            "Deleting Config",
            self.send::<()>(Method::DELETE, &["v1", "configs", config_id], None),
        )
        .await
    }
}
