use flagdeck_api_models::{Product, ProductRequest};
use reqwest::Method;

use super::ApiClient;
use crate::error::CliResult;

impl ApiClient<'_> {
    /// Products visible to the credential.
    pub async fn list_products(&self) -> CliResult<Vec<Product>> {
        self.get(&["v1", "products"]).await
    }

    /// Single product.
    pub async fn get_product(&self, product_id: &str) -> CliResult<Product> {
        self.get(&["v1", "products", product_id]).await
    }

    /// Create a product in an organization.
    pub async fn create_product(
        &self,
        organization_id: &str,
        request: &ProductRequest,
    ) -> CliResult<Product> {
        self.with_progress(
            "Creating Product",
            self.send_json(
                Method::POST,
                &["v1", "organizations", organization_id, "products"],
                request,
            ),
        )
        .await
    }

    /// Replace a product's name and description.
    pub async fn update_product(&self, product_id: &str, request: &ProductRequest) -> CliResult<()> {
        self.with_progress(
            "Updating Product",
            self.send(Method::PUT, &["v1", "products", product_id], Some(request)),
        )
        .await
    }

    /// Delete a product.
    pub async fn delete_product(&self, product_id: &str) -> CliResult<()> {
        self.with_progress(
            "Deleting Product",
            self.send::<()>(Method::DELETE, &["v1", "products", product_id], None),
        )
        .await
    }
}
