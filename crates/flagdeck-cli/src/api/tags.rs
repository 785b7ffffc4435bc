use flagdeck_api_models::{Tag, TagRequest};
use reqwest::Method;

use super::ApiClient;
use crate::error::CliResult;

impl ApiClient<'_> {
    /// Tags of a product.
    pub async fn list_tags(&self, product_id: &str) -> CliResult<Vec<Tag>> {
        self.get(&["v1", "products", product_id, "tags"]).await
    }

    /// Single tag.
    pub async fn get_tag(&self, tag_id: i64) -> CliResult<Tag> {
        self.get(&["v1", "tags", &tag_id.to_string()]).await
    }

    /// Create a tag under a product.
    pub async fn create_tag(&self, product_id: &str, request: &TagRequest) -> CliResult<Tag> {
        self.with_progress(
            "Creating Tag",
            self.send_json(Method::POST, &["v1", "products", product_id, "tags"], request),
        )
        .await
    }

    /// Replace a tag's name and color.
    pub async fn update_tag(&self, tag_id: i64, request: &TagRequest) -> CliResult<()> {
        let id = tag_id.to_string();
        self.with_progress(
            "Updating Tag",
            self.send(Method::PUT, &["v1", "tags", &id], Some(request)),
        )
        .await
    }

    /// Delete a tag.
    pub async fn delete_tag(&self, tag_id: i64) -> CliResult<()> {
        let id = tag_id.to_string();
        self.with_progress(
            "Deleting Tag",
            self.send::<()>(Method::DELETE, &["v1", "tags", &id], None),
        )
        .await
    }
}
