use flagdeck_api_models::Me;

use super::ApiClient;
use crate::error::CliResult;

impl ApiClient<'_> {
    /// Account owning the credential in use.
    pub async fn me(&self) -> CliResult<Me> {
        self.get(&["v1", "me"]).await
    }
}
