use flagdeck_api_models::SdkKeys;

use super::ApiClient;
use crate::error::CliResult;

impl ApiClient<'_> {
    /// SDK keys of a config in one environment.
    pub async fn sdk_keys(&self, config_id: &str, environment_id: &str) -> CliResult<SdkKeys> {
        self.get(&["v1", "configs", config_id, "environments", environment_id])
            .await
    }
}
