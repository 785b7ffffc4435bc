use flagdeck_api_models::{CreateFlagRequest, Flag, FlagValue, FlagValueRequest, PatchOperation};
use reqwest::Method;

use super::ApiClient;
use crate::error::CliResult;

impl ApiClient<'_> {
    /// Flags of a config.
    pub async fn list_flags(&self, config_id: &str) -> CliResult<Vec<Flag>> {
        self.get(&["v1", "configs", config_id, "settings"]).await
    }

    /// Single flag.
    pub async fn get_flag(&self, flag_id: i64) -> CliResult<Flag> {
        self.get(&["v1", "settings", &flag_id.to_string()]).await
    }

    /// Create a flag under a config.
    pub async fn create_flag(&self, config_id: &str, request: &CreateFlagRequest) -> CliResult<Flag> {
        self.with_progress(
            "Creating Flag",
            self.send_json(Method::POST, &["v1", "configs", config_id, "settings"], request),
        )
        .await
    }

    /// Apply a JSON Patch document to a flag.
    pub async fn patch_flag(
        &self,
        flag_id: i64,
        operations: &[PatchOperation],
        label: &str,
    ) -> CliResult<Flag> {
        let id = flag_id.to_string();
        self.with_progress(
            label,
            self.send_json(Method::PATCH, &["v1", "settings", &id], operations),
        )
        .await
    }

    /// Delete a flag.
    pub async fn delete_flag(&self, flag_id: i64) -> CliResult<()> {
        let id = flag_id.to_string();
        self.with_progress(
            "Deleting Flag",
            self.send::<()>(Method::DELETE, &["v1", "settings", &id], None),
        )
        .await
    }

    /// Value of a flag in one environment.
    pub async fn get_flag_value(&self, environment_id: &str, flag_id: i64) -> CliResult<FlagValue> {
        let id = flag_id.to_string();
        self.get(&["v1", "environments", environment_id, "settings", &id, "value"])
            .await
    }

    /// Replace the value, targeting rules and percentage rules of a flag in
    /// one environment.
    pub async fn replace_flag_value(
        &self,
        environment_id: &str,
        flag_id: i64,
        request: &FlagValueRequest,
        label: &str,
    ) -> CliResult<FlagValue> {
        let id = flag_id.to_string();
        self.with_progress(
            label,
            self.send_json(
                Method::PUT,
                &["v1", "environments", environment_id, "settings", &id, "value"],
                request,
            ),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use flagdeck_api_models::PatchOperation;
    use flagdeck_config::Credential;
    use httpmock::prelude::*;
    use serde_json::json;

    use crate::api::ApiClient;
    use crate::api::tests::mock_context;
    use crate::cancel::Cancellation;
    use crate::output::BufferedOutput;

    #[tokio::test]
    async fn patch_flag_sends_json_patch() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(PATCH)
                .path("/v1/settings/5")
                .json_body(json!([{"op": "add", "path": "/tags/-", "value": 3}]));
            then.status(200).json_body(json!({
                "settingId": 5,
                "key": "beta",
                "name": "Beta",
                "settingType": "boolean",
                "tags": [{"tagId": 3, "name": "Team"}]
            }));
        });
        let output = Arc::new(BufferedOutput::new());
        let ctx = mock_context(&server, &output, Some(Credential::new("u", "p")));
        let cancel = Cancellation::never();
        let client = ApiClient::new(&ctx, &cancel).expect("client");

        let flag = client
            .patch_flag(5, &[PatchOperation::add("/tags/-", 3)], "Attaching Tags")
            .await
            .expect("patched");

        mock.assert();
        assert_eq!(flag.tags.len(), 1);
        assert_eq!(output.stdout(), "Attaching Tags... Ok.\n");
    }
}
