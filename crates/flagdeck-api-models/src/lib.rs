#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![warn(clippy::all, clippy::pedantic)]
//! Shared HTTP DTOs for the feature-flag management API.
//!
//! Responses are camelCase documents returned by the service. Request payloads
//! are serialised with PascalCase keys, which the service accepts for every
//! write endpoint. JSON Patch documents follow RFC 6902 casing.
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Problem document returned by the service on validation/runtime errors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ProblemDetails {
    #[serde(default)]
    /// Short, human-readable summary of the issue.
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Detailed diagnostic message when available.
    pub detail: Option<String>,
}

impl ProblemDetails {
    /// Most specific message carried by the problem document.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        [self.detail.as_deref(), Some(self.title.as_str())]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|message| !message.is_empty())
    }
}

/// Account that owns the credential in use.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Me {
    /// Account email.
    pub email: String,
    #[serde(default)]
    /// Display name.
    pub full_name: String,
}

/// Organization summary embedded in product documents.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    /// Organization identifier.
    pub organization_id: String,
    /// Organization name.
    pub name: String,
}

/// Product document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Owning organization.
    pub organization: Option<Organization>,
    /// Product identifier.
    pub product_id: String,
    /// Product name.
    pub name: String,
    #[serde(default)]
    /// Free-form description.
    pub description: Option<String>,
}

/// Product summary embedded in child documents.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProductRef {
    /// Product identifier.
    pub product_id: String,
    /// Product name.
    pub name: String,
}

/// Config document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Owning product.
    pub product: Option<ProductRef>,
    /// Config identifier.
    pub config_id: String,
    /// Config name.
    pub name: String,
    #[serde(default)]
    /// Free-form description.
    pub description: Option<String>,
}

/// Environment document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Owning product.
    pub product: Option<ProductRef>,
    /// Environment identifier.
    pub environment_id: String,
    /// Environment name.
    pub name: String,
    #[serde(default)]
    /// Display color.
    pub color: Option<String>,
    #[serde(default)]
    /// Free-form description.
    pub description: Option<String>,
}

/// Tag document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Owning product.
    pub product: Option<ProductRef>,
    /// Tag identifier.
    pub tag_id: i64,
    /// Tag name.
    pub name: String,
    #[serde(default)]
    /// Palette color name or hex value.
    pub color: Option<String>,
}

/// Value type of a flag.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SettingType {
    /// `true`/`false`.
    Boolean,
    /// Arbitrary text.
    String,
    /// Whole number.
    Int,
    /// Floating point number.
    Double,
}

impl SettingType {
    /// Wire name of the setting type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::String => "string",
            Self::Int => "int",
            Self::Double => "double",
        }
    }

    /// Parse a wire or CLI name into a setting type.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "boolean" | "bool" => Some(Self::Boolean),
            "string" | "text" => Some(Self::String),
            "int" | "integer" => Some(Self::Int),
            "double" | "number" => Some(Self::Double),
            _ => None,
        }
    }

    /// Parse a textual flag value into a JSON value of this type.
    ///
    /// Returns `None` when the text is not a valid value of the type.
    #[must_use]
    pub fn parse_value(self, raw: &str) -> Option<Value> {
        match self {
            Self::Boolean => match raw.trim().to_ascii_lowercase().as_str() {
                "true" => Some(Value::Bool(true)),
                "false" => Some(Value::Bool(false)),
                _ => None,
            },
            Self::String => Some(Value::String(raw.to_string())),
            Self::Int => raw.trim().parse::<i32>().ok().map(Value::from),
            Self::Double => raw
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|value| value.is_finite())
                .map(Value::from),
        }
    }
}

/// Flag (setting) document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Flag {
    /// Flag identifier.
    pub setting_id: i64,
    /// Key used by SDKs.
    pub key: String,
    /// Display name.
    pub name: String,
    #[serde(default)]
    /// Hint shown in the dashboard.
    pub hint: Option<String>,
    /// Value type.
    pub setting_type: SettingType,
    #[serde(default)]
    /// Owning config identifier.
    pub config_id: Option<String>,
    #[serde(default)]
    /// Tags attached to the flag.
    pub tags: Vec<Tag>,
}

/// Targeting rule evaluated before percentage rules.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TargetingRule {
    /// User attribute compared by the rule.
    pub comparison_attribute: String,
    /// Comparator name, e.g. `contains` or `semVerLess`.
    pub comparator: String,
    /// Value the attribute is compared to.
    pub comparison_value: String,
    /// Value served when the rule matches.
    pub value: Value,
}

/// Percentage rollout bucket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PercentageItem {
    /// Share of users in the bucket, 0..=100.
    pub percentage: u8,
    /// Value served to the bucket.
    pub value: Value,
}

/// Value of a flag in one environment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FlagValue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Flag the value belongs to.
    pub setting: Option<Flag>,
    /// Default value served when no rule matches.
    pub value: Value,
    #[serde(default)]
    /// Ordered targeting rules.
    pub rollout_rules: Vec<TargetingRule>,
    #[serde(default)]
    /// Percentage buckets, summing to 100 when present.
    pub rollout_percentage_items: Vec<PercentageItem>,
    #[serde(default)]
    /// Whether the credential may only read the value.
    pub read_only: bool,
}

/// SDK key pair for a config/environment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SdkKeys {
    /// Primary key.
    pub primary: String,
    #[serde(default)]
    /// Secondary key during rotation.
    pub secondary: Option<String>,
}

/// Payload for creating or updating a product.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct ProductRequest {
    /// Product name.
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    /// Free-form description.
    pub description: Option<String>,
}

/// Payload for creating or updating a config.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct ConfigRequest {
    /// Config name.
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    /// Free-form description.
    pub description: Option<String>,
}

/// Payload for creating or updating an environment.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct EnvironmentRequest {
    /// Environment name.
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    /// Display color.
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    /// Free-form description.
    pub description: Option<String>,
}

/// Payload for creating or updating a tag.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct TagRequest {
    /// Tag name.
    pub name: String,
    /// Palette color name or hex value.
    pub color: Option<String>,
}

/// Payload for creating a flag.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct CreateFlagRequest {
    /// Key used by SDKs.
    pub key: String,
    /// Display name.
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    /// Hint shown in the dashboard.
    pub hint: Option<String>,
    /// Value type.
    pub setting_type: SettingType,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    /// Tags attached at creation.
    pub tag_ids: Vec<i64>,
}

/// Targeting rule as sent to the value endpoint.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct TargetingRuleRequest {
    /// User attribute compared by the rule.
    pub comparison_attribute: String,
    /// Comparator name.
    pub comparator: String,
    /// Value the attribute is compared to.
    pub comparison_value: String,
    /// Value served when the rule matches.
    pub value: Value,
}

impl From<&TargetingRule> for TargetingRuleRequest {
    fn from(rule: &TargetingRule) -> Self {
        Self {
            comparison_attribute: rule.comparison_attribute.clone(),
            comparator: rule.comparator.clone(),
            comparison_value: rule.comparison_value.clone(),
            value: rule.value.clone(),
        }
    }
}

/// Percentage bucket as sent to the value endpoint.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct PercentageItemRequest {
    /// Share of users in the bucket.
    pub percentage: u8,
    /// Value served to the bucket.
    pub value: Value,
}

impl From<&PercentageItem> for PercentageItemRequest {
    fn from(item: &PercentageItem) -> Self {
        Self {
            percentage: item.percentage,
            value: item.value.clone(),
        }
    }
}

/// Full replacement of a flag value in one environment.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct FlagValueRequest {
    /// Default value.
    pub value: Value,
    /// Ordered targeting rules.
    pub rollout_rules: Vec<TargetingRuleRequest>,
    /// Percentage buckets.
    pub rollout_percentage_items: Vec<PercentageItemRequest>,
}

impl From<&FlagValue> for FlagValueRequest {
    fn from(current: &FlagValue) -> Self {
        Self {
            value: current.value.clone(),
            rollout_rules: current.rollout_rules.iter().map(Into::into).collect(),
            rollout_percentage_items: current
                .rollout_percentage_items
                .iter()
                .map(Into::into)
                .collect(),
        }
    }
}

/// JSON Patch operation kind.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PatchOp {
    /// Insert a value.
    Add,
    /// Remove the value at the path.
    Remove,
    /// Replace the value at the path.
    Replace,
}

/// Single JSON Patch operation.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PatchOperation {
    /// Operation kind.
    pub op: PatchOp,
    /// JSON Pointer to the target.
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    /// Operand for `add`/`replace`.
    pub value: Option<Value>,
}

impl PatchOperation {
    /// `replace` operation.
    #[must_use]
    pub fn replace(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            op: PatchOp::Replace,
            path: path.into(),
            value: Some(value.into()),
        }
    }

    /// `add` operation.
    #[must_use]
    pub fn add(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            op: PatchOp::Add,
            path: path.into(),
            value: Some(value.into()),
        }
    }

    /// `remove` operation.
    #[must_use]
    pub fn remove(path: impl Into<String>) -> Self {
        Self {
            op: PatchOp::Remove,
            path: path.into(),
            value: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tag_request_uses_pascal_case() -> Result<(), serde_json::Error> {
        let payload = serde_json::to_value(TagRequest {
            name: "Beta".into(),
            color: Some("#ff0000".into()),
        })?;
        assert_eq!(payload, json!({"Name": "Beta", "Color": "#ff0000"}));
        Ok(())
    }

    #[test]
    fn flag_value_decodes_camel_case() -> Result<(), serde_json::Error> {
        let value: FlagValue = serde_json::from_value(json!({
            "value": true,
            "rolloutRules": [{
                "comparisonAttribute": "Email",
                "comparator": "contains",
                "comparisonValue": "@example.com",
                "value": false
            }],
            "rolloutPercentageItems": [{"percentage": 30, "value": true}]
        }))?;
        assert_eq!(value.rollout_rules.len(), 1);
        assert_eq!(value.rollout_percentage_items[0].percentage, 30);

        let request = serde_json::to_value(FlagValueRequest::from(&value))?;
        assert_eq!(request["RolloutRules"][0]["ComparisonAttribute"], "Email");
        assert_eq!(request["RolloutPercentageItems"][0]["Percentage"], 30);
        Ok(())
    }

    #[test]
    fn setting_type_parses_values() {
        assert_eq!(SettingType::Boolean.parse_value("TRUE"), Some(json!(true)));
        assert_eq!(SettingType::Boolean.parse_value("yes"), None);
        assert_eq!(SettingType::Int.parse_value(" 42 "), Some(json!(42)));
        assert_eq!(SettingType::Int.parse_value("4.2"), None);
        assert_eq!(SettingType::Double.parse_value("4.5"), Some(json!(4.5)));
        assert_eq!(SettingType::Double.parse_value("NaN"), None);
        assert_eq!(SettingType::String.parse_value(" x "), Some(json!(" x ")));
        assert_eq!(SettingType::parse("Integer"), Some(SettingType::Int));
        assert_eq!(SettingType::parse("json"), None);
    }

    #[test]
    fn patch_operations_serialize_rfc6902() -> Result<(), serde_json::Error> {
        let ops = vec![
            PatchOperation::replace("/name", "New"),
            PatchOperation::add("/tags/-", 5),
            PatchOperation::remove("/tags/0"),
        ];
        assert_eq!(
            serde_json::to_value(ops)?,
            json!([
                {"op": "replace", "path": "/name", "value": "New"},
                {"op": "add", "path": "/tags/-", "value": 5},
                {"op": "remove", "path": "/tags/0"}
            ])
        );
        Ok(())
    }

    #[test]
    fn problem_message_prefers_detail() {
        let problem = ProblemDetails {
            title: "Bad Request".into(),
            detail: Some("name is required".into()),
        };
        assert_eq!(problem.message(), Some("name is required"));
        assert_eq!(ProblemDetails::default().message(), None);
    }
}
