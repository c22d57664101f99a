use serde::{Deserialize, Serialize};

use crate::database::entity::{Entity, EntityMeta};

pub const MAINTENANCE: &str = "maintenance";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SettingType {
    Boolean,
    String,
    ArrayOfString,
    Number,
}

/// Named configuration value. `value` is always stored as a string and
/// decoded according to `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingEntity {
    #[serde(flatten)]
    pub meta: EntityMeta,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub kind: SettingType,
    pub value: String,
}

impl SettingEntity {
    pub fn new(name: &str, description: Option<String>, kind: SettingType, value: impl Into<String>) -> Self {
        Self { meta: EntityMeta::new(), name: name.to_string(), description, kind, value: value.into() }
    }
}

impl Entity for SettingEntity {
    const COLLECTION: &'static str = "settings";
}
