use serde::{Deserialize, Serialize};

use crate::database::entity::{Entity, EntityMeta};

/// Client credential. The secret itself is never stored, only
/// `hash = sha256("key:secret")`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyEntity {
    #[serde(flatten)]
    pub meta: EntityMeta,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub key: String,
    pub hash: String,
    pub encryption_key: String,
    pub passphrase: String,
    pub is_active: bool,
}

impl Entity for ApiKeyEntity {
    const COLLECTION: &'static str = "api_keys";
}
