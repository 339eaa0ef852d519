use serde::{Deserialize, Serialize};

/// An object written to the output bucket. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredObject {
    pub bucket: String,
    pub key: String,
    pub content_type: String,
}

/// Time-limited read access to a [`StoredObject`]. Recomputed per request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessGrant {
    pub url: String,
    pub expires_in_seconds: u64,
}
