use crate::{
    error::Result,
    models::{AccessGrant, StoredObject},
};
use async_trait::async_trait;
use std::time::Duration;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    fn bucket(&self) -> &str;

    /// Single-shot write. The object is either fully stored or not at all.
    async fn put_object(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<StoredObject>;

    async fn presign_get(&self, object: &StoredObject, expires_in: Duration)
        -> Result<AccessGrant>;
}
