use crate::{
    error::{GenError, Result},
    models::{AccessGrant, StoredObject},
    storage::traits::ObjectStore,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use uuid::Uuid;

const SCHEME: &str = "memory://";

struct StoredBlob {
    bytes: Vec<u8>,
    content_type: String,
}

struct Grant {
    key: String,
    expires_at: DateTime<Utc>,
}

#[derive(Default)]
struct MemoryState {
    objects: HashMap<String, StoredBlob>,
    grants: HashMap<String, Grant>,
}

/// Object store held in process memory. Presigned URLs are opaque tokens that
/// [`MemoryObjectStore::fetch`] honours until they expire.
pub struct MemoryObjectStore {
    bucket: String,
    state: Mutex<MemoryState>,
}

impl MemoryObjectStore {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            state: Mutex::new(MemoryState::default()),
        }
    }

    fn state(&self) -> Result<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|e| GenError::storage("Storage unavailable", e))
    }

    pub fn len(&self) -> usize {
        self.state().map(|s| s.objects.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.state()
            .ok()
            .and_then(|s| s.objects.get(key).map(|blob| blob.bytes.clone()))
    }

    /// Dereferences a URL from [`ObjectStore::presign_get`], returning the
    /// bytes and content type.
    pub fn fetch(&self, url: &str) -> Result<(Vec<u8>, String)> {
        let (location, token) = url
            .strip_prefix(SCHEME)
            .and_then(|rest| rest.split_once("?token="))
            .ok_or_else(|| GenError::storage("Access denied", format!("malformed url {}", url)))?;
        let key = location
            .strip_prefix(self.bucket.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
            .ok_or_else(|| GenError::storage("Access denied", "bucket mismatch"))?;

        let state = self.state()?;
        let grant = state
            .grants
            .get(token)
            .filter(|grant| grant.key == key)
            .ok_or_else(|| GenError::storage("Access denied", "unknown token"))?;
        if Utc::now() >= grant.expires_at {
            return Err(GenError::storage("Request has expired", key));
        }

        let blob = state
            .objects
            .get(key)
            .ok_or_else(|| GenError::storage("NoSuchKey", key))?;
        Ok((blob.bytes.clone(), blob.content_type.clone()))
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn put_object(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<StoredObject> {
        let mut state = self.state()?;
        state.objects.insert(
            key.to_string(),
            StoredBlob {
                bytes,
                content_type: content_type.to_string(),
            },
        );
        Ok(StoredObject {
            bucket: self.bucket.clone(),
            key: key.to_string(),
            content_type: content_type.to_string(),
        })
    }

    async fn presign_get(
        &self,
        object: &StoredObject,
        expires_in: Duration,
    ) -> Result<AccessGrant> {
        let validity = chrono::Duration::from_std(expires_in)
            .map_err(|e| GenError::storage("Failed to generate presigned URL", e))?;
        let token = Uuid::new_v4().simple().to_string();

        let mut state = self.state()?;
        if !state.objects.contains_key(&object.key) {
            return Err(GenError::storage(
                "Failed to generate presigned URL",
                format!("no object at {}", object.key),
            ));
        }
        let now = Utc::now();
        state.grants.retain(|_, grant| grant.expires_at > now);
        state.grants.insert(
            token.clone(),
            Grant {
                key: object.key.clone(),
                expires_at: now + validity,
            },
        );

        Ok(AccessGrant {
            url: format!("{}{}/{}?token={}", SCHEME, object.bucket, object.key, token),
            expires_in_seconds: expires_in.as_secs(),
        })
    }
}
