use crate::{
    error::{GenError, Result},
    models::{AccessGrant, StoredObject},
    storage::traits::ObjectStore,
};
use async_trait::async_trait;
use aws_config::{timeout::TimeoutConfig, BehaviorVersion};
use aws_sdk_s3::{
    error::DisplayErrorContext, presigning::PresigningConfig, primitives::ByteStream, Client,
};
use std::time::Duration;

pub struct S3ObjectStore {
    client: Client,
    bucket: String,
}

impl S3ObjectStore {
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Uses the default credential and region chain (the Lambda execution role in production).
    pub async fn from_env(bucket: impl Into<String>, timeout: Duration) -> Self {
        let aws_config = aws_config::defaults(BehaviorVersion::latest())
            .timeout_config(
                TimeoutConfig::builder()
                    .operation_timeout(timeout)
                    .build(),
            )
            .load()
            .await;
        Self::new(Client::new(&aws_config), bucket)
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn put_object(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<StoredObject> {
        let size = bytes.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| {
                log::error!("S3 PutObject error details: {:?}", e);
                GenError::storage("S3 upload failed", DisplayErrorContext(&e))
            })?;

        log::info!("Stored {} bytes at s3://{}/{}", size, self.bucket, key);

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
        let presigning = PresigningConfig::expires_in(expires_in)
            .map_err(|e| GenError::storage("Failed to generate presigned URL", e))?;

        let request = self
            .client
            .get_object()
            .bucket(&object.bucket)
            .key(&object.key)
            .presigned(presigning)
            .await
            .map_err(|e| {
                log::error!("S3 presign error details: {:?}", e);
                GenError::storage("Failed to generate presigned URL", DisplayErrorContext(&e))
            })?;

        Ok(AccessGrant {
            url: request.uri().to_string(),
            expires_in_seconds: expires_in.as_secs(),
        })
    }
}
