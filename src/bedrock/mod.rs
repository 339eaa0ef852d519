pub mod image_client;

use crate::{
    config::BedrockConfig,
    error::Result,
    models::{GeneratedImage, GenerationRequest},
};
use async_trait::async_trait;
use aws_config::{timeout::TimeoutConfig, BehaviorVersion};
use aws_sdk_bedrockruntime::{
    config::{Credentials, Region},
    Client,
};
use std::time::Duration;

pub use image_client::{ImageClient, ModelFamily};

/// Anything that can turn a prompt into an image.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    fn model_id(&self) -> &str;

    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedImage>;
}

#[derive(Clone)]
pub struct BedrockClient {
    client: Client,
}

impl BedrockClient {
    /// Every InvokeModel call is bounded by `timeout`.
    pub async fn new(bedrock_config: &BedrockConfig, timeout: Duration) -> Result<Self> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(bedrock_config.region_or_default()))
            .timeout_config(
                TimeoutConfig::builder()
                    .operation_timeout(timeout)
                    .build(),
            );

        if let (Some(access_key), Some(secret_key)) =
            (&bedrock_config.access_key, &bedrock_config.secret_key)
        {
            loader = loader.credentials_provider(Credentials::new(
                access_key,
                secret_key,
                None,
                None,
                "rgenai-poster",
            ));
        }

        let aws_config = loader.load().await;
        log::debug!(
            "Bedrock client configured for region {}",
            bedrock_config.region_or_default()
        );

        Ok(Self {
            client: Client::new(&aws_config),
        })
    }

    pub fn image(&self, model_id: impl Into<String>) -> Result<ImageClient> {
        ImageClient::new(self.client.clone(), model_id)
    }
}
