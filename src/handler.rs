use crate::{
    bedrock::{BedrockClient, ImageGenerator},
    config::AppConfig,
    error::{GenError, Result},
    event::{self, ApiResponse},
    logger,
    models::{GenerationRequestBody, GenerationResponse},
    storage::{self, KeyGenerator, ObjectStore},
};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// prompt → Bedrock → bucket → presigned URL.
///
/// Holds only read-only client handles, so one instance serves every
/// invocation of a warm sandbox.
pub struct GenerateHandler {
    generator: Arc<dyn ImageGenerator>,
    store: Arc<dyn ObjectStore>,
    keys: KeyGenerator,
    url_expiry: Duration,
    max_prompt_chars: usize,
}

impl GenerateHandler {
    pub fn new(generator: Arc<dyn ImageGenerator>, store: Arc<dyn ObjectStore>) -> Self {
        let defaults = AppConfig::default();
        Self {
            generator,
            store,
            keys: KeyGenerator::new(defaults.key_prefix.clone()),
            url_expiry: defaults.url_expiry(),
            max_prompt_chars: defaults.max_prompt_chars,
        }
    }

    /// Builds the AWS-backed handler. `allow_memory_store` lets local runs
    /// work without a bucket.
    pub async fn from_config(config: &AppConfig, allow_memory_store: bool) -> Result<Self> {
        let bedrock = BedrockClient::new(&config.bedrock, config.request_timeout()).await?;
        let generator = Arc::new(bedrock.image(config.model_id.clone())?);
        let store = storage::build_store(config, allow_memory_store).await?;

        Ok(Self::new(generator, store)
            .with_key_prefix(config.key_prefix.clone())
            .with_url_expiry(config.url_expiry())
            .with_max_prompt_chars(config.max_prompt_chars))
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.keys = KeyGenerator::new(prefix);
        self
    }

    pub fn with_url_expiry(mut self, expiry: Duration) -> Self {
        self.url_expiry = expiry;
        self
    }

    pub fn with_max_prompt_chars(mut self, max: usize) -> Self {
        self.max_prompt_chars = max;
        self
    }

    pub async fn generate(&self, body: GenerationRequestBody) -> Result<GenerationResponse> {
        let request = body.validate(self.max_prompt_chars)?;

        let image = self.generator.generate(&request).await?;
        log::info!(
            "🎨 Generated {} bytes with {} (seed {})",
            image.bytes.len(),
            image.model_id,
            image.seed
        );

        let key = self.keys.next_key(image.format);
        let object = {
            let _timer = logger::timer("storage put_object");
            self.store
                .put_object(&key, image.bytes, image.format.content_type())
                .await?
        };
        let grant = self.store.presign_get(&object, self.url_expiry).await?;

        Ok(GenerationResponse {
            bucket: object.bucket,
            key: object.key,
            url: grant.url,
            seed: image.seed,
            model_id: image.model_id,
            content_type: object.content_type,
            expires_in_seconds: grant.expires_in_seconds,
        })
    }

    /// Runs a request body through [`generate`](Self::generate), turning every
    /// failure into a JSON error response.
    pub async fn handle_payload(&self, payload: Value) -> ApiResponse {
        let result = match serde_json::from_value::<GenerationRequestBody>(payload) {
            Ok(body) => self.generate(body).await,
            Err(e) => Err(GenError::InvalidRequest(format!("Invalid request body: {}", e))),
        };

        match result {
            Ok(response) => {
                log::info!("✅ Stored {} in {}", response.key, response.bucket);
                ApiResponse::ok(&response)
            }
            Err(err) => {
                if err.is_client_error() {
                    log::warn!("Rejected request: {}", err);
                } else {
                    log::error!("Generation failed: {}", err);
                }
                ApiResponse::from_error(&err)
            }
        }
    }

    /// Entry point for a raw Lambda event. Always yields an API Gateway
    /// proxy response.
    pub async fn handle_event(&self, event: Value, request_id: &str) -> Value {
        logger::set_request_id(request_id);
        let response = match event::parse_event(event) {
            Ok(payload) => self.handle_payload(payload).await,
            Err(err) => {
                log::warn!("Rejected event: {}", err);
                ApiResponse::from_error(&err)
            }
        };
        log::info!("Responding with status {}", response.status);
        logger::clear_request_id();
        response.into_proxy_response()
    }
}
