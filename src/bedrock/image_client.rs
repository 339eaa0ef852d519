use crate::{
    bedrock::ImageGenerator,
    error::{GenError, Result},
    logger,
    models::{
        GeneratedImage, GenerationRequest, OutputFormat, StabilityImageResponse,
        TitanImageResponse, MAX_SEED,
    },
};
use async_trait::async_trait;
use aws_sdk_bedrockruntime::{
    error::{DisplayErrorContext, ProvideErrorMetadata, SdkError},
    operation::invoke_model::InvokeModelError,
    primitives::Blob,
    Client,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::Rng;
use serde_json::{json, Value};

pub const TITAN_MAX_SEED: u32 = 2_147_483_646;
pub const TITAN_MAX_PROMPT_CHARS: usize = 512;

/// Request/response dialect spoken by a Bedrock image model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFamily {
    Stability,
    Titan,
}

impl ModelFamily {
    pub fn from_model_id(model_id: &str) -> Result<Self> {
        if model_id.contains("stability.sd3") || model_id.contains("stability.stable-image") {
            Ok(ModelFamily::Stability)
        } else if model_id.contains("amazon.titan-image-generator") {
            Ok(ModelFamily::Titan)
        } else {
            Err(GenError::Config(format!(
                "Unsupported image model: {}",
                model_id
            )))
        }
    }

    fn max_seed(&self) -> u32 {
        match self {
            ModelFamily::Stability => MAX_SEED,
            ModelFamily::Titan => TITAN_MAX_SEED,
        }
    }

    /// Stability treats 0 as "pick one for me", so draw from 1 upwards.
    fn random_seed(&self) -> u32 {
        let low = match self {
            ModelFamily::Stability => 1,
            ModelFamily::Titan => 0,
        };
        rand::thread_rng().gen_range(low..=self.max_seed())
    }
}

#[derive(Clone)]
pub struct ImageClient {
    client: Client,
    model_id: String,
    family: ModelFamily,
}

impl ImageClient {
    pub fn new(client: Client, model_id: impl Into<String>) -> Result<Self> {
        let model_id = model_id.into();
        let family = ModelFamily::from_model_id(&model_id)?;
        Ok(Self {
            client,
            model_id,
            family,
        })
    }

    pub fn supported_models() -> Vec<(&'static str, &'static str, &'static str)> {
        vec![
            ("stability.sd3-5-large-v1:0", "Stable Diffusion 3.5 Large", "Stability AI"),
            ("stability.stable-image-core-v1:1", "Stable Image Core", "Stability AI"),
            ("stability.stable-image-ultra-v1:1", "Stable Image Ultra", "Stability AI"),
            ("amazon.titan-image-generator-v1", "Titan Image Generator G1", "Amazon"),
            ("amazon.titan-image-generator-v2:0", "Titan Image Generator G1 v2", "Amazon"),
        ]
    }

    /// Seed that will be sent to the model. Rejects requests the model would refuse.
    pub fn resolve_seed(&self, request: &GenerationRequest) -> Result<u32> {
        match request.seed {
            Some(seed) if seed > self.family.max_seed() => Err(GenError::InvalidRequest(format!(
                "'seed' must be between 0 and {} for {}",
                self.family.max_seed(),
                self.model_id
            ))),
            Some(seed) => Ok(seed),
            None => Ok(self.family.random_seed()),
        }
    }

    pub fn build_payload(&self, request: &GenerationRequest, seed: u32) -> Result<Value> {
        let payload = match self.family {
            ModelFamily::Stability => {
                let mut payload = json!({
                    "prompt": request.prompt,
                    "aspect_ratio": request.aspect_ratio.as_str(),
                    "output_format": request.output_format.as_str(),
                    "seed": seed
                });
                // Stable Image Core/Ultra only do text-to-image and have no `mode` key.
                if self.model_id.contains("sd3") {
                    payload["mode"] = json!("text-to-image");
                }
                if let Some(negative) = &request.negative_prompt {
                    payload["negative_prompt"] = json!(negative);
                }
                payload
            }
            ModelFamily::Titan => {
                if request.output_format != OutputFormat::Png {
                    return Err(GenError::InvalidRequest(format!(
                        "'outputFormat' {} is not supported by {}",
                        request.output_format, self.model_id
                    )));
                }
                if request.prompt.chars().count() > TITAN_MAX_PROMPT_CHARS {
                    return Err(GenError::InvalidRequest(format!(
                        "Prompt too long (max {} chars)",
                        TITAN_MAX_PROMPT_CHARS
                    )));
                }
                let (width, height) = request.aspect_ratio.titan_dimensions();
                let mut params = json!({ "text": request.prompt });
                if let Some(negative) = &request.negative_prompt {
                    params["negativeText"] = json!(negative);
                }
                json!({
                    "taskType": "TEXT_IMAGE",
                    "textToImageParams": params,
                    "imageGenerationConfig": {
                        "numberOfImages": 1,
                        "width": width,
                        "height": height,
                        "quality": "standard",
                        "cfgScale": 8.0,
                        "seed": seed
                    }
                })
            }
        };
        Ok(payload)
    }

    pub fn parse_response(
        &self,
        body: &[u8],
        sent_seed: u32,
        format: OutputFormat,
    ) -> Result<GeneratedImage> {
        let (encoded, seed) = match self.family {
            ModelFamily::Stability => {
                let response: StabilityImageResponse = serde_json::from_slice(body)
                    .map_err(|e| GenError::upstream("Invalid Bedrock response", e))?;

                if let Some(Some(_)) = response.finish_reasons.first() {
                    return Err(GenError::ContentFiltered {
                        reasons: response.finish_reasons.into_iter().flatten().collect(),
                    });
                }

                // The reported seed wins: a requested seed of 0 means the model picked one.
                let seed = match response.seeds.first() {
                    Some(&reported) => u32::try_from(reported).map_err(|_| {
                        GenError::upstream(
                            "Invalid Bedrock response",
                            format!("seed {} out of range", reported),
                        )
                    })?,
                    None => sent_seed,
                };
                (response.images.into_iter().next(), seed)
            }
            ModelFamily::Titan => {
                let response: TitanImageResponse = serde_json::from_slice(body)
                    .map_err(|e| GenError::upstream("Invalid Bedrock response", e))?;

                if let Some(error) = response.error {
                    return Err(GenError::ContentFiltered {
                        reasons: vec![error],
                    });
                }
                (response.images.into_iter().next(), sent_seed)
            }
        };

        let encoded = encoded
            .filter(|image| !image.is_empty())
            .ok_or_else(|| GenError::upstream("No image returned from model", "empty images"))?;

        let bytes = STANDARD
            .decode(encoded.as_bytes())
            .map_err(|e| GenError::upstream("Image decode failed", e))?;

        if !format.matches_signature(&bytes) {
            return Err(GenError::upstream(
                "Invalid image returned from model",
                format!("{} bytes not recognised as {}", bytes.len(), format),
            ));
        }

        Ok(GeneratedImage {
            bytes,
            seed,
            model_id: self.model_id.clone(),
            format,
        })
    }
}

#[async_trait]
impl ImageGenerator for ImageClient {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedImage> {
        let seed = self.resolve_seed(request)?;
        let request_payload = self.build_payload(request, seed)?;
        let request_json = serde_json::to_string(&request_payload)?;

        log::info!("Generating image with model: {}", self.model_id);
        log::debug!("Image generation request payload: {}", request_json);

        let _timer = logger::timer("bedrock invoke_model");
        let response = self
            .client
            .invoke_model()
            .model_id(&self.model_id)
            .content_type("application/json")
            .accept("application/json")
            .body(Blob::new(request_json.into_bytes()))
            .send()
            .await
            .map_err(map_invoke_error)?;

        let response_bytes = response.body.into_inner();
        log::debug!("Bedrock returned {} bytes", response_bytes.len());

        self.parse_response(&response_bytes, seed, request.output_format)
    }
}

fn map_invoke_error<R>(err: SdkError<InvokeModelError, R>) -> GenError
where
    R: std::fmt::Debug + 'static,
{
    log::error!("AWS SDK Image Generation Error details: {:?}", err);

    if let SdkError::TimeoutError(_) = err {
        return GenError::Timeout("Bedrock InvokeModel timed out".into());
    }

    if let Some(service_error) = err.as_service_error() {
        return classify_service_error(service_error.code(), service_error.message());
    }

    GenError::upstream("Bedrock invoke failed", DisplayErrorContext(&err))
}

/// Maps a Bedrock error code onto the caller-facing taxonomy. Only quota and
/// timeout problems get their own status; everything else is a bad gateway.
pub fn classify_service_error(code: Option<&str>, message: Option<&str>) -> GenError {
    let detail = format!(
        "{} - {}",
        code.unwrap_or("unknown"),
        message.unwrap_or("no message")
    );
    match code {
        Some("ThrottlingException") | Some("ServiceQuotaExceededException") => {
            GenError::QuotaExceeded(detail)
        }
        Some("ModelTimeoutException") => GenError::Timeout(detail),
        _ => GenError::upstream("Bedrock invoke failed", detail),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AspectRatio;
    use aws_sdk_bedrockruntime::config::{
        retry::RetryConfig, timeout::TimeoutConfig, BehaviorVersion, Credentials, Region,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\x00\x00\x00\x0dIHDR";
    const JPEG: &[u8] = b"\xFF\xD8\xFF\xE0\x00\x10JFIF";

    fn client(model_id: &str) -> ImageClient {
        let conf = aws_sdk_bedrockruntime::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-west-2"))
            .build();
        ImageClient::new(Client::from_conf(conf), model_id).unwrap()
    }

    /// Client that talks to `endpoint` with static credentials and no retries.
    fn client_at(model_id: &str, endpoint: &str, timeout: Duration) -> ImageClient {
        let conf = aws_sdk_bedrockruntime::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-west-2"))
            .credentials_provider(Credentials::new("AKIDTEST", "secret", None, None, "test"))
            .endpoint_url(endpoint)
            .timeout_config(TimeoutConfig::builder().operation_timeout(timeout).build())
            .retry_config(RetryConfig::disabled())
            .build();
        ImageClient::new(Client::from_conf(conf), model_id).unwrap()
    }

    /// Local endpoint that accepts connections and never answers.
    async fn silent_endpoint() -> (String, Arc<AtomicUsize>) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepted = Arc::new(AtomicUsize::new(0));
        let counter = accepted.clone();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                held.push(socket);
            }
        });
        (format!("http://{}", addr), accepted)
    }

    #[tokio::test]
    async fn test_generate_timeout_maps_to_504() {
        let (endpoint, accepted) = silent_endpoint().await;
        let client = client_at(
            "stability.sd3-5-large-v1:0",
            &endpoint,
            Duration::from_millis(300),
        );
        let err = client
            .generate(&GenerationRequest::new("slow poster"))
            .await
            .unwrap_err();
        assert!(matches!(err, GenError::Timeout(_)), "{:?}", err);
        assert_eq!(err.status_code(), 504);
        assert!(accepted.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn test_generate_rejects_before_sending() {
        let (endpoint, accepted) = silent_endpoint().await;
        let titan = client_at(
            "amazon.titan-image-generator-v1",
            &endpoint,
            Duration::from_secs(5),
        );

        let jpeg = GenerationRequest::new("x").with_output_format(OutputFormat::Jpeg);
        let err = titan.generate(&jpeg).await.unwrap_err();
        assert!(matches!(err, GenError::InvalidRequest(_)), "{:?}", err);
        assert_eq!(err.status_code(), 400);

        let too_big = GenerationRequest::new("x").with_seed(TITAN_MAX_SEED + 1);
        assert!(matches!(
            titan.generate(&too_big).await,
            Err(GenError::InvalidRequest(_))
        ));

        tokio::task::yield_now().await;
        assert_eq!(accepted.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_stability_seed_zero_reports_model_seed() {
        let client = client("stability.sd3-5-large-v1:0");
        let request = GenerationRequest::new("x").with_seed(0);
        let sent = client.resolve_seed(&request).unwrap();
        assert_eq!(sent, 0);
        assert_eq!(client.build_payload(&request, sent).unwrap()["seed"], 0);

        let body = json!({
            "seeds": [2_718_281_828u64],
            "finish_reasons": [null],
            "images": [STANDARD.encode(PNG)]
        });
        let image = client
            .parse_response(body.to_string().as_bytes(), sent, OutputFormat::Png)
            .unwrap();
        assert_eq!(image.seed, 2_718_281_828);
    }

    #[test]
    fn test_stable_image_payload_has_no_mode() {
        let client = client("stability.stable-image-core-v1:1");
        let payload = client
            .build_payload(&GenerationRequest::new("harbour"), 3)
            .unwrap();
        assert!(payload.get("mode").is_none());
        assert_eq!(payload["prompt"], "harbour");
        assert_eq!(payload["aspect_ratio"], "1:1");
    }

    #[test]
    fn test_model_family_detection() {
        assert_eq!(
            ModelFamily::from_model_id("stability.sd3-5-large-v1:0").unwrap(),
            ModelFamily::Stability
        );
        assert_eq!(
            ModelFamily::from_model_id("us.stability.stable-image-core-v1:1").unwrap(),
            ModelFamily::Stability
        );
        assert_eq!(
            ModelFamily::from_model_id("amazon.titan-image-generator-v2:0").unwrap(),
            ModelFamily::Titan
        );
        assert!(matches!(
            ModelFamily::from_model_id("anthropic.claude-3-haiku"),
            Err(GenError::Config(_))
        ));
        for (id, _, _) in ImageClient::supported_models() {
            assert!(ModelFamily::from_model_id(id).is_ok());
        }
    }

    #[test]
    fn test_stability_payload() {
        let client = client("stability.sd3-5-large-v1:0");
        let mut request = GenerationRequest::new("city at dusk")
            .with_aspect_ratio(AspectRatio::Portrait9x16)
            .with_output_format(OutputFormat::Jpeg);
        request.negative_prompt = Some("text".into());

        let payload = client.build_payload(&request, 7).unwrap();
        assert_eq!(payload["prompt"], "city at dusk");
        assert_eq!(payload["mode"], "text-to-image");
        assert_eq!(payload["aspect_ratio"], "9:16");
        assert_eq!(payload["output_format"], "jpeg");
        assert_eq!(payload["seed"], 7);
        assert_eq!(payload["negative_prompt"], "text");
    }

    #[test]
    fn test_titan_payload() {
        let client = client("amazon.titan-image-generator-v1");
        let request =
            GenerationRequest::new("lighthouse").with_aspect_ratio(AspectRatio::Landscape16x9);
        let payload = client.build_payload(&request, 99).unwrap();
        assert_eq!(payload["taskType"], "TEXT_IMAGE");
        assert_eq!(payload["textToImageParams"]["text"], "lighthouse");
        assert!(payload["textToImageParams"].get("negativeText").is_none());
        assert_eq!(payload["imageGenerationConfig"]["width"], 1408);
        assert_eq!(payload["imageGenerationConfig"]["height"], 768);
        assert_eq!(payload["imageGenerationConfig"]["seed"], 99);
    }

    #[test]
    fn test_titan_rejects_jpeg_and_long_prompt() {
        let client = client("amazon.titan-image-generator-v1");
        let jpeg = GenerationRequest::new("x").with_output_format(OutputFormat::Jpeg);
        assert!(matches!(
            client.build_payload(&jpeg, 1),
            Err(GenError::InvalidRequest(_))
        ));
        let long = GenerationRequest::new("a".repeat(TITAN_MAX_PROMPT_CHARS + 1));
        assert!(matches!(
            client.build_payload(&long, 1),
            Err(GenError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_seed_resolution() {
        let stability = client("stability.sd3-5-large-v1:0");
        let titan = client("amazon.titan-image-generator-v1");

        let fixed = GenerationRequest::new("x").with_seed(1234);
        assert_eq!(stability.resolve_seed(&fixed).unwrap(), 1234);
        assert_eq!(titan.resolve_seed(&fixed).unwrap(), 1234);

        let too_big = GenerationRequest::new("x").with_seed(TITAN_MAX_SEED + 1);
        assert!(stability.resolve_seed(&too_big).is_ok());
        assert!(matches!(
            titan.resolve_seed(&too_big),
            Err(GenError::InvalidRequest(_))
        ));

        let open = GenerationRequest::new("x");
        for _ in 0..100 {
            let seed = stability.resolve_seed(&open).unwrap();
            assert!((1..=MAX_SEED).contains(&seed));
            assert!(titan.resolve_seed(&open).unwrap() <= TITAN_MAX_SEED);
        }
    }

    #[test]
    fn test_parse_stability_response() {
        let client = client("stability.sd3-5-large-v1:0");
        let body = json!({
            "seeds": [31337],
            "finish_reasons": [null],
            "images": [STANDARD.encode(PNG)]
        });
        let image = client
            .parse_response(body.to_string().as_bytes(), 5, OutputFormat::Png)
            .unwrap();
        assert_eq!(image.bytes, PNG);
        assert_eq!(image.seed, 31337);
        assert_eq!(image.model_id, "stability.sd3-5-large-v1:0");
    }

    #[test]
    fn test_parse_stability_without_seed_uses_sent_seed() {
        let client = client("stability.sd3-5-large-v1:0");
        let body = json!({ "images": [STANDARD.encode(JPEG)] });
        let image = client
            .parse_response(body.to_string().as_bytes(), 5, OutputFormat::Jpeg)
            .unwrap();
        assert_eq!(image.seed, 5);
        assert_eq!(image.format, OutputFormat::Jpeg);
    }

    #[test]
    fn test_parse_filtered_response() {
        let client = client("stability.sd3-5-large-v1:0");
        let body = json!({
            "seeds": [1],
            "finish_reasons": ["Filter reason: prompt"],
            "images": []
        });
        let err = client
            .parse_response(body.to_string().as_bytes(), 1, OutputFormat::Png)
            .unwrap_err();
        match err {
            GenError::ContentFiltered { reasons } => {
                assert_eq!(reasons, vec!["Filter reason: prompt".to_string()])
            }
            other => panic!("unexpected error: {:?}", other),
        }

        let titan = client_titan();
        let body = json!({ "images": [], "error": "blocked by content filters" });
        assert!(matches!(
            titan.parse_response(body.to_string().as_bytes(), 1, OutputFormat::Png),
            Err(GenError::ContentFiltered { .. })
        ));
    }

    fn client_titan() -> ImageClient {
        client("amazon.titan-image-generator-v1")
    }

    #[test]
    fn test_parse_malformed_responses_are_upstream_errors() {
        let client = client("stability.sd3-5-large-v1:0");
        let cases = [
            b"not json".to_vec(),
            json!({ "images": [] }).to_string().into_bytes(),
            json!({ "images": [""] }).to_string().into_bytes(),
            json!({ "images": ["!!not base64!!"] }).to_string().into_bytes(),
            json!({ "images": [STANDARD.encode(b"plain text")] })
                .to_string()
                .into_bytes(),
            json!({ "images": [STANDARD.encode(JPEG)] }).to_string().into_bytes(),
        ];
        for body in cases {
            let err = client
                .parse_response(&body, 1, OutputFormat::Png)
                .unwrap_err();
            assert_eq!(err.status_code(), 502, "body: {:?}", String::from_utf8_lossy(&body));
        }
    }

    #[test]
    fn test_classify_service_error() {
        assert!(matches!(
            classify_service_error(Some("ThrottlingException"), Some("slow down")),
            GenError::QuotaExceeded(_)
        ));
        assert!(matches!(
            classify_service_error(Some("ServiceQuotaExceededException"), None),
            GenError::QuotaExceeded(_)
        ));
        assert!(matches!(
            classify_service_error(Some("ModelTimeoutException"), None),
            GenError::Timeout(_)
        ));
        let err = classify_service_error(Some("AccessDeniedException"), Some("no access"));
        assert_eq!(err.status_code(), 502);
        assert_eq!(err.public_message(), "Bedrock invoke failed");
        assert_eq!(classify_service_error(None, None).status_code(), 502);
    }
}
