use crate::error::{GenError, Result};
use std::env;
use std::time::Duration;

pub const DEFAULT_BEDROCK_REGION: &str = "us-west-2";
pub const DEFAULT_MODEL_ID: &str = "stability.sd3-5-large-v1:0";
pub const DEFAULT_KEY_PREFIX: &str = "sd35/";
pub const DEFAULT_URL_EXPIRY_SECONDS: u64 = 3600;
pub const DEFAULT_MAX_PROMPT_CHARS: usize = 800;
pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 60;
pub const DEFAULT_PORT: u16 = 8080;

/// S3 rejects presigned URLs valid for longer than seven days.
pub const MAX_URL_EXPIRY_SECONDS: u64 = 604_800;

#[derive(Debug, Clone)]
pub struct BedrockConfig {
    pub region: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
}

impl Default for BedrockConfig {
    fn default() -> Self {
        BedrockConfig {
            region: None,
            access_key: None,
            secret_key: None,
        }
    }
}

impl BedrockConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_credentials(
        mut self,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        self.access_key = Some(access_key.into());
        self.secret_key = Some(secret_key.into());
        self
    }

    pub fn region_or_default(&self) -> String {
        self.region
            .clone()
            .unwrap_or_else(|| DEFAULT_BEDROCK_REGION.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub output_bucket: Option<String>,
    pub bedrock: BedrockConfig,
    pub model_id: String,
    pub key_prefix: String,
    pub url_expiry_seconds: u64,
    pub max_prompt_chars: usize,
    pub request_timeout_seconds: u64,
    pub port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            output_bucket: None,
            bedrock: BedrockConfig::new().with_region(DEFAULT_BEDROCK_REGION),
            model_id: DEFAULT_MODEL_ID.to_string(),
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            url_expiry_seconds: DEFAULT_URL_EXPIRY_SECONDS,
            max_prompt_chars: DEFAULT_MAX_PROMPT_CHARS,
            request_timeout_seconds: DEFAULT_REQUEST_TIMEOUT_SECONDS,
            port: DEFAULT_PORT,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from any variable source. Empty values count
    /// as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let mut bedrock = BedrockConfig::new()
            .with_region(var("BEDROCK_REGION").unwrap_or_else(|| DEFAULT_BEDROCK_REGION.into()));
        if let (Some(access_key), Some(secret_key)) = (
            var("BEDROCK_ACCESS_KEY_ID"),
            var("BEDROCK_SECRET_ACCESS_KEY"),
        ) {
            bedrock = bedrock.with_credentials(access_key, secret_key);
        }

        let config = AppConfig {
            output_bucket: var("OUTPUT_BUCKET"),
            bedrock,
            model_id: var("MODEL_ID").unwrap_or(defaults.model_id),
            // An explicitly empty prefix is allowed.
            key_prefix: lookup("KEY_PREFIX").unwrap_or(defaults.key_prefix),
            url_expiry_seconds: parse_var(&var, "URL_EXPIRY_SECONDS")?
                .unwrap_or(defaults.url_expiry_seconds),
            max_prompt_chars: parse_var(&var, "MAX_PROMPT_CHARS")?
                .unwrap_or(defaults.max_prompt_chars),
            request_timeout_seconds: parse_var(&var, "REQUEST_TIMEOUT_SECONDS")?
                .unwrap_or(defaults.request_timeout_seconds),
            port: parse_var(&var, "PORT")?.unwrap_or(defaults.port),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.model_id.trim().is_empty() {
            return Err(GenError::Config("MODEL_ID must not be empty".into()));
        }
        if !(1..=MAX_URL_EXPIRY_SECONDS).contains(&self.url_expiry_seconds) {
            return Err(GenError::Config(format!(
                "URL_EXPIRY_SECONDS must be between 1 and {}",
                MAX_URL_EXPIRY_SECONDS
            )));
        }
        if self.max_prompt_chars == 0 {
            return Err(GenError::Config("MAX_PROMPT_CHARS must be positive".into()));
        }
        if self.request_timeout_seconds == 0 {
            return Err(GenError::Config(
                "REQUEST_TIMEOUT_SECONDS must be positive".into(),
            ));
        }
        Ok(())
    }

    /// The Lambda entry point cannot fall back to an in-memory store.
    pub fn require_output_bucket(&self) -> Result<&str> {
        self.output_bucket
            .as_deref()
            .ok_or_else(|| GenError::Config("OUTPUT_BUCKET is required".into()))
    }

    pub fn url_expiry(&self) -> Duration {
        Duration::from_secs(self.url_expiry_seconds)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

fn parse_var<T, F>(var: &F, name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match var(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| GenError::Config(format!("{} has an invalid value: {}", name, raw))),
        None => Ok(None),
    }
}
