use crate::error::{GenError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Largest seed the Bedrock image models accept.
pub const MAX_SEED: u32 = 4_294_967_294;

/// Request body as it arrives over the wire. Nothing is trusted yet.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequestBody {
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default, alias = "aspect_ratio")]
    pub aspect_ratio: Option<String>,
    #[serde(default)]
    pub seed: Option<i64>,
    #[serde(default, alias = "output_format")]
    pub output_format: Option<String>,
    #[serde(default, alias = "negative_prompt")]
    pub negative_prompt: Option<String>,
}

impl GenerationRequestBody {
    pub fn validate(self, max_prompt_chars: usize) -> Result<GenerationRequest> {
        let prompt = self.prompt.as_deref().unwrap_or("").trim().to_string();
        if prompt.is_empty() {
            return Err(GenError::InvalidRequest("Missing 'prompt'".into()));
        }
        if prompt.chars().count() > max_prompt_chars {
            return Err(GenError::InvalidRequest(format!(
                "Prompt too long (max {} chars)",
                max_prompt_chars
            )));
        }

        let negative_prompt = self
            .negative_prompt
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty());
        if let Some(negative) = &negative_prompt {
            if negative.chars().count() > max_prompt_chars {
                return Err(GenError::InvalidRequest(format!(
                    "Negative prompt too long (max {} chars)",
                    max_prompt_chars
                )));
            }
        }

        let seed = match self.seed {
            Some(seed) if seed < 0 || seed > MAX_SEED as i64 => {
                return Err(GenError::InvalidRequest(format!(
                    "'seed' must be between 0 and {}",
                    MAX_SEED
                )))
            }
            Some(seed) => Some(seed as u32),
            None => None,
        };

        let aspect_ratio = match self.aspect_ratio.as_deref() {
            Some(raw) => raw.parse()?,
            None => AspectRatio::default(),
        };
        let output_format = match self.output_format.as_deref() {
            Some(raw) => raw.parse()?,
            None => OutputFormat::default(),
        };

        Ok(GenerationRequest {
            prompt,
            aspect_ratio,
            seed,
            output_format,
            negative_prompt,
        })
    }
}

/// A validated generation request.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub aspect_ratio: AspectRatio,
    pub seed: Option<u32>,
    pub output_format: OutputFormat,
    pub negative_prompt: Option<String>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            aspect_ratio: AspectRatio::default(),
            seed: None,
            output_format: OutputFormat::default(),
            negative_prompt: None,
        }
    }

    pub fn with_seed(mut self, seed: u32) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = format;
        self
    }

    pub fn with_aspect_ratio(mut self, ratio: AspectRatio) -> Self {
        self.aspect_ratio = ratio;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Png,
    Jpeg,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpeg",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            OutputFormat::Png => "image/png",
            OutputFormat::Jpeg => "image/jpeg",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpg",
        }
    }

    /// Checks the magic bytes at the start of an encoded image.
    pub fn matches_signature(&self, bytes: &[u8]) -> bool {
        match self {
            OutputFormat::Png => bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]),
            OutputFormat::Jpeg => bytes.starts_with(&[0xFF, 0xD8, 0xFF]),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = GenError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(OutputFormat::Png),
            "jpeg" | "jpg" => Ok(OutputFormat::Jpeg),
            other => Err(GenError::InvalidRequest(format!(
                "Unsupported 'outputFormat': {} (expected png or jpeg)",
                other
            ))),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AspectRatio {
    #[default]
    Square,
    Landscape16x9,
    Landscape21x9,
    Portrait2x3,
    Landscape3x2,
    Portrait4x5,
    Landscape5x4,
    Portrait9x16,
    Portrait9x21,
}

impl AspectRatio {
    pub const ALL: [AspectRatio; 9] = [
        AspectRatio::Square,
        AspectRatio::Landscape16x9,
        AspectRatio::Landscape21x9,
        AspectRatio::Portrait2x3,
        AspectRatio::Landscape3x2,
        AspectRatio::Portrait4x5,
        AspectRatio::Landscape5x4,
        AspectRatio::Portrait9x16,
        AspectRatio::Portrait9x21,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Square => "1:1",
            AspectRatio::Landscape16x9 => "16:9",
            AspectRatio::Landscape21x9 => "21:9",
            AspectRatio::Portrait2x3 => "2:3",
            AspectRatio::Landscape3x2 => "3:2",
            AspectRatio::Portrait4x5 => "4:5",
            AspectRatio::Landscape5x4 => "5:4",
            AspectRatio::Portrait9x16 => "9:16",
            AspectRatio::Portrait9x21 => "9:21",
        }
    }

    /// Closest (width, height) among the sizes Titan Image Generator accepts.
    pub fn titan_dimensions(&self) -> (u32, u32) {
        match self {
            AspectRatio::Square => (1024, 1024),
            AspectRatio::Landscape16x9 => (1408, 768),
            AspectRatio::Landscape21x9 => (1408, 640),
            AspectRatio::Portrait2x3 => (768, 1152),
            AspectRatio::Landscape3x2 => (1152, 768),
            AspectRatio::Portrait4x5 => (896, 1152),
            AspectRatio::Landscape5x4 => (1152, 896),
            AspectRatio::Portrait9x16 => (768, 1408),
            AspectRatio::Portrait9x21 => (640, 1408),
        }
    }
}

impl FromStr for AspectRatio {
    type Err = GenError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        AspectRatio::ALL
            .iter()
            .copied()
            .find(|ratio| ratio.as_str() == wanted)
            .ok_or_else(|| {
                GenError::InvalidRequest(format!("Unsupported 'aspectRatio': {}", wanted))
            })
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decoded image returned by the model. Lives only for the duration of one request.
#[derive(Debug, Clone)]
pub struct GeneratedImage {
    pub bytes: Vec<u8>,
    pub seed: u32,
    pub model_id: String,
    pub format: OutputFormat,
}

#[derive(Serialize, Deserialize)]
pub struct StabilityImageResponse {
    #[serde(default)]
    pub seeds: Vec<u64>,
    #[serde(default)]
    pub finish_reasons: Vec<Option<String>>,
    #[serde(default)]
    pub images: Vec<String>,
}

#[derive(Serialize, Deserialize)]
pub struct TitanImageResponse {
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body(value: serde_json::Value) -> GenerationRequestBody {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_prompt_is_trimmed() {
        let request = body(json!({"prompt": "  a red fox  "})).validate(800).unwrap();
        assert_eq!(request.prompt, "a red fox");
        assert_eq!(request.aspect_ratio, AspectRatio::Square);
        assert_eq!(request.output_format, OutputFormat::Png);
        assert_eq!(request.seed, None);
    }

    #[test]
    fn test_missing_or_blank_prompt() {
        for value in [json!({}), json!({"prompt": ""}), json!({"prompt": "   \n"}), json!({"prompt": null})] {
            let err = body(value).validate(800).unwrap_err();
            assert!(matches!(err, GenError::InvalidRequest(ref m) if m == "Missing 'prompt'"));
        }
    }

    #[test]
    fn test_prompt_length_counts_chars() {
        let ok = "é".repeat(10);
        assert!(body(json!({"prompt": ok})).validate(10).is_ok());
        let too_long = "é".repeat(11);
        let err = body(json!({"prompt": too_long})).validate(10).unwrap_err();
        assert_eq!(err.public_message(), "Prompt too long (max 10 chars)");
    }

    #[test]
    fn test_optional_fields() {
        let request = body(json!({
            "prompt": "poster",
            "aspectRatio": "16:9",
            "seed": 42,
            "outputFormat": "JPEG",
            "negative_prompt": "  blurry "
        }))
        .validate(800)
        .unwrap();
        assert_eq!(request.aspect_ratio, AspectRatio::Landscape16x9);
        assert_eq!(request.seed, Some(42));
        assert_eq!(request.output_format, OutputFormat::Jpeg);
        assert_eq!(request.negative_prompt.as_deref(), Some("blurry"));
    }

    #[test]
    fn test_rejects_bad_optional_fields() {
        assert!(body(json!({"prompt": "p", "seed": -1})).validate(800).is_err());
        assert!(body(json!({"prompt": "p", "seed": 4_294_967_295u64})).validate(800).is_err());
        assert!(body(json!({"prompt": "p", "aspectRatio": "7:3"})).validate(800).is_err());
        assert!(body(json!({"prompt": "p", "outputFormat": "gif"})).validate(800).is_err());
        assert!(body(json!({"prompt": "p", "seed": 4_294_967_294u64})).validate(800).is_ok());
    }

    #[test]
    fn test_blank_negative_prompt_is_dropped() {
        let request = body(json!({"prompt": "p", "negativePrompt": "  "}))
            .validate(800)
            .unwrap();
        assert!(request.negative_prompt.is_none());
    }

    #[test]
    fn test_signatures() {
        assert!(OutputFormat::Png.matches_signature(b"\x89PNG\r\n\x1a\nrest"));
        assert!(!OutputFormat::Png.matches_signature(b"\xFF\xD8\xFF\xE0"));
        assert!(OutputFormat::Jpeg.matches_signature(b"\xFF\xD8\xFF\xE0"));
        assert!(!OutputFormat::Jpeg.matches_signature(b""));
    }
}
