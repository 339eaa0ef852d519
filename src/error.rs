use thiserror::Error;

#[derive(Debug, Error)]
pub enum GenError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Content filtered: {reasons:?}")]
    ContentFiltered { reasons: Vec<String> },

    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Upstream error: {summary} ({detail})")]
    Upstream { summary: String, detail: String },

    #[error("Storage error: {summary} ({detail})")]
    Storage { summary: String, detail: String },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl GenError {
    pub fn upstream(summary: impl Into<String>, detail: impl ToString) -> Self {
        GenError::Upstream {
            summary: summary.into(),
            detail: detail.to_string(),
        }
    }

    pub fn storage(summary: impl Into<String>, detail: impl ToString) -> Self {
        GenError::Storage {
            summary: summary.into(),
            detail: detail.to_string(),
        }
    }

    /// HTTP status returned to the caller for this failure.
    pub fn status_code(&self) -> u16 {
        match self {
            GenError::InvalidRequest(_) | GenError::ContentFiltered { .. } => 400,
            GenError::QuotaExceeded(_) => 429,
            GenError::Upstream { .. } => 502,
            GenError::Timeout(_) => 504,
            GenError::Storage { .. } | GenError::Config(_) | GenError::Serialization(_) => 500,
        }
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code()) && !matches!(self, GenError::QuotaExceeded(_))
    }

    /// Message safe to hand back to the caller. SDK details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            GenError::InvalidRequest(msg) => msg.clone(),
            GenError::ContentFiltered { .. } => "Filtered/failed".to_string(),
            GenError::QuotaExceeded(_) => "Model quota exceeded, try again later".to_string(),
            GenError::Timeout(_) => "Image generation timed out".to_string(),
            GenError::Upstream { summary, .. } | GenError::Storage { summary, .. } => {
                summary.clone()
            }
            GenError::Config(_) | GenError::Serialization(_) => {
                "Internal server error".to_string()
            }
        }
    }
}

impl From<serde_json::Error> for GenError {
    fn from(e: serde_json::Error) -> Self {
        GenError::Serialization(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, GenError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(GenError::InvalidRequest("x".into()).status_code(), 400);
        assert_eq!(
            GenError::ContentFiltered {
                reasons: vec!["CONTENT_FILTERED".into()]
            }
            .status_code(),
            400
        );
        assert_eq!(GenError::QuotaExceeded("x".into()).status_code(), 429);
        assert_eq!(GenError::upstream("Bedrock invoke failed", "boom").status_code(), 502);
        assert_eq!(GenError::Timeout("x".into()).status_code(), 504);
        assert_eq!(GenError::storage("S3 upload failed", "denied").status_code(), 500);
    }

    #[test]
    fn test_public_message_hides_detail() {
        let err = GenError::storage("S3 upload failed", "AccessDenied: arn:aws:iam::123");
        assert_eq!(err.public_message(), "S3 upload failed");
        assert!(err.to_string().contains("AccessDenied"));
    }

    #[test]
    fn test_quota_is_not_client_error() {
        assert!(GenError::InvalidRequest("x".into()).is_client_error());
        assert!(!GenError::QuotaExceeded("x".into()).is_client_error());
        assert!(!GenError::Timeout("x".into()).is_client_error());
    }
}
