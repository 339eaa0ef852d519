use crate::models::OutputFormat;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Hex characters of randomness appended to each key (48 bits).
const RANDOM_HEX_LEN: usize = 12;

#[derive(Debug, Clone)]
pub struct KeyGenerator {
    prefix: String,
}

impl KeyGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn next_key(&self, format: OutputFormat) -> String {
        self.key_at(Utc::now(), format)
    }

    /// `{prefix}poster_{yyyymmddHHMMSS}_{random}.{ext}`
    pub fn key_at(&self, now: DateTime<Utc>, format: OutputFormat) -> String {
        let random = Uuid::new_v4().simple().to_string();
        format!(
            "{}poster_{}_{}.{}",
            self.prefix,
            now.format("%Y%m%d%H%M%S"),
            &random[..RANDOM_HEX_LEN],
            format.extension()
        )
    }
}
