use chrono::{DateTime, Utc};
use colored::*;
use log::{Level, Metadata, Record};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use uuid::Uuid;

static POSTER_LOGGER: Lazy<PosterLogger> = Lazy::new(PosterLogger::new);
static INSTALLED: AtomicBool = AtomicBool::new(false);

pub fn init() -> Result<(), String> {
    init_with_config(LoggerConfig::from_env())
}

/// Installs the logger. Calling it again only swaps the configuration.
pub fn init_with_config(config: LoggerConfig) -> Result<(), String> {
    let max_level = config.min_level.to_log_level_filter();
    POSTER_LOGGER.update_config(config);

    if !INSTALLED.swap(true, Ordering::SeqCst) {
        if let Err(e) = log::set_logger(&*POSTER_LOGGER) {
            return Err(format!("Failed to set logger: {:?}", e));
        }
    }

    log::set_max_level(max_level);
    Ok(())
}

/// Tags every following entry with the invocation's request id. A Lambda
/// sandbox serves one invocation at a time, so a single slot is enough.
pub fn set_request_id(request_id: impl Into<String>) {
    POSTER_LOGGER.set_request_id(Some(request_id.into()));
}

pub fn clear_request_id() {
    POSTER_LOGGER.set_request_id(None);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
}

impl LogLevel {
    pub fn color(&self) -> Color {
        match self {
            LogLevel::Trace => Color::Cyan,
            LogLevel::Debug => Color::Blue,
            LogLevel::Info => Color::Green,
            LogLevel::Warn => Color::Yellow,
            LogLevel::Error => Color::Red,
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            LogLevel::Trace => "🔍",
            LogLevel::Debug => "🐛",
            LogLevel::Info => "💡",
            LogLevel::Warn => "⚠️",
            LogLevel::Error => "❌",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }

    pub fn to_log_level(&self) -> Level {
        match self {
            LogLevel::Trace => Level::Trace,
            LogLevel::Debug => Level::Debug,
            LogLevel::Info => Level::Info,
            LogLevel::Warn => Level::Warn,
            LogLevel::Error => Level::Error,
        }
    }

    pub fn to_log_level_filter(&self) -> log::LevelFilter {
        self.to_log_level().to_level_filter()
    }

    pub fn from_log_level(level: Level) -> Self {
        match level {
            Level::Trace => LogLevel::Trace,
            Level::Debug => LogLevel::Debug,
            Level::Info => LogLevel::Info,
            Level::Warn => LogLevel::Warn,
            Level::Error => LogLevel::Error,
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    pub module: String,
    pub file: String,
    pub line: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: String, module: String, file: String, line: u32) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            level,
            message,
            module,
            file,
            line,
            request_id: None,
        }
    }

    pub fn with_request_id(mut self, request_id: Option<String>) -> Self {
        self.request_id = request_id;
        self
    }
}

#[derive(Debug, Clone)]
pub struct LoggerConfig {
    pub min_level: LogLevel,
    pub show_colors: bool,
    pub show_emojis: bool,
    pub show_file_location: bool,
    pub show_module: bool,
    pub include_timestamp: bool,
    pub timestamp_format: String,
    pub output_json: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Info,
            show_colors: true,
            show_emojis: true,
            show_file_location: true,
            show_module: true,
            include_timestamp: true,
            timestamp_format: "%Y-%m-%d %H:%M:%S%.3f".to_string(),
            output_json: false,
        }
    }
}

impl LoggerConfig {
    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    /// One JSON object per line, which CloudWatch indexes without a parser.
    pub fn lambda() -> Self {
        Self {
            min_level: LogLevel::Info,
            show_colors: false,
            show_emojis: false,
            output_json: true,
            ..Default::default()
        }
    }

    pub fn development() -> Self {
        Self {
            min_level: LogLevel::Debug,
            show_colors: true,
            show_emojis: true,
            output_json: false,
            show_file_location: true,
            ..Default::default()
        }
    }

    /// `LOG_FORMAT=pretty` selects the development layout, anything else JSON.
    /// `LOG_LEVEL` overrides the level of either.
    pub fn from_env() -> Self {
        let base = match std::env::var("LOG_FORMAT").ok().as_deref() {
            Some("pretty") => Self::development(),
            _ => Self::lambda(),
        };
        match std::env::var("LOG_LEVEL").ok().map(|raw| raw.parse::<LogLevel>()) {
            Some(Ok(level)) => base.with_level(level),
            _ => base,
        }
    }
}

pub struct PosterLogger {
    config: Mutex<LoggerConfig>,
    request_id: Mutex<Option<String>>,
}

impl PosterLogger {
    pub fn new() -> Self {
        Self {
            config: Mutex::new(LoggerConfig::default()),
            request_id: Mutex::new(None),
        }
    }

    pub fn update_config(&self, new_config: LoggerConfig) {
        if let Ok(mut config) = self.config.lock() {
            *config = new_config;
        }
    }

    fn set_request_id(&self, request_id: Option<String>) {
        if let Ok(mut current) = self.request_id.lock() {
            *current = request_id;
        }
    }

    fn current_request_id(&self) -> Option<String> {
        self.request_id.lock().ok().and_then(|id| id.clone())
    }

    fn format_console_output(&self, entry: &LogEntry, config: &LoggerConfig) -> String {
        let mut output = String::new();

        if config.include_timestamp {
            let timestamp = entry.timestamp.format(&config.timestamp_format).to_string();
            if config.show_colors {
                output.push_str(&format!("{} ", timestamp.bright_black()));
            } else {
                output.push_str(&format!("{} ", timestamp));
            }
        }

        let level_str = if config.show_emojis {
            format!("{} {}", entry.level.emoji(), entry.level.as_str())
        } else {
            entry.level.as_str().to_string()
        };
        if config.show_colors {
            output.push_str(&format!(
                "[{}] ",
                level_str.color(entry.level.color()).bold()
            ));
        } else {
            output.push_str(&format!("[{}] ", level_str));
        }

        if config.show_module && !entry.module.is_empty() {
            if config.show_colors {
                output.push_str(&format!("{}::", entry.module.bright_blue()));
            } else {
                output.push_str(&format!("{}::", entry.module));
            }
        }

        if config.show_colors {
            output.push_str(&entry.message.white().bold().to_string());
        } else {
            output.push_str(&entry.message);
        }

        if let Some(request_id) = &entry.request_id {
            if config.show_colors {
                output.push_str(&format!(" [req:{}]", request_id.bright_yellow()));
            } else {
                output.push_str(&format!(" [req:{}]", request_id));
            }
        }

        if config.show_file_location {
            let location = format!("{}:{}", entry.file, entry.line);
            if config.show_colors {
                output.push_str(&format!(" ({})", location.bright_black()));
            } else {
                output.push_str(&format!(" ({})", location));
            }
        }

        output
    }

    fn create_log_entry(&self, record: &Record) -> LogEntry {
        LogEntry::new(
            LogLevel::from_log_level(record.level()),
            record.args().to_string(),
            record.module_path().unwrap_or("unknown").to_string(),
            record.file().unwrap_or("unknown").to_string(),
            record.line().unwrap_or(0),
        )
        .with_request_id(self.current_request_id())
    }
}

impl Default for PosterLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl log::Log for PosterLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        // The AWS SDK is chatty at debug level.
        if metadata.target().starts_with("aws_") && metadata.level() > Level::Info {
            return false;
        }
        match self.config.lock() {
            Ok(config) => metadata.level() <= config.min_level.to_log_level(),
            Err(_) => true,
        }
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let entry = self.create_log_entry(record);

        if let Ok(config) = self.config.lock() {
            let line = if config.output_json {
                serde_json::to_string(&entry).unwrap_or_default()
            } else {
                self.format_console_output(&entry, &config)
            };
            println!("{}", line);
        }
    }

    fn flush(&self) {
        let _ = io::stdout().flush();
    }
}

/// Logs how long a step took when dropped.
pub struct Timer {
    start: Instant,
    name: String,
}

impl Timer {
    pub fn new(name: &str) -> Self {
        log::debug!("⏱️  Starting timer: {}", name);
        Self {
            start: Instant::now(),
            name: name.to_string(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        log::info!(
            "⏱️  {} completed in {}ms",
            self.name,
            self.elapsed().as_millis()
        );
    }
}

pub fn timer(name: &str) -> Timer {
    Timer::new(name)
}

pub fn log_config_info(config: &crate::config::AppConfig) {
    log::info!("⚙️  Configuration loaded:");
    log::info!(
        "   Bucket: {}",
        config.output_bucket.as_deref().unwrap_or("(in-memory)")
    );
    log::info!("   Bedrock region: {}", config.bedrock.region_or_default());
    log::info!("   Model: {}", config.model_id);
    log::info!("   Key prefix: {}", config.key_prefix);
    log::info!("   URL expiry: {}s", config.url_expiry_seconds);
    log::info!("   Request timeout: {}s", config.request_timeout_seconds);
}
