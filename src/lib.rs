//! Prompt-to-image endpoint backed by AWS Bedrock and S3.
//!
//! A request carrying a prompt is sent to a Bedrock image model, the decoded
//! image is written to a private bucket under a fresh key, and the caller gets
//! back a presigned GET URL together with the seed the model used.

pub mod bedrock;
pub mod config;
pub mod error;
pub mod event;
pub mod handler;
pub mod logger;
pub mod models;
#[cfg(feature = "server")]
pub mod server;
pub mod storage;

pub use bedrock::{BedrockClient, ImageClient, ImageGenerator};
pub use config::{AppConfig, BedrockConfig};
pub use error::{GenError, Result};
pub use handler::GenerateHandler;
pub use models::*;
pub use storage::{KeyGenerator, MemoryObjectStore, ObjectStore, S3ObjectStore};
