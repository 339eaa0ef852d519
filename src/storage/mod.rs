pub mod keys;
pub mod memory;
pub mod s3;
pub mod traits;

use crate::{
    config::AppConfig,
    error::{GenError, Result},
};
use std::sync::Arc;

pub use keys::KeyGenerator;
pub use memory::MemoryObjectStore;
pub use s3::S3ObjectStore;
pub use traits::ObjectStore;

/// Bucket name reported by the in-memory fallback.
pub const LOCAL_BUCKET: &str = "local";

/// S3 when `OUTPUT_BUCKET` is set. Without it, the in-memory store is only
/// returned when `allow_memory` is true (local development).
pub async fn build_store(config: &AppConfig, allow_memory: bool) -> Result<Arc<dyn ObjectStore>> {
    match &config.output_bucket {
        Some(bucket) => {
            log::info!("Using S3 bucket: {}", bucket);
            Ok(Arc::new(
                S3ObjectStore::from_env(bucket.clone(), config.request_timeout()).await,
            ))
        }
        None if allow_memory => {
            log::warn!("OUTPUT_BUCKET not set, storing images in memory");
            Ok(Arc::new(MemoryObjectStore::new(LOCAL_BUCKET)))
        }
        None => Err(GenError::Config("OUTPUT_BUCKET is required".into())),
    }
}
