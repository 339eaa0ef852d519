pub mod image;
pub mod response;
pub mod storage;

pub use image::*;
pub use response::*;
pub use storage::*;
