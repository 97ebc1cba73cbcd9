pub mod perceptual;
pub mod xxhash;

pub use perceptual::{perceptual_hash, PerceptualHash};
pub use xxhash::content_checksum;
