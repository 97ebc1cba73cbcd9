//! Perceptual hashing for decoded images.
//!
//! Blockhash over the luminance grid of the image, giving a 64-bit signature.
//! Two images count as duplicates only when the signatures are bit-identical;
//! recompressed, cropped or rotated copies are not matched.

use blockhash::{blockhash64, Blockhash64};
use image::DynamicImage;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PerceptualHash(u64);

impl fmt::Display for PerceptualHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

pub fn perceptual_hash(image: &DynamicImage) -> PerceptualHash {
    let hash: Blockhash64 = blockhash64(image);
    let hash_bytes: [u8; 8] = hash.into();
    PerceptualHash(u64::from_be_bytes(hash_bytes))
}
