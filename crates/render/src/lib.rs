//! Image redaction: decode, mask PII regions, encode.

mod codec;
mod mask;

pub use codec::{decode_image, encode_image, DecodedImage, DEFAULT_JPEG_QUALITY};
pub use mask::{
    apply_masks, plan_masks, redact, MaskPlan, MaskRect, Redaction, RegionGeometryError,
    SkippedRegion, MASK_COLOR,
};

pub type Result<T> = std::result::Result<T, RenderError>;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// Input is not a usable raster image.
    #[error("image decode failed: {0}")]
    Decode(String),
    #[error("image encode failed: {0}")]
    Encode(String),
}
