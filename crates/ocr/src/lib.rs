//! Text detection capability
//!
//! The redaction pipeline only needs one thing from OCR: given an image, the
//! list of text regions with their corner points, recognized text and
//! confidence. `OcrEngine` is that seam; `TesseractEngine` is the bundled
//! implementation driving the `tesseract` CLI.

mod error;
mod tesseract;

pub use error::OcrError;
pub use tesseract::{get_tesseract_version, TesseractConfig, TesseractEngine};

use image::DynamicImage;
use serde::{Deserialize, Serialize};

/// Pixel coordinate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// A detected span of text.
///
/// Well-formed regions carry 4 corner points, clockwise from top-left. The
/// quad is not necessarily axis-aligned. Malformed engine output may carry any
/// number of points; consumers decide how to treat it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRegion {
    pub geometry: Vec<Point>,
    pub text: String,
    /// 0.0 - 1.0
    pub confidence: f32,
}

impl TextRegion {
    pub fn new(geometry: Vec<Point>, text: impl Into<String>, confidence: f32) -> Self {
        Self {
            geometry,
            text: text.into(),
            confidence,
        }
    }

    /// Axis-aligned region from a pixel box.
    pub fn from_box(
        left: f32,
        top: f32,
        width: f32,
        height: f32,
        text: impl Into<String>,
        confidence: f32,
    ) -> Self {
        let right = left + width;
        let bottom = top + height;
        Self::new(
            vec![
                Point::new(left, top),
                Point::new(right, top),
                Point::new(right, bottom),
                Point::new(left, bottom),
            ],
            text,
            confidence,
        )
    }
}

/// Which engine produced a result, for reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrAuditInfo {
    /// Engine name (e.g. "tesseract")
    pub engine: String,
    pub engine_version: Option<String>,
    /// Engine parameters (JSON)
    pub engine_params: Option<String>,
}

/// Text detection capability.
///
/// `detect` takes `&mut self`: a single engine serves one image at a time.
/// Hosts that want parallelism run one engine per worker.
pub trait OcrEngine: Send {
    /// Detect text regions in `img`. Order is unspecified; an empty result
    /// means no text was found.
    fn detect(&mut self, img: &DynamicImage) -> Result<Vec<TextRegion>, OcrError>;

    fn audit_info(&self) -> OcrAuditInfo;
}

impl<E: OcrEngine + ?Sized> OcrEngine for Box<E> {
    fn detect(&mut self, img: &DynamicImage) -> Result<Vec<TextRegion>, OcrError> {
        (**self).detect(img)
    }

    fn audit_info(&self) -> OcrAuditInfo {
        (**self).audit_info()
    }
}
