//! Post-redaction verification.
//!
//! Runs OCR again over a redacted image and reports any text the classifier
//! still considers PII outside the drawn masks.

use image::DynamicImage;
use serde::{Deserialize, Serialize};
use veil_ocr::{OcrEngine, OcrError, TextRegion};
use veil_render::MaskRect;
use veil_rules::Classifier;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VerifyResult {
    pub ok: bool,
    pub residual: Vec<TextRegion>,
    pub warnings: Vec<String>,
}

/// OCR `redacted` again and collect PII regions left visible.
///
/// A region counts as covered when the union of `masks` covers its bounding
/// rectangle.
pub fn verify_output<E: OcrEngine + ?Sized>(
    engine: &mut E,
    classifier: &Classifier,
    redacted: &DynamicImage,
    masks: &[MaskRect],
) -> Result<VerifyResult, OcrError> {
    let regions = engine.detect(redacted)?;
    let (width, height) = (redacted.width(), redacted.height());

    let mut residual = Vec::new();
    let mut warnings = Vec::new();

    for region in regions {
        let Some(hit) = classifier.find_match(&region.text) else {
            continue;
        };

        let covered = match MaskRect::from_geometry(&region.geometry, width, height) {
            Ok(Some(rect)) => rect.covered_by(masks),
            // nothing visible to leak
            Ok(None) => true,
            Err(_) => false,
        };
        if covered {
            continue;
        }

        warnings.push(format!("residual PII ({}) in region {:?}", hit, region.geometry));
        residual.push(region);
    }

    if !residual.is_empty() {
        log::warn!("[Verify] {} residual PII regions", residual.len());
    }

    Ok(VerifyResult {
        ok: residual.is_empty(),
        residual,
        warnings,
    })
}
