//! Mask planning and drawing.

use image::{DynamicImage, GenericImage, GenericImageView, Rgba};
use serde::{Deserialize, Serialize};
use veil_ocr::{Point, TextRegion};
use veil_rules::Classifier;

/// Opaque black. Converted to the buffer's own color type when drawn.
pub const MASK_COLOR: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// A region reported by OCR without exactly 4 corner points.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("region has {point_count} points, expected 4")]
pub struct RegionGeometryError {
    pub point_count: usize,
}

/// Axis-aligned pixel rectangle covering columns `x..x + width` and rows
/// `y..y + height`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaskRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl MaskRect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// One past the last covered column. Saturates instead of overflowing.
    pub fn right(&self) -> u32 {
        self.x.saturating_add(self.width)
    }

    /// One past the last covered row. Saturates instead of overflowing.
    pub fn bottom(&self) -> u32 {
        self.y.saturating_add(self.height)
    }

    /// Bounding rectangle of a 4-point region, clipped to a `img_w` x `img_h`
    /// image.
    ///
    /// Coordinates are truncated, not rounded. For an axis-aligned quad the
    /// result spans exactly from the top-left corner to the opposite
    /// bottom-right one; rotated quads get their full envelope. Returns
    /// `Ok(None)` when nothing of the region lies inside the image.
    pub fn from_geometry(
        points: &[Point],
        img_w: u32,
        img_h: u32,
    ) -> Result<Option<Self>, RegionGeometryError> {
        if points.len() != 4 {
            return Err(RegionGeometryError {
                point_count: points.len(),
            });
        }

        let (min_x, min_y, max_x, max_y) = points.iter().fold(
            (f32::INFINITY, f32::INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY),
            |(min_x, min_y, max_x, max_y), p| {
                (min_x.min(p.x), min_y.min(p.y), max_x.max(p.x), max_y.max(p.y))
            },
        );

        let x0 = clip(min_x, img_w);
        let y0 = clip(min_y, img_h);
        let x1 = clip(max_x, img_w);
        let y1 = clip(max_y, img_h);

        if x1 <= x0 || y1 <= y0 {
            return Ok(None);
        }

        Ok(Some(Self {
            x: x0,
            y: y0,
            width: x1 - x0,
            height: y1 - y0,
        }))
    }

    pub fn contains_pixel(&self, x: u32, y: u32) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }

    /// True when `other` lies entirely inside `self`.
    pub fn contains(&self, other: &MaskRect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    /// True when every pixel of `self` lies in at least one of `masks`.
    ///
    /// Covered jointly counts: a word split across two adjacent masks is
    /// covered.
    pub fn covered_by(&self, masks: &[MaskRect]) -> bool {
        if masks.iter().any(|m| m.contains(self)) {
            return true;
        }
        let touching: Vec<&MaskRect> = masks
            .iter()
            .filter(|m| m.x < self.right() && self.x < m.right())
            .filter(|m| m.y < self.bottom() && self.y < m.bottom())
            .collect();
        (self.y..self.bottom()).all(|y| {
            (self.x..self.right()).all(|x| touching.iter().any(|m| m.contains_pixel(x, y)))
        })
    }
}

/// Truncate toward zero and clamp into `0..=limit`. NaN maps to 0.
fn clip(v: f32, limit: u32) -> u32 {
    let t = v.trunc();
    if t.is_nan() || t <= 0.0 {
        0
    } else if t >= limit as f32 {
        limit
    } else {
        t as u32
    }
}

/// A PII region that could not be masked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedRegion {
    /// Position in the OCR output
    pub index: usize,
    pub point_count: usize,
    pub text: String,
}

/// Masks to draw plus the regions that had to be skipped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaskPlan {
    pub masks: Vec<MaskRect>,
    pub skipped: Vec<SkippedRegion>,
}

/// Classify every region and collect the rectangles to blank out.
///
/// Never fails: malformed geometry on a PII region lands in `skipped` and the
/// remaining regions are still planned.
pub fn plan_masks(
    regions: &[TextRegion],
    classifier: &Classifier,
    img_w: u32,
    img_h: u32,
) -> MaskPlan {
    regions
        .iter()
        .enumerate()
        .fold(MaskPlan::default(), |mut plan, (index, region)| {
            let Some(hit) = classifier.find_match(&region.text) else {
                return plan;
            };

            match MaskRect::from_geometry(&region.geometry, img_w, img_h) {
                Ok(Some(rect)) => {
                    log::debug!("[Redact] region {} masked ({}): {:?}", index, hit, region.text);
                    plan.masks.push(rect);
                }
                Ok(None) => {
                    log::debug!("[Redact] region {} lies outside the image", index);
                }
                Err(e) => {
                    log::warn!("[Redact] region {} skipped: {}", index, e);
                    plan.skipped.push(SkippedRegion {
                        index,
                        point_count: e.point_count,
                        text: region.text.clone(),
                    });
                }
            }
            plan
        })
}

/// Fill every rectangle with `MASK_COLOR`.
///
/// Drawing goes through `DynamicImage::put_pixel`, so grayscale, 16-bit and
/// float buffers keep their color type.
pub fn apply_masks(img: &mut DynamicImage, masks: &[MaskRect]) {
    let (img_width, img_height) = img.dimensions();

    for mask in masks {
        let x_end = mask.right().min(img_width);
        let y_end = mask.bottom().min(img_height);

        for y in mask.y..y_end {
            for x in mask.x..x_end {
                img.put_pixel(x, y, MASK_COLOR);
            }
        }
    }
}

/// Redacted copy of an image.
#[derive(Debug, Clone)]
pub struct Redaction {
    pub image: DynamicImage,
    pub masks: Vec<MaskRect>,
    pub skipped: Vec<SkippedRegion>,
}

/// Black out every region `classifier` flags as PII.
///
/// `image` is left untouched; the result owns a fresh buffer of the same
/// dimensions and color type.
pub fn redact(image: &DynamicImage, regions: &[TextRegion], classifier: &Classifier) -> Redaction {
    let (width, height) = image.dimensions();
    let plan = plan_masks(regions, classifier, width, height);

    let mut output = image.clone();
    apply_masks(&mut output, &plan.masks);

    log::info!(
        "[Redact] {} regions, {} masked, {} skipped",
        regions.len(),
        plan.masks.len(),
        plan.skipped.len()
    );

    Redaction {
        image: output,
        masks: plan.masks,
        skipped: plan.skipped,
    }
}
