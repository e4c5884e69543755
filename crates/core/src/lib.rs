//! Core orchestration for redaction tasks.
//!
//! `Pipeline::process` turns uploaded image bytes into a stored, redacted copy:
//! decode, detect text, classify and mask, encode, persist. Persisting is the
//! last step, so every failure before it leaves storage untouched.

pub mod storage;

pub use storage::{FsStorage, MemoryStorage, Storage, StorageError};

use serde::{Deserialize, Serialize};
use std::time::Instant;
use veil_ocr::{OcrAuditInfo, OcrEngine, OcrError};
use veil_render::{MaskRect, RenderError, SkippedRegion, DEFAULT_JPEG_QUALITY};
use veil_rules::Classifier;
use veil_verify::VerifyResult;

/// Prefix of every output name.
pub const OUTPUT_PREFIX: &str = "masked_";

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("invalid source name: {0:?}")]
    InvalidSourceName(String),

    /// The upload is not a usable image.
    #[error("bad image: {0}")]
    ImageDecode(#[source] RenderError),

    /// Text detection failed; nothing was redacted or stored.
    #[error("OCR failed: {0}")]
    OcrFailure(#[from] OcrError),

    #[error("{0}")]
    Encode(#[source] RenderError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl PipelineError {
    /// Whether running the same request again may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            PipelineError::OcrFailure(_) => true,
            PipelineError::Storage(StorageError::Io(_)) => true,
            _ => false,
        }
    }
}

/// Name under which the redacted copy of `source_name` is stored.
///
/// Deterministic: processing the same source name again overwrites the
/// previous output.
pub fn output_name_for(source_name: &str) -> String {
    format!("{}{}", OUTPUT_PREFIX, source_name)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PipelineOptions {
    /// JPEG quality for JPEG sources (1-100)
    pub jpeg_quality: u8,
    /// Re-run OCR over the result and report residual PII
    pub verify: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            verify: false,
        }
    }
}

/// Outcome of one successful run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessReport {
    pub output_name: String,
    pub regions_detected: usize,
    pub masks: Vec<MaskRect>,
    pub skipped: Vec<SkippedRegion>,
    pub engine: OcrAuditInfo,
    /// Present when verification ran and its OCR pass succeeded
    pub verify: Option<VerifyResult>,
    pub elapsed_ms: u64,
}

/// Redaction pipeline.
///
/// Owns its OCR engine, so one `Pipeline` handles one image at a time. Run one
/// per worker for parallelism; `Classifier` clones are cheap and storage can
/// be shared through an `Arc`.
pub struct Pipeline<E, S> {
    engine: E,
    classifier: Classifier,
    storage: S,
    options: PipelineOptions,
}

impl<E: OcrEngine, S: Storage> Pipeline<E, S> {
    pub fn new(engine: E, classifier: Classifier, storage: S) -> Self {
        Self {
            engine,
            classifier,
            storage,
            options: PipelineOptions::default(),
        }
    }

    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Redact `source_bytes` and store the result. Returns the output name.
    pub fn process(&mut self, source_bytes: &[u8], source_name: &str) -> Result<String> {
        self.process_with_report(source_bytes, source_name)
            .map(|report| report.output_name)
    }

    /// Same as `process`, with details about what was masked.
    pub fn process_with_report(
        &mut self,
        source_bytes: &[u8],
        source_name: &str,
    ) -> Result<ProcessReport> {
        let start = Instant::now();

        if source_name.trim().is_empty() {
            return Err(PipelineError::InvalidSourceName(source_name.to_string()));
        }

        log::info!("[Pipeline] processing {} ({} bytes)", source_name, source_bytes.len());

        let decoded = veil_render::decode_image(source_bytes).map_err(PipelineError::ImageDecode)?;

        let ocr_start = Instant::now();
        let regions = self.engine.detect(&decoded.image).map_err(|e| {
            log::warn!("[Pipeline] OCR failed for {}: {}", source_name, e);
            PipelineError::OcrFailure(e)
        })?;
        log::info!(
            "[Pipeline] OCR found {} regions in {} ms",
            regions.len(),
            ocr_start.elapsed().as_millis()
        );

        let redaction = veil_render::redact(&decoded.image, &regions, &self.classifier);

        let verify = if self.options.verify {
            match veil_verify::verify_output(
                &mut self.engine,
                &self.classifier,
                &redaction.image,
                &redaction.masks,
            ) {
                Ok(result) => Some(result),
                Err(e) => {
                    log::warn!("[Pipeline] verification skipped: {}", e);
                    None
                }
            }
        } else {
            None
        };

        let encoded =
            veil_render::encode_image(&redaction.image, decoded.format, self.options.jpeg_quality)
                .map_err(PipelineError::Encode)?;

        let output_name = output_name_for(source_name);
        self.storage.write(&output_name, &encoded)?;

        let elapsed_ms = start.elapsed().as_millis() as u64;
        log::info!(
            "[Pipeline] wrote {} ({} masks, {} skipped) in {} ms",
            output_name,
            redaction.masks.len(),
            redaction.skipped.len(),
            elapsed_ms
        );

        Ok(ProcessReport {
            output_name,
            regions_detected: regions.len(),
            masks: redaction.masks,
            skipped: redaction.skipped,
            engine: self.engine.audit_info(),
            verify,
            elapsed_ms,
        })
    }

    /// Read back a stored output.
    pub fn fetch(&self, output_name: &str) -> Result<Vec<u8>> {
        Ok(self.storage.read(output_name)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::DynamicImage;
    use veil_ocr::TextRegion;

    struct NoText;

    impl OcrEngine for NoText {
        fn detect(
            &mut self,
            _img: &DynamicImage,
        ) -> std::result::Result<Vec<TextRegion>, OcrError> {
            Ok(Vec::new())
        }

        fn audit_info(&self) -> OcrAuditInfo {
            OcrAuditInfo {
                engine: "none".to_string(),
                engine_version: None,
                engine_params: None,
            }
        }
    }

    #[test]
    fn test_output_name_for() {
        assert_eq!(output_name_for("scan.png"), "masked_scan.png");
        assert_eq!(output_name_for("masked_scan.png"), "masked_masked_scan.png");
    }

    #[test]
    fn test_blank_source_name_is_rejected() {
        let mut pipeline = Pipeline::new(NoText, Classifier::default(), MemoryStorage::new());
        let err = pipeline.process(b"irrelevant", "  ").unwrap_err();
        assert!(matches!(err, PipelineError::InvalidSourceName(_)));
        assert!(pipeline.storage().is_empty());
    }

    #[test]
    fn test_retryable_errors() {
        assert!(PipelineError::OcrFailure(OcrError::Execution("boom".to_string())).is_retryable());
        assert!(!PipelineError::ImageDecode(RenderError::Decode("bad".to_string())).is_retryable());
        let bad_name = StorageError::InvalidName("a/b".to_string());
        assert!(!PipelineError::Storage(bad_name).is_retryable());
    }

    #[test]
    fn test_fetch_missing_output() {
        let pipeline = Pipeline::new(NoText, Classifier::default(), MemoryStorage::new());
        assert!(matches!(
            pipeline.fetch("masked_nothing.png"),
            Err(PipelineError::Storage(StorageError::NotFound(_)))
        ));
    }
}
