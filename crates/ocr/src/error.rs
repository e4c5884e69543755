//! OCR error types

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OcrError {
    #[error("OCR engine unavailable: {0}")]
    Unavailable(String),

    #[error("image processing failed: {0}")]
    ImageProcess(String),

    #[error("OCR execution failed: {0}")]
    Execution(String),

    #[error("OCR timed out after {0:?}")]
    Timeout(Duration),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
