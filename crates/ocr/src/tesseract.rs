//! Tesseract OCR engine (CLI wrapper)

use image::{DynamicImage, ImageFormat};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use crate::{OcrAuditInfo, OcrEngine, OcrError, TextRegion};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Tesseract settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TesseractConfig {
    /// Path of the tesseract executable
    pub binary_path: Option<String>,
    /// tessdata directory
    pub tessdata_path: Option<String>,
    /// Language, e.g. "eng" or "eng+hin"
    pub lang: Option<String>,
    /// Page segmentation mode (0-13)
    pub psm: Option<u8>,
    /// OCR engine mode (0-3)
    pub oem: Option<u8>,
    /// Kill the process after this many seconds
    pub timeout_secs: Option<u64>,
}

impl TesseractConfig {
    pub fn binary_or_default(&self) -> &str {
        self.binary_path.as_deref().unwrap_or("tesseract")
    }

    pub fn lang_or_default(&self) -> &str {
        self.lang.as_deref().unwrap_or("eng")
    }

    /// Sparse text: ID cards and forms are not laid out as paragraphs.
    pub fn psm_or_default(&self) -> u8 {
        self.psm.unwrap_or(11)
    }

    pub fn oem_or_default(&self) -> u8 {
        self.oem.unwrap_or(1)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(60))
    }
}

/// Tesseract OCR engine
pub struct TesseractEngine {
    config: TesseractConfig,
    version: Option<String>,
}

impl TesseractEngine {
    /// Create the engine, checking that the binary runs.
    pub fn new(config: TesseractConfig) -> Result<Self, OcrError> {
        let version = get_tesseract_version(config.binary_or_default())?;

        log::info!("[Tesseract] initialized, version: {}", version);

        Ok(Self {
            config,
            version: Some(version),
        })
    }

    fn run(
        &self,
        input: &Path,
        output_base: &Path,
        stderr_path: &Path,
    ) -> Result<ExitStatus, OcrError> {
        let mut cmd = Command::new(self.config.binary_or_default());

        cmd.arg(input)
            .arg(output_base)
            .arg("-l")
            .arg(self.config.lang_or_default())
            .arg("--psm")
            .arg(self.config.psm_or_default().to_string())
            .arg("--oem")
            .arg(self.config.oem_or_default().to_string())
            .arg("tsv")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::from(File::create(stderr_path)?));

        if let Some(tessdata_path) = &self.config.tessdata_path {
            cmd.env("TESSDATA_PREFIX", tessdata_path);
        }

        log::info!(
            "[Tesseract] running: {} {} -l {} --psm {} --oem {} tsv",
            self.config.binary_or_default(),
            input.display(),
            self.config.lang_or_default(),
            self.config.psm_or_default(),
            self.config.oem_or_default()
        );

        let mut child = cmd
            .spawn()
            .map_err(|e| OcrError::Unavailable(format!("failed to start tesseract: {}", e)))?;

        wait_with_timeout(&mut child, self.config.timeout())
    }
}

impl OcrEngine for TesseractEngine {
    fn detect(&mut self, img: &DynamicImage) -> Result<Vec<TextRegion>, OcrError> {
        let start = Instant::now();

        // dropped (and removed) on every return path
        let scratch = tempfile::Builder::new().prefix("veil-tesseract-").tempdir()?;
        let input = scratch.path().join("input.png");
        let output_base = scratch.path().join("output");
        let stderr_path = scratch.path().join("stderr.log");

        img.save_with_format(&input, ImageFormat::Png)
            .map_err(|e| OcrError::ImageProcess(format!("failed to write scratch image: {}", e)))?;

        let status = self.run(&input, &output_base, &stderr_path)?;
        if !status.success() {
            let stderr = std::fs::read_to_string(&stderr_path).unwrap_or_default();
            return Err(OcrError::Execution(format!(
                "tesseract exited with {}: {}",
                status,
                stderr.trim()
            )));
        }

        let tsv = std::fs::read_to_string(output_base.with_extension("tsv"))?;
        let results = parse_tesseract_tsv(&tsv);

        log::info!(
            "[Tesseract] done in {} ms, {} words",
            start.elapsed().as_millis(),
            results.len()
        );

        Ok(results)
    }

    fn audit_info(&self) -> OcrAuditInfo {
        let params = serde_json::json!({
            "lang": self.config.lang_or_default(),
            "psm": self.config.psm_or_default(),
            "oem": self.config.oem_or_default(),
        });

        OcrAuditInfo {
            engine: "tesseract".to_string(),
            engine_version: self.version.clone(),
            engine_params: Some(params.to_string()),
        }
    }
}

/// Wait for `child`, killing it on timeout or when it can no longer be polled.
fn wait_with_timeout(child: &mut Child, timeout: Duration) -> Result<ExitStatus, OcrError> {
    let deadline = Instant::now() + timeout;
    loop {
        let polled = child.try_wait();
        let error = match polled {
            Ok(Some(status)) => return Ok(status),
            Ok(None) if Instant::now() < deadline => {
                std::thread::sleep(POLL_INTERVAL);
                continue;
            }
            Ok(None) => OcrError::Timeout(timeout),
            Err(e) => OcrError::Io(e),
        };
        let _ = child.kill();
        let _ = child.wait();
        return Err(error);
    }
}

/// Parse Tesseract TSV output.
///
/// Columns:
/// level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext
///
/// Only word rows (level 5) are kept, so every word gets its own box and masks
/// stay tight around the sensitive token.
fn parse_tesseract_tsv(tsv: &str) -> Vec<TextRegion> {
    let mut results = Vec::new();

    // header
    for line in tsv.lines().skip(1) {
        let cols: Vec<&str> = line.split('\t').collect();
        if cols.len() < 12 {
            continue;
        }

        let level: i32 = cols[0].trim().parse().unwrap_or(-1);
        let left: f32 = cols[6].trim().parse().unwrap_or(0.0);
        let top: f32 = cols[7].trim().parse().unwrap_or(0.0);
        let width: f32 = cols[8].trim().parse().unwrap_or(0.0);
        let height: f32 = cols[9].trim().parse().unwrap_or(0.0);
        let conf: f32 = cols[10].trim().parse().unwrap_or(-1.0);
        let text = cols[11].trim();

        if level != 5 || text.is_empty() || conf < 0.0 {
            continue;
        }

        results.push(TextRegion::from_box(
            left,
            top,
            width,
            height,
            text,
            (conf / 100.0).clamp(0.0, 1.0),
        ));
    }

    results
}

/// Get the Tesseract version
pub fn get_tesseract_version(binary_path: &str) -> Result<String, OcrError> {
    let output = Command::new(binary_path)
        .arg("--version")
        .output()
        .map_err(|e| OcrError::Unavailable(format!("cannot run {}: {}", binary_path, e)))?;

    if !output.status.success() {
        return Err(OcrError::Unavailable(format!(
            "{} --version exited with {}",
            binary_path, output.status
        )));
    }

    // older releases print the banner on stderr
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    let combined = format!("{}{}", stdout, stderr);

    Ok(parse_version(&combined).unwrap_or_else(|| "unknown".to_string()))
}

/// "tesseract 5.3.0" or "tesseract v5.3.0"
fn parse_version(banner: &str) -> Option<String> {
    banner
        .lines()
        .filter(|line| line.contains("tesseract"))
        .find_map(|line| line.split_whitespace().nth(1))
        .map(|v| v.trim_start_matches('v').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Point;

    const HEADER: &str = concat!(
        "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\t",
        "left\ttop\twidth\theight\tconf\ttext"
    );

    #[test]
    fn test_parse_tsv_keeps_word_rows() {
        let tsv = format!(
            "{}\n\
             1\t1\t0\t0\t0\t0\t0\t0\t640\t480\t-1\t\n\
             4\t1\t1\t1\t1\t0\t30\t40\t200\t20\t-1\t\n\
             5\t1\t1\t1\t1\t1\t30\t40\t60\t20\t96.5\tName:\n\
             5\t1\t1\t1\t1\t2\t100\t40\t130\t20\t91\tRavi\n\
             5\t1\t1\t1\t1\t3\t240\t40\t10\t20\t95\t \n",
            HEADER
        );

        let words = parse_tesseract_tsv(&tsv);

        assert_eq!(words.len(), 2);
        assert_eq!(words[0].text, "Name:");
        assert!((words[0].confidence - 0.965).abs() < 1e-6);
        assert_eq!(
            words[1].geometry,
            vec![
                Point::new(100.0, 40.0),
                Point::new(230.0, 40.0),
                Point::new(230.0, 60.0),
                Point::new(100.0, 60.0),
            ]
        );
    }

    #[test]
    fn test_parse_tsv_skips_negative_confidence_and_short_rows() {
        let tsv = format!(
            "{}\n5\t1\t1\t1\t1\t1\t0\t0\t5\t5\t-1\tghost\n5\t1\t1\n",
            HEADER
        );
        assert!(parse_tesseract_tsv(&tsv).is_empty());
    }

    #[test]
    fn test_parse_tsv_empty_output() {
        assert!(parse_tesseract_tsv("").is_empty());
        assert!(parse_tesseract_tsv(HEADER).is_empty());
    }

    #[test]
    fn test_parse_version() {
        assert_eq!(
            parse_version("tesseract 5.3.0\n leptonica-1.82.0\n"),
            Some("5.3.0".to_string())
        );
        assert_eq!(parse_version("tesseract v4.1.1"), Some("4.1.1".to_string()));
        assert_eq!(parse_version("something else"), None);
    }

    #[test]
    fn test_config_defaults() {
        let config = TesseractConfig::default();
        assert_eq!(config.binary_or_default(), "tesseract");
        assert_eq!(config.lang_or_default(), "eng");
        assert_eq!(config.psm_or_default(), 11);
        assert_eq!(config.timeout(), Duration::from_secs(60));
    }

    #[cfg(unix)]
    #[test]
    fn test_slow_process_is_killed_on_timeout() {
        let mut child = Command::new("sleep").arg("30").spawn().unwrap();
        let start = Instant::now();

        let result = wait_with_timeout(&mut child, Duration::from_millis(100));

        assert!(matches!(result, Err(OcrError::Timeout(_))));
        assert!(start.elapsed() < Duration::from_secs(10));
        // reaped: nothing left to wait for
        assert!(child.try_wait().unwrap().is_some());
    }

    #[cfg(unix)]
    #[test]
    fn test_finished_process_returns_status() {
        let mut child = Command::new("true").spawn().unwrap();
        let status = wait_with_timeout(&mut child, Duration::from_secs(10)).unwrap();
        assert!(status.success());
    }

    #[test]
    fn test_missing_binary_is_unavailable() {
        let config = TesseractConfig {
            binary_path: Some("/nonexistent/veil-tesseract".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            TesseractEngine::new(config),
            Err(OcrError::Unavailable(_))
        ));
    }
}
