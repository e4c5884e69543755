use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use veil_core::{FsStorage, Pipeline, PipelineOptions, ProcessReport, Storage};
use veil_ocr::{OcrEngine, TesseractEngine};
use veil_rules::Classifier;

use crate::config::AppConfig;

pub struct MaskArgs {
    pub inputs: Vec<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub verify: bool,
    pub jobs: Option<usize>,
}

pub fn handle(config: &AppConfig, args: MaskArgs) -> Result<()> {
    let classifier = config.build_classifier().context("invalid classifier rules")?;

    let root = args.output_dir.unwrap_or_else(|| config.output_dir());
    let storage =
        FsStorage::new(&root).with_context(|| format!("cannot open {}", root.display()))?;
    let storage = Arc::new(storage);

    let mut options = config.pipeline_options();
    options.verify |= args.verify;

    let jobs = args.jobs.unwrap_or(config.jobs).clamp(1, args.inputs.len().max(1));

    let mut engines = Vec::with_capacity(jobs);
    for _ in 0..jobs {
        let engine =
            TesseractEngine::new(config.tesseract.clone()).context("tesseract is not usable")?;
        engines.push(engine);
    }

    let start = Instant::now();
    let outcomes = run_batch(&args.inputs, engines, &classifier, storage, &options);

    let mut failed = 0;
    for (input, outcome) in args.inputs.iter().zip(&outcomes) {
        match outcome {
            Ok(report) => println!("{}", describe(input, report)),
            Err(e) => {
                failed += 1;
                eprintln!("✗ {}: {:#}", input.display(), e);
            }
        }
    }

    log::info!(
        "[Mask] {} inputs, {} failed, {} ms",
        args.inputs.len(),
        failed,
        start.elapsed().as_millis()
    );

    if failed > 0 {
        anyhow::bail!("{} of {} inputs failed", failed, args.inputs.len());
    }
    Ok(())
}

/// Process `inputs` with one pipeline per engine. Results come back in input
/// order.
pub fn run_batch<E, S>(
    inputs: &[PathBuf],
    engines: Vec<E>,
    classifier: &Classifier,
    storage: S,
    options: &PipelineOptions,
) -> Vec<Result<ProcessReport>>
where
    E: OcrEngine,
    S: Storage + Clone,
{
    let next = AtomicUsize::new(0);

    let mut indexed: Vec<(usize, Result<ProcessReport>)> = std::thread::scope(|scope| {
        let handles: Vec<_> = engines
            .into_iter()
            .map(|engine| {
                let mut pipeline = Pipeline::new(engine, classifier.clone(), storage.clone())
                    .with_options(options.clone());
                let next = &next;
                scope.spawn(move || {
                    let mut done = Vec::new();
                    loop {
                        let idx = next.fetch_add(1, Ordering::Relaxed);
                        let Some(input) = inputs.get(idx) else {
                            break;
                        };
                        done.push((idx, process_file(&mut pipeline, input)));
                    }
                    done
                })
            })
            .collect();

        handles
            .into_iter()
            .flat_map(|handle| handle.join().unwrap_or_default())
            .collect()
    });

    indexed.sort_by_key(|(idx, _)| *idx);

    // a panicked worker loses its results; report those inputs as failed
    let mut outcomes: Vec<Result<ProcessReport>> = Vec::with_capacity(inputs.len());
    let mut indexed = indexed.into_iter().peekable();
    for idx in 0..inputs.len() {
        match indexed.next_if(|(i, _)| *i == idx) {
            Some((_, outcome)) => outcomes.push(outcome),
            None => outcomes.push(Err(anyhow!("worker crashed"))),
        }
    }
    outcomes
}

fn process_file<E: OcrEngine, S: Storage>(
    pipeline: &mut Pipeline<E, S>,
    input: &Path,
) -> Result<ProcessReport> {
    let source_name = input
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow!("not a file name: {}", input.display()))?;

    let bytes =
        std::fs::read(input).with_context(|| format!("cannot read {}", input.display()))?;

    Ok(pipeline.process_with_report(&bytes, source_name)?)
}

fn describe(input: &Path, report: &ProcessReport) -> String {
    let mut line = format!(
        "✓ {} -> {} ({} regions, {} masks, {} skipped)",
        input.display(),
        report.output_name,
        report.regions_detected,
        report.masks.len(),
        report.skipped.len()
    );
    if let Some(verify) = &report.verify {
        if verify.ok {
            line.push_str(", verified");
        } else {
            line.push_str(&format!(", {} residual PII", verify.residual.len()));
        }
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, RgbImage};
    use veil_core::MemoryStorage;
    use veil_ocr::{OcrAuditInfo, OcrError, TextRegion};

    struct Fixed(Vec<TextRegion>);

    impl OcrEngine for Fixed {
        fn detect(&mut self, _img: &DynamicImage) -> Result<Vec<TextRegion>, OcrError> {
            Ok(self.0.clone())
        }

        fn audit_info(&self) -> OcrAuditInfo {
            OcrAuditInfo {
                engine: "fixed".to_string(),
                engine_version: None,
                engine_params: None,
            }
        }
    }

    fn write_png(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        RgbImage::from_pixel(8, 8, image::Rgb([255, 255, 255])).save(&path).unwrap();
        path
    }

    #[test]
    fn test_batch_keeps_input_order_and_isolates_failures() {
        let dir = tempfile::tempdir().unwrap();
        let inputs = vec![
            write_png(dir.path(), "a.png"),
            dir.path().join("missing.png"),
            write_png(dir.path(), "b.png"),
            write_png(dir.path(), "c.png"),
        ];
        let storage = Arc::new(MemoryStorage::new());

        let outcomes = run_batch(
            &inputs,
            vec![Fixed(Vec::new()), Fixed(Vec::new())],
            &Classifier::default(),
            Arc::clone(&storage),
            &PipelineOptions::default(),
        );

        assert_eq!(outcomes.len(), 4);
        assert_eq!(outcomes[0].as_ref().unwrap().output_name, "masked_a.png");
        assert!(outcomes[1].is_err());
        assert_eq!(outcomes[2].as_ref().unwrap().output_name, "masked_b.png");
        assert_eq!(outcomes[3].as_ref().unwrap().output_name, "masked_c.png");
        assert_eq!(storage.len(), 3);
    }

    #[test]
    fn test_describe_mentions_verification() {
        let report = ProcessReport {
            output_name: "masked_a.png".to_string(),
            regions_detected: 3,
            masks: Vec::new(),
            skipped: Vec::new(),
            engine: Fixed(Vec::new()).audit_info(),
            verify: Some(Default::default()),
            elapsed_ms: 5,
        };
        let line = describe(Path::new("in/a.png"), &report);
        assert!(line.contains("masked_a.png"));
        assert!(line.contains("3 regions"));
        // default VerifyResult has ok == false and no residual
        assert!(line.contains("0 residual PII"));
    }
}
