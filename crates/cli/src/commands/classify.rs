use anyhow::{Context, Result};

use crate::config::AppConfig;

pub fn handle(config: &AppConfig, text: &str) -> Result<()> {
    let classifier = config.build_classifier().context("invalid classifier rules")?;

    match classifier.find_match(text) {
        Some(hit) => println!("PII ({})", hit),
        None => println!("not PII"),
    }

    Ok(())
}
