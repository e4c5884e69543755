use anyhow::{Context, Result};
use std::path::Path;

use crate::config::{save_config, AppConfig};

pub fn handle(config: &AppConfig, config_path: &Path, init: bool) -> Result<()> {
    if init {
        if config_path.exists() {
            anyhow::bail!("{} already exists", config_path.display());
        }
        save_config(config_path, &AppConfig::default())
            .with_context(|| format!("failed to write {}", config_path.display()))?;
        println!("✓ Created {}", config_path.display());
        return Ok(());
    }

    println!("# {}", config_path.display());
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}
