use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use veil_core::{FsStorage, Storage};

use crate::config::AppConfig;

pub fn handle(
    config: &AppConfig,
    output_name: &str,
    dest: &Path,
    output_dir: Option<PathBuf>,
) -> Result<()> {
    let root = output_dir.unwrap_or_else(|| config.output_dir());
    let storage =
        FsStorage::new(&root).with_context(|| format!("cannot open {}", root.display()))?;

    let bytes = storage
        .read(output_name)
        .with_context(|| format!("cannot read {} from {}", output_name, root.display()))?;

    let target = if dest.is_dir() {
        dest.join(output_name)
    } else {
        dest.to_path_buf()
    };
    std::fs::write(&target, &bytes)
        .with_context(|| format!("cannot write {}", target.display()))?;

    println!("✓ {} -> {} ({} bytes)", output_name, target.display(), bytes.len());
    Ok(())
}
