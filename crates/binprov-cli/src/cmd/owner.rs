//! Owner command

use std::path::Path;

use anyhow::{Context, Result};
use binprov_core::{Prefix, manifest_for_file};

/// Print the manifest that installed `file`.
pub fn owner(prefix: &Prefix, file: &Path) -> Result<()> {
    let absolute = std::path::absolute(file)?;
    let manifest = manifest_for_file(&absolute, prefix)
        .with_context(|| format!("Failed to find the owner of {}", file.display()))?;
    println!("{}", manifest.display());
    Ok(())
}
