//! Uninstall command

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use binprov_core::manifest::{MANIFEST_EXTENSION, Manifest};
use binprov_core::{Prefix, manifest_for_file, uninstall as remove_install};
use tracing::debug;

use crate::ui::Output;

/// Remove the install that `target` names: a manifest, or any file it wrote.
pub fn uninstall(prefix: &Prefix, target: &Path, dry_run: bool) -> Result<()> {
    let output = Output::new();
    let manifest_path = resolve_manifest(prefix, target)?;
    debug!("Uninstalling via {}", manifest_path.display());

    if dry_run {
        let manifest = Manifest::read(&manifest_path)
            .with_context(|| format!("Failed to read {}", manifest_path.display()))?;
        output.info(&format!(
            "Would remove {} files listed in {}",
            manifest.files().len(),
            manifest_path.display()
        ));
        for file in manifest.files() {
            output.detail(&file.display().to_string());
        }
        return Ok(());
    }

    let manifest = remove_install(&manifest_path)
        .with_context(|| format!("Failed to uninstall {}", manifest_path.display()))?;
    output.success(&format!(
        "Removed {} files listed in {}",
        manifest.files().len(),
        manifest_path.display()
    ));
    Ok(())
}

fn resolve_manifest(prefix: &Prefix, target: &Path) -> Result<PathBuf> {
    let is_manifest = target
        .extension()
        .is_some_and(|ext| ext == MANIFEST_EXTENSION)
        && target.is_file();
    if is_manifest {
        return Ok(target.to_path_buf());
    }
    let absolute = std::path::absolute(target)?;
    manifest_for_file(&absolute, prefix)
        .with_context(|| format!("No install owns {}", target.display()))
}
