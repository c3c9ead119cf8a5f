//! Install command

use anyhow::{Context, Result};
use binprov_core::fetch::default_fetcher;
use binprov_core::{ArchiveSource, InstallOptions, Installer, Prefix};

use crate::ui::Output;

/// Verify `source` against `sha256` and install it into `prefix`.
pub fn install(
    prefix: &Prefix,
    source: &str,
    sha256: &str,
    options: InstallOptions,
    dry_run: bool,
) -> Result<()> {
    let output = Output::new();
    let source = ArchiveSource::from(source);
    let installer = Installer::new(prefix.clone(), default_fetcher()?);

    if dry_run {
        let plan = installer
            .plan(&source, sha256, options)
            .with_context(|| format!("Failed to verify {source}"))?;
        output.info(&format!(
            "Would install {} files from {} into {}",
            plan.files().len(),
            source,
            prefix.path().display()
        ));
        for file in plan.files() {
            output.detail(&file.display().to_string());
        }
        for file in plan.replaced() {
            output.warning(&format!("Would replace {}", file.display()));
        }
        return Ok(());
    }

    let manifest = installer
        .install(&source, sha256, options)
        .with_context(|| format!("Failed to install {source}"))?;

    output.success(&format!(
        "Installed {} ({} files)",
        source.base_name(),
        manifest.files().len()
    ));
    output.detail(&manifest.path().display().to_string());
    Ok(())
}
