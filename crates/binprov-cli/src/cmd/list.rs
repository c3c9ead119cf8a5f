//! List command

use anyhow::{Context, Result};
use binprov_core::{Manifest, Prefix};
use crossterm::style::Stylize;

use crate::ui::Output;

/// List every manifest in the prefix with its file count and health.
pub fn list(prefix: &Prefix) -> Result<()> {
    let manifests = prefix
        .list_manifests()
        .with_context(|| format!("Failed to read {}", prefix.manifestdir().display()))?;

    if manifests.is_empty() {
        println!();
        println!("  Nothing installed in {}.", prefix.path().display());
        println!("  Run 'binprov install <archive> <sha256>' to get started.");
        return Ok(());
    }

    println!();
    println!(
        "  {} {}  {}",
        format!("{:<48}", "ARCHIVE").bold(),
        format!("{:>6}", "FILES").bold(),
        "STATUS".bold()
    );

    for path in &manifests {
        let Some(base) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let files = Manifest::read(path).map(|m| m.files().len()).unwrap_or(0);
        let status = if prefix.is_installed(base) {
            "ok".green()
        } else {
            "incomplete".yellow()
        };
        println!("  {base:<48} {files:>6}  {status}");
    }

    println!();
    Output::new().info(&format!(
        "{} install{} in {}",
        manifests.len(),
        if manifests.len() == 1 { "" } else { "s" },
        prefix.path().display()
    ));
    Ok(())
}
