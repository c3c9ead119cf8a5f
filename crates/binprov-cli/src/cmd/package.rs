//! Package command

use std::path::Path;

use anyhow::{Context, Result, bail};
use binprov_core::{Sha256Digest, archive};

use crate::ui::Output;

/// Pack `root` into `<out_base>.tar.gz` and print its digest.
pub fn package(root: &Path, out_base: &Path, dry_run: bool) -> Result<()> {
    let output = Output::new();

    if !root.is_dir() {
        bail!("Not a directory: {}", root.display());
    }
    if dry_run {
        output.info(&format!(
            "Would package {} into {}.tar.gz",
            root.display(),
            out_base.display()
        ));
        return Ok(());
    }

    let archive_path = archive::package(root, out_base)
        .with_context(|| format!("Failed to package {}", root.display()))?;
    let file = std::fs::File::open(&archive_path)
        .with_context(|| format!("Failed to reopen {}", archive_path.display()))?;
    let digest = Sha256Digest::compute_reader(std::io::BufReader::new(file))?;

    output.success(&format!("Created {}", archive_path.display()));
    println!("{digest}  {}", archive_path.display());
    Ok(())
}
