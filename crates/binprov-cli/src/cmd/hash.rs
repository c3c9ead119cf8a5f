//! Hash command

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use anyhow::{Context, Result};
use binprov_core::Sha256Digest;

/// Print the SHA-256 of each file.
pub fn hash(files: &[PathBuf]) -> Result<()> {
    for file in files {
        let reader = File::open(file).with_context(|| format!("Failed to open {}", file.display()))?;
        let digest = Sha256Digest::compute_reader(BufReader::new(reader))
            .with_context(|| format!("Failed to read {}", file.display()))?;
        println!("{digest}  {}", file.display());
    }
    Ok(())
}
