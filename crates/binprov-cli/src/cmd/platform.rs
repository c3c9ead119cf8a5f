//! Platform command

use anyhow::{Context, Result};
use binprov_schema::Platform;

/// Print the host platform triplet.
pub fn platform() -> Result<()> {
    let host = Platform::host_checked().context("Failed to resolve the host platform")?;
    println!("{host}");
    Ok(())
}
