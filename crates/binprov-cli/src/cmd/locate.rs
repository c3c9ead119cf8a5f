//! Locate command

use anyhow::{Context, Result, bail};
use binprov_core::{ExecutableProduct, FileProduct, LibraryProduct, Platform, Prefix, Product};

use crate::LocateCommands;

/// Resolve a product for `platform` (default: host) and print its path.
pub fn locate(prefix: &Prefix, platform: Option<&str>, command: &LocateCommands) -> Result<()> {
    let platform = match platform {
        Some(triplet) => triplet
            .parse::<Platform>()
            .with_context(|| format!("Invalid platform '{triplet}'"))?,
        None => Platform::host(),
    };

    let product: Product = match command {
        LocateCommands::Library { name, dir } => {
            let dir = dir.clone().unwrap_or_else(|| prefix.libdir_for(&platform));
            LibraryProduct::new(dir, name.as_str())?.into()
        }
        LocateCommands::Executable { name } => ExecutableProduct::in_prefix(prefix, name).into(),
        LocateCommands::File { path } => FileProduct::new(prefix.path().join(path)).into(),
    };

    match product.locate(&platform) {
        Some(path) => {
            println!("{}", path.display());
            Ok(())
        }
        None => bail!("{product} is not satisfied for {platform}"),
    }
}
