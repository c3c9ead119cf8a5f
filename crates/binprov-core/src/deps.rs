//! Deps files: resolved product paths recorded for later runs.
//!
//! ```toml
//! platform = "x86_64-linux-gnu"
//!
//! [products.libfoo]
//! kind = "library"
//! path = "/opt/deps/lib/libfoo.so.1"
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use binprov_schema::Platform;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::probe;
use crate::products::{Product, ProductKind, enforces_exec_bit, is_executable};

/// One resolved product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepsEntry {
    /// Product variant.
    pub kind: ProductKind,
    /// Absolute path the product resolved to.
    pub path: PathBuf,
}

/// Contents of a deps file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepsFile {
    /// Platform the products were resolved for.
    pub platform: Platform,
    /// Resolved products by declared name.
    #[serde(default)]
    pub products: BTreeMap<String, DepsEntry>,
}

impl DepsFile {
    /// Read a deps file.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] if the file is missing, a TOML error if it is
    /// malformed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => Error::NotFound(path.to_path_buf()),
            _ => Error::Io(e),
        })?;
        Ok(toml::from_str(&content)?)
    }

    /// Recorded path for `name`.
    pub fn path(&self, name: &str) -> Option<&Path> {
        self.products.get(name).map(|e| e.path.as_path())
    }

    /// Re-check every recorded path against the filesystem.
    ///
    /// Files must exist; executables need an execute bit where the platform
    /// has one; libraries must load when the recorded platform is the host.
    ///
    /// # Errors
    ///
    /// [`Error::Unsatisfied`] for the first entry, in name order, that no
    /// longer holds.
    pub fn validate(&self) -> Result<()> {
        let is_host = self.platform == Platform::host();
        for (name, entry) in &self.products {
            let ok = entry.path.is_file()
                && match entry.kind {
                    ProductKind::File => true,
                    ProductKind::Executable => {
                        !enforces_exec_bit(&self.platform) || is_executable(&entry.path)
                    }
                    ProductKind::Library => !is_host || probe::can_load(&entry.path),
                };
            if !ok {
                return Err(Error::Unsatisfied { name: name.clone() });
            }
            debug!("{} still satisfied at {}", name, entry.path.display());
        }
        Ok(())
    }
}

/// Resolve every product for `platform` and record the results at `path`.
///
/// Nothing is written unless every product is satisfied.
///
/// # Errors
///
/// [`Error::Unsatisfied`] naming the first product (in name order) that
/// cannot be located, or I/O and serialization errors.
pub fn write_deps_file(
    path: &Path,
    products: &BTreeMap<String, Product>,
    platform: &Platform,
) -> Result<DepsFile> {
    let mut resolved = BTreeMap::new();
    for (name, product) in products {
        let located = product
            .locate(platform)
            .ok_or_else(|| Error::Unsatisfied { name: name.clone() })?;
        resolved.insert(
            name.clone(),
            DepsEntry {
                kind: product.kind(),
                path: located,
            },
        );
    }

    let deps = DepsFile {
        platform: *platform,
        products: resolved,
    };
    let content = toml::to_string_pretty(&deps)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let temp_path = path.with_extension("toml.tmp");
    fs::write(&temp_path, content)?;
    fs::rename(&temp_path, path)?;

    info!(
        "Wrote {} products to {}",
        deps.products.len(),
        path.display()
    );
    Ok(deps)
}
