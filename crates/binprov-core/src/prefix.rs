//! Install root layout.
//!
//! ```text
//! <root>/
//! ├── bin/          # executables (and DLLs on Windows)
//! ├── lib/          # shared libraries (aliases bin/ on Windows)
//! ├── include/      # headers
//! └── manifests/    # one <base>.list per install
//! ```
//!
//! Directories are created lazily by whoever first writes into them.

use std::fs;
use std::path::{Path, PathBuf};

use binprov_schema::Platform;
use tracing::warn;

use crate::error::Result;
use crate::manifest::{MANIFEST_EXTENSION, Manifest};

/// Name of the reserved metadata directory inside an install root.
pub const MANIFEST_DIR: &str = "manifests";

/// An install root and the conventional paths derived from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prefix {
    root: PathBuf,
}

impl Prefix {
    /// Wrap an install root. A relative path is resolved against the
    /// current working directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let root = if root.is_absolute() {
            root
        } else {
            std::env::current_dir().map_or_else(|_| root.clone(), |cwd| cwd.join(&root))
        };
        Self { root }
    }

    /// The install root itself.
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// `<root>/bin`
    pub fn bindir(&self) -> PathBuf {
        self.root.join("bin")
    }

    /// Library directory under the host's convention.
    pub fn libdir(&self) -> PathBuf {
        self.libdir_for(&Platform::host())
    }

    /// Library directory under `platform`'s convention: `<root>/lib`, or
    /// `<root>/bin` where libraries live beside executables.
    pub fn libdir_for(&self, platform: &Platform) -> PathBuf {
        if platform.separates_libdir() {
            self.root.join("lib")
        } else {
            self.bindir()
        }
    }

    /// `<root>/include`
    pub fn includedir(&self) -> PathBuf {
        self.root.join("include")
    }

    /// `<root>/manifests`
    pub fn manifestdir(&self) -> PathBuf {
        self.root.join(MANIFEST_DIR)
    }

    /// Manifest location for an archive's base name.
    pub fn manifest_path(&self, base_name: &str) -> PathBuf {
        self.manifestdir()
            .join(format!("{base_name}.{MANIFEST_EXTENSION}"))
    }

    /// Whether `path` is one of the directories this layout reserves.
    pub(crate) fn is_reserved_dir(&self, path: &Path) -> bool {
        path == self.root
            || path == self.bindir()
            || path == self.root.join("lib")
            || path == self.includedir()
            || path == self.manifestdir()
    }

    /// All manifest files in the metadata directory, sorted by path.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the metadata directory exists but cannot be read.
    pub fn list_manifests(&self) -> Result<Vec<PathBuf>> {
        let dir = self.manifestdir();
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut manifests = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.is_file()
                && path.extension().and_then(|e| e.to_str()) == Some(MANIFEST_EXTENSION)
            {
                manifests.push(path);
            }
        }
        manifests.sort();
        Ok(manifests)
    }

    /// Whether the archive with this base name is installed: its manifest
    /// exists and every file it lists is still on disk.
    pub fn is_installed(&self, base_name: &str) -> bool {
        let manifest_path = self.manifest_path(base_name);
        if !manifest_path.is_file() {
            return false;
        }
        match Manifest::read(&manifest_path) {
            Ok(manifest) => manifest
                .files()
                .iter()
                .all(|rel| self.root.join(rel).symlink_metadata().is_ok()),
            Err(e) => {
                warn!("Unreadable manifest {}: {}", manifest_path.display(), e);
                false
            }
        }
    }
}
