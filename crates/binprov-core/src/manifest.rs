//! Install manifests.
//!
//! A manifest is the record of a single install: the files it extracted,
//! one root-relative path per line, stored as `<root>/manifests/<base>.list`.
//! Paths always use `/` separators on disk.

use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{Error, Result};

/// File extension of manifest files.
pub const MANIFEST_EXTENSION: &str = "list";

/// The file list of one install operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    path: PathBuf,
    files: Vec<PathBuf>,
}

impl Manifest {
    /// Create a manifest at `path` listing `files` (relative to the install
    /// root). Duplicate entries are dropped, first occurrence wins.
    pub fn new(path: impl Into<PathBuf>, files: impl IntoIterator<Item = PathBuf>) -> Self {
        let mut manifest = Self {
            path: path.into(),
            files: Vec::new(),
        };
        for file in files {
            if !manifest.contains(&file) {
                manifest.files.push(file);
            }
        }
        manifest
    }

    /// Load a manifest from disk.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the file does not exist, or an I/O
    /// error if it cannot be read.
    pub fn read(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => Error::NotFound(path.to_path_buf()),
            _ => Error::Io(e),
        })?;

        let files = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(PathBuf::from)
            .filter(|file| {
                let relative = is_root_relative(file);
                if !relative {
                    warn!(
                        "Ignoring entry {} in {}: not inside the install root",
                        file.display(),
                        path.display()
                    );
                }
                relative
            });

        Ok(Self::new(path, files))
    }

    /// Persist the manifest.
    ///
    /// The file is first written to a temporary sibling and then renamed so
    /// that a scan never observes a half-written list.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directory cannot be created or the write
    /// or rename fails.
    pub fn write(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut content = String::new();
        for file in &self.files {
            content.push_str(&to_manifest_line(file));
            content.push('\n');
        }

        let temp_path = self.path.with_extension("list.tmp");
        fs::write(&temp_path, content)?;
        fs::rename(&temp_path, &self.path)?;
        debug!(
            "Wrote manifest {} ({} files)",
            self.path.display(),
            self.files.len()
        );
        Ok(())
    }

    /// Where this manifest lives on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Root-relative paths listed by this manifest, in install order.
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Whether `rel` (relative to the install root) is listed.
    pub fn contains(&self, rel: &Path) -> bool {
        self.files.iter().any(|f| same_entry(f, rel))
    }

    /// Drop `rel` from the list. Returns whether it was present.
    pub fn remove_entry(&mut self, rel: &Path) -> bool {
        let before = self.files.len();
        self.files.retain(|f| !same_entry(f, rel));
        before != self.files.len()
    }
}

fn to_manifest_line(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Only plain components; anything else could resolve outside the root.
fn is_root_relative(path: &Path) -> bool {
    path.components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

fn same_entry(a: &Path, b: &Path) -> bool {
    to_manifest_line(a) == to_manifest_line(b)
}
