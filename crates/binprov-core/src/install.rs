//! Manifest-tracked install and uninstall.
//!
//! An install is verified in full before anything is written: digest,
//! platform tag, format, and a conflict pass over every member path. Only
//! then are files extracted and the manifest committed. There is no
//! rollback if extraction itself fails part-way.

use std::collections::HashSet;
use std::ffi::OsStr;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

use binprov_schema::{Platform, Sha256Digest, strip_archive_extension};
use tracing::{debug, info, warn};

use crate::archive::{self, ArchiveFormat};
use crate::error::{Error, Result};
use crate::fetch::Fetcher;
use crate::manifest::Manifest;
use crate::prefix::{MANIFEST_DIR, Prefix};

/// Where an archive comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveSource {
    /// A file on the local filesystem.
    Path(PathBuf),
    /// An `http://` or `https://` URL.
    Url(String),
}

impl ArchiveSource {
    /// Final path or URL component (`libfoo.x86_64-linux-gnu.tar.gz`).
    pub fn name(&self) -> String {
        match self {
            ArchiveSource::Path(path) => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            ArchiveSource::Url(url) => {
                let without_query = url.split(['?', '#']).next().unwrap_or(url);
                without_query
                    .trim_end_matches('/')
                    .rsplit('/')
                    .next()
                    .unwrap_or_default()
                    .to_string()
            }
        }
    }

    /// Name without its archive extension; manifests are keyed by it.
    pub fn base_name(&self) -> String {
        strip_archive_extension(&self.name()).to_string()
    }
}

impl From<&str> for ArchiveSource {
    fn from(s: &str) -> Self {
        if s.starts_with("http://") || s.starts_with("https://") {
            ArchiveSource::Url(s.to_string())
        } else {
            ArchiveSource::Path(PathBuf::from(s))
        }
    }
}

impl FromStr for ArchiveSource {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(ArchiveSource::from(s))
    }
}

impl From<&Path> for ArchiveSource {
    fn from(path: &Path) -> Self {
        ArchiveSource::Path(path.to_path_buf())
    }
}

impl From<PathBuf> for ArchiveSource {
    fn from(path: PathBuf) -> Self {
        ArchiveSource::Path(path)
    }
}

impl fmt::Display for ArchiveSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArchiveSource::Path(path) => write!(f, "{}", path.display()),
            ArchiveSource::Url(url) => f.write_str(url),
        }
    }
}

/// Knobs for [`Installer::install`].
#[derive(Debug, Clone, Copy, Default)]
pub struct InstallOptions {
    /// Replace files (and a same-named manifest) that are already present.
    pub overwrite: bool,
    /// Install even if the archive name is tagged for another platform.
    pub ignore_platform: bool,
}

/// A verified install that has not touched the install root yet.
#[derive(Debug)]
pub struct InstallPlan {
    source: ArchiveSource,
    digest: Sha256Digest,
    format: ArchiveFormat,
    bytes: Vec<u8>,
    files: Vec<PathBuf>,
    manifest_path: PathBuf,
    replaced: Vec<PathBuf>,
}

impl InstallPlan {
    /// Archive being installed.
    pub fn source(&self) -> &ArchiveSource {
        &self.source
    }

    /// Digest of the archive bytes.
    pub fn digest(&self) -> &Sha256Digest {
        &self.digest
    }

    /// Root-relative paths the archive will create.
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Manifest that will record the install.
    pub fn manifest_path(&self) -> &Path {
        &self.manifest_path
    }

    /// Existing paths that will be overwritten.
    pub fn replaced(&self) -> &[PathBuf] {
        &self.replaced
    }
}

/// Installs archives into one install root.
pub struct Installer<F> {
    prefix: Prefix,
    fetcher: F,
}

impl<F: Fetcher> Installer<F> {
    /// Bind an install root to a transport for remote sources.
    pub fn new(prefix: Prefix, fetcher: F) -> Self {
        Self { prefix, fetcher }
    }

    /// Install root.
    pub fn prefix(&self) -> &Prefix {
        &self.prefix
    }

    /// Obtain and verify `source` without modifying the install root.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] / [`Error::Fetch`] when the bytes cannot be obtained.
    /// - [`Error::HashMismatch`] when they do not hash to `expected_digest`.
    /// - [`Error::PlatformMismatch`] when the name is tagged for another platform.
    /// - [`Error::UnsupportedFormat`] / [`Error::UnsafePath`] for unusable archives.
    /// - [`Error::DestinationExists`] when a member or the manifest already
    ///   exists and `options.overwrite` is false.
    pub fn plan(
        &self,
        source: &ArchiveSource,
        expected_digest: &str,
        options: InstallOptions,
    ) -> Result<InstallPlan> {
        let name = source.name();
        let bytes = self.read_source(source)?;

        let digest = Sha256Digest::compute(&bytes);
        if !digest.matches(expected_digest) {
            return Err(Error::HashMismatch {
                source_name: name,
                expected: expected_digest.to_string(),
                actual: digest.to_string(),
            });
        }
        debug!("Verified {} ({})", name, digest);

        check_platform(&name, options.ignore_platform)?;

        let format = ArchiveFormat::from_name(&name)?;
        let manifest_path = self.prefix.manifest_path(&source.base_name());
        if manifest_path.exists() && !options.overwrite {
            return Err(Error::DestinationExists(manifest_path));
        }

        let files = archive::list_files(&bytes, format)?;
        let mut replaced = Vec::new();
        for rel in &files {
            if rel.components().next() == Some(Component::Normal(OsStr::new(MANIFEST_DIR))) {
                return Err(Error::UnsafePath(rel.display().to_string()));
            }
            if let Some(blocker) = self.blocking_ancestor(rel) {
                return Err(Error::DestinationExists(blocker));
            }
            let target = self.prefix.path().join(rel);
            let Ok(meta) = target.symlink_metadata() else {
                continue;
            };
            if meta.is_dir() || !options.overwrite {
                return Err(Error::DestinationExists(target));
            }
            replaced.push(rel.clone());
        }

        Ok(InstallPlan {
            source: source.clone(),
            digest,
            format,
            bytes,
            files,
            manifest_path,
            replaced,
        })
    }

    /// Verify, extract and record `source`.
    ///
    /// # Errors
    ///
    /// Everything [`Installer::plan`] reports, plus I/O errors during
    /// extraction. Files written before such a failure are left in place.
    pub fn install(
        &self,
        source: &ArchiveSource,
        expected_digest: &str,
        options: InstallOptions,
    ) -> Result<Manifest> {
        let plan = self.plan(source, expected_digest, options)?;
        self.commit(plan)
    }

    /// Carry out a plan produced by [`Installer::plan`].
    ///
    /// # Errors
    ///
    /// I/O errors during extraction or manifest writes.
    pub fn commit(&self, plan: InstallPlan) -> Result<Manifest> {
        if !plan.replaced.is_empty() {
            self.disown(&plan.replaced, &plan.manifest_path)?;
        }
        if plan.manifest_path.exists() {
            self.drop_stale_files(&plan.manifest_path, &plan.files)?;
        }

        let extracted = archive::extract(&plan.bytes, plan.format, self.prefix.path())?;
        let manifest = Manifest::new(
            &plan.manifest_path,
            extracted.into_iter().map(|f| f.relative_path),
        );
        manifest.write()?;

        info!(
            "Installed {} ({} files) into {}",
            plan.source,
            manifest.files().len(),
            self.prefix.path().display()
        );
        Ok(manifest)
    }

    /// Remove the install recorded by `manifest_path`.
    ///
    /// # Errors
    ///
    /// See [`uninstall`].
    pub fn uninstall(&self, manifest_path: &Path) -> Result<Manifest> {
        uninstall_in(&self.prefix, manifest_path)
    }

    /// Manifest that owns `path`.
    ///
    /// # Errors
    ///
    /// See [`manifest_for_file`].
    pub fn manifest_for_file(&self, path: &Path) -> Result<PathBuf> {
        manifest_for_file(path, &self.prefix)
    }

    fn read_source(&self, source: &ArchiveSource) -> Result<Vec<u8>> {
        match source {
            ArchiveSource::Path(path) => fs::read(path).map_err(|e| match e.kind() {
                ErrorKind::NotFound => Error::NotFound(path.clone()),
                _ => Error::Io(e),
            }),
            ArchiveSource::Url(url) => self.fetcher.fetch(url),
        }
    }

    /// First parent directory of `rel` that exists under the root but is
    /// not a directory, which would make extraction fail part-way.
    fn blocking_ancestor(&self, rel: &Path) -> Option<PathBuf> {
        rel.ancestors()
            .skip(1)
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(|dir| self.prefix.path().join(dir))
            .find(|dir| dir.symlink_metadata().is_ok() && !dir.is_dir())
    }

    /// Move `paths` out of every other manifest that lists them.
    fn disown(&self, paths: &[PathBuf], keep: &Path) -> Result<()> {
        for manifest_path in self.prefix.list_manifests()? {
            if manifest_path == keep {
                continue;
            }
            let mut manifest = Manifest::read(&manifest_path)?;
            let mut changed = false;
            for rel in paths {
                changed |= manifest.remove_entry(rel);
            }
            if changed {
                warn!(
                    "Taking over files previously owned by {}",
                    manifest_path.display()
                );
                manifest.write()?;
            }
        }
        Ok(())
    }

    /// Delete files a previous install of the same name left that the new
    /// archive no longer ships.
    fn drop_stale_files(&self, manifest_path: &Path, new_files: &[PathBuf]) -> Result<()> {
        let old = Manifest::read(manifest_path)?;
        let keep: HashSet<&PathBuf> = new_files.iter().collect();
        let stale: Vec<PathBuf> = old
            .files()
            .iter()
            .filter(|rel| !keep.contains(rel))
            .cloned()
            .collect();
        if !stale.is_empty() {
            debug!("Removing {} stale files", stale.len());
            remove_files(&self.prefix, &stale)?;
        }
        Ok(())
    }
}

fn check_platform(name: &str, ignore: bool) -> Result<()> {
    let Some(found) = Platform::from_filename(name) else {
        return Ok(());
    };
    let host = Platform::host();
    if found == host {
        return Ok(());
    }
    if ignore {
        warn!("Installing {} built for {} on {}", name, found, host);
        return Ok(());
    }
    Err(Error::PlatformMismatch {
        source_name: name.to_string(),
        found,
        host,
    })
}

/// Remove the install recorded by `manifest_path`.
///
/// The install root is the parent of the manifest directory. Listed files
/// that are already gone are skipped, directories left empty are pruned,
/// and the manifest is deleted last.
///
/// # Errors
///
/// Returns [`Error::NotFound`] if the manifest does not exist, or an I/O
/// error if it cannot be read or a file cannot be removed.
pub fn uninstall(manifest_path: &Path) -> Result<Manifest> {
    let root = manifest_path
        .parent()
        .and_then(Path::parent)
        .ok_or_else(|| Error::NotFound(manifest_path.to_path_buf()))?;
    uninstall_in(&Prefix::new(root), manifest_path)
}

fn uninstall_in(prefix: &Prefix, manifest_path: &Path) -> Result<Manifest> {
    let manifest = Manifest::read(manifest_path)?;
    let removed = remove_files(prefix, manifest.files())?;
    fs::remove_file(manifest_path)?;
    info!(
        "Uninstalled {} ({} of {} files removed)",
        manifest_path.display(),
        removed,
        manifest.files().len()
    );
    Ok(manifest)
}

/// Delete root-relative `files`, then prune emptied directories. Returns how
/// many files were actually removed.
fn remove_files(prefix: &Prefix, files: &[PathBuf]) -> Result<usize> {
    let mut removed = 0;
    let mut parents = Vec::new();

    for rel in files {
        let path = prefix.path().join(rel);
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!("Removed {}", path.display());
                removed += 1;
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Already gone: {}", path.display());
            }
            Err(e) => return Err(e.into()),
        }
        if let Some(parent) = path.parent() {
            parents.push(parent.to_path_buf());
        }
    }

    // Deepest first so nested empty directories collapse
    parents.sort_by(|a, b| {
        b.components()
            .count()
            .cmp(&a.components().count())
            .then_with(|| a.cmp(b))
    });
    parents.dedup();
    for dir in parents {
        prune_empty_dirs(prefix, &dir);
    }
    Ok(removed)
}

fn prune_empty_dirs(prefix: &Prefix, start: &Path) {
    let mut dir = Some(start);
    while let Some(current) = dir {
        if !current.starts_with(prefix.path()) || prefix.is_reserved_dir(current) {
            break;
        }
        if fs::remove_dir(current).is_err() {
            break;
        }
        debug!("Pruned empty directory {}", current.display());
        dir = current.parent();
    }
}

/// Manifest under `prefix` that lists `path`.
///
/// A relative `path` is taken relative to the install root.
///
/// # Errors
///
/// - [`Error::NotFound`] if nothing exists at `path`.
/// - [`Error::OrphanFile`] if it exists but no manifest lists it, including
///   files outside the install root.
pub fn manifest_for_file(path: &Path, prefix: &Prefix) -> Result<PathBuf> {
    let absolute = normalize(&std::path::absolute(prefix.path().join(path))?);
    if absolute.symlink_metadata().is_err() {
        return Err(Error::NotFound(path.to_path_buf()));
    }

    let Some(rel) = relative_to_root(&absolute, prefix.path()) else {
        return Err(Error::OrphanFile(absolute));
    };

    for manifest_path in prefix.list_manifests()? {
        match Manifest::read(&manifest_path) {
            Ok(manifest) if manifest.contains(&rel) => return Ok(manifest_path),
            Ok(_) => {}
            Err(e) => warn!("Skipping unreadable manifest {}: {}", manifest_path.display(), e),
        }
    }
    Err(Error::OrphanFile(absolute))
}

/// Strip `root` from the already normalized `path`, retrying with both
/// sides canonicalized so symlinked roots still compare equal. The file
/// itself is not resolved. `None` unless the result stays inside the root.
fn relative_to_root(path: &Path, root: &Path) -> Option<PathBuf> {
    let root_abs = normalize(&std::path::absolute(root).ok()?);
    let rel = match path.strip_prefix(&root_abs) {
        Ok(rel) => rel.to_path_buf(),
        Err(_) => {
            let root = root.canonicalize().ok()?;
            let parent = path.parent()?.canonicalize().ok()?;
            parent.strip_prefix(&root).ok()?.join(path.file_name()?)
        }
    };
    let inside = rel
        .components()
        .all(|c| matches!(c, Component::Normal(_)));
    (inside && !rel.as_os_str().is_empty()).then_some(rel)
}

/// Resolve `.` and `..` lexically. A `..` that would climb above the start
/// of a relative path is kept.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(out.components().next_back(), Some(Component::Normal(_))) {
                    out.pop();
                } else if !out.has_root() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// Check an archive on disk against an expected digest.
///
/// # Errors
///
/// Returns [`Error::NotFound`] if the file is missing, or
/// [`Error::HashMismatch`] if its digest differs.
pub fn verify_file(path: &Path, expected_digest: &str) -> Result<Sha256Digest> {
    let file = fs::File::open(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => Error::NotFound(path.to_path_buf()),
        _ => Error::Io(e),
    })?;
    let digest = Sha256Digest::compute_reader(std::io::BufReader::new(file))?;
    if !digest.matches(expected_digest) {
        return Err(Error::HashMismatch {
            source_name: path.display().to_string(),
            expected: expected_digest.to_string(),
            actual: digest.to_string(),
        });
    }
    Ok(digest)
}
