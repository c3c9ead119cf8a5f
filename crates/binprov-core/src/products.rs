//! Products: declared expectations of installed artifacts.
//!
//! Satisfaction is recomputed from the filesystem on every query. Absence
//! is an ordinary `None`, never an error.

use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use binprov_schema::Platform;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace};

use crate::dlname;
use crate::prefix::Prefix;
use crate::probe;

/// Invalid product declarations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProductError {
    /// A library product needs a base name to match against.
    #[error("Library product name must not be empty")]
    EmptyName,
}

/// Kind tag used when a product is written out or displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductKind {
    /// A shared library.
    Library,
    /// A runnable program.
    Executable,
    /// Any other file.
    File,
}

impl ProductKind {
    /// Lowercase name (`library`, `executable`, `file`).
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductKind::Library => "library",
            ProductKind::Executable => "executable",
            ProductKind::File => "file",
        }
    }
}

impl fmt::Display for ProductKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A shared library named `name` somewhere in `dir`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryProduct {
    dir: PathBuf,
    name: String,
}

impl LibraryProduct {
    /// Declare a library by directory and base name (`libfoo`, without
    /// extension or version).
    ///
    /// # Errors
    ///
    /// Returns [`ProductError::EmptyName`] if `name` is empty.
    pub fn new(dir: impl Into<PathBuf>, name: impl Into<String>) -> Result<Self, ProductError> {
        let name = name.into();
        if name.is_empty() {
            return Err(ProductError::EmptyName);
        }
        Ok(Self {
            dir: dir.into(),
            name,
        })
    }

    /// Declare a library in `prefix`'s library directory for `platform`.
    ///
    /// # Errors
    ///
    /// Returns [`ProductError::EmptyName`] if `name` is empty.
    pub fn in_prefix(
        prefix: &Prefix,
        name: impl Into<String>,
        platform: &Platform,
    ) -> Result<Self, ProductError> {
        Self::new(prefix.libdir_for(platform), name)
    }

    /// Directory that is searched.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Base name candidates must start with.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// First library in the directory that fits the platform's filename
    /// grammar, belongs to this base name, and (for the host platform)
    /// actually loads.
    pub fn locate(&self, platform: &Platform) -> Option<PathBuf> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                trace!("Cannot read {}: {}", self.dir.display(), e);
                return None;
            }
        };

        let mut names: Vec<String> = entries
            .filter_map(std::result::Result::ok)
            .filter_map(|entry| entry.file_name().into_string().ok())
            .collect();
        names.sort();

        let family = platform.dylib_family();
        let probe_host = *platform == Platform::host();

        for file_name in names {
            let Some(parsed) = dlname::parse(&file_name, family) else {
                continue;
            };
            if !parsed.matches_base(&self.name) {
                continue;
            }

            let candidate = absolute(&self.dir.join(&file_name));
            if !candidate.is_file() {
                continue;
            }
            if probe_host && !probe::can_load(&candidate) {
                debug!("Skipping {}: does not load on host", candidate.display());
                continue;
            }
            return Some(candidate);
        }
        None
    }
}

/// A program at a fixed path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutableProduct {
    path: PathBuf,
}

impl ExecutableProduct {
    /// Declare an executable by path. A missing `.exe` suffix is tolerated
    /// at lookup time.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Declare `name` in `prefix`'s binary directory.
    pub fn in_prefix(prefix: &Prefix, name: impl AsRef<Path>) -> Self {
        Self::new(prefix.bindir().join(name))
    }

    /// Declared path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The declared path, or its `.exe` sibling, provided it is a file and
    /// (where `platform` has permission bits) executable.
    pub fn locate(&self, platform: &Platform) -> Option<PathBuf> {
        let resolved = if self.path.is_file() {
            self.path.clone()
        } else if has_exe_suffix(&self.path) {
            return None;
        } else {
            let mut with_exe = OsString::from(self.path.as_os_str());
            with_exe.push(".exe");
            let with_exe = PathBuf::from(with_exe);
            if !with_exe.is_file() {
                return None;
            }
            with_exe
        };

        if enforces_exec_bit(platform) && !is_executable(&resolved) {
            debug!("{} exists but is not executable", resolved.display());
            return None;
        }
        Some(absolute(&resolved))
    }
}

/// Any file at a fixed path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileProduct {
    path: PathBuf,
}

impl FileProduct {
    /// Declare a file by path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Declared path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The path, if a file exists there.
    pub fn locate(&self) -> Option<PathBuf> {
        self.path.is_file().then(|| absolute(&self.path))
    }
}

/// A declared artifact of one of the three supported kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Product {
    /// See [`LibraryProduct`].
    Library(LibraryProduct),
    /// See [`ExecutableProduct`].
    Executable(ExecutableProduct),
    /// See [`FileProduct`].
    File(FileProduct),
}

impl Product {
    /// Shorthand for [`LibraryProduct::new`].
    ///
    /// # Errors
    ///
    /// Returns [`ProductError::EmptyName`] if `name` is empty.
    pub fn library(dir: impl Into<PathBuf>, name: impl Into<String>) -> Result<Self, ProductError> {
        LibraryProduct::new(dir, name).map(Product::Library)
    }

    /// Shorthand for [`ExecutableProduct::new`].
    pub fn executable(path: impl Into<PathBuf>) -> Self {
        Product::Executable(ExecutableProduct::new(path))
    }

    /// Shorthand for [`FileProduct::new`].
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Product::File(FileProduct::new(path))
    }

    /// Which variant this is.
    pub fn kind(&self) -> ProductKind {
        match self {
            Product::Library(_) => ProductKind::Library,
            Product::Executable(_) => ProductKind::Executable,
            Product::File(_) => ProductKind::File,
        }
    }

    /// Resolve the product for `platform`.
    pub fn locate(&self, platform: &Platform) -> Option<PathBuf> {
        match self {
            Product::Library(lib) => lib.locate(platform),
            Product::Executable(exe) => exe.locate(platform),
            Product::File(file) => file.locate(),
        }
    }

    /// Resolve the product for the host platform.
    pub fn locate_host(&self) -> Option<PathBuf> {
        self.locate(&Platform::host())
    }

    /// Whether [`Product::locate`] finds something.
    pub fn satisfied(&self, platform: &Platform) -> bool {
        self.locate(platform).is_some()
    }

    /// Whether [`Product::locate_host`] finds something.
    pub fn satisfied_host(&self) -> bool {
        self.satisfied(&Platform::host())
    }
}

impl From<LibraryProduct> for Product {
    fn from(lib: LibraryProduct) -> Self {
        Product::Library(lib)
    }
}

impl From<ExecutableProduct> for Product {
    fn from(exe: ExecutableProduct) -> Self {
        Product::Executable(exe)
    }
}

impl From<FileProduct> for Product {
    fn from(file: FileProduct) -> Self {
        Product::File(file)
    }
}

impl fmt::Display for Product {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Product::Library(lib) => write!(f, "library {} in {}", lib.name, lib.dir.display()),
            Product::Executable(exe) => write!(f, "executable {}", exe.path.display()),
            Product::File(file) => write!(f, "file {}", file.path.display()),
        }
    }
}

fn has_exe_suffix(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("exe"))
}

/// Permission bits only mean something on a unix host, and only for
/// binaries that are not Windows executables.
pub(crate) fn enforces_exec_bit(platform: &Platform) -> bool {
    cfg!(unix) && !platform.is_windows()
}

#[cfg(unix)]
pub(crate) fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path).is_ok_and(|m| m.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
pub(crate) fn is_executable(path: &Path) -> bool {
    path.is_file()
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use binprov_schema::DylibFamily;
    use tempfile::tempdir;

    fn foreign_platform() -> Platform {
        let candidate: Platform = "x86_64-linux-gnu".parse().unwrap();
        if candidate == Platform::host() {
            "aarch64-linux-gnu".parse().unwrap()
        } else {
            candidate
        }
    }

    fn dylib_filename(family: DylibFamily) -> &'static str {
        match family {
            DylibFamily::Elf => "libfoo.so.1",
            DylibFamily::MachO => "libfoo.1.dylib",
            DylibFamily::Pe => "libfoo-1.dll",
        }
    }

    #[test]
    fn test_empty_root_satisfies_nothing() {
        let tmp = tempdir().unwrap();
        let prefix = Prefix::new(tmp.path());
        let host = Platform::host();

        let products = [
            Product::from(LibraryProduct::in_prefix(&prefix, "libfoo", &host).unwrap()),
            Product::from(ExecutableProduct::in_prefix(&prefix, "fooifier")),
            Product::file(prefix.includedir().join("foo.h")),
        ];
        for product in &products {
            assert!(!product.satisfied_host(), "{product}");
        }
    }

    #[test]
    fn test_empty_library_name_rejected() {
        assert_eq!(
            LibraryProduct::new("/tmp", "").unwrap_err(),
            ProductError::EmptyName
        );
        assert!(Product::library("/tmp", "").is_err());
    }

    #[test]
    fn test_file_product_existence_only() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("share/data.bin");
        let product = Product::file(&path);
        assert!(!product.satisfied_host());

        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, b"data").unwrap();
        assert_eq!(product.locate_host(), Some(path));
    }

    #[cfg(unix)]
    #[test]
    fn test_executable_needs_exec_bit() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempdir().unwrap();
        let path = tmp.path().join("fooifier");
        fs::write(&path, b"#!/bin/sh\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

        let product = Product::executable(&path);
        assert!(!product.satisfied_host());

        fs::set_permissions(&path, fs::Permissions::from_mode(0o744)).unwrap();
        assert!(product.satisfied_host());

        fs::set_permissions(&path, fs::Permissions::from_mode(0o641)).unwrap();
        assert!(product.satisfied_host());
    }

    #[cfg(unix)]
    #[test]
    fn test_windows_executable_skips_exec_bit() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempdir().unwrap();
        let path = tmp.path().join("fooifier.exe");
        fs::write(&path, b"MZ").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

        let windows: Platform = "x86_64-w64-mingw32".parse().unwrap();
        assert!(Product::executable(&path).satisfied(&windows));
    }

    #[test]
    fn test_exe_suffix_fallback() {
        let tmp = tempdir().unwrap();
        let declared = tmp.path().join("fooifier");
        let actual = tmp.path().join("fooifier.exe");
        fs::write(&actual, b"MZ").unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&actual, fs::Permissions::from_mode(0o755)).unwrap();
        }

        let product = Product::executable(&declared);
        assert_eq!(product.locate_host(), Some(actual.clone()));

        // a declared .exe never gains a second suffix
        let doubled = Product::executable(tmp.path().join("other.exe"));
        fs::write(tmp.path().join("other.exe.exe"), b"MZ").unwrap();
        assert!(!doubled.satisfied_host());
    }

    #[test]
    fn test_foreign_library_satisfied_by_existence() {
        let tmp = tempdir().unwrap();
        let foreign = foreign_platform();
        let name = dylib_filename(foreign.dylib_family());
        fs::write(tmp.path().join(name), b"not really a library").unwrap();

        let lib = LibraryProduct::new(tmp.path(), "libfoo").unwrap();
        assert_eq!(lib.locate(&foreign), Some(tmp.path().join(name)));
    }

    #[test]
    fn test_host_library_must_load() {
        let tmp = tempdir().unwrap();
        let host = Platform::host();
        let name = dylib_filename(host.dylib_family());
        fs::write(tmp.path().join(name), b"not really a library").unwrap();

        let lib = LibraryProduct::new(tmp.path(), "libfoo").unwrap();
        assert_eq!(lib.locate(&host), None);
    }

    #[test]
    fn test_library_name_is_not_a_substring_match() {
        let tmp = tempdir().unwrap();
        let foreign = foreign_platform();
        let name = dylib_filename(foreign.dylib_family());
        fs::write(tmp.path().join(name), b"x").unwrap();

        let lib = LibraryProduct::new(tmp.path(), "libfo").unwrap();
        assert!(!Product::from(lib).satisfied(&foreign));
        let lib = LibraryProduct::new(tmp.path(), "libfoobar").unwrap();
        assert!(!Product::from(lib).satisfied(&foreign));
    }

    #[test]
    fn test_library_skips_grammar_failures() {
        let tmp = tempdir().unwrap();
        let linux: Platform = "aarch64-linux-gnu".parse().unwrap();
        if linux == Platform::host() {
            return;
        }
        fs::write(tmp.path().join("libfoo.so.1.2.3a"), b"x").unwrap();
        fs::write(tmp.path().join("libfoo.a"), b"x").unwrap();

        let lib = LibraryProduct::new(tmp.path(), "libfoo").unwrap();
        assert_eq!(lib.locate(&linux), None);

        fs::write(tmp.path().join("libfoo.so.1.2.3"), b"x").unwrap();
        assert_eq!(lib.locate(&linux), Some(tmp.path().join("libfoo.so.1.2.3")));
    }
}
