//! Domain-specific errors for packaging and install operations.
//!
//! Satisfaction queries never produce these for an absent artifact; absence
//! is an ordinary `None`.

use std::path::PathBuf;

use binprov_schema::{Platform, PlatformError};
use thiserror::Error;

/// Errors raised by package, install, uninstall and manifest lookups.
#[derive(Error, Debug)]
pub enum Error {
    /// The archive bytes do not hash to the expected digest.
    #[error("Hash mismatch for {source_name}: expected {expected}, got {actual}")]
    HashMismatch {
        /// Name of the archive that was verified.
        source_name: String,
        /// Digest the caller asked for.
        expected: String,
        /// Digest of the bytes actually obtained.
        actual: String,
    },

    /// The archive name carries a platform tag other than the host's.
    #[error("Platform mismatch for {source_name}: archive targets {found}, host is {host}")]
    PlatformMismatch {
        /// Name of the archive whose tag was checked.
        source_name: String,
        /// Platform tag embedded in the archive name.
        found: Platform,
        /// Resolved host platform.
        host: Platform,
    },

    /// A destination (package output, extraction target, manifest) is
    /// already present and overwriting was not allowed.
    #[error("Destination already exists: {}", .0.display())]
    DestinationExists(PathBuf),

    /// The file exists but no manifest lists it.
    #[error("File is not owned by any manifest: {}", .0.display())]
    OrphanFile(PathBuf),

    /// A path required by the operation does not exist.
    #[error("Not found: {}", .0.display())]
    NotFound(PathBuf),

    /// An archive member would land outside the install root.
    #[error("Unsafe path in archive: {0}")]
    UnsafePath(String),

    /// The archive extension is not one binprov can decode.
    #[error("Unsupported archive format: {0}")]
    UnsupportedFormat(String),

    /// A product that must be present could not be located.
    #[error("Product '{name}' is not satisfied")]
    Unsatisfied {
        /// Name the product was declared under.
        name: String,
    },

    /// Fetching a remote archive failed.
    #[error("Failed to fetch {url}: {message}")]
    Fetch {
        /// Location that was requested.
        url: String,
        /// Transport-level description of the failure.
        message: String,
    },

    /// Platform resolution or parsing failed.
    #[error(transparent)]
    Platform(#[from] PlatformError),

    /// A deps file could not be parsed.
    #[error("Failed to parse deps file: {0}")]
    TomlDe(#[from] toml::de::Error),

    /// A deps file could not be serialized.
    #[error("Failed to serialize deps file: {0}")]
    TomlSer(#[from] toml::ser::Error),

    /// Underlying filesystem error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias used throughout `binprov-core`.
pub type Result<T> = std::result::Result<T, Error>;
