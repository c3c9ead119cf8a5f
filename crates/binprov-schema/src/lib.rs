//! Shared types and wire formats for binprov.
//!
//! Everything here is pure data: platform tags as they appear in archive
//! names and deps files, and the SHA-256 digests that identify archives.

pub mod hash;
pub mod platform;

// Re-exports
pub use hash::*;
pub use platform::*;

/// Extensions recognised as archive payloads, longest first so that
/// `.tar.gz` wins over `.gz`.
pub const ARCHIVE_EXTENSIONS: [&str; 4] = [".tar.gz", ".tar.zst", ".tgz", ".tar"];

/// Strip a known archive extension from a file name.
///
/// Returns the name unchanged when no known extension is present.
///
/// # Example
///
/// ```
/// use binprov_schema::strip_archive_extension;
///
/// assert_eq!(strip_archive_extension("libfoo.x86_64-linux-gnu.tar.gz"), "libfoo.x86_64-linux-gnu");
/// assert_eq!(strip_archive_extension("notes.txt"), "notes.txt");
/// ```
pub fn strip_archive_extension(name: &str) -> &str {
    ARCHIVE_EXTENSIONS
        .iter()
        .find_map(|ext| name.strip_suffix(ext))
        .unwrap_or(name)
}
