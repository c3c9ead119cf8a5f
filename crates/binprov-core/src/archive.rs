//! Archive packaging and extraction.
//!
//! Handles tar.gz, tar.zst and plain tar. Members always carry paths
//! relative to an install root.

use std::fs::{self, File};
use std::io::{self, BufWriter, ErrorKind, Read};
use std::path::{Component, Path, PathBuf};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use tar::EntryType;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::prefix::MANIFEST_DIR;

/// Compression wrapped around a tar stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    /// gzip (`.tar.gz`, `.tgz`)
    TarGz,
    /// zstd (`.tar.zst`)
    TarZst,
    /// uncompressed (`.tar`)
    Tar,
}

impl ArchiveFormat {
    /// Infer the format from a file name or URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedFormat`] for any other extension.
    pub fn from_name(name: &str) -> Result<Self> {
        let lower = name.to_ascii_lowercase();
        if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") {
            Ok(ArchiveFormat::TarGz)
        } else if lower.ends_with(".tar.zst") {
            Ok(ArchiveFormat::TarZst)
        } else if lower.ends_with(".tar") {
            Ok(ArchiveFormat::Tar)
        } else {
            Err(Error::UnsupportedFormat(name.to_string()))
        }
    }

    /// Canonical extension, including the leading dot.
    pub fn extension(&self) -> &'static str {
        match self {
            ArchiveFormat::TarGz => ".tar.gz",
            ArchiveFormat::TarZst => ".tar.zst",
            ArchiveFormat::Tar => ".tar",
        }
    }
}

/// A member written to disk by [`extract`].
#[derive(Debug, Clone)]
pub struct ExtractedFile {
    /// Path relative to the install root
    pub relative_path: PathBuf,
    /// Absolute path on disk
    pub absolute_path: PathBuf,
    /// Whether the recorded mode has an execute bit
    pub is_executable: bool,
}

/// Pack every file under `root` into `<out_base>.tar.gz`.
///
/// Symlinks are stored as links. The root's manifest directory and the
/// output file itself are never included.
///
/// # Errors
///
/// - [`Error::NotFound`] if `root` is not a directory.
/// - [`Error::DestinationExists`] if the output file is already present.
/// - I/O errors from walking the tree or writing the archive.
pub fn package(root: &Path, out_base: &Path) -> Result<PathBuf> {
    if !root.is_dir() {
        return Err(Error::NotFound(root.to_path_buf()));
    }

    let mut dest = out_base.as_os_str().to_owned();
    dest.push(ArchiveFormat::TarGz.extension());
    let dest = PathBuf::from(dest);

    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let file = File::create_new(&dest).map_err(|e| match e.kind() {
        ErrorKind::AlreadyExists => Error::DestinationExists(dest.clone()),
        _ => Error::Io(e),
    })?;

    match write_tar_gz(root, &dest, file) {
        Ok(count) => {
            info!("Packaged {} files into {}", count, dest.display());
            Ok(dest)
        }
        Err(e) => {
            let _ = fs::remove_file(&dest);
            Err(e)
        }
    }
}

fn write_tar_gz(root: &Path, dest: &Path, file: File) -> Result<usize> {
    let encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    // Archive symlinks as links, not the files they point to
    builder.follow_symlinks(false);

    let dest_abs = std::path::absolute(dest)?;
    let manifest_dir = root.join(MANIFEST_DIR);
    let mut count = 0;

    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.path() != manifest_dir);

    for entry in walker {
        let entry = entry.map_err(|e| Error::Io(io::Error::other(e)))?;
        if entry.file_type().is_dir() {
            continue;
        }
        let path = entry.path();
        if std::path::absolute(path)? == dest_abs {
            continue;
        }
        let rel = path
            .strip_prefix(root)
            .map_err(|_| Error::UnsafePath(path.display().to_string()))?;

        debug!("Adding {}", rel.display());
        builder.append_path_with_name(path, rel)?;
        count += 1;
    }

    let encoder = builder.into_inner()?;
    encoder.finish()?.into_inner().map_err(|e| e.into_error())?;
    Ok(count)
}

fn decoder<'a>(bytes: &'a [u8], format: ArchiveFormat) -> Result<Box<dyn Read + 'a>> {
    Ok(match format {
        ArchiveFormat::TarGz => Box::new(GzDecoder::new(bytes)),
        ArchiveFormat::TarZst => Box::new(zstd::stream::read::Decoder::new(bytes)?),
        ArchiveFormat::Tar => Box::new(bytes),
    })
}

/// Normalize a member path. `None` for the archive root itself.
fn member_path(raw: &Path) -> Result<Option<PathBuf>> {
    let mut rel = PathBuf::new();
    for component in raw.components() {
        match component {
            Component::Normal(part) => rel.push(part),
            Component::CurDir => {}
            _ => return Err(Error::UnsafePath(raw.display().to_string())),
        }
    }
    if rel.as_os_str().is_empty() {
        return Ok(None);
    }
    Ok(Some(rel))
}

fn is_payload(kind: EntryType) -> bool {
    kind.is_file() || kind.is_symlink() || kind.is_hard_link()
}

/// Relative paths of the files and links in an archive, in archive order.
/// Directory entries are omitted.
///
/// # Errors
///
/// Returns [`Error::UnsafePath`] if any member is absolute or climbs out
/// of the root, or an I/O error if the archive is corrupt.
pub fn list_files(bytes: &[u8], format: ArchiveFormat) -> Result<Vec<PathBuf>> {
    let mut archive = tar::Archive::new(decoder(bytes, format)?);
    let mut files = Vec::new();

    for entry in archive.entries()? {
        let entry = entry?;
        let Some(rel) = member_path(&entry.path()?)? else {
            continue;
        };
        if is_payload(entry.header().entry_type()) {
            files.push(rel);
        }
    }
    Ok(files)
}

/// Unpack an archive into `dest`, creating parent directories as needed and
/// keeping recorded permissions.
///
/// Existing files at member paths are replaced. Callers that must not
/// clobber anything check [`list_files`] against the destination first.
///
/// # Errors
///
/// Returns [`Error::UnsafePath`] for members that would land outside
/// `dest`, or an I/O error. Files unpacked before the failure stay on disk.
pub fn extract(bytes: &[u8], format: ArchiveFormat, dest: &Path) -> Result<Vec<ExtractedFile>> {
    fs::create_dir_all(dest)?;

    let mut archive = tar::Archive::new(decoder(bytes, format)?);
    archive.set_preserve_permissions(true);
    archive.set_overwrite(true);

    let mut extracted = Vec::new();
    for entry in archive.entries()? {
        let mut entry = entry?;
        let Some(relative_path) = member_path(&entry.path()?)? else {
            continue;
        };
        let kind = entry.header().entry_type();
        let absolute_path = dest.join(&relative_path);

        if is_payload(kind) && absolute_path.symlink_metadata().is_ok_and(|m| !m.is_dir()) {
            fs::remove_file(&absolute_path)?;
        }

        if !entry.unpack_in(dest)? {
            return Err(Error::UnsafePath(relative_path.display().to_string()));
        }
        if !is_payload(kind) {
            continue;
        }

        let is_executable = entry.header().mode().is_ok_and(|m| m & 0o111 != 0);
        extracted.push(ExtractedFile {
            relative_path,
            absolute_path,
            is_executable,
        });
    }

    debug!("Extracted {} files into {}", extracted.len(), dest.display());
    Ok(extracted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn tar_with(paths: &[&str]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for path in paths {
            let data = b"payload";
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_entry_type(EntryType::Regular);
            // set_path refuses `..`, so write the raw name field
            let name = &mut header.as_old_mut().name;
            name[..path.len()].copy_from_slice(path.as_bytes());
            header.set_cksum();
            builder.append(&header, &data[..]).unwrap();
        }
        builder.into_inner().unwrap()
    }

    #[test]
    fn test_format_from_name() {
        assert_eq!(
            ArchiveFormat::from_name("libfoo.x86_64-linux-gnu.tar.gz").unwrap(),
            ArchiveFormat::TarGz
        );
        assert_eq!(ArchiveFormat::from_name("a.TGZ").unwrap(), ArchiveFormat::TarGz);
        assert_eq!(ArchiveFormat::from_name("a.tar.zst").unwrap(), ArchiveFormat::TarZst);
        assert_eq!(ArchiveFormat::from_name("a.tar").unwrap(), ArchiveFormat::Tar);
        assert!(matches!(
            ArchiveFormat::from_name("a.zip"),
            Err(Error::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_package_refuses_existing_destination() {
        let tmp = tempdir().unwrap();
        let root = tmp.path().join("root");
        fs::create_dir_all(root.join("bin")).unwrap();
        fs::write(root.join("bin/tool"), b"#!/bin/sh\n").unwrap();

        let out_base = tmp.path().join("out/tool");
        let archive = package(&root, &out_base).unwrap();
        assert_eq!(archive, tmp.path().join("out/tool.tar.gz"));

        assert!(matches!(
            package(&root, &out_base),
            Err(Error::DestinationExists(p)) if p == archive
        ));
    }

    #[test]
    fn test_package_skips_manifests_and_lists_files() {
        let tmp = tempdir().unwrap();
        let root = tmp.path().join("root");
        fs::create_dir_all(root.join("lib")).unwrap();
        fs::create_dir_all(root.join("manifests")).unwrap();
        fs::create_dir_all(root.join("share/empty")).unwrap();
        fs::write(root.join("lib/libfoo.so.1"), b"elf").unwrap();
        fs::write(root.join("manifests/old.list"), b"lib/libfoo.so.1\n").unwrap();

        let archive = package(&root, &tmp.path().join("foo")).unwrap();
        let bytes = fs::read(archive).unwrap();
        let files = list_files(&bytes, ArchiveFormat::TarGz).unwrap();
        assert_eq!(files, vec![PathBuf::from("lib/libfoo.so.1")]);
    }

    #[test]
    fn test_package_inside_root_excludes_itself() {
        let tmp = tempdir().unwrap();
        fs::write(tmp.path().join("data.txt"), b"data").unwrap();

        let archive = package(tmp.path(), &tmp.path().join("self")).unwrap();
        let bytes = fs::read(archive).unwrap();
        let files = list_files(&bytes, ArchiveFormat::TarGz).unwrap();
        assert_eq!(files, vec![PathBuf::from("data.txt")]);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_survive_round_trip() {
        let tmp = tempdir().unwrap();
        let root = tmp.path().join("root");
        fs::create_dir_all(root.join("lib")).unwrap();
        fs::write(root.join("lib/libfoo.so.1.2"), b"elf").unwrap();
        std::os::unix::fs::symlink("libfoo.so.1.2", root.join("lib/libfoo.so")).unwrap();

        let archive = package(&root, &tmp.path().join("foo")).unwrap();
        let bytes = fs::read(archive).unwrap();

        let dest = tmp.path().join("dest");
        let extracted = extract(&bytes, ArchiveFormat::TarGz, &dest).unwrap();
        assert_eq!(extracted.len(), 2);

        let link = dest.join("lib/libfoo.so");
        assert!(link.symlink_metadata().unwrap().file_type().is_symlink());
        assert_eq!(fs::read_link(&link).unwrap(), PathBuf::from("libfoo.so.1.2"));
        assert_eq!(fs::read(&link).unwrap(), b"elf");
    }

    #[test]
    fn test_list_files_rejects_parent_dir() {
        let bytes = tar_with(&["bin/ok", "../escape"]);
        assert!(matches!(
            list_files(&bytes, ArchiveFormat::Tar),
            Err(Error::UnsafePath(_))
        ));
    }

    #[test]
    fn test_list_files_normalizes_dot_prefix() {
        let bytes = tar_with(&["./bin/tool", "lib/libx.so"]);
        assert_eq!(
            list_files(&bytes, ArchiveFormat::Tar).unwrap(),
            vec![PathBuf::from("bin/tool"), PathBuf::from("lib/libx.so")]
        );
    }

    #[test]
    fn test_extract_replaces_existing_file() {
        let tmp = tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("bin")).unwrap();
        fs::write(tmp.path().join("bin/tool"), b"old").unwrap();

        let bytes = tar_with(&["bin/tool"]);
        let extracted = extract(&bytes, ArchiveFormat::Tar, tmp.path()).unwrap();
        assert_eq!(extracted[0].relative_path, PathBuf::from("bin/tool"));
        assert!(!extracted[0].is_executable);
        assert_eq!(fs::read(tmp.path().join("bin/tool")).unwrap(), b"payload");
    }
}
