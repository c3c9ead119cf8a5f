//! Integration tests for product definitions.

use std::collections::BTreeMap;
use std::fs;

use binprov_core::deps::{DepsFile, write_deps_file};
use binprov_core::fetch::OfflineFetcher;
use binprov_core::{
    Error, ExecutableProduct, FileProduct, InstallOptions, Installer, LibraryProduct, Platform,
    Prefix, Product, Sha256Digest, archive,
};
use tempfile::TempDir;

fn foreign_linux() -> Platform {
    let x86: Platform = "x86_64-linux-gnu".parse().unwrap();
    if x86 == Platform::host() {
        "aarch64-linux-gnu".parse().unwrap()
    } else {
        x86
    }
}

#[test]
fn test_foreign_library_from_installed_archive() {
    let tmp = TempDir::new().unwrap();
    let foreign = foreign_linux();

    let stage = tmp.path().join("stage");
    fs::create_dir_all(stage.join("lib")).unwrap();
    fs::write(stage.join("lib/libfoo.so.1.2.3"), b"\x7fELF but not really").unwrap();
    fs::write(stage.join("lib/libfoobar.so"), b"x").unwrap();

    let out = archive::package(&stage, &tmp.path().join(format!("libfoo.{foreign}"))).unwrap();
    let digest = Sha256Digest::compute(&fs::read(&out).unwrap()).to_string();

    let prefix = Prefix::new(tmp.path().join("prefix"));
    let options = InstallOptions {
        ignore_platform: true,
        ..InstallOptions::default()
    };
    Installer::new(prefix.clone(), OfflineFetcher)
        .install(&out.into(), &digest, options)
        .unwrap();

    let lib = LibraryProduct::in_prefix(&prefix, "libfoo", &foreign).unwrap();
    assert_eq!(
        lib.locate(&foreign),
        Some(prefix.path().join("lib/libfoo.so.1.2.3"))
    );

    // on the host the same bytes must actually load
    let host = Platform::host();
    if host.dylib_family() == foreign.dylib_family() {
        assert!(!Product::from(lib).satisfied_host());
    }
}

#[test]
fn test_deps_file_records_resolved_paths() {
    let tmp = TempDir::new().unwrap();
    let prefix = Prefix::new(tmp.path());
    let foreign = foreign_linux();

    fs::create_dir_all(prefix.bindir()).unwrap();
    fs::create_dir_all(prefix.includedir()).unwrap();
    fs::create_dir_all(prefix.libdir_for(&foreign)).unwrap();
    fs::write(prefix.bindir().join("fooifier"), b"#!/bin/sh\n").unwrap();
    fs::write(prefix.includedir().join("foo.h"), b"").unwrap();
    fs::write(prefix.libdir_for(&foreign).join("libfoo.so"), b"x").unwrap();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(
            prefix.bindir().join("fooifier"),
            fs::Permissions::from_mode(0o755),
        )
        .unwrap();
    }

    let mut products = BTreeMap::new();
    products.insert(
        "libfoo".to_string(),
        Product::from(LibraryProduct::in_prefix(&prefix, "libfoo", &foreign).unwrap()),
    );
    products.insert(
        "fooifier".to_string(),
        Product::from(ExecutableProduct::in_prefix(&prefix, "fooifier")),
    );
    products.insert(
        "header".to_string(),
        Product::from(FileProduct::new(prefix.includedir().join("foo.h"))),
    );

    let deps_path = tmp.path().join("deps.toml");
    write_deps_file(&deps_path, &products, &foreign).unwrap();

    let deps = DepsFile::load(&deps_path).unwrap();
    assert_eq!(deps.platform, foreign);
    assert_eq!(
        deps.path("libfoo"),
        Some(prefix.path().join("lib/libfoo.so").as_path())
    );
    deps.validate().unwrap();

    fs::remove_file(prefix.includedir().join("foo.h")).unwrap();
    assert!(matches!(
        deps.validate(),
        Err(Error::Unsatisfied { name }) if name == "header"
    ));
    assert!(matches!(
        write_deps_file(&deps_path, &products, &foreign),
        Err(Error::Unsatisfied { name }) if name == "header"
    ));
}

#[cfg(all(target_os = "linux", target_env = "gnu"))]
#[test]
fn test_host_library_loads_and_is_released() {
    const LIBZ_CANDIDATES: &[&str] = &[
        "/lib/x86_64-linux-gnu/libz.so.1",
        "/usr/lib/x86_64-linux-gnu/libz.so.1",
        "/lib/aarch64-linux-gnu/libz.so.1",
        "/usr/lib/aarch64-linux-gnu/libz.so.1",
        "/lib64/libz.so.1",
        "/usr/lib64/libz.so.1",
        "/usr/lib/libz.so.1",
    ];
    let Some(system_libz) = LIBZ_CANDIDATES
        .iter()
        .map(std::path::Path::new)
        .find(|p| p.is_file())
    else {
        eprintln!("no system libz found, skipping");
        return;
    };

    let tmp = TempDir::new().unwrap();
    let copy = tmp.path().join("libz.so.1");
    fs::copy(system_libz, &copy).unwrap();

    let lib = LibraryProduct::new(tmp.path(), "libz").unwrap();
    assert_eq!(lib.locate(&Platform::host()), Some(copy));
    assert!(Product::from(lib).satisfied_host());

    let maps = fs::read_to_string("/proc/self/maps").unwrap();
    let dir = tmp.path().to_string_lossy();
    assert!(!maps.contains(dir.as_ref()), "probed library still mapped");
}
