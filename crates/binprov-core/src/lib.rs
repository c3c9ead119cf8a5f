//! Core library for binprov.
//!
//! Locates installed artifacts ([`products`]), packs and installs archives
//! into an install root ([`archive`], [`install`]), and keeps the
//! per-install file lists that make removal exact ([`manifest`]).

pub mod activate;
pub mod archive;
pub mod deps;
pub mod dlname;
pub mod error;
pub mod fetch;
pub mod install;
pub mod manifest;
pub mod paths;
pub mod prefix;
pub mod probe;
pub mod products;

pub use binprov_schema::{Platform, Sha256Digest};
pub use error::{Error, Result};
pub use install::{
    ArchiveSource, InstallOptions, InstallPlan, Installer, manifest_for_file, uninstall,
    verify_file,
};
pub use manifest::Manifest;
pub use prefix::Prefix;
pub use products::{ExecutableProduct, FileProduct, LibraryProduct, Product, ProductError};

/// User agent sent with every HTTP request.
pub const USER_AGENT: &str = concat!("binprov/", env!("CARGO_PKG_VERSION"));
