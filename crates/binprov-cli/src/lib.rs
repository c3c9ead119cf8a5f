//! binprov - install and track precompiled binary archives
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
//!
//! Packs an install root into an archive, installs verified archives into a
//! root while recording what they wrote, and answers whether libraries,
//! executables and files are present.
//!
//! # Directory Layout
//!
//! ```text
//! <prefix>/
//! ├── bin/        # executables (and DLLs on Windows)
//! ├── lib/        # shared libraries
//! ├── include/    # headers
//! └── manifests/  # one <archive>.list per install
//! ```

pub mod cmd;
pub mod ui;

use std::path::PathBuf;

use anyhow::{Result, bail};
use binprov_core::Prefix;
use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "binprov")]
#[command(author, version, about = "binprov - install and track precompiled binary archives")]
pub struct Cli {
    /// Install root to operate on
    #[arg(long, global = true, env = "BINPROV_PREFIX")]
    pub prefix: Option<PathBuf>,

    /// Show what would happen without making changes
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// The install root from `--prefix`, or the default location.
    pub fn resolve_prefix(&self) -> Result<Prefix> {
        if let Some(path) = &self.prefix {
            return Ok(Prefix::new(path));
        }
        match binprov_core::paths::default_prefix() {
            Some(path) => Ok(Prefix::new(path)),
            None => bail!("Could not determine an install root; pass --prefix"),
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Pack an install root into <out-base>.tar.gz
    Package {
        /// Directory to pack
        root: PathBuf,
        /// Output path without extension
        out_base: PathBuf,
    },
    /// Verify and install an archive
    Install {
        /// Local path or http(s) URL of the archive
        source: String,
        /// Expected SHA-256 of the archive bytes
        sha256: String,
        /// Replace files that already exist
        #[arg(long)]
        overwrite: bool,
        /// Install even if the archive is tagged for another platform
        #[arg(long)]
        ignore_platform: bool,
    },
    /// Remove an install, given its manifest or any file it installed
    Uninstall {
        /// Manifest (.list) or installed file
        target: PathBuf,
    },
    /// Show which manifest installed a file
    Owner {
        /// Installed file
        file: PathBuf,
    },
    /// List installs in the prefix
    List,
    /// Resolve a product to a path
    Locate {
        /// Platform triplet to resolve for (defaults to the host)
        #[arg(long)]
        platform: Option<String>,
        #[command(subcommand)]
        product: LocateCommands,
    },
    /// Print the host platform triplet
    Platform,
    /// Compute SHA-256 of files
    Hash {
        /// Files to hash
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Print shell exports that put the prefix on the search paths
    Env,
}

#[derive(Debug, Subcommand)]
pub enum LocateCommands {
    /// A shared library by base name (e.g. libfoo)
    Library {
        /// Base name without extension or version
        name: String,
        /// Directory to search (defaults to the prefix's library directory)
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// An executable in the prefix's bin directory, or at a path
    Executable {
        /// Name or path
        name: PathBuf,
    },
    /// Any file, relative to the prefix or absolute
    File {
        /// Path
        path: PathBuf,
    },
}
