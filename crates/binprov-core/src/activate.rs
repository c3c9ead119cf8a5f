//! Search-path activation for an install root.
//!
//! [`SearchPaths`] computes `PATH` and the loader's library variable with
//! the install root prepended. Applying them to a child [`Command`] leaves
//! the current process alone; [`Activation`] is the explicit, reversible
//! alternative that edits this process's environment.

use std::env;
use std::ffi::OsString;
use std::io;
use std::path::PathBuf;
use std::process::Command;

use tracing::debug;

use crate::error::{Error, Result};
use crate::prefix::Prefix;

/// Variable the host's dynamic loader searches for libraries.
pub const LIBRARY_PATH_VAR: &str = if cfg!(windows) {
    "PATH"
} else if cfg!(target_os = "macos") {
    "DYLD_LIBRARY_PATH"
} else {
    "LD_LIBRARY_PATH"
};

/// Environment values that put an install root first in line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPaths {
    vars: Vec<(&'static str, OsString)>,
}

impl SearchPaths {
    /// Prepend `prefix`'s binary and library directories to the current
    /// values. Directories already listed are moved to the front rather than
    /// repeated.
    ///
    /// # Errors
    ///
    /// Fails if a directory contains the platform's path-list separator.
    pub fn for_prefix(prefix: &Prefix) -> Result<Self> {
        let bindir = prefix.bindir();
        let libdir = prefix.libdir();

        let mut vars = Vec::new();
        if LIBRARY_PATH_VAR == "PATH" {
            let mut dirs = vec![bindir];
            if libdir != dirs[0] {
                dirs.push(libdir);
            }
            vars.push(("PATH", prepend("PATH", &dirs)?));
        } else {
            vars.push(("PATH", prepend("PATH", &[bindir])?));
            vars.push((LIBRARY_PATH_VAR, prepend(LIBRARY_PATH_VAR, &[libdir])?));
        }
        Ok(Self { vars })
    }

    /// `(name, value)` pairs in a stable order.
    pub fn vars(&self) -> &[(&'static str, OsString)] {
        &self.vars
    }

    /// Set the variables on a child process.
    pub fn apply<'c>(&self, cmd: &'c mut Command) -> &'c mut Command {
        for (key, value) in &self.vars {
            cmd.env(key, value);
        }
        cmd
    }
}

fn prepend(var: &str, dirs: &[PathBuf]) -> Result<OsString> {
    let current = env::var_os(var).unwrap_or_default();
    let rest = env::split_paths(&current).filter(|p| !p.as_os_str().is_empty() && !dirs.contains(p));
    env::join_paths(dirs.iter().cloned().chain(rest))
        .map_err(|e| Error::Io(io::Error::new(io::ErrorKind::InvalidInput, e)))
}

/// Process environment edited for an install root, restored on
/// [`Activation::deactivate`] or drop.
#[derive(Debug)]
#[must_use = "dropping the activation immediately restores the environment"]
pub struct Activation {
    previous: Vec<(&'static str, Option<OsString>)>,
}

impl Activation {
    /// Prepend `prefix` to this process's search paths, remembering the old
    /// values.
    ///
    /// # Errors
    ///
    /// See [`SearchPaths::for_prefix`].
    ///
    /// # Safety
    ///
    /// Edits the process environment. No other thread may read or write
    /// the environment until the returned value has been deactivated or
    /// dropped.
    #[allow(unsafe_code)]
    pub unsafe fn activate(prefix: &Prefix) -> Result<Self> {
        let paths = SearchPaths::for_prefix(prefix)?;
        let mut previous = Vec::with_capacity(paths.vars.len());
        for (key, value) in paths.vars {
            previous.push((key, env::var_os(key)));
            // SAFETY: upheld by the caller per this function's contract.
            unsafe { env::set_var(key, value) };
        }
        debug!("Activated {}", prefix.path().display());
        Ok(Self { previous })
    }

    /// Put the previous values back (unsetting variables that were unset).
    pub fn deactivate(mut self) {
        self.restore();
    }

    #[allow(unsafe_code)]
    fn restore(&mut self) {
        for (key, value) in self.previous.drain(..).rev() {
            // SAFETY: the caller of `activate` guarantees exclusive access to
            // the environment for the lifetime of this value.
            unsafe {
                match value {
                    Some(v) => env::set_var(key, v),
                    None => env::remove_var(key),
                }
            }
        }
    }
}

impl Drop for Activation {
    fn drop(&mut self) {
        self.restore();
    }
}
