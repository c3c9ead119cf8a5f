//! Platform identity.
//!
//! A [`Platform`] names the OS family, CPU architecture and (where it
//! matters) the libc and calling-convention ABI a binary was built for.
//! Platforms render as GNU-style triplets, which is also how they are
//! embedded in archive names:
//!
//! ```text
//! x86_64-linux-gnu          armv7l-linux-gnueabihf     aarch64-linux-musl
//! x86_64-apple-darwin14     x86_64-w64-mingw32         x86_64-unknown-freebsd11.1
//! ```
//!
//! # Example
//!
//! ```
//! use binprov_schema::{Arch, Os, Platform};
//!
//! let p: Platform = "arm-linux-gnueabihf".parse().unwrap();
//! assert_eq!(p.os(), Os::Linux);
//! assert_eq!(p.arch(), Arch::Armv7l);
//! assert_eq!(p.to_string(), "armv7l-linux-gnueabihf");
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced while parsing or resolving a [`Platform`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    /// The string is not a recognised platform triplet.
    #[error("Unrecognised platform triplet: '{0}'")]
    Unparseable(String),

    /// The running host could not be mapped to a known platform.
    #[error("Unable to determine host platform (os={os}, arch={arch})")]
    UnknownHost {
        /// `std::env::consts::OS` of the running binary.
        os: &'static str,
        /// `std::env::consts::ARCH` of the running binary.
        arch: &'static str,
    },
}

/// Operating-system family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Os {
    /// Linux (glibc or musl).
    Linux,
    /// macOS / Darwin.
    MacOS,
    /// Windows (MinGW-style triplets).
    Windows,
    /// FreeBSD.
    FreeBSD,
    /// Undetectable or unsupported OS.
    Unknown,
}

/// CPU architecture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Arch {
    /// 64-bit x86.
    X86_64,
    /// 32-bit x86.
    I686,
    /// 64-bit ARM.
    Aarch64,
    /// 32-bit ARMv7.
    Armv7l,
    /// Little-endian 64-bit POWER.
    Powerpc64le,
    /// Undetectable or unsupported architecture.
    Unknown,
}

impl Arch {
    /// Canonical triplet spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::X86_64 => "x86_64",
            Self::I686 => "i686",
            Self::Aarch64 => "aarch64",
            Self::Armv7l => "armv7l",
            Self::Powerpc64le => "powerpc64le",
            Self::Unknown => "unknown",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "x86_64" | "amd64" | "x64" => Some(Self::X86_64),
            "i686" | "i586" | "i386" | "x86" => Some(Self::I686),
            "aarch64" | "arm64" => Some(Self::Aarch64),
            "armv7l" | "armv7" | "arm" | "armv7a" => Some(Self::Armv7l),
            "powerpc64le" | "ppc64le" => Some(Self::Powerpc64le),
            _ => None,
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// C library flavour, only meaningful on Linux.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Libc {
    /// GNU libc.
    Glibc,
    /// musl libc.
    Musl,
}

/// Calling-convention ABI, only meaningful on 32-bit ARM Linux.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CallAbi {
    /// Soft-float EABI.
    Eabi,
    /// Hard-float EABI.
    EabiHf,
}

/// Dynamic-library naming family of a platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DylibFamily {
    /// `libfoo.so`, `libfoo.so.1.2.3`
    Elf,
    /// `libfoo.dylib`, `libfoo.1.2.3.dylib`
    MachO,
    /// `foo.dll`, `libfoo-2.dll`
    Pe,
}

/// A canonical platform tag.
///
/// Constructed through [`Platform::new`] (which fills in the default libc
/// and ARM ABI) or by parsing a triplet, so that two tags describing the
/// same target always compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Platform {
    os: Os,
    arch: Arch,
    libc: Option<Libc>,
    call_abi: Option<CallAbi>,
}

impl Platform {
    /// Build a platform tag, defaulting Linux to glibc and 32-bit ARM Linux to
    /// hard-float.
    pub fn new(os: Os, arch: Arch) -> Self {
        if os == Os::Unknown || arch == Arch::Unknown {
            return Self::unknown();
        }
        let libc = (os == Os::Linux).then_some(Libc::Glibc);
        let call_abi = (os == Os::Linux && arch == Arch::Armv7l).then_some(CallAbi::EabiHf);
        Self {
            os,
            arch,
            libc,
            call_abi,
        }
    }

    /// The sentinel tag for an undetectable platform.
    pub const fn unknown() -> Self {
        Self {
            os: Os::Unknown,
            arch: Arch::Unknown,
            libc: None,
            call_abi: None,
        }
    }

    /// Override the libc. Ignored for non-Linux platforms.
    pub fn with_libc(mut self, libc: Libc) -> Self {
        if self.os == Os::Linux {
            self.libc = Some(libc);
        }
        self
    }

    /// Override the ARM calling convention. Ignored unless 32-bit ARM Linux.
    pub fn with_call_abi(mut self, abi: CallAbi) -> Self {
        if self.os == Os::Linux && self.arch == Arch::Armv7l {
            self.call_abi = Some(abi);
        }
        self
    }

    /// Resolve the platform of the running binary.
    ///
    /// Never fails: an unsupported target yields [`Platform::unknown`]. Use
    /// [`Platform::host_checked`] where an unknown host must be surfaced.
    pub fn host() -> Self {
        let os = if cfg!(target_os = "linux") {
            Os::Linux
        } else if cfg!(target_os = "macos") {
            Os::MacOS
        } else if cfg!(target_os = "windows") {
            Os::Windows
        } else if cfg!(target_os = "freebsd") {
            Os::FreeBSD
        } else {
            Os::Unknown
        };

        let arch = if cfg!(target_arch = "x86_64") {
            Arch::X86_64
        } else if cfg!(target_arch = "x86") {
            Arch::I686
        } else if cfg!(target_arch = "aarch64") {
            Arch::Aarch64
        } else if cfg!(target_arch = "arm") {
            Arch::Armv7l
        } else if cfg!(all(target_arch = "powerpc64", target_endian = "little")) {
            Arch::Powerpc64le
        } else {
            Arch::Unknown
        };

        let libc = if cfg!(target_env = "musl") {
            Libc::Musl
        } else {
            Libc::Glibc
        };
        let call_abi = if cfg!(target_abi = "eabi") {
            CallAbi::Eabi
        } else {
            CallAbi::EabiHf
        };

        Self::new(os, arch).with_libc(libc).with_call_abi(call_abi)
    }

    /// Like [`Platform::host`], but reports an undetectable host as an error.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::UnknownHost`] when the OS or architecture of
    /// the running binary is not one binprov knows how to name.
    pub fn host_checked() -> Result<Self, PlatformError> {
        let host = Self::host();
        if host.is_known() {
            Ok(host)
        } else {
            Err(PlatformError::UnknownHost {
                os: std::env::consts::OS,
                arch: std::env::consts::ARCH,
            })
        }
    }

    /// Whether this tag names a real platform.
    pub fn is_known(&self) -> bool {
        self.os != Os::Unknown
    }

    /// Operating-system family.
    pub fn os(&self) -> Os {
        self.os
    }

    /// CPU architecture.
    pub fn arch(&self) -> Arch {
        self.arch
    }

    /// C library (Linux only).
    pub fn libc(&self) -> Option<Libc> {
        self.libc
    }

    /// ARM calling convention (32-bit ARM Linux only).
    pub fn call_abi(&self) -> Option<CallAbi> {
        self.call_abi
    }

    /// Whether this is a Windows platform.
    pub fn is_windows(&self) -> bool {
        self.os == Os::Windows
    }

    /// Whether the platform keeps shared libraries in a directory separate
    /// from executables. Windows resolves DLLs next to the executable.
    pub fn separates_libdir(&self) -> bool {
        self.os != Os::Windows
    }

    /// Dynamic-library filename convention used by this platform.
    pub fn dylib_family(&self) -> DylibFamily {
        match self.os {
            Os::MacOS => DylibFamily::MachO,
            Os::Windows => DylibFamily::Pe,
            Os::Linux | Os::FreeBSD | Os::Unknown => DylibFamily::Elf,
        }
    }

    /// Find a platform tag embedded in an archive file name following the
    /// `<name>.<triplet>.<ext>` convention.
    ///
    /// Returns `None` when the name carries no recognisable tag.
    ///
    /// # Example
    ///
    /// ```
    /// use binprov_schema::Platform;
    ///
    /// let p = Platform::from_filename("libfoo.1.2.x86_64-linux-gnu.tar.gz").unwrap();
    /// assert_eq!(p.to_string(), "x86_64-linux-gnu");
    /// assert!(Platform::from_filename("libfoo.tar.gz").is_none());
    /// ```
    pub fn from_filename(name: &str) -> Option<Self> {
        let stem = crate::strip_archive_extension(name);
        stem.match_indices('.')
            .map(|(idx, _)| &stem[idx + 1..])
            .find_map(|candidate| candidate.parse::<Platform>().ok())
            .filter(Platform::is_known)
    }
}

impl Default for Platform {
    fn default() -> Self {
        Self::host()
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.os {
            Os::Linux => {
                let libc = match self.libc.unwrap_or(Libc::Glibc) {
                    Libc::Glibc => "gnu",
                    Libc::Musl => "musl",
                };
                let abi = match self.call_abi {
                    Some(CallAbi::Eabi) => "eabi",
                    Some(CallAbi::EabiHf) => "eabihf",
                    None => "",
                };
                write!(f, "{}-linux-{libc}{abi}", self.arch)
            }
            Os::MacOS => write!(f, "{}-apple-darwin14", self.arch),
            Os::Windows => write!(f, "{}-w64-mingw32", self.arch),
            Os::FreeBSD => write!(f, "{}-unknown-freebsd11.1", self.arch),
            Os::Unknown => f.write_str("unknown"),
        }
    }
}

/// True for an OS version suffix such as `14`, `11.1` or the empty string.
fn is_os_version(s: &str) -> bool {
    s.split('.').all(|part| part.chars().all(|c| c.is_ascii_digit()))
}

fn parse_linux_env(arch: Arch, env: Option<&str>) -> Option<Platform> {
    let base = Platform::new(Os::Linux, arch);
    let Some(env) = env else {
        return Some(base);
    };
    let (libc, abi) = if let Some(rest) = env.strip_prefix("gnu") {
        (Libc::Glibc, rest)
    } else if let Some(rest) = env.strip_prefix("musl") {
        (Libc::Musl, rest)
    } else {
        return None;
    };
    let platform = base.with_libc(libc);
    match abi {
        "" => Some(platform),
        "eabi" | "eabihf" if arch != Arch::Armv7l => None,
        "eabi" => Some(platform.with_call_abi(CallAbi::Eabi)),
        "eabihf" => Some(platform.with_call_abi(CallAbi::EabiHf)),
        _ => None,
    }
}

impl FromStr for Platform {
    type Err = PlatformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || PlatformError::Unparseable(s.to_string());
        if s.eq_ignore_ascii_case("unknown") {
            return Ok(Self::unknown());
        }

        let mut tokens: Vec<&str> = s.split('-').collect();
        if tokens.len() < 2 {
            return Err(err());
        }
        let arch = Arch::parse(tokens.remove(0)).ok_or_else(err)?;

        // Optional vendor field (x86_64-unknown-linux-gnu, x86_64-pc-windows-gnu)
        if tokens.len() > 1 && matches!(tokens[0], "unknown" | "pc" | "apple" | "w64") {
            tokens.remove(0);
        }

        let os = tokens[0];
        let rest = &tokens[1..];
        let platform = if os == "linux" {
            match rest {
                [] => parse_linux_env(arch, None),
                [env] => parse_linux_env(arch, Some(*env)),
                _ => None,
            }
        } else if let Some(version) = os.strip_prefix("darwin") {
            (rest.is_empty() && is_os_version(version)).then(|| Self::new(Os::MacOS, arch))
        } else if os == "macos" {
            rest.is_empty().then(|| Self::new(Os::MacOS, arch))
        } else if let Some(version) = os.strip_prefix("freebsd") {
            (rest.is_empty() && is_os_version(version)).then(|| Self::new(Os::FreeBSD, arch))
        } else if os == "mingw32" || os == "windows" {
            match rest {
                [] | ["gnu" | "msvc"] => Some(Self::new(Os::Windows, arch)),
                _ => None,
            }
        } else {
            None
        };

        platform.ok_or_else(err)
    }
}

impl TryFrom<String> for Platform {
    type Error = PlatformError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Platform> for String {
    fn from(value: Platform) -> Self {
        value.to_string()
    }
}
