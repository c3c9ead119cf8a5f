//! Dynamic-library filename grammar.
//!
//! | Family | Accepted forms |
//! |---|---|
//! | ELF    | `stem.so`, `stem.so.N`, `stem.so.N.M`, `stem.so.N.M.K` |
//! | Mach-O | `stem.dylib`, `stem.N.dylib`, `stem.N.M.dylib`, `stem.N.M.K.dylib` |
//! | PE     | `stem.dll`, `stem-N.dll` |
//!
//! Every version component is one or more decimal digits, and a Mach-O stem
//! segment never starts with a digit, so `libfoo.1a.dylib` is rejected. A
//! filename that does not fit the grammar is simply not a library candidate.

use std::sync::LazyLock;

use binprov_schema::DylibFamily;
use regex::Regex;

static ELF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<stem>.+?)\.so(?P<version>(?:\.[0-9]+){0,3})$").expect("valid ELF regex")
});

static MACHO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<stem>[^.]+(?:\.[^.0-9][^.]*)*)(?P<version>(?:\.[0-9]+){0,3})\.dylib$")
        .expect("valid Mach-O regex")
});

static PE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?P<stem>.*?[^-])(?:-(?P<version>[0-9]+))?\.dll$").expect("valid PE regex")
});

/// A filename that passed the dynamic-library grammar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DylibName<'a> {
    stem: &'a str,
    version: Vec<&'a str>,
}

impl<'a> DylibName<'a> {
    /// Filename with extension and version stripped (`libfoo` for `libfoo.so.1`).
    pub fn stem(&self) -> &'a str {
        self.stem
    }

    /// Version components, most significant first. Empty when unversioned.
    pub fn version(&self) -> &[&'a str] {
        &self.version
    }

    /// Whether this library is `base`: the stem equals `base`, or continues
    /// it with a `-` or `.` (`libfoo-1.2.so` is `libfoo`, `libfoobar.so` is not).
    pub fn matches_base(&self, base: &str) -> bool {
        match self.stem.strip_prefix(base) {
            Some("") => true,
            Some(rest) => rest.starts_with(['-', '.']),
            None => false,
        }
    }
}

/// Apply the grammar for `family` to a bare filename.
pub fn parse(filename: &str, family: DylibFamily) -> Option<DylibName<'_>> {
    let re: &Regex = match family {
        DylibFamily::Elf => &ELF,
        DylibFamily::MachO => &MACHO,
        DylibFamily::Pe => &PE,
    };
    let caps = re.captures(filename)?;
    let stem = caps.name("stem")?.as_str();
    let version = caps
        .name("version")
        .map(|m| {
            m.as_str()
                .split(['.', '-'])
                .filter(|part| !part.is_empty())
                .collect()
        })
        .unwrap_or_default();
    Some(DylibName { stem, version })
}

/// Whether `filename` is a plausibly-versioned shared library for `family`.
pub fn is_valid(filename: &str, family: DylibFamily) -> bool {
    parse(filename, family).is_some()
}
