//! Env command

use anyhow::Result;
use binprov_core::Prefix;
use binprov_core::activate::SearchPaths;

/// Print `export` lines for `eval "$(binprov env)"`.
pub fn env(prefix: &Prefix) -> Result<()> {
    let paths = SearchPaths::for_prefix(prefix)?;
    for (key, value) in paths.vars() {
        let value = value.to_string_lossy().replace('\'', r"'\''");
        println!("export {key}='{value}'");
    }
    Ok(())
}
