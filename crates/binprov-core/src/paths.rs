use dirs::home_dir;
use std::path::PathBuf;

/// Environment variable naming an explicit install root.
pub const PREFIX_ENV: &str = "BINPROV_PREFIX";

/// Environment variable overriding the binprov home directory.
pub const HOME_ENV: &str = "BINPROV_HOME";

/// Returns the binprov home directory, or None if the user's home cannot be resolved.
pub fn try_binprov_home() -> Option<PathBuf> {
    if let Some(val) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(val));
    }
    home_dir().map(|h| h.join(".binprov"))
}

/// Default install root: `$BINPROV_PREFIX`, else `$BINPROV_HOME`, else `~/.binprov`.
///
/// Returns `None` only when no variable is set and the home directory
/// cannot be determined.
pub fn default_prefix() -> Option<PathBuf> {
    if let Some(val) = std::env::var_os(PREFIX_ENV).filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(val));
    }
    try_binprov_home()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[allow(unsafe_code)]
    fn set(key: &str, value: Option<&str>) {
        // SAFETY: tests touching the environment are #[serial], so no other
        // test thread reads it concurrently.
        unsafe {
            match value {
                Some(v) => std::env::set_var(key, v),
                None => std::env::remove_var(key),
            }
        }
    }

    #[test]
    #[serial]
    fn test_prefix_env_wins() {
        set(PREFIX_ENV, Some("/opt/deps"));
        set(HOME_ENV, Some("/srv/binprov"));
        assert_eq!(default_prefix(), Some(PathBuf::from("/opt/deps")));
        set(PREFIX_ENV, None);
        set(HOME_ENV, None);
    }

    #[test]
    #[serial]
    fn test_home_env_fallback() {
        set(PREFIX_ENV, None);
        set(HOME_ENV, Some("/srv/binprov"));
        assert_eq!(default_prefix(), Some(PathBuf::from("/srv/binprov")));
        set(HOME_ENV, Some(""));
        assert_ne!(default_prefix(), Some(PathBuf::from("")));
        set(HOME_ENV, None);
    }
}
