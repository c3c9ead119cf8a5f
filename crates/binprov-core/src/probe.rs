//! Scoped dynamic-library load probe.
//!
//! A candidate library is opened through the host's dynamic loader and
//! released again before [`can_load`] returns. The handle lives in a
//! [`LoadedLibrary`] whose `Drop` unloads it, so no exit path can leave the
//! module resident.

use std::path::Path;

use tracing::debug;

/// Whether the host's dynamic loader accepts `path`.
///
/// A library built for another architecture, a truncated file, or a file
/// with unresolvable dependencies all fail the probe.
pub fn can_load(path: &Path) -> bool {
    match LoadedLibrary::open(path) {
        Ok(lib) => {
            debug!("Load probe succeeded for {}", path.display());
            drop(lib);
            true
        }
        Err(e) => {
            debug!("Load probe failed for {}: {}", path.display(), e);
            false
        }
    }
}

/// A library handle that is unloaded when dropped.
#[derive(Debug)]
pub struct LoadedLibrary {
    handle: sys::Handle,
}

impl LoadedLibrary {
    /// Load `path` into the current process.
    ///
    /// # Errors
    ///
    /// Returns the loader's diagnostic when the library cannot be loaded.
    pub fn open(path: &Path) -> Result<Self, String> {
        sys::open(path).map(|handle| Self { handle })
    }
}

impl Drop for LoadedLibrary {
    fn drop(&mut self) {
        sys::close(self.handle);
    }
}

#[cfg(unix)]
#[allow(unsafe_code)]
mod sys {
    use std::ffi::{CStr, CString};
    use std::os::unix::ffi::OsStrExt;
    use std::path::Path;

    pub(super) type Handle = *mut libc::c_void;

    pub(super) fn open(path: &Path) -> Result<Handle, String> {
        let c_path = CString::new(path.as_os_str().as_bytes())
            .map_err(|_| "path contains an interior NUL byte".to_string())?;

        // SAFETY: c_path is a valid NUL-terminated string that outlives the
        // call. RTLD_LOCAL keeps the library's symbols out of the global
        // namespace for the short time it is resident.
        let handle = unsafe { libc::dlopen(c_path.as_ptr(), libc::RTLD_LAZY | libc::RTLD_LOCAL) };
        if handle.is_null() {
            return Err(last_error());
        }
        Ok(handle)
    }

    pub(super) fn close(handle: Handle) {
        // SAFETY: handle came from a successful dlopen and is closed exactly
        // once, by the Drop of the LoadedLibrary that owns it.
        unsafe {
            libc::dlclose(handle);
        }
    }

    fn last_error() -> String {
        // SAFETY: dlerror returns either NULL or a pointer to a NUL-terminated
        // string owned by the loader; it is copied out before any other dl*
        // call can overwrite it.
        unsafe {
            let msg = libc::dlerror();
            if msg.is_null() {
                "unknown dlopen failure".to_string()
            } else {
                CStr::from_ptr(msg).to_string_lossy().into_owned()
            }
        }
    }
}

#[cfg(windows)]
#[allow(unsafe_code)]
mod sys {
    use std::ffi::c_void;
    use std::os::windows::ffi::OsStrExt;
    use std::path::Path;

    pub(super) type Handle = *mut c_void;

    #[link(name = "kernel32")]
    unsafe extern "system" {
        fn LoadLibraryW(name: *const u16) -> *mut c_void;
        fn FreeLibrary(module: *mut c_void) -> i32;
    }

    pub(super) fn open(path: &Path) -> Result<Handle, String> {
        let wide: Vec<u16> = path.as_os_str().encode_wide().chain(Some(0)).collect();

        // SAFETY: wide is a NUL-terminated UTF-16 string that outlives the call.
        let handle = unsafe { LoadLibraryW(wide.as_ptr()) };
        if handle.is_null() {
            return Err(std::io::Error::last_os_error().to_string());
        }
        Ok(handle)
    }

    pub(super) fn close(handle: Handle) {
        // SAFETY: handle came from a successful LoadLibraryW and is freed
        // exactly once, by the Drop of the LoadedLibrary that owns it.
        unsafe {
            FreeLibrary(handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_missing_file_fails() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(!can_load(&tmp.path().join("libmissing.so")));
    }

    #[test]
    fn test_garbage_file_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("libgarbage.so.1");
        fs::write(&path, b"definitely not an object file").unwrap();
        assert!(!can_load(&path));
        // repeated probes stay clean
        assert!(!can_load(&path));
    }

    #[cfg(all(target_os = "linux", target_env = "gnu"))]
    #[test]
    fn test_system_libc_loads() {
        let candidates = [
            "/lib/x86_64-linux-gnu/libc.so.6",
            "/lib/aarch64-linux-gnu/libc.so.6",
            "/lib64/libc.so.6",
            "/usr/lib/libc.so.6",
            "/lib/libc.so.6",
        ];
        if let Some(path) = candidates.iter().map(Path::new).find(|p| p.is_file()) {
            assert!(can_load(path));
        }
    }
}
