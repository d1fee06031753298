use crate::common::{LoadError, LoadErrorKind};
use log::{debug, trace};
use std::{
    ffi::{c_void, CStr, CString},
    mem,
    os::unix::ffi::OsStrExt,
    path::{Path, PathBuf},
};

/// A shared object opened with `dlopen`, closed on drop.
pub(crate) struct Library {
    handle: *mut c_void,
    path: PathBuf,
}

// Safety: the handle is only passed to dlsym/dlclose, both of which are
// thread-safe, and is never mutated after construction.
unsafe impl Send for Library {}
unsafe impl Sync for Library {}

impl Library {
    pub(crate) fn open(path: &Path) -> Result<Self, LoadError> {
        let c_path = CString::new(path.as_os_str().as_bytes()).map_err(|_| LoadError {
            path: path.to_path_buf(),
            kind: LoadErrorKind::InvalidPath,
        })?;
        // RTLD_LOCAL: encoder and decoder both export `free_memory`.
        let handle = unsafe { libc::dlopen(c_path.as_ptr(), libc::RTLD_NOW | libc::RTLD_LOCAL) };
        if handle.is_null() {
            return Err(LoadError {
                path: path.to_path_buf(),
                kind: LoadErrorKind::Open(last_dl_error()),
            });
        }
        debug!("Opened shared library {}", path.display());
        Ok(Library {
            handle,
            path: path.to_path_buf(),
        })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Resolve `name` and reinterpret it as the function pointer type `T`.
    ///
    /// # Safety
    ///
    /// `T` must be an `extern "C"` function pointer type whose signature matches
    /// the exported symbol.
    pub(crate) unsafe fn symbol<T: Copy>(&self, name: &str) -> Result<T, LoadError> {
        debug_assert_eq!(mem::size_of::<T>(), mem::size_of::<*mut c_void>());
        let c_name = CString::new(name).map_err(|_| LoadError {
            path: self.path.clone(),
            kind: LoadErrorKind::Symbol {
                name: name.to_owned(),
                message: "symbol name contains NUL".to_owned(),
            },
        })?;
        // Clear any stale error before the lookup.
        libc::dlerror();
        let ptr = libc::dlsym(self.handle, c_name.as_ptr());
        if ptr.is_null() {
            return Err(LoadError {
                path: self.path.clone(),
                kind: LoadErrorKind::Symbol {
                    name: name.to_owned(),
                    message: last_dl_error(),
                },
            });
        }
        trace!("Resolved {} in {}", name, self.path.display());
        Ok(mem::transmute_copy::<*mut c_void, T>(&ptr))
    }
}

impl Drop for Library {
    fn drop(&mut self) {
        unsafe {
            libc::dlclose(self.handle);
        }
        self.handle = std::ptr::null_mut();
        trace!("Closed shared library {}", self.path.display());
    }
}

fn last_dl_error() -> String {
    unsafe {
        let ptr = libc::dlerror();
        if ptr.is_null() {
            return "unknown dynamic loader error".to_owned();
        }
        CStr::from_ptr(ptr).to_string_lossy().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_library() {
        let err = match Library::open(Path::new("/nonexistent/libbpg-missing.so")) {
            Ok(_) => panic!("opening a missing library must fail"),
            Err(e) => e,
        };
        assert!(matches!(err.kind, LoadErrorKind::Open(_)));
        assert_eq!(err.path, PathBuf::from("/nonexistent/libbpg-missing.so"));
    }

    #[cfg(all(target_os = "linux", target_env = "gnu"))]
    #[test]
    fn test_resolve_symbol_from_libc() {
        type StrlenFn = unsafe extern "C" fn(*const libc::c_char) -> libc::size_t;

        let lib = Library::open(Path::new("libc.so.6")).unwrap();
        let strlen: StrlenFn = unsafe { lib.symbol("strlen").unwrap() };
        let s = CString::new("bpg").unwrap();
        assert_eq!(unsafe { strlen(s.as_ptr()) }, 3);

        let missing = unsafe { lib.symbol::<StrlenFn>("bpg_encode_bytes") };
        assert!(matches!(
            missing.map(|_| ()).unwrap_err().kind,
            LoadErrorKind::Symbol { .. }
        ));
    }
}
