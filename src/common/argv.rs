use core::{fmt, ops};
use std::ffi::{c_char, CStr, CString, OsStr};
use std::os::unix::ffi::OsStrExt;

use super::OsError;

/// An argument vector that is guaranteed to be non-empty and free of interior NUL bytes.
///
/// The first element names the program to execute and is looked up in `PATH` the way `execvp`
/// does.
#[derive(Clone, PartialEq, Eq)]
pub struct Argv {
    inner: Vec<CString>,
}

impl Argv {
    /// Build an argument vector.
    ///
    /// Fails with `EINVAL` if `args` is empty or if any argument contains a NUL byte.
    pub fn new<I, S>(args: I) -> Result<Self, OsError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let inner = args
            .into_iter()
            .map(|arg| CString::new(arg.as_ref().as_bytes()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| OsError::new("exec", libc::EINVAL))?;

        if inner.is_empty() {
            return Err(OsError::new("exec", libc::EINVAL));
        }

        Ok(Self { inner })
    }

    /// The program name, i.e. the first argument.
    pub fn program(&self) -> &CStr {
        &self.inner[0]
    }

    /// A NULL-terminated array of pointers into `self`, ready to be passed to `execvp`.
    ///
    /// The pointers are only valid while `self` is alive.
    pub(crate) fn as_ptrs(&self) -> Vec<*const c_char> {
        self.inner
            .iter()
            .map(|arg| arg.as_ptr())
            .chain(std::iter::once(std::ptr::null()))
            .collect()
    }
}

impl fmt::Debug for Argv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.inner.iter()).finish()
    }
}

impl fmt::Display for Argv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let args = self
            .inner
            .iter()
            .map(|arg| arg.to_string_lossy().escape_default().collect::<String>())
            .collect::<Vec<_>>()
            .join(" ");
        f.write_str(&args)
    }
}

impl ops::Deref for Argv {
    type Target = [CString];

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

#[cfg(test)]
impl From<&[&str]> for Argv {
    fn from(args: &[&str]) -> Self {
        Self::new(args).unwrap()
    }
}
