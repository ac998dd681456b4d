use std::{fmt, io};

use libc::c_int;

/// A failed call into the operating system.
///
/// This is the only error produced by this crate. `code` is the value of `errno` captured right
/// after the failing call and is never remapped, so callers can match on specific codes such as
/// `ECHILD` or `EINTR`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OsError {
    operation: &'static str,
    code: c_int,
}

impl OsError {
    pub const fn new(operation: &'static str, code: c_int) -> Self {
        Self { operation, code }
    }

    /// Build an error from the current value of `errno`.
    ///
    /// This must be called before anything else has a chance to clobber `errno`.
    pub fn last(operation: &'static str) -> Self {
        Self::new(operation, crate::cutils::errno())
    }

    /// The name of the operation that failed.
    pub const fn operation(&self) -> &'static str {
        self.operation
    }

    /// The OS error code.
    pub const fn code(&self) -> c_int {
        self.code
    }

    /// Returns `true` if there was no child to wait for.
    pub const fn is_no_child(&self) -> bool {
        self.code == libc::ECHILD
    }

    /// Returns `true` if the call was interrupted by the arrival of a signal.
    pub const fn is_interrupted(&self) -> bool {
        self.code == libc::EINTR
    }
}

impl fmt::Display for OsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let description = io::Error::from_raw_os_error(self.code);
        write!(f, "{}: {description}", self.operation)
    }
}

impl std::error::Error for OsError {}

impl From<OsError> for io::Error {
    fn from(err: OsError) -> Self {
        io::Error::from_raw_os_error(err.code)
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::OsError;

    #[test]
    fn display_names_the_operation() {
        let err = OsError::new("waitpid", libc::ECHILD);
        let text = err.to_string();
        assert!(text.starts_with("waitpid: "), "{text}");
        assert!(err.is_no_child());
        assert!(!err.is_interrupted());
    }

    #[test]
    fn converts_into_io_error() {
        let err: io::Error = OsError::new("read", libc::EINTR).into();
        assert_eq!(err.kind(), io::ErrorKind::Interrupted);
        assert_eq!(err.raw_os_error(), Some(libc::EINTR));
    }
}
