use crate::common::OsError;

/// Turn the return value of a C call into a `Result`, reading `errno` if the call returned `-1`.
pub fn cerr<Int: Copy + TryInto<libc::c_long>>(
    operation: &'static str,
    res: Int,
) -> Result<Int, OsError> {
    match res.try_into() {
        Ok(-1) => Err(OsError::last(operation)),
        _ => Ok(res),
    }
}

extern "C" {
    #[cfg_attr(
        any(target_os = "macos", target_os = "ios", target_os = "freebsd"),
        link_name = "__error"
    )]
    #[cfg_attr(
        any(target_os = "openbsd", target_os = "netbsd", target_os = "android"),
        link_name = "__errno"
    )]
    #[cfg_attr(target_os = "linux", link_name = "__errno_location")]
    fn errno_location() -> *mut libc::c_int;
}

pub fn errno() -> libc::c_int {
    unsafe { *errno_location() }
}

#[cfg(test)]
pub fn set_errno(no: libc::c_int) {
    unsafe { *errno_location() = no };
}

/// Call `f` until it does not fail with `EINTR`.
///
/// None of the wrappers in this crate restart interrupted calls on their own. Use this when a
/// signal arriving during a blocking call should not abort it.
pub fn retry_interrupted<T>(mut f: impl FnMut() -> Result<T, OsError>) -> Result<T, OsError> {
    loop {
        match f() {
            Err(err) if err.is_interrupted() => {}
            result => return result,
        }
    }
}

#[cfg(test)]
mod test {
    use super::{cerr, errno, retry_interrupted, set_errno};
    use crate::common::OsError;

    #[test]
    fn cerr_captures_errno() {
        set_errno(libc::EBADF);
        let err = cerr("close", -1).unwrap_err();
        assert_eq!(err.operation(), "close");
        assert_eq!(err.code(), libc::EBADF);

        assert_eq!(cerr("read", 0isize), Ok(0));
        assert_eq!(cerr("open", 7), Ok(7));
    }

    #[test]
    fn errno_roundtrips() {
        set_errno(libc::ENOTTY);
        assert_eq!(errno(), libc::ENOTTY);
        set_errno(0);
        assert_eq!(errno(), 0);
    }

    #[test]
    fn retries_only_interruptions() {
        let mut calls = 0;
        let res = retry_interrupted(|| {
            calls += 1;
            if calls < 3 {
                Err(OsError::new("read", libc::EINTR))
            } else {
                Ok(calls)
            }
        });
        assert_eq!(res, Ok(3));

        let mut calls = 0;
        let res: Result<(), _> = retry_interrupted(|| {
            calls += 1;
            Err(OsError::new("read", libc::EIO))
        });
        assert_eq!(res.unwrap_err().code(), libc::EIO);
        assert_eq!(calls, 1);
    }
}
