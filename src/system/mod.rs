use std::{convert::Infallible, ffi::c_char};

use crate::{
    common::{Argv, OsError},
    cutils::cerr,
};
use interface::ProcessId;

use self::signal::SignalNumber;

// generalized traits for when we want to hide implementations
pub mod interface;

pub mod file;

pub mod signal;

pub mod term;

pub mod wait;

pub(crate) fn _exit(status: libc::c_int) -> ! {
    unsafe { libc::_exit(status) }
}

pub enum ForkResult {
    // Parent process branch with the child process' PID.
    Parent(ProcessId),
    // Child process branch.
    Child,
}

unsafe fn inner_fork() -> Result<ForkResult, OsError> {
    let pid = cerr("fork", unsafe { libc::fork() })?;
    if pid == 0 {
        Ok(ForkResult::Child)
    } else {
        Ok(ForkResult::Parent(ProcessId::new(pid)))
    }
}

#[cfg(target_os = "linux")]
/// Create a new process.
pub fn fork() -> Result<ForkResult, OsError> {
    // SAFETY: `fork` is implemented using `clone` in linux so we don't need to worry about signal
    // safety.
    unsafe { inner_fork() }
}

#[cfg(not(target_os = "linux"))]
/// Create a new process.
///
/// # Safety
///
/// In a multithreaded program, only async-signal-safe functions are guaranteed to work in the
/// child process until a call to `execve` or a similar function is done.
pub unsafe fn fork() -> Result<ForkResult, OsError> {
    inner_fork()
}

/// Replace the current process image with the program named by `argv[0]`, searching `PATH`.
///
/// This only returns if the program could not be executed, in which case the calling process
/// keeps running.
pub fn exec(argv: &Argv) -> Result<Infallible, OsError> {
    let ptrs = argv.as_ptrs();
    Err(execvp(&ptrs))
}

/// `execvp` over an already prepared NULL-terminated pointer array.
///
/// This does not allocate, so it can be used in the child branch of a `fork`.
pub(crate) fn execvp(ptrs: &[*const c_char]) -> OsError {
    debug_assert!(ptrs.last().is_some_and(|ptr| ptr.is_null()));
    // SAFETY: `ptrs` is NULL-terminated and its first element is a valid C string.
    unsafe { libc::execvp(ptrs[0], ptrs.as_ptr()) };
    OsError::last("exec")
}

/// Get the process ID of the current process.
pub fn getpid() -> ProcessId {
    ProcessId::new(unsafe { libc::getpid() })
}

/// Create a new session with the current process as its leader.
pub fn setsid() -> Result<ProcessId, OsError> {
    cerr("setsid", unsafe { libc::setsid() }).map(ProcessId::new)
}

/// Send a signal to a process with the specified ID.
pub fn kill(pid: ProcessId, signal: SignalNumber) -> Result<(), OsError> {
    // SAFETY: This function cannot cause UB even if `pid` is not a valid process ID or if
    // `signal` is not a valid signal code.
    cerr("kill", unsafe { libc::kill(pid.get(), signal) }).map(|_| ())
}

/// Send a signal to a process group with the specified ID.
pub fn killpg(pgid: ProcessId, signal: SignalNumber) -> Result<(), OsError> {
    // SAFETY: This function cannot cause UB even if `pgid` is not a valid process ID or if
    // `signal` is not a valid signal code.
    cerr("killpg", unsafe { libc::killpg(pgid.get(), signal) }).map(|_| ())
}

/// Get the process group ID of the current process.
pub fn getpgrp() -> ProcessId {
    ProcessId::new(unsafe { libc::getpgrp() })
}

/// Get a process group ID.
pub fn getpgid(pid: ProcessId) -> Result<ProcessId, OsError> {
    // SAFETY: This function cannot cause UB even if `pid` is not a valid process ID
    cerr("getpgid", unsafe { libc::getpgid(pid.get()) }).map(ProcessId::new)
}

/// Set a process group ID.
///
/// A `pid` of zero means the calling process and a `pgid` of zero means "the same as `pid`".
pub fn setpgid(pid: ProcessId, pgid: ProcessId) -> Result<(), OsError> {
    cerr("setpgid", unsafe { libc::setpgid(pid.get(), pgid.get()) }).map(|_| ())
}

pub(crate) fn make_zeroed_sigaction() -> libc::sigaction {
    // SAFETY: since sigaction is a C struct, all-zeroes is a valid representation
    // We cannot use a "literal struct" initialization method since the exact representation
    // of libc::sigaction is not fixed.
    unsafe { std::mem::zeroed() }
}

#[cfg(test)]
mod tests {
    use std::{
        io::{Read, Write},
        os::unix::net::UnixStream,
        process::exit,
    };

    use libc::SIGKILL;

    use super::{
        exec, fork, getpgid, getpgrp, getpid,
        interface::ProcessId,
        kill, killpg, setpgid,
        wait::{Wait, WaitOptions},
        ForkResult,
    };
    use crate::common::Argv;

    #[test]
    fn pgid_test() {
        let pgrp = getpgrp();
        assert_eq!(getpgid(ProcessId::new(0)).unwrap(), pgrp);
        assert_eq!(getpgid(getpid()).unwrap(), pgrp);

        match fork().unwrap() {
            ForkResult::Child => {
                // wait for the parent.
                std::thread::sleep(std::time::Duration::from_secs(1));
                exit(0);
            }
            ForkResult::Parent(child_pid) => {
                // The child should be in our process group.
                assert_eq!(getpgid(child_pid).unwrap(), pgrp);
                // Move the child to its own process group
                setpgid(child_pid, child_pid).unwrap();
                // The process group of the child should have changed.
                assert_eq!(getpgid(child_pid).unwrap(), child_pid);

                let (_, status) = child_pid.wait(WaitOptions::new()).unwrap().unwrap();
                assert_eq!(status.exit_status(), Some(0));
            }
        }
    }

    #[test]
    fn kill_test() {
        let mut child = std::process::Command::new("/bin/sleep")
            .arg("1")
            .spawn()
            .unwrap();
        kill(ProcessId::new(child.id() as i32), SIGKILL).unwrap();
        assert!(!child.wait().unwrap().success());
    }

    #[test]
    fn kill_missing_process() {
        // Process IDs are bounded by `pid_max`, which is far below `i32::MAX`.
        let err = kill(ProcessId::new(i32::MAX), 0).unwrap_err();
        assert_eq!(err.operation(), "kill");
        assert_eq!(err.code(), libc::ESRCH);
    }

    #[test]
    fn killpg_test() {
        // Create a socket so the children write to it if they aren't terminated by `killpg`.
        let (mut rx, mut tx) = UnixStream::pair().unwrap();

        let ForkResult::Parent(pid1) = fork().unwrap() else {
            std::thread::sleep(std::time::Duration::from_secs(1));
            tx.write_all(&[42]).unwrap();
            exit(0);
        };

        let ForkResult::Parent(pid2) = fork().unwrap() else {
            std::thread::sleep(std::time::Duration::from_secs(1));
            tx.write_all(&[42]).unwrap();
            exit(0);
        };

        drop(tx);

        let pgid = pid1;
        // Move the children to their own process group.
        setpgid(pid1, pgid).unwrap();
        setpgid(pid2, pgid).unwrap();
        // Send `SIGKILL` to the children process group.
        killpg(pgid, SIGKILL).unwrap();
        // Ensure that the child were terminated before writing.
        assert_eq!(
            rx.read_exact(&mut [0; 2]).unwrap_err().kind(),
            std::io::ErrorKind::UnexpectedEof
        );

        for pid in [pid1, pid2] {
            let (_, status) = pid.wait(WaitOptions::new()).unwrap().unwrap();
            assert_eq!(status.term_signal(), Some(SIGKILL));
        }
    }

    #[test]
    fn exec_failure_returns_to_caller() {
        let argv = Argv::new(["unixy-this-program-does-not-exist"]).unwrap();
        let err = exec(&argv).unwrap_err();
        assert_eq!(err.operation(), "exec");
        assert_eq!(err.code(), libc::ENOENT);
    }
}
