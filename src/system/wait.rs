use libc::{
    c_int, WCONTINUED, WEXITSTATUS, WIFCONTINUED, WIFEXITED, WIFSIGNALED, WIFSTOPPED, WNOHANG,
    WSTOPSIG, WTERMSIG, WUNTRACED,
};

use crate::common::OsError;
use crate::cutils::cerr;
use crate::system::signal::signal_name;
use crate::{system::interface::ProcessId, system::signal::SignalNumber};

mod sealed {
    pub trait Sealed {}

    impl Sealed for crate::system::interface::ProcessId {}
}

pub trait Wait: sealed::Sealed {
    /// Wait for a process to change state.
    ///
    /// Calling this function will block until a child specified by the given process ID has
    /// changed state. This can be configured further using [`WaitOptions`].
    ///
    /// Returns `Ok(None)` if [`WaitOptions::no_hang`] was used and no child changed state.
    /// Fails with `ECHILD` if there is no such child, including when it was already reaped.
    fn wait(self, options: WaitOptions) -> Result<Option<(ProcessId, WaitStatus)>, OsError>;
}

impl Wait for ProcessId {
    fn wait(self, options: WaitOptions) -> Result<Option<(ProcessId, WaitStatus)>, OsError> {
        let mut status: c_int = 0;

        let pid = cerr("waitpid", unsafe {
            libc::waitpid(self.get(), &mut status, options.flags)
        })?;

        if pid == 0 && options.flags & WNOHANG != 0 {
            return Ok(None);
        }

        Ok(Some((ProcessId::new(pid), WaitStatus { status })))
    }
}

/// Options to configure how [`Wait::wait`] waits for children.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WaitOptions {
    flags: c_int,
}

impl WaitOptions {
    /// Only wait for terminated children.
    pub const fn new() -> Self {
        Self { flags: 0 }
    }

    /// Use raw `waitpid` flags, as handed over by a host binding.
    pub const fn from_flags(flags: c_int) -> Self {
        Self { flags }
    }

    /// Return immediately if no child has exited.
    pub const fn no_hang(mut self) -> Self {
        self.flags |= WNOHANG;
        self
    }

    /// Return immediately if a child has stopped.
    pub const fn untraced(mut self) -> Self {
        self.flags |= WUNTRACED;
        self
    }

    /// Also return when a stopped child has been resumed by `SIGCONT`.
    pub const fn continued(mut self) -> Self {
        self.flags |= WCONTINUED;
        self
    }

    pub const fn flags(&self) -> c_int {
        self.flags
    }
}

/// The status of the waited child.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct WaitStatus {
    status: c_int,
}

impl std::fmt::Debug for WaitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = |signal| signal_name(signal).unwrap_or("unknown signal");
        if let Some(exit_status) = self.exit_status() {
            write!(f, "ExitStatus({exit_status})")
        } else if let Some(signal) = self.term_signal() {
            write!(f, "TermSignal({})", name(signal))
        } else if let Some(signal) = self.stop_signal() {
            write!(f, "StopSignal({})", name(signal))
        } else if self.did_continue() {
            write!(f, "Continued")
        } else {
            write!(f, "Unknown")
        }
    }
}

impl WaitStatus {
    /// Wrap a raw status as returned by `waitpid`.
    pub const fn from_raw(status: c_int) -> Self {
        Self { status }
    }

    /// The raw status as returned by `waitpid`.
    pub const fn raw(&self) -> c_int {
        self.status
    }

    /// Return `true` if the child terminated normally, i.e., by calling `exit`.
    pub const fn did_exit(&self) -> bool {
        WIFEXITED(self.status)
    }

    /// Return the exit status of the child if the child terminated normally.
    pub const fn exit_status(&self) -> Option<c_int> {
        if self.did_exit() {
            Some(WEXITSTATUS(self.status))
        } else {
            None
        }
    }

    /// Return `true` if the child process was terminated by a signal.
    pub const fn was_signaled(&self) -> bool {
        WIFSIGNALED(self.status)
    }

    /// Return the signal number which caused the child to terminate if the child was terminated by
    /// a signal.
    pub const fn term_signal(&self) -> Option<SignalNumber> {
        if self.was_signaled() {
            Some(WTERMSIG(self.status))
        } else {
            None
        }
    }

    /// Return `true` if the child process was stopped by a signal.
    pub const fn was_stopped(&self) -> bool {
        WIFSTOPPED(self.status)
    }

    /// Return the signal number which caused the child to stop if the child was stopped by a
    /// signal.
    pub const fn stop_signal(&self) -> Option<SignalNumber> {
        if self.was_stopped() {
            Some(WSTOPSIG(self.status))
        } else {
            None
        }
    }

    /// Return `true` if the child process was resumed by receiving `SIGCONT`.
    pub const fn did_continue(&self) -> bool {
        WIFCONTINUED(self.status)
    }

    /// Return `true` if the child is gone, i.e. it either exited or was killed by a signal.
    pub const fn is_terminated(&self) -> bool {
        self.did_exit() || self.was_signaled()
    }
}
