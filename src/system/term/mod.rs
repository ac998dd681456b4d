mod guard;

use std::{
    fmt,
    mem::MaybeUninit,
    os::fd::{AsRawFd, RawFd},
};

use libc::{tcflag_t, termios, ECHO, ICANON, IEXTEN, ISIG, TCSADRAIN, TCSAFLUSH, TCSANOW};

use crate::{common::OsError, cutils::cerr};

use super::interface::ProcessId;

pub use guard::TermGuard;

mod sealed {
    use std::os::fd::AsRawFd;

    pub trait Sealed {}

    impl<F: AsRawFd> Sealed for F {}
}

pub trait Terminal: sealed::Sealed {
    fn tcgetpgrp(&self) -> Result<ProcessId, OsError>;
    fn tcsetpgrp(&self, pgrp: ProcessId) -> Result<(), OsError>;
    fn make_controlling_terminal(&self) -> Result<(), OsError>;
    fn is_terminal(&self) -> Result<bool, OsError>;
}

impl<F: AsRawFd> Terminal for F {
    /// Get the foreground process group ID associated with this terminal.
    fn tcgetpgrp(&self) -> Result<ProcessId, OsError> {
        cerr("tcgetpgrp", unsafe { libc::tcgetpgrp(self.as_raw_fd()) }).map(ProcessId::new)
    }

    /// Set the foreground process group ID associated with this terminal to `pgrp`.
    fn tcsetpgrp(&self, pgrp: ProcessId) -> Result<(), OsError> {
        cerr("tcsetpgrp", unsafe {
            libc::tcsetpgrp(self.as_raw_fd(), pgrp.get())
        })
        .map(|_| ())
    }

    /// Make the given terminal the controlling terminal of the calling process.
    fn make_controlling_terminal(&self) -> Result<(), OsError> {
        cerr("ioctl", unsafe {
            libc::ioctl(self.as_raw_fd(), libc::TIOCSCTTY, 0)
        })?;
        Ok(())
    }

    /// Check whether this descriptor refers to a terminal.
    fn is_terminal(&self) -> Result<bool, OsError> {
        isatty(self.as_raw_fd())
    }
}

/// Check whether `fd` refers to a terminal.
///
/// `ENOTTY` is the regular "no" answer; any other error, such as `EBADF` for a descriptor that
/// is not open, is reported as a failure.
pub fn isatty(fd: RawFd) -> Result<bool, OsError> {
    if unsafe { libc::isatty(fd) } == 1 {
        return Ok(true);
    }

    let err = OsError::last("isatty");
    if err.code() == libc::ENOTTY {
        Ok(false)
    } else {
        Err(err)
    }
}

/// When a change made by [`TerminalState::apply`] takes effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum When {
    /// Immediately.
    Now,
    /// After all the queued output has been written.
    Drain,
    /// After all the queued output has been written, discarding the queued input.
    Flush,
}

impl When {
    /// The `optional_actions` argument of `tcsetattr`.
    pub const fn as_raw(self) -> libc::c_int {
        match self {
            When::Now => TCSANOW,
            When::Drain => TCSADRAIN,
            When::Flush => TCSAFLUSH,
        }
    }
}

/// A snapshot of the attributes of a terminal.
#[derive(Clone, Copy)]
pub struct TerminalState {
    raw: termios,
}

impl TerminalState {
    /// Read the current attributes of the terminal `tty`.
    pub fn capture<F: AsRawFd>(tty: &F) -> Result<Self, OsError> {
        let mut raw = MaybeUninit::<termios>::uninit();
        cerr("tcgetattr", unsafe {
            libc::tcgetattr(tty.as_raw_fd(), raw.as_mut_ptr())
        })?;

        Ok(Self {
            raw: unsafe { raw.assume_init() },
        })
    }

    /// Set the attributes of the terminal `tty` to this snapshot.
    pub fn apply<F: AsRawFd>(&self, tty: &F, when: When) -> Result<(), OsError> {
        cerr("tcsetattr", unsafe {
            libc::tcsetattr(tty.as_raw_fd(), when.as_raw(), &self.raw)
        })?;
        Ok(())
    }

    /// This state with raw mode enabled: no line buffering, no echo and no special characters.
    /// Terminal signals are kept if `with_signals` is set to `true`.
    pub fn raw_mode(&self, with_signals: bool) -> Self {
        let mut raw = self.raw;
        unsafe { libc::cfmakeraw(&mut raw) };
        if with_signals {
            raw.c_lflag |= ISIG;
        }
        Self { raw }
    }

    /// This state with line buffering, echo and terminal signals enabled.
    pub fn canonical_mode(&self) -> Self {
        let mut raw = self.raw;
        raw.c_lflag |= ICANON | ECHO | ISIG | IEXTEN;
        Self { raw }
    }

    pub fn local_flags(&self) -> tcflag_t {
        self.raw.c_lflag
    }

    pub fn is_canonical(&self) -> bool {
        self.raw.c_lflag & ICANON != 0
    }

    pub fn echoes(&self) -> bool {
        self.raw.c_lflag & ECHO != 0
    }
}

impl PartialEq for TerminalState {
    fn eq(&self, other: &Self) -> bool {
        let (a, b) = (&self.raw, &other.raw);
        a.c_iflag == b.c_iflag
            && a.c_oflag == b.c_oflag
            && a.c_cflag == b.c_cflag
            && a.c_lflag == b.c_lflag
            && a.c_cc == b.c_cc
    }
}

impl Eq for TerminalState {}

impl fmt::Debug for TerminalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TerminalState")
            .field("c_iflag", &format_args!("{:#o}", self.raw.c_iflag))
            .field("c_oflag", &format_args!("{:#o}", self.raw.c_oflag))
            .field("c_cflag", &format_args!("{:#o}", self.raw.c_cflag))
            .field("c_lflag", &format_args!("{:#o}", self.raw.c_lflag))
            .finish()
    }
}
