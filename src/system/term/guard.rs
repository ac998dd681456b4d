use std::os::fd::{AsRawFd, RawFd};

use crate::{common::OsError, log::dev_warn};

use super::{TerminalState, When};

/// Type to change the settings of a terminal and put them back afterwards.
///
/// The attributes are captured when the guard is created. If they were changed through the
/// guard, they are restored after draining the queued output when the guard is dropped.
pub struct TermGuard<F: AsRawFd> {
    tty: F,
    original: TerminalState,
    changed: bool,
}

impl<F: AsRawFd> TermGuard<F> {
    /// Capture the current settings of `tty`. Fails if `tty` is not a terminal.
    pub fn new(tty: F) -> Result<Self, OsError> {
        let original = TerminalState::capture(&tty)?;
        Ok(Self {
            tty,
            original,
            changed: false,
        })
    }

    /// The settings captured when the guard was created.
    pub fn original(&self) -> &TerminalState {
        &self.original
    }

    pub fn tty(&self) -> &F {
        &self.tty
    }

    /// Apply `state` to the terminal.
    pub fn set(&mut self, state: &TerminalState, when: When) -> Result<(), OsError> {
        self.changed = true;
        state.apply(&self.tty, when)
    }

    /// Set the terminal to raw mode. Enable terminal signals if `with_signals` is set to `true`.
    pub fn set_raw_mode(&mut self, with_signals: bool) -> Result<(), OsError> {
        let state = self.original.raw_mode(with_signals);
        self.set(&state, When::Drain)
    }

    /// Set the terminal to canonical mode with echo.
    pub fn set_canonical_mode(&mut self) -> Result<(), OsError> {
        let state = self.original.canonical_mode();
        self.set(&state, When::Drain)
    }

    /// Restore the saved terminal settings.
    ///
    /// This change is done after waiting for all the queued output to be written. To discard the
    /// queued input `flush` must be set to `true`.
    pub fn restore(&mut self, flush: bool) -> Result<(), OsError> {
        if self.changed {
            let when = if flush { When::Flush } else { When::Drain };
            self.original.apply(&self.tty, when)?;
            self.changed = false;
        }

        Ok(())
    }
}

impl<F: AsRawFd> AsRawFd for TermGuard<F> {
    fn as_raw_fd(&self) -> RawFd {
        self.tty.as_raw_fd()
    }
}

impl<F: AsRawFd> Drop for TermGuard<F> {
    fn drop(&mut self) {
        if let Err(err) = self.restore(false) {
            dev_warn!("cannot restore terminal settings: {err}");
        }
    }
}
