use crate::{common::OsError, cutils::cerr, system::make_zeroed_sigaction};

use super::{handler::Disposition, SignalNumber};

use std::mem::MaybeUninit;

/// A raw signal action, as accepted and returned by `sigaction`.
///
/// Values returned by [`SignalAction::register`] hold the action that was replaced and can be
/// registered again to undo the change.
#[derive(Clone, Copy, Debug)]
#[repr(transparent)]
pub struct SignalAction {
    raw: libc::sigaction,
}

impl SignalAction {
    pub(crate) fn new(disposition: Disposition) -> Result<Self, OsError> {
        let sa_sigaction = match disposition {
            Disposition::Default => libc::SIG_DFL,
            Disposition::Ignore => libc::SIG_IGN,
            Disposition::Handler(handler) => handler as libc::sighandler_t,
        };

        let mut raw: libc::sigaction = make_zeroed_sigaction();
        raw.sa_sigaction = sa_sigaction;
        raw.sa_mask = SignalSet::empty()?.raw;
        // Interrupted calls fail with `EINTR` so blocking calls can be cancelled by a handler.
        raw.sa_flags = 0;

        Ok(Self { raw })
    }

    /// Make this the action for `signal`, returning the action it replaced.
    pub(crate) fn register(&self, signal: SignalNumber) -> Result<Self, OsError> {
        let mut original_action = MaybeUninit::<Self>::zeroed();

        cerr("sigaction", unsafe {
            libc::sigaction(signal, &self.raw, original_action.as_mut_ptr().cast())
        })?;

        Ok(unsafe { original_action.assume_init() })
    }

    /// Get the action currently registered for `signal`.
    pub(crate) fn current(signal: SignalNumber) -> Result<Self, OsError> {
        let mut action = MaybeUninit::<Self>::zeroed();

        cerr("sigaction", unsafe {
            libc::sigaction(signal, std::ptr::null(), action.as_mut_ptr().cast())
        })?;

        Ok(unsafe { action.assume_init() })
    }

    /// Returns `true` if this action is the default action of the signal.
    pub fn is_default(&self) -> bool {
        self.raw.sa_sigaction == libc::SIG_DFL
    }

    /// Returns `true` if this action ignores the signal.
    pub fn is_ignored(&self) -> bool {
        self.raw.sa_sigaction == libc::SIG_IGN
    }

    /// Returns `true` if this action calls a signal-catching function.
    pub fn is_handler(&self) -> bool {
        !self.is_default() && !self.is_ignored()
    }
}

// A signal set that can be used to mask signals.
#[repr(transparent)]
pub struct SignalSet {
    raw: libc::sigset_t,
}

impl SignalSet {
    /// Create an empty set.
    pub fn empty() -> Result<Self, OsError> {
        let mut set = MaybeUninit::<Self>::zeroed();

        cerr("sigemptyset", unsafe {
            libc::sigemptyset(set.as_mut_ptr().cast())
        })?;

        Ok(unsafe { set.assume_init() })
    }

    /// Create a set containing all the signals.
    pub fn full() -> Result<Self, OsError> {
        let mut set = MaybeUninit::<Self>::zeroed();

        cerr("sigfillset", unsafe { libc::sigfillset(set.as_mut_ptr().cast()) })?;

        Ok(unsafe { set.assume_init() })
    }

    /// Create a set containing only the given signals.
    pub fn with(signals: &[SignalNumber]) -> Result<Self, OsError> {
        let mut set = Self::empty()?;
        for &signal in signals {
            set.add(signal)?;
        }
        Ok(set)
    }

    pub fn add(&mut self, signal: SignalNumber) -> Result<(), OsError> {
        cerr("sigaddset", unsafe { libc::sigaddset(&mut self.raw, signal) })?;
        Ok(())
    }

    pub fn contains(&self, signal: SignalNumber) -> Result<bool, OsError> {
        cerr("sigismember", unsafe { libc::sigismember(&self.raw, signal) }).map(|res| res == 1)
    }

    fn sigprocmask(&self, how: libc::c_int) -> Result<Self, OsError> {
        let mut original_set = MaybeUninit::<Self>::zeroed();

        cerr("sigprocmask", unsafe {
            libc::sigprocmask(how, &self.raw, original_set.as_mut_ptr().cast())
        })?;

        Ok(unsafe { original_set.assume_init() })
    }

    /// Block all the signals in this set and return the previous set of blocked signals.
    ///
    /// After calling this function successfully, the set of blocked signals will be the union of
    /// the previous set of blocked signals and this set.
    pub fn block(&self) -> Result<Self, OsError> {
        self.sigprocmask(libc::SIG_BLOCK)
    }

    /// Unblock all the signals in this set and return the previous set of blocked signals.
    pub fn unblock(&self) -> Result<Self, OsError> {
        self.sigprocmask(libc::SIG_UNBLOCK)
    }

    /// Block only the signals that are in this set and return the previous set of blocked signals.
    ///
    /// After calling this function successfully, the set of blocked signals will be the exactly
    /// this set.
    pub fn set_mask(&self) -> Result<Self, OsError> {
        self.sigprocmask(libc::SIG_SETMASK)
    }
}

#[cfg(test)]
mod tests {
    use super::SignalSet;
    use crate::system::signal::consts::*;

    #[test]
    fn membership() {
        let set = SignalSet::with(&[SIGTTOU, SIGCHLD]).unwrap();
        assert!(set.contains(SIGTTOU).unwrap());
        assert!(set.contains(SIGCHLD).unwrap());
        assert!(!set.contains(SIGINT).unwrap());

        let full = SignalSet::full().unwrap();
        assert!(full.contains(SIGINT).unwrap());
        assert!(!SignalSet::empty().unwrap().contains(SIGINT).unwrap());
    }

    #[test]
    fn block_and_restore_mask() {
        // The mask is per thread, so this does not affect other tests.
        let set = SignalSet::with(&[SIGWINCH]).unwrap();
        let original = set.block().unwrap();
        let blocked = SignalSet::empty().unwrap().block().unwrap();
        assert!(blocked.contains(SIGWINCH).unwrap());

        original.set_mask().unwrap();
        let restored = SignalSet::empty().unwrap().block().unwrap();
        assert_eq!(
            restored.contains(SIGWINCH).unwrap(),
            original.contains(SIGWINCH).unwrap()
        );
    }
}
