use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::{
    common::OsError,
    log::{dev_debug, dev_warn},
};

use super::{consts::*, set::SignalAction, signal_name, SignalNumber};

/// What the process does when a signal arrives.
#[derive(Debug, Clone, Copy)]
pub enum Disposition {
    /// Execute the default action for the signal.
    Default,
    /// Ignore the arrival of the signal.
    Ignore,
    /// Call the given function. It must only do async-signal-safe work.
    Handler(extern "C" fn(SignalNumber)),
}

static LOCK: Mutex<()> = Mutex::new(());

/// The process-wide table of signal dispositions.
///
/// Dispositions are shared by every thread of the process, so they can only be changed through a
/// [`DispositionsGuard`], of which at most one exists at any time.
pub struct SignalDispositions;

impl SignalDispositions {
    /// Get exclusive access to the signal dispositions, blocking until any other guard is dropped.
    pub fn lock() -> DispositionsGuard {
        DispositionsGuard {
            _lock: LOCK.lock().unwrap_or_else(PoisonError::into_inner),
            saved: Vec::new(),
        }
    }

    /// Get the action currently registered for `signal`.
    pub fn current(signal: SignalNumber) -> Result<SignalAction, OsError> {
        SignalAction::current(signal)
    }
}

/// Set the disposition of `signal` for good, returning the action it replaced.
///
/// This takes the same lock as [`SignalDispositions::lock`] but does not restore anything
/// afterwards.
pub fn signal(signal: SignalNumber, disposition: Disposition) -> Result<SignalAction, OsError> {
    let mut guard = SignalDispositions::lock();
    let previous_action = guard.install(signal, disposition)?;
    guard.forget();
    Ok(previous_action)
}

/// Exclusive access to the signal dispositions.
///
/// When a value of this type is dropped, it will try to restore every disposition it changed to
/// the action that was registered before the first change.
pub struct DispositionsGuard {
    _lock: MutexGuard<'static, ()>,
    saved: Vec<(SignalNumber, SignalAction)>,
}

impl DispositionsGuard {
    const FORBIDDEN: &'static [SignalNumber] = &[SIGKILL, SIGSTOP];

    /// Set the disposition of `signal`, returning the action it replaced.
    ///
    /// Fails with `EINVAL` for `SIGKILL` and `SIGSTOP`, whose actions cannot be changed.
    pub fn install(
        &mut self,
        signal: SignalNumber,
        disposition: Disposition,
    ) -> Result<SignalAction, OsError> {
        if Self::FORBIDDEN.contains(&signal) {
            return Err(OsError::new("sigaction", libc::EINVAL));
        }

        let action = SignalAction::new(disposition)?;
        let previous_action = action.register(signal)?;
        dev_debug!(
            "{} disposition set to {disposition:?}",
            signal_name(signal).unwrap_or("unknown signal")
        );

        if !self.saved.iter().any(|&(saved, _)| saved == signal) {
            self.saved.push((signal, previous_action));
        }

        Ok(previous_action)
    }

    /// Set the same disposition for several signals.
    pub fn install_all(
        &mut self,
        signals: &[SignalNumber],
        disposition: Disposition,
    ) -> Result<(), OsError> {
        for &signal in signals {
            self.install(signal, disposition)?;
        }
        Ok(())
    }

    /// Restore the disposition `signal` had before this guard first changed it.
    pub fn restore(&mut self, signal: SignalNumber) -> Result<(), OsError> {
        if let Some(idx) = self.saved.iter().position(|&(saved, _)| saved == signal) {
            let (signal, action) = self.saved.remove(idx);
            action.register(signal)?;
        }
        Ok(())
    }

    /// Restore every disposition changed through this guard.
    pub fn restore_all(&mut self) -> Result<(), OsError> {
        while let Some((signal, action)) = self.saved.pop() {
            dev_debug!(
                "restoring disposition of {}",
                signal_name(signal).unwrap_or("unknown signal")
            );
            action.register(signal)?;
        }
        Ok(())
    }

    /// Keep the installed dispositions after the guard is released.
    pub fn forget(mut self) {
        self.saved.clear();
    }
}

impl Drop for DispositionsGuard {
    #[track_caller]
    fn drop(&mut self) {
        if let Err(err) = self.restore_all() {
            dev_warn!("cannot restore original signal dispositions: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::{signal, Disposition, SignalDispositions};
    use crate::system::{getpid, kill, signal::consts::*};

    static GOT_SIGUSR2: AtomicBool = AtomicBool::new(false);

    extern "C" fn on_sigusr2(_signal: libc::c_int) {
        GOT_SIGUSR2.store(true, Ordering::SeqCst);
    }

    extern "C" fn do_nothing(_signal: libc::c_int) {}

    #[test]
    fn ignore_then_restore() {
        let mut guard = SignalDispositions::lock();
        guard.install(SIGUSR1, Disposition::Ignore).unwrap();
        assert!(SignalDispositions::current(SIGUSR1).unwrap().is_ignored());

        // Would terminate the test runner if it was not ignored.
        kill(getpid(), SIGUSR1).unwrap();

        // A second install must not overwrite the saved original.
        guard.install(SIGUSR1, Disposition::Ignore).unwrap();
        drop(guard);

        assert!(SignalDispositions::current(SIGUSR1).unwrap().is_default());
    }

    #[test]
    fn handler_is_called() {
        let mut guard = SignalDispositions::lock();
        guard
            .install(SIGUSR2, Disposition::Handler(on_sigusr2))
            .unwrap();
        assert!(SignalDispositions::current(SIGUSR2).unwrap().is_handler());

        // Delivered to this thread before `raise` returns, so no other test is interrupted.
        assert_eq!(unsafe { libc::raise(SIGUSR2) }, 0);
        assert!(GOT_SIGUSR2.load(Ordering::SeqCst));

        guard.restore(SIGUSR2).unwrap();
        assert!(SignalDispositions::current(SIGUSR2).unwrap().is_default());
    }

    #[test]
    fn forget_keeps_disposition() {
        let mut guard = SignalDispositions::lock();
        guard.install(SIGWINCH, Disposition::Ignore).unwrap();
        guard.forget();
        assert!(SignalDispositions::current(SIGWINCH).unwrap().is_ignored());

        let mut guard = SignalDispositions::lock();
        guard.install(SIGWINCH, Disposition::Default).unwrap();
        guard.forget();
    }

    #[test]
    fn install_returns_replaced_action() {
        let mut guard = SignalDispositions::lock();
        let previous = guard.install(SIGTTIN, Disposition::Ignore).unwrap();
        assert!(previous.is_default());

        let previous = guard
            .install(SIGTTIN, Disposition::Handler(do_nothing))
            .unwrap();
        assert!(previous.is_ignored());

        let previous = guard.install(SIGTTIN, Disposition::Default).unwrap();
        assert!(previous.is_handler());

        drop(guard);
        assert!(SignalDispositions::current(SIGTTIN).unwrap().is_default());
    }

    #[test]
    fn signal_keeps_disposition() {
        // The Rust runtime ignores `SIGPIPE` before `main`.
        let previous = signal(SIGPIPE, Disposition::Ignore).unwrap();
        assert!(previous.is_ignored());
        assert!(SignalDispositions::current(SIGPIPE).unwrap().is_ignored());

        let err = signal(SIGSTOP, Disposition::Ignore).unwrap_err();
        assert_eq!(err.code(), libc::EINVAL);
    }

    #[test]
    fn kill_and_stop_are_forbidden() {
        let mut guard = SignalDispositions::lock();
        for signal in [SIGKILL, SIGSTOP] {
            let err = guard.install(signal, Disposition::Ignore).unwrap_err();
            assert_eq!(err.code(), libc::EINVAL);
        }
    }
}
