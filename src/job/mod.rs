//! Process groups, terminal ownership and job lifecycles.
//!
//! A job is a process started with [`Spawn`], usually as the leader of its own process group. The
//! group can be handed the controlling terminal with [`foreground`] and the terminal taken back
//! with [`restore_foreground`]. Nothing here decides *when* to do so; that is up to the caller.
use std::os::fd::AsRawFd;

use crate::{
    common::{Argv, OsError},
    log::{dev_warn, job_debug, job_info},
    system::{
        interface::ProcessId,
        kill, killpg,
        signal::{
            consts::{SIGCONT, SIGTTOU},
            signal_name, SignalNumber, SignalSet,
        },
        term::Terminal,
        wait::{Wait, WaitOptions, WaitStatus},
    },
};

mod spawn;

pub use spawn::{ProcessGroup, Spawn};

/// Start `argv` in a child process, optionally as the leader of a new process group.
///
/// See [`Spawn`] for more control over how the job is started.
pub fn spawn_job(argv: Argv, new_process_group: bool) -> Result<ProcessId, OsError> {
    let group = if new_process_group {
        ProcessGroup::New
    } else {
        ProcessGroup::Inherit
    };

    Spawn::new(argv)
        .process_group(group)
        .spawn()
        .map(|job| job.pid())
}

/// Make `pgid` the foreground process group of `tty`.
///
/// The caller must itself be in the foreground of `tty`, or ignore or block `SIGTTOU`, otherwise
/// it is stopped. Use [`restore_foreground`] to take the terminal back from the background.
pub fn foreground<F: AsRawFd>(pgid: ProcessId, tty: &F) -> Result<(), OsError> {
    tty.tcsetpgrp(pgid)?;
    job_debug!("process group {pgid} is now in the foreground");
    Ok(())
}

/// Make `pgid` the foreground process group of `tty` while the caller is in the background.
///
/// `SIGTTOU` is blocked for the duration of the call, so the caller is not stopped.
pub fn restore_foreground<F: AsRawFd>(pgid: ProcessId, tty: &F) -> Result<(), OsError> {
    let original_mask = SignalSet::with(&[SIGTTOU])?.block()?;
    let res = tty.tcsetpgrp(pgid);

    if let Err(err) = original_mask.set_mask() {
        dev_warn!("cannot restore signal mask: {err}");
    }

    res?;
    job_debug!("process group {pgid} is back in the foreground");
    Ok(())
}

/// Wait for a state change of `pid`.
///
/// `pid` follows the `waitpid` conventions: `-1` waits for any child and a negative value for
/// any member of that process group. With [`WaitOptions::no_hang`], `Ok(None)` means no child has
/// changed state yet.
pub fn wait_for(
    pid: ProcessId,
    options: WaitOptions,
) -> Result<Option<(ProcessId, WaitStatus)>, OsError> {
    pid.wait(options)
}

/// Where a job is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// Started, the terminal has not been handed over.
    Spawned,
    /// The job's process group owns the terminal.
    Foregrounded,
    /// The job runs without owning the terminal.
    Backgrounded,
    /// The job terminated and was waited for. Nothing more can be done with it.
    Reaped,
}

/// A running job.
#[derive(Debug)]
pub struct Job {
    pid: ProcessId,
    pgid: ProcessId,
    state: JobState,
    status: Option<WaitStatus>,
}

impl Job {
    fn new(pid: ProcessId, pgid: ProcessId, state: JobState) -> Self {
        Self {
            pid,
            pgid,
            state,
            status: None,
        }
    }

    pub fn pid(&self) -> ProcessId {
        self.pid
    }

    pub fn pgid(&self) -> ProcessId {
        self.pgid
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    /// The last status reported by [`Job::wait`].
    pub fn status(&self) -> Option<WaitStatus> {
        self.status
    }

    /// Whether the last reported status says the job is stopped.
    pub fn is_stopped(&self) -> bool {
        self.status.is_some_and(|status| status.was_stopped())
    }

    /// Fail with `ESRCH` for `operation` once the job is reaped.
    fn ensure_alive(&self, operation: &'static str) -> Result<(), OsError> {
        if self.state == JobState::Reaped {
            Err(OsError::new(operation, libc::ESRCH))
        } else {
            Ok(())
        }
    }

    /// Hand `tty` over to the job's process group.
    pub fn foreground<F: AsRawFd>(&mut self, tty: &F) -> Result<(), OsError> {
        self.ensure_alive("tcsetpgrp")?;
        foreground(self.pgid, tty)?;
        self.state = JobState::Foregrounded;
        Ok(())
    }

    /// Give `tty` back to `pgid`, usually the caller's own process group, leaving the job running
    /// in the background.
    pub fn background<F: AsRawFd>(&mut self, tty: &F, pgid: ProcessId) -> Result<(), OsError> {
        self.ensure_alive("tcsetpgrp")?;
        if self.state == JobState::Foregrounded {
            restore_foreground(pgid, tty)?;
        }
        self.state = JobState::Backgrounded;
        Ok(())
    }

    /// Send `signal` to the job. If the job leads its process group the whole group receives it.
    pub fn signal(&self, signal: SignalNumber) -> Result<(), OsError> {
        if self.pgid == self.pid {
            self.ensure_alive("killpg")?;
            killpg(self.pgid, signal)
        } else {
            self.ensure_alive("kill")?;
            kill(self.pid, signal)
        }
    }

    /// Continue a stopped job in the foreground of `tty`.
    pub fn resume_foreground<F: AsRawFd>(&mut self, tty: &F) -> Result<(), OsError> {
        self.foreground(tty)?;
        self.signal(SIGCONT)?;
        self.status = None;
        Ok(())
    }

    /// Continue a stopped job without handing it the terminal.
    pub fn resume_background(&mut self) -> Result<(), OsError> {
        self.signal(SIGCONT)?;
        if self.state != JobState::Foregrounded {
            self.state = JobState::Backgrounded;
        }
        self.status = None;
        Ok(())
    }

    /// Wait for the job to change state.
    ///
    /// Once a terminating status has been returned the job is reaped, and waiting again fails with
    /// `ECHILD` just as `waitpid` does.
    pub fn wait(&mut self, options: WaitOptions) -> Result<Option<WaitStatus>, OsError> {
        if self.state == JobState::Reaped {
            return Err(OsError::new("waitpid", libc::ECHILD));
        }

        let Some((_, status)) = self.pid.wait(options)? else {
            return Ok(None);
        };

        self.status = Some(status);
        if status.is_terminated() {
            self.state = JobState::Reaped;
            if let Some(signal) = status.term_signal() {
                job_info!(
                    "job {} terminated by {}",
                    self.pid,
                    signal_name(signal).unwrap_or("unknown signal")
                );
            } else {
                job_debug!("job {} exited: {status:?}", self.pid);
            }
        } else if let Some(signal) = status.stop_signal() {
            job_info!(
                "job {} stopped by {}",
                self.pid,
                signal_name(signal).unwrap_or("unknown signal")
            );
        }

        Ok(Some(status))
    }
}

/// Keeps a process group in the foreground of a terminal, handing the terminal back to the
/// group that had it when the guard is dropped.
pub struct ForegroundGuard<F: AsRawFd> {
    tty: F,
    previous: ProcessId,
    released: bool,
}

impl<F: AsRawFd> ForegroundGuard<F> {
    pub fn new(tty: F, pgid: ProcessId) -> Result<Self, OsError> {
        let previous = tty.tcgetpgrp()?;
        foreground(pgid, &tty)?;
        Ok(Self {
            tty,
            previous,
            released: false,
        })
    }

    /// The process group that owned the terminal before this guard.
    pub fn previous(&self) -> ProcessId {
        self.previous
    }

    /// Hand the terminal back now.
    pub fn release(mut self) -> Result<(), OsError> {
        self.released = true;
        restore_foreground(self.previous, &self.tty)
    }
}

impl<F: AsRawFd> Drop for ForegroundGuard<F> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(err) = restore_foreground(self.previous, &self.tty) {
            dev_warn!("cannot give the terminal back to {}: {err}", self.previous);
        }
    }
}
