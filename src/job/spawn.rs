use std::{
    ffi::{c_char, c_int},
    os::fd::{AsFd, AsRawFd, BorrowedFd, RawFd},
};

use crate::{
    common::{Argv, OsError},
    cutils::{cerr, retry_interrupted},
    log::{dev_debug, job_debug, job_warn},
    system::{
        _exit, execvp,
        file::{dup2, pipe_cloexec, write, FileDescriptor},
        fork, getpgrp,
        interface::ProcessId,
        kill, setpgid,
        signal::{
            consts::{SIGKILL, SIGTTOU},
            Disposition, SignalAction, SignalSet, JOB_CONTROL_SIGNALS,
        },
        term::Terminal,
        wait::{Wait, WaitOptions},
        ForkResult,
    },
};

use super::{Job, JobState};

/// The process group a spawned job is placed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessGroup {
    /// Stay in the process group of the caller.
    #[default]
    Inherit,
    /// Lead a new process group whose ID is the job's process ID.
    New,
    /// Join an existing process group.
    Join(ProcessId),
}

/// Operations the child can fail at before or while calling `exec`. The index of an operation is
/// what the child reports back to the parent.
const CHILD_OPERATIONS: [&str; 7] = [
    "fcntl",
    "setpgid",
    "tcsetpgrp",
    "sigprocmask",
    "sigaction",
    "dup2",
    "exec",
];

const MESSAGE_LEN: usize = 2 * std::mem::size_of::<c_int>();

/// A builder for jobs.
#[derive(Debug)]
pub struct Spawn<'a> {
    argv: Argv,
    group: ProcessGroup,
    tty: Option<BorrowedFd<'a>>,
    reset_signals: bool,
    redirects: Vec<(BorrowedFd<'a>, RawFd)>,
}

impl<'a> Spawn<'a> {
    pub fn new(argv: Argv) -> Self {
        Self {
            argv,
            group: ProcessGroup::Inherit,
            tty: None,
            reset_signals: false,
            redirects: Vec::new(),
        }
    }

    pub fn process_group(mut self, group: ProcessGroup) -> Self {
        self.group = group;
        self
    }

    /// Make the job's process group the foreground process group of `tty` before the program
    /// starts.
    pub fn foreground(mut self, tty: &'a impl AsFd) -> Self {
        self.tty = Some(tty.as_fd());
        self
    }

    /// Give `SIGINT`, `SIGQUIT`, `SIGTSTP`, `SIGTTIN`, `SIGTTOU` and `SIGCHLD` their default
    /// disposition in the job, whatever the caller set for itself.
    pub fn reset_signals(mut self, reset: bool) -> Self {
        self.reset_signals = reset;
        self
    }

    /// Make descriptor `to` of the job refer to `from`.
    pub fn redirect(mut self, from: &'a impl AsFd, to: RawFd) -> Self {
        self.redirects.push((from.as_fd(), to));
        self
    }

    /// Start the job.
    ///
    /// This returns as soon as the child has replaced its image with the new program, without
    /// waiting for it to finish. If the child could not set itself up or could not execute the
    /// program, it is reaped and the error it hit is returned, e.g. `OsError { "exec", ENOENT }`.
    pub fn spawn(&self) -> Result<Job, OsError> {
        // Everything the child needs is prepared here since it must not allocate.
        let child = ChildSetup {
            argv: self.argv.as_ptrs(),
            pgid: match self.group {
                ProcessGroup::Inherit => None,
                ProcessGroup::New => Some(ProcessId::new(0)),
                ProcessGroup::Join(pgid) => Some(pgid),
            },
            tty: self.tty,
            sigttou: SignalSet::with(&[SIGTTOU])?,
            default_action: if self.reset_signals {
                Some((
                    SignalAction::new(Disposition::Default)?,
                    SignalSet::with(&JOB_CONTROL_SIGNALS)?,
                ))
            } else {
                None
            },
            redirects: &self.redirects,
        };

        let (rx, tx) = pipe_cloexec()?;

        // SAFETY: the child only makes async-signal-safe calls before `exec` or `_exit`.
        #[allow(unused_unsafe)]
        let pid = match unsafe { fork() }? {
            ForkResult::Child => {
                let (status_fd, err) = match child.status_fd(tx.as_raw_fd()) {
                    Ok(status_fd) => (status_fd, child.run()),
                    Err(err) => (tx.as_raw_fd(), err),
                };
                report_failure(status_fd, err);
                _exit(127)
            }
            ForkResult::Parent(pid) => pid,
        };

        drop(tx);

        match read_child_failure(&rx) {
            Ok(None) => {}
            Ok(Some(err)) => {
                dev_debug!("cannot spawn {}: {err}", self.argv);
                reap(pid);
                return Err(err);
            }
            Err(err) => {
                // Whether the program runs is unknown, so it must not outlive this call.
                job_warn!("cannot read the exec status of {pid}: {err}");
                abandon(pid);
                return Err(err);
            }
        }

        let pgid = match self.group {
            ProcessGroup::Inherit => getpgrp(),
            ProcessGroup::New => pid,
            ProcessGroup::Join(pgid) => pgid,
        };
        let state = if self.tty.is_some() {
            JobState::Foregrounded
        } else {
            JobState::Spawned
        };

        job_debug!("spawned `{}` as {pid} in process group {pgid}", self.argv);

        Ok(Job::new(pid, pgid, state))
    }
}

struct ChildSetup<'s> {
    argv: Vec<*const c_char>,
    pgid: Option<ProcessId>,
    tty: Option<BorrowedFd<'s>>,
    sigttou: SignalSet,
    default_action: Option<(SignalAction, SignalSet)>,
    redirects: &'s [(BorrowedFd<'s>, RawFd)],
}

impl ChildSetup<'_> {
    /// Move the write end of the status pipe above every redirect target, so no redirect
    /// replaces it.
    fn status_fd(&self, fd: RawFd) -> Result<RawFd, OsError> {
        let Some(highest) = self.redirects.iter().map(|&(_, to)| to).max() else {
            return Ok(fd);
        };
        if fd > highest {
            return Ok(fd);
        }

        cerr("fcntl", unsafe {
            libc::fcntl(fd, libc::F_DUPFD_CLOEXEC, highest.saturating_add(1))
        })
    }

    /// Set up the child and replace its image. Only returns on failure.
    fn run(&self) -> OsError {
        match self.setup() {
            Ok(()) => execvp(&self.argv),
            Err(err) => err,
        }
    }

    fn setup(&self) -> Result<(), OsError> {
        if let Some(pgid) = self.pgid {
            setpgid(ProcessId::new(0), pgid)?;
        }

        if let Some(tty) = self.tty {
            // We are not in the foreground yet, so `SIGTTOU` would stop us.
            let original_mask = self.sigttou.block()?;
            let res = tty.tcsetpgrp(getpgrp());
            original_mask.set_mask()?;
            res?;
        }

        if let Some((action, signals)) = &self.default_action {
            for signal in JOB_CONTROL_SIGNALS {
                action.register(signal)?;
            }
            signals.unblock()?;
        }

        for (from, to) in self.redirects {
            dup2(from.as_raw_fd(), *to)?;
        }

        Ok(())
    }
}

fn report_failure(status_fd: RawFd, err: OsError) {
    let operation = CHILD_OPERATIONS
        .iter()
        .position(|&op| op == err.operation())
        .unwrap_or(CHILD_OPERATIONS.len() - 1) as c_int;

    let mut message = [0u8; MESSAGE_LEN];
    let (head, tail) = message.split_at_mut(MESSAGE_LEN / 2);
    head.copy_from_slice(&operation.to_ne_bytes());
    tail.copy_from_slice(&err.code().to_ne_bytes());

    // Nothing else can be done if this fails, the parent will see the program as started.
    let _ = write(status_fd, &message);
}

/// Kill a child whose state is unknown and reap it.
fn abandon(pid: ProcessId) {
    if let Err(err) = kill(pid, SIGKILL) {
        dev_debug!("cannot kill {pid}: {err}");
    }
    reap(pid);
}

fn reap(pid: ProcessId) {
    if let Err(err) = retry_interrupted(|| pid.wait(WaitOptions::new())) {
        job_warn!("cannot reap failed child {pid}: {err}");
    }
}

/// Read what the child reported. End of stream without data means the program was executed.
fn read_child_failure(rx: &FileDescriptor) -> Result<Option<OsError>, OsError> {
    let mut message = [0u8; MESSAGE_LEN];
    let mut filled = 0;

    while filled < MESSAGE_LEN {
        let n = retry_interrupted(|| rx.read(&mut message[filled..]))?;
        if n == 0 {
            break;
        }
        filled += n;
    }

    match filled {
        0 => Ok(None),
        MESSAGE_LEN => {
            let (head, tail) = message.split_at(MESSAGE_LEN / 2);
            let mut operation = [0u8; MESSAGE_LEN / 2];
            let mut code = [0u8; MESSAGE_LEN / 2];
            operation.copy_from_slice(head);
            code.copy_from_slice(tail);

            let operation = CHILD_OPERATIONS
                .get(c_int::from_ne_bytes(operation) as usize)
                .copied()
                .unwrap_or("exec");
            Ok(Some(OsError::new(operation, c_int::from_ne_bytes(code))))
        }
        _ => Err(OsError::new("exec", libc::EIO)),
    }
}
