//! Process, terminal and job-control primitives for building a Unix shell.
//!
//! The [`system`] module is a thin layer over the C library: every call either succeeds or fails
//! with an [`OsError`] naming the operation and carrying the untouched `errno`. On top of it,
//! [`job`] starts programs in process groups and moves terminal ownership between groups, and
//! [`TermGuard`] puts terminal attributes back once a job is done with them.
//!
//! Interrupted calls are never retried automatically. Use [`retry_interrupted`] where a call must
//! survive signals.
pub mod log;

pub mod common;
pub mod consts;
pub(crate) mod cutils;
pub mod job;
pub mod system;

pub use common::{Argv, OsError};
pub use cutils::retry_interrupted;
pub use job::{
    foreground, restore_foreground, spawn_job, wait_for, ForegroundGuard, Job, JobState,
    ProcessGroup, Spawn,
};
pub use self::log::UnixyLogger;
pub use system::{
    file::{FileDescriptor, Mode, OpenFlags},
    interface::ProcessId,
    signal::{Disposition, DispositionsGuard, SignalDispositions, SignalNumber},
    term::{isatty, TermGuard, Terminal, TerminalState, When},
    wait::{Wait, WaitOptions, WaitStatus},
};
