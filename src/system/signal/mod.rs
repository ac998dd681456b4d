//! Utilities to handle signals.
mod handler;
mod set;

use libc::c_int;

pub use handler::{signal, Disposition, DispositionsGuard, SignalDispositions};
pub use set::{SignalAction, SignalSet};

pub type SignalNumber = c_int;

macro_rules! define_consts {
    ($($signal:ident,)*) => {
        pub mod consts {
            pub use libc::{$($signal,)*};
        }

        pub fn signal_name(signal: SignalNumber) -> Option<&'static str> {
            match signal {
                $(consts::$signal => Some(stringify!($signal)),)*
                _ => None,
            }
        }
    };
}

define_consts! {
    SIGINT,
    SIGQUIT,
    SIGTSTP,
    SIGTERM,
    SIGHUP,
    SIGALRM,
    SIGPIPE,
    SIGUSR1,
    SIGUSR2,
    SIGCHLD,
    SIGCONT,
    SIGWINCH,
    SIGTTIN,
    SIGTTOU,
    SIGKILL,
    SIGSTOP,
}

/// The signals an interactive job-control shell usually ignores and its children must get back.
pub const JOB_CONTROL_SIGNALS: [SignalNumber; 6] = [
    consts::SIGINT,
    consts::SIGQUIT,
    consts::SIGTSTP,
    consts::SIGTTIN,
    consts::SIGTTOU,
    consts::SIGCHLD,
];
