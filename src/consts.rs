//! Native constant values a host binding needs to talk to this crate.
//!
//! Every value comes from the platform's C library, so they are only meaningful on the machine
//! the crate was built for.
macro_rules! define_consts {
    ($($name:ident,)*) => {
        pub use libc::{$($name,)*};

        /// The names of all the constants in this module.
        pub const NAMES: &[&str] = &[$(stringify!($name),)*];

        /// Look up the value of a constant by name.
        pub fn lookup(name: &str) -> Option<i64> {
            match name {
                $(stringify!($name) => Some($name as i64),)*
                _ => None,
            }
        }
    };
}

define_consts! {
    STDIN_FILENO,
    STDOUT_FILENO,
    STDERR_FILENO,
    SIGINT,
    SIGCONT,
    SIGQUIT,
    SIGTSTP,
    SIGTTIN,
    SIGTTOU,
    SIGCHLD,
    O_RDONLY,
    O_WRONLY,
    O_RDWR,
    O_APPEND,
    O_CREAT,
    O_TRUNC,
    S_IWUSR,
    S_IRUSR,
    S_IRGRP,
    TCSADRAIN,
    WUNTRACED,
    WNOHANG,
    ECHILD,
    SIG_IGN,
    SIG_DFL,
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use pretty_assertions::assert_eq;

    use super::{lookup, NAMES};

    #[test]
    fn values_come_from_libc() {
        assert_eq!(lookup("STDERR_FILENO"), Some(2));
        assert_eq!(lookup("SIGTTOU"), Some(libc::SIGTTOU as i64));
        assert_eq!(lookup("O_CREAT"), Some(libc::O_CREAT as i64));
        assert_eq!(lookup("S_IRUSR"), Some(libc::S_IRUSR as i64));
        assert_eq!(lookup("WNOHANG"), Some(libc::WNOHANG as i64));
        assert_eq!(lookup("SIG_DFL"), Some(0));
        assert_eq!(lookup("SIG_IGN"), Some(1));
    }

    #[test]
    fn unknown_names() {
        assert_eq!(lookup("SIGFOO"), None);
        assert_eq!(lookup("sigint"), None);
        assert_eq!(lookup(""), None);
    }

    #[test]
    fn names_are_complete() {
        assert_eq!(NAMES.len(), 25);
        let unique: HashSet<_> = NAMES.iter().collect();
        assert_eq!(unique.len(), NAMES.len());
        assert!(NAMES.iter().all(|name| lookup(name).is_some()));
    }
}
