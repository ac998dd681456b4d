use std::fmt::Display;

/// A process ID.
///
/// When passed to `kill` a negative value addresses the process group `-pid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProcessId(libc::pid_t);

impl ProcessId {
    pub const fn new(id: libc::pid_t) -> Self {
        Self(id)
    }

    pub const fn get(&self) -> libc::pid_t {
        self.0
    }

    /// The ID that `kill` interprets as "every process in the group led by `self`".
    pub const fn as_group(&self) -> Self {
        Self(self.0.wrapping_abs().wrapping_neg())
    }
}

impl From<libc::pid_t> for ProcessId {
    fn from(id: libc::pid_t) -> Self {
        Self(id)
    }
}

impl Display for ProcessId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
