#![forbid(unsafe_code)]
pub use argv::Argv;
pub use error::OsError;

mod argv;
pub mod error;
