#![allow(unused_macros)]
//! Logging for this crate, routed through the `log` facade.
//!
//! Records about jobs are sent to the `unixy::job` target and can be consumed by any logger the
//! host installs. Developer diagnostics go to `unixy::dev` and are only emitted when the `dev`
//! feature is enabled.
use self::simple_logger::SimpleLogger;
use std::ops::Deref;

mod simple_logger;

macro_rules! logger_macro {
    ($name:ident is $rule_level:ident to $target:expr, $d:tt) => {
        macro_rules! $name {
            ($d($d arg:tt)+) => (::log::log!(target: $target, ::log::Level::$rule_level, $d($d arg)+));
        }

        pub(crate) use $name;
    };
    ($name:ident is $rule_level:ident to $target:expr) => {
        logger_macro!($name is $rule_level to $target, $);
    };
}

logger_macro!(job_warn is Warn to "unixy::job");
logger_macro!(job_info is Info to "unixy::job");
logger_macro!(job_debug is Debug to "unixy::job");

macro_rules! dev_logger_macro {
    ($name:ident is $rule_level:ident to $target:expr, $d:tt) => {
        macro_rules! $name {
            ($d($d arg:tt)+) => {
                if std::cfg!(feature = "dev") {
                    (::log::log!(
                        target: $target,
                        ::log::Level::$rule_level,
                        "{}: {}",
                        std::panic::Location::caller(),
                        format_args!($d($d arg)+)
                    ));
                }
            };
        }

        pub(crate) use $name;
    };
    ($name:ident is $rule_level:ident to $target:expr) => {
        dev_logger_macro!($name is $rule_level to $target, $);
    };
}

dev_logger_macro!(dev_warn is Warn to "unixy::dev");
dev_logger_macro!(dev_debug is Debug to "unixy::dev");

/// A logger that dispatches records to a different sink per target prefix.
#[derive(Default)]
pub struct UnixyLogger(Vec<(String, Box<dyn log::Log>)>);

impl UnixyLogger {
    /// Job records go to stderr, each line starting with `prefix`.
    ///
    /// With the `dev` feature, developer diagnostics are appended to the file named by the
    /// `UNIXY_DEV_LOGS` variable at build time, or to `unixy-dev-<pid>.log` in the temporary
    /// directory.
    pub fn new(prefix: &'static str) -> Self {
        let mut logger: Self = Default::default();

        logger.add_logger("unixy::job", SimpleLogger::to_stderr(prefix));

        #[cfg(feature = "dev")]
        {
            let path: std::path::PathBuf = option_env!("UNIXY_DEV_LOGS")
                .map(|s| s.into())
                .unwrap_or_else(|| {
                    std::env::temp_dir().join(format!("unixy-dev-{}.log", std::process::id()))
                });
            match SimpleLogger::to_file(&path, "") {
                Ok(file_logger) => logger.add_logger("unixy::dev", file_logger),
                Err(err) => {
                    use std::io::Write;
                    let _ = writeln!(
                        std::io::stderr(),
                        "{prefix}cannot open {}: {err}",
                        path.display()
                    );
                }
            }
        }

        logger
    }

    /// Install this logger as the global `log` logger.
    pub fn into_global_logger(self, level: log::LevelFilter) -> Result<(), log::SetLoggerError> {
        log::set_boxed_logger(Box::new(self)).map(|()| log::set_max_level(level))
    }

    /// Add a logger for a specific prefix to the stack
    fn add_logger(
        &mut self,
        prefix: impl ToString + Deref<Target = str>,
        logger: impl log::Log + 'static,
    ) {
        let prefix = if prefix.ends_with("::") {
            prefix.to_string()
        } else {
            // given a prefix `my::prefix`, we want to match `my::prefix::somewhere`
            // but not `my::prefix_to_somewhere`
            format!("{}::", prefix.to_string())
        };
        self.0.push((prefix, Box::new(logger)))
    }

    fn matches(prefix: &str, target: &str) -> bool {
        target == &prefix[..prefix.len() - 2] || target.starts_with(prefix)
    }
}

impl log::Log for UnixyLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level() && metadata.level() <= log::STATIC_MAX_LEVEL
    }

    fn log(&self, record: &log::Record) {
        for (prefix, l) in self.0.iter() {
            if Self::matches(prefix, record.target()) {
                l.log(record);
            }
        }
    }

    fn flush(&self) {
        for (_, l) in self.0.iter() {
            l.flush();
        }
    }
}
