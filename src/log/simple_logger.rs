use std::io::{self, Write};

#[cfg(feature = "dev")]
use std::{fs::File, path::Path};

use log::{Level, Log};

enum Sink {
    Stderr,
    #[cfg(feature = "dev")]
    File(File),
    #[cfg(test)]
    Buffer(std::sync::Mutex<Vec<u8>>),
}

/// Writes every record as one line: the prefix, the level for warnings and errors, then the
/// message.
pub struct SimpleLogger {
    sink: Sink,
    prefix: &'static str,
}

impl SimpleLogger {
    pub fn to_stderr(prefix: &'static str) -> Self {
        Self {
            sink: Sink::Stderr,
            prefix,
        }
    }

    #[cfg(feature = "dev")]
    pub fn to_file<P: AsRef<Path>>(name: P, prefix: &'static str) -> io::Result<Self> {
        let file = std::fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(name)?;
        Ok(Self {
            sink: Sink::File(file),
            prefix,
        })
    }

    fn format_line(&self, record: &log::Record) -> String {
        match record.level() {
            level @ (Level::Error | Level::Warn) => format!(
                "{}{}: {}\n",
                self.prefix,
                level.as_str().to_lowercase(),
                record.args()
            ),
            _ => format!("{}{}\n", self.prefix, record.args()),
        }
    }
}

impl Log for SimpleLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level() && metadata.level() <= log::STATIC_MAX_LEVEL
    }

    fn log(&self, record: &log::Record) {
        // A single write per record keeps lines from several threads apart.
        let line = self.format_line(record);
        let _ = match &self.sink {
            Sink::Stderr => io::stderr().lock().write_all(line.as_bytes()),
            #[cfg(feature = "dev")]
            Sink::File(file) => (&*file).write_all(line.as_bytes()),
            #[cfg(test)]
            Sink::Buffer(buffer) => {
                buffer
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner)
                    .extend_from_slice(line.as_bytes());
                Ok(())
            }
        };
    }

    fn flush(&self) {
        let _ = match &self.sink {
            Sink::Stderr => io::stderr().flush(),
            #[cfg(feature = "dev")]
            Sink::File(file) => (&*file).flush(),
            #[cfg(test)]
            Sink::Buffer(_) => Ok(()),
        };
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use log::{Level, LevelFilter, Log};
    use pretty_assertions::assert_eq;

    use super::{Sink, SimpleLogger};

    fn buffered(prefix: &'static str) -> SimpleLogger {
        SimpleLogger {
            sink: Sink::Buffer(Mutex::new(Vec::new())),
            prefix,
        }
    }

    fn contents(logger: &SimpleLogger) -> String {
        let Sink::Buffer(buffer) = &logger.sink else {
            panic!("not a buffered logger");
        };
        String::from_utf8(buffer.lock().unwrap().clone()).unwrap()
    }

    fn log_at(logger: &SimpleLogger, level: Level, message: &str) {
        logger.log(
            &log::Record::builder()
                .args(format_args!("{message}"))
                .level(level)
                .target("unixy::job")
                .build(),
        );
    }

    #[test]
    fn enabled_follows_max_level() {
        let logger = SimpleLogger::to_stderr("unixy: ");
        let metadata = log::Metadata::builder().level(Level::Trace).build();

        log::set_max_level(LevelFilter::Trace);
        assert!(logger.enabled(&metadata));

        log::set_max_level(LevelFilter::Info);
        assert!(!logger.enabled(&metadata));
    }

    #[test]
    fn one_line_per_record() {
        let logger = buffered("unixy: ");
        log_at(&logger, Level::Info, "job 42 stopped by SIGTSTP");
        log_at(&logger, Level::Debug, "spawned `sleep 1` as 43");
        logger.flush();

        assert_eq!(
            contents(&logger),
            "unixy: job 42 stopped by SIGTSTP\nunixy: spawned `sleep 1` as 43\n"
        );
    }

    #[test]
    fn warnings_name_their_level() {
        let logger = buffered("unixy: ");
        log_at(&logger, Level::Warn, "cannot reap failed child 7");
        log_at(&logger, Level::Error, "cannot restore signal mask");

        assert_eq!(
            contents(&logger),
            "unixy: warn: cannot reap failed child 7\nunixy: error: cannot restore signal mask\n"
        );
    }
}
