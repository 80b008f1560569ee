//! Logger initialisation for the navigation executables

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
use log::{self, info};
use fern;
use colored::{ColoredString, Colorize};
use thiserror::Error;

// Internal imports
use crate::session;

// Re-exports
pub use log::LevelFilter;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors associated with initialising the logger.
#[derive(Debug, Error)]
pub enum LoggerInitError {
    #[error("Expected a log level of at least `INFO`, found `{0}`")]
    InvalidMinLogLevel(log::LevelFilter),

    #[error("Error initialising the log file: {0}")]
    LogFileInitError(std::io::Error),

    #[error("An error occured while setting up the logger: {0}")]
    FernInitError(log::SetLoggerError)
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Initialise the logger for this execution.
///
/// Every line is stamped with the number of seconds elapsed since the session started, and is
/// written both to stdout and to the session's log file.
///
/// # Notes
///
/// - `min_level` must be `Info` or more verbose, a navigation run without phase transitions in
///   the log cannot be reconstructed afterwards.
///
/// # Safety
///
/// - This function must only be called once to prevent corrupting logs.
pub fn logger_init(
    min_level: self::LevelFilter,
    session: &session::Session
) -> Result<(), LoggerInitError> {

    if min_level < log::Level::Info {
        return Err(LoggerInitError::InvalidMinLogLevel(min_level))
    }

    let log_file = fern::log_file(session.log_file_path.clone())
        .map_err(LoggerInitError::LogFileInitError)?;

    // Per-cycle trace output would drown the console, it only goes to the file
    let console = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{:10.6} {}] {}",
                session::get_elapsed_seconds(),
                level_to_str(record.level()),
                with_target(record, message)
            ))
        })
        .level(min_level.min(LevelFilter::Debug))
        .chain(std::io::stdout());

    let file = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{:10.6} {}] {}",
                session::get_elapsed_seconds(),
                plain_level_tag(record.level()),
                with_target(record, message)
            ))
        })
        .chain(log_file);

    fern::Dispatch::new()
        .level(min_level)
        .level_for("serialport", LevelFilter::Info)
        .chain(console)
        .chain(file)
        .apply()
        .map_err(LoggerInitError::FernInitError)?;

    info!("Logging initialised");
    if let Some(epoch) = session::get_epoch() {
        info!("    Session epoch: {}", epoch);
    }
    info!("    Log level: {:?}", min_level);
    info!("    Log file path: {:?}", session.log_file_path);

    Ok(())
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Prefix the message with its target for debug and trace records, targets are only useful when
/// digging through that output.
fn with_target(record: &log::Record, message: &std::fmt::Arguments) -> String {
    if record.level() > log::Level::Info {
        format!("{}: {}", record.target(), message)
    }
    else {
        message.to_string()
    }
}

/// Get the coloured tag of a log level
fn level_to_str(level: log::Level) -> ColoredString {
    let tag = plain_level_tag(level);

    match level {
        log::Level::Trace => tag.dimmed().italic(),
        log::Level::Debug => tag.dimmed(),
        log::Level::Info  => tag.normal(),
        log::Level::Warn  => tag.yellow(),
        log::Level::Error => tag.red().bold()
    }
}

/// Get the tag of a log level as written to the log file
fn plain_level_tag(level: log::Level) -> &'static str {
    match level {
        log::Level::Trace => "TRC",
        log::Level::Debug => "DBG",
        log::Level::Info  => "INF",
        log::Level::Warn  => "WRN",
        log::Level::Error => "ERR"
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_plain_tags_are_fixed_width() {
        let levels = [
            log::Level::Trace,
            log::Level::Debug,
            log::Level::Info,
            log::Level::Warn,
            log::Level::Error
        ];

        for l in levels.iter() {
            assert_eq!(plain_level_tag(*l).len(), 3);
        }
        assert_eq!(plain_level_tag(log::Level::Warn), "WRN");
    }
}
