//! # Logger
//!
//! Every rover log line goes to stdout and to the session's `rov_exec.log`, in the form
//!
//! ```text
//! [ 12.300000 INF] Replay started with 4 waypoints
//! [ 12.400000 DBG] rov_lib::nav_ctrl: Target 1 reached
//! ```
//!
//! where the first field is the number of seconds since the session started. Targets are only
//! printed for `DEBUG` and `TRACE` lines.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
use colored::{ColoredString, Colorize};
use log::{info, Level};
use thiserror::Error;

// Internal imports
use crate::session;

// Re-exports
pub use log::LevelFilter;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Targets which are capped below the requested level.
///
/// The connection layer logs every failed connection attempt, which floods the log while the
/// agent is down.
const CAPPED_TARGETS: &[(&str, LevelFilter)] = &[("comms_if::net", LevelFilter::Info)];

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum LoggerInitError {
    #[error("The rover must log at least `INFO`, `{0}` was requested")]
    InvalidMinLogLevel(LevelFilter),

    #[error("Could not open the session log file: {0}")]
    LogFileInitError(std::io::Error),

    #[error("Could not install the logger: {0}")]
    FernInitError(log::SetLoggerError),
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Install the rover logger for `session`.
///
/// `min_level` below `INFO` is rejected, the cycle summaries and mode changes are logged at
/// `INFO` and a run without them can't be reconstructed afterwards.
///
/// Can only succeed once per process.
pub fn logger_init(
    min_level: LevelFilter,
    session: &session::Session,
) -> Result<(), LoggerInitError> {
    if min_level < Level::Info {
        return Err(LoggerInitError::InvalidMinLogLevel(min_level));
    }

    let log_file =
        fern::log_file(&session.log_file_path).map_err(LoggerInitError::LogFileInitError)?;

    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{}",
                format_line(
                    session::get_elapsed_seconds(),
                    record.level(),
                    record.target(),
                    message
                )
            ))
        })
        .level(min_level);

    for (target, cap) in CAPPED_TARGETS {
        dispatch = dispatch.level_for(*target, min_level.min(*cap));
    }

    dispatch
        .chain(std::io::stdout())
        .chain(log_file)
        .apply()
        .map_err(LoggerInitError::FernInitError)?;

    info!(
        "Logging at {:?} since {} to {:?}",
        min_level,
        session::get_epoch(),
        session.log_file_path
    );

    Ok(())
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn format_line(
    elapsed_s: f64,
    level: Level,
    target: &str,
    message: &std::fmt::Arguments,
) -> String {
    if level > Level::Info {
        format!(
            "[{:10.6} {}] {}: {}",
            elapsed_s,
            level_tag(level),
            target,
            message
        )
    } else {
        format!("[{:10.6} {}] {}", elapsed_s, level_tag(level), message)
    }
}

fn level_tag(level: Level) -> ColoredString {
    match level {
        Level::Trace => "TRC".dimmed().italic(),
        Level::Debug => "DBG".dimmed(),
        Level::Info => "INF".normal(),
        Level::Warn => "WRN".yellow(),
        Level::Error => "ERR".red().bold(),
    }
}
