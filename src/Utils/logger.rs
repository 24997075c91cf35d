//! Logger setup for programs driving the compiler.
use crate::ik::ik_errors::IkError;
use simplelog::*;
use std::fs::File;
use std::str::FromStr;

/// `debug`, `info`, `warn`, `error`, `trace` or `off`
pub fn level_filter(level: &str) -> Result<LevelFilter, IkError> {
    LevelFilter::from_str(level)
        .map_err(|_| IkError::InvalidConfig(format!("unknown log level {}", level)))
}

/// Terminal logger at `level`, plus a file sink when `file` is given.
/// Returns `Ok(false)` when a logger was already installed.
pub fn init_logger(level: LevelFilter, file: Option<&str>) -> Result<bool, IkError> {
    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )];
    if let Some(path) = file {
        let sink = File::create(path)
            .map_err(|e| IkError::InvalidConfig(format!("cannot create log file {}: {}", path, e)))?;
        loggers.push(WriteLogger::new(level, Config::default(), sink));
    }
    match CombinedLogger::init(loggers) {
        Ok(()) => {
            log::info!("logging at {}", level);
            Ok(true)
        }
        Err(_) => Ok(false),
    }
}
