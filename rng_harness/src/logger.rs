use anyhow::{anyhow, Result};
use clap::ValueEnum;
use fern::colors::{Color, ColoredLevelConfig};
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

impl FromStr for LogLevel {
    type Err = &'static str;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "off" => Self::Off,
            "error" => Self::Error,
            "warn" => Self::Warn,
            "info" => Self::Info,
            "debug" => Self::Debug,
            "trace" => Self::Trace,
            _ => return Err("Invalid log level"),
        })
    }
}

impl Display for LogLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Off => "off",
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        };
        write!(f, "{}", name)
    }
}

/// Logger destinations and formatting
#[derive(Debug, Clone)]
pub struct LoggerOptions<'a> {
    pub level: LogLevel,
    pub disable_file_logging: bool,
    pub disable_log_color: bool,
    pub logs_path: &'a str,
    pub filename_log: &'a str,
}

/// Installs the global logger: stdout, plus a plain text file unless disabled.
pub fn init_logger(options: &LoggerOptions) -> Result<()> {
    let colors = ColoredLevelConfig::new()
        .error(Color::Red)
        .warn(Color::Yellow)
        .info(Color::Green)
        .debug(Color::Cyan)
        .trace(Color::BrightBlack);
    let use_color = !options.disable_log_color;

    let stdout = fern::Dispatch::new()
        .format(move |out, message, record| {
            let time = chrono::Local::now().format("%H:%M:%S%.3f");
            if use_color {
                out.finish(format_args!(
                    "[{}] [{}] [{}] {}",
                    time,
                    colors.color(record.level()),
                    record.target(),
                    message
                ))
            } else {
                out.finish(format_args!(
                    "[{}] [{}] [{}] {}",
                    time,
                    record.level(),
                    record.target(),
                    message
                ))
            }
        })
        .chain(std::io::stdout());

    let mut dispatch = fern::Dispatch::new()
        .level(options.level.into())
        // reqwest and hyper are far too chatty below warn
        .level_for("hyper", LevelFilter::Warn)
        .level_for("reqwest", LevelFilter::Warn)
        .chain(stdout);

    if !options.disable_file_logging {
        std::fs::create_dir_all(options.logs_path).map_err(|e| {
            anyhow!(
                "Failed to create logs directory '{}': {}",
                options.logs_path,
                e
            )
        })?;
        let file_path = Path::new(options.logs_path).join(options.filename_log);
        let file = fern::Dispatch::new()
            .format(|out, message, record| {
                out.finish(format_args!(
                    "[{}] [{}] [{}] {}",
                    chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                    record.level(),
                    record.target(),
                    message
                ))
            })
            .chain(fern::log_file(&file_path).map_err(|e| {
                anyhow!("Failed to open log file '{}': {}", file_path.display(), e)
            })?);
        dispatch = dispatch.chain(file);
    }

    dispatch
        .apply()
        .map_err(|e| anyhow!("Failed to install logger: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_parsing() {
        assert_eq!(<LogLevel as FromStr>::from_str("DEBUG").unwrap(), LogLevel::Debug);
        assert_eq!(<LogLevel as FromStr>::from_str("off").unwrap(), LogLevel::Off);
        assert!(<LogLevel as FromStr>::from_str("verbose").is_err());
        assert_eq!(LevelFilter::from(LogLevel::Warn), LevelFilter::Warn);
        assert_eq!(LogLevel::Trace.to_string(), "trace");
    }

    #[test]
    fn test_log_level_serde() {
        let json = serde_json::to_string(&LogLevel::Info).unwrap();
        assert_eq!(json, "\"info\"");
        let level: LogLevel = serde_json::from_str("\"trace\"").unwrap();
        assert_eq!(level, LogLevel::Trace);
    }
}
