// Dext Plugin Runtime - Systemd-Style Logger
// Copyright (C) 2025 Akaere Networks
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Systemd-style logging for the plugin runtime
//!
//! Every component logs through the `log_*!` macros exported at the crate
//! root. Plugins reach the same sink through the Lua logging API, so plugin
//! chatter and runtime messages end up in one stream.
//!
//! Output goes to stderr. When stdout carries query results (the CLI prints
//! JSON there) the two never interleave.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

/// Log levels following systemd priority conventions
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogLevel {
    Error = 3,
    Warning = 4,
    Notice = 5,
    Info = 6,
    Debug = 7,
}

impl LogLevel {
    pub fn from_priority(priority: u8) -> Self {
        match priority {
            0..=3 => LogLevel::Error,
            4 => LogLevel::Warning,
            5 => LogLevel::Notice,
            7 => LogLevel::Debug,
            _ => LogLevel::Info,
        }
    }

    pub fn priority(self) -> u8 {
        self as u8
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "ERR",
            LogLevel::Warning => "WARNING",
            LogLevel::Notice => "NOTICE",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
        }
    }

    /// Get color code for terminal output
    pub fn color_code(self) -> &'static str {
        match self {
            LogLevel::Error => "\x1b[31m",
            LogLevel::Warning => "\x1b[33m",
            LogLevel::Notice => "\x1b[36m",
            LogLevel::Info => "\x1b[32m",
            LogLevel::Debug => "\x1b[37m",
        }
    }
}

/// Logger configuration
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// Minimum log level to output
    pub min_level: LogLevel,
    /// Whether to use colors in output
    pub use_colors: bool,
    /// Whether to include timestamps
    pub include_timestamp: bool,
    /// Whether to include the emitting module path
    pub include_target: bool,
    /// Whether to format for journald (structured format)
    pub journald_format: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Info,
            use_colors: atty::is(atty::Stream::Stderr),
            include_timestamp: true,
            include_target: false,
            journald_format: false,
        }
    }
}

static LOGGER: Mutex<Option<Logger>> = Mutex::new(None);

#[derive(Debug)]
pub struct Logger {
    config: LoggerConfig,
    min_level: AtomicU8,
}

impl Logger {
    pub fn new(config: LoggerConfig) -> Self {
        Self {
            min_level: AtomicU8::new(config.min_level.priority()),
            config,
        }
    }

    /// Install the global logger. Fails if one is already installed.
    pub fn init(config: LoggerConfig) -> Result<(), LoggerError> {
        let mut global_logger = LOGGER.lock().map_err(|_| LoggerError::InitError)?;
        if global_logger.is_some() {
            return Err(LoggerError::AlreadyInitialized);
        }
        *global_logger = Some(Self::new(config));
        Ok(())
    }

    pub fn set_min_level(&self, level: LogLevel) {
        self.min_level.store(level.priority(), Ordering::Relaxed);
    }

    pub fn should_log(&self, level: LogLevel) -> bool {
        level.priority() <= self.min_level.load(Ordering::Relaxed)
    }

    pub fn log(&self, level: LogLevel, target: &str, message: &str) {
        if !self.should_log(level) {
            return;
        }

        let timestamp = self.config.include_timestamp.then(|| {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs()
        });

        let formatted = if self.config.journald_format {
            self.format_journald(level, target, message, timestamp)
        } else {
            self.format_terminal(level, target, message, timestamp)
        };

        eprintln!("{}", formatted);
    }

    fn format_journald(
        &self,
        level: LogLevel,
        target: &str,
        message: &str,
        timestamp: Option<u64>,
    ) -> String {
        let mut output = format!("PRIORITY={}\nMESSAGE={}\n", level.priority(), message);

        if self.config.include_target && !target.is_empty() {
            output.push_str(&format!("CODE_FILE={}\n", target));
        }

        if let Some(ts) = timestamp {
            output.push_str(&format!("_SOURCE_REALTIME_TIMESTAMP={}\n", ts * 1_000_000));
        }

        output.push_str("SYSLOG_IDENTIFIER=dext-runtime\n");
        output
    }

    fn format_terminal(
        &self,
        level: LogLevel,
        target: &str,
        message: &str,
        timestamp: Option<u64>,
    ) -> String {
        let mut output = String::new();

        if let Some(ts) = timestamp {
            let datetime = chrono::DateTime::from_timestamp(ts as i64, 0)
                .unwrap_or_default()
                .format("%Y-%m-%d %H:%M:%S");
            output.push_str(&format!("{} ", datetime));
        }

        // Lifecycle lines ("[   OK   ] ...") carry their own status marker
        let has_status = message.starts_with("[*]") || message.starts_with("[   ");
        if has_status {
            if self.config.use_colors {
                output.push_str(&format!("{}{}\x1b[0m", level.color_code(), message));
            } else {
                output.push_str(message);
            }
        } else if self.config.use_colors {
            output.push_str(&format!(
                "{}[{}]\x1b[0m {}",
                level.color_code(),
                level.as_str(),
                message
            ));
        } else {
            output.push_str(&format!("[{}] {}", level.as_str(), message));
        }

        if self.config.include_target && !target.is_empty() {
            output.push_str(&format!(" ({})", target));
        }

        output
    }
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::core::logger::log_with_level($crate::core::logger::LogLevel::Error, module_path!(), &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::core::logger::log_with_level($crate::core::logger::LogLevel::Warning, module_path!(), &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_notice {
    ($($arg:tt)*) => {
        $crate::core::logger::log_with_level($crate::core::logger::LogLevel::Notice, module_path!(), &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::core::logger::log_with_level($crate::core::logger::LogLevel::Info, module_path!(), &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        $crate::core::logger::log_with_level($crate::core::logger::LogLevel::Debug, module_path!(), &format!($($arg)*))
    };
}

/// Route a message to the global logger, if one is installed
pub fn log_with_level(level: LogLevel, target: &str, message: &str) {
    if let Ok(logger_guard) = LOGGER.lock() {
        if let Some(ref logger) = *logger_guard {
            logger.log(level, target, message);
        }
    }
}

/// `[*] Starting <service>...`
pub fn log_init_start(service_name: &str) {
    let message = format!("[*] Starting {}...", service_name);
    log_with_level(LogLevel::Notice, module_path!(), &message);
}

/// `[   OK   ] Starting <service> (<details>)`
pub fn log_init_ok_with_details(service_name: &str, details: &str) {
    let message = format!("[   OK   ] Starting {} ({})", service_name, details);
    log_with_level(LogLevel::Info, module_path!(), &message);
}

/// `[   WARN ] Starting <service> - <warning>`
pub fn log_init_warn(service_name: &str, warning: &str) {
    let message = format!("[   WARN ] Starting {} - {}", service_name, warning);
    log_with_level(LogLevel::Warning, module_path!(), &message);
}

#[derive(Debug, thiserror::Error)]
pub enum LoggerError {
    #[error("Logger already initialized")]
    AlreadyInitialized,
    #[error("Failed to initialize logger")]
    InitError,
}

/// Initialize logger from CLI arguments
pub fn init_from_args(debug: bool, trace: bool, journald: bool) -> Result<(), LoggerError> {
    let min_level = if debug || trace {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    let config = LoggerConfig {
        min_level,
        use_colors: atty::is(atty::Stream::Stderr) && !journald,
        include_timestamp: !journald,
        include_target: trace,
        journald_format: journald,
    };

    Logger::init(config)
}
