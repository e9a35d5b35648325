/*
 * This file is part of clevo-fan.
 *
 * Copyright (C) 2025 clevo-fan contributors
 *
 * clevo-fan is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * clevo-fan is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with clevo-fan. If not, see <https://www.gnu.org/licenses/>.
 */

//! Tracing subscriber setup
//!
//! The daemon logs to the systemd journal when it is available and to stderr
//! otherwise. One-shot commands always log to stderr, keeping stdout for the
//! JSON status.

use std::path::Path;

use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::constants::{env, paths};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget {
    /// Short-lived query/set invocation
    OneShot,
    /// Long-running control loop
    Daemon,
}

/// Where log records ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogSink {
    Journald,
    Stderr,
}

/// Log filter from the environment, falling back to the default level
pub fn log_filter() -> String {
    std::env::var(env::LOG_LEVEL).unwrap_or_else(|_| env::DEFAULT_LOG_LEVEL.to_string())
}

/// Preferred sink for `target`, given whether the journal socket exists
pub fn preferred_sink(target: LogTarget, journald_available: bool) -> LogSink {
    match target {
        LogTarget::Daemon if journald_available => LogSink::Journald,
        _ => LogSink::Stderr,
    }
}

/// Install the global subscriber and return the sink actually used
pub fn init_logging(target: LogTarget) -> LogSink {
    let level = log_filter();

    let journald_available = Path::new(paths::JOURNALD_SOCKET).exists();
    if preferred_sink(target, journald_available) == LogSink::Journald {
        match tracing_journald::layer() {
            Ok(journald_layer) => {
                tracing_subscriber::registry()
                    .with(journald_layer)
                    .with(EnvFilter::new(&level))
                    .init();
                return LogSink::Journald;
            }
            Err(e) => {
                eprintln!("Failed to create journald layer: {}, falling back to stderr", e);
            }
        }
    }

    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::new(&level))
        .init();
    LogSink::Stderr
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_preferred_sink() {
        assert_eq!(preferred_sink(LogTarget::Daemon, true), LogSink::Journald);
        assert_eq!(preferred_sink(LogTarget::Daemon, false), LogSink::Stderr);
        // one-shot output stays on the terminal
        assert_eq!(preferred_sink(LogTarget::OneShot, true), LogSink::Stderr);
    }

    #[test]
    #[serial]
    fn test_log_filter_default() {
        std::env::remove_var(env::LOG_LEVEL);
        assert_eq!(log_filter(), "info");
    }

    #[test]
    #[serial]
    fn test_log_filter_from_env() {
        std::env::set_var(env::LOG_LEVEL, "debug");
        assert_eq!(log_filter(), "debug");
        std::env::remove_var(env::LOG_LEVEL);
    }
}
