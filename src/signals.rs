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

//! Termination signal handling
//!
//! Handlers are registered through `signal_hook::flag`, so a delivered
//! signal only records its number and raises the shutdown flag. The control
//! loop polls the flag and performs the safety write itself.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use cf_error::Result;
use signal_hook::consts::signal::{SIGALRM, SIGHUP, SIGINT, SIGPIPE, SIGQUIT, SIGTERM, SIGUSR1, SIGUSR2};
use signal_hook::flag;
use tracing::debug;

/// Signals that stop the daemon and reset the fan
pub const SHUTDOWN_SIGNALS: [i32; 8] = [SIGHUP, SIGINT, SIGQUIT, SIGPIPE, SIGALRM, SIGTERM, SIGUSR1, SIGUSR2];

/// Shared stop request for the control loop
///
/// Clones share the same flags, so one can be handed to a signal handler or
/// another thread while the loop polls the original.
#[derive(Debug, Clone, Default)]
pub struct ShutdownRequest {
    requested: Arc<AtomicBool>,
    /// Number of the last shutdown signal, 0 if none
    signal: Arc<AtomicUsize>,
}

impl ShutdownRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the loop to stop without a signal
    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Last shutdown signal received, if any
    pub fn signal(&self) -> Option<i32> {
        match self.signal.load(Ordering::SeqCst) {
            0 => None,
            signum => i32::try_from(signum).ok(),
        }
    }

    /// Route every signal in [`SHUTDOWN_SIGNALS`] to this request
    pub fn install_handlers(&self) -> Result<()> {
        for signum in SHUTDOWN_SIGNALS {
            // Signal number first, so it is set once the flag is seen
            flag::register_usize(signum, Arc::clone(&self.signal), signum as usize)?;
            flag::register(signum, Arc::clone(&self.requested))?;
        }
        debug!("Shutdown handlers installed for {} signals", SHUTDOWN_SIGNALS.len());
        Ok(())
    }
}

/// Name of a shutdown signal, e.g. "SIGTERM"
pub fn signal_name(signum: i32) -> String {
    let name = match signum {
        SIGHUP => "SIGHUP",
        SIGINT => "SIGINT",
        SIGQUIT => "SIGQUIT",
        SIGPIPE => "SIGPIPE",
        SIGALRM => "SIGALRM",
        SIGTERM => "SIGTERM",
        SIGUSR1 => "SIGUSR1",
        SIGUSR2 => "SIGUSR2",
        _ => return format!("signal {}", signum),
    };
    name.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use signal_hook::low_level;

    #[test]
    #[serial]
    fn test_signal_raises_shutdown_request() {
        let shutdown = ShutdownRequest::new();
        shutdown.install_handlers().unwrap();
        assert!(!shutdown.is_requested());

        low_level::raise(SIGUSR1).unwrap();

        assert!(shutdown.is_requested());
        assert_eq!(shutdown.signal(), Some(SIGUSR1));
    }

    #[test]
    fn test_request_without_signal() {
        let shutdown = ShutdownRequest::new();
        assert_eq!(shutdown.signal(), None);
        assert!(!shutdown.is_requested());

        let handle = shutdown.clone();
        handle.request();
        assert!(shutdown.is_requested());
        assert_eq!(shutdown.signal(), None);
    }

    #[test]
    fn test_signal_name() {
        assert_eq!(signal_name(SIGTERM), "SIGTERM");
        assert_eq!(signal_name(SIGUSR2), "SIGUSR2");
        assert_eq!(signal_name(9), "signal 9");
    }

    #[test]
    fn test_shutdown_signals_include_term_and_int() {
        assert!(SHUTDOWN_SIGNALS.contains(&SIGTERM));
        assert!(SHUTDOWN_SIGNALS.contains(&SIGINT));
        assert!(!SHUTDOWN_SIGNALS.contains(&signal_hook::consts::signal::SIGKILL));
    }
}
