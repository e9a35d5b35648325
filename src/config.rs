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

//! Control loop settings
//!
//! There is no configuration file: every knob has a default in
//! [`crate::constants`] and can be overridden in code through the `with_*`
//! builders (tests shorten the tick, for instance).

use std::path::PathBuf;
use std::time::Duration;

use cf_error::{FanError, Result};

use crate::constants::{duty, paths, timing};
use crate::port::PortTiming;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlConfig {
    /// Time between control ticks
    pub tick_interval: Duration,
    /// How often the inter-tick wait checks for a shutdown request
    pub wait_slice: Duration,
    /// Duty written once on shutdown
    pub safety_duty: u8,
    /// EC image file sampled every tick
    pub snapshot_path: PathBuf,
    pub port_timing: PortTiming,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            tick_interval: timing::TICK_INTERVAL,
            wait_slice: timing::WAIT_SLICE,
            safety_duty: duty::SAFETY_PERCENT,
            snapshot_path: PathBuf::from(paths::EC_SNAPSHOT),
            port_timing: PortTiming::default(),
        }
    }
}

impl ControlConfig {
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    pub fn with_wait_slice(mut self, slice: Duration) -> Self {
        self.wait_slice = slice;
        self
    }

    pub fn with_safety_duty(mut self, percent: u8) -> Self {
        self.safety_duty = percent;
        self
    }

    pub fn with_snapshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_path = path.into();
        self
    }

    pub fn with_port_timing(mut self, timing: PortTiming) -> Self {
        self.port_timing = timing;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.safety_duty > duty::MAX_PERCENT {
            return Err(FanError::invalid_duty(self.safety_duty));
        }
        if self.wait_slice.is_zero() {
            return Err(FanError::invalid_argument("wait slice must be non-zero"));
        }
        if self.port_timing.max_attempts == 0 {
            return Err(FanError::invalid_argument("handshake needs at least one attempt"));
        }
        Ok(())
    }
}
