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

//! Continuous fan control loop
//!
//! Every tick the loop samples the EC image, asks the [`DutyController`] for
//! a decision and, when needed, writes the new duty through the port
//! protocol. Between ticks it waits in short slices so a shutdown request
//! is noticed quickly. On shutdown it writes the safety duty exactly
//! once and stops.

use std::thread;
use std::time::Instant;

use cf_error::Result;
use tracing::{error, info, warn};

use crate::config::ControlConfig;
use crate::controller::{DutyController, DutyDecision};
use crate::dump::SnapshotSource;
use crate::port::{PortChannel, PortIo};
use crate::signals::{self, ShutdownRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Stopping,
    Stopped,
}

/// What a single tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Snapshot unusable this cycle (wrong size); nothing decided
    Skipped,
    /// Dead zone, no target
    Held,
    /// Target equals the last commanded duty
    Unchanged { duty: u8 },
    /// New duty written to the EC
    Written { duty: u8 },
    /// Write timed out; retried next tick
    WriteFailed { duty: u8 },
}

/// How the loop ended after a shutdown request
#[derive(Debug)]
pub struct Shutdown {
    pub signal: Option<i32>,
    pub ticks: u64,
    pub safety_duty: u8,
    /// Result of the single safety write
    pub safety_write: Result<()>,
}

pub struct ControlLoop<P: PortIo, S: SnapshotSource> {
    port: PortChannel<P>,
    source: S,
    controller: DutyController,
    config: ControlConfig,
    last_commanded: Option<u8>,
    state: LoopState,
    ticks: u64,
}

impl<P: PortIo, S: SnapshotSource> ControlLoop<P, S> {
    pub fn new(port: PortChannel<P>, source: S, config: ControlConfig) -> Self {
        Self {
            port,
            source,
            controller: DutyController::new(),
            config,
            last_commanded: None,
            state: LoopState::Running,
            ticks: 0,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn last_commanded(&self) -> Option<u8> {
        self.last_commanded
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn port(&self) -> &PortChannel<P> {
        &self.port
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Sample, decide, and write if needed.
    ///
    /// Transient errors (a short snapshot, a write timeout) are reported
    /// through the outcome. Every other error stops the loop and is returned.
    pub fn tick(&mut self) -> Result<TickOutcome> {
        self.ticks += 1;

        let image = match self.source.snapshot() {
            Ok(image) => image,
            Err(e) if e.is_transient() => {
                warn!("skipping cycle: {}", e);
                return Ok(TickOutcome::Skipped);
            }
            Err(e) => {
                error!("unable to read EC from sysfs: {}", e);
                self.state = LoopState::Stopped;
                return Err(e);
            }
        };

        let cpu_temp = image.cpu_temp();
        let gpu_temp = image.gpu_temp();
        let observed = image.fan_duty();

        let DutyDecision::Set(target) = self.controller.decide(cpu_temp, gpu_temp, observed) else {
            return Ok(TickOutcome::Held);
        };

        // A stuck non-zero fan is corrected even if zero was already sent
        let forced_zero = target == 0 && observed != 0;
        if self.last_commanded == Some(target) && !forced_zero {
            return Ok(TickOutcome::Unchanged { duty: target });
        }

        match self.port.write_fan_duty(target) {
            Ok(()) => {
                info!(
                    cpu_temp,
                    gpu_temp,
                    duty = target,
                    "CPU={}°C, GPU={}°C, auto fan duty to {}%",
                    cpu_temp,
                    gpu_temp,
                    target
                );
                self.last_commanded = Some(target);
                Ok(TickOutcome::Written { duty: target })
            }
            Err(e) if e.is_transient() => {
                warn!("fan duty write to {}% failed, retrying next cycle: {}", target, e);
                Ok(TickOutcome::WriteFailed { duty: target })
            }
            Err(e) => {
                error!("fan duty write to {}% failed: {}", target, e);
                self.state = LoopState::Stopped;
                Err(e)
            }
        }
    }

    /// Run ticks until `shutdown` is requested, then apply the safety duty once.
    ///
    /// A fatal tick error ends the loop with that error and no further port
    /// access, not even the safety write. This holds when a shutdown was
    /// requested while the failing tick ran.
    pub fn run(&mut self, shutdown: &ShutdownRequest) -> Result<Shutdown> {
        info!(
            "Fan control loop starting (tick {:?}, snapshot {})",
            self.config.tick_interval,
            self.config.snapshot_path.display()
        );

        while !shutdown.is_requested() {
            self.tick()?;
            if !self.wait_for_next_tick(shutdown) {
                break;
            }
        }

        Ok(self.shut_down(shutdown.signal()))
    }

    /// Sleep out the tick interval in slices. Returns false once shutdown is requested.
    fn wait_for_next_tick(&self, shutdown: &ShutdownRequest) -> bool {
        let deadline = Instant::now() + self.config.tick_interval;
        loop {
            if shutdown.is_requested() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            thread::sleep(self.config.wait_slice.min(deadline - now));
        }
    }

    fn shut_down(&mut self, signal: Option<i32>) -> Shutdown {
        self.state = LoopState::Stopping;
        let safety_duty = self.config.safety_duty;
        match signal {
            Some(signum) => info!(
                "ec on signal: {}, resetting to {}%",
                signals::signal_name(signum),
                safety_duty
            ),
            None => info!("Fan control loop stopping, resetting to {}%", safety_duty),
        }

        let safety_write = self.port.write_fan_duty(safety_duty);
        match &safety_write {
            Ok(()) => self.last_commanded = Some(safety_duty),
            Err(e) => error!("Failed to apply safety duty {}%: {}", safety_duty, e),
        }

        self.state = LoopState::Stopped;
        info!("worker quit after {} ticks", self.ticks);
        Shutdown { signal, ticks: self.ticks, safety_duty, safety_write }
    }
}
