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

//! EC register map and raw value conversions
//!
//! The EC exposes temperatures as plain °C bytes, the fan duty as a 0-255
//! byte and the fan speed as a 16-bit tachometer period. Everything here is
//! pure arithmetic over those bytes.

use cf_error::{FanError, Result};
use serde::{Deserialize, Serialize};

use crate::constants::{duty, registers};

/// Convert a raw duty byte (0-255) to a percentage (0-100), rounding half up
pub fn duty_from_raw(raw: u8) -> u8 {
    ((raw as u32 * 100 + 127) / 255) as u8
}

/// Convert a duty percentage to the raw byte the EC expects
pub fn raw_from_duty(percent: u8) -> Result<u8> {
    if percent > duty::MAX_PERCENT {
        return Err(FanError::invalid_duty(percent));
    }
    Ok(((percent as u32 * 255 + 50) / 100) as u8)
}

/// Convert the raw tachometer bytes to RPM. A zero count means stalled or unknown.
pub fn rpm_from_raw(hi: u8, lo: u8) -> u32 {
    let raw = ((hi as u32) << 8) | lo as u32;
    if raw > 0 {
        registers::RPM_DIVIDEND / raw
    } else {
        0
    }
}

/// Snapshot of the full 256-byte EC register space
#[derive(Clone, PartialEq, Eq)]
pub struct EcImage([u8; registers::IMAGE_SIZE]);

impl EcImage {
    pub fn new(bytes: [u8; registers::IMAGE_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn get(&self, address: u8) -> u8 {
        self.0[address as usize]
    }

    pub fn cpu_temp(&self) -> u8 {
        self.get(registers::CPU_TEMP)
    }

    pub fn gpu_temp(&self) -> u8 {
        self.get(registers::GPU_TEMP)
    }

    /// Fan duty in percent
    pub fn fan_duty(&self) -> u8 {
        duty_from_raw(self.get(registers::FAN_DUTY))
    }

    pub fn fan_rpm(&self) -> u32 {
        rpm_from_raw(self.get(registers::FAN_RPM_HI), self.get(registers::FAN_RPM_LO))
    }

    pub fn status(&self) -> FanStatus {
        FanStatus {
            duty: self.fan_duty(),
            rpms: self.fan_rpm(),
            cpu_temp_cels: self.cpu_temp(),
            gpu_temp_cels: self.gpu_temp(),
        }
    }
}

impl std::fmt::Debug for EcImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EcImage")
            .field("cpu_temp", &self.cpu_temp())
            .field("gpu_temp", &self.gpu_temp())
            .field("fan_duty", &self.fan_duty())
            .field("fan_rpm", &self.fan_rpm())
            .finish()
    }
}

/// Fan and temperature readings, as printed by the one-shot dump
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FanStatus {
    pub duty: u8,
    pub rpms: u32,
    pub cpu_temp_cels: u8,
    pub gpu_temp_cels: u8,
}
