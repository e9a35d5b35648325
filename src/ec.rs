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

//! One-shot EC operations
//!
//! Query and set paths used by the command line. These talk to the EC over
//! the port protocol directly; only the control loop samples through debugfs.

use cf_error::Result;
use tracing::info;

use crate::constants::registers;
use crate::port::{PortChannel, PortIo};
use crate::registers::{duty_from_raw, rpm_from_raw, FanStatus};

/// Read duty, RPM and both temperatures register by register
pub fn query_status<P: PortIo>(port: &mut PortChannel<P>) -> Result<FanStatus> {
    let duty = duty_from_raw(port.read_register(registers::FAN_DUTY)?);
    let rpm_hi = port.read_register(registers::FAN_RPM_HI)?;
    let rpm_lo = port.read_register(registers::FAN_RPM_LO)?;
    let cpu_temp_cels = port.read_register(registers::CPU_TEMP)?;
    let gpu_temp_cels = port.read_register(registers::GPU_TEMP)?;

    Ok(FanStatus {
        duty,
        rpms: rpm_from_raw(rpm_hi, rpm_lo),
        cpu_temp_cels,
        gpu_temp_cels,
    })
}

/// Command a duty, then read back the resulting status
pub fn set_fan<P: PortIo>(port: &mut PortChannel<P>, percent: u8) -> Result<FanStatus> {
    info!("Change fan duty to {}%", percent);
    port.write_fan_duty(percent)?;
    query_status(port)
}

/// Pretty JSON rendering of a status, as printed by the dump command
pub fn status_json(status: &FanStatus) -> Result<String> {
    Ok(serde_json::to_string_pretty(status)?)
}
