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

//! Constants for clevo-fan
//!
//! Centralizes the EC port numbers, protocol bytes, register map, duty ladder
//! and timing defaults. Other modules refer to these instead of literals.

use std::time::Duration;

/// System paths
pub mod paths {
    /// debugfs image of the EC registers, provided by the `ec_sys` module
    pub const EC_SNAPSHOT: &str = "/sys/kernel/debug/ec/ec0/io";

    /// Kernel module exposing [`EC_SNAPSHOT`]
    pub const EC_SYS_MODULE: &str = "ec_sys";

    /// Present when systemd-journald is accepting native log records
    pub const JOURNALD_SOCKET: &str = "/run/systemd/journal/socket";
}

/// EC port addresses, command bytes and status bits
pub mod ports {
    /// Data port
    pub const EC_DATA: u16 = 0x62;

    /// Status (read) / command (write) port
    pub const EC_COMMAND: u16 = 0x66;

    /// Command byte starting a register read
    pub const READ_CMD: u8 = 0x80;

    /// Command byte starting a fan duty write
    pub const WRITE_CMD: u8 = 0x99;

    /// Sub-address following [`WRITE_CMD`] when setting the fan duty
    pub const FAN_DUTY_SUB_ADDR: u8 = 0x01;

    /// Status bit: input buffer full (EC has not consumed our last byte)
    pub const IBF_BIT: u8 = 1;

    /// Status bit: output buffer full (a data byte is ready for us)
    pub const OBF_BIT: u8 = 0;
}

/// Byte offsets in the 256-byte EC image
pub mod registers {
    pub const IMAGE_SIZE: usize = 0x100;
    pub const CPU_TEMP: u8 = 0x07;
    pub const GPU_TEMP: u8 = 0xCD;
    pub const FAN_DUTY: u8 = 0xCE;
    pub const FAN_RPM_HI: u8 = 0xD0;
    pub const FAN_RPM_LO: u8 = 0xD1;

    /// Dividend turning the raw tachometer count into RPM
    pub const RPM_DIVIDEND: u32 = 2_156_220;
}

/// Duty levels and control-law tuning
pub mod duty {
    /// Highest valid duty percentage
    pub const MAX_PERCENT: u8 = 100;

    /// Canonical duty levels the firmware settles on
    pub const LADDER: [u8; 7] = [0, 16, 30, 40, 65, 90, 100];

    /// Observed duties this close to a rung are treated as the rung
    pub const LADDER_TOLERANCE: u8 = 1;

    /// Increases overshooting the damped midpoint by more than this are halved
    pub const DAMPING_MIN_GAP: i32 = 2;

    /// Duty written when the daemon is asked to stop
    pub const SAFETY_PERCENT: u8 = 40;
}

/// Timing constants
pub mod timing {
    use super::Duration;

    /// Status polls per handshake step before giving up
    pub const HANDSHAKE_MAX_ATTEMPTS: u32 = 100;

    /// Pause between status polls
    pub const HANDSHAKE_POLL_INTERVAL: Duration = Duration::from_micros(1);

    /// Control loop cadence
    pub const TICK_INTERVAL: Duration = Duration::from_secs(2);

    /// Granularity of the interruptible inter-tick wait
    pub const WAIT_SLICE: Duration = Duration::from_millis(50);
}

/// Environment variables
pub mod env {
    /// Log filter (trace, debug, info, warn, error)
    pub const LOG_LEVEL: &str = "CLEVO_FAN_LOG";

    pub const DEFAULT_LOG_LEVEL: &str = "info";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registers_fit_image() {
        for reg in [
            registers::CPU_TEMP,
            registers::GPU_TEMP,
            registers::FAN_DUTY,
            registers::FAN_RPM_HI,
            registers::FAN_RPM_LO,
        ] {
            assert!((reg as usize) < registers::IMAGE_SIZE);
        }
    }

    #[test]
    fn test_ladder_sorted_and_bounded() {
        assert!(duty::LADDER.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(duty::LADDER[0], 0);
        assert_eq!(*duty::LADDER.last().unwrap(), duty::MAX_PERCENT);
        assert!(duty::SAFETY_PERCENT <= duty::MAX_PERCENT);
    }

    #[test]
    fn test_wait_slice_shorter_than_tick() {
        assert!(timing::WAIT_SLICE < timing::TICK_INTERVAL);
    }
}
