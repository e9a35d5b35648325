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

//! EC port protocol
//!
//! The EC is driven through two I/O ports: a status/command port and a data
//! port. Every byte we send must wait for the EC to drain its input buffer
//! (IBF clear), and every byte we read must wait for the output buffer to
//! fill (OBF set). The EC signals both through bits of the status byte.
//!
//! [`PortChannel`] implements that handshake on top of any [`PortIo`]
//! backend. [`HardwarePorts`] is the real one; tests substitute a simulated
//! EC or a mock.

use std::io;
use std::thread;
use std::time::Duration;

use cf_error::{FanError, Result};
use tracing::{debug, warn};

use crate::constants::{ports, timing};
use crate::registers::raw_from_duty;

/// Raw byte access to I/O ports
#[cfg_attr(test, mockall::automock)]
pub trait PortIo {
    /// Ask the OS for permission to touch `port`
    fn request_access(&mut self, port: u16) -> io::Result<()>;

    fn inb(&mut self, port: u16) -> u8;

    fn outb(&mut self, port: u16, value: u8);
}

/// Port I/O through `ioperm(2)` and the x86 `in`/`out` instructions
#[derive(Debug, Default)]
pub struct HardwarePorts {
    _private: (),
}

impl HardwarePorts {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(all(target_os = "linux", any(target_arch = "x86", target_arch = "x86_64")))]
impl PortIo for HardwarePorts {
    fn request_access(&mut self, port: u16) -> io::Result<()> {
        // SAFETY: ioperm only changes this process's I/O permission bitmap.
        let rc = unsafe { libc::ioperm(port as libc::c_ulong, 1, 1) };
        if rc != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    fn inb(&mut self, port: u16) -> u8 {
        let value: u8;
        // SAFETY: access to `port` was granted by request_access; reading an EC
        // status or data port has no memory side effects.
        unsafe {
            core::arch::asm!("in al, dx", in("dx") port, out("al") value, options(nomem, nostack, preserves_flags));
        }
        value
    }

    fn outb(&mut self, port: u16, value: u8) {
        // SAFETY: access to `port` was granted by request_access; only the EC
        // command and data ports are ever passed here.
        unsafe {
            core::arch::asm!("out dx, al", in("dx") port, in("al") value, options(nomem, nostack, preserves_flags));
        }
    }
}

#[cfg(not(all(target_os = "linux", any(target_arch = "x86", target_arch = "x86_64"))))]
impl PortIo for HardwarePorts {
    fn request_access(&mut self, _port: u16) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "EC port I/O is only available on x86 Linux",
        ))
    }

    fn inb(&mut self, _port: u16) -> u8 {
        0
    }

    fn outb(&mut self, _port: u16, _value: u8) {}
}

/// Handshake polling limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortTiming {
    pub max_attempts: u32,
    pub poll_interval: Duration,
}

impl Default for PortTiming {
    fn default() -> Self {
        Self {
            max_attempts: timing::HANDSHAKE_MAX_ATTEMPTS,
            poll_interval: timing::HANDSHAKE_POLL_INTERVAL,
        }
    }
}

/// Transactional single-byte access to EC registers
#[derive(Debug)]
pub struct PortChannel<P: PortIo> {
    io: P,
    timing: PortTiming,
}

impl<P: PortIo> PortChannel<P> {
    pub fn new(io: P) -> Self {
        Self::with_timing(io, PortTiming::default())
    }

    pub fn with_timing(io: P, timing: PortTiming) -> Self {
        Self { io, timing }
    }

    pub fn io(&self) -> &P {
        &self.io
    }

    /// Request access to the data and command ports.
    ///
    /// This is the privilege gate: an unprivileged caller gets
    /// `PermissionDenied`, a target without port I/O gets `Unsupported`.
    pub fn initialize(&mut self) -> Result<()> {
        for port in [ports::EC_DATA, ports::EC_COMMAND] {
            self.io.request_access(port).map_err(|source| match source.kind() {
                io::ErrorKind::Unsupported => FanError::Unsupported(source.to_string()),
                _ => FanError::PermissionDenied { port, source },
            })?;
        }
        debug!("EC ports {:#04x}/{:#04x} accessible", ports::EC_DATA, ports::EC_COMMAND);
        Ok(())
    }

    /// Poll `port` until bit `bit` reads as `expected`
    pub fn wait_for_flag(&mut self, port: u16, bit: u8, expected: bool) -> Result<()> {
        let mut status = 0;
        for attempt in 0..self.timing.max_attempts {
            status = self.io.inb(port);
            let is_set = (status >> bit) & 0x1 == 1;
            if is_set == expected {
                return Ok(());
            }
            if attempt + 1 < self.timing.max_attempts && !self.timing.poll_interval.is_zero() {
                thread::sleep(self.timing.poll_interval);
            }
        }
        warn!(
            "EC wait timed out on port {:#04x}, status={:#04x}, bit={}, expected={}",
            port, status, bit, expected
        );
        Err(FanError::Timeout { port, bit, expected, status })
    }

    fn wait_input_empty(&mut self) -> Result<()> {
        self.wait_for_flag(ports::EC_COMMAND, ports::IBF_BIT, false)
    }

    /// Write-command, address and value, each after the EC drained its input buffer
    pub fn write_register(&mut self, address: u8, value: u8) -> Result<()> {
        self.wait_input_empty()?;
        self.io.outb(ports::EC_COMMAND, ports::WRITE_CMD);

        self.wait_input_empty()?;
        self.io.outb(ports::EC_DATA, address);

        self.wait_input_empty()?;
        self.io.outb(ports::EC_DATA, value);

        self.wait_input_empty()
    }

    /// Read-command and address, then collect the data byte once OBF is set
    pub fn read_register(&mut self, address: u8) -> Result<u8> {
        self.wait_input_empty()?;
        self.io.outb(ports::EC_COMMAND, ports::READ_CMD);

        self.wait_input_empty()?;
        self.io.outb(ports::EC_DATA, address);

        self.wait_for_flag(ports::EC_COMMAND, ports::OBF_BIT, true)?;
        Ok(self.io.inb(ports::EC_DATA))
    }

    /// Command a fan duty percentage. Out-of-range values never reach the ports.
    pub fn write_fan_duty(&mut self, percent: u8) -> Result<()> {
        let raw = raw_from_duty(percent)?;
        self.write_register(ports::FAN_DUTY_SUB_ADDR, raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_utils::SimulatedEc;
    use mockall::predicate::eq;
    use mockall::Sequence;

    const IBF_MASK: u8 = 1 << ports::IBF_BIT;
    const OBF_MASK: u8 = 1 << ports::OBF_BIT;

    fn fast() -> PortTiming {
        PortTiming { max_attempts: 100, poll_interval: Duration::ZERO }
    }

    #[test]
    fn test_initialize_requests_both_ports() {
        let mut mock = MockPortIo::new();
        mock.expect_request_access().with(eq(ports::EC_DATA)).times(1).returning(|_| Ok(()));
        mock.expect_request_access().with(eq(ports::EC_COMMAND)).times(1).returning(|_| Ok(()));

        let mut channel = PortChannel::with_timing(mock, fast());
        assert!(channel.initialize().is_ok());
    }

    #[test]
    fn test_initialize_permission_denied() {
        let mut mock = MockPortIo::new();
        mock.expect_request_access()
            .returning(|_| Err(io::Error::from(io::ErrorKind::PermissionDenied)));

        let mut channel = PortChannel::with_timing(mock, fast());
        let err = channel.initialize().unwrap_err();
        assert!(matches!(err, FanError::PermissionDenied { port: ports::EC_DATA, .. }));
    }

    #[test]
    fn test_initialize_without_port_io_is_unsupported() {
        let mut mock = MockPortIo::new();
        mock.expect_request_access()
            .times(1)
            .returning(|_| Err(io::Error::new(io::ErrorKind::Unsupported, "no port I/O")));
        mock.expect_outb().never();

        let mut channel = PortChannel::with_timing(mock, fast());
        let err = channel.initialize().unwrap_err();
        assert!(matches!(err, FanError::Unsupported(ref msg) if msg.contains("no port I/O")));
    }

    #[test]
    fn test_wait_for_flag_times_out_after_max_attempts() {
        let mut mock = MockPortIo::new();
        mock.expect_inb().with(eq(ports::EC_COMMAND)).times(100).return_const(IBF_MASK);

        let mut channel = PortChannel::with_timing(mock, fast());
        let err = channel.wait_for_flag(ports::EC_COMMAND, ports::IBF_BIT, false).unwrap_err();
        assert!(matches!(
            err,
            FanError::Timeout { port: ports::EC_COMMAND, bit: 1, expected: false, status: IBF_MASK }
        ));
    }

    #[test]
    fn test_wait_for_flag_succeeds_once_bit_flips() {
        let mut mock = MockPortIo::new();
        let mut polls = 0;
        mock.expect_inb().times(4).returning(move |_| {
            polls += 1;
            if polls < 4 { IBF_MASK } else { 0 }
        });

        let mut channel = PortChannel::with_timing(mock, fast());
        assert!(channel.wait_for_flag(ports::EC_COMMAND, ports::IBF_BIT, false).is_ok());
    }

    #[test]
    fn test_write_register_aborts_on_first_timeout() {
        let mut mock = MockPortIo::new();
        mock.expect_inb().return_const(IBF_MASK);
        mock.expect_outb().never();

        let mut channel = PortChannel::with_timing(mock, fast());
        assert!(matches!(channel.write_register(0x01, 0x66), Err(FanError::Timeout { .. })));
    }

    #[test]
    fn test_write_register_byte_order() {
        let mut mock = MockPortIo::new();
        let mut seq = Sequence::new();
        mock.expect_inb().return_const(0u8);
        mock.expect_outb()
            .with(eq(ports::EC_COMMAND), eq(ports::WRITE_CMD))
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());
        mock.expect_outb()
            .with(eq(ports::EC_DATA), eq(0x01))
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());
        mock.expect_outb()
            .with(eq(ports::EC_DATA), eq(0x80))
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());

        let mut channel = PortChannel::with_timing(mock, fast());
        assert!(channel.write_register(0x01, 0x80).is_ok());
    }

    #[test]
    fn test_read_register_waits_for_output_full() {
        let mut mock = MockPortIo::new();
        let mut status_polls = 0;
        // polls 1-2 are the IBF waits, OBF shows up on poll 5
        mock.expect_inb().returning(move |port| {
            if port == ports::EC_DATA {
                return 57;
            }
            status_polls += 1;
            if status_polls >= 5 { OBF_MASK } else { 0 }
        });
        let mut seq = Sequence::new();
        mock.expect_outb()
            .with(eq(ports::EC_COMMAND), eq(ports::READ_CMD))
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());
        mock.expect_outb()
            .with(eq(ports::EC_DATA), eq(0x07))
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());

        let mut channel = PortChannel::with_timing(mock, fast());
        assert_eq!(channel.read_register(0x07).unwrap(), 57);
    }

    #[test]
    fn test_read_register_timeout_propagates() {
        let mut ec = SimulatedEc::new();
        ec.never_ready = true;

        let mut channel = PortChannel::with_timing(ec, fast());
        assert!(matches!(channel.read_register(0x07), Err(FanError::Timeout { .. })));
        assert!(channel.io().port_log.is_empty());
    }

    #[test]
    fn test_write_fan_duty_rejects_before_touching_ports() {
        let mut channel = PortChannel::with_timing(SimulatedEc::new(), fast());
        assert!(matches!(channel.write_fan_duty(101), Err(FanError::InvalidDuty { value: 101 })));
        assert!(channel.io().port_log.is_empty());
        assert!(channel.io().duty_writes.is_empty());
    }

    #[test]
    fn test_write_fan_duty_against_simulated_ec() {
        let mut channel = PortChannel::with_timing(SimulatedEc::new(), fast());
        channel.write_fan_duty(40).unwrap();

        assert_eq!(channel.io().duty_writes, vec![102]);
        assert_eq!(channel.read_register(crate::constants::registers::FAN_DUTY).unwrap(), 102);
    }
}
