/*
 * Test utilities and simulated hardware for clevo-fan
 *
 * This module provides a simulated embedded controller speaking the port
 * protocol, plus scripted snapshot sources for driving the control loop.
 */

#[cfg(test)]
pub mod test_utils {
    use std::collections::VecDeque;
    use std::io;

    use cf_error::{FanError, Result};

    use crate::constants::{ports, registers};
    use crate::dump::SnapshotSource;
    use crate::port::PortIo;
    use crate::registers::EcImage;

    /// In-memory EC that answers the read (0x80) and fan duty write (0x99) commands
    #[derive(Debug)]
    pub struct SimulatedEc {
        pub registers: [u8; registers::IMAGE_SIZE],
        /// Every byte sent, as (port, value)
        pub port_log: Vec<(u16, u8)>,
        /// Raw values of completed fan duty writes
        pub duty_writes: Vec<u8>,
        /// Keep IBF set forever so every handshake times out
        pub never_ready: bool,
        command: Option<u8>,
        address: Option<u8>,
        output: Option<u8>,
    }

    impl SimulatedEc {
        pub fn new() -> Self {
            Self {
                registers: [0; registers::IMAGE_SIZE],
                port_log: Vec::new(),
                duty_writes: Vec::new(),
                never_ready: false,
                command: None,
                address: None,
                output: None,
            }
        }

        pub fn with_readings(cpu: u8, gpu: u8, raw_duty: u8) -> Self {
            let mut ec = Self::new();
            ec.registers[registers::CPU_TEMP as usize] = cpu;
            ec.registers[registers::GPU_TEMP as usize] = gpu;
            ec.registers[registers::FAN_DUTY as usize] = raw_duty;
            ec
        }
    }

    impl PortIo for SimulatedEc {
        fn request_access(&mut self, _port: u16) -> io::Result<()> {
            Ok(())
        }

        fn inb(&mut self, port: u16) -> u8 {
            if port == ports::EC_DATA {
                return self.output.take().unwrap_or(0);
            }
            let mut status = 0;
            if self.never_ready {
                status |= 1 << ports::IBF_BIT;
            }
            if self.output.is_some() {
                status |= 1 << ports::OBF_BIT;
            }
            status
        }

        fn outb(&mut self, port: u16, value: u8) {
            self.port_log.push((port, value));
            if port == ports::EC_COMMAND {
                self.command = Some(value);
                self.address = None;
                return;
            }
            match (self.command, self.address) {
                (Some(ports::READ_CMD), None) => {
                    self.output = Some(self.registers[value as usize]);
                    self.command = None;
                }
                (Some(ports::WRITE_CMD), None) => self.address = Some(value),
                (Some(ports::WRITE_CMD), Some(address)) => {
                    if address == ports::FAN_DUTY_SUB_ADDR {
                        self.registers[registers::FAN_DUTY as usize] = value;
                        self.duty_writes.push(value);
                    }
                    self.command = None;
                    self.address = None;
                }
                _ => {}
            }
        }
    }

    /// Scripted snapshot outcome
    pub enum Sample {
        Image(EcImage),
        Short(usize),
        Missing,
    }

    /// Snapshot source replaying a fixed script, repeating the last entry
    pub struct ScriptedSource {
        script: VecDeque<Sample>,
        pub calls: usize,
    }

    impl ScriptedSource {
        pub fn new(script: Vec<Sample>) -> Self {
            Self { script: script.into(), calls: 0 }
        }
    }

    impl SnapshotSource for ScriptedSource {
        fn snapshot(&mut self) -> Result<EcImage> {
            self.calls += 1;
            let popped = if self.script.len() > 1 {
                self.script.pop_front()
            } else {
                None
            };
            let sample = popped.as_ref().or(self.script.front());
            match sample {
                Some(Sample::Image(image)) => Ok(image.clone()),
                Some(Sample::Short(actual)) => Err(FanError::SnapshotSize {
                    actual: *actual,
                    expected: registers::IMAGE_SIZE,
                }),
                Some(Sample::Missing) | None => Err(FanError::SnapshotRead {
                    path: "/sys/kernel/debug/ec/ec0/io".into(),
                    source: io::Error::from(io::ErrorKind::NotFound),
                }),
            }
        }
    }

    /// Build an EC image with the given temperatures and duty percentage
    pub fn image_with(cpu: u8, gpu: u8, duty_percent: u8) -> EcImage {
        let mut bytes = [0u8; registers::IMAGE_SIZE];
        bytes[registers::CPU_TEMP as usize] = cpu;
        bytes[registers::GPU_TEMP as usize] = gpu;
        bytes[registers::FAN_DUTY as usize] =
            crate::registers::raw_from_duty(duty_percent).expect("duty in range");
        bytes[registers::FAN_RPM_HI as usize] = 0x21;
        bytes[registers::FAN_RPM_LO as usize] = 0x0E;
        EcImage::new(bytes)
    }
}
