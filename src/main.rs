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

use std::process::ExitCode;

use anyhow::Context;
use tracing::{debug, error, info, warn};

use clevo_fan::config::ControlConfig;
use clevo_fan::dump::DumpChannel;
use clevo_fan::ec;
use clevo_fan::logger::{self, LogTarget};
use clevo_fan::port::{HardwarePorts, PortChannel};
use clevo_fan::service::ControlLoop;
use clevo_fan::signals::ShutdownRequest;
use clevo_fan::{system, FanError};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Print the current status as JSON
    Dump,
    /// Set a fixed duty, then print the status
    Set(u8),
    /// Run the control loop until a termination signal
    Run,
    Help,
    Version,
}

fn parse_args(args: &[String]) -> Result<Command, FanError> {
    if args.iter().any(|a| a == "-h" || a == "--help") {
        return Ok(Command::Help);
    }
    if args.iter().any(|a| a == "-v" || a == "--version") {
        return Ok(Command::Version);
    }
    let Some(arg) = args.first() else {
        return Ok(Command::Dump);
    };
    let value: i64 = arg
        .parse()
        .map_err(|_| FanError::invalid_argument(format!("invalid fan duty {}", arg)))?;
    match value {
        -1 => Ok(Command::Run),
        0..=100 => Ok(Command::Set(value as u8)),
        _ => Err(FanError::invalid_duty(value)),
    }
}

fn print_help() {
    eprintln!("clevo-fancontrol {} - EC fan duty control for Clevo laptops", VERSION);
    eprintln!();
    eprintln!("USAGE:");
    eprintln!("    clevo-fancontrol [FAN_DUTY_PERCENT | -1]");
    eprintln!();
    eprintln!("ARGUMENTS:");
    eprintln!("    <none>              Print fan duty, RPM and temperatures as JSON");
    eprintln!("    0-100               Set a fixed fan duty, then print the status");
    eprintln!("    -1                  Run the automatic control loop");
    eprintln!("    -v, --version       Print version");
    eprintln!("    -h, --help          Print this help");
    eprintln!();
    eprintln!("ENVIRONMENT:");
    eprintln!("    CLEVO_FAN_LOG       Log level (trace, debug, info, warn, error)");
    eprintln!();
    eprintln!("Requires root or CAP_SYS_RAWIO, directly or through a setuid-root binary.");
    eprintln!("The control loop loads the 'ec_sys' kernel module and samples");
    eprintln!("/sys/kernel/debug/ec/ec0/io instead of polling the EC ports, which is");
    eprintln!("risky while the firmware is busy.");
    eprintln!();
    eprintln!("Do not query or drive the EC ports from other tools while the loop runs.");
    eprintln!("On SIGINT, SIGTERM and other termination signals the fan is reset to 40%.");
}

fn run(command: Command) -> anyhow::Result<()> {
    system::escalate_uid();
    system::check_privileges();

    let config = ControlConfig::default();
    config.validate()?;
    let mut port = PortChannel::with_timing(HardwarePorts::new(), config.port_timing);
    port.initialize().context("unable to control EC")?;

    match command {
        Command::Dump => {
            let status = ec::query_status(&mut port).context("unable to query EC")?;
            println!("{}", ec::status_json(&status)?);
        }
        Command::Set(percent) => {
            let status = ec::set_fan(&mut port, percent).context("set fan failed")?;
            println!("{}", ec::status_json(&status)?);
        }
        Command::Run => run_daemon(port, config)?,
        Command::Help | Command::Version => {}
    }
    Ok(())
}

fn run_daemon(port: PortChannel<HardwarePorts>, config: ControlConfig) -> anyhow::Result<()> {
    info!("STARTUP: clevo-fancontrol {} (pid {})", VERSION, std::process::id());
    info!("STARTUP: Board: {}", system::read_mb_name());

    // A failed load is reported by the first snapshot read
    if let Err(e) = system::load_ec_module() {
        warn!("{:#}", e);
    }
    let request = ShutdownRequest::new();
    request.install_handlers().context("unable to install signal handlers")?;

    let source = DumpChannel::new(&config.snapshot_path);
    let mut control = ControlLoop::new(port, source, config);
    let shutdown = control.run(&request).context("worker failed")?;

    shutdown
        .safety_write
        .with_context(|| format!("could not reset fan to {}%", shutdown.safety_duty))?;
    info!("SHUTDOWN: fan reset to {}% after {} ticks", shutdown.safety_duty, shutdown.ticks);
    Ok(())
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let command = match parse_args(&args) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("{}", e);
            eprintln!("Try 'clevo-fancontrol --help' for usage.");
            return ExitCode::FAILURE;
        }
    };

    match command {
        Command::Help => {
            print_help();
            return ExitCode::SUCCESS;
        }
        Command::Version => {
            println!("clevo-fancontrol {}", VERSION);
            return ExitCode::SUCCESS;
        }
        _ => {}
    }

    let target = if command == Command::Run { LogTarget::Daemon } else { LogTarget::OneShot };
    let sink = logger::init_logging(target);
    debug!("Logging to {:?}", sink);

    if let Err(e) = run(command) {
        error!("{:#}", e);
        if target == LogTarget::Daemon {
            eprintln!("error: {:#}", e);
        }
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
