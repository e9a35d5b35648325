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

use std::fs;
use std::path::Path;
use std::process::Command;

use anyhow::{bail, Context, Result};
use tracing::{debug, info, warn};

use crate::constants::paths;

/// Board vendor and name from DMI, used to tag the daemon's startup log
pub fn read_mb_name() -> String {
    let read_trim = |p: &str| -> Option<String> {
        fs::read_to_string(p)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    };
    let vendor = read_trim("/sys/devices/virtual/dmi/id/board_vendor");
    let name = read_trim("/sys/devices/virtual/dmi/id/board_name");
    match (vendor, name) {
        (Some(v), Some(n)) => format!("{} {}", v, n),
        (Some(v), None) => v,
        (None, Some(n)) => n,
        (None, None) => read_trim("/sys/devices/virtual/dmi/id/product_name").unwrap_or_default(),
    }
}

/// Become uid 0 when installed setuid-root; harmless when already root
pub fn escalate_uid() {
    // SAFETY: setuid has no memory-safety preconditions.
    if unsafe { libc::setuid(0) } != 0 {
        debug!("setuid(0) failed: {}", std::io::Error::last_os_error());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Privilege {
    Root,
    SetuidRoot { uid: u32 },
    /// Port access may still work with CAP_SYS_RAWIO
    Unprivileged { euid: u32 },
}

pub fn privilege_from_ids(uid: u32, euid: u32) -> Privilege {
    match (uid, euid) {
        (0, 0) => Privilege::Root,
        (uid, 0) => Privilege::SetuidRoot { uid },
        (_, euid) => Privilege::Unprivileged { euid },
    }
}

/// Log how the process is privileged.
///
/// Nothing is rejected here; requesting port access decides.
pub fn check_privileges() -> Privilege {
    // SAFETY: geteuid and getuid only return the process's user IDs.
    let euid = unsafe { libc::geteuid() };
    let uid = unsafe { libc::getuid() };

    let privilege = privilege_from_ids(uid, euid);
    match privilege {
        Privilege::Root => debug!("Running as root"),
        Privilege::SetuidRoot { uid } => warn!("Running as setuid root (uid={})", uid),
        Privilege::Unprivileged { euid } => warn!(
            "Not running as root (euid={}), EC port access needs root or CAP_SYS_RAWIO",
            euid
        ),
    }
    privilege
}

/// Load `ec_sys` unless the EC image is already exposed
pub fn load_ec_module() -> Result<()> {
    ensure_module(paths::EC_SYS_MODULE, Path::new(paths::EC_SNAPSHOT))
}

fn ensure_module(module: &str, provides: &Path) -> Result<()> {
    if provides.exists() {
        debug!("{} already present, not loading {}", provides.display(), module);
        return Ok(());
    }

    let output = Command::new("modprobe")
        .arg(module)
        .output()
        .with_context(|| format!("could not run modprobe for {}", module))?;
    if !output.status.success() {
        bail!(
            "modprobe {} failed: {}",
            module,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    info!("Loaded kernel module: {}", module);
    Ok(())
}
