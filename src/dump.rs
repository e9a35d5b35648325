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

//! Bulk EC snapshot through debugfs
//!
//! With `ec_sys` loaded the kernel exposes the whole EC register space as a
//! 256-byte file. Sampling from it avoids issuing hundreds of port
//! transactions while the firmware is also talking to the EC.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use cf_error::{FanError, Result};
use tracing::trace;

use crate::constants::{paths, registers};
use crate::registers::EcImage;

/// Anything that can produce a full EC image
#[cfg_attr(test, mockall::automock)]
pub trait SnapshotSource {
    fn snapshot(&mut self) -> Result<EcImage>;
}

/// Reads the EC image from the debugfs `io` file. Never writes.
#[derive(Debug, Clone)]
pub struct DumpChannel {
    path: PathBuf,
}

impl DumpChannel {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open, read once, close.
    ///
    /// Bytes past the first 256 are never read.
    pub fn read_image(&self) -> Result<EcImage> {
        let read_err = |source| FanError::SnapshotRead { path: self.path.clone(), source };

        let mut file = File::open(&self.path).map_err(read_err)?;
        let mut buf = [0u8; registers::IMAGE_SIZE];
        let len = file.read(&mut buf).map_err(read_err)?;
        trace!("read {} bytes from {}", len, self.path.display());

        if len != registers::IMAGE_SIZE {
            return Err(FanError::SnapshotSize { actual: len, expected: registers::IMAGE_SIZE });
        }
        Ok(EcImage::new(buf))
    }
}

impl Default for DumpChannel {
    fn default() -> Self {
        Self::new(paths::EC_SNAPSHOT)
    }
}

impl SnapshotSource for DumpChannel {
    fn snapshot(&mut self) -> Result<EcImage> {
        self.read_image()
    }
}
