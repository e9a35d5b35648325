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

//! Unified error handling for clevo-fan
//!
//! Every failure of the EC layers is reported through [`FanError`], so the
//! control loop and the command-line front end can decide what is fatal and
//! what is retried on the next cycle.

use std::io;
use std::path::PathBuf;

/// Result type alias using FanError
pub type Result<T> = std::result::Result<T, FanError>;

/// Error type for all EC and fan-control operations
#[derive(thiserror::Error, Debug)]
pub enum FanError {
    // ============================================================================
    // Port I/O Errors
    // ============================================================================
    #[error("Permission denied for EC port {port:#04x}: {source}")]
    PermissionDenied {
        port: u16,
        source: io::Error,
    },

    #[error("EC handshake timed out on port {port:#04x} (bit {bit} never became {expected}, last status {status:#04x})")]
    Timeout {
        port: u16,
        bit: u8,
        expected: bool,
        status: u8,
    },

    // ============================================================================
    // Snapshot Errors
    // ============================================================================
    #[error("Unable to read EC snapshot from {path}: {source}")]
    SnapshotRead {
        path: PathBuf,
        source: io::Error,
    },

    #[error("Wrong EC snapshot size: {actual} bytes (expected {expected})")]
    SnapshotSize {
        actual: usize,
        expected: usize,
    },

    // ============================================================================
    // Validation Errors
    // ============================================================================
    #[error("Invalid fan duty: {value} (must be 0-100)")]
    InvalidDuty {
        value: i64,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to encode JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Operation not supported: {0}")]
    Unsupported(String),
}

impl FanError {
    /// Create an invalid duty error for any integer input
    pub fn invalid_duty(value: impl Into<i64>) -> Self {
        Self::InvalidDuty { value: value.into() }
    }

    /// Create an invalid argument error from a string
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Errors the control loop skips and retries on its next cycle.
    /// Anything else stops the loop.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::SnapshotSize { .. })
    }
}
