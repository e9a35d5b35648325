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

//! clevo-fan - EC fan duty control for Clevo laptops
//!
//! This library implements the embedded controller port protocol, the
//! debugfs snapshot reader, the hysteretic duty controller and the control
//! loop driving them.

pub mod constants;
pub mod registers;
pub mod port;
pub mod dump;
pub mod controller;
pub mod service;
pub mod signals;
pub mod config;
pub mod ec;
pub mod system;
pub mod logger;

pub use cf_error::{FanError, Result};

#[cfg(test)]
pub mod test_utils;
