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

//! Hysteretic temperature-to-duty control law
//!
//! The controller works on the hotter of the two sensors and on the duty the
//! EC currently reports. Rising thresholds and falling thresholds differ, so
//! a temperature hovering around one boundary does not make the fan hunt.
//!
//! # How It Works
//!
//! 1. **Snapping**: the observed duty is pulled onto the nearest ladder rung
//!    when it is within one percent of it, absorbing firmware rounding.
//! 2. **Thresholds**: an ordered rule table maps (temperature, duty) to a
//!    candidate duty. The first matching rule wins; no match means hold.
//! 3. **Damping**: a large increase is approached in two steps, going to the
//!    midpoint first. Decreases are applied immediately.

use tracing::debug;

use crate::constants::duty;

/// Outcome of one control decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DutyDecision {
    /// Temperature sits in a dead zone, leave the fan alone
    Hold,
    /// Command this duty percentage
    Set(u8),
}

impl DutyDecision {
    pub fn target(self) -> Option<u8> {
        match self {
            Self::Hold => None,
            Self::Set(pct) => Some(pct),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Condition {
    /// temp >= min_temp and duty < duty_below
    Hot { min_temp: i32, duty_below: i32 },
    /// temp <= max_temp and duty >= duty_at_least
    Cool { max_temp: i32, duty_at_least: i32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Rule {
    when: Condition,
    target: u8,
}

impl Rule {
    const fn hot(min_temp: i32, duty_below: i32, target: u8) -> Self {
        Self { when: Condition::Hot { min_temp, duty_below }, target }
    }

    const fn cool(max_temp: i32, duty_at_least: i32, target: u8) -> Self {
        Self { when: Condition::Cool { max_temp, duty_at_least }, target }
    }

    fn matches(&self, temp: i32, duty: i32) -> bool {
        match self.when {
            Condition::Hot { min_temp, duty_below } => temp >= min_temp && duty < duty_below,
            Condition::Cool { max_temp, duty_at_least } => temp <= max_temp && duty >= duty_at_least,
        }
    }
}

/// Rules in priority order. Ramp-ups first, then the cool-down steps.
const RULES: [Rule; 9] = [
    Rule::hot(85, 65, 65),
    Rule::hot(75, 40, 40),
    Rule::hot(65, 30, 30),
    Rule::hot(55, 17, 17),
    Rule::cool(50, 0, 0),
    Rule::cool(60, 17, 17),
    Rule::cool(70, 30, 30),
    Rule::cool(80, 40, 40),
    Rule::cool(85, 65, 65),
];

/// Snap an observed duty onto the ladder when it is within tolerance of a rung
pub fn snap_to_ladder(observed: u8) -> u8 {
    duty::LADDER
        .iter()
        .copied()
        .find(|rung| rung.abs_diff(observed) <= duty::LADDER_TOLERANCE)
        .unwrap_or(observed)
}

/// Decides the next fan duty from temperatures and the reported duty
#[derive(Debug, Clone, Copy, Default)]
pub struct DutyController {
    _private: (),
}

impl DutyController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next duty for the given CPU and GPU temperatures (°C) and observed duty (%)
    pub fn decide(&self, cpu_temp: u8, gpu_temp: u8, observed_duty: u8) -> DutyDecision {
        let temp = cpu_temp.max(gpu_temp) as i32;
        let snapped = snap_to_ladder(observed_duty) as i32;
        let observed = observed_duty as i32;

        let Some(rule) = RULES.iter().find(|r| r.matches(temp, snapped)) else {
            return DutyDecision::Hold;
        };
        let candidate = rule.target as i32;

        if candidate > observed {
            let midpoint = snapped + (candidate - observed) / 2;
            if candidate - midpoint > duty::DAMPING_MIN_GAP {
                let damped = midpoint.clamp(0, duty::MAX_PERCENT as i32) as u8;
                debug!("using adjusted new duty={}% (target {}%)", damped, candidate);
                return DutyDecision::Set(damped);
            }
        }

        DutyDecision::Set(rule.target)
    }
}
