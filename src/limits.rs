// bitwig-mcp
// Copyright (C) 2024  The bitwig-mcp authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Named validation policies for every field the bridge sends.
//!
//! Each field is either clamped (continuous controls, out-of-range values are bounded and a
//! warning is logged) or rejected (indices, out-of-range values return
//! [`Error::InvalidParameter`]). Non-finite numbers are rejected for every field.

use crate::error::{Error, Result};

/// What to do with a value outside of a field's bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    Clamp,
    Reject,
}

/// The bounds and range policy of a single field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Limit {
    pub name: &'static str,
    pub min: f64,
    pub max: f64,
    pub policy: Policy,
}

pub const TEMPO: Limit = Limit::clamp("tempo", 20.0, 999.0);
pub const VOLUME: Limit = Limit::clamp("volume", 0.0, 128.0);
pub const PAN: Limit = Limit::clamp("pan", 0.0, 128.0);
pub const PARAMETER_VALUE: Limit = Limit::clamp("value", 0.0, 128.0);

pub const TRACK_INDEX: Limit = Limit::index("track_index", 128.0);
pub const PARAMETER_INDEX: Limit = Limit::index("param_index", 8.0);
pub const SIBLING_INDEX: Limit = Limit::index("sibling_index", 8.0);
pub const LAYER_INDEX: Limit = Limit::index("layer_index", 8.0);
pub const FILTER_INDEX: Limit = Limit::index("filter_index", 6.0);
pub const FILTER_ITEM_INDEX: Limit = Limit::index("item_index", 16.0);

impl Limit {
    pub const fn clamp(name: &'static str, min: f64, max: f64) -> Limit {
        Limit {
            name,
            min,
            max,
            policy: Policy::Clamp,
        }
    }

    /// A 1-based index with an inclusive upper bound.
    pub const fn index(name: &'static str, max: f64) -> Limit {
        Limit {
            name,
            min: 1.0,
            max,
            policy: Policy::Reject,
        }
    }

    /// Returns the same limit with a different upper bound.
    pub const fn with_max(self, max: f64) -> Limit {
        Limit { max, ..self }
    }

    /// Validates a continuous value according to the field's policy.
    pub fn value(&self, value: f64) -> Result<f64> {
        clamp_value(self.name, value, self.min, self.max, self.policy)
    }

    /// Validates a 1-based index. Indices are never clamped.
    pub fn index_value(&self, index: i32) -> Result<i32> {
        if f64::from(index) < self.min {
            return Err(Error::invalid_parameter(
                self.name,
                index,
                format!("must be at least {} (1-based indexing)", self.min),
            ));
        }
        if f64::from(index) > self.max {
            return Err(Error::invalid_parameter(
                self.name,
                index,
                format!("must be at most {}", self.max),
            ));
        }
        Ok(index)
    }
}

pub(crate) fn clamp_value(name: &str, value: f64, min: f64, max: f64, policy: Policy) -> Result<f64> {
    if !value.is_finite() {
        return Err(Error::invalid_parameter(name, value, "must be a number"));
    }
    if value >= min && value <= max {
        return Ok(value);
    }
    match policy {
        Policy::Reject => Err(Error::invalid_parameter(
            name,
            value,
            format!("must be between {} and {}", min, max),
        )),
        Policy::Clamp if value < min => {
            log::warn!(
                "{} value {} below allowed range ({}-{}), clamping to {}",
                name,
                value,
                min,
                max,
                min
            );
            Ok(min)
        }
        Policy::Clamp => {
            log::warn!(
                "{} value {} above allowed range ({}-{}), clamping to {}",
                name,
                value,
                min,
                max,
                max
            );
            Ok(max)
        }
    }
}
