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

//! The error type shared by every part of the bridge.
//!
//! Errors fall into two tiers. Transport failures, timeouts and type or index violations are
//! returned to the caller as an [`Error`]. Out-of-range values for continuous controls (tempo,
//! volume, pan, parameter values) are clamped instead, see [`limits`](crate::limits).

use std::{fmt, time::Duration};
use thiserror::Error;

/// A specialized [`Result`](std::result::Result) type for bridge operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type returned by bridge operations.
///
/// Wrapped transport errors are carried as strings so that errors can be cloned into the
/// diagnostics kept by [`ErrorHandler`](crate::error_handler::ErrorHandler).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// A socket could not be created, bound or written to.
    #[error("{message}{}", Details(.details))]
    Connection {
        message: String,
        details: Option<String>,
    },

    /// No response arrived within the allowed time.
    #[error("Operation '{operation}' timed out after {} seconds", .timeout.as_secs_f64())]
    Timeout {
        operation: String,
        timeout: Duration,
    },

    /// An argument had the wrong type or an index was out of range.
    #[error("Invalid parameter '{parameter}' with value '{value}': {reason}")]
    InvalidParameter {
        parameter: String,
        value: String,
        reason: String,
    },

    /// The feature is known to be unavailable in the connected Bitwig setup.
    #[error("Feature not supported: {feature}{}", Requires(.requirement))]
    FeatureNotSupported {
        feature: String,
        requirement: Option<String>,
    },

    /// A track, device or resource does not exist.
    #[error("{resource_type} not found: {identifier}")]
    ResourceNotFound {
        resource_type: String,
        identifier: String,
    },

    /// Bitwig stopped answering.
    #[error("Bitwig Studio is not responding to OSC messages{}", AtAddress(.address))]
    NotResponding { address: Option<String> },

    /// The inbound listener failed.
    #[error("{message}{}", Details(.details))]
    OscServer {
        message: String,
        details: Option<String>,
    },
}

impl Error {
    pub(crate) fn connection(details: impl fmt::Display) -> Error {
        Error::Connection {
            message: "Failed to connect to Bitwig Studio".to_owned(),
            details: Some(details.to_string()),
        }
    }

    pub(crate) fn timeout(operation: impl Into<String>, timeout: Duration) -> Error {
        Error::Timeout {
            operation: operation.into(),
            timeout,
        }
    }

    pub(crate) fn invalid_parameter(
        parameter: impl Into<String>,
        value: impl fmt::Display,
        reason: impl Into<String>,
    ) -> Error {
        Error::InvalidParameter {
            parameter: parameter.into(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn not_found(resource_type: impl Into<String>, identifier: impl fmt::Display) -> Error {
        Error::ResourceNotFound {
            resource_type: resource_type.into(),
            identifier: identifier.to_string(),
        }
    }

    pub(crate) fn not_responding(address: Option<&str>) -> Error {
        Error::NotResponding {
            address: address.map(str::to_owned),
        }
    }

    pub(crate) fn osc_server(message: impl Into<String>, details: impl fmt::Display) -> Error {
        Error::OscServer {
            message: message.into(),
            details: Some(details.to_string()),
        }
    }

    /// Returns true for timeout-class errors.
    ///
    /// Only these accumulate in the consecutive-timeout counter used for health tracking.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }
}

struct Details<'a>(&'a Option<String>);

impl fmt::Display for Details<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(details) => write!(f, ": {}", details),
            None => Ok(()),
        }
    }
}

struct Requires<'a>(&'a Option<String>);

impl fmt::Display for Requires<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(requirement) => write!(f, ". Requires: {}", requirement),
            None => Ok(()),
        }
    }
}

struct AtAddress<'a>(&'a Option<String>);

impl fmt::Display for AtAddress<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(address) => write!(f, " at address {}", address),
            None => Ok(()),
        }
    }
}
