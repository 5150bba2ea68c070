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

//! OSC values and packet encoding.
//!
//! Bitwig's OSC surface is untyped: every address carries at most one scalar and callers know the
//! expected type by convention. [`Value`] is the tagged union used for both directions.

use crate::error::{Error, Result};
use rosc::{decoder::decode, encoder::encode, OscMessage, OscPacket, OscType};
use serde::Serialize;
use std::fmt;

/// A single OSC scalar as seen by the bridge.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// A message with no arguments. Sending `Nil` toggles or queries an address; receiving it
    /// means the address was reported without a payload.
    Nil,
    /// Integers, including Bitwig's 0/1 booleans.
    Int(i32),
    Float(f32),
    Str(String),
}

impl Value {
    /// Returns the value as a float if it is numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Int(x) => Some(f64::from(x)),
            Value::Float(x) => Some(f64::from(x)),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match *self {
            Value::Int(x) => Some(x),
            Value::Float(x) if x.fract() == 0.0 => Some(x as i32),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Bitwig reports flags as 0/1 and names as strings. `Nil`, zero and empty strings are false.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Nil => false,
            Value::Int(x) => *x != 0,
            Value::Float(x) => *x != 0.0,
            Value::Str(s) => !s.is_empty(),
        }
    }

    fn into_osc_args(self) -> Vec<OscType> {
        match self {
            Value::Nil => Vec::new(),
            Value::Int(x) => vec![x.into()],
            Value::Float(x) => vec![x.into()],
            Value::Str(s) => vec![s.into()],
        }
    }

    fn from_osc_type(arg: &OscType) -> Value {
        match arg {
            OscType::Int(x) => Value::Int(*x),
            OscType::Long(x) => Value::Int((*x).clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32),
            OscType::Bool(b) => Value::Int(i32::from(*b)),
            OscType::Float(x) => Value::Float(*x),
            OscType::Double(x) => Value::Float(*x as f32),
            OscType::String(s) => Value::Str(s.clone()),
            OscType::Nil | OscType::Inf => Value::Nil,
            other => {
                log::debug!("unsupported OSC argument stored as nil: {:?}", other);
                Value::Nil
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "None"),
            Value::Int(x) => write!(f, "{}", x),
            Value::Float(x) => write!(f, "{}", x),
            Value::Str(s) => write!(f, "{}", s),
        }
    }
}

impl From<i32> for Value {
    fn from(x: i32) -> Value {
        Value::Int(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Value {
        Value::Int(i32::from(b))
    }
}

impl From<f32> for Value {
    fn from(x: f32) -> Value {
        Value::Float(x)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Value {
        Value::Float(x as f32)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Value {
        Value::Str(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Value {
        Value::Str(s)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Value {
        value.map(Into::into).unwrap_or(Value::Nil)
    }
}

/// Encodes a single address/value pair into an OSC datagram.
pub fn encode_message(addr: &str, value: Value) -> Result<Vec<u8>> {
    let packet = OscPacket::Message(OscMessage {
        addr: addr.to_owned(),
        args: value.into_osc_args(),
    });
    encode(&packet).map_err(|err| Error::osc_server("encoding OSC packet", format!("{:?}", err)))
}

/// Decodes a datagram into the address/value pairs it carries.
///
/// Bundles are flattened in order. Only the first argument of each message is kept.
pub fn decode_messages(bytes: &[u8]) -> Result<Vec<(String, Value)>> {
    let packet =
        decode(bytes).map_err(|err| Error::osc_server("decoding OSC packet", format!("{:?}", err)))?;
    let mut messages = Vec::new();
    flatten(packet, &mut messages);
    Ok(messages)
}

fn flatten(packet: OscPacket, out: &mut Vec<(String, Value)>) {
    match packet {
        OscPacket::Message(message) => {
            let value = message
                .args
                .first()
                .map(Value::from_osc_type)
                .unwrap_or(Value::Nil);
            out.push((message.addr, value));
        }
        OscPacket::Bundle(bundle) => {
            for packet in bundle.content {
                flatten(packet, out);
            }
        }
    }
}
