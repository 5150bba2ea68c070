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

//! A bridge between [Bitwig Studio](https://www.bitwig.com/) and AI assistants speaking the
//! [Model Context Protocol](https://modelcontextprotocol.io/).
//!
//! # Introduction
//!
//! Bitwig Studio can be remote controlled over [Open Sound Control] with the DrivenByMoss
//! extension. The extension listens for commands on one UDP port and pushes every change of the
//! project state to another. There are no replies in the request/response sense: after a command
//! is sent, the only evidence that it worked is a state update that may or may not arrive.
//!
//! This crate turns that fire-and-forget link into something an assistant can use:
//!
//!  * [`client`](crate::client) - A [`Client`](client::Client) that sends transport, track,
//!    device and browser commands. Continuous values such as tempo and volume are clamped into
//!    range, indices are validated, see [`limits`](crate::limits).
//!
//!  * [`server`](crate::server) - A [`Server`](server::Server) that runs one background thread
//!    receiving updates from Bitwig and keeps the latest value per address in a
//!    [`MessageCache`](server::MessageCache).
//!
//!  * [`controller`](crate::controller) - A [`Controller`] that pairs the two, manages the
//!    connection lifecycle and correlates commands with the updates they cause
//!    ([`send_and_wait`](Controller::send_and_wait)).
//!
//!  * [`error_handler`](crate::error_handler) - Retry with timeouts, connection health and
//!    diagnostics.
//!
//!  * [`snapshot`](crate::snapshot) - Structured views of tracks, devices, transport and the
//!    browser assembled from the cache.
//!
//!  * [`mcp`](crate::mcp) - The tools and resources offered to MCP clients.
//!
//!  * [`index`](crate::index) - The boundary to a semantic search index of Bitwig devices.
//!
//! # Example
//!
//! ```no_run
//! use bitwig_mcp::{controller::Controller, mcp, settings::Settings};
//! use serde_json::json;
//! use std::time::Duration;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = Settings::from_env()?;
//!     settings.apply_log_level();
//!
//!     let controller = Controller::new(&settings)?;
//!     controller.start()?;
//!
//!     // Commands clamp out-of-range values instead of failing.
//!     controller.client().set_tempo(1200.0)?;
//!
//!     // Wait for Bitwig to confirm the new volume of track 1.
//!     let volume = controller.send_and_wait(
//!         "/track/1/volume",
//!         100,
//!         None,
//!         Duration::from_secs(2),
//!     )?;
//!     println!("track 1 volume: {:?}", volume);
//!
//!     for content in mcp::call_tool(&controller, "transport_play", &json!({})) {
//!         println!("{}", content.as_text());
//!     }
//!     println!("{}", mcp::read_resource(&controller, "bitwig://tracks")?);
//!
//!     controller.stop();
//!     Ok(())
//! }
//! ```
//!
//! [Open Sound Control]: https://opensoundcontrol.stanford.edu/

pub mod address;
pub mod client;
pub mod controller;
mod error;
pub mod error_handler;
pub mod index;
pub mod limits;
pub mod mcp;
pub mod osc;
pub mod server;
pub mod settings;
pub mod snapshot;

pub use controller::Controller;
pub use error::{Error, Result};
pub use osc::Value;
