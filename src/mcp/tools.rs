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

use super::{Content, Tool};
use crate::{
    address::Direction,
    client::Client,
    controller::Controller,
    error::{Error, Result},
};
use serde_json::{json, Value as Json};
use std::convert::TryFrom;

/// Every tool the bridge offers.
pub fn tools() -> Vec<Tool> {
    vec![
        tool(
            "transport_play",
            "Toggle play/pause state of Bitwig",
            no_arguments(),
        ),
        tool("transport_stop", "Stop playback", no_arguments()),
        tool(
            "set_tempo",
            "Set the tempo of the Bitwig project",
            json!({
                "type": "object",
                "properties": {
                    "bpm": {"type": "number", "description": "Tempo in beats per minute (20-999)"}
                },
                "required": ["bpm"],
            }),
        ),
        tool(
            "set_track_volume",
            "Set the volume of a track",
            json!({
                "type": "object",
                "properties": {
                    "track_index": {"type": "integer", "description": "Track index (1-based)"},
                    "volume": {"type": "number", "description": "Volume value (0-128, where 64 is 0dB)"},
                },
                "required": ["track_index", "volume"],
            }),
        ),
        tool(
            "set_track_pan",
            "Set the pan of a track",
            json!({
                "type": "object",
                "properties": {
                    "track_index": {"type": "integer", "description": "Track index (1-based)"},
                    "pan": {"type": "number", "description": "Pan value (0-128, where 64 is center)"},
                },
                "required": ["track_index", "pan"],
            }),
        ),
        tool(
            "toggle_track_mute",
            "Toggle mute state of a track",
            json!({
                "type": "object",
                "properties": {
                    "track_index": {"type": "integer", "description": "Track index (1-based)"}
                },
                "required": ["track_index"],
            }),
        ),
        tool(
            "set_device_parameter",
            "Set value of a device parameter",
            json!({
                "type": "object",
                "properties": {
                    "param_index": {"type": "integer", "description": "Parameter index (1-based)"},
                    "value": {"type": "number", "description": "Parameter value (0-128)"},
                },
                "required": ["param_index", "value"],
            }),
        ),
        tool(
            "toggle_device_bypass",
            "Toggle bypass state of the currently selected device",
            no_arguments(),
        ),
        tool(
            "select_device_sibling",
            "Select a sibling device (in the same chain as current device)",
            json!({
                "type": "object",
                "properties": {
                    "sibling_index": {"type": "integer", "description": "Index of the sibling device (1-8)"}
                },
                "required": ["sibling_index"],
            }),
        ),
        tool(
            "navigate_device",
            "Navigate to next/previous device",
            json!({
                "type": "object",
                "properties": {
                    "direction": {
                        "type": "string",
                        "enum": ["next", "previous"],
                        "description": "Navigation direction",
                    }
                },
                "required": ["direction"],
            }),
        ),
        tool(
            "enter_device_layer",
            "Enter a device layer/chain",
            json!({
                "type": "object",
                "properties": {
                    "layer_index": {"type": "integer", "description": "Index of the layer to enter (1-8)"}
                },
                "required": ["layer_index"],
            }),
        ),
        tool(
            "exit_device_layer",
            "Exit current device layer (go to parent)",
            no_arguments(),
        ),
        tool(
            "toggle_device_window",
            "Toggle device window visibility",
            no_arguments(),
        ),
    ]
}

/// Runs a tool and reports the outcome as text.
///
/// Failures are reported in the content as `Error: ...` rather than returned, so that an
/// assistant always gets an answer it can read.
pub fn call_tool(controller: &Controller, name: &str, arguments: &Json) -> Vec<Content> {
    match execute(controller.client(), name, arguments) {
        Ok(text) => vec![Content::text(text)],
        Err(err) => {
            log::error!("Error executing tool {}: {}", name, err);
            vec![Content::text(format!("Error: {}", err))]
        }
    }
}

fn execute(client: &Client, name: &str, args: &Json) -> Result<String> {
    match name {
        "transport_play" => {
            client.play(None)?;
            Ok("Transport play/pause toggled".to_owned())
        }
        "transport_stop" => {
            client.stop()?;
            Ok("Transport stopped".to_owned())
        }
        "set_tempo" => {
            let bpm = client.set_tempo(number(args, "bpm")?)?;
            Ok(format!("Tempo set to {} BPM", bpm))
        }
        "set_track_volume" => {
            let track_index = integer(args, "track_index")?;
            let volume = client.set_track_volume(track_index, number(args, "volume")?)?;
            Ok(format!("Track {} volume set to {}", track_index, volume))
        }
        "set_track_pan" => {
            let track_index = integer(args, "track_index")?;
            let pan = client.set_track_pan(track_index, number(args, "pan")?)?;
            Ok(format!("Track {} pan set to {}", track_index, pan))
        }
        "toggle_track_mute" => {
            let track_index = integer(args, "track_index")?;
            client.toggle_track_mute(track_index)?;
            Ok(format!("Track {} mute toggled", track_index))
        }
        "set_device_parameter" => {
            let param_index = integer(args, "param_index")?;
            let value = client.set_device_parameter(param_index, number(args, "value")?)?;
            Ok(format!("Device parameter {} set to {}", param_index, value))
        }
        "toggle_device_bypass" => {
            client.toggle_device_bypass()?;
            Ok("Device bypass toggled".to_owned())
        }
        "select_device_sibling" => {
            let sibling_index = integer(args, "sibling_index")?;
            client.select_device_sibling(sibling_index)?;
            Ok(format!("Selected sibling device {}", sibling_index))
        }
        "navigate_device" => {
            let direction = direction(args, "direction")?;
            client.navigate_device(direction)?;
            Ok(format!("Navigated to {} device", direction))
        }
        "enter_device_layer" => {
            let layer_index = integer(args, "layer_index")?;
            client.enter_device_layer(layer_index)?;
            Ok(format!("Entered device layer {}", layer_index))
        }
        "exit_device_layer" => {
            client.exit_device_layer()?;
            Ok("Exited device layer".to_owned())
        }
        "toggle_device_window" => {
            client.toggle_device_window()?;
            Ok("Device window toggled".to_owned())
        }
        _ => Err(Error::not_found("Tool", name)),
    }
}

fn tool(name: &str, description: &str, input_schema: Json) -> Tool {
    Tool {
        name: name.to_owned(),
        description: description.to_owned(),
        input_schema,
    }
}

fn no_arguments() -> Json {
    json!({"type": "object", "properties": {}})
}

fn argument<'a>(args: &'a Json, name: &str) -> Result<&'a Json> {
    args.get(name)
        .filter(|value| !value.is_null())
        .ok_or_else(|| Error::invalid_parameter(name, "None", "is required"))
}

fn integer(args: &Json, name: &str) -> Result<i32> {
    let value = argument(args, name)?;
    value
        .as_i64()
        .and_then(|value| i32::try_from(value).ok())
        .ok_or_else(|| Error::invalid_parameter(name, value, "must be an integer"))
}

fn number(args: &Json, name: &str) -> Result<f64> {
    let value = argument(args, name)?;
    value
        .as_f64()
        .ok_or_else(|| Error::invalid_parameter(name, value, "must be a number"))
}

fn direction(args: &Json, name: &str) -> Result<Direction> {
    let value = argument(args, name)?;
    match value.as_str() {
        Some(direction) => direction.parse(),
        None => Err(Error::invalid_parameter(
            name,
            value,
            "must be 'next' or 'previous'",
        )),
    }
}
