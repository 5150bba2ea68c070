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

use super::Resource;
use crate::{
    controller::{Controller, DEFAULT_TIMEOUT},
    error::{Error, Result},
    limits, snapshot,
};
use std::str::FromStr;

/// Every resource the bridge offers. `bitwig://track/{index}` is a template.
pub fn resources() -> Vec<Resource> {
    vec![
        resource(
            "bitwig://transport",
            "Transport Info",
            "Current transport state (play/stop, tempo, etc.)",
        ),
        resource(
            "bitwig://tracks",
            "Tracks Info",
            "Information about all tracks in the project",
        ),
        resource(
            "bitwig://track/{index}",
            "Track Details",
            "Detailed information about a specific track",
        ),
        resource(
            "bitwig://devices",
            "Devices Info",
            "Information about active devices and parameters",
        ),
        resource(
            "bitwig://device/parameters",
            "Device Parameters",
            "Parameters for the selected device",
        ),
        resource(
            "bitwig://device/siblings",
            "Device Siblings",
            "List of sibling devices in the current device chain",
        ),
        resource(
            "bitwig://device/layers",
            "Device Layers",
            "List of layers in the current device",
        ),
        resource(
            "bitwig://browser/filters",
            "Browser Filters",
            "Filters and selected filter items of the open browser",
        ),
        resource(
            "bitwig://status",
            "Connection Status",
            "Health and diagnostics of the connection to Bitwig",
        ),
    ]
}

/// Renders a resource as text.
///
/// State resources refresh first. A refresh that gets no answer is logged and the cached state
/// is rendered anyway.
///
/// # Errors
///
/// Returns [`Error::ResourceNotFound`] for unknown URIs or missing tracks and
/// [`Error::InvalidParameter`] for malformed track URIs.
pub fn read_resource(controller: &Controller, uri: &str) -> Result<String> {
    let resource: Uri = uri.parse()?;
    if resource == Uri::Status {
        return Ok(controller.status().to_string());
    }

    if let Err(err) = controller.refresh(DEFAULT_TIMEOUT) {
        log::warn!("Reading {} from cached state: {}", uri, err);
    }

    let cache = controller.messages();
    let text = match resource {
        Uri::Transport => snapshot::transport(cache).to_string(),
        Uri::Tracks => snapshot::tracks(cache).to_string(),
        Uri::Track(index) => snapshot::track_info(cache, index)?.to_string(),
        Uri::Devices => snapshot::device(cache)
            .map_or_else(|| "No active device found".to_owned(), |d| d.to_string()),
        Uri::DeviceParameters => snapshot::device_parameters(cache)
            .map_or_else(|| "No device parameters found".to_owned(), |p| p.to_string()),
        Uri::DeviceSiblings => snapshot::device_siblings(cache)
            .map_or_else(|| "No sibling devices found".to_owned(), |s| s.to_string()),
        Uri::DeviceLayers => snapshot::device_layers(cache).map_or_else(
            || "No device layers found or device does not support layers".to_owned(),
            |l| l.to_string(),
        ),
        Uri::BrowserFilters => snapshot::browser_filters(cache).to_string(),
        Uri::Status => unreachable!("status is rendered without a refresh"),
    };
    Ok(text)
}

fn resource(uri: &str, name: &str, description: &str) -> Resource {
    Resource {
        uri: uri.to_owned(),
        name: name.to_owned(),
        description: description.to_owned(),
        mime_type: "text/plain".to_owned(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Uri {
    Transport,
    Tracks,
    Track(i32),
    Devices,
    DeviceParameters,
    DeviceSiblings,
    DeviceLayers,
    BrowserFilters,
    Status,
}

impl FromStr for Uri {
    type Err = Error;

    fn from_str(uri: &str) -> Result<Uri> {
        let not_found = || Error::not_found("Resource", uri);
        let path = uri.strip_prefix("bitwig://").ok_or_else(not_found)?;
        let resource = match path {
            "transport" => Uri::Transport,
            "tracks" => Uri::Tracks,
            "devices" => Uri::Devices,
            "device/parameters" => Uri::DeviceParameters,
            "device/siblings" => Uri::DeviceSiblings,
            "device/layers" => Uri::DeviceLayers,
            "browser/filters" => Uri::BrowserFilters,
            "status" => Uri::Status,
            _ => {
                let index = path.strip_prefix("track/").ok_or_else(not_found)?;
                let index = index.parse().map_err(|_| {
                    Error::invalid_parameter("uri", uri, "track index must be an integer")
                })?;
                Uri::Track(limits::TRACK_INDEX.index_value(index)?)
            }
        };
        Ok(resource)
    }
}
