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

//! Builders for the OSC addresses exposed by Bitwig's control surface.
//!
//! Addresses embed 1-based indices in their path segments (`/track/3/volume`). Every address the
//! bridge sends or reads is built here.

use crate::error::{Error, Result};
use std::{fmt, str::FromStr};

/// Asks Bitwig to re-broadcast its complete state. Sent with the value `1`.
pub const REFRESH: &str = "/refresh";

/// Navigation direction used by devices, browser tabs, filters and results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Next,
    Previous,
}

impl Direction {
    fn symbol(self) -> &'static str {
        match self {
            Direction::Next => "+",
            Direction::Previous => "-",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Next => write!(f, "next"),
            Direction::Previous => write!(f, "previous"),
        }
    }
}

impl FromStr for Direction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Direction> {
        match s {
            "next" => Ok(Direction::Next),
            "previous" => Ok(Direction::Previous),
            _ => Err(Error::invalid_parameter(
                "direction",
                s,
                "must be 'next' or 'previous'",
            )),
        }
    }
}

/// Transport addresses.
pub struct Transport;

impl Transport {
    pub const PLAY: &'static str = "/play";
    pub const STOP: &'static str = "/stop";
    pub const TEMPO: &'static str = "/tempo/raw";
    pub const SIGNATURE_NUMERATOR: &'static str = "/signature/numerator";
    pub const SIGNATURE_DENOMINATOR: &'static str = "/signature/denominator";
}

/// A track in the current track bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Track(pub i32);

impl Track {
    /// The prefix shared by all of the track's properties, including the trailing slash.
    pub fn prefix(self) -> String {
        format!("/track/{}/", self.0)
    }

    pub fn prop(self, name: &str) -> String {
        format!("/track/{}/{}", self.0, name)
    }

    pub fn name(self) -> String {
        self.prop("name")
    }

    pub fn volume(self) -> String {
        self.prop("volume")
    }

    pub fn pan(self) -> String {
        self.prop("pan")
    }

    pub fn mute(self) -> String {
        self.prop("mute")
    }

    pub fn solo(self) -> String {
        self.prop("solo")
    }

    pub fn recarm(self) -> String {
        self.prop("recarm")
    }
}

/// The cursor device.
pub struct Device;

impl Device {
    pub const EXISTS: &'static str = "/device/exists";
    pub const NAME: &'static str = "/device/name";
    pub const BYPASS: &'static str = "/device/bypass";
    pub const WINDOW: &'static str = "/device/window";
    pub const CHAIN_SIZE: &'static str = "/device/chain/size";
    pub const LAYER_EXISTS: &'static str = "/device/layer/exists";
    pub const LAYER_PARENT: &'static str = "/device/layer/parent";

    pub fn navigate(direction: Direction) -> String {
        format!("/device/{}", direction.symbol())
    }

    pub fn chain_name(index: i32) -> String {
        format!("/device/chain/{}/name", index)
    }
}

/// One of the eight remote-control parameters of the cursor device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceParam(pub i32);

impl DeviceParam {
    pub fn prefix(self) -> String {
        format!("/device/param/{}/", self.0)
    }

    pub fn exists(self) -> String {
        format!("{}exists", self.prefix())
    }

    pub fn name(self) -> String {
        format!("{}name", self.prefix())
    }

    pub fn value(self) -> String {
        format!("{}value", self.prefix())
    }

    pub fn value_str(self) -> String {
        format!("{}value/str", self.prefix())
    }
}

/// A device next to the cursor device in the same chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceSibling(pub i32);

impl DeviceSibling {
    pub fn exists(self) -> String {
        format!("/device/sibling/{}/exists", self.0)
    }

    pub fn name(self) -> String {
        format!("/device/sibling/{}/name", self.0)
    }

    pub fn bypass(self) -> String {
        format!("/device/sibling/{}/bypass", self.0)
    }

    pub fn select(self) -> String {
        format!("/device/sibling/{}/select", self.0)
    }
}

/// A layer of the cursor device (instrument and FX layers, drum pads).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceLayer(pub i32);

impl DeviceLayer {
    pub fn exists(self) -> String {
        format!("/device/layer/{}/exists", self.0)
    }

    pub fn name(self) -> String {
        format!("/device/layer/{}/name", self.0)
    }

    pub fn chain_size(self) -> String {
        format!("/device/layer/{}/chain/size", self.0)
    }

    pub fn select(self) -> String {
        format!("/device/layer/{}/select", self.0)
    }
}

/// The popup browser.
pub struct Browser;

impl Browser {
    pub const IS_ACTIVE: &'static str = "/browser/isActive";
    pub const TAB: &'static str = "/browser/tab";
    pub const SHOW: &'static str = "/browser/preset";
    pub const COMMIT: &'static str = "/browser/commit";
    pub const CANCEL: &'static str = "/browser/cancel";

    pub fn navigate_tab(direction: Direction) -> String {
        format!("/browser/tab/{}", direction.symbol())
    }

    pub fn navigate_result(direction: Direction) -> String {
        format!("/browser/result/{}", direction.symbol())
    }
}

/// A filter column of the browser (creator, category, tags, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrowserFilter(pub i32);

impl BrowserFilter {
    pub fn exists(self) -> String {
        format!("/browser/filter/{}/exists", self.0)
    }

    pub fn name(self) -> String {
        format!("/browser/filter/{}/name", self.0)
    }

    pub fn reset(self) -> String {
        format!("/browser/filter/{}/reset", self.0)
    }

    pub fn navigate(self, direction: Direction) -> String {
        format!("/browser/filter/{}/{}", self.0, direction.symbol())
    }

    pub fn item(self, index: i32) -> BrowserFilterItem {
        BrowserFilterItem(self.0, index)
    }
}

/// An entry of a browser filter column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrowserFilterItem(pub i32, pub i32);

impl BrowserFilterItem {
    pub fn exists(self) -> String {
        format!("/browser/filter/{}/item/{}/exists", self.0, self.1)
    }

    pub fn name(self) -> String {
        format!("/browser/filter/{}/item/{}/name", self.0, self.1)
    }

    pub fn is_selected(self) -> String {
        format!("/browser/filter/{}/item/{}/isSelected", self.0, self.1)
    }
}

/// A row of the browser's result list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrowserResult(pub i32);

impl BrowserResult {
    pub fn exists(self) -> String {
        format!("/browser/result/{}/exists", self.0)
    }

    pub fn name(self) -> String {
        format!("/browser/result/{}/name", self.0)
    }

    pub fn is_selected(self) -> String {
        format!("/browser/result/{}/isSelected", self.0)
    }
}
