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

//! Structured views assembled from the message cache.
//!
//! Bitwig has no request/response queries. A view is built by asking Bitwig to re-broadcast its
//! state (see [`Controller::refresh`](crate::controller::Controller::refresh)) and then scanning
//! the cached addresses. The functions here only do the scanning, so they can be used on any
//! [`MessageCache`].

use crate::{
    address::{
        Browser, BrowserFilter, BrowserFilterItem, BrowserResult, Device, DeviceLayer,
        DeviceParam, DeviceSibling, Track, Transport,
    },
    error::{Error, Result},
    limits,
    osc::Value,
    server::MessageCache,
};
use serde::Serialize;
use std::{collections::BTreeMap, fmt};

const MAX_TRACKS: i32 = 10;
const MAX_PARAMS: i32 = 8;
const MAX_SIBLINGS: i32 = 8;
const MAX_CHAIN: i32 = 8;
const MAX_LAYERS: i32 = 8;
const MAX_FILTERS: i32 = 6;
const MAX_FILTER_ITEMS: i32 = 16;
const MAX_RESULTS: i32 = 16;

fn truthy(cache: &MessageCache, addr: &str) -> bool {
    cache.get(addr).map_or(false, |value| value.is_truthy())
}

fn text(cache: &MessageCache, addr: &str) -> Option<String> {
    cache
        .get(addr)
        .filter(Value::is_truthy)
        .map(|value| value.to_string())
}

fn strip_prefix(snapshot: BTreeMap<String, Value>, prefix: &str) -> BTreeMap<String, Value> {
    snapshot
        .into_iter()
        .filter_map(|(addr, value)| {
            addr.strip_prefix(prefix)
                .map(|prop| (prop.to_owned(), value))
        })
        .collect()
}

fn yes_no(value: &Value) -> bool {
    value.is_truthy()
}

// ======================================================
// ==================== Tracks ==========================
// ======================================================

/// Everything cached for one track.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackInfo {
    pub index: i32,
    /// Properties keyed by the path after `/track/<index>/`, `name` included.
    pub fields: BTreeMap<String, Value>,
}

impl TrackInfo {
    pub fn name(&self) -> Option<&Value> {
        self.fields.get("name")
    }
}

impl fmt::Display for TrackInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const PROPERTIES: [(&str, &str); 8] = [
            ("type", "Type"),
            ("volume", "Volume"),
            ("pan", "Pan"),
            ("mute", "Mute"),
            ("solo", "Solo"),
            ("recarm", "Record Armed"),
            ("color", "Color"),
            ("sends", "Send Count"),
        ];

        let name = self.name().cloned().unwrap_or(Value::Nil);
        write!(f, "Track: {}\nIndex: {}", name, self.index)?;
        for (key, label) in PROPERTIES.iter() {
            match self.fields.get(*key) {
                Some(Value::Nil) | None => {}
                Some(value) if matches!(*key, "mute" | "solo" | "recarm") => {
                    write!(f, "\n{}: {}", label, yes_no(value))?
                }
                Some(value) => write!(f, "\n{}: {}", label, value)?,
            }
        }
        Ok(())
    }
}

/// Collects every cached property of a track.
///
/// # Errors
///
/// Returns [`Error::ResourceNotFound`] if the track has no name.
pub fn track_info(cache: &MessageCache, track_index: i32) -> Result<TrackInfo> {
    let track = Track(track_index);
    if !truthy(cache, &track.name()) {
        return Err(Error::not_found("Track", track_index));
    }
    let prefix = track.prefix();
    Ok(TrackInfo {
        index: track_index,
        fields: strip_prefix(cache.snapshot_prefix(&prefix), &prefix),
    })
}

/// A line in the track overview.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackSummary {
    pub index: i32,
    pub name: String,
    pub volume: Option<Value>,
    pub pan: Option<Value>,
    pub mute: Option<Value>,
    pub solo: Option<Value>,
    pub recarm: Option<Value>,
}

/// The named tracks among the first ten of the track bank.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackList(pub Vec<TrackSummary>);

pub fn tracks(cache: &MessageCache) -> TrackList {
    let summaries = (1..=MAX_TRACKS)
        .filter_map(|index| {
            let track = Track(index);
            let name = text(cache, &track.name())?;
            Some(TrackSummary {
                index,
                name,
                volume: cache.get(&track.volume()),
                pan: cache.get(&track.pan()),
                mute: cache.get(&track.mute()),
                solo: cache.get(&track.solo()),
                recarm: cache.get(&track.recarm()),
            })
        })
        .collect();
    TrackList(summaries)
}

impl fmt::Display for TrackList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "No tracks found");
        }
        write!(f, "Tracks:")?;
        for track in self.0.iter() {
            write!(f, "\n\nTrack {}: {}", track.index, track.name)?;
            let numbers = [("Volume", &track.volume), ("Pan", &track.pan)];
            for (label, value) in numbers.iter() {
                if let Some(value) = value {
                    write!(f, "\n  {}: {}", label, value)?;
                }
            }
            let flags = [
                ("Mute", &track.mute),
                ("Solo", &track.solo),
                ("Record Armed", &track.recarm),
            ];
            for (label, value) in flags.iter() {
                if let Some(value) = value {
                    write!(f, "\n  {}: {}", label, yes_no(value))?;
                }
            }
        }
        Ok(())
    }
}

// ======================================================
// ==================== Transport =======================
// ======================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransportState {
    pub playing: bool,
    pub tempo: Option<Value>,
    pub signature: Option<(Value, Value)>,
}

pub fn transport(cache: &MessageCache) -> TransportState {
    let numerator = cache.get(Transport::SIGNATURE_NUMERATOR);
    let denominator = cache.get(Transport::SIGNATURE_DENOMINATOR);
    TransportState {
        playing: truthy(cache, Transport::PLAY),
        tempo: cache.get(Transport::TEMPO).filter(|tempo| *tempo != Value::Nil),
        signature: numerator.zip(denominator),
    }
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Transport State:\nPlaying: {}", self.playing)?;
        if let Some(tempo) = &self.tempo {
            write!(f, "\nTempo: {} BPM", tempo)?;
        }
        if let Some((numerator, denominator)) = &self.signature {
            write!(f, "\nTime Signature: {}/{}", numerator, denominator)?;
        }
        Ok(())
    }
}

// ======================================================
// ==================== Devices =========================
// ======================================================

fn device_name(cache: &MessageCache) -> Option<String> {
    if !truthy(cache, Device::EXISTS) {
        return None;
    }
    Some(
        cache
            .get(Device::NAME)
            .unwrap_or(Value::Nil)
            .to_string(),
    )
}

/// A remote-control parameter of the cursor device.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceParameter {
    pub index: i32,
    /// Properties keyed by the path after `/device/param/<index>/`, without `exists`.
    pub fields: BTreeMap<String, Value>,
}

/// Collects the existing parameters of the cursor device.
///
/// # Errors
///
/// Returns [`Error::ResourceNotFound`] if no device is selected.
pub fn device_params(cache: &MessageCache) -> Result<Vec<DeviceParameter>> {
    if !truthy(cache, Device::EXISTS) {
        return Err(Error::not_found("Device", "No device selected"));
    }
    Ok(collect_params(cache))
}

fn collect_params(cache: &MessageCache) -> Vec<DeviceParameter> {
    (1..=MAX_PARAMS)
        .filter(|index| truthy(cache, &DeviceParam(*index).exists()))
        .filter_map(|index| {
            let prefix = DeviceParam(index).prefix();
            let mut fields = strip_prefix(cache.snapshot_prefix(&prefix), &prefix);
            fields.remove("exists");
            if fields.is_empty() {
                None
            } else {
                Some(DeviceParameter { index, fields })
            }
        })
        .collect()
}

/// The cursor device and its parameters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceParameters {
    pub device: String,
    pub params: Vec<DeviceParameter>,
}

/// Returns `None` if no device is selected.
pub fn device_parameters(cache: &MessageCache) -> Option<DeviceParameters> {
    Some(DeviceParameters {
        device: device_name(cache)?,
        params: collect_params(cache),
    })
}

impl fmt::Display for DeviceParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Device: {}\nParameters:", self.device)?;
        for param in self.params.iter() {
            let name = param.fields.get("name").cloned().unwrap_or(Value::Nil);
            let value = param.fields.get("value").cloned().unwrap_or(Value::Nil);
            write!(f, "\n  {}: {} = {}", param.index, name, value)?;
            if let Some(value_str) = param.fields.get("value/str").filter(|v| v.is_truthy()) {
                write!(f, " ({})", value_str)?;
            }
        }
        Ok(())
    }
}

/// The cursor device and the chain it sits in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceChain {
    pub device: String,
    pub chain_size: Option<i32>,
    pub chain: Vec<(i32, String)>,
}

/// Returns `None` if no device is selected.
pub fn device(cache: &MessageCache) -> Option<DeviceChain> {
    let device = device_name(cache)?;
    let chain_size = cache
        .get(Device::CHAIN_SIZE)
        .and_then(|size| size.as_int())
        .filter(|size| *size > 0);
    let chain = (1..=chain_size.unwrap_or(0).min(MAX_CHAIN))
        .filter_map(|index| text(cache, &Device::chain_name(index)).map(|name| (index, name)))
        .collect();
    Some(DeviceChain {
        device,
        chain_size,
        chain,
    })
}

impl fmt::Display for DeviceChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Active Device: {}", self.device)?;
        if let Some(size) = self.chain_size {
            write!(f, "\nDevice Chain Size: {}", size)?;
        }
        for (index, name) in self.chain.iter() {
            write!(f, "\n  {}: {}", index, name)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sibling {
    pub index: i32,
    pub name: String,
    pub bypassed: Option<bool>,
}

/// The devices in the same chain as the cursor device.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceSiblings {
    pub device: String,
    pub siblings: Vec<Sibling>,
}

/// Returns `None` if no device is selected.
///
/// Only the first eight siblings are reachable over OSC.
pub fn device_siblings(cache: &MessageCache) -> Option<DeviceSiblings> {
    let device = device_name(cache)?;
    let chain_size = cache
        .get(Device::CHAIN_SIZE)
        .and_then(|size| size.as_int())
        .unwrap_or(0);
    let siblings = (1..=chain_size.min(MAX_SIBLINGS))
        .map(DeviceSibling)
        .filter(|sibling| truthy(cache, &sibling.exists()))
        .map(|sibling| Sibling {
            index: sibling.0,
            name: cache.get(&sibling.name()).unwrap_or(Value::Nil).to_string(),
            bypassed: cache
                .get(&sibling.bypass())
                .filter(|value| *value != Value::Nil)
                .map(|value| value.is_truthy()),
        })
        .collect();
    Some(DeviceSiblings { device, siblings })
}

impl fmt::Display for DeviceSiblings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Current Device: {}\nSibling Devices:", self.device)?;
        for sibling in self.siblings.iter() {
            write!(f, "\n  {}: {}", sibling.index, sibling.name)?;
            if let Some(bypassed) = sibling.bypassed {
                write!(f, "\n    Bypassed: {}", bypassed)?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Layer {
    pub index: i32,
    pub name: String,
    pub chain_size: Option<Value>,
}

/// The layers of the cursor device.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceLayers {
    pub device: String,
    pub layers: Vec<Layer>,
}

/// Returns `None` if no device is selected.
pub fn device_layers(cache: &MessageCache) -> Option<DeviceLayers> {
    let device = device_name(cache)?;
    let layers = if truthy(cache, Device::LAYER_EXISTS) {
        (1..=MAX_LAYERS)
            .map(DeviceLayer)
            .filter(|layer| truthy(cache, &layer.exists()))
            .map(|layer| Layer {
                index: layer.0,
                name: cache.get(&layer.name()).unwrap_or(Value::Nil).to_string(),
                chain_size: cache.get(&layer.chain_size()).filter(Value::is_truthy),
            })
            .collect()
    } else {
        Vec::new()
    };
    Some(DeviceLayers { device, layers })
}

impl fmt::Display for DeviceLayers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Device: {}\nLayers:", self.device)?;
        for layer in self.layers.iter() {
            write!(f, "\n  {}: {}", layer.index, layer.name)?;
            if let Some(size) = &layer.chain_size {
                write!(f, "\n    Contains {} devices", size)?;
            }
        }
        Ok(())
    }
}

// ======================================================
// ==================== Browser =========================
// ======================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterItem {
    pub index: i32,
    pub name: String,
    pub selected: bool,
}

/// A browser filter column and its visible entries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Filter {
    pub index: i32,
    pub name: String,
    pub items: Vec<FilterItem>,
}

impl Filter {
    /// The names of the selected entries.
    pub fn selected(&self) -> impl Iterator<Item = &str> {
        self.items
            .iter()
            .filter(|item| item.selected)
            .map(|item| item.name.as_str())
    }
}

/// A row of the browser's result list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BrowserEntry {
    pub index: i32,
    pub name: String,
    pub selected: bool,
}

/// The state of the popup browser's filter columns and result list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BrowserState {
    pub active: bool,
    pub tab: Option<Value>,
    pub filters: Vec<Filter>,
    pub results: Vec<BrowserEntry>,
}

pub fn browser_filters(cache: &MessageCache) -> BrowserState {
    let filters = (1..=MAX_FILTERS)
        .map(BrowserFilter)
        .filter(|filter| truthy(cache, &filter.exists()))
        .filter_map(|filter| {
            let name = text(cache, &filter.name())?;
            Some(Filter {
                index: filter.0,
                name,
                items: filter_items(cache, filter),
            })
        })
        .collect();
    let results = (1..=MAX_RESULTS)
        .map(BrowserResult)
        .take_while(|result| truthy(cache, &result.exists()))
        .filter_map(|result| {
            Some(BrowserEntry {
                index: result.0,
                name: text(cache, &result.name())?,
                selected: truthy(cache, &result.is_selected()),
            })
        })
        .collect();
    BrowserState {
        active: truthy(cache, Browser::IS_ACTIVE),
        tab: cache.get(Browser::TAB).filter(Value::is_truthy),
        filters,
        results,
    }
}

/// Reads one entry of a filter column. `None` if the entry is not shown.
///
/// # Errors
///
/// Returns [`Error::InvalidParameter`] for a filter index outside 1..=6 or an item index outside
/// 1..=16.
pub fn filter_item(
    cache: &MessageCache,
    filter_index: i32,
    item_index: i32,
) -> Result<Option<FilterItem>> {
    let filter = BrowserFilter(limits::FILTER_INDEX.index_value(filter_index)?);
    let item = filter.item(limits::FILTER_ITEM_INDEX.index_value(item_index)?);
    if !truthy(cache, &item.exists()) {
        return Ok(None);
    }
    Ok(read_filter_item(cache, item))
}

fn filter_items(cache: &MessageCache, filter: BrowserFilter) -> Vec<FilterItem> {
    (1..=MAX_FILTER_ITEMS)
        .map(|index| filter.item(index))
        .take_while(|item| truthy(cache, &item.exists()))
        .filter_map(|item| read_filter_item(cache, item))
        .collect()
}

fn read_filter_item(cache: &MessageCache, item: BrowserFilterItem) -> Option<FilterItem> {
    Some(FilterItem {
        index: item.1,
        name: text(cache, &item.name())?,
        selected: truthy(cache, &item.is_selected()),
    })
}

impl fmt::Display for BrowserState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Browser Active: {}", self.active)?;
        if let Some(tab) = &self.tab {
            write!(f, "\nTab: {}", tab)?;
        }
        if self.filters.is_empty() {
            write!(f, "\nNo browser filters found")?;
        } else {
            write!(f, "\nFilters:")?;
        }
        for filter in self.filters.iter() {
            write!(f, "\n  {}: {}", filter.index, filter.name)?;
            for item in filter.items.iter() {
                write!(f, "\n    [{}] {}", mark(item.selected), item.name)?;
            }
        }
        if !self.results.is_empty() {
            write!(f, "\nResults:")?;
        }
        for result in self.results.iter() {
            write!(f, "\n  [{}] {}: {}", mark(result.selected), result.index, result.name)?;
        }
        Ok(())
    }
}

fn mark(selected: bool) -> &'static str {
    if selected {
        "x"
    } else {
        " "
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache(entries: &[(&str, Value)]) -> MessageCache {
        let cache = MessageCache::new();
        for (addr, value) in entries {
            cache.insert(addr, value.clone());
        }
        cache
    }

    #[test]
    fn test_track_info_excludes_other_tracks() {
        let cache = cache(&[
            ("/track/1/name", Value::from("Bass")),
            ("/track/1/volume", Value::Int(64)),
            ("/track/1/pan", Value::Int(64)),
            ("/track/1/mute", Value::Int(0)),
            ("/track/1/solo", Value::Int(0)),
            ("/track/2/name", Value::from("Drums")),
            ("/track/2/volume", Value::Int(100)),
            ("/track/10/name", Value::from("Lead")),
        ]);
        let info = track_info(&cache, 1).unwrap();
        assert_eq!(info.index, 1);
        assert_eq!(
            info.fields.keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["mute", "name", "pan", "solo", "volume"]
        );
        assert_eq!(info.name(), Some(&Value::from("Bass")));
        assert_eq!(
            info.to_string(),
            "Track: Bass\nIndex: 1\nVolume: 64\nPan: 64\nMute: false\nSolo: false"
        );
    }

    #[test]
    fn test_track_info_requires_name() {
        let cache = cache(&[
            ("/track/3/volume", Value::Int(64)),
            ("/track/4/name", Value::from("")),
        ]);
        assert_eq!(track_info(&cache, 3), Err(Error::not_found("Track", 3)));
        assert_eq!(track_info(&cache, 4), Err(Error::not_found("Track", 4)));
    }

    #[test]
    fn test_tracks() {
        let cache = cache(&[
            ("/track/1/name", Value::from("Bass")),
            ("/track/1/mute", Value::Int(1)),
            ("/track/3/name", Value::from("Keys")),
            ("/track/3/volume", Value::Float(80.5)),
        ]);
        let list = tracks(&cache);
        assert_eq!(list.0.len(), 2);
        assert_eq!(
            list.to_string(),
            "Tracks:\n\nTrack 1: Bass\n  Mute: true\n\nTrack 3: Keys\n  Volume: 80.5"
        );
        assert_eq!(tracks(&MessageCache::new()).to_string(), "No tracks found");
    }

    #[test]
    fn test_transport() {
        let cache = cache(&[
            ("/play", Value::Int(1)),
            ("/tempo/raw", Value::Float(120.0)),
            ("/signature/numerator", Value::Int(7)),
            ("/signature/denominator", Value::Int(8)),
        ]);
        assert_eq!(
            transport(&cache).to_string(),
            "Transport State:\nPlaying: true\nTempo: 120 BPM\nTime Signature: 7/8"
        );
        assert_eq!(
            transport(&MessageCache::new()).to_string(),
            "Transport State:\nPlaying: false"
        );
    }

    #[test]
    fn test_device_params() {
        let cache = cache(&[
            ("/device/exists", Value::Int(1)),
            ("/device/name", Value::from("EQ+")),
            ("/device/param/1/exists", Value::Int(1)),
            ("/device/param/1/name", Value::from("Gain")),
            ("/device/param/1/value", Value::Int(64)),
            ("/device/param/1/value/str", Value::from("0.0 dB")),
            ("/device/param/2/exists", Value::Int(0)),
            ("/device/param/2/name", Value::from("Hidden")),
        ]);
        let params = device_params(&cache).unwrap();
        assert_eq!(params.len(), 1);
        assert_eq!(params[0].index, 1);
        assert_eq!(
            params[0].fields.keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["name", "value", "value/str"]
        );
        assert_eq!(
            device_parameters(&cache).unwrap().to_string(),
            "Device: EQ+\nParameters:\n  1: Gain = 64 (0.0 dB)"
        );
    }

    #[test]
    fn test_device_params_requires_device() {
        let cache = cache(&[("/device/exists", Value::Int(0))]);
        assert_eq!(
            device_params(&cache),
            Err(Error::not_found("Device", "No device selected"))
        );
        assert_eq!(device_parameters(&cache), None);
    }

    #[test]
    fn test_device_chain_and_siblings() {
        let cache = cache(&[
            ("/device/exists", Value::Int(1)),
            ("/device/name", Value::from("Polymer")),
            ("/device/chain/size", Value::Int(2)),
            ("/device/chain/1/name", Value::from("Polymer")),
            ("/device/chain/2/name", Value::from("Delay+")),
            ("/device/sibling/1/exists", Value::Int(1)),
            ("/device/sibling/1/name", Value::from("Delay+")),
            ("/device/sibling/1/bypass", Value::Int(1)),
            ("/device/sibling/2/exists", Value::Int(0)),
        ]);
        assert_eq!(
            device(&cache).unwrap().to_string(),
            "Active Device: Polymer\nDevice Chain Size: 2\n  1: Polymer\n  2: Delay+"
        );
        assert_eq!(
            device_siblings(&cache).unwrap().to_string(),
            "Current Device: Polymer\nSibling Devices:\n  1: Delay+\n    Bypassed: true"
        );
    }

    #[test]
    fn test_device_chain_is_capped() {
        let cache = cache(&[
            ("/device/exists", Value::Int(1)),
            ("/device/name", Value::from("Polymer")),
            ("/device/chain/size", Value::Int(i32::MAX)),
            ("/device/chain/1/name", Value::from("Polymer")),
            ("/device/chain/9/name", Value::from("Hidden")),
        ]);
        let chain = device(&cache).unwrap();
        assert_eq!(chain.chain_size, Some(i32::MAX));
        assert_eq!(chain.chain, vec![(1, "Polymer".to_owned())]);
    }

    #[test]
    fn test_device_layers() {
        let cache = cache(&[
            ("/device/exists", Value::Int(1)),
            ("/device/name", Value::from("Instrument Layer")),
            ("/device/layer/exists", Value::Int(1)),
            ("/device/layer/1/exists", Value::Int(1)),
            ("/device/layer/1/name", Value::from("Pad")),
            ("/device/layer/1/chain/size", Value::Int(3)),
            ("/device/layer/2/exists", Value::Int(1)),
            ("/device/layer/2/name", Value::from("Sub")),
        ]);
        let layers = device_layers(&cache).unwrap();
        assert_eq!(layers.layers.len(), 2);
        assert_eq!(
            layers.to_string(),
            "Device: Instrument Layer\nLayers:\n  1: Pad\n    Contains 3 devices\n  2: Sub"
        );
    }

    #[test]
    fn test_browser_filters_stop_at_first_missing_item() {
        let cache = cache(&[
            ("/browser/isActive", Value::Int(1)),
            ("/browser/tab", Value::from("Devices")),
            ("/browser/filter/1/exists", Value::Int(1)),
            ("/browser/filter/1/name", Value::from("Creator")),
            ("/browser/filter/1/item/1/exists", Value::Int(1)),
            ("/browser/filter/1/item/1/name", Value::from("Bitwig")),
            ("/browser/filter/1/item/1/isSelected", Value::Int(1)),
            ("/browser/filter/1/item/2/exists", Value::Int(1)),
            ("/browser/filter/1/item/2/name", Value::from("u-he")),
            ("/browser/filter/1/item/4/exists", Value::Int(1)),
            ("/browser/filter/1/item/4/name", Value::from("Unreachable")),
            ("/browser/filter/2/exists", Value::Int(0)),
            ("/browser/filter/2/name", Value::from("Category")),
        ]);
        let state = browser_filters(&cache);
        assert!(state.active);
        assert_eq!(state.filters.len(), 1);
        assert_eq!(state.filters[0].items.len(), 2);
        assert_eq!(state.filters[0].selected().collect::<Vec<_>>(), vec!["Bitwig"]);
        assert_eq!(
            state.to_string(),
            "Browser Active: true\nTab: Devices\nFilters:\n  1: Creator\n    [x] Bitwig\n    [ ] u-he"
        );
    }

    #[test]
    fn test_browser_results_and_single_items() {
        let cache = cache(&[
            ("/browser/isActive", Value::Int(1)),
            ("/browser/filter/3/item/2/exists", Value::Int(1)),
            ("/browser/filter/3/item/2/name", Value::from("Delay")),
            ("/browser/filter/3/item/2/isSelected", Value::Int(1)),
            ("/browser/result/1/exists", Value::Int(1)),
            ("/browser/result/1/name", Value::from("Delay-4")),
            ("/browser/result/2/exists", Value::Int(1)),
            ("/browser/result/2/name", Value::from("Delay-2")),
            ("/browser/result/2/isSelected", Value::Int(1)),
        ]);

        let state = browser_filters(&cache);
        assert_eq!(state.results.len(), 2);
        assert_eq!(
            state.to_string(),
            "Browser Active: true\nNo browser filters found\nResults:\n  [ ] 1: Delay-4\n  [x] 2: Delay-2"
        );

        let item = filter_item(&cache, 3, 2).unwrap().unwrap();
        assert_eq!(item.name, "Delay");
        assert!(item.selected);
        assert_eq!(filter_item(&cache, 3, 3), Ok(None));
        assert!(matches!(
            filter_item(&cache, 3, 17),
            Err(Error::InvalidParameter { .. })
        ));
        assert!(matches!(
            filter_item(&cache, 7, 1),
            Err(Error::InvalidParameter { .. })
        ));
    }
}
