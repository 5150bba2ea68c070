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

//! The outbound half of the bridge.
//!
//! [`Client`] turns logical commands into OSC datagrams sent to Bitwig's listening port. Setters
//! for continuous controls clamp their values, index arguments are validated and rejected, see
//! [`limits`](crate::limits).

use crate::{
    address::{
        Browser, BrowserFilter, Device, DeviceLayer, DeviceParam, DeviceSibling, Direction, Track,
        Transport, REFRESH,
    },
    error::{Error, Result},
    limits,
    osc::{self, Value},
};
use std::{
    fmt,
    net::{SocketAddr, ToSocketAddrs, UdpSocket},
    sync::{Arc, Mutex},
};

/// A client that sends commands to Bitwig.
///
/// `Client` is safe to clone and use concurrently by multiple threads. Clones share the socket
/// and the send log.
#[derive(Clone)]
pub struct Client(Arc<ClientInner>);

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sent_len = self.0.sent.lock().unwrap().len();
        f.debug_struct("Client")
            .field("socket", &self.0.socket)
            .field("sent", &sent_len)
            .finish()
    }
}

struct ClientInner {
    socket: UdpSocket,
    // Every address sent, in order. Used for diagnostics and by tests.
    sent: Mutex<Vec<String>>,
}

impl Client {
    /// Creates a client that sends to the given UDP address.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if a UDP socket cannot be bound or connected.
    pub fn connect<A: ToSocketAddrs>(bitwig_address: A) -> Result<Client> {
        let socket = UdpSocket::bind("0.0.0.0:0")
            .map_err(|err| Error::connection(format!("binding UDP socket: {}", err)))?;
        socket
            .connect(bitwig_address)
            .map_err(|err| Error::connection(format!("connecting UDP socket: {}", err)))?;
        Ok(Client(Arc::new(ClientInner {
            socket,
            sent: Mutex::new(Vec::new()),
        })))
    }

    /// Returns the address that datagrams are sent to.
    pub fn peer_addr(&self) -> Result<SocketAddr> {
        self.0
            .socket
            .peer_addr()
            .map_err(|err| Error::connection(format!("reading peer address: {}", err)))
    }

    /// Sends a single value to an address.
    ///
    /// # Errors
    ///
    /// Returns an error if the message cannot be encoded or if the socket refuses it.
    pub fn send(&self, addr: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        log::debug!("send: {} {}", addr, value);
        let bytes = osc::encode_message(addr, value)?;
        self.0
            .socket
            .send(&bytes)
            .map_err(|err| Error::connection(format!("Socket error: {}", err)))?;
        self.0.sent.lock().unwrap().push(addr.to_owned());
        Ok(())
    }

    /// Returns every address sent so far, oldest first.
    pub fn sent_addresses(&self) -> Vec<String> {
        self.0.sent.lock().unwrap().clone()
    }

    pub fn clear_sent_addresses(&self) {
        self.0.sent.lock().unwrap().clear();
    }

    /// Requests a refresh of all values from Bitwig.
    pub fn refresh(&self) -> Result<()> {
        self.send(REFRESH, 1)
    }

    // ======================================================
    // ==================== Transport =======================
    // ======================================================

    /// Starts (`Some(true)`), stops (`Some(false)`) or toggles (`None`) playback.
    pub fn play(&self, state: Option<bool>) -> Result<()> {
        self.send(Transport::PLAY, state)
    }

    pub fn stop(&self) -> Result<()> {
        self.send(Transport::STOP, 1)
    }

    /// Sets the tempo in beats per minute, clamped to 20-999. Returns the tempo sent.
    pub fn set_tempo(&self, bpm: f64) -> Result<f64> {
        let bpm = limits::TEMPO.value(bpm)?;
        self.send(Transport::TEMPO, bpm)?;
        Ok(bpm)
    }

    // ======================================================
    // ==================== Tracks ==========================
    // ======================================================

    /// Sets a track's volume, clamped to 0-128 where 64 is 0dB.
    pub fn set_track_volume(&self, track_index: i32, volume: f64) -> Result<f64> {
        let track = Track(limits::TRACK_INDEX.index_value(track_index)?);
        let volume = limits::VOLUME.value(volume)?;
        self.send(&track.volume(), volume)?;
        Ok(volume)
    }

    /// Sets a track's pan, clamped to 0-128 where 64 is center.
    pub fn set_track_pan(&self, track_index: i32, pan: f64) -> Result<f64> {
        let track = Track(limits::TRACK_INDEX.index_value(track_index)?);
        let pan = limits::PAN.value(pan)?;
        self.send(&track.pan(), pan)?;
        Ok(pan)
    }

    pub fn toggle_track_mute(&self, track_index: i32) -> Result<()> {
        let track = Track(limits::TRACK_INDEX.index_value(track_index)?);
        self.send(&track.mute(), Value::Nil)
    }

    pub fn set_track_mute(&self, track_index: i32, mute: bool) -> Result<()> {
        let track = Track(limits::TRACK_INDEX.index_value(track_index)?);
        self.send(&track.mute(), mute)
    }

    pub fn set_track_solo(&self, track_index: i32, solo: bool) -> Result<()> {
        let track = Track(limits::TRACK_INDEX.index_value(track_index)?);
        self.send(&track.solo(), solo)
    }

    // ======================================================
    // ==================== Devices =========================
    // ======================================================

    /// Sets one of the cursor device's remote-control parameters, clamped to 0-128.
    pub fn set_device_parameter(&self, param_index: i32, value: f64) -> Result<f64> {
        let param = DeviceParam(limits::PARAMETER_INDEX.index_value(param_index)?);
        let value = limits::PARAMETER_VALUE.value(value)?;
        self.send(&param.value(), value)?;
        Ok(value)
    }

    pub fn toggle_device_bypass(&self) -> Result<()> {
        self.send(Device::BYPASS, Value::Nil)
    }

    pub fn select_device_sibling(&self, sibling_index: i32) -> Result<()> {
        let sibling = DeviceSibling(limits::SIBLING_INDEX.index_value(sibling_index)?);
        self.send(&sibling.select(), 1)
    }

    pub fn navigate_device(&self, direction: Direction) -> Result<()> {
        self.send(&Device::navigate(direction), 1)
    }

    pub fn enter_device_layer(&self, layer_index: i32) -> Result<()> {
        let layer = DeviceLayer(limits::LAYER_INDEX.index_value(layer_index)?);
        self.send(&layer.select(), 1)
    }

    pub fn exit_device_layer(&self) -> Result<()> {
        self.send(Device::LAYER_PARENT, 1)
    }

    pub fn toggle_device_window(&self) -> Result<()> {
        self.send(Device::WINDOW, Value::Nil)
    }

    // ======================================================
    // ==================== Browser =========================
    // ======================================================

    /// Opens the browser for the cursor device.
    pub fn browser_show(&self) -> Result<()> {
        self.send(Browser::SHOW, 1)
    }

    pub fn browser_commit(&self) -> Result<()> {
        self.send(Browser::COMMIT, 1)
    }

    pub fn browser_cancel(&self) -> Result<()> {
        self.send(Browser::CANCEL, 1)
    }

    pub fn navigate_browser_tab(&self, direction: Direction) -> Result<()> {
        self.send(&Browser::navigate_tab(direction), 1)
    }

    pub fn navigate_browser_filter(&self, filter_index: i32, direction: Direction) -> Result<()> {
        let filter = BrowserFilter(limits::FILTER_INDEX.index_value(filter_index)?);
        self.send(&filter.navigate(direction), 1)
    }

    pub fn reset_browser_filter(&self, filter_index: i32) -> Result<()> {
        let filter = BrowserFilter(limits::FILTER_INDEX.index_value(filter_index)?);
        self.send(&filter.reset(), 1)
    }

    pub fn navigate_browser_result(&self, direction: Direction) -> Result<()> {
        self.send(&Browser::navigate_result(direction), 1)
    }
}
