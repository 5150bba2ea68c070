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

//! One connection to Bitwig Studio.
//!
//! A [`Controller`] pairs the outbound [`Client`] with the inbound [`Server`] and adds what
//! neither half can do alone: connection lifecycle, liveness checks, and correlating a command
//! with the state update Bitwig sends back.
//!
//! ```no_run
//! use bitwig_mcp::{controller::Controller, settings::Settings};
//! use std::time::Duration;
//!
//! let controller = Controller::new(&Settings::from_env()?)?;
//! controller.start()?;
//! let tempo = controller.send_and_wait("/tempo/raw", 128, None, Duration::from_secs(2))?;
//! println!("tempo is now {:?}", tempo);
//! controller.stop();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::{
    client::Client,
    error::{Error, Result},
    error_handler::{Diagnostics, ErrorHandler, Health, RetryPolicy},
    limits,
    osc::Value,
    server::{MessageCache, Server},
    settings::Settings,
    snapshot::{self, DeviceParameter, TrackInfo},
};
use serde::Serialize;
use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard},
    thread,
    time::{Duration, Instant},
};

/// Default timeout for [`Controller::send_and_wait`] and [`Controller::refresh`].
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// Timeout of the liveness check made after a correlated request or a refresh came back empty.
pub const PING_TIMEOUT: Duration = Duration::from_secs(1);

// Lets the listener thread settle before the first refresh is sent.
const STARTUP_DELAY: Duration = Duration::from_millis(100);

// Refreshes closer together than this are suppressed.
const REFRESH_INTERVAL: Duration = Duration::from_millis(200);

const RECONNECT_DELAY: Duration = Duration::from_secs(1);

const SEND_AND_WAIT_ATTEMPTS: u32 = 2;
const SEND_AND_WAIT_RETRY_DELAY: Duration = Duration::from_millis(200);

/// Controls one Bitwig Studio instance over OSC.
///
/// All methods take `&self`. A controller can be shared between threads behind an [`Arc`].
pub struct Controller {
    host: String,
    send_port: u16,
    receive_port: u16,
    client: Client,
    server: Server,
    errors: Arc<ErrorHandler>,
    connection_timeout: Duration,
    reconnect_attempts: u32,
    settle_time: Duration,
    state: Mutex<State>,
}

#[derive(Debug, Default)]
struct State {
    ready: bool,
    connected: bool,
    last_refresh: Option<Instant>,
    reconnects: u32,
}

impl fmt::Debug for Controller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Controller")
            .field("host", &self.host)
            .field("send_port", &self.send_port)
            .field("receive_port", &self.receive_port)
            .field("state", &*self.lock())
            .finish()
    }
}

impl Controller {
    /// Creates a stopped controller for the Bitwig instance named by `settings`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the outbound socket cannot be created.
    pub fn new(settings: &Settings) -> Result<Controller> {
        Ok(Controller {
            host: settings.bitwig_host.clone(),
            send_port: settings.bitwig_send_port,
            receive_port: settings.bitwig_receive_port,
            client: Client::connect(settings.send_address())?,
            server: Server::new(settings.receive_address()),
            errors: Arc::new(ErrorHandler::new()),
            connection_timeout: Duration::from_secs(5),
            reconnect_attempts: 3,
            settle_time: Duration::from_millis(500),
            state: Mutex::new(State::default()),
        })
    }

    /// How long each connection attempt waits for Bitwig to answer. Defaults to 5 seconds.
    pub fn connection_timeout(mut self, timeout: Duration) -> Controller {
        self.connection_timeout = timeout;
        self
    }

    /// Bounds both the attempts made by one connect and the automatic reconnects made between
    /// two successful starts. Defaults to 3.
    pub fn reconnect_attempts(mut self, attempts: u32) -> Controller {
        self.reconnect_attempts = attempts;
        self
    }

    /// How long [`refresh`](Controller::refresh) keeps collecting after the first update
    /// arrives. Defaults to 500 milliseconds.
    pub fn settle_time(mut self, settle_time: Duration) -> Controller {
        self.settle_time = settle_time;
        self
    }

    /// Observes every message received from Bitwig, see [`Server::on_message`].
    pub fn on_message<F>(mut self, callback: F) -> Controller
    where
        F: Fn(&str, &Value) + Send + Sync + 'static,
    {
        self.server = self.server.on_message(callback);
        self
    }

    /// Starts the listener and waits until Bitwig answers a refresh.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the listener cannot start or Bitwig never answers. The
    /// listener is stopped again in that case.
    pub fn start(&self) -> Result<()> {
        let result = self.server.start().and_then(|()| {
            thread::sleep(STARTUP_DELAY);
            self.connect()
        });

        match result {
            Ok(()) => {
                let mut state = self.lock();
                state.ready = true;
                state.connected = true;
                state.reconnects = 0;
                drop(state);
                self.errors.record_success();
                log::info!(
                    "Connected to Bitwig Studio at {}:{}",
                    self.host,
                    self.send_port
                );
                Ok(())
            }
            Err(err) => {
                self.mark_stopped();
                self.server.stop();
                let err = Error::connection(err);
                log::error!("{}", err);
                self.errors.record_error("start", err.clone());
                Err(err)
            }
        }
    }

    /// Marks the controller disconnected and stops the listener.
    pub fn stop(&self) {
        self.mark_stopped();
        self.server.stop();
        log::info!("Bitwig OSC controller stopped");
    }

    pub fn is_ready(&self) -> bool {
        self.lock().ready
    }

    pub fn is_connected(&self) -> bool {
        self.lock().connected
    }

    /// Sends a refresh and reports whether any update arrived within `timeout`.
    ///
    /// The cache is left untouched, so a ping never hides values other callers are reading.
    pub fn ping(&self, timeout: Duration) -> bool {
        let token = self.messages().sequence();
        if let Err(err) = self.client.refresh() {
            log::error!("Ping failed: {}", err);
            self.errors.record_error("ping", err);
            return false;
        }

        if self.messages().wait_for_any_write(token, timeout) {
            self.errors.record_success();
            true
        } else {
            log::warn!("Ping timed out after {:?}", timeout);
            self.errors.record_error("ping", Error::timeout("ping", timeout));
            false
        }
    }

    /// Asks Bitwig to resend its state and waits for the updates.
    ///
    /// Once the first update arrives the call keeps waiting for the settle time so the rest of
    /// the burst lands in the cache. Calls less than 200 milliseconds apart are suppressed and
    /// succeed immediately.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the refresh cannot be sent and [`Error::NotResponding`] if
    /// neither the refresh nor a follow-up ping got an answer.
    pub fn refresh(&self, timeout: Duration) -> Result<()> {
        {
            let mut state = self.lock();
            let now = Instant::now();
            if let Some(last) = state.last_refresh {
                if now.duration_since(last) < REFRESH_INTERVAL {
                    log::debug!("Skipping refresh, last one was {:?} ago", now - last);
                    return Ok(());
                }
            }
            state.last_refresh = Some(now);
        }

        let token = self.messages().sequence();
        self.client.refresh()?;

        if self.messages().wait_for_any_write(token, timeout) {
            thread::sleep(self.settle_time);
            log::debug!(
                "Received {} updates during refresh",
                self.messages().sequence() - token
            );
            self.errors.record_success();
            return Ok(());
        }

        log::debug!("No updates after {:?}, testing connection", timeout);
        if self.ping(PING_TIMEOUT) {
            log::info!("Connection is alive but the refresh got no answer");
            return Ok(());
        }

        log::warn!("Connection test failed after refresh timeout");
        if !self.errors.check_connection_health() {
            log::error!("Too many consecutive timeouts, marking Bitwig as disconnected");
            self.lock().connected = false;
        }
        Err(Error::not_responding(None))
    }

    /// Sends a command and waits for Bitwig's reply on `response_address`, which defaults to
    /// the command's own address.
    ///
    /// A value already cached for the response address is never mistaken for the reply: only
    /// writes made after the command was sent count. Concurrent calls on one address are all
    /// satisfied by the first reply that arrives after they sent.
    ///
    /// The whole `timeout` is spent waiting for the first reply. Only a command that failed to
    /// send is retried, and never a toggle or a navigation command.
    ///
    /// Returns `Ok(None)` if no reply arrived in time but the link still answers a ping.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotResponding`] if the controller cannot reconnect or Bitwig does not
    /// answer the ping either. Other errors from the last attempt are passed through.
    pub fn send_and_wait(
        &self,
        addr: &str,
        value: impl Into<Value>,
        response_address: Option<&str>,
        timeout: Duration,
    ) -> Result<Option<Value>> {
        if !self.is_connected() && !self.attempt_reconnect() {
            return Err(Error::not_responding(Some(addr)));
        }

        let response_address = response_address.unwrap_or(addr);
        let value = value.into();
        let operation = format!("send_and_wait({})", addr);
        let policy = RetryPolicy {
            max_retries: if is_repeatable(addr, &value) {
                SEND_AND_WAIT_ATTEMPTS
            } else {
                1
            },
            retry_delay: SEND_AND_WAIT_RETRY_DELAY,
            timeout,
        };

        let result = self
            .errors
            .retry_with_timeout(&operation, policy, |remaining| {
                let token = self.messages().remove(response_address);
                self.client.send(addr, value.clone())?;
                self.messages()
                    .wait_for_update(response_address, token, remaining)
                    .ok_or_else(|| Error::timeout(operation.as_str(), timeout))
            });

        match result {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                if !self.ping(PING_TIMEOUT) {
                    self.lock().connected = false;
                    return Err(Error::not_responding(Some(addr)));
                }
                if err.is_timeout() {
                    log::warn!("No reply on {} after {:?}", response_address, timeout);
                    Ok(None)
                } else {
                    Err(err)
                }
            }
        }
    }

    /// Refreshes and returns every cached property of one track.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] for indices outside 1..=128 and
    /// [`Error::ResourceNotFound`] if the track has no name.
    pub fn get_track_info(&self, track_index: i32) -> Result<TrackInfo> {
        limits::TRACK_INDEX.index_value(track_index)?;
        self.refresh(DEFAULT_TIMEOUT)?;
        snapshot::track_info(self.messages(), track_index)
    }

    /// Refreshes and returns the parameters of the selected device.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ResourceNotFound`] if no device is selected.
    pub fn get_device_params(&self) -> Result<Vec<DeviceParameter>> {
        self.refresh(DEFAULT_TIMEOUT)?;
        snapshot::device_params(self.messages())
    }

    /// Reports the connection state. A connected controller whose link looks unhealthy is
    /// pinged first.
    pub fn status(&self) -> Status {
        if self.is_connected() && !self.errors.check_connection_health() {
            self.ping(PING_TIMEOUT);
        }

        let state = self.lock();
        Status {
            ready: state.ready,
            connected: state.connected,
            host: self.host.clone(),
            send_port: self.send_port,
            receive_port: self
                .server
                .local_addr()
                .map_or(self.receive_port, |addr| addr.port()),
            health: self.errors.health(),
            diagnostics: self.errors.diagnostic_info(),
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn server(&self) -> &Server {
        &self.server
    }

    /// The values received from Bitwig so far.
    pub fn messages(&self) -> &MessageCache {
        self.server.messages()
    }

    pub fn error_handler(&self) -> &Arc<ErrorHandler> {
        &self.errors
    }

    fn connect(&self) -> Result<()> {
        let attempts = self.reconnect_attempts.max(1);
        for attempt in 1..=attempts {
            let token = self.messages().sequence();
            self.client.refresh()?;
            if self
                .messages()
                .wait_for_any_write(token, self.connection_timeout)
            {
                return Ok(());
            }
            log::warn!("Connection attempt {}/{} timed out", attempt, attempts);
        }
        Err(Error::timeout("connect", self.connection_timeout))
    }

    fn attempt_reconnect(&self) -> bool {
        {
            let mut state = self.lock();
            if state.reconnects >= self.reconnect_attempts {
                log::error!(
                    "Giving up after {} reconnection attempts",
                    self.reconnect_attempts
                );
                return false;
            }
            state.reconnects += 1;
        }

        log::info!("Attempting to reconnect to Bitwig Studio");
        self.server.stop();
        thread::sleep(RECONNECT_DELAY);

        match self.server.start().and_then(|()| self.connect()) {
            Ok(()) => {
                let mut state = self.lock();
                state.ready = true;
                state.connected = true;
                drop(state);
                self.errors.record_success();
                log::info!("Reconnected to Bitwig Studio");
                true
            }
            Err(err) => {
                log::error!("Failed to reconnect: {}", err);
                self.errors.record_error("reconnect", err);
                false
            }
        }
    }

    fn mark_stopped(&self) {
        let mut state = self.lock();
        state.ready = false;
        state.connected = false;
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }
}

/// A point-in-time report on a [`Controller`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Status {
    pub ready: bool,
    pub connected: bool,
    pub host: String,
    pub send_port: u16,
    pub receive_port: u16,
    pub health: Health,
    pub diagnostics: Diagnostics,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let connection = &self.diagnostics.connection_status;
        writeln!(f, "Bitwig Connection:")?;
        writeln!(f, "Ready: {}", self.ready)?;
        writeln!(f, "Connected: {}", self.connected)?;
        writeln!(f, "Sending to: {}:{}", self.host, self.send_port)?;
        writeln!(f, "Listening on: {}:{}", self.host, self.receive_port)?;
        writeln!(f, "Health: {}", self.health)?;
        write!(f, "Consecutive Timeouts: {}", connection.consecutive_timeouts)?;
        if let Some(last_error) = &connection.last_error {
            write!(f, "\nLast Error: {}", last_error)?;
        }
        Ok(())
    }
}

// Sending twice must leave Bitwig as sending once did.
fn is_repeatable(addr: &str, value: &Value) -> bool {
    const ACTIONS: [&str; 6] = ["/+", "/-", "/select", "/reset", "/commit", "/cancel"];
    *value != Value::Nil && !ACTIONS.iter().any(|action| addr.ends_with(action))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::UdpSocket;

    #[test]
    fn test_repeatable_commands() {
        assert!(is_repeatable("/tempo/raw", &Value::Float(120.0)));
        assert!(is_repeatable("/track/1/mute", &Value::Int(1)));
        assert!(!is_repeatable("/track/1/mute", &Value::Nil));
        assert!(!is_repeatable("/device/+", &Value::Int(1)));
        assert!(!is_repeatable("/device/sibling/2/select", &Value::Int(1)));
        assert!(!is_repeatable("/browser/commit", &Value::Int(1)));
    }

    // Settings pointing at a port nobody answers on.
    fn silent_settings() -> (UdpSocket, Settings) {
        let silent = UdpSocket::bind("127.0.0.1:0").unwrap();
        let mut settings = Settings::default();
        settings.bitwig_send_port = silent.local_addr().unwrap().port();
        settings.bitwig_receive_port = 0;
        (silent, settings)
    }

    fn silent_controller() -> (UdpSocket, Controller) {
        let (silent, settings) = silent_settings();
        let controller = Controller::new(&settings)
            .unwrap()
            .connection_timeout(Duration::from_millis(50))
            .reconnect_attempts(0);
        (silent, controller)
    }

    #[test]
    fn test_new_is_stopped() {
        let (_silent, controller) = silent_controller();
        assert!(!controller.is_ready());
        assert!(!controller.is_connected());
        assert!(!controller.server().is_running());
        assert_eq!(controller.error_handler().health(), Health::Unknown);
    }

    #[test]
    fn test_start_fails_without_bitwig() {
        let (_silent, controller) = silent_controller();
        let err = controller.start().unwrap_err();
        assert!(matches!(err, Error::Connection { .. }));
        assert!(err.to_string().contains("timed out"), "{}", err);
        assert!(!controller.server().is_running());
        assert!(!controller.is_connected());
        assert!(controller
            .error_handler()
            .recent_errors()
            .contains_key("start"));
    }

    #[test]
    fn test_send_and_wait_without_connection() {
        let (_silent, controller) = silent_controller();
        let err = controller
            .send_and_wait("/tempo/raw", 120, None, Duration::from_millis(50))
            .unwrap_err();
        assert_eq!(
            err,
            Error::NotResponding {
                address: Some("/tempo/raw".to_owned())
            }
        );
        assert!(controller.client().sent_addresses().is_empty());
    }

    #[test]
    fn test_ping_without_bitwig() {
        let (_silent, controller) = silent_controller();
        controller.server().start().unwrap();
        assert!(!controller.ping(Duration::from_millis(30)));
        assert_eq!(controller.error_handler().consecutive_timeouts(), 1);
        assert_eq!(controller.client().sent_addresses(), vec!["/refresh"]);
    }

    #[test]
    fn test_ping_sees_any_update() {
        let (_silent, controller) = silent_controller();
        controller.server().start().unwrap();
        let listener = controller.server().local_addr().unwrap();
        controller.messages().insert("/tempo/raw", Value::Int(120));

        // A value cached before the ping does not count.
        assert!(!controller.ping(Duration::from_millis(30)));

        let bitwig = UdpSocket::bind("127.0.0.1:0").unwrap();
        let packet = crate::osc::encode_message("/play", Value::Int(1)).unwrap();
        let sender = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            bitwig.send_to(&packet, listener).unwrap();
        });
        assert!(controller.ping(Duration::from_secs(2)));
        sender.join().unwrap();
        assert_eq!(controller.messages().get("/tempo/raw"), Some(Value::Int(120)));
    }

    #[test]
    fn test_status_report() {
        let (_silent, controller) = silent_controller();
        let status = controller.status();
        assert!(!status.ready);
        assert!(!status.connected);
        assert_eq!(status.host, "127.0.0.1");
        assert_eq!(status.health, Health::Unknown);

        let text = status.to_string();
        assert!(text.starts_with("Bitwig Connection:\nReady: false\nConnected: false\n"));
        assert!(text.contains("Health: unknown"));
        assert!(!text.contains("Last Error"));
    }

    #[test]
    fn test_track_index_checked_before_refresh() {
        let (_silent, controller) = silent_controller();
        assert!(matches!(
            controller.get_track_info(0),
            Err(Error::InvalidParameter { .. })
        ));
        assert!(controller.client().sent_addresses().is_empty());
    }
}
