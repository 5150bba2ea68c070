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

//! The inbound half of the bridge.
//!
//! Bitwig pushes state changes to a UDP port as OSC messages. [`Server`] owns one background
//! thread that receives those datagrams and records the latest value per address in a
//! [`MessageCache`]. Everything else reads the cache from the caller's thread.
//!
//! ```no_run
//! use bitwig_mcp::server::Server;
//! use std::time::Duration;
//!
//! let server = Server::new("127.0.0.1:9000");
//! server.start()?;
//! let tempo = server.wait_for_message("/tempo/raw", Duration::from_secs(3));
//! println!("tempo: {:?}", tempo);
//! server.stop();
//! # bitwig_mcp::Result::Ok(())
//! ```

mod cache;

pub use cache::MessageCache;

use crate::{
    error::{Error, Result},
    osc::{self, Value},
};
use std::{
    fmt, io,
    net::{SocketAddr, UdpSocket},
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

/// How long a blocking receive waits before the loop checks whether it should stop.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Observes every message after it has been cached.
pub type MessageCallback = Arc<dyn Fn(&str, &Value) + Send + Sync>;

/// Listens for OSC messages from Bitwig.
pub struct Server {
    bind_address: String,
    cache: Arc<MessageCache>,
    callback: Option<MessageCallback>,
    running: Arc<AtomicBool>,
    listener: Mutex<Option<Listener>>,
}

struct Listener {
    local_addr: SocketAddr,
    thread: JoinHandle<()>,
}

impl fmt::Debug for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server")
            .field("bind_address", &self.bind_address)
            .field("running", &self.is_running())
            .field("messages", &self.cache.len())
            .finish()
    }
}

impl Server {
    /// Creates a server that will listen on the given address once started.
    pub fn new(bind_address: impl Into<String>) -> Server {
        Server {
            bind_address: bind_address.into(),
            cache: Arc::new(MessageCache::new()),
            callback: None,
            running: Arc::new(AtomicBool::new(false)),
            listener: Mutex::new(None),
        }
    }

    /// Registers a callback invoked for every received message after it is cached.
    ///
    /// The callback cannot prevent caching. A panicking callback is logged and the listener keeps
    /// running.
    pub fn on_message<F>(mut self, callback: F) -> Server
    where
        F: Fn(&str, &Value) + Send + Sync + 'static,
    {
        self.callback = Some(Arc::new(callback));
        self
    }

    /// Starts the background receive thread.
    ///
    /// Calling `start` on a running server logs a warning and does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OscServer`] if the socket cannot be bound or configured.
    pub fn start(&self) -> Result<()> {
        let mut listener = self.listener.lock().unwrap();
        if listener.is_some() {
            log::warn!("OSC server already running");
            return Ok(());
        }

        let socket = UdpSocket::bind(&self.bind_address)
            .map_err(|err| Error::osc_server("binding OSC server socket", err))?;
        socket
            .set_read_timeout(Some(POLL_INTERVAL))
            .map_err(|err| Error::osc_server("configuring OSC server socket", err))?;
        let local_addr = socket
            .local_addr()
            .map_err(|err| Error::osc_server("reading OSC server address", err))?;

        self.running.store(true, Ordering::SeqCst);
        let receiver = Receiver {
            socket,
            cache: self.cache.clone(),
            callback: self.callback.clone(),
            running: self.running.clone(),
        };
        let thread = thread::Builder::new()
            .name("osc-recv".to_owned())
            .spawn(move || receiver.recv_loop())
            .map_err(|err| {
                self.running.store(false, Ordering::SeqCst);
                Error::osc_server("spawning OSC receive thread", err)
            })?;

        log::info!("OSC server listening on {}", local_addr);
        *listener = Some(Listener { local_addr, thread });
        Ok(())
    }

    /// Stops the receive thread and closes the socket.
    ///
    /// The receive loop checks the running flag at least every 100 milliseconds, so the join is
    /// bounded. Stopping a stopped server does nothing.
    pub fn stop(&self) {
        let listener = match self.listener.lock().unwrap().take() {
            Some(listener) => listener,
            None => return,
        };
        log::info!("Shutting down OSC server on {}", listener.local_addr);
        self.running.store(false, Ordering::SeqCst);
        if listener.thread.join().is_err() {
            log::error!("OSC receive thread panicked");
        }
    }

    pub fn is_running(&self) -> bool {
        self.listener.lock().unwrap().is_some()
    }

    /// The address the socket is bound to while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener
            .lock()
            .unwrap()
            .as_ref()
            .map(|listener| listener.local_addr)
    }

    /// The shared cache of received values.
    pub fn messages(&self) -> &Arc<MessageCache> {
        &self.cache
    }

    /// Returns the latest value for the address without blocking.
    ///
    /// See [`MessageCache::get`] for how absent and empty values differ.
    pub fn get_message(&self, addr: &str) -> Option<Value> {
        self.cache.get(addr)
    }

    /// Waits until the address holds a value or the timeout elapses.
    pub fn wait_for_message(&self, addr: &str, timeout: Duration) -> Option<Value> {
        self.cache.wait_for(addr, timeout)
    }

    pub fn clear_messages(&self) {
        self.cache.clear();
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.stop();
    }
}

struct Receiver {
    socket: UdpSocket,
    cache: Arc<MessageCache>,
    callback: Option<MessageCallback>,
    running: Arc<AtomicBool>,
}

impl Receiver {
    fn recv_loop(self) {
        const MTU: usize = 65536;
        let mut buffer = vec![0_u8; MTU];

        while self.running.load(Ordering::SeqCst) {
            match self.socket.recv(&mut buffer) {
                Ok(len) => match osc::decode_messages(&buffer[..len]) {
                    Ok(messages) => {
                        for (addr, value) in messages {
                            self.handle(&addr, value);
                        }
                    }
                    Err(err) => log::error!("error decoding packet from Bitwig: {}", err),
                },
                Err(err) if is_timeout(&err) => {}
                Err(err) => {
                    log::error!("error receiving next packet from Bitwig: {}", err);
                    thread::sleep(POLL_INTERVAL);
                }
            }
        }
    }

    fn handle(&self, addr: &str, value: Value) {
        log::debug!("recv: {} {}", addr, value);
        let observed = self.callback.as_ref().map(|_| value.clone());
        self.cache.insert(addr, value);

        if let (Some(callback), Some(value)) = (&self.callback, observed) {
            let result = panic::catch_unwind(AssertUnwindSafe(|| callback(addr, &value)));
            if result.is_err() {
                log::error!("message callback panicked on {}", addr);
            }
        }
    }
}

fn is_timeout(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}
