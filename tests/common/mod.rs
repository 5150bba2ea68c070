//! A stand-in for Bitwig Studio's OSC extension, bound to loopback ports.

#![allow(dead_code)]

use bitwig_mcp::{osc, settings::Settings, Value};
use std::{
    collections::HashMap,
    net::{SocketAddr, UdpSocket},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

type Messages = Vec<(String, Value)>;

/// What the fake sends back for each address it receives.
#[derive(Default)]
pub struct Script {
    replies: HashMap<String, Messages>,
    echo: Option<Duration>,
}

impl Script {
    pub fn new() -> Script {
        Script::default()
    }

    /// Messages broadcast whenever `/refresh` arrives.
    pub fn state(self, state: Vec<(&str, Value)>) -> Script {
        self.reply("/refresh", state)
    }

    pub fn reply(mut self, addr: &str, messages: Vec<(&str, Value)>) -> Script {
        let messages = messages
            .into_iter()
            .map(|(addr, value)| (addr.to_owned(), value))
            .collect();
        self.replies.insert(addr.to_owned(), messages);
        self
    }

    /// Sends every unscripted message back unchanged after `delay`.
    pub fn echo(mut self, delay: Duration) -> Script {
        self.echo = Some(delay);
        self
    }
}

pub struct FakeBitwig {
    received: Arc<Mutex<Messages>>,
    answering: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl FakeBitwig {
    /// Starts the fake and returns settings that point a controller at it.
    pub fn start(script: Script) -> (FakeBitwig, Settings) {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        socket
            .set_read_timeout(Some(Duration::from_millis(20)))
            .unwrap();

        let mut settings = Settings::default();
        settings.bitwig_host = "127.0.0.1".to_owned();
        settings.bitwig_send_port = socket.local_addr().unwrap().port();
        settings.bitwig_receive_port = free_port();
        let reply_to: SocketAddr = settings.receive_address().parse().unwrap();

        let received = Arc::new(Mutex::new(Vec::new()));
        let answering = Arc::new(AtomicBool::new(true));
        let running = Arc::new(AtomicBool::new(true));

        let thread = {
            let received = received.clone();
            let answering = answering.clone();
            let running = running.clone();
            thread::spawn(move || {
                let mut buffer = vec![0_u8; 65536];
                while running.load(Ordering::SeqCst) {
                    let len = match socket.recv(&mut buffer) {
                        Ok(len) => len,
                        Err(_) => continue,
                    };
                    for (addr, value) in osc::decode_messages(&buffer[..len]).unwrap() {
                        received.lock().unwrap().push((addr.clone(), value.clone()));
                        if !answering.load(Ordering::SeqCst) {
                            continue;
                        }
                        let replies = match (script.replies.get(&addr), script.echo) {
                            (Some(replies), _) => replies.clone(),
                            (None, Some(delay)) => {
                                thread::sleep(delay);
                                vec![(addr, value)]
                            }
                            (None, None) => continue,
                        };
                        for (addr, value) in replies {
                            let packet = osc::encode_message(&addr, value).unwrap();
                            socket.send_to(&packet, reply_to).unwrap();
                        }
                    }
                }
            })
        };

        let fake = FakeBitwig {
            received,
            answering,
            running,
            thread: Some(thread),
        };
        (fake, settings)
    }

    /// Addresses received so far, in order.
    pub fn received(&self) -> Vec<String> {
        let received = self.received.lock().unwrap();
        received.iter().map(|(addr, _)| addr.clone()).collect()
    }

    pub fn received_value(&self, addr: &str) -> Option<Value> {
        let received = self.received.lock().unwrap();
        received
            .iter()
            .rev()
            .find(|(received, _)| received == addr)
            .map(|(_, value)| value.clone())
    }

    /// Keeps receiving but stops answering, like a Bitwig that hung.
    pub fn hang(&self) {
        self.answering.store(false, Ordering::SeqCst);
    }
}

impl Drop for FakeBitwig {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn free_port() -> u16 {
    let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
    socket.local_addr().unwrap().port()
}

pub fn track_state() -> Vec<(&'static str, Value)> {
    vec![
        ("/track/1/name", Value::from("Bass")),
        ("/track/1/volume", Value::Int(64)),
        ("/track/1/pan", Value::Int(64)),
        ("/track/1/mute", Value::Int(0)),
        ("/track/1/solo", Value::Int(0)),
        ("/track/10/name", Value::from("Drums")),
        ("/track/10/volume", Value::Int(90)),
        ("/play", Value::Int(0)),
    ]
}
