//! A TTY channel connected to a telnet server.
//!
//! We don't negotiate any telnet options, we just discard the
//! commands the server sends.  Reception happens on a background
//! thread so that polling the channel never blocks the emulator.
use std::collections::VecDeque;
use std::fmt::{self, Debug, Formatter};
use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::thread::{self, JoinHandle};

use tracing::{event, Level};

use super::channel::SerialChannel;
use crate::error::ChannelError;

const IAC: u8 = 255;
const WILL: u8 = 251;
const DONT: u8 = 254;

/// Where we are in the telnet command syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Escape {
    Data,
    /// The previous byte was IAC.
    Command,
    /// The previous byte was WILL, WONT, DO or DONT; this byte is
    /// the option.
    Option,
}

/// Strips telnet commands out of the received byte stream.
#[derive(Debug)]
struct TelnetFilter {
    escape: Escape,
}

impl TelnetFilter {
    fn new() -> TelnetFilter {
        TelnetFilter {
            escape: Escape::Data,
        }
    }

    /// Returns the byte if it is data.
    fn accept(&mut self, b: u8) -> Option<u8> {
        match self.escape {
            Escape::Data => {
                if b == IAC {
                    self.escape = Escape::Command;
                    None
                } else {
                    Some(b)
                }
            }
            Escape::Command => {
                self.escape = if (WILL..=DONT).contains(&b) {
                    Escape::Option
                } else {
                    Escape::Data
                };
                None
            }
            Escape::Option => {
                self.escape = Escape::Data;
                None
            }
        }
    }
}

type ReceiveQueue = Arc<RwLock<VecDeque<u8>>>;

fn receive_loop(mut stream: TcpStream, queue: ReceiveQueue, connected: Arc<AtomicBool>) {
    let mut filter = TelnetFilter::new();
    let mut buf = [0u8; 256];
    loop {
        match stream.read(&mut buf) {
            Ok(0) => {
                event!(target: "imlac::telnet", Level::INFO, "connection closed by peer");
                break;
            }
            Ok(n) => {
                let mut q = queue.write().unwrap_or_else(PoisonError::into_inner);
                q.extend(buf[..n].iter().filter_map(|b| filter.accept(*b)));
            }
            Err(e) => {
                if connected.load(Ordering::SeqCst) {
                    event!(target: "imlac::telnet", Level::WARN, "receive failed: {}", e);
                }
                break;
            }
        }
    }
    connected.store(false, Ordering::SeqCst);
}

pub struct TelnetChannel {
    address: String,
    stream: TcpStream,
    queue: ReceiveQueue,
    connected: Arc<AtomicBool>,
    shutdown: Mutex<Option<JoinHandle<()>>>,
}

impl Debug for TelnetChannel {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        f.debug_struct("TelnetChannel")
            .field("address", &self.address)
            .field("connected", &self.connected.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl TelnetChannel {
    /// Connects to `address` (`host:port`).
    pub fn connect(address: &str) -> Result<TelnetChannel, ChannelError> {
        let connect_error = |error| ChannelError::Connect {
            address: address.to_string(),
            error,
        };
        let stream = TcpStream::connect(address).map_err(connect_error)?;
        let reader = stream.try_clone().map_err(connect_error)?;
        let queue: ReceiveQueue = Arc::new(RwLock::new(VecDeque::new()));
        let connected = Arc::new(AtomicBool::new(true));
        let handle = {
            let queue = Arc::clone(&queue);
            let connected = Arc::clone(&connected);
            thread::Builder::new()
                .name(format!("telnet {address}"))
                .spawn(move || receive_loop(reader, queue, connected))
                .map_err(connect_error)?
        };
        event!(target: "imlac::telnet", Level::INFO, "connected to {}", address);
        Ok(TelnetChannel {
            address: address.to_string(),
            stream,
            queue,
            connected,
            shutdown: Mutex::new(Some(handle)),
        })
    }
}

impl SerialChannel for TelnetChannel {
    fn name(&self) -> String {
        format!("telnet {}", self.address)
    }

    fn read(&mut self) -> u8 {
        self.queue
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or(0)
    }

    fn write(&mut self, value: u8) {
        if !self.output_ready() {
            return;
        }
        // IAC is doubled so that the server does not take it as a
        // command.
        let result = if value == IAC {
            self.stream.write_all(&[IAC, IAC])
        } else {
            self.stream.write_all(&[value])
        };
        if let Err(e) = result {
            event!(target: "imlac::telnet", Level::WARN, "send failed: {}", e);
        }
    }

    fn data_available(&self) -> bool {
        !self
            .queue
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }

    fn output_ready(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn reset(&mut self) {}

    fn close(&mut self) {
        let mut reader = self.shutdown.lock().unwrap_or_else(PoisonError::into_inner);
        self.connected.store(false, Ordering::SeqCst);
        if let Some(handle) = reader.take() {
            if let Err(e) = self.stream.shutdown(Shutdown::Both) {
                event!(target: "imlac::telnet", Level::DEBUG, "shutdown: {}", e);
            }
            if handle.join().is_err() {
                event!(target: "imlac::telnet", Level::WARN, "receive thread panicked");
            }
            event!(target: "imlac::telnet", Level::INFO, "disconnected from {}", self.address);
        }
    }
}

impl Drop for TelnetChannel {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::time::{Duration, Instant};

    #[test]
    fn test_filter_swallows_commands() {
        let mut filter = TelnetFilter::new();
        let input = [b'a', IAC, 253, 1, b'b', IAC, 241, b'c', IAC];
        let output: Vec<u8> = input.iter().filter_map(|b| filter.accept(*b)).collect();
        assert_eq!(output, b"abc");
        assert_eq!(filter.escape, Escape::Command);
    }

    #[test]
    fn test_receive_from_server() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind to a local port");
        let address = listener
            .local_addr()
            .expect("listener has an address")
            .to_string();
        let server = thread::spawn(move || {
            let (mut conn, _) = listener.accept().expect("accept a connection");
            conn.write_all(&[IAC, 251, 3, b'O', b'K'])
                .expect("send to client");
            let mut buf = [0u8; 1];
            conn.read_exact(&mut buf).expect("read from client");
            buf[0]
        });

        let mut channel = TelnetChannel::connect(&address).expect("connect to test server");
        assert!(channel.output_ready());
        let deadline = Instant::now() + Duration::from_secs(10);
        let mut received = Vec::new();
        while received.len() < 2 && Instant::now() < deadline {
            if channel.data_available() {
                received.push(channel.read());
            } else {
                thread::sleep(Duration::from_millis(5));
            }
        }
        assert_eq!(received, b"OK");
        channel.write(b'!');
        assert_eq!(server.join().expect("server thread"), b'!');
        channel.close();
        assert!(!channel.output_ready());
        assert_eq!(channel.read(), 0);
    }
}
