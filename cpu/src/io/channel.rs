//! Byte channels for the TTY.
//!
//! The TTY polls its channel once in a while; a channel must never
//! block in any of these calls.
use std::fmt::Debug;
use std::fs;
use std::io::Write;
use std::path::Path;

use tracing::{event, Level};

use crate::error::ChannelError;

pub trait SerialChannel: Debug + Send {
    fn name(&self) -> String;

    /// Returns the next received byte, or 0 if none is available.
    fn read(&mut self) -> u8;
    fn write(&mut self, value: u8);

    /// True when [`SerialChannel::read`] has a byte to return.
    fn data_available(&self) -> bool;

    /// True when the channel can accept a byte.
    fn output_ready(&self) -> bool;

    fn reset(&mut self);
    fn close(&mut self);
}

/// A channel with nothing at the other end.  Output goes nowhere.
#[derive(Debug, Default)]
pub struct NullChannel;

impl SerialChannel for NullChannel {
    fn name(&self) -> String {
        "null".to_string()
    }

    fn read(&mut self) -> u8 {
        0
    }

    fn write(&mut self, _value: u8) {}

    fn data_available(&self) -> bool {
        false
    }

    fn output_ready(&self) -> bool {
        true
    }

    fn reset(&mut self) {}

    fn close(&mut self) {}
}

/// Input comes from a fixed buffer (usually the contents of a file);
/// output goes to an optional sink.
pub struct StreamChannel {
    name: String,
    input: Vec<u8>,
    position: usize,
    output: Option<Box<dyn Write + Send>>,
}

impl Debug for StreamChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        f.debug_struct("StreamChannel")
            .field("name", &self.name)
            .field("input_length", &self.input.len())
            .field("position", &self.position)
            .field("has_output", &self.output.is_some())
            .finish()
    }
}

impl StreamChannel {
    #[must_use]
    pub fn new(name: String, input: Vec<u8>, output: Option<Box<dyn Write + Send>>) -> StreamChannel {
        StreamChannel {
            name,
            input,
            position: 0,
            output,
        }
    }

    /// A channel which reads the contents of the file at `path`.
    /// Output is discarded.
    pub fn from_file(path: &Path) -> Result<StreamChannel, ChannelError> {
        let input = fs::read(path).map_err(|error| ChannelError::OpenFile {
            path: path.to_path_buf(),
            error,
        })?;
        Ok(StreamChannel::new(path.display().to_string(), input, None))
    }
}

impl SerialChannel for StreamChannel {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn read(&mut self) -> u8 {
        match self.input.get(self.position) {
            Some(b) => {
                self.position += 1;
                *b
            }
            None => 0,
        }
    }

    fn write(&mut self, value: u8) {
        match self.output.as_mut() {
            Some(sink) => {
                if let Err(e) = sink.write_all(&[value]).and_then(|()| sink.flush()) {
                    event!(
                        target: "imlac::tty",
                        Level::WARN,
                        "failed to write to {}: {}",
                        self.name,
                        e
                    );
                }
            }
            None => {
                event!(
                    target: "imlac::tty",
                    Level::DEBUG,
                    "discarding output byte {:03o} to {}",
                    value,
                    self.name
                );
            }
        }
    }

    fn data_available(&self) -> bool {
        self.position < self.input.len()
    }

    fn output_ready(&self) -> bool {
        true
    }

    fn reset(&mut self) {
        self.position = 0;
    }

    fn close(&mut self) {
        self.output = None;
    }
}

#[test]
fn test_stream_channel_reads_and_rewinds() {
    let mut channel = StreamChannel::new("test".to_string(), vec![b'H', b'I'], None);
    assert!(channel.data_available());
    assert_eq!(channel.read(), b'H');
    assert_eq!(channel.read(), b'I');
    assert!(!channel.data_available());
    assert_eq!(channel.read(), 0);
    channel.reset();
    assert_eq!(channel.read(), b'H');
}
