//! The TTY (serial) interface.
//!
//! The interface holds one received byte and one byte waiting to be
//! sent.  Received data is polled from the attached channel every
//! [`TTY_RECEIVE_POLL_TICKS`] cycles; a byte the program has sent
//! goes out on the first cycle in which the channel can accept it.
//!
//! The "sent" latch is raised each time a byte goes out and is seen
//! by the interrupt facility; the program clears it with TCF, TPR or
//! TPC.
use tracing::{event, Level};

use base::prelude::*;

use super::channel::{NullChannel, SerialChannel};
use super::{IotContext, IotDevice};
use crate::error::Unimplemented;

pub const TTY_RECEIVE_POLL_TICKS: u32 = 100;

const RAL1: Word = 0o11;
const RRB: Word = 0o31;
const RCF: Word = 0o32;
const RRC: Word = 0o33;
const TPR: Word = 0o41;
const TCF: Word = 0o42;
const TPC: Word = 0o43;

#[derive(Debug)]
pub struct Tty {
    channel: Box<dyn SerialChannel>,
    /// A received byte is waiting to be read.
    data_ready: bool,
    data: u8,
    /// No byte is waiting to be sent.
    send_ready: bool,
    send_data: u8,
    sent_latch: bool,
    clocks: u32,
}

impl Tty {
    #[must_use]
    pub fn new() -> Tty {
        Tty {
            channel: Box::new(NullChannel),
            data_ready: false,
            data: 0,
            send_ready: true,
            send_data: 0,
            sent_latch: false,
            clocks: 0,
        }
    }

    /// Attaches a new channel.  The previous one is closed.
    pub fn set_channel(&mut self, channel: Box<dyn SerialChannel>) {
        event!(
            target: "imlac::tty",
            Level::INFO,
            "TTY channel {} replaced by {}",
            self.channel.name(),
            channel.name()
        );
        let mut old = std::mem::replace(&mut self.channel, channel);
        old.close();
    }

    #[must_use]
    pub fn channel_name(&self) -> String {
        self.channel.name()
    }

    #[must_use]
    pub fn data_ready(&self) -> bool {
        self.data_ready
    }

    #[must_use]
    pub fn send_ready(&self) -> bool {
        self.send_ready
    }

    #[must_use]
    pub fn sent_latch(&self) -> bool {
        self.sent_latch
    }

    pub fn clock(&mut self) {
        self.clocks += 1;
        if self.clocks > TTY_RECEIVE_POLL_TICKS {
            self.clocks = 0;
            if !self.data_ready && self.channel.data_available() {
                self.data = self.channel.read();
                self.data_ready = true;
                event!(
                    target: "imlac::tty",
                    Level::TRACE,
                    "received {:03o}",
                    self.data
                );
            }
        }

        if !self.send_ready && self.channel.output_ready() {
            event!(
                target: "imlac::tty",
                Level::TRACE,
                "sending {:03o}",
                self.send_data
            );
            self.channel.write(self.send_data);
            self.send_ready = true;
            self.sent_latch = true;
        }
    }

    fn queue_output(&mut self, ac: Word) {
        if !self.send_ready {
            event!(
                target: "imlac::tty",
                Level::DEBUG,
                "TTY output {:03o} overwrites unsent {:03o}",
                ac & 0o377,
                self.send_data
            );
        }
        // Only the low byte of AC is sent.
        self.send_data = (ac & 0o377) as u8;
        self.send_ready = false;
    }
}

impl Default for Tty {
    fn default() -> Tty {
        Tty::new()
    }
}

impl IotDevice for Tty {
    fn name(&self) -> &'static str {
        "TTY"
    }

    fn handled_iots(&self) -> &'static [Word] {
        &[RAL1, RRB, RCF, RRC, TPR, TCF, TPC]
    }

    fn execute_iot(&mut self, code: Word, ctx: &mut IotContext<'_>) -> Result<(), Unimplemented> {
        match code {
            RRB => *ctx.ac |= Word::from(self.data),
            RCF => self.data_ready = false,
            RRC => {
                *ctx.ac |= Word::from(self.data);
                self.data_ready = false;
            }
            TPR => {
                if self.send_ready {
                    self.queue_output(*ctx.ac);
                }
                self.sent_latch = false;
            }
            TCF => self.sent_latch = false,
            TPC => {
                self.queue_output(*ctx.ac);
                self.sent_latch = false;
            }
            _ => {
                event!(
                    target: "imlac::tty",
                    Level::DEBUG,
                    "ignoring TTY IOT {} at {}",
                    Octal(code),
                    Octal(*ctx.pc)
                );
            }
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.send_ready = true;
        self.data_ready = false;
        self.sent_latch = false;
        self.clocks = 0;
        self.channel.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::RecordingConsole;
    use std::sync::{Arc, Mutex};

    /// A channel which records what is written to it and only accepts
    /// output when told to.
    #[derive(Debug, Clone, Default)]
    struct RecordingChannel {
        written: Arc<Mutex<Vec<u8>>>,
        accepting: Arc<Mutex<bool>>,
        input: Vec<u8>,
    }

    impl SerialChannel for RecordingChannel {
        fn name(&self) -> String {
            "recording".to_string()
        }

        fn read(&mut self) -> u8 {
            if self.input.is_empty() {
                0
            } else {
                self.input.remove(0)
            }
        }

        fn write(&mut self, value: u8) {
            self.written.lock().expect("lock").push(value);
        }

        fn data_available(&self) -> bool {
            !self.input.is_empty()
        }

        fn output_ready(&self) -> bool {
            *self.accepting.lock().expect("lock")
        }

        fn reset(&mut self) {}

        fn close(&mut self) {}
    }

    fn iot(tty: &mut Tty, code: Word, ac: Word) -> Word {
        let mut ac = ac;
        let mut pc = 0o100;
        let mut console = RecordingConsole::new();
        let mut ctx = IotContext {
            ac: &mut ac,
            pc: &mut pc,
            console: &mut console,
        };
        tty.execute_iot(code, &mut ctx)
            .expect("TTY IOTs are implemented");
        ac
    }

    #[test]
    fn test_transmit_writes_once() {
        let channel = RecordingChannel::default();
        let written = Arc::clone(&channel.written);
        let accepting = Arc::clone(&channel.accepting);
        let mut tty = Tty::new();
        tty.set_channel(Box::new(channel));

        iot(&mut tty, TPC, 0o100101);
        assert!(!tty.send_ready());
        for _ in 0..10 {
            tty.clock();
        }
        assert!(written.lock().expect("lock").is_empty());
        assert!(!tty.send_ready());

        *accepting.lock().expect("lock") = true;
        let mut became_ready = 0;
        for _ in 0..10 {
            let before = tty.send_ready();
            tty.clock();
            if !before && tty.send_ready() {
                became_ready += 1;
            }
        }
        assert_eq!(*written.lock().expect("lock"), vec![0x41]);
        assert_eq!(became_ready, 1);
        assert!(tty.sent_latch());
        iot(&mut tty, TCF, 0);
        assert!(!tty.sent_latch());
    }

    #[test]
    fn test_tpr_needs_send_ready() {
        let channel = RecordingChannel::default();
        let written = Arc::clone(&channel.written);
        let accepting = Arc::clone(&channel.accepting);
        let mut tty = Tty::new();
        tty.set_channel(Box::new(channel));
        iot(&mut tty, TPR, u16::from(b'A'));
        // The first byte has not gone yet, so this one is dropped.
        iot(&mut tty, TPR, u16::from(b'B'));
        *accepting.lock().expect("lock") = true;
        tty.clock();
        tty.clock();
        assert_eq!(*written.lock().expect("lock"), vec![b'A']);
    }

    #[test]
    fn test_receive() {
        let channel = RecordingChannel {
            input: vec![b'x', b'y'],
            ..RecordingChannel::default()
        };
        let mut tty = Tty::new();
        tty.set_channel(Box::new(channel));
        for _ in 0..TTY_RECEIVE_POLL_TICKS {
            tty.clock();
        }
        assert!(!tty.data_ready());
        tty.clock();
        assert!(tty.data_ready());
        assert_eq!(iot(&mut tty, RRC, 0o100000), 0o100000 | u16::from(b'x'));
        assert!(!tty.data_ready());
        for _ in 0..=TTY_RECEIVE_POLL_TICKS {
            tty.clock();
        }
        assert_eq!(iot(&mut tty, RRB, 0), u16::from(b'y'));
        assert!(tty.data_ready());
    }
}
