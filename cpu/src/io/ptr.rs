//! Paper tape reader.
//!
//! The tape is read into memory when it is loaded.  While the
//! reader is running, the "data ready" flag toggles every
//! [`PTR_TICKS_PER_PHASE`] cycles; the tape advances to the next
//! frame each time the flag falls.  Reading past the end of the
//! tape is not an error, the program just gets no data.
use std::fs;
use std::path::Path;

use tracing::{event, Level};

use base::prelude::*;

use super::{IotContext, IotDevice};
use crate::error::{ChannelError, Unimplemented};

pub const PTR_TICKS_PER_PHASE: u32 = 1000;

const READ: Word = 0o51;
const STOP: Word = 0o52;
const START: Word = 0o61;

#[derive(Debug, Default)]
pub struct PaperTapeReader {
    tape: Vec<u8>,
    loaded: bool,
    running: bool,
    ready: bool,
    index: usize,
    clocks: u32,
}

impl PaperTapeReader {
    #[must_use]
    pub fn new() -> PaperTapeReader {
        PaperTapeReader::default()
    }

    /// Loads a tape image from a file of raw tape frames.  The
    /// reader is stopped and the tape is positioned at its start.
    pub fn load_tape(&mut self, path: &Path) -> Result<(), ChannelError> {
        self.stop();
        let tape = fs::read(path).map_err(|error| ChannelError::OpenFile {
            path: path.to_path_buf(),
            error,
        })?;
        event!(
            target: "imlac::ptr",
            Level::INFO,
            "loaded {} bytes of tape from {}",
            tape.len(),
            path.display()
        );
        self.set_tape(tape);
        Ok(())
    }

    pub fn set_tape(&mut self, tape: Vec<u8>) {
        self.stop();
        self.tape = tape;
        self.index = 0;
        self.loaded = true;
    }

    #[must_use]
    pub fn ready(&self) -> bool {
        self.ready
    }

    #[must_use]
    pub fn position(&self) -> usize {
        self.index
    }

    fn stop(&mut self) {
        if self.running {
            event!(target: "imlac::ptr", Level::DEBUG, "reader stopped");
        }
        self.running = false;
        self.ready = false;
    }

    pub fn clock(&mut self) {
        if !(self.running && self.loaded) {
            return;
        }
        self.clocks += 1;
        if self.clocks > PTR_TICKS_PER_PHASE {
            self.clocks = 0;
            if self.index < self.tape.len() {
                self.ready = !self.ready;
                if !self.ready {
                    self.index += 1;
                }
            } else {
                self.ready = false;
            }
        }
    }
}

impl IotDevice for PaperTapeReader {
    fn name(&self) -> &'static str {
        "PTR"
    }

    fn handled_iots(&self) -> &'static [Word] {
        &[READ, STOP, START]
    }

    fn execute_iot(&mut self, code: Word, ctx: &mut IotContext<'_>) -> Result<(), Unimplemented> {
        match code {
            READ => match self.tape.get(self.index) {
                Some(frame) => *ctx.ac |= Word::from(*frame),
                None => {
                    event!(
                        target: "imlac::ptr",
                        Level::WARN,
                        "read past the end of the tape at {}",
                        Octal(*ctx.pc)
                    );
                }
            },
            STOP => self.stop(),
            START => {
                event!(target: "imlac::ptr", Level::DEBUG, "reader started");
                self.running = true;
                self.ready = false;
            }
            _ => {
                return Err(Unimplemented::new(
                    *ctx.pc,
                    format!("paper tape reader IOT {}", Octal(code)),
                ));
            }
        }
        Ok(())
    }

    /// Stops the reader and rewinds the tape.  The tape stays loaded.
    fn reset(&mut self) {
        self.stop();
        self.index = 0;
        self.clocks = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::RecordingConsole;

    fn iot(ptr: &mut PaperTapeReader, code: Word) -> Word {
        let (mut ac, mut pc) = (0, 0o100);
        let mut console = RecordingConsole::new();
        let mut ctx = IotContext {
            ac: &mut ac,
            pc: &mut pc,
            console: &mut console,
        };
        ptr.execute_iot(code, &mut ctx)
            .expect("reader IOTs are implemented");
        ac
    }

    fn wait_for(ptr: &mut PaperTapeReader, ready: bool) {
        for _ in 0..=(PTR_TICKS_PER_PHASE + 1) {
            if ptr.ready() == ready {
                return;
            }
            ptr.clock();
        }
        assert_eq!(ptr.ready(), ready);
    }

    #[test]
    fn test_reads_frames_in_order() {
        let mut ptr = PaperTapeReader::new();
        ptr.set_tape(vec![0o12, 0o345]);
        iot(&mut ptr, START);
        wait_for(&mut ptr, true);
        assert_eq!(iot(&mut ptr, READ), 0o12);
        wait_for(&mut ptr, false);
        wait_for(&mut ptr, true);
        assert_eq!(iot(&mut ptr, READ), 0o345);
        wait_for(&mut ptr, false);
        assert_eq!(ptr.position(), 2);

        // The tape has run out.
        for _ in 0..(3 * PTR_TICKS_PER_PHASE) {
            ptr.clock();
            assert!(!ptr.ready());
        }
        assert_eq!(iot(&mut ptr, READ), 0);
    }

    #[test]
    fn test_stopped_reader_does_not_advance() {
        let mut ptr = PaperTapeReader::new();
        ptr.set_tape(vec![1, 2, 3]);
        for _ in 0..(3 * PTR_TICKS_PER_PHASE) {
            ptr.clock();
        }
        assert!(!ptr.ready());
        assert_eq!(ptr.position(), 0);
    }

    #[test]
    fn test_reset_rewinds_but_keeps_tape() {
        let mut ptr = PaperTapeReader::new();
        ptr.set_tape(vec![7, 8]);
        iot(&mut ptr, START);
        wait_for(&mut ptr, true);
        wait_for(&mut ptr, false);
        assert_eq!(ptr.position(), 1);
        ptr.reset();
        assert_eq!(ptr.position(), 0);
        iot(&mut ptr, START);
        wait_for(&mut ptr, true);
        assert_eq!(iot(&mut ptr, READ), 7);
    }

    #[test]
    fn test_missing_tape_file() {
        let mut ptr = PaperTapeReader::new();
        assert!(ptr
            .load_tape(Path::new("/nonexistent/imlac/tape.ptp"))
            .is_err());
    }
}
