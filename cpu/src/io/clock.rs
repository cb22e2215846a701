//! The addressable clock.
//!
//! A programmable down-counter.  When it reaches zero the clock is
//! "triggered" and the counter reloads itself.  An initial count of
//! zero stops the clock.
use tracing::{event, Level};

use base::prelude::*;

use super::{IotContext, IotDevice};
use crate::error::Unimplemented;

const LOAD: Word = 0o121;
const CLEAR: Word = 0o122;
const SKIP_IF_TRIGGERED: Word = 0o124;
const READ: Word = 0o151;

#[derive(Debug, Default)]
pub struct AddressableClock {
    init: Word,
    count: Word,
    triggered: bool,
}

impl AddressableClock {
    #[must_use]
    pub fn new() -> AddressableClock {
        AddressableClock::default()
    }

    #[must_use]
    pub fn triggered(&self) -> bool {
        self.triggered
    }

    #[must_use]
    pub fn count(&self) -> Word {
        self.count
    }

    pub fn clock(&mut self) {
        if self.init == 0 {
            return;
        }
        if self.count > 0 {
            self.triggered = false;
            self.count -= 1;
        }
        if self.count == 0 {
            if !self.triggered {
                event!(Level::TRACE, "clock triggered");
            }
            self.triggered = true;
            self.count = self.init;
        }
    }
}

impl IotDevice for AddressableClock {
    fn name(&self) -> &'static str {
        "Clock"
    }

    fn handled_iots(&self) -> &'static [Word] {
        &[LOAD, CLEAR, SKIP_IF_TRIGGERED, READ]
    }

    fn execute_iot(&mut self, code: Word, ctx: &mut IotContext<'_>) -> Result<(), Unimplemented> {
        match code {
            LOAD => {
                self.init = *ctx.ac;
                self.count = *ctx.ac;
                self.triggered = false;
                event!(Level::DEBUG, "clock loaded with {}", Octal(self.init));
            }
            CLEAR => self.triggered = false,
            SKIP_IF_TRIGGERED => {
                if self.triggered {
                    *ctx.pc = ctx.pc.wrapping_add(1);
                }
            }
            READ => *ctx.ac |= self.count,
            _ => {
                return Err(Unimplemented::new(
                    *ctx.pc,
                    format!("clock IOT {}", Octal(code)),
                ));
            }
        }
        Ok(())
    }

    fn reset(&mut self) {
        *self = AddressableClock::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::RecordingConsole;

    fn iot(clock: &mut AddressableClock, code: Word, ac: &mut Word, pc: &mut Word) {
        let mut console = RecordingConsole::new();
        let mut ctx = IotContext {
            ac,
            pc,
            console: &mut console,
        };
        clock
            .execute_iot(code, &mut ctx)
            .expect("clock IOTs are implemented");
    }

    #[test]
    fn test_stopped_clock_never_triggers() {
        let mut clock = AddressableClock::new();
        for _ in 0..100 {
            clock.clock();
        }
        assert!(!clock.triggered());
    }

    #[test]
    fn test_countdown_and_reload() {
        let mut clock = AddressableClock::new();
        let (mut ac, mut pc) = (3, 0o100);
        iot(&mut clock, LOAD, &mut ac, &mut pc);
        clock.clock();
        clock.clock();
        assert!(!clock.triggered());
        clock.clock();
        assert!(clock.triggered());
        assert_eq!(clock.count(), 3);

        iot(&mut clock, SKIP_IF_TRIGGERED, &mut ac, &mut pc);
        assert_eq!(pc, 0o101);

        // The next decrement clears the trigger.
        clock.clock();
        assert!(!clock.triggered());
        iot(&mut clock, SKIP_IF_TRIGGERED, &mut ac, &mut pc);
        assert_eq!(pc, 0o101);

        ac = 0o100000;
        iot(&mut clock, READ, &mut ac, &mut pc);
        assert_eq!(ac, 0o100002);
    }
}
