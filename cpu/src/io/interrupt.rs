//! The interrupt facility.
//!
//! While interrupts are enabled, the facility samples the status of
//! the other devices once per cycle.  If any status bit selected by
//! the program's mask is set, an interrupt becomes pending, and it
//! is taken as soon as the main processor can be interrupted: the PC
//! is saved at location 0, execution continues at location 1 and
//! interrupts are disabled until the program enables them again.
use tracing::{event, Level};

use base::prelude::*;

use super::{IotContext, IotDevice};
use crate::error::Unimplemented;

/// Status bits, in the positions the program sees them (by IOT 041)
/// and masks them (by IOT 061).
pub mod status {
    use base::prelude::Word;

    pub const FRAME_SYNC: Word = 0o2;
    pub const TTY_RECEIVE: Word = 0o10;
    pub const KEYBOARD: Word = 0o20;
    pub const TTY_SEND: Word = 0o40;
    pub const CLOCK: Word = 0o20000;
}

const DISABLE: Word = 0o161;
const ENABLE: Word = 0o162;
const READ_STATUS: Word = 0o101;
const SET_MASK: Word = 0o141;

#[derive(Debug, Default)]
pub struct InterruptFacility {
    enabled: bool,
    pending: bool,
    mask: Word,
    status: Word,
}

impl InterruptFacility {
    #[must_use]
    pub fn new() -> InterruptFacility {
        InterruptFacility::default()
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    #[must_use]
    pub fn pending(&self) -> bool {
        self.pending
    }

    /// Samples the device status and decides whether the main
    /// processor should take an interrupt now.  When this returns
    /// true the caller must perform the interrupt.
    pub fn clock(&mut self, status: Word, can_interrupt: bool) -> bool {
        if !self.enabled {
            return false;
        }
        self.status = status;
        if self.mask & self.status != 0 {
            self.pending = true;
        }
        if self.pending && can_interrupt {
            event!(
                target: "imlac::interrupt",
                Level::DEBUG,
                "interrupt taken (status {}, mask {})",
                Octal(self.status),
                Octal(self.mask)
            );
            self.enabled = false;
            self.pending = false;
            return true;
        }
        false
    }
}

impl IotDevice for InterruptFacility {
    fn name(&self) -> &'static str {
        "Interrupt"
    }

    fn handled_iots(&self) -> &'static [Word] {
        &[DISABLE, ENABLE, READ_STATUS, SET_MASK]
    }

    fn execute_iot(&mut self, code: Word, ctx: &mut IotContext<'_>) -> Result<(), Unimplemented> {
        match code {
            DISABLE => {
                self.enabled = false;
                self.pending = false;
            }
            ENABLE => self.enabled = true,
            READ_STATUS => *ctx.ac |= self.status,
            SET_MASK => {
                self.mask = *ctx.ac;
                event!(
                    target: "imlac::interrupt",
                    Level::DEBUG,
                    "interrupt mask set to {}",
                    Octal(self.mask)
                );
            }
            _ => {
                return Err(Unimplemented::new(
                    *ctx.pc,
                    format!("interrupt IOT {}", Octal(code)),
                ));
            }
        }
        Ok(())
    }

    fn reset(&mut self) {
        *self = InterruptFacility::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::RecordingConsole;

    fn iot(facility: &mut InterruptFacility, code: Word, ac: &mut Word) {
        let mut pc = 0o100;
        let mut console = RecordingConsole::new();
        let mut ctx = IotContext {
            ac,
            pc: &mut pc,
            console: &mut console,
        };
        facility
            .execute_iot(code, &mut ctx)
            .expect("interrupt IOTs are implemented");
    }

    #[test]
    fn test_disabled_facility_ignores_status() {
        let mut facility = InterruptFacility::new();
        let mut ac = status::KEYBOARD;
        iot(&mut facility, SET_MASK, &mut ac);
        assert!(!facility.clock(status::KEYBOARD, true));
        assert!(!facility.pending());
    }

    #[test]
    fn test_pending_until_interruptible() {
        let mut facility = InterruptFacility::new();
        let mut ac = status::TTY_RECEIVE | status::CLOCK;
        iot(&mut facility, SET_MASK, &mut ac);
        iot(&mut facility, ENABLE, &mut ac);

        // Unmasked status does nothing.
        assert!(!facility.clock(status::KEYBOARD, true));
        assert!(!facility.pending());

        assert!(!facility.clock(status::CLOCK, false));
        assert!(facility.pending());
        // The condition has gone away but the interrupt remains
        // pending.
        assert!(facility.clock(0, true));
        assert!(!facility.enabled());
        assert!(!facility.pending());
    }

    #[test]
    fn test_read_status() {
        let mut facility = InterruptFacility::new();
        let mut ac = 0;
        iot(&mut facility, ENABLE, &mut ac);
        facility.clock(status::FRAME_SYNC | status::TTY_SEND, false);
        ac = 0o100000;
        iot(&mut facility, READ_STATUS, &mut ac);
        assert_eq!(ac, 0o100000 | status::FRAME_SYNC | status::TTY_SEND);
    }
}
