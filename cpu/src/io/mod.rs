//! I/O devices and the IOT instruction.
//!
//! An IOT instruction carries a 9-bit code.  Each device says which
//! codes it handles and the main processor routes the instruction to
//! that device through a table indexed by the code.  Two devices
//! claiming the same code is a configuration error, detected when the
//! system is put together.
//!
//! The display processor also handles IOTs, but it is not one of
//! the [`Devices`]; it is a processor in its own right.
use std::fmt::{self, Display, Formatter};

use tracing::{event, Level};

use base::prelude::*;

use crate::console::Console;
use crate::display::DisplayProcessor;
use crate::error::Unimplemented;

pub mod channel;
mod clock;
pub mod interrupt;
pub mod keyboard;
mod ptr;
pub mod telnet;
mod tty;

pub use clock::AddressableClock;
pub use interrupt::InterruptFacility;
pub use keyboard::Keyboard;
pub use ptr::{PaperTapeReader, PTR_TICKS_PER_PHASE};
pub use tty::{Tty, TTY_RECEIVE_POLL_TICKS};

/// The number of distinct IOT codes.
pub const IOT_CODES: usize = 0o1000;

/// The parts of the main processor an IOT can see.
pub struct IotContext<'a> {
    pub ac: &'a mut Word,
    /// The address of the IOT instruction.  Skip IOTs increment it;
    /// the processor then steps past the IOT as usual.
    pub pc: &'a mut Word,
    pub console: &'a mut dyn Console,
}

/// A unit the main processor can address with IOT instructions.
///
/// Devices are not clocked through this trait.  [`Devices::clock`]
/// clocks each standard device directly, since each needs different
/// parts of the machine; the interrupt facility is clocked after
/// them so that it sees this tick's device flags.
pub trait IotDevice {
    fn name(&self) -> &'static str;

    /// The IOT codes this device responds to.
    fn handled_iots(&self) -> &'static [Word];

    fn execute_iot(&mut self, code: Word, ctx: &mut IotContext<'_>) -> Result<(), Unimplemented>;

    fn reset(&mut self);
}

/// Identifies the unit an IOT code is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IotTarget {
    Display,
    Clock,
    Interrupt,
    Keyboard,
    PaperTapeReader,
    Tty,
}

impl Display for IotTarget {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        f.write_str(match self {
            IotTarget::Display => "Display",
            IotTarget::Clock => "Clock",
            IotTarget::Interrupt => "Interrupt",
            IotTarget::Keyboard => "Keyboard",
            IotTarget::PaperTapeReader => "PTR",
            IotTarget::Tty => "TTY",
        })
    }
}

/// The I/O devices other than the display processor.
#[derive(Debug, Default)]
pub struct Devices {
    pub clock: AddressableClock,
    pub interrupt: InterruptFacility,
    pub keyboard: Keyboard,
    pub ptr: PaperTapeReader,
    pub tty: Tty,
}

impl Devices {
    #[must_use]
    pub fn new() -> Devices {
        Devices::default()
    }

    /// Every device, with the target the processor should route its
    /// IOTs to.
    pub fn each(&self) -> [(IotTarget, &dyn IotDevice); 5] {
        [
            (IotTarget::Clock, &self.clock),
            (IotTarget::Interrupt, &self.interrupt),
            (IotTarget::Keyboard, &self.keyboard),
            (IotTarget::PaperTapeReader, &self.ptr),
            (IotTarget::Tty, &self.tty),
        ]
    }

    /// Advances every device (except the interrupt facility, which
    /// is clocked last, after the processors) by one cycle.
    pub fn clock(&mut self, console: &dyn Console) {
        self.ptr.clock();
        self.tty.clock();
        self.keyboard.clock(console);
        self.clock.clock();
    }

    /// The status word the interrupt facility samples.  The frame
    /// latch belongs to the display processor so the caller supplies
    /// it.
    #[must_use]
    pub fn interrupt_status(&self, frame_latch: bool) -> Word {
        use interrupt::status;
        let mut s: Word = 0;
        for (flag, bit) in [
            (frame_latch, status::FRAME_SYNC),
            (self.tty.data_ready(), status::TTY_RECEIVE),
            (self.keyboard.ready(), status::KEYBOARD),
            (self.tty.sent_latch(), status::TTY_SEND),
            (self.clock.triggered(), status::CLOCK),
        ] {
            if flag {
                s |= bit;
            }
        }
        s
    }

    pub fn reset(&mut self) {
        self.clock.reset();
        self.interrupt.reset();
        self.keyboard.reset();
        self.ptr.reset();
        self.tty.reset();
    }
}

/// Runs an IOT on the unit the processor's table routes it to.
pub(crate) fn dispatch_iot(
    target: IotTarget,
    display: &mut DisplayProcessor,
    devices: &mut Devices,
    code: Word,
    ctx: &mut IotContext<'_>,
) -> Result<(), Unimplemented> {
    event!(
        target: "imlac::processor",
        Level::TRACE,
        "IOT {} to {}",
        Octal(code),
        target
    );
    let unit: &mut dyn IotDevice = match target {
        IotTarget::Display => display,
        IotTarget::Clock => &mut devices.clock,
        IotTarget::Interrupt => &mut devices.interrupt,
        IotTarget::Keyboard => &mut devices.keyboard,
        IotTarget::PaperTapeReader => &mut devices.ptr,
        IotTarget::Tty => &mut devices.tty,
    };
    unit.execute_iot(code, ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::RecordingConsole;
    use keyboard::{ImlacKey, KeyModifiers};

    #[test]
    fn test_devices_clock_leaves_interrupts_alone() {
        let mut devices = Devices::new();
        let mut console = RecordingConsole::new();
        console.press(ImlacKey::Space, KeyModifiers::NONE);
        devices.clock(&console);
        assert!(devices.keyboard.ready());
        assert!(!devices.interrupt.pending());
        assert_eq!(devices.interrupt_status(false), interrupt::status::KEYBOARD);
    }
}
