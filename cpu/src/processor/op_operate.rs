//! Instructions which do not reference memory: operate (OPR), skip
//! (SKP), the shifts and rotates, and the PDS-4 ACT 1 group.
use tracing::{event, Level};

use base::prelude::*;

use super::{PcChange, Processor};
use crate::context::Bus;
use crate::types::{ByteAccess, ProcessorState};

const OPR_CLEAR_AC: Word = 0o1;
const OPR_COMPLEMENT_AC: Word = 0o2;
const OPR_INCREMENT_AC: Word = 0o4;
const OPR_CLEAR_LINK: Word = 0o10;
const OPR_COMPLEMENT_LINK: Word = 0o20;
const OPR_OR_DATA_SWITCHES: Word = 0o40;
/// When this bit is clear, OPR halts the processor.
const OPR_NO_HALT: Word = 0o100000;

const SKIP_AC_ZERO: Word = 0o1;
const SKIP_AC_POSITIVE: Word = 0o2;
const SKIP_LINK_ZERO: Word = 0o4;
const SKIP_DISPLAY_ON: Word = 0o10;
const SKIP_KEY_READY: Word = 0o20;
const SKIP_TTY_DATA_READY: Word = 0o40;
const SKIP_TTY_SEND_READY: Word = 0o100;
const SKIP_FRAME_SYNC: Word = 0o200;
const SKIP_PTR_READY: Word = 0o400;

const SIGN_BIT: Word = 0o100000;

impl Processor {
    /// OPR combines micro-operations, applied in this order: clear,
    /// complement, increment, OR the data switches, then halt.
    pub(super) fn op_opr(&mut self, inst: Instruction) -> PcChange {
        let bits = inst.data();
        let regs = &mut self.regs;
        if bits & OPR_CLEAR_AC != 0 {
            regs.ac = 0;
        }
        if bits & OPR_CLEAR_LINK != 0 {
            regs.link = 0;
        }
        if bits & OPR_COMPLEMENT_AC != 0 {
            regs.ac = !regs.ac;
        }
        if bits & OPR_COMPLEMENT_LINK != 0 {
            regs.link ^= 1;
        }
        if bits & OPR_INCREMENT_AC != 0 {
            regs.ac = regs.ac.wrapping_add(1);
            if regs.ac == 0 {
                regs.link ^= 1;
            }
        }
        if bits & OPR_OR_DATA_SWITCHES != 0 {
            regs.ac |= regs.ds;
        }
        if bits & OPR_NO_HALT == 0 {
            event!(
                target: "imlac::processor",
                Level::DEBUG,
                "halted at {}",
                Octal(regs.pc)
            );
            self.state = ProcessorState::Halted;
        }
        PcChange::Next
    }

    /// SKP skips the next instruction if any of the selected
    /// conditions holds (or, when negated, if none does).
    pub(super) fn op_skp(&mut self, bus: &Bus<'_>, inst: Instruction) -> PcChange {
        let bits = inst.data();
        let conditions = [
            (SKIP_AC_ZERO, self.regs.ac == 0),
            (SKIP_AC_POSITIVE, self.regs.ac & SIGN_BIT == 0),
            (SKIP_LINK_ZERO, self.regs.link == 0),
            (SKIP_DISPLAY_ON, bus.display.is_running()),
            (SKIP_KEY_READY, bus.devices.keyboard.ready()),
            (SKIP_TTY_DATA_READY, bus.devices.tty.data_ready()),
            (SKIP_TTY_SEND_READY, bus.devices.tty.send_ready()),
            (SKIP_FRAME_SYNC, bus.display.frame_latch()),
            (SKIP_PTR_READY, bus.devices.ptr.ready()),
        ];
        // The condition gates are wired together, so every selected
        // condition takes part rather than the last one.
        let selected = conditions
            .iter()
            .any(|(bit, holds)| bits & bit != 0 && *holds);
        if selected != inst.skip_negate() {
            PcChange::Skip(1)
        } else {
            PcChange::Next
        }
    }

    /// Rotates go through the Link; shifts are arithmetic and leave
    /// the Link alone.  On the PDS-1 any of them can also start the
    /// display processor.
    pub(super) fn op_shift(&mut self, bus: &mut Bus<'_>, inst: Instruction) -> PcChange {
        let regs = &mut self.regs;
        for _ in 0..inst.data() {
            match inst.opcode() {
                Opcode::Ral => {
                    let old_link = regs.link;
                    regs.link = regs.ac >> 15;
                    regs.ac = (regs.ac << 1) | old_link;
                }
                Opcode::Rar => {
                    let old_link = regs.link;
                    regs.link = regs.ac & 1;
                    regs.ac = (regs.ac >> 1) | (old_link << 15);
                }
                Opcode::Sal => {
                    regs.ac = (regs.ac & SIGN_BIT) | ((regs.ac << 1) & !SIGN_BIT);
                }
                _ => {
                    regs.ac = (regs.ac & SIGN_BIT) | (regs.ac >> 1);
                }
            }
        }
        if inst.display_on() {
            bus.display.start(&mut *bus.console);
        }
        PcChange::Next
    }

    /// The PDS-4 ACT 1 instructions.
    pub(super) fn op_act1(&mut self, bus: &mut Bus<'_>, inst: Instruction) -> PcChange {
        let regs = &mut self.regs;
        match inst.opcode() {
            Opcode::Swap => regs.ac = regs.ac.swap_bytes(),
            Opcode::Rdpc => regs.ac = bus.display.pc() & 0o77777,
            Opcode::Rdax => regs.ac = bus.display.x(),
            Opcode::Rday => regs.ac = bus.display.y(),
            Opcode::Sbl => self.byte_access = ByteAccess::Left,
            Opcode::Sbr => self.byte_access = ByteAccess::Right,
            Opcode::Tac => {
                // Skip none, one or two instructions for negative,
                // positive and zero.
                return if regs.ac & SIGN_BIT != 0 {
                    PcChange::Next
                } else if regs.ac != 0 {
                    PcChange::Skip(1)
                } else {
                    PcChange::Skip(2)
                };
            }
            Opcode::Dea => {
                if regs.ac == 0 {
                    regs.link ^= 1;
                }
                regs.ac = regs.ac.wrapping_sub(1);
            }
            // The display stack may only be touched by the main
            // processor while the display is stopped.
            Opcode::Popd => {
                if bus.display.state() == ProcessorState::Halted {
                    bus.display.pop();
                }
            }
            Opcode::Pushd => {
                if bus.display.state() == ProcessorState::Halted {
                    bus.display.push();
                }
            }
            Opcode::Lamp => {
                event!(target: "imlac::keyboard", Level::INFO, "keyboard lamp flashed");
            }
            Opcode::Dacs => regs.sp[stack_index(inst)] = regs.ac,
            Opcode::Lacs => regs.ac = regs.sp[stack_index(inst)],
            other => {
                event!(
                    target: "imlac::processor",
                    Level::ERROR,
                    "{} is not an ACT 1 instruction",
                    other
                );
            }
        }
        PcChange::Next
    }
}

/// Which of the two PDS-4 stack pointers an instruction uses.
pub(super) fn stack_index(inst: Instruction) -> usize {
    usize::from(inst.data() & 1)
}
