//! The PDS-4 display processor.
//!
//! Compared with the PDS-1, the PDS-4 addresses positions directly
//! (no doubling), has finer MSB steps, variable intensity and blink,
//! a two-word long vector with dash and return options, and Compact
//! Addressing mode.
//!
//! In Compact Addressing mode each half of a word is an index into a
//! 256-entry table of display subroutine addresses.  Each index
//! calls the subroutine; when it returns to the same stack depth we
//! go on to the next index.  An index of 0o377 ends the sequence.
use tracing::{event, Level};

use base::prelude::*;

use super::{DisplayCore, IncrementGeometry, PositionSwitches};
use crate::console::{Console, DrawingMode};
use crate::context::DisplayBus;
use crate::error::Unimplemented;
use crate::io::IotContext;
use crate::memory::MemoryUnit;
use crate::types::HalfWord;

const DLZ: Word = 0o1;
const DSN: Word = 0o2;
const DLA: Word = 0o3;
const DOF: Word = 0o12;
const DCF: Word = 0o71;
const DHC: Word = 0o304;

pub(super) const HANDLED_IOTS: &[Word] = &[DLZ, DSN, DLA, DOF, DCF, DHC];

const MSB_STEP: i32 = 0o20;

const GEOMETRY: IncrementGeometry = IncrementGeometry {
    msb_step: MSB_STEP,
    lsb_reset_mask: 0o177760,
    step_unit: 1,
    beam_mode: DrawingMode::Normal,
};

/// The intensity the display starts with.
const START_INTENSITY: Word = 16;

const CAM_END: u8 = 0o377;

#[derive(Debug, Default)]
struct CompactAddressing {
    enabled: bool,
    /// The subroutine table; always on a 256-word boundary.
    base: Word,
    word: Word,
    half: HalfWord,
    /// The stack depth at which a return resumes Compact Addressing.
    depth: usize,
}

#[derive(Debug)]
pub struct Pds4Display {
    pub(super) core: DisplayCore,
    cam: CompactAddressing,
}

impl Pds4Display {
    pub(super) fn new(mit_mode: bool) -> Pds4Display {
        Pds4Display {
            core: DisplayCore::new(mit_mode),
            cam: CompactAddressing::default(),
        }
    }

    pub(super) fn reset(&mut self) {
        self.core.reset();
        self.cam = CompactAddressing::default();
    }

    pub(super) fn start(&mut self, console: &mut dyn Console) {
        self.core.start();
        console.set_intensity(START_INTENSITY);
        console.set_blink(false);
    }

    pub(super) fn halt(&mut self) {
        self.core.halt();
        self.cam.enabled = false;
    }

    pub(super) fn execute_iot(
        &mut self,
        code: Word,
        ctx: &mut IotContext<'_>,
    ) -> Result<(), Unimplemented> {
        match code {
            DLZ => self.core.load_pc(*ctx.ac),
            DLA => {
                self.core.load_pc(*ctx.ac);
                self.start(ctx.console);
            }
            DSN => self.start(ctx.console),
            DOF => self.halt(),
            DCF => self.core.frame_latch = false,
            DHC => self.core.halted = false,
            _ => {
                return Err(Unimplemented::new(
                    *ctx.pc,
                    format!("PDS-4 display IOT {}", Octal(code)),
                ));
            }
        }
        Ok(())
    }

    pub(super) fn step(&mut self, bus: &mut DisplayBus<'_>) -> Result<(), Unimplemented> {
        match self.core.mode {
            DisplayMode::Processor => self.execute_processor(bus),
            DisplayMode::Increment => {
                if self.core.execute_increment(bus, &GEOMETRY) {
                    self.return_from_subroutine(bus.mem);
                }
                self.core.test_increment_breakpoint(bus.breakpoints);
                Ok(())
            }
            DisplayMode::CompactAddressing => {
                self.execute_compact_addressing(bus.mem);
                Ok(())
            }
            other => Err(Unimplemented::new(
                self.core.pc,
                format!("PDS-4 display in {other} mode"),
            )),
        }
    }

    /// Pops the return address.  If that takes us back to the depth
    /// at which Compact Addressing made the call, Compact Addressing
    /// resumes with the next index.
    fn return_from_subroutine(&mut self, mem: &mut MemoryUnit) {
        self.core.pop();
        if self.cam.enabled && self.cam.depth == self.core.stack.len() {
            self.next_cam_half(mem);
            self.core.mode = DisplayMode::CompactAddressing;
        }
    }

    fn next_cam_half(&mut self, mem: &mut MemoryUnit) {
        match self.cam.half {
            HalfWord::First => self.cam.half = HalfWord::Second,
            HalfWord::Second => {
                self.core.pc = self.core.pc.wrapping_add(1);
                self.cam.word = mem.fetch(self.core.pc);
                self.cam.half = HalfWord::First;
                mem.set_display_usage(self.core.pc, DisplayMode::CompactAddressing);
            }
        }
    }

    fn execute_compact_addressing(&mut self, mem: &mut MemoryUnit) {
        let index = half_word(self.cam.word, self.cam.half == HalfWord::First);
        if index == CAM_END {
            event!(target: "imlac::display", Level::TRACE, "leaving compact addressing mode");
            self.cam.enabled = false;
            self.core.pc = self.core.pc.wrapping_add(1);
        } else {
            let entry = self.cam.base | Word::from(index);
            self.cam.depth = self.core.stack.len();
            // The return address is the word holding the indexes.
            self.core.pc = self.core.pc.wrapping_sub(1);
            self.core.push();
            self.core.pc = mem.fetch(entry);
            event!(
                target: "imlac::display",
                Level::TRACE,
                "compact addressing call through {} to {}",
                Octal(entry),
                Octal(self.core.pc)
            );
        }
        self.core.mode = DisplayMode::Processor;
    }

    fn execute_processor(&mut self, bus: &mut DisplayBus<'_>) -> Result<(), Unimplemented> {
        let inst = self.core.fetch_instruction(bus.mem, decode_pds4)?;
        event!(
            target: "imlac::display",
            Level::TRACE,
            "{} {} (X={} Y={})",
            Octal(self.core.pc),
            inst.opcode,
            self.core.x,
            self.core.y
        );
        match inst.opcode {
            DisplayOpcode::Dlxa => {
                let y = i32::from(self.core.y);
                self.finish_position(bus, i32::from(inst.data), y);
            }
            DisplayOpcode::Dlya => {
                let x = i32::from(self.core.x);
                self.finish_position(bus, x, i32::from(inst.data));
            }
            DisplayOpcode::Deim => self.core.enter_increment_mode(inst.data),
            DisplayOpcode::Djmp => self.core.pc = self.core.jump_target(inst.data),
            DisplayOpcode::Djms => {
                self.core.push();
                self.core.pc = self.core.jump_target(inst.data);
            }
            DisplayOpcode::Dopr => self.execute_dopr(bus, inst.data),
            DisplayOpcode::Dlvh => self.draw_long_vector(bus, inst.word),
            DisplayOpcode::Dfxy => {
                self.core.switches = PositionSwitches::from_bits(inst.data);
                self.core.pc = self.core.pc.wrapping_add(1);
            }
            DisplayOpcode::Dvic => {
                bus.console.set_intensity(inst.data);
                self.core.pc = self.core.pc.wrapping_add(1);
            }
            DisplayOpcode::Dbli => {
                bus.console.set_blink(inst.data != 0);
                self.core.pc = self.core.pc.wrapping_add(1);
            }
            DisplayOpcode::Dcam => self.enter_compact_addressing(bus.mem)?,
            other => {
                return Err(Unimplemented::new(
                    self.core.pc,
                    format!("unimplemented display instruction {other}"),
                ));
            }
        }
        self.core.test_breakpoint(bus.breakpoints);
        Ok(())
    }

    fn finish_position(&mut self, bus: &mut DisplayBus<'_>, x: i32, y: i32) {
        if self.core.load_position(bus.console, x, y) {
            self.return_from_subroutine(bus.mem);
        } else {
            self.core.pc = self.core.pc.wrapping_add(1);
        }
    }

    fn enter_compact_addressing(&mut self, mem: &mut MemoryUnit) -> Result<(), Unimplemented> {
        if self.cam.enabled {
            return Err(Unimplemented::new(
                self.core.pc,
                "DCAM while already in compact addressing mode",
            ));
        }
        let base = mem.fetch(self.core.pc.wrapping_add(1));
        if base & 0o377 != 0 {
            return Err(Unimplemented::new(
                self.core.pc,
                format!(
                    "compact addressing table {} is not on a 256-word boundary",
                    Octal(base)
                ),
            ));
        }
        self.core.pc = self.core.pc.wrapping_add(2);
        self.cam = CompactAddressing {
            enabled: true,
            base,
            word: mem.fetch(self.core.pc),
            half: HalfWord::First,
            depth: self.core.stack.len(),
        };
        self.core.mode = DisplayMode::CompactAddressing;
        event!(
            target: "imlac::display",
            Level::DEBUG,
            "entering compact addressing mode, table at {}",
            Octal(base)
        );
        Ok(())
    }

    fn execute_dopr(&mut self, bus: &mut DisplayBus<'_>, data: Word) {
        if data & 0o4000 == 0 {
            self.halt();
        }
        // Bit 5 extends the DSTS and DSTB operands.
        let extension = if data & 0o2000 != 0 { 4 } else { 0 };
        self.core.step_msb(bus.console, data, MSB_STEP);
        if data & 0o40 != 0 {
            self.return_from_subroutine(bus.mem);
            // The PC is incremented below.
            self.core.pc = self.core.pc.wrapping_sub(1);
        }
        let core = &mut self.core;
        if data & 0o20 != 0 {
            bus.console.draw_point(core.x, core.y);
        }
        let c = data & 0o3;
        match (data & 0o14) >> 2 {
            0 => {
                if core.mit_mode && c == 1 {
                    core.dadr = !core.dadr;
                    event!(target: "imlac::display", Level::DEBUG, "DADR is now {}", core.dadr);
                }
            }
            1 => core.set_scale(bus.console, c + extension),
            2 => core.block = (c + extension) << 12,
            _ => {
                event!(target: "imlac::display", Level::DEBUG, "light pen enable ignored");
            }
        }
        core.pc = core.pc.wrapping_add(1);
    }

    /// A PDS-4 long vector is the DLVH instruction and one more word.
    fn draw_long_vector(&mut self, bus: &mut DisplayBus<'_>, word0: Word) {
        self.core.pc = self.core.pc.wrapping_add(1);
        let word1 = bus.mem.fetch(self.core.pc);
        let v = LongVector::pds4(word0, word1);
        // Dashed vectors are drawn solid.
        let scale = i32::from(self.core.scale);
        let x = i32::from(self.core.x) + v.dx * scale;
        let y = i32::from(self.core.y) + v.dy * scale;
        let mode = match (v.beam_on, v.dotted) {
            (false, _) => DrawingMode::Off,
            (true, true) => DrawingMode::Dotted,
            (true, false) => DrawingMode::Normal,
        };
        self.core.move_to(bus.console, x, y, mode);
        self.core.pc = self.core.pc.wrapping_add(1);
        if v.return_jump {
            self.return_from_subroutine(bus.mem);
        }
    }
}
