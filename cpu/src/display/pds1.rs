//! The PDS-1 display processor.
//!
//! Positions on the PDS-1 are addressed in units of two: the 10-bit
//! DLXA/DLYA operand is shifted left once, and short and long
//! vectors are doubled.  The SGR-1 option adds reduced-intensity
//! positioning.
use tracing::{event, Level};

use base::prelude::*;

use super::{DisplayCore, IncrementGeometry, PositionSwitches};
use crate::console::DrawingMode;
use crate::context::DisplayBus;
use crate::error::Unimplemented;
use crate::io::IotContext;

const DLA: Word = 0o3;
const DOF: Word = 0o12;
const DCF: Word = 0o71;
const DHC: Word = 0o304;

pub(super) const HANDLED_IOTS: &[Word] = &[DLA, DOF, DCF, DHC];

const MSB_STEP: i32 = 0o40;

const GEOMETRY: IncrementGeometry = IncrementGeometry {
    msb_step: MSB_STEP,
    lsb_reset_mask: 0o177740,
    step_unit: 2,
    beam_mode: DrawingMode::Dotted,
};

#[derive(Debug)]
pub struct Pds1Display {
    pub(super) core: DisplayCore,
}

impl Pds1Display {
    pub(super) fn new(mit_mode: bool) -> Pds1Display {
        Pds1Display {
            core: DisplayCore::new(mit_mode),
        }
    }

    pub(super) fn execute_iot(
        &mut self,
        code: Word,
        ctx: &mut IotContext<'_>,
    ) -> Result<(), Unimplemented> {
        match code {
            // DLA does not start the PDS-1 display; the display-on
            // bit of a shift instruction does that.
            DLA => self.core.load_pc(*ctx.ac),
            DOF => self.core.halt(),
            DCF => self.core.frame_latch = false,
            DHC => self.core.halted = false,
            _ => {
                return Err(Unimplemented::new(
                    *ctx.pc,
                    format!("PDS-1 display IOT {}", Octal(code)),
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
                    self.core.pop();
                }
                self.core.test_increment_breakpoint(bus.breakpoints);
                Ok(())
            }
            other => Err(Unimplemented::new(
                self.core.pc,
                format!("PDS-1 display in {other} mode"),
            )),
        }
    }

    fn execute_processor(&mut self, bus: &mut DisplayBus<'_>) -> Result<(), Unimplemented> {
        let core = &mut self.core;
        let inst = core.fetch_instruction(bus.mem, decode_pds1)?;
        event!(
            target: "imlac::display",
            Level::TRACE,
            "{} {} (X={} Y={})",
            Octal(core.pc),
            inst.opcode,
            core.x,
            core.y
        );
        match inst.opcode {
            DisplayOpcode::Dlxa => {
                let x = i32::from(inst.data) << 1;
                let y = i32::from(core.y);
                self.finish_position(bus, x, y);
            }
            DisplayOpcode::Dlya => {
                let x = i32::from(core.x);
                let y = i32::from(inst.data) << 1;
                self.finish_position(bus, x, y);
            }
            DisplayOpcode::Deim => core.enter_increment_mode(inst.data),
            DisplayOpcode::Djmp => core.pc = core.jump_target(inst.data),
            DisplayOpcode::Djms => {
                core.push();
                core.pc = core.jump_target(inst.data);
            }
            DisplayOpcode::Dopr => self.execute_dopr(bus, inst.data),
            DisplayOpcode::Dlvh => self.draw_long_vector(bus),
            DisplayOpcode::Sgr1 => {
                core.switches = PositionSwitches::from_bits(inst.data);
                core.pc = core.pc.wrapping_add(1);
            }
            other => {
                return Err(Unimplemented::new(
                    core.pc,
                    format!("unimplemented display instruction {other}"),
                ));
            }
        }
        self.core.test_breakpoint(bus.breakpoints);
        Ok(())
    }

    fn finish_position(&mut self, bus: &mut DisplayBus<'_>, x: i32, y: i32) {
        if self.core.load_position(bus.console, x, y) {
            self.core.pop();
        } else {
            self.core.pc = self.core.pc.wrapping_add(1);
        }
    }

    fn execute_dopr(&mut self, bus: &mut DisplayBus<'_>, data: Word) {
        let core = &mut self.core;
        if data & 0o4000 == 0 {
            core.halt();
        }
        if data & 0o2000 != 0 {
            // Horizontal/vertical sync: the beam stays where it is.
            let (x, y) = (i32::from(core.x), i32::from(core.y));
            core.move_to(bus.console, x, y, DrawingMode::Off);
        }
        core.step_msb(bus.console, data, MSB_STEP);
        if data & 0o40 != 0 {
            core.pop();
            // The PC is incremented below.
            core.pc = core.pc.wrapping_sub(1);
        }
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
            1 => core.set_scale(bus.console, if c == 0 { 1 } else { c }),
            2 => {
                if !core.mit_mode {
                    core.block = c << 12;
                }
            }
            _ => {
                event!(target: "imlac::display", Level::DEBUG, "light pen enable ignored");
            }
        }
        core.pc = core.pc.wrapping_add(1);
    }

    /// A PDS-1 long vector is three words: the DLVH instruction and
    /// two words of parameters.
    fn draw_long_vector(&mut self, bus: &mut DisplayBus<'_>) {
        let core = &mut self.core;
        core.pc = core.pc.wrapping_add(1);
        let word1 = bus.mem.fetch(core.pc);
        core.pc = core.pc.wrapping_add(1);
        let word2 = bus.mem.fetch(core.pc);
        let v = LongVector::pds1(word1, word2);
        let scale = i32::from(core.scale);
        let x = i32::from(core.x) + v.dx * 2 * scale;
        let y = i32::from(core.y) + v.dy * 2 * scale;
        let mode = match (v.beam_on, v.dotted) {
            (false, _) => DrawingMode::Off,
            (true, true) => DrawingMode::Dotted,
            (true, false) => DrawingMode::Normal,
        };
        core.move_to(bus.console, x, y, mode);
        core.pc = core.pc.wrapping_add(1);
    }
}
