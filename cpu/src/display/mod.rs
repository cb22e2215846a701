//! The display processor.
//!
//! The display processor runs its own program out of the shared
//! memory, moving the beam around the screen.  The PDS-1 and the
//! PDS-4 have different display processors, with mutually
//! incompatible instruction sets, so each variant has its own module.
//! What they share (the frame clock, the X and Y accumulators, the
//! subroutine stack and the Increment mode engine) lives in
//! [`DisplayCore`].
//!
//! The display processor is started and stopped by the main
//! processor, through IOTs and (on the PDS-1) through the
//! display-on bit of the shift instructions.
use conv::*;
use tracing::{event, Level};

use base::prelude::*;

use crate::breakpoints::{BreakpointKinds, BreakpointManager};
use crate::console::{Console, DrawingMode};
use crate::context::DisplayBus;
use crate::error::Unimplemented;
use crate::io::{IotContext, IotDevice};
use crate::memory::MemoryUnit;
use crate::types::{HalfWord, ProcessorState};

mod pds1;
mod pds4;

#[cfg(test)]
mod tests;

pub use pds1::Pds1Display;
pub use pds4::Pds4Display;

/// Cycles per 1/40 second frame.
pub const PDS1_FRAME_PERIOD: u32 = 13889;
pub const PDS4_FRAME_PERIOD: u32 = 25253;

/// Depth of the display subroutine stack.
pub const STACK_DEPTH: usize = 8;

/// The X and Y accumulators are 11 bits wide.
const COORDINATE_MASK: i32 = 0o3777;

fn wrap_coordinate(value: i32) -> Word {
    Word::value_from(value & COORDINATE_MASK).unwrap_or_default()
}

/// The switches set by the PDS-1 SGR-1 instruction (and the PDS-4
/// DFXY instruction) which modify DLXA and DLYA.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct PositionSwitches {
    /// DLXA and DLYA draw (at reduced intensity) when the beam is on.
    pub enabled: bool,
    /// DLXA and DLYA return from a subroutine instead of
    /// continuing.
    pub return_jump: bool,
    pub beam_on: bool,
}

impl PositionSwitches {
    fn from_bits(bits: Word) -> PositionSwitches {
        PositionSwitches {
            enabled: bits & 0o1 != 0,
            return_jump: bits & 0o2 != 0,
            beam_on: bits & 0o4 != 0,
        }
    }

    fn drawing_mode(&self) -> DrawingMode {
        if self.enabled && self.beam_on {
            DrawingMode::Sgr1
        } else {
            DrawingMode::Off
        }
    }
}

/// The ways the two variants differ in Increment mode.
#[derive(Debug, Clone, Copy)]
pub(crate) struct IncrementGeometry {
    /// The amount by which an MSB increment moves the beam.
    pub msb_step: i32,
    /// Clears the bits below the MSB.
    pub lsb_reset_mask: i32,
    /// Short vector steps are multiplied by this (and by the scale).
    pub step_unit: i32,
    /// How a short vector is drawn when the beam is on.
    pub beam_mode: DrawingMode,
}

/// The state shared by both display processor variants.
#[derive(Debug)]
pub struct DisplayCore {
    pub(crate) state: ProcessorState,
    /// Set when the processor halts; cleared only by an IOT.
    pub(crate) halted: bool,
    pub(crate) mode: DisplayMode,
    pub(crate) pc: Word,
    /// The address the main processor last started the display at.
    pub(crate) pc_entry: Word,
    pub(crate) block: Word,
    pub(crate) stack: Vec<Word>,
    pub(crate) x: Word,
    pub(crate) y: Word,
    pub(crate) scale: Word,
    pub(crate) dadr: bool,
    pub(crate) clocks: u32,
    pub(crate) frame_latch: bool,
    pub(crate) immediate: Word,
    pub(crate) half: HalfWord,
    pub(crate) switches: PositionSwitches,
    pub(crate) mit_mode: bool,
    pub(crate) breakpoint_address: Option<Word>,
}

impl DisplayCore {
    pub(crate) fn new(mit_mode: bool) -> DisplayCore {
        DisplayCore {
            state: ProcessorState::Halted,
            halted: false,
            mode: DisplayMode::Processor,
            pc: 0,
            pc_entry: 0,
            block: 0,
            stack: Vec::with_capacity(STACK_DEPTH),
            x: 0,
            y: 0,
            scale: 1,
            dadr: false,
            clocks: 0,
            frame_latch: false,
            immediate: 0,
            half: HalfWord::First,
            switches: PositionSwitches::default(),
            mit_mode,
            breakpoint_address: None,
        }
    }

    pub(crate) fn reset(&mut self) {
        *self = DisplayCore::new(self.mit_mode);
    }

    /// Sets the display PC, as the main processor's DLA IOT does.
    /// Outside MIT mode this also selects the block.
    pub(crate) fn load_pc(&mut self, value: Word) {
        if !self.mit_mode {
            self.block = value & 0o30000;
        }
        self.pc = value;
        self.pc_entry = value;
        event!(
            target: "imlac::display",
            Level::DEBUG,
            "DPC set to {} (block {})",
            Octal(self.pc),
            Octal(self.block)
        );
    }

    pub(crate) fn start(&mut self) {
        event!(target: "imlac::display", Level::DEBUG, "display processor started at {}", Octal(self.pc));
        self.state = ProcessorState::Running;
        // The MIT DADR bit is cleared whenever the display starts.
        self.dadr = false;
        self.halted = false;
    }

    pub(crate) fn halt(&mut self) {
        event!(target: "imlac::display", Level::DEBUG, "display processor halted at {}", Octal(self.pc));
        self.state = ProcessorState::Halted;
        self.halted = true;
    }

    /// Counts one cycle of the frame clock.  Returns true if the
    /// processor should go on to execute something.
    pub(crate) fn count_clock(&mut self, period: u32, console: &mut dyn Console) -> bool {
        self.clocks += 1;
        if self.clocks > period {
            self.clocks = 0;
            self.frame_latch = true;
            console.frame_done();
        }
        self.state != ProcessorState::Halted
    }

    /// Saves the return address (the word after the current one).
    pub(crate) fn push(&mut self) {
        if self.stack.len() == STACK_DEPTH {
            let lost = self.stack.remove(0);
            event!(
                target: "imlac::display",
                Level::WARN,
                "display stack overflow at {}; discarding return address {}",
                Octal(self.pc),
                Octal(lost)
            );
        }
        self.stack.push(self.pc.wrapping_add(1));
    }

    pub(crate) fn pop(&mut self) {
        match self.stack.pop() {
            Some(address) => self.pc = address,
            None => {
                event!(
                    target: "imlac::display",
                    Level::WARN,
                    "display stack empty on return at {}",
                    Octal(self.pc)
                );
            }
        }
    }

    /// The destination of DJMP and DJMS.  Without DADR only 12 bits
    /// of the address are used.
    pub(crate) fn jump_target(&self, data: Word) -> Word {
        if self.dadr {
            data | self.block
        } else {
            (data & 0o7777) | self.block
        }
    }

    pub(crate) fn move_to(&mut self, console: &mut dyn Console, x: i32, y: i32, mode: DrawingMode) {
        self.x = wrap_coordinate(x);
        self.y = wrap_coordinate(y);
        console.move_absolute(self.x, self.y, mode);
    }

    pub(crate) fn set_scale(&mut self, console: &mut dyn Console, scale: Word) {
        self.scale = scale;
        console.set_scale(f32::value_from(scale).unwrap_or(1.0));
        event!(target: "imlac::display", Level::TRACE, "scale set to {}", scale);
    }

    /// DLXA and DLYA.
    pub(crate) fn load_position(
        &mut self,
        console: &mut dyn Console,
        x: i32,
        y: i32,
    ) -> bool {
        let mode = self.switches.drawing_mode();
        self.move_to(console, x, y, mode);
        self.switches.return_jump
    }

    /// The word at `pc` as a Processor-mode instruction, using the
    /// cache in memory if we can.
    pub(crate) fn fetch_instruction<F>(
        &self,
        mem: &mut MemoryUnit,
        decoder: F,
    ) -> Result<DisplayInstruction, Unimplemented>
    where
        F: Fn(Word, bool) -> Result<DisplayInstruction, DecodeFailure>,
    {
        if let Some(inst) = mem.cached_display_instruction(self.pc) {
            return Ok(inst);
        }
        let inst = decoder(mem.fetch(self.pc), self.mit_mode)
            .map_err(|e| Unimplemented::new(self.pc, e.to_string()))?;
        mem.cache_display_instruction(self.pc, inst);
        Ok(inst)
    }

    pub(crate) fn test_breakpoint(&mut self, breakpoints: &BreakpointManager) {
        if breakpoints.test(BreakpointKinds::DISPLAY, self.pc) {
            event!(
                target: "imlac::display",
                Level::INFO,
                "display breakpoint at {}",
                Octal(self.pc)
            );
            self.state = ProcessorState::BreakpointHalt;
            self.breakpoint_address = Some(self.pc);
        }
    }

    /// Enter Increment mode; the low half of `word` is the first byte
    /// to be interpreted.
    pub(crate) fn enter_increment_mode(&mut self, data: Word) {
        self.mode = DisplayMode::Increment;
        self.immediate = data;
        self.half = HalfWord::Second;
    }

    fn next_increment_half(&mut self, mem: &mut MemoryUnit) {
        match self.half {
            HalfWord::First => self.half = HalfWord::Second,
            HalfWord::Second => {
                self.pc = self.pc.wrapping_add(1);
                self.immediate = mem.fetch(self.pc);
                self.half = HalfWord::First;
                mem.set_display_usage(self.pc, DisplayMode::Increment);
            }
        }
    }

    /// Interprets one Increment-mode byte.  Returns true if the byte
    /// escapes back to Processor mode with a subroutine return; the
    /// caller must perform the return (the variants return
    /// differently) and then call
    /// [`DisplayCore::test_increment_breakpoint`].
    pub(crate) fn execute_increment(
        &mut self,
        bus: &mut DisplayBus<'_>,
        geometry: &IncrementGeometry,
    ) -> bool {
        let byte = half_word(self.immediate, self.half == HalfWord::First);
        let mut x = i32::from(self.x);
        let mut y = i32::from(self.y);
        let mut wants_return = false;
        match IncrementByte::from(byte) {
            IncrementByte::Control {
                escape,
                return_jump,
                increment_x_msb,
                reset_x_lsb,
                increment_y_msb,
                reset_y_lsb,
            } => {
                if escape {
                    event!(target: "imlac::display", Level::TRACE, "increment mode escape");
                    self.mode = DisplayMode::Processor;
                    self.pc = self.pc.wrapping_add(1);
                    wants_return = return_jump;
                } else {
                    self.next_increment_half(bus.mem);
                }
                if increment_x_msb {
                    x += geometry.msb_step;
                }
                if reset_x_lsb {
                    x &= geometry.lsb_reset_mask;
                }
                if increment_y_msb {
                    y += geometry.msb_step;
                }
                if reset_y_lsb {
                    y &= geometry.lsb_reset_mask;
                }
                self.move_to(bus.console, x, y, DrawingMode::Off);
            }
            IncrementByte::Draw {
                beam_on,
                x_negative,
                x_magnitude,
                y_negative,
                y_magnitude,
            } => {
                let scale = i32::from(self.scale);
                let dx = i32::from(x_magnitude) * scale * geometry.step_unit;
                let dy = i32::from(y_magnitude) * scale * geometry.step_unit;
                x += if x_negative { -dx } else { dx };
                y += if y_negative { -dy } else { dy };
                let mode = if beam_on {
                    geometry.beam_mode
                } else {
                    DrawingMode::Off
                };
                self.move_to(bus.console, x, y, mode);
                self.next_increment_half(bus.mem);
            }
        }
        wants_return
    }

    /// Display breakpoints are only checked on word boundaries in
    /// Increment mode.
    pub(crate) fn test_increment_breakpoint(&mut self, breakpoints: &BreakpointManager) {
        if self.half == HalfWord::First {
            self.test_breakpoint(breakpoints);
        }
    }

    /// DOPR micro-operations 0o1000-0o100 move the beam by whole MSB
    /// steps.
    pub(crate) fn step_msb(&mut self, console: &mut dyn Console, data: Word, step: i32) {
        for (bit, dx, dy) in [
            (0o1000, step, 0),
            (0o400, 0, step),
            (0o200, -step, 0),
            (0o100, 0, -step),
        ] {
            if data & bit != 0 {
                let x = i32::from(self.x) + dx;
                let y = i32::from(self.y) + dy;
                self.move_to(console, x, y, DrawingMode::Off);
            }
        }
    }
}

/// One of the two display processor variants.
#[derive(Debug)]
pub enum DisplayProcessor {
    Pds1(Pds1Display),
    Pds4(Pds4Display),
}

impl DisplayProcessor {
    #[must_use]
    pub fn new(cpu_type: CpuType, mit_mode: bool) -> DisplayProcessor {
        match cpu_type {
            CpuType::Pds1 => DisplayProcessor::Pds1(Pds1Display::new(mit_mode)),
            CpuType::Pds4 => DisplayProcessor::Pds4(Pds4Display::new(mit_mode)),
        }
    }

    pub(crate) fn core(&self) -> &DisplayCore {
        match self {
            DisplayProcessor::Pds1(d) => &d.core,
            DisplayProcessor::Pds4(d) => &d.core,
        }
    }

    pub(crate) fn core_mut(&mut self) -> &mut DisplayCore {
        match self {
            DisplayProcessor::Pds1(d) => &mut d.core,
            DisplayProcessor::Pds4(d) => &mut d.core,
        }
    }

    #[must_use]
    pub fn cpu_type(&self) -> CpuType {
        match self {
            DisplayProcessor::Pds1(_) => CpuType::Pds1,
            DisplayProcessor::Pds4(_) => CpuType::Pds4,
        }
    }

    #[must_use]
    pub fn state(&self) -> ProcessorState {
        self.core().state
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.core().state == ProcessorState::Running
    }

    /// The status flag which is raised when the display halts.
    #[must_use]
    pub fn halted_flag(&self) -> bool {
        self.core().halted
    }

    #[must_use]
    pub fn mode(&self) -> DisplayMode {
        self.core().mode
    }

    #[must_use]
    pub fn pc(&self) -> Word {
        self.core().pc
    }

    #[must_use]
    pub fn pc_entry(&self) -> Word {
        self.core().pc_entry
    }

    #[must_use]
    pub fn x(&self) -> Word {
        self.core().x
    }

    #[must_use]
    pub fn y(&self) -> Word {
        self.core().y
    }

    #[must_use]
    pub fn scale(&self) -> Word {
        self.core().scale
    }

    #[must_use]
    pub fn half(&self) -> HalfWord {
        self.core().half
    }

    #[must_use]
    pub fn frame_latch(&self) -> bool {
        self.core().frame_latch
    }

    /// The top of the subroutine stack, or 0 if it is empty.
    #[must_use]
    pub fn stack_top(&self) -> Word {
        self.core().stack.last().copied().unwrap_or(0)
    }

    #[must_use]
    pub fn stack_depth(&self) -> usize {
        self.core().stack.len()
    }

    #[must_use]
    pub fn breakpoint_address(&self) -> Option<Word> {
        self.core().breakpoint_address
    }

    pub fn resume_from_breakpoint(&mut self) {
        let core = self.core_mut();
        if core.state == ProcessorState::BreakpointHalt {
            core.state = ProcessorState::Running;
        }
        core.breakpoint_address = None;
    }

    /// Starts the display, as the PDS-1 shift instructions do when
    /// their display-on bit is set.
    pub fn start(&mut self, console: &mut dyn Console) {
        match self {
            DisplayProcessor::Pds1(d) => d.core.start(),
            DisplayProcessor::Pds4(d) => d.start(console),
        }
    }

    pub fn halt(&mut self) {
        match self {
            DisplayProcessor::Pds1(d) => d.core.halt(),
            DisplayProcessor::Pds4(d) => d.halt(),
        }
    }

    /// PUSHD: the main processor pushes the display PC.
    pub fn push(&mut self) {
        self.core_mut().push();
    }

    /// POPD: the main processor pops the display PC.
    pub fn pop(&mut self) {
        self.core_mut().pop();
    }

    /// Halts the display and clears its registers.  The beam goes
    /// back to the origin.
    pub fn reset(&mut self, console: &mut dyn Console) {
        IotDevice::reset(self);
        console.move_absolute(0, 0, DrawingMode::Off);
    }

    /// Runs one cycle.
    pub fn clock(&mut self, bus: &mut DisplayBus<'_>) -> Result<(), Unimplemented> {
        match self {
            DisplayProcessor::Pds1(d) => {
                if d.core.count_clock(PDS1_FRAME_PERIOD, bus.console) {
                    d.step(bus)?;
                }
            }
            DisplayProcessor::Pds4(d) => {
                if d.core.count_clock(PDS4_FRAME_PERIOD, bus.console) {
                    d.step(bus)?;
                }
            }
        }
        Ok(())
    }

    /// Disassembles the display code at `address`, returning the
    /// text and the number of words the instruction occupies.  An
    /// [`DisplayMode::Indeterminate`] mode means "however the word was
    /// last used".
    #[must_use]
    pub fn disassemble(&self, mem: &MemoryUnit, address: Word, mode: DisplayMode) -> (String, usize) {
        let mode = match mode {
            DisplayMode::Indeterminate => match mem.display_usage(address) {
                DisplayMode::Indeterminate => DisplayMode::Processor,
                used => used,
            },
            other => other,
        };
        let words = [
            mem.fetch(address),
            mem.fetch(address.wrapping_add(1)),
            mem.fetch(address.wrapping_add(2)),
        ];
        disassemble_display(self.cpu_type(), self.core().mit_mode, mode, words)
    }
}

impl IotDevice for DisplayProcessor {
    fn name(&self) -> &'static str {
        "Display"
    }

    fn handled_iots(&self) -> &'static [Word] {
        match self {
            DisplayProcessor::Pds1(_) => pds1::HANDLED_IOTS,
            DisplayProcessor::Pds4(_) => pds4::HANDLED_IOTS,
        }
    }

    fn execute_iot(&mut self, code: Word, ctx: &mut IotContext<'_>) -> Result<(), Unimplemented> {
        match self {
            DisplayProcessor::Pds1(d) => d.execute_iot(code, ctx),
            DisplayProcessor::Pds4(d) => d.execute_iot(code, ctx),
        }
    }

    fn reset(&mut self) {
        match self {
            DisplayProcessor::Pds1(d) => d.core.reset(),
            DisplayProcessor::Pds4(d) => d.reset(),
        }
    }
}
