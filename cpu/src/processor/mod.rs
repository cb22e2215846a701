//! Emulates the Imlac main processor.
//!
//! Each call to [`Processor::clock`] advances the processor by one
//! memory cycle.  An instruction which references memory takes at
//! least two cycles: one to fetch it and one to execute it, with an
//! extra cycle for each level of indirection.  Operate, skip, shift
//! and IOT instructions execute in the cycle that fetches them.
//!
//! The instruction groups are implemented in separate files:
//!
//! - memory reference instructions: `op_memory`
//! - operate, skip, shift and the PDS-4 ACT 1 instructions: `op_operate`
//! - the PDS-4 stack instructions: `op_stack`
use std::ops::Range;

use serde::Serialize;
use tracing::{event, Level};

use base::prelude::*;

mod op_memory;
mod op_operate;
mod op_stack;

use crate::breakpoints::BreakpointKinds;
use crate::context::Bus;
use crate::error::{ConfigurationError, Unimplemented};
use crate::io::{dispatch_iot, IotContext, IotTarget, IOT_CODES};
use crate::memory::MemoryUnit;
use crate::types::{ByteAccess, ExecState, ProcessorState};

/// The processor starts here after a reset; the bootstrap loader
/// lives here.
pub const BOOTSTRAP_ADDRESS: Word = 0o40;

/// The page-number bits of an address.
const PAGE_BITS: Word = 0o174000;

/// Indirection through these page offsets increments the pointer.
const AUTO_INCREMENT: Range<Word> = 0o10..0o20;

/// On the PDS-4, indirection through these page offsets decrements
/// the pointer.
const AUTO_DECREMENT: Range<Word> = 0o20..0o30;

/// While the PC is in the bootstrap area, PDS-4 indirection stops
/// after one level.  Some bootstrap loaders rely on this.
const BOOTSTRAP_AREA: Range<Word> = 0o40..0o100;

/// Bootstrap loaders at the top of a 16K memory which also rely on
/// single-level indirection.
const HIGH_BOOTSTRAP_INDIRECTIONS: [Word; 2] = [0o37767, 0o37746];

/// The processor's registers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Registers {
    pub pc: Word,
    pub ac: Word,
    /// The Link is a single bit, 0 or 1.
    pub link: Word,
    /// The front-panel data switches.
    pub ds: Word,
    /// The PDS-4 stack pointers.
    pub sp: [Word; 2],
}

/// How an instruction changes the program counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PcChange {
    /// Go on to the following instruction.
    Next,
    /// Skip over this many of the following instructions.
    Skip(Word),
    /// Transfer control.
    Jump(Word),
}

#[derive(Debug)]
pub struct Processor {
    regs: Registers,
    state: ProcessorState,
    exec_state: ExecState,
    byte_access: ByteAccess,
    /// The instruction being executed, and where it came from.
    current: Option<(Word, Instruction)>,
    /// The operand address found by following indirection.
    indirect_address: Word,
    breakpoint_address: Option<Word>,
    /// Routes each IOT code to the unit which handles it.
    iot_table: Vec<Option<(IotTarget, &'static str)>>,
}

impl Processor {
    #[must_use]
    pub fn new() -> Processor {
        let mut processor = Processor {
            regs: Registers::default(),
            state: ProcessorState::Halted,
            exec_state: ExecState::Fetch,
            byte_access: ByteAccess::Normal,
            current: None,
            indirect_address: 0,
            breakpoint_address: None,
            iot_table: vec![None; IOT_CODES],
        };
        processor.reset();
        processor
    }

    /// Clears the registers and halts the processor.  IOT
    /// registrations survive a reset.
    pub fn reset(&mut self) {
        self.regs = Registers {
            pc: BOOTSTRAP_ADDRESS,
            ..Registers::default()
        };
        self.state = ProcessorState::Halted;
        self.exec_state = ExecState::Fetch;
        self.byte_access = ByteAccess::Normal;
        self.current = None;
        self.indirect_address = 0;
        self.breakpoint_address = None;
    }

    /// Routes the IOT codes in `codes` to `target`.  It is an error
    /// for two units to claim the same code; in that case nothing is
    /// registered.
    pub fn register(
        &mut self,
        target: IotTarget,
        name: &'static str,
        codes: &[Word],
    ) -> Result<(), ConfigurationError> {
        for code in codes {
            if let Some((_, existing)) = self.iot_table[iot_slot(*code)] {
                return Err(ConfigurationError::IotConflict {
                    code: *code,
                    existing,
                    new: name,
                });
            }
        }
        for code in codes {
            self.iot_table[iot_slot(*code)] = Some((target, name));
        }
        event!(
            target: "imlac::processor",
            Level::DEBUG,
            "registered {} IOT codes for {}",
            codes.len(),
            name
        );
        Ok(())
    }

    /// The unit which handles IOT `code`, if any.
    #[must_use]
    pub fn iot_target(&self, code: Word) -> Option<IotTarget> {
        self.iot_table[iot_slot(code)].map(|(target, _)| target)
    }

    #[must_use]
    pub fn registers(&self) -> &Registers {
        &self.regs
    }

    #[must_use]
    pub fn pc(&self) -> Word {
        self.regs.pc
    }

    pub fn set_pc(&mut self, pc: Word) {
        self.regs.pc = pc;
        self.exec_state = ExecState::Fetch;
        self.current = None;
    }

    #[must_use]
    pub fn ac(&self) -> Word {
        self.regs.ac
    }

    pub fn set_ac(&mut self, ac: Word) {
        self.regs.ac = ac;
    }

    #[must_use]
    pub fn link(&self) -> Word {
        self.regs.link
    }

    pub fn set_link(&mut self, link: bool) {
        self.regs.link = Word::from(link);
    }

    #[must_use]
    pub fn data_switches(&self) -> Word {
        self.regs.ds
    }

    /// Sets the front-panel data switches.  While the console maps
    /// keys onto the data switches, the console's setting wins.
    pub fn set_data_switches(&mut self, ds: Word) {
        self.regs.ds = ds;
    }

    #[must_use]
    pub fn state(&self) -> ProcessorState {
        self.state
    }

    pub fn set_state(&mut self, state: ProcessorState) {
        self.state = state;
    }

    pub fn halt(&mut self) {
        self.state = ProcessorState::Halted;
    }

    #[must_use]
    pub fn exec_state(&self) -> ExecState {
        self.exec_state
    }

    #[must_use]
    pub fn byte_access(&self) -> ByteAccess {
        self.byte_access
    }

    /// The instruction currently being executed (or just executed).
    #[must_use]
    pub fn current_instruction(&self) -> Option<Instruction> {
        self.current.map(|(_, inst)| inst)
    }

    /// Where the last breakpoint was hit.
    #[must_use]
    pub fn breakpoint_address(&self) -> Option<Word> {
        self.breakpoint_address
    }

    pub fn resume_from_breakpoint(&mut self) {
        if self.state == ProcessorState::BreakpointHalt {
            self.state = ProcessorState::Running;
        }
        self.breakpoint_address = None;
    }

    /// The processor can take an interrupt between instructions,
    /// except between a byte-access prefix (SBL or SBR) and the
    /// instruction it modifies.
    #[must_use]
    pub fn can_be_interrupted(&self) -> bool {
        self.exec_state == ExecState::Fetch && self.byte_access == ByteAccess::Normal
    }

    /// Takes an interrupt: the PC is saved in location 0 and
    /// execution continues at location 1.
    pub fn interrupt(&mut self, mem: &mut MemoryUnit) {
        event!(
            target: "imlac::interrupt",
            Level::DEBUG,
            "interrupt taken at {}",
            Octal(self.regs.pc)
        );
        mem.store(0, self.regs.pc);
        self.regs.pc = 1;
    }

    /// Disassembles the instruction at `address`.
    pub fn disassemble(
        mem: &MemoryUnit,
        cpu_type: CpuType,
        address: Word,
    ) -> Result<String, DecodeFailure> {
        let inst = match mem.cached_instruction(address) {
            Some(inst) => inst,
            None => decode(mem.fetch(address), cpu_type)?,
        };
        Ok(inst.disassemble(address))
    }

    /// Runs one memory cycle.  If the instruction cannot be executed
    /// the processor abandons it, leaving the PC at the following
    /// instruction, and reports why.
    pub fn clock(&mut self, bus: &mut Bus<'_>) -> Result<(), Unimplemented> {
        if self.state == ProcessorState::Halted {
            return Ok(());
        }
        if bus.console.data_switch_mapping_enabled() {
            self.regs.ds = bus.console.data_switches();
        }
        let result = match (self.exec_state, self.current) {
            (ExecState::Fetch, _) | (_, None) => self.fetch(bus),
            (ExecState::Defer, Some((_, inst))) => {
                self.defer(bus, inst);
                Ok(())
            }
            (ExecState::ExtraDefer, Some(_)) => {
                self.extra_defer(bus);
                Ok(())
            }
            (ExecState::Execute, Some((_, inst))) => {
                self.exec_state = ExecState::Fetch;
                self.execute(bus, inst)
            }
        };
        if let Err(e) = &result {
            event!(target: "imlac::processor", Level::DEBUG, "abandoning instruction: {}", e);
            self.regs.pc = e.address.wrapping_add(1);
            self.exec_state = ExecState::Fetch;
            self.byte_access = ByteAccess::Normal;
        }
        result
    }

    fn fetch(&mut self, bus: &mut Bus<'_>) -> Result<(), Unimplemented> {
        let pc = self.regs.pc;
        let inst = match bus.mem.cached_instruction(pc) {
            Some(inst) => inst,
            None => {
                let inst = decode(bus.mem.fetch(pc), bus.config.cpu_type)
                    .map_err(|e| Unimplemented::new(pc, e.to_string()))?;
                bus.mem.cache_instruction(pc, inst);
                inst
            }
        };
        event!(
            target: "imlac::processor",
            Level::TRACE,
            "{} {} (AC={} L={})",
            Octal(pc),
            inst.disassemble(pc),
            Octal(self.regs.ac),
            self.regs.link
        );
        self.current = Some((pc, inst));
        if inst.is_indirect() {
            self.exec_state = ExecState::Defer;
            Ok(())
        } else if inst.is_operate_or_iot() {
            self.exec_state = ExecState::Fetch;
            self.execute(bus, inst)
        } else {
            self.exec_state = ExecState::Execute;
            Ok(())
        }
    }

    /// Combines the page of the PC with a page offset.
    fn page_address(&self, mem: &MemoryUnit, offset: Word) -> Word {
        (self.regs.pc & (mem.mask() & PAGE_BITS)) | (offset & PAGE_OFFSET_MASK)
    }

    /// The address an instruction's operand lives at.
    fn operand_address(&self, mem: &MemoryUnit, inst: Instruction) -> Word {
        if inst.is_indirect() {
            self.indirect_address
        } else {
            self.page_address(mem, inst.data())
        }
    }

    fn defer(&mut self, bus: &mut Bus<'_>, inst: Instruction) {
        let pointer = self.page_address(bus.mem, inst.data());
        self.indirect_address = bus.mem.fetch(pointer);
        let pc = self.regs.pc;
        let single_level = bus.config.cpu_type == CpuType::Pds1
            || BOOTSTRAP_AREA.contains(&pc)
            || HIGH_BOOTSTRAP_INDIRECTIONS.contains(&pc);
        self.exec_state = if !single_level && self.indirect_address & INDIRECT_CHAIN_BIT != 0 {
            ExecState::ExtraDefer
        } else {
            ExecState::Execute
        };
        self.auto_index(bus, pointer);
    }

    /// PDS-4 multi-level indirection: follow the chain until we reach
    /// a word without the chain bit.
    fn extra_defer(&mut self, bus: &mut Bus<'_>) {
        let pointer = self.indirect_address;
        self.indirect_address = bus.mem.fetch(pointer);
        if self.indirect_address & INDIRECT_CHAIN_BIT == 0 {
            self.exec_state = ExecState::Execute;
        }
        self.auto_index(bus, pointer);
    }

    /// Applies auto-increment (or, on the PDS-4, auto-decrement) when
    /// `pointer` is one of the index locations of its page.
    fn auto_index(&mut self, bus: &mut Bus<'_>, pointer: Word) {
        let offset = pointer & PAGE_OFFSET_MASK;
        if AUTO_INCREMENT.contains(&offset) {
            self.indirect_address = self.indirect_address.wrapping_add(1);
        } else if bus.config.cpu_type == CpuType::Pds4 && AUTO_DECREMENT.contains(&offset) {
            self.indirect_address = self.indirect_address.wrapping_sub(1);
        } else {
            return;
        }
        bus.mem.store(pointer, self.indirect_address);
    }

    fn execute(&mut self, bus: &mut Bus<'_>, inst: Instruction) -> Result<(), Unimplemented> {
        let change = match inst.opcode() {
            Opcode::Law => {
                self.regs.ac = inst.data();
                PcChange::Next
            }
            Opcode::Lwc => {
                self.regs.ac = inst.data().wrapping_neg();
                PcChange::Next
            }
            Opcode::Jmp => self.op_jmp(bus, inst),
            Opcode::Jms => self.op_jms(bus, inst),
            Opcode::Dac => self.op_dac(bus, inst),
            Opcode::Xam => self.op_xam(bus, inst),
            Opcode::Isz => self.op_isz(bus, inst),
            Opcode::Dcm => self.op_dcm(bus, inst),
            Opcode::Lac => self.op_lac(bus, inst),
            Opcode::And => self.op_logical(bus, inst, |ac, q| ac & q),
            Opcode::Ior => self.op_logical(bus, inst, |ac, q| ac | q),
            Opcode::Xor => self.op_logical(bus, inst, |ac, q| ac ^ q),
            Opcode::Add => self.op_add(bus, inst),
            Opcode::Sub => self.op_sub(bus, inst),
            Opcode::Sam => self.op_sam(bus, inst),
            Opcode::Sad => self.op_sad(bus, inst),
            Opcode::Liac => self.op_liac(bus),
            Opcode::Opr => self.op_opr(inst),
            Opcode::Skp => self.op_skp(bus, inst),
            Opcode::Ral | Opcode::Rar | Opcode::Sal | Opcode::Sar => self.op_shift(bus, inst),
            Opcode::Iot => self.op_iot(bus, inst)?,
            Opcode::Swap
            | Opcode::Rdpc
            | Opcode::Rdax
            | Opcode::Rday
            | Opcode::Sbl
            | Opcode::Sbr
            | Opcode::Tac
            | Opcode::Dea
            | Opcode::Popd
            | Opcode::Pushd
            | Opcode::Lamp
            | Opcode::Dacs
            | Opcode::Lacs => self.op_act1(bus, inst),
            Opcode::Push | Opcode::Pusha | Opcode::Pop | Opcode::Popa => {
                self.op_stack(bus.mem, inst)
            }
            Opcode::Exact => {
                return Err(Unimplemented::new(
                    self.regs.pc,
                    format!("EXACT instruction {}", Octal(inst.word())),
                ));
            }
        };
        self.regs.pc = match change {
            PcChange::Next => self.regs.pc.wrapping_add(1),
            PcChange::Skip(n) => self.regs.pc.wrapping_add(1).wrapping_add(n),
            PcChange::Jump(target) => target,
        };

        // SBL and SBR modify only the instruction which follows them.
        if !matches!(inst.opcode(), Opcode::Sbl | Opcode::Sbr) {
            self.byte_access = ByteAccess::Normal;
        }

        if bus.breakpoints.test(BreakpointKinds::EXECUTION, self.regs.pc) {
            event!(
                target: "imlac::processor",
                Level::DEBUG,
                "execution breakpoint at {}",
                Octal(self.regs.pc)
            );
            self.state = ProcessorState::BreakpointHalt;
            self.breakpoint_address = Some(self.regs.pc);
        }
        Ok(())
    }

    fn op_iot(&mut self, bus: &mut Bus<'_>, inst: Instruction) -> Result<PcChange, Unimplemented> {
        let code = inst.data();
        // Many second-stage loaders begin with this undocumented IOT.
        if code == BOOTSTRAP_NOP_IOT {
            return Ok(PcChange::Next);
        }
        match self.iot_target(code) {
            Some(target) => {
                let mut ctx = IotContext {
                    ac: &mut self.regs.ac,
                    pc: &mut self.regs.pc,
                    console: &mut *bus.console,
                };
                dispatch_iot(target, bus.display, bus.devices, code, &mut ctx)?;
            }
            None => {
                event!(
                    target: "imlac::processor",
                    Level::WARN,
                    "Unimplemented IOT device {}, IOT opcode {}",
                    Octal(Word::from(inst.iot_device())),
                    Octal(code)
                );
            }
        }
        Ok(PcChange::Next)
    }

    /// Records a read or write breakpoint hit at `address`.
    fn test_data_breakpoint(&mut self, bus: &Bus<'_>, kind: BreakpointKinds, address: Word) {
        if bus.breakpoints.test(kind, address) {
            event!(
                target: "imlac::processor",
                Level::DEBUG,
                "{} breakpoint at {}",
                kind,
                Octal(address)
            );
            self.state = ProcessorState::BreakpointHalt;
            self.breakpoint_address = Some(address);
        }
    }
}

impl Default for Processor {
    fn default() -> Processor {
        Processor::new()
    }
}

fn iot_slot(code: Word) -> usize {
    usize::from(code) % IOT_CODES
}
