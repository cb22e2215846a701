//! Memory reference instructions.
//!
//! These find their operand in the current page (or through
//! indirection) and honour the PDS-4 byte access mode set by SBL and
//! SBR, except where noted.  Read and write breakpoints are tested
//! against the operand address.
use base::prelude::*;

use super::{PcChange, Processor};
use crate::breakpoints::BreakpointKinds;
use crate::context::Bus;
use crate::types::ByteAccess;

impl Processor {
    /// Reads a whole word, testing for a read breakpoint.
    fn read_word(&mut self, bus: &Bus<'_>, address: Word) -> Word {
        self.test_data_breakpoint(bus, BreakpointKinds::READ, address);
        bus.mem.fetch(address)
    }

    /// Reads the operand of `inst`.  In byte access mode, just the
    /// selected byte is read.
    fn read_operand(&mut self, bus: &Bus<'_>, inst: Instruction) -> Word {
        let address = self.operand_address(bus.mem, inst);
        let value = self.read_word(bus, address);
        match self.byte_access {
            ByteAccess::Normal => value,
            ByteAccess::Left => value >> 8,
            ByteAccess::Right => value & 0o377,
        }
    }

    /// Writes the operand of `inst`.  In byte access mode only the
    /// selected byte of memory changes.
    fn write_operand(&mut self, bus: &mut Bus<'_>, inst: Instruction, value: Word) {
        let address = self.operand_address(bus.mem, inst);
        self.test_data_breakpoint(bus, BreakpointKinds::WRITE, address);
        let stored = match self.byte_access {
            ByteAccess::Normal => value,
            ByteAccess::Left => (bus.mem.fetch(address) & 0o377) | (value << 8),
            ByteAccess::Right => (bus.mem.fetch(address) & 0o177400) | (value & 0o377),
        };
        bus.mem.store(address, stored);
    }

    pub(super) fn op_jmp(&mut self, bus: &Bus<'_>, inst: Instruction) -> PcChange {
        self.byte_access = ByteAccess::Normal;
        PcChange::Jump(self.operand_address(bus.mem, inst))
    }

    /// JMS stores the return address in the target location and
    /// continues at the location after it.
    pub(super) fn op_jms(&mut self, bus: &mut Bus<'_>, inst: Instruction) -> PcChange {
        self.byte_access = ByteAccess::Normal;
        let target = self.operand_address(bus.mem, inst);
        self.write_operand(bus, inst, self.regs.pc.wrapping_add(1));
        PcChange::Jump(target.wrapping_add(1))
    }

    pub(super) fn op_dac(&mut self, bus: &mut Bus<'_>, inst: Instruction) -> PcChange {
        self.write_operand(bus, inst, self.regs.ac);
        PcChange::Next
    }

    pub(super) fn op_xam(&mut self, bus: &mut Bus<'_>, inst: Instruction) -> PcChange {
        let q = self.read_operand(bus, inst);
        self.write_operand(bus, inst, self.regs.ac);
        self.regs.ac = q;
        PcChange::Next
    }

    /// ISZ always works on the whole word.
    pub(super) fn op_isz(&mut self, bus: &mut Bus<'_>, inst: Instruction) -> PcChange {
        self.byte_access = ByteAccess::Normal;
        let q = self.read_operand(bus, inst).wrapping_add(1);
        self.write_operand(bus, inst, q);
        if q == 0 {
            PcChange::Skip(1)
        } else {
            PcChange::Next
        }
    }

    /// DCM (PDS-4) always works on the whole word.
    pub(super) fn op_dcm(&mut self, bus: &mut Bus<'_>, inst: Instruction) -> PcChange {
        self.byte_access = ByteAccess::Normal;
        let q = self.read_operand(bus, inst).wrapping_sub(1);
        self.write_operand(bus, inst, q);
        PcChange::Next
    }

    pub(super) fn op_lac(&mut self, bus: &Bus<'_>, inst: Instruction) -> PcChange {
        self.regs.ac = self.read_operand(bus, inst);
        PcChange::Next
    }

    pub(super) fn op_logical(
        &mut self,
        bus: &Bus<'_>,
        inst: Instruction,
        combine: fn(Word, Word) -> Word,
    ) -> PcChange {
        let q = self.read_operand(bus, inst);
        self.regs.ac = combine(self.regs.ac, q);
        PcChange::Next
    }

    /// A carry out of the accumulator complements the Link.
    pub(super) fn op_add(&mut self, bus: &Bus<'_>, inst: Instruction) -> PcChange {
        let q = self.read_operand(bus, inst);
        let (sum, carry) = self.regs.ac.overflowing_add(q);
        self.regs.ac = sum;
        if carry {
            self.regs.link ^= 1;
        }
        PcChange::Next
    }

    /// A borrow complements the Link.
    pub(super) fn op_sub(&mut self, bus: &Bus<'_>, inst: Instruction) -> PcChange {
        let q = self.read_operand(bus, inst);
        let (difference, borrow) = self.regs.ac.overflowing_sub(q);
        self.regs.ac = difference;
        if borrow {
            self.regs.link ^= 1;
        }
        PcChange::Next
    }

    /// Skip if the accumulator equals the operand.
    pub(super) fn op_sam(&mut self, bus: &Bus<'_>, inst: Instruction) -> PcChange {
        let q = self.read_operand(bus, inst);
        if self.regs.ac == q {
            PcChange::Skip(1)
        } else {
            PcChange::Next
        }
    }

    /// Skip if the accumulator differs from the operand (PDS-4).
    pub(super) fn op_sad(&mut self, bus: &Bus<'_>, inst: Instruction) -> PcChange {
        let q = self.read_operand(bus, inst);
        if self.regs.ac != q {
            PcChange::Skip(1)
        } else {
            PcChange::Next
        }
    }

    /// LIAC (PDS-4) loads the word the accumulator points at.
    pub(super) fn op_liac(&mut self, bus: &Bus<'_>) -> PcChange {
        self.regs.ac = self.read_word(bus, self.regs.ac);
        PcChange::Next
    }
}
