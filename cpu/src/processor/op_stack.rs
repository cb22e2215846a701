//! The PDS-4 stack instructions (ACT 2).
//!
//! The stacks grow downward: a push stores at the stack pointer and
//! then decrements it, a pop increments the stack pointer and then
//! loads from it.
use base::prelude::*;

use super::op_operate::stack_index;
use super::{PcChange, Processor};
use crate::memory::MemoryUnit;

impl Processor {
    pub(super) fn op_stack(&mut self, mem: &mut MemoryUnit, inst: Instruction) -> PcChange {
        let sp = stack_index(inst);
        match inst.opcode() {
            Opcode::Push => {
                self.push(mem, sp, self.regs.ac);
                PcChange::Next
            }
            Opcode::Pusha => {
                let ret = self.regs.pc.wrapping_add(1);
                self.push(mem, sp, ret);
                PcChange::Next
            }
            Opcode::Pop => {
                self.regs.ac = self.pop(mem, sp);
                PcChange::Next
            }
            // PUSHA saved the address following it; control returns
            // to the word after that one.
            _ => PcChange::Jump(self.pop(mem, sp).wrapping_add(1)),
        }
    }

    fn push(&mut self, mem: &mut MemoryUnit, sp: usize, value: Word) {
        mem.store(self.regs.sp[sp], value);
        self.regs.sp[sp] = self.regs.sp[sp].wrapping_sub(1);
    }

    fn pop(&mut self, mem: &MemoryUnit, sp: usize) -> Word {
        self.regs.sp[sp] = self.regs.sp[sp].wrapping_add(1);
        mem.fetch(self.regs.sp[sp])
    }
}
