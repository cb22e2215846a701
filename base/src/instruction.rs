//! Binary and decoded representations of main-processor instructions.
//!
//! An Imlac instruction occupies one 16-bit word.  Memory reference
//! ("order") instructions look like this (bit 0 is the most
//! significant bit, following the Imlac documentation):
//!
//! |Indirect| Order code | Page offset |
//! |--------|------------|-------------|
//! | 1 bit  |  4 bits    |  11 bits    |
//! |  (0)   |  (1-4)     |  (5-15)     |
//!
//! The remaining instructions are "microcoded": operate (class 1),
//! shift/rotate (class 2), skip (class 3) and IOT, each of which
//! combines independently-selected micro-operations in one word.
//! The PDS-4 adds stack, byte-addressing and display-access
//! instructions in otherwise unused corners of the encoding space,
//! which is why decoding needs to know which [`CpuType`] is being
//! emulated.

use std::fmt::{self, Display, Formatter};

#[cfg(test)]
use test_strategy::proptest;

use super::types::{CpuType, Octal, Word, PAGE_OFFSET_MASK};

mod format;

/// The IOT code which appears as the first instruction of many boot
/// tapes.  It is not documented and we treat it as a no-op.
pub const BOOTSTRAP_NOP_IOT: Word = 0o060;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Opcode {
    // Memory reference instructions.
    Law,
    Lwc,
    Jmp,
    Sad,
    Dac,
    Xam,
    Isz,
    Jms,
    Dcm,
    And,
    Ior,
    Xor,
    Lac,
    Add,
    Sub,
    Sam,

    // Microcoded instructions.
    Opr,
    Iot,
    Ral,
    Rar,
    Sal,
    Sar,
    Skp,

    // PDS-4 only.
    Swap,
    Rdpc,
    Rdax,
    Rday,
    Sbl,
    Sbr,
    Tac,
    Dea,
    Popd,
    Pushd,
    Lamp,
    Dacs,
    Lacs,
    Push,
    Pusha,
    Pop,
    Popa,
    Liac,
    Exact,
}

impl Opcode {
    /// Returns true for the instructions which only exist on the
    /// PDS-4 (including SAD and DCM, which use order codes which
    /// are unassigned on the PDS-1).
    #[must_use]
    pub fn pds4_only(&self) -> bool {
        use Opcode::*;
        matches!(
            self,
            Sad | Dcm
                | Swap
                | Rdpc
                | Rdax
                | Rday
                | Sbl
                | Sbr
                | Tac
                | Dea
                | Popd
                | Pushd
                | Lamp
                | Dacs
                | Lacs
                | Push
                | Pusha
                | Pop
                | Popa
                | Liac
                | Exact
        )
    }
}

/// Signals that a word does not correspond to any instruction of the
/// selected processor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecodeFailure {
    pub word: Word,
}

impl Display for DecodeFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "Unhandled instruction {}", Octal(self.word))
    }
}

impl std::error::Error for DecodeFailure {}

/// A decoded main-processor instruction.  Decoding depends only on
/// the instruction word (and the CPU type) so these are immutable
/// and can be cached per memory location.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Instruction {
    word: Word,
    opcode: Opcode,
    data: Word,
    indirect: bool,
    operate_or_iot: bool,
    skip_negate: bool,
    display_on: bool,
    iot_device: u8,
    iot_op: u8,
    cpu_type: CpuType,
}

impl Instruction {
    fn new(word: Word, opcode: Opcode, data: Word, cpu_type: CpuType) -> Instruction {
        Instruction {
            word,
            opcode,
            data,
            indirect: false,
            operate_or_iot: false,
            skip_negate: false,
            display_on: false,
            iot_device: 0,
            iot_op: 0,
            cpu_type,
        }
    }

    /// The instruction word this was decoded from.
    #[must_use]
    pub fn word(&self) -> Word {
        self.word
    }

    #[must_use]
    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    /// The operand field.  Its meaning depends on the opcode: a
    /// page offset, an immediate value, a shift count, a set of
    /// micro-operation bits or an IOT code.
    #[must_use]
    pub fn data(&self) -> Word {
        self.data
    }

    #[must_use]
    pub fn is_indirect(&self) -> bool {
        self.indirect
    }

    /// True for instructions which do not reference memory and so
    /// execute in a single cycle, straight from the Fetch state.
    #[must_use]
    pub fn is_operate_or_iot(&self) -> bool {
        self.operate_or_iot
    }

    #[must_use]
    pub fn skip_negate(&self) -> bool {
        self.skip_negate
    }

    /// On the PDS-1, shift instructions can also start the display
    /// processor.
    #[must_use]
    pub fn display_on(&self) -> bool {
        self.display_on
    }

    #[must_use]
    pub fn iot_device(&self) -> u8 {
        self.iot_device
    }

    #[must_use]
    pub fn iot_op(&self) -> u8 {
        self.iot_op
    }

    #[must_use]
    pub fn cpu_type(&self) -> CpuType {
        self.cpu_type
    }
}

/// Decodes `word` as an instruction for a processor of type
/// `cpu_type`.  Encodings are tried from the most specific to the
/// least specific.
pub fn decode(word: Word, cpu_type: CpuType) -> Result<Instruction, DecodeFailure> {
    decode_class1(word, cpu_type)
        .or_else(|| decode_class2(word, cpu_type))
        .or_else(|| decode_act2(word, cpu_type))
        .or_else(|| decode_class3(word, cpu_type))
        .or_else(|| decode_iot(word, cpu_type))
        .or_else(|| decode_exact(word, cpu_type))
        .or_else(|| decode_order(word, cpu_type))
        .ok_or(DecodeFailure { word })
}

/// Class 1 (operate) instructions have zeroes in bits 1-9.  Bit 0
/// clear means halt.
fn decode_class1(word: Word, cpu_type: CpuType) -> Option<Instruction> {
    if word & 0o077700 != 0 {
        return None;
    }
    let mut inst = Instruction::new(word, Opcode::Opr, word & 0o100077, cpu_type);
    inst.operate_or_iot = true;
    Some(inst)
}

/// Class 2 instructions are shifts and rotates (plus, on the PDS-1,
/// the display-on bit).  The PDS-4 puts its ACT 1 instructions here
/// too, in shift encodings which would be no-ops on the PDS-1.
fn decode_class2(word: Word, cpu_type: CpuType) -> Option<Instruction> {
    if word & 0o177000 != 0o003000 {
        return None;
    }
    let mut inst = Instruction::new(word, Opcode::Ral, 0, cpu_type);
    inst.operate_or_iot = true;
    if cpu_type == CpuType::Pds1 && word & 0o100 != 0 {
        inst.display_on = true;
    }
    if cpu_type == CpuType::Pds4 {
        let act1 = match word & 0o77 {
            0o50 => Some((Opcode::Popd, 0)),
            0o51 => Some((Opcode::Pushd, 0)),
            0o52 => Some((Opcode::Lamp, 0)),
            _ => match word & 0o37 {
                0o00 => Some((Opcode::Swap, 0)),
                0o04 => Some((Opcode::Rdpc, 0)),
                0o05 => Some((Opcode::Rdax, 0)),
                0o06 => Some((Opcode::Rday, 0)),
                0o10 => Some((Opcode::Sbl, 0)),
                0o11 => Some((Opcode::Sbr, 0)),
                0o24 => Some((Opcode::Tac, 0)),
                0o25 => Some((Opcode::Dea, 0)),
                0o30 | 0o31 => Some((Opcode::Dacs, word & 1)),
                0o32 | 0o33 => Some((Opcode::Lacs, word & 1)),
                _ => None,
            },
        };
        if let Some((opcode, data)) = act1 {
            inst.opcode = opcode;
            inst.data = data;
            return Some(inst);
        }
    }
    inst.data = word & 0o3;
    inst.opcode = match (word & 0o40 != 0, word & 0o20 != 0) {
        (false, false) => Opcode::Ral,
        (false, true) => Opcode::Rar,
        (true, false) => Opcode::Sal,
        (true, true) => Opcode::Sar,
    };
    Some(inst)
}

/// Class 3 instructions are skips.  Bit 0 negates the combined
/// skip condition.
fn decode_class3(word: Word, cpu_type: CpuType) -> Option<Instruction> {
    if word & 0o077000 != 0o002000 {
        return None;
    }
    let mut inst = Instruction::new(word, Opcode::Skp, word & 0o777, cpu_type);
    inst.skip_negate = word & 0o100000 != 0;
    inst.operate_or_iot = true;
    Some(inst)
}

/// The PDS-4 ACT 2 instructions operate on the stacks.  They need a
/// memory cycle, so they go through the Execute state.
fn decode_act2(word: Word, cpu_type: CpuType) -> Option<Instruction> {
    if cpu_type != CpuType::Pds4 || word & 0o177700 != 0o103000 {
        return None;
    }
    let opcode = match word & 0o17 {
        0o0 | 0o1 => Opcode::Push,
        0o2 | 0o3 => Opcode::Pusha,
        0o4 | 0o5 => Opcode::Pop,
        0o6 | 0o7 => Opcode::Popa,
        0o10 => Opcode::Liac,
        _ => {
            return None;
        }
    };
    Some(Instruction::new(word, opcode, word & 1, cpu_type))
}

fn decode_iot(word: Word, cpu_type: CpuType) -> Option<Instruction> {
    if word & 0o177000 != 0o001000 {
        return None;
    }
    let mut inst = Instruction::new(word, Opcode::Iot, word & 0o777, cpu_type);
    // Both fields are masked to fit.
    inst.iot_device = ((word & 0o770) >> 3) as u8;
    inst.iot_op = (word & 0o7) as u8;
    inst.operate_or_iot = true;
    Some(inst)
}

fn decode_exact(word: Word, cpu_type: CpuType) -> Option<Instruction> {
    if cpu_type != CpuType::Pds4 || word & 0o177000 != 0o101000 {
        return None;
    }
    let mut inst = Instruction::new(word, Opcode::Exact, word & 0o777, cpu_type);
    inst.operate_or_iot = true;
    Some(inst)
}

fn decode_order(word: Word, cpu_type: CpuType) -> Option<Instruction> {
    let indirect = word & 0o100000 != 0;
    let opcode = match (word & 0o074000) >> 11 {
        0o01 => {
            if indirect {
                Opcode::Lwc
            } else {
                Opcode::Law
            }
        }
        0o02 => Opcode::Jmp,
        0o03 => Opcode::Sad,
        0o04 => Opcode::Dac,
        0o05 => Opcode::Xam,
        0o06 => Opcode::Isz,
        0o07 => Opcode::Jms,
        0o10 => Opcode::Dcm,
        0o11 => Opcode::And,
        0o12 => Opcode::Ior,
        0o13 => Opcode::Xor,
        0o14 => Opcode::Lac,
        0o15 => Opcode::Add,
        0o16 => Opcode::Sub,
        0o17 => Opcode::Sam,
        _ => {
            return None;
        }
    };
    let mut inst = Instruction::new(word, opcode, word & PAGE_OFFSET_MASK, cpu_type);
    // LAW and LWC use the indirect bit to select the opcode; they
    // never perform an indirect memory reference.
    inst.indirect = indirect && !matches!(opcode, Opcode::Law | Opcode::Lwc);
    Some(inst)
}

#[cfg(test)]
fn must_decode(word: Word, cpu_type: CpuType) -> Instruction {
    match decode(word, cpu_type) {
        Ok(inst) => inst,
        Err(e) => {
            panic!("failed to decode {:>06o}: {e}", word);
        }
    }
}

#[test]
fn test_decode_law_and_lwc() {
    let law = must_decode(0o004012, CpuType::Pds1);
    assert_eq!(law.opcode(), Opcode::Law);
    assert_eq!(law.data(), 0o12);
    assert!(!law.is_indirect());

    let lwc = must_decode(0o104012, CpuType::Pds1);
    assert_eq!(lwc.opcode(), Opcode::Lwc);
    assert_eq!(lwc.data(), 0o12);
    assert!(!lwc.is_indirect());
}

#[test]
fn test_decode_indirect_memory_reference() {
    // I DAC 0100
    let inst = must_decode(0o120100, CpuType::Pds1);
    assert_eq!(inst.opcode(), Opcode::Dac);
    assert!(inst.is_indirect());
    assert!(!inst.is_operate_or_iot());
    assert_eq!(inst.data(), 0o100);
}

#[test]
fn test_decode_halt() {
    let inst = must_decode(0, CpuType::Pds1);
    assert_eq!(inst.opcode(), Opcode::Opr);
    assert_eq!(inst.data(), 0);
    assert!(inst.is_operate_or_iot());
}

#[test]
fn test_decode_iot_fields() {
    // IOT 0471: device 047, operation 1.
    let inst = must_decode(0o001471, CpuType::Pds1);
    assert_eq!(inst.opcode(), Opcode::Iot);
    assert_eq!(inst.iot_device(), 0o47);
    assert_eq!(inst.iot_op(), 1);
    assert_eq!(inst.data(), 0o471);
}

#[test]
fn test_decode_skip_negate() {
    let asz = must_decode(0o002001, CpuType::Pds1);
    assert_eq!(asz.opcode(), Opcode::Skp);
    assert!(!asz.skip_negate());
    let asn = must_decode(0o102001, CpuType::Pds1);
    assert_eq!(asn.opcode(), Opcode::Skp);
    assert!(asn.skip_negate());
    assert_eq!(asn.data(), 1);
}

#[test]
fn test_decode_shifts() {
    assert_eq!(must_decode(0o003003, CpuType::Pds1).opcode(), Opcode::Ral);
    assert_eq!(must_decode(0o003023, CpuType::Pds1).opcode(), Opcode::Rar);
    assert_eq!(must_decode(0o003043, CpuType::Pds1).opcode(), Opcode::Sal);
    assert_eq!(must_decode(0o003063, CpuType::Pds1).opcode(), Opcode::Sar);
    assert_eq!(must_decode(0o003063, CpuType::Pds1).data(), 3);
    assert!(must_decode(0o003101, CpuType::Pds1).display_on());
    assert!(!must_decode(0o003101, CpuType::Pds4).display_on());
}

#[test]
fn test_decode_pds4_act1() {
    assert_eq!(must_decode(0o003000, CpuType::Pds4).opcode(), Opcode::Swap);
    assert_eq!(must_decode(0o003000, CpuType::Pds1).opcode(), Opcode::Ral);
    assert_eq!(must_decode(0o003010, CpuType::Pds4).opcode(), Opcode::Sbl);
    assert_eq!(must_decode(0o003011, CpuType::Pds4).opcode(), Opcode::Sbr);
    assert_eq!(must_decode(0o003024, CpuType::Pds4).opcode(), Opcode::Tac);
    assert_eq!(must_decode(0o003025, CpuType::Pds4).opcode(), Opcode::Dea);
    assert_eq!(must_decode(0o003050, CpuType::Pds4).opcode(), Opcode::Popd);
    assert_eq!(must_decode(0o003051, CpuType::Pds4).opcode(), Opcode::Pushd);
    assert_eq!(must_decode(0o003052, CpuType::Pds4).opcode(), Opcode::Lamp);
    let dacs = must_decode(0o003031, CpuType::Pds4);
    assert_eq!(dacs.opcode(), Opcode::Dacs);
    assert_eq!(dacs.data(), 1);
    let lacs = must_decode(0o003032, CpuType::Pds4);
    assert_eq!(lacs.opcode(), Opcode::Lacs);
    assert_eq!(lacs.data(), 0);
}

#[test]
fn test_decode_pds4_act2() {
    let push = must_decode(0o103001, CpuType::Pds4);
    assert_eq!(push.opcode(), Opcode::Push);
    assert_eq!(push.data(), 1);
    assert!(!push.is_operate_or_iot());
    assert_eq!(must_decode(0o103002, CpuType::Pds4).opcode(), Opcode::Pusha);
    assert_eq!(must_decode(0o103004, CpuType::Pds4).opcode(), Opcode::Pop);
    assert_eq!(must_decode(0o103007, CpuType::Pds4).opcode(), Opcode::Popa);
    assert_eq!(must_decode(0o103010, CpuType::Pds4).opcode(), Opcode::Liac);
    // On the PDS-1 this is an ordinary (indirect) order instruction
    // with order code 0, which does not exist.
    assert!(decode(0o103001, CpuType::Pds1).is_err());
}

#[test]
fn test_decode_exact() {
    let inst = must_decode(0o101123, CpuType::Pds4);
    assert_eq!(inst.opcode(), Opcode::Exact);
    assert_eq!(inst.data(), 0o123);
    assert!(decode(0o101123, CpuType::Pds1).is_err());
}

#[test]
fn test_decode_failure_message() {
    let err = decode(0o000100, CpuType::Pds1).expect_err("order code 0 is not an instruction");
    assert_eq!(err.to_string(), "Unhandled instruction 000100");
}

#[cfg(test)]
#[proptest]
fn order_instructions_keep_page_offset(#[strategy(0o004000u16..=0o177777u16)] word: u16) {
    if let Ok(inst) = decode(word, CpuType::Pds1) {
        if !inst.is_operate_or_iot() {
            assert_eq!(inst.data(), word & PAGE_OFFSET_MASK);
        }
    }
}

#[cfg(test)]
#[proptest]
fn pds1_never_decodes_pds4_microcoded_ops(word: u16) {
    if let Ok(inst) = decode(word, CpuType::Pds1) {
        let op = inst.opcode();
        assert!(!op.pds4_only() || matches!(op, Opcode::Sad | Opcode::Dcm));
    }
}
