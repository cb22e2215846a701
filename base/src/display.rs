//! Display processor instructions.
//!
//! The display processor shares memory with the main processor but
//! has its own instruction set, and the PDS-1 and PDS-4 instruction
//! sets differ (some encodings mean different things on each).  In
//! Processor mode each word is one instruction; in Increment mode
//! each half of a word is a short-vector "increment" byte; and on
//! the PDS-4, in Compact Addressing mode each half of a word is an
//! index into a table of display subroutines.
//!
//! This module decodes words; executing them is the business of the
//! emulator.

use std::fmt::{self, Display, Formatter};

#[cfg(test)]
use test_strategy::proptest;

use super::instruction::DecodeFailure;
use super::types::Word;

mod format;

pub use format::disassemble_display;

/// How the display processor is interpreting memory.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum DisplayMode {
    /// Not known; used to request disassembly according to the way
    /// the word was last executed.
    #[default]
    Indeterminate,
    Processor,
    Increment,
    MediumVector,
    CompactAddressing,
}

impl Display for DisplayMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        f.write_str(match self {
            DisplayMode::Indeterminate => "Indeterminate",
            DisplayMode::Processor => "Processor",
            DisplayMode::Increment => "Increment",
            DisplayMode::MediumVector => "MediumVector",
            DisplayMode::CompactAddressing => "CompactAddressing",
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DisplayOpcode {
    /// Load X accumulator.
    Dlxa,
    /// Load Y accumulator.
    Dlya,
    /// Enter increment mode.
    Deim,
    /// Jump to subroutine.
    Djms,
    /// Jump.
    Djmp,
    /// Microcoded operate instruction (halt, MSB steps, return,
    /// intensify, scale, block, ...).
    Dopr,
    /// Long vector.
    Dlvh,

    // Optional PDS-1 extensions.
    Sgr1,
    Asg1,
    Vic1,
    Mci1,
    Sti1,

    // PDS-4 only.
    Dmvm,
    Dcam,
    Dbli,
    Dfxy,
    Dvic,
    Dasg,
    Dror,
    Darx,
    Dary,
}

impl Display for DisplayOpcode {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        use DisplayOpcode::*;
        f.write_str(match self {
            Dlxa => "DLXA",
            Dlya => "DLYA",
            Deim => "DEIM",
            Djms => "DJMS",
            Djmp => "DJMP",
            Dopr => "DOPR",
            Dlvh => "DLVH",
            Sgr1 => "SGR1",
            Asg1 => "ASG1",
            Vic1 => "VIC1",
            Mci1 => "MCI1",
            Sti1 => "STI1",
            Dmvm => "DMVM",
            Dcam => "DCAM",
            Dbli => "DBLI",
            Dfxy => "DFXY",
            Dvic => "DVIC",
            Dasg => "DASG",
            Dror => "DROR",
            Darx => "DARX",
            Dary => "DARY",
        })
    }
}

/// A display instruction decoded in Processor mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DisplayInstruction {
    pub word: Word,
    pub opcode: DisplayOpcode,
    pub data: Word,
}

impl DisplayInstruction {
    fn new(word: Word, opcode: DisplayOpcode, data: Word) -> DisplayInstruction {
        DisplayInstruction { word, opcode, data }
    }
}

/// DJMP and DJMS carry a 12-bit address.  The MIT modification
/// takes a 13th address bit from the top bit of the word.
fn jump_target(word: Word, mit_mode: bool) -> Word {
    let mut target = word & 0o7777;
    if mit_mode && word & 0o100000 != 0 {
        target |= 0o10000;
    }
    target
}

/// Decodes a Processor-mode word for the PDS-1 display processor.
pub fn decode_pds1(word: Word, mit_mode: bool) -> Result<DisplayInstruction, DecodeFailure> {
    use DisplayOpcode::*;
    let inst = match (word & 0o70000) >> 12 {
        0 => DisplayInstruction::new(word, Dopr, word & 0o7777),
        1 => DisplayInstruction::new(word, Dlxa, word & 0o1777),
        2 => DisplayInstruction::new(word, Dlya, word & 0o1777),
        3 => DisplayInstruction::new(word, Deim, word & 0o377),
        4 => DisplayInstruction::new(word, Dlvh, word & 0o7777),
        5 => DisplayInstruction::new(word, Djms, jump_target(word, mit_mode)),
        6 => DisplayInstruction::new(word, Djmp, jump_target(word, mit_mode)),
        _ => {
            let opcode = match (word & 0o770) >> 3 {
                0o66 | 0o67 => Asg1,
                0o72 | 0o73 => Vic1,
                0o74 | 0o75 => Mci1,
                0o76 => Sti1,
                0o77 => Sgr1,
                _ => {
                    return Err(DecodeFailure { word });
                }
            };
            DisplayInstruction::new(word, opcode, word & 0o7)
        }
    };
    Ok(inst)
}

/// Decodes a Processor-mode word for the PDS-4 display processor.
pub fn decode_pds4(word: Word, mit_mode: bool) -> Result<DisplayInstruction, DecodeFailure> {
    use DisplayOpcode::*;
    // The MIT modification uses two extra bits of DLXA/DLYA for the
    // scissor.
    let position_mask = if mit_mode { 0o17777 } else { 0o3777 };
    let inst = match (word & 0o70000) >> 12 {
        0 => DisplayInstruction::new(word, Dopr, word & 0o7777),
        1 => DisplayInstruction::new(word, Dlxa, word & position_mask),
        2 => DisplayInstruction::new(word, Dlya, word & position_mask),
        3 => DisplayInstruction::new(word, Deim, word & 0o377),
        4 => {
            if word & 0o4000 == 0 {
                // The low 11 bits are the sign and the magnitude of
                // the larger deflection.
                DisplayInstruction::new(word, Dlvh, word & 0o3777)
            } else {
                DisplayInstruction::new(word, Dmvm, word & 0o377)
            }
        }
        5 => DisplayInstruction::new(word, Djms, jump_target(word, mit_mode)),
        6 => DisplayInstruction::new(word, Djmp, jump_target(word, mit_mode)),
        _ => decode_pds4_extended(word)?,
    };
    Ok(inst)
}

/// The PDS-4 extended instructions (prefix 07) have no regular
/// structure, so we test the most specific encodings first.
fn decode_pds4_extended(word: Word) -> Result<DisplayInstruction, DecodeFailure> {
    use DisplayOpcode::*;
    let w = word & 0o77777;
    let (opcode, data) = if w == 0o77621 {
        (Dcam, 0)
    } else if w & 0o77776 == 0o77622 {
        (Dbli, word & 0o1)
    } else if w & 0o77770 == 0o77770 {
        (Dfxy, word & 0o7)
    } else if w & 0o77760 == 0o77720 {
        (Dvic, word & 0o17)
    } else if w & 0o77760 == 0o77760 {
        (Dasg, word & 0o17)
    } else if w & 0o77760 == 0o77640 {
        (Dror, word & 0o17)
    } else if w & 0o77000 == 0o76000 {
        if word & 0o400 == 0 {
            (Darx, word & 0o377)
        } else {
            (Dary, word & 0o377)
        }
    } else {
        return Err(DecodeFailure { word });
    };
    Ok(DisplayInstruction::new(word, opcode, data))
}

/// One half of an Increment-mode word.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IncrementByte {
    /// A control byte: MSB steps and LSB resets of the X and Y
    /// accumulators, and possibly an escape back to Processor mode.
    Control {
        escape: bool,
        /// Only meaningful together with `escape`.
        return_jump: bool,
        increment_x_msb: bool,
        reset_x_lsb: bool,
        increment_y_msb: bool,
        reset_y_lsb: bool,
    },
    /// A short vector: 2-bit magnitudes with separate signs.
    Draw {
        beam_on: bool,
        x_negative: bool,
        x_magnitude: u8,
        y_negative: bool,
        y_magnitude: u8,
    },
}

impl From<u8> for IncrementByte {
    fn from(b: u8) -> IncrementByte {
        if b & 0o200 == 0 {
            IncrementByte::Control {
                escape: b & 0o100 != 0,
                return_jump: b & 0o40 != 0,
                increment_x_msb: b & 0o20 != 0,
                reset_x_lsb: b & 0o10 != 0,
                increment_y_msb: b & 0o2 != 0,
                reset_y_lsb: b & 0o1 != 0,
            }
        } else {
            IncrementByte::Draw {
                beam_on: b & 0o100 != 0,
                x_negative: b & 0o40 != 0,
                x_magnitude: (b & 0o30) >> 3,
                y_negative: b & 0o4 != 0,
                y_magnitude: b & 0o3,
            }
        }
    }
}

/// The fields of a long vector instruction.  The deflections are in
/// the units the instruction specifies; the display processor
/// applies its own scaling.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LongVector {
    pub dx: i32,
    pub dy: i32,
    pub beam_on: bool,
    pub dotted: bool,
    pub dashed: bool,
    pub return_jump: bool,
}

impl LongVector {
    /// Decodes the two words which follow a PDS-1 DLVH instruction.
    ///
    /// Word 1: bit 1 dotted, bit 2 beam on, low 10 bits M (the
    /// larger deflection).  Word 2: bit 1 X negative, bit 2 Y
    /// negative, bit 3 "M is Y", low 10 bits N (the smaller
    /// deflection).
    #[must_use]
    pub fn pds1(word1: Word, word2: Word) -> LongVector {
        let m = i32::from(word1 & 0o1777);
        let n = i32::from(word2 & 0o1777);
        let dy_greater = word2 & 0o10000 != 0;
        let (dx, dy) = if dy_greater { (n, m) } else { (m, n) };
        let dx_sign = if word2 & 0o40000 != 0 { -1 } else { 1 };
        let dy_sign = if word2 & 0o20000 != 0 { -1 } else { 1 };
        LongVector {
            dx: dx * dx_sign,
            dy: dy * dy_sign,
            beam_on: word1 & 0o20000 != 0,
            dotted: word1 & 0o40000 != 0,
            dashed: false,
            return_jump: false,
        }
    }

    /// Decodes a PDS-4 DLVH instruction (`word0`) and the word
    /// which follows it.
    ///
    /// Word 0 holds the sign of M in bit 5 and M in the low 10 bits;
    /// word 1 holds return, dotted, dashed, beam-on, "M is Y" and
    /// the sign of N in bits 0-5 and N in the low 10 bits.  The
    /// magnitudes address bit 1 of the X/Y accumulators, hence the
    /// doubling.
    #[must_use]
    pub fn pds4(word0: Word, word1: Word) -> LongVector {
        let m = i32::from(word0 & 0o1777) << 1;
        let n = i32::from(word1 & 0o1777) << 1;
        let m_sign = if word0 & 0o2000 != 0 { -1 } else { 1 };
        let n_sign = if word1 & 0o2000 != 0 { -1 } else { 1 };
        let dy_greater = word1 & 0o4000 != 0;
        let (dx, dy) = if dy_greater {
            (n * n_sign, m * m_sign)
        } else {
            (m * m_sign, n * n_sign)
        };
        LongVector {
            dx,
            dy,
            beam_on: word1 & 0o10000 != 0,
            dotted: word1 & 0o40000 != 0,
            dashed: word1 & 0o20000 != 0,
            return_jump: word1 & 0o100000 != 0,
        }
    }
}

#[test]
fn test_pds1_decode_basic() {
    let i = decode_pds1(0o010123, false).expect("DLXA should decode");
    assert_eq!(i.opcode, DisplayOpcode::Dlxa);
    assert_eq!(i.data, 0o123);
    let i = decode_pds1(0o030377, false).expect("DEIM should decode");
    assert_eq!(i.opcode, DisplayOpcode::Deim);
    assert_eq!(i.data, 0o377);
    let i = decode_pds1(0o077770, false).expect("SGR1 should decode");
    assert_eq!(i.opcode, DisplayOpcode::Sgr1);
    assert_eq!(i.data, 0);
    assert!(decode_pds1(0o070000, false).is_err());
}

#[test]
fn test_mit_jump_extension() {
    assert_eq!(decode_pds1(0o164321, false).map(|i| i.data), Ok(0o4321));
    assert_eq!(decode_pds1(0o164321, true).map(|i| i.data), Ok(0o14321));
    assert_eq!(decode_pds4(0o154321, true).map(|i| i.opcode), Ok(DisplayOpcode::Djms));
}

#[test]
fn test_pds4_extended_decode() {
    let op = |w| decode_pds4(w, false).map(|i| i.opcode);
    assert_eq!(op(0o077621), Ok(DisplayOpcode::Dcam));
    assert_eq!(op(0o077623), Ok(DisplayOpcode::Dbli));
    assert_eq!(op(0o077775), Ok(DisplayOpcode::Dfxy));
    assert_eq!(op(0o077727), Ok(DisplayOpcode::Dvic));
    assert_eq!(op(0o077764), Ok(DisplayOpcode::Dasg));
    assert_eq!(op(0o077645), Ok(DisplayOpcode::Dror));
    assert_eq!(op(0o076012), Ok(DisplayOpcode::Darx));
    assert_eq!(op(0o076412), Ok(DisplayOpcode::Dary));
    assert_eq!(op(0o044000), Ok(DisplayOpcode::Dmvm));
    assert_eq!(op(0o040000), Ok(DisplayOpcode::Dlvh));
    assert!(op(0o070000).is_err());
}

#[test]
fn test_increment_bytes() {
    assert_eq!(
        IncrementByte::from(0o311),
        IncrementByte::Draw {
            beam_on: true,
            x_negative: false,
            x_magnitude: 1,
            y_negative: false,
            y_magnitude: 1,
        }
    );
    match IncrementByte::from(0o140) {
        IncrementByte::Control {
            escape, return_jump, ..
        } => {
            assert!(escape);
            assert!(return_jump);
        }
        other => panic!("expected a control byte, got {other:?}"),
    }
}

#[test]
fn test_long_vector_pds1() {
    // M=0o100 (beam on), N=0o40, X negative, M is X.
    let v = LongVector::pds1(0o020100, 0o040040);
    assert_eq!(v.dx, -0o100);
    assert_eq!(v.dy, 0o40);
    assert!(v.beam_on);
    assert!(!v.dotted);
}

#[test]
fn test_long_vector_pds4() {
    // M=0o10 (sign negative), N=3, M is Y, beam on, return.
    let v = LongVector::pds4(0o042010, 0o114003);
    assert_eq!(v.dy, -0o20);
    assert_eq!(v.dx, 6);
    assert!(v.beam_on);
    assert!(v.return_jump);
    assert!(!v.dashed);
}

#[cfg(test)]
#[proptest]
fn increment_draw_magnitudes_are_two_bits(b: u8) {
    if let IncrementByte::Draw {
        x_magnitude,
        y_magnitude,
        ..
    } = IncrementByte::from(b)
    {
        assert!(x_magnitude <= 3);
        assert!(y_magnitude <= 3);
        assert!(b & 0o200 != 0);
    }
}

#[cfg(test)]
#[proptest]
fn pds4_long_vector_deflections_are_even(w0: u16, w1: u16) {
    let v = LongVector::pds4(w0, w1);
    assert_eq!(v.dx % 2, 0);
    assert_eq!(v.dy % 2, 0);
    assert!(v.dx.abs() <= 2046 && v.dy.abs() <= 2046);
}
