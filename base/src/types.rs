//! The Imlac uses 16-bit words for memory, registers and
//! instructions.  A `u16` holds a word exactly and all arithmetic
//! the machine performs is two's complement with wrap-around.
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[cfg(test)]
use test_strategy::Arbitrary;

/// A memory word (or register value).
pub type Word = u16;

/// The page-offset part of a memory reference instruction.  Each
/// page is 2K words long.
pub const PAGE_OFFSET_MASK: Word = 0o3777;

/// The top bit of a word; for indirect addresses on the PDS-4 it
/// signals that another level of indirection follows.
pub const INDIRECT_CHAIN_BIT: Word = 0o100000;

/// Which model of the Imlac is being emulated.  The PDS-4 extends
/// the PDS-1 instruction set (in both the main and display
/// processors) but some encodings conflict, so the decoders need to
/// know.
#[cfg_attr(test, derive(Arbitrary))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CpuType {
    #[default]
    Pds1,
    Pds4,
}

impl Display for CpuType {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        f.write_str(match self {
            CpuType::Pds1 => "PDS-1",
            CpuType::Pds4 => "PDS-4",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCpuType(pub String);

impl Display for UnknownCpuType {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "unknown CPU type '{}' (expected PDS-1 or PDS-4)", self.0)
    }
}

impl std::error::Error for UnknownCpuType {}

impl FromStr for CpuType {
    type Err = UnknownCpuType;

    fn from_str(s: &str) -> Result<CpuType, UnknownCpuType> {
        match s.to_ascii_lowercase().as_str() {
            "pds1" | "pds-1" => Ok(CpuType::Pds1),
            "pds4" | "pds-4" => Ok(CpuType::Pds4),
            _ => Err(UnknownCpuType(s.to_string())),
        }
    }
}

/// Formats a word as six octal digits, the way the Imlac
/// documentation (and its front panel) present values.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Octal(pub Word);

impl Display for Octal {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "{:>06o}", self.0)
    }
}

/// Returns the two bytes of `w`, most significant first.
#[must_use]
pub fn split_bytes(w: Word) -> (u8, u8) {
    let [hi, lo] = w.to_be_bytes();
    (hi, lo)
}

/// Returns the byte selected by `half` (true selects the left,
/// i.e. most significant, half).
#[must_use]
pub fn half_word(w: Word, left: bool) -> u8 {
    let (hi, lo) = split_bytes(w);
    if left {
        hi
    } else {
        lo
    }
}

#[test]
fn test_octal_format() {
    assert_eq!(Octal(0).to_string(), "000000");
    assert_eq!(Octal(0o40).to_string(), "000040");
    assert_eq!(Octal(0xffff).to_string(), "177777");
}

#[test]
fn test_cpu_type_parse() {
    assert_eq!("pds1".parse::<CpuType>(), Ok(CpuType::Pds1));
    assert_eq!("PDS-4".parse::<CpuType>(), Ok(CpuType::Pds4));
    assert!("pdp-1".parse::<CpuType>().is_err());
}

#[cfg(test)]
mod proptests {
    use super::*;
    use test_strategy::proptest;

    #[proptest]
    fn cpu_type_display_parses_back(cpu: CpuType) {
        assert_eq!(cpu.to_string().parse::<CpuType>(), Ok(cpu));
    }

    #[proptest]
    fn half_words_recombine(w: u16) {
        let word = u16::from(half_word(w, true)) << 8 | u16::from(half_word(w, false));
        assert_eq!(word, w);
    }
}
