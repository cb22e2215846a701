//! Disassembly of display processor code.
use crate::display::{decode_pds1, decode_pds4, DisplayMode, DisplayOpcode, IncrementByte, LongVector};
use crate::types::{half_word, CpuType, Octal, Word};

/// Text for one increment byte.  Control bytes list their
/// micro-operations; draw bytes show the signed X and Y steps, with a
/// leading `B` when the beam is on.
fn increment_byte_text(b: u8) -> String {
    match IncrementByte::from(b) {
        IncrementByte::Control {
            escape,
            return_jump,
            increment_x_msb,
            reset_x_lsb,
            increment_y_msb,
            reset_y_lsb,
        } => {
            let mut parts: Vec<&str> = Vec::new();
            if escape {
                parts.push(if return_jump { "ESC+RJM" } else { "ESC" });
            }
            if increment_x_msb {
                parts.push("IXM");
            }
            if reset_x_lsb {
                parts.push("RXL");
            }
            if increment_y_msb {
                parts.push("IYM");
            }
            if reset_y_lsb {
                parts.push("RYL");
            }
            if parts.is_empty() {
                "NOP".to_string()
            } else {
                parts.join("+")
            }
        }
        IncrementByte::Draw {
            beam_on,
            x_negative,
            x_magnitude,
            y_negative,
            y_magnitude,
        } => format!(
            "{}{}{},{}{}",
            if beam_on { "B" } else { "" },
            if x_negative { '-' } else { '+' },
            x_magnitude,
            if y_negative { '-' } else { '+' },
            y_magnitude
        ),
    }
}

fn increment_word_text(word: Word) -> String {
    format!(
        "INC {}|{}",
        increment_byte_text(half_word(word, true)),
        increment_byte_text(half_word(word, false))
    )
}

fn compact_half_text(b: u8) -> String {
    if b == 0o377 {
        "END".to_string()
    } else {
        format!("{b:03o}")
    }
}

fn compact_word_text(word: Word) -> String {
    format!(
        "CAM {} {}",
        compact_half_text(half_word(word, true)),
        compact_half_text(half_word(word, false))
    )
}

/// The micro-operations of a DOPR instruction.
fn dopr_text(cpu: CpuType, mit_mode: bool, data: Word) -> String {
    let mut parts: Vec<String> = Vec::new();
    if data & 0o4000 == 0 {
        parts.push("DHLT".to_string());
    }
    let pds4_bit5 = cpu == CpuType::Pds4 && data & 0o2000 != 0;
    if cpu == CpuType::Pds1 && data & 0o2000 != 0 {
        parts.push("DHVC".to_string());
    }
    for (bit, name) in [
        (0o1000, "DIXM"),
        (0o400, "DIYM"),
        (0o200, "DDXM"),
        (0o100, "DDYM"),
        (0o40, "DRJM"),
        (0o20, "DDSP"),
    ] {
        if data & bit != 0 {
            parts.push(name.to_string());
        }
    }
    let c = data & 0o3;
    let extra = if pds4_bit5 { 4 } else { 0 };
    match (data & 0o14) >> 2 {
        0 => {
            if mit_mode && c == 1 {
                parts.push("DADR".to_string());
            }
        }
        1 => parts.push(format!("DSTS {}", c + extra)),
        2 => parts.push(format!("DSTB {}", c + extra)),
        _ => parts.push("DLPN".to_string()),
    }
    if parts.is_empty() {
        "DNOP".to_string()
    } else {
        parts.join(",")
    }
}

fn long_vector_text(cpu: CpuType, v: &LongVector) -> String {
    let mut text = format!(
        "DLVH ({},{}) {}",
        v.dx,
        v.dy,
        if v.beam_on { "ON" } else { "OFF" }
    );
    if v.dotted {
        text.push_str(" DOTTED");
    }
    if cpu == CpuType::Pds4 {
        if v.dashed {
            text.push_str(" DASHED");
        }
        if v.return_jump {
            text.push_str(" RET");
        }
    }
    text
}

/// Disassembles display code.
///
/// `words[0]` is the word at the address being disassembled and the
/// remaining elements are the words that follow it (long vectors
/// occupy more than one word).  `mode` must not be
/// [`DisplayMode::Indeterminate`]; callers resolve that from the way
/// the word was last used.
///
/// Returns the text and the number of words consumed.
#[must_use]
pub fn disassemble_display(
    cpu: CpuType,
    mit_mode: bool,
    mode: DisplayMode,
    words: [Word; 3],
) -> (String, usize) {
    let word = words[0];
    match mode {
        DisplayMode::Indeterminate => ("Indeterminate".to_string(), 1),
        DisplayMode::Increment => (increment_word_text(word), 1),
        DisplayMode::CompactAddressing => (compact_word_text(word), 1),
        DisplayMode::MediumVector => (format!("DMVM {}", Octal(word)), 1),
        DisplayMode::Processor => {
            let decoded = match cpu {
                CpuType::Pds1 => decode_pds1(word, mit_mode),
                CpuType::Pds4 => decode_pds4(word, mit_mode),
            };
            let inst = match decoded {
                Ok(inst) => inst,
                Err(_) => {
                    return (format!("Invalid display instruction {}", Octal(word)), 1);
                }
            };
            match inst.opcode {
                DisplayOpcode::Dopr => (dopr_text(cpu, mit_mode, inst.data), 1),
                DisplayOpcode::Deim => (
                    format!("DEIM {}", increment_byte_text(half_word(word, false))),
                    1,
                ),
                DisplayOpcode::Dlvh => match cpu {
                    CpuType::Pds1 => (
                        long_vector_text(cpu, &LongVector::pds1(words[1], words[2])),
                        3,
                    ),
                    CpuType::Pds4 => (
                        long_vector_text(cpu, &LongVector::pds4(words[0], words[1])),
                        2,
                    ),
                },
                // DCAM is followed by the base address of the
                // subroutine table.
                DisplayOpcode::Dcam => (format!("DCAM {}", Octal(words[1])), 2),
                op => (format!("{op} {}", Octal(inst.data)), 1),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dis(cpu: CpuType, mode: DisplayMode, words: [Word; 3]) -> (String, usize) {
        disassemble_display(cpu, false, mode, words)
    }

    #[test]
    fn test_processor_mode() {
        assert_eq!(
            dis(CpuType::Pds1, DisplayMode::Processor, [0o010100, 0, 0]),
            ("DLXA 000100".to_string(), 1)
        );
        assert_eq!(
            dis(CpuType::Pds1, DisplayMode::Processor, [0o000000, 0, 0]),
            ("DHLT".to_string(), 1)
        );
        assert_eq!(
            dis(CpuType::Pds1, DisplayMode::Processor, [0o004000, 0, 0]),
            ("DNOP".to_string(), 1)
        );
        assert_eq!(
            dis(CpuType::Pds1, DisplayMode::Processor, [0o004046, 0, 0]),
            ("DRJM,DSTS 2".to_string(), 1)
        );
        assert_eq!(
            dis(CpuType::Pds4, DisplayMode::Processor, [0o006005, 0, 0]),
            ("DSTS 5".to_string(), 1)
        );
    }

    #[test]
    fn test_long_vectors() {
        assert_eq!(
            dis(CpuType::Pds1, DisplayMode::Processor, [0o040000, 0o020010, 0o040004]),
            ("DLVH (-8,4) ON".to_string(), 3)
        );
        assert_eq!(
            dis(CpuType::Pds4, DisplayMode::Processor, [0o040002, 0o110001, 0]),
            ("DLVH (4,2) ON RET".to_string(), 2)
        );
    }

    #[test]
    fn test_increment_mode() {
        assert_eq!(
            dis(CpuType::Pds1, DisplayMode::Increment, [(0o311 << 8) | 0o140, 0, 0]),
            ("INC B+1,+1|ESC+RJM".to_string(), 1)
        );
        assert_eq!(
            dis(CpuType::Pds1, DisplayMode::Increment, [0o000222, 0, 0]),
            ("INC NOP|+2,+2".to_string(), 1)
        );
    }

    #[test]
    fn test_compact_mode() {
        assert_eq!(
            dis(CpuType::Pds4, DisplayMode::CompactAddressing, [0o001777, 0, 0]),
            ("CAM 003 END".to_string(), 1)
        );
    }

    #[test]
    fn test_invalid() {
        let (text, len) = dis(CpuType::Pds1, DisplayMode::Processor, [0o070000, 0, 0]);
        assert_eq!(len, 1);
        assert!(text.starts_with("Invalid"));
    }
}
