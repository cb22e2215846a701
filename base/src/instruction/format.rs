//! Human-oriented formatting (disassembly) of main processor
//! instructions.
use std::fmt::{self, Display, Formatter};

use crate::instruction::{Instruction, Opcode};
use crate::types::{CpuType, Octal, Word};

impl Display for Opcode {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        use Opcode::*;
        f.write_str(match self {
            Law => "LAW",
            Lwc => "LWC",
            Jmp => "JMP",
            Sad => "SAD",
            Dac => "DAC",
            Xam => "XAM",
            Isz => "ISZ",
            Jms => "JMS",
            Dcm => "DCM",
            And => "AND",
            Ior => "IOR",
            Xor => "XOR",
            Lac => "LAC",
            Add => "ADD",
            Sub => "SUB",
            Sam => "SAM",
            Opr => "OPR",
            Iot => "IOT",
            Ral => "RAL",
            Rar => "RAR",
            Sal => "SAL",
            Sar => "SAR",
            Skp => "SKP",
            Swap => "SWAP",
            Rdpc => "RDPC",
            Rdax => "RDAX",
            Rday => "RDAY",
            Sbl => "SBL",
            Sbr => "SBR",
            Tac => "TAC",
            Dea => "DEA",
            Popd => "POPD",
            Pushd => "PUSHD",
            Lamp => "LAMP",
            Dacs => "DACS",
            Lacs => "LACS",
            Push => "PUSH",
            Pusha => "PUSHA",
            Pop => "POP",
            Popa => "POPA",
            Liac => "LIAC",
            Exact => "EXACT",
        })
    }
}

/// Mnemonics for the lower (AC) and upper (Link) groups of OPR
/// micro-operations, indexed by the 3-bit group value.
const OPR_LOWER: [&str; 8] = [
    "NOP",
    "CLA",
    "CMA",
    "STA",
    "IAC",
    "COA",
    "CIA",
    "CMA, IAC",
];
const OPR_UPPER: [&str; 8] = [
    "",
    "CLL",
    "CML",
    "STL",
    "ODA",
    "CLL, CML",
    "CML, ODA",
    "CLL, CML",
];

/// Skip condition mnemonics, from the least significant bit up.
const SKIP_CODES: [&str; 9] = ["ASZ", "ASP", "LSZ", "DSF", "KSF", "RSF", "TSF", "SSF", "HSF"];
const SKIP_NOT_CODES: [&str; 9] = ["ASN", "ASM", "LSN", "DSN", "KSN", "RSN", "TSN", "SSN", "HSN"];

fn iot_name(code: Word, cpu_type: CpuType) -> String {
    let name = match code {
        0o002 => match cpu_type {
            CpuType::Pds4 => "DON",
            // Not valid on the PDS-1 but worth pointing out.
            CpuType::Pds1 => "DON (PDS-4)",
        },
        0o003 => "DLA",
        0o011 => "CTB",
        0o012 => "DOF",
        0o021 => "KRB",
        0o022 => "KCF",
        0o023 => "KRC",
        0o031 => "RRB",
        0o032 => "RCF",
        0o033 => "RRC",
        0o041 => "TPR",
        0o042 => "TCF",
        0o043 => "TPC",
        0o051 => "HRB",
        0o052 => "HOF",
        0o061 => "HON",
        0o062 => "STB",
        0o071 => "SCF",
        0o072 => "IOS",
        0o271 => "PPC",
        0o274 => "PSF",
        0o161 => "IOF",
        0o162 => "ION",
        _ => {
            return format!("IOT {}", Octal(code));
        }
    };
    name.to_string()
}

fn opr_text(data: Word) -> String {
    let mut text = match data & 0o77 {
        0o11 => "CAL".to_string(),
        0o41 => "LDA".to_string(),
        bits => {
            let low = usize::from(bits & 0o7);
            let high = usize::from((bits & 0o70) >> 3);
            match (low, high) {
                (0, 0) => String::new(),
                (0, h) => OPR_UPPER[h].to_string(),
                (l, 0) => OPR_LOWER[l].to_string(),
                (l, h) => format!("{},{}", OPR_LOWER[l], OPR_UPPER[h]),
            }
        }
    };
    if data & 0o100000 == 0 {
        if text.is_empty() {
            text.push_str("HLT");
        } else {
            text.push_str(", HLT");
        }
    }
    if text.is_empty() {
        // No micro-operations at all and no halt.
        text.push_str("NOP");
    }
    text
}

fn skip_text(data: Word, negate: bool) -> String {
    let codes = if negate { &SKIP_NOT_CODES } else { &SKIP_CODES };
    let names: Vec<&str> = codes
        .iter()
        .enumerate()
        .filter(|(bit, _)| data & (1 << bit) != 0)
        .map(|(_, name)| *name)
        .collect();
    if names.is_empty() {
        "SKP".to_string()
    } else {
        names.join(",")
    }
}

impl Instruction {
    /// Produces the assembler-style text of this instruction,
    /// assuming that it resides at `address` (which determines the
    /// page of any memory reference).
    #[must_use]
    pub fn disassemble(&self, address: Word) -> String {
        let prefix = if self.is_indirect() { "I " } else { "" };
        let effective = Octal((address & 0o174000) | self.data());
        let don = if self.display_on() { "DON" } else { "" };
        let body = match self.opcode() {
            op @ (Opcode::Jmp
            | Opcode::Sad
            | Opcode::Dac
            | Opcode::Xam
            | Opcode::Isz
            | Opcode::Jms
            | Opcode::Dcm
            | Opcode::And
            | Opcode::Ior
            | Opcode::Xor
            | Opcode::Lac
            | Opcode::Add
            | Opcode::Sub
            | Opcode::Sam) => format!("{op} {effective}"),
            Opcode::Law => format!("LAW {}", Octal(self.data())),
            Opcode::Lwc => format!(
                "LWC {} !({})",
                Octal(self.data()),
                Octal(self.data().wrapping_neg())
            ),
            Opcode::Exact => format!("EXACT {}", Octal(self.data())),
            op @ (Opcode::Dacs
            | Opcode::Lacs
            | Opcode::Push
            | Opcode::Pusha
            | Opcode::Pop
            | Opcode::Popa) => format!("{op} {}", self.data()),
            op @ (Opcode::Ral | Opcode::Rar | Opcode::Sal | Opcode::Sar) => {
                format!("{op} {},{don}", self.data())
            }
            Opcode::Opr => opr_text(self.data()),
            Opcode::Skp => skip_text(self.data(), self.skip_negate()),
            Opcode::Iot => iot_name(self.data(), self.cpu_type()),
            op => op.to_string(),
        };
        format!("{prefix}{body}")
    }
}

#[cfg(test)]
mod tests {
    use crate::instruction::decode;
    use crate::types::CpuType;

    fn dis(word: u16, address: u16, cpu_type: CpuType) -> String {
        match decode(word, cpu_type) {
            Ok(inst) => inst.disassemble(address),
            Err(e) => panic!("test data should decode: {e}"),
        }
    }

    #[test]
    fn test_memory_reference() {
        assert_eq!(dis(0o020100, 0o40, CpuType::Pds1), "DAC 000100");
        assert_eq!(dis(0o120100, 0o40, CpuType::Pds1), "I DAC 000100");
        // The page comes from the instruction's own address.
        assert_eq!(dis(0o010005, 0o4040, CpuType::Pds1), "JMP 004005");
    }

    #[test]
    fn test_immediates() {
        assert_eq!(dis(0o004017, 0, CpuType::Pds1), "LAW 000017");
        assert_eq!(dis(0o104001, 0, CpuType::Pds1), "LWC 000001 !(177777)");
    }

    #[test]
    fn test_operate() {
        assert_eq!(dis(0o000000, 0, CpuType::Pds1), "HLT");
        assert_eq!(dis(0o100000, 0, CpuType::Pds1), "NOP");
        assert_eq!(dis(0o100001, 0, CpuType::Pds1), "CLA");
        assert_eq!(dis(0o100011, 0, CpuType::Pds1), "CAL");
        assert_eq!(dis(0o100041, 0, CpuType::Pds1), "LDA");
        assert_eq!(dis(0o100004, 0, CpuType::Pds1), "IAC");
        assert_eq!(dis(0o100024, 0, CpuType::Pds1), "IAC,CML");
        assert_eq!(dis(0o000002, 0, CpuType::Pds1), "CMA, HLT");
    }

    #[test]
    fn test_skips() {
        assert_eq!(dis(0o002001, 0, CpuType::Pds1), "ASZ");
        assert_eq!(dis(0o102001, 0, CpuType::Pds1), "ASN");
        assert_eq!(dis(0o002005, 0, CpuType::Pds1), "ASZ,LSZ");
        assert_eq!(dis(0o002400, 0, CpuType::Pds1), "HSF");
        assert_eq!(dis(0o002000, 0, CpuType::Pds1), "SKP");
    }

    #[test]
    fn test_shifts() {
        assert_eq!(dis(0o003001, 0, CpuType::Pds1), "RAL 1,");
        assert_eq!(dis(0o003103, 0, CpuType::Pds1), "RAL 3,DON");
        assert_eq!(dis(0o003062, 0, CpuType::Pds1), "SAR 2,");
    }

    #[test]
    fn test_iots() {
        assert_eq!(dis(0o001003, 0, CpuType::Pds1), "DLA");
        assert_eq!(dis(0o001002, 0, CpuType::Pds1), "DON (PDS-4)");
        assert_eq!(dis(0o001002, 0, CpuType::Pds4), "DON");
        assert_eq!(dis(0o001162, 0, CpuType::Pds1), "ION");
        assert_eq!(dis(0o001077, 0, CpuType::Pds1), "IOT 000077");
    }

    #[test]
    fn test_pds4_extensions() {
        assert_eq!(dis(0o003031, 0, CpuType::Pds4), "DACS 1");
        assert_eq!(dis(0o103004, 0, CpuType::Pds4), "POP 0");
        assert_eq!(dis(0o003000, 0, CpuType::Pds4), "SWAP");
        assert_eq!(dis(0o003050, 0, CpuType::Pds4), "POPD");
        assert_eq!(dis(0o101017, 0, CpuType::Pds4), "EXACT 000017");
    }
}
