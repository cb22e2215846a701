//! The prelude exports the types which are useful in representing
//! things to do with the Imlac.  Providing this prelude is the main
//! purpose of the base crate.
pub use super::display::{
    decode_pds1, decode_pds4, disassemble_display, DisplayInstruction, DisplayMode,
    DisplayOpcode, IncrementByte, LongVector,
};
pub use super::instruction::*;
pub use super::types::*;
