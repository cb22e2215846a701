//! The `base` crate defines the Imlac-related things which are useful
//! in both an emulator and other associated tools (for example a
//! disassembler or a loader for paper-tape images).  Such tools would
//! depend on the base crate but would not need to depend on the
//! emulator library itself.

mod types;

pub mod display;
pub mod instruction;
pub mod prelude;
