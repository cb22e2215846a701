//! This crate emulates the Imlac PDS-1 and PDS-4: the main
//! processor, the display processor, the I/O devices and the
//! interrupt facility, tied together by [`Imlac`].
#![crate_name = "cpu"]

mod breakpoints;
mod config;
pub mod console;
mod context;
mod display;
mod error;
mod imlac;
pub mod io;
mod memory;
mod processor;
mod types;

pub use breakpoints::{BreakpointEntry, BreakpointKinds, BreakpointManager};
pub use config::{Configuration, SUPPORTED_MEMORY_SIZES};
pub use console::{Console, DrawOp, DrawingMode, HeadlessConsole, InputHandle};
pub use context::{Bus, DisplayBus};
pub use display::{
    DisplayProcessor, Pds1Display, Pds4Display, PDS1_FRAME_PERIOD, PDS4_FRAME_PERIOD, STACK_DEPTH,
};
pub use error::{
    ChannelError, ConfigurationError, ExecutionError, FailedUnit, ImageError, MemorySizeError,
    Unimplemented,
};
pub use imlac::{DisassemblyMode, ExecutionState, Imlac, StopReason, BOOTSTRAP_LENGTH};
pub use memory::MemoryUnit;
pub use processor::{Processor, Registers, BOOTSTRAP_ADDRESS};
pub use types::*;
