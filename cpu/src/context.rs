//! The parts of the machine a processor works with during a cycle.
//!
//! The [`crate::Imlac`] system owns every component.  To run a
//! cycle of one processor it lends that processor the others, split
//! into disjoint borrows, through one of these structs.  No
//! component holds a reference to another between cycles.
use crate::breakpoints::BreakpointManager;
use crate::config::Configuration;
use crate::console::Console;
use crate::display::DisplayProcessor;
use crate::io::Devices;
use crate::memory::MemoryUnit;

/// What the main processor needs.
pub struct Bus<'a> {
    pub config: &'a Configuration,
    pub mem: &'a mut MemoryUnit,
    pub display: &'a mut DisplayProcessor,
    pub devices: &'a mut Devices,
    pub breakpoints: &'a BreakpointManager,
    pub console: &'a mut dyn Console,
}

/// What the display processor needs.
pub struct DisplayBus<'a> {
    pub mem: &'a mut MemoryUnit,
    pub breakpoints: &'a BreakpointManager,
    pub console: &'a mut dyn Console,
}
