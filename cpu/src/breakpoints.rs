//! Breakpoints for the debugger.
//!
//! There is one slot per address in a fully-stocked 32K-word
//! machine, whatever the size of the configured memory, so that
//! lookups are a single index operation.
use std::fmt::{self, Display, Formatter};
use std::ops::{BitOr, BitOrAssign};

use base::prelude::*;

const BREAKPOINT_SLOTS: usize = 0x8000;
const SLOT_MASK: Word = 0x7fff;

/// A set of breakpoint kinds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct BreakpointKinds(u8);

impl BreakpointKinds {
    pub const NONE: BreakpointKinds = BreakpointKinds(0);
    /// The main processor is about to execute the instruction.
    pub const EXECUTION: BreakpointKinds = BreakpointKinds(1);
    /// The main processor reads an operand from the address.
    pub const READ: BreakpointKinds = BreakpointKinds(2);
    /// The main processor writes an operand to the address.
    pub const WRITE: BreakpointKinds = BreakpointKinds(4);
    /// The display processor is about to execute the word.
    pub const DISPLAY: BreakpointKinds = BreakpointKinds(8);

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    #[must_use]
    pub fn intersects(&self, other: BreakpointKinds) -> bool {
        self.0 & other.0 != 0
    }
}

impl BitOr for BreakpointKinds {
    type Output = BreakpointKinds;

    fn bitor(self, rhs: BreakpointKinds) -> BreakpointKinds {
        BreakpointKinds(self.0 | rhs.0)
    }
}

impl BitOrAssign for BreakpointKinds {
    fn bitor_assign(&mut self, rhs: BreakpointKinds) {
        self.0 |= rhs.0;
    }
}

impl Display for BreakpointKinds {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        if self.is_empty() {
            return f.write_str("None");
        }
        let names: Vec<&str> = [
            (BreakpointKinds::EXECUTION, "Execution"),
            (BreakpointKinds::READ, "Read"),
            (BreakpointKinds::WRITE, "Write"),
            (BreakpointKinds::DISPLAY, "Display"),
        ]
        .into_iter()
        .filter(|(kind, _)| self.intersects(*kind))
        .map(|(_, name)| name)
        .collect();
        f.write_str(&names.join(", "))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakpointEntry {
    pub address: Word,
    pub kinds: BreakpointKinds,
}

#[derive(Debug)]
pub struct BreakpointManager {
    slots: Vec<BreakpointKinds>,
    enabled: bool,
}

impl BreakpointManager {
    /// Creates a breakpoint manager with no breakpoints, and
    /// breakpoints globally disabled.
    #[must_use]
    pub fn new() -> BreakpointManager {
        BreakpointManager {
            slots: vec![BreakpointKinds::NONE; BREAKPOINT_SLOTS],
            enabled: false,
        }
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Adds `kinds` to the breakpoints at `address`.  Setting
    /// [`BreakpointKinds::NONE`] clears every breakpoint there.
    pub fn set(&mut self, address: Word, kinds: BreakpointKinds) {
        let slot = &mut self.slots[usize::from(address & SLOT_MASK)];
        if kinds.is_empty() {
            *slot = BreakpointKinds::NONE;
        } else {
            *slot |= kinds;
        }
    }

    #[must_use]
    pub fn get(&self, address: Word) -> BreakpointKinds {
        self.slots[usize::from(address & SLOT_MASK)]
    }

    /// Returns true if a breakpoint of one of the given kinds is set
    /// at `address`.  Always false while breakpoints are globally
    /// disabled.
    #[must_use]
    pub fn test(&self, kinds: BreakpointKinds, address: Word) -> bool {
        self.enabled && self.get(address).intersects(kinds)
    }

    #[must_use]
    pub fn enumerate(&self) -> Vec<BreakpointEntry> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, kinds)| !kinds.is_empty())
            .map(|(address, kinds)| BreakpointEntry {
                // There are only 0x8000 slots.
                address: address as Word,
                kinds: *kinds,
            })
            .collect()
    }
}

impl Default for BreakpointManager {
    fn default() -> BreakpointManager {
        BreakpointManager::new()
    }
}

#[test]
fn test_set_accumulates_and_clears() {
    let mut bp = BreakpointManager::new();
    bp.set(0o100, BreakpointKinds::READ);
    bp.set(0o100, BreakpointKinds::WRITE);
    assert_eq!(bp.get(0o100), BreakpointKinds::READ | BreakpointKinds::WRITE);
    bp.set(0o100, BreakpointKinds::NONE);
    assert!(bp.get(0o100).is_empty());
}

#[test]
fn test_disabled_breakpoints_never_fire() {
    let mut bp = BreakpointManager::new();
    bp.set(0o40, BreakpointKinds::EXECUTION);
    assert!(!bp.test(BreakpointKinds::EXECUTION, 0o40));
    bp.set_enabled(true);
    assert!(bp.test(BreakpointKinds::EXECUTION, 0o40));
    assert!(!bp.test(BreakpointKinds::DISPLAY, 0o40));
}

#[test]
fn test_enumerate() {
    let mut bp = BreakpointManager::new();
    bp.set(0o77777, BreakpointKinds::DISPLAY);
    bp.set(0o20, BreakpointKinds::EXECUTION | BreakpointKinds::READ);
    assert_eq!(
        bp.enumerate(),
        vec![
            BreakpointEntry {
                address: 0o20,
                kinds: BreakpointKinds::EXECUTION | BreakpointKinds::READ,
            },
            BreakpointEntry {
                address: 0o77777,
                kinds: BreakpointKinds::DISPLAY,
            },
        ]
    );
    assert_eq!(bp.get(0o20).to_string(), "Execution, Read");
}
