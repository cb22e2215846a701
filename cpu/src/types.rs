use std::fmt::{self, Display, Formatter};

use serde::Serialize;

/// Run state of either processor.  Each processor has its own.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum ProcessorState {
    #[default]
    Halted,
    Running,
    /// Running, but a breakpoint has been reached.  The system's run
    /// loop stops when it sees this.
    BreakpointHalt,
}

impl Display for ProcessorState {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        f.write_str(match self {
            ProcessorState::Halted => "Halted",
            ProcessorState::Running => "Running",
            ProcessorState::BreakpointHalt => "BreakpointHalt",
        })
    }
}

/// Where the main processor is in its instruction cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum ExecState {
    #[default]
    Fetch,
    Defer,
    /// PDS-4 multi-level indirection.
    ExtraDefer,
    Execute,
}

impl Display for ExecState {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        f.write_str(match self {
            ExecState::Fetch => "Fetch",
            ExecState::Defer => "Defer",
            ExecState::ExtraDefer => "ExtraDefer",
            ExecState::Execute => "Execute",
        })
    }
}

/// PDS-4 byte addressing: SBL and SBR make the next memory reference
/// instruction operate on one half of its operand.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum ByteAccess {
    #[default]
    Normal,
    Left,
    Right,
}

/// Which half of an Increment-mode (or Compact Addressing) word the
/// display processor will use next.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum HalfWord {
    /// The left (most significant) byte.
    #[default]
    First,
    Second,
}

impl Display for HalfWord {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        f.write_str(match self {
            HalfWord::First => "First",
            HalfWord::Second => "Second",
        })
    }
}
