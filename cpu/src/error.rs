//! Error types for the emulator.
//!
//! Configuration errors are detected when the system is being set
//! up and are fatal to construction.  [`Unimplemented`] is what the
//! processors report when they meet an instruction they cannot
//! execute; whether that halts anything is decided by the system
//! according to [`crate::Configuration::halt_on_invalid_opcodes`].
use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::io;
use std::path::PathBuf;

use base::prelude::*;

/// The memory size must be one the Imlac could actually be fitted
/// with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemorySizeError(pub usize);

impl Display for MemorySizeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        write!(
            f,
            "memory size {} is not supported; it must be 4096, 8192 or 16384 words",
            self.0
        )
    }
}

impl Error for MemorySizeError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// Two devices claim the same IOT code.
    IotConflict {
        code: Word,
        existing: &'static str,
        new: &'static str,
    },
    MemorySize(MemorySizeError),
}

impl Display for ConfigurationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            ConfigurationError::IotConflict {
                code,
                existing,
                new,
            } => write!(
                f,
                "IOT conflict on {} between {} and {}",
                Octal(*code),
                existing,
                new
            ),
            ConfigurationError::MemorySize(e) => e.fmt(f),
        }
    }
}

impl Error for ConfigurationError {}

impl From<MemorySizeError> for ConfigurationError {
    fn from(e: MemorySizeError) -> ConfigurationError {
        ConfigurationError::MemorySize(e)
    }
}

/// An instruction (or IOT) which cannot be executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unimplemented {
    /// Where the offending instruction was fetched from.
    pub address: Word,
    pub description: String,
}

impl Unimplemented {
    pub(crate) fn new<S: Into<String>>(address: Word, description: S) -> Unimplemented {
        Unimplemented {
            address,
            description: description.into(),
        }
    }
}

impl Display for Unimplemented {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "{} at {}", self.description, Octal(self.address))
    }
}

impl Error for Unimplemented {}

/// Identifies which of the two processors failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailedUnit {
    MainProcessor,
    DisplayProcessor,
}

impl Display for FailedUnit {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        f.write_str(match self {
            FailedUnit::MainProcessor => "main processor",
            FailedUnit::DisplayProcessor => "display processor",
        })
    }
}

/// Returned by [`crate::Imlac::tick`] when a processor met an
/// instruction it could not execute (and the configuration says that
/// this should stop the machine).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionError {
    pub unit: FailedUnit,
    pub cause: Unimplemented,
}

impl Display for ExecutionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "{}: {}", self.unit, self.cause)
    }
}

impl Error for ExecutionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.cause)
    }
}

/// Failure to load or save a memory image.  The state of the
/// emulated machine is unchanged.
#[derive(Debug)]
pub enum ImageError {
    Io { path: PathBuf, error: io::Error },
    AddressOutOfRange { address: usize, memory_size: usize },
}

impl Display for ImageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            ImageError::Io { path, error } => {
                write!(f, "{}: {}", path.display(), error)
            }
            ImageError::AddressOutOfRange {
                address,
                memory_size,
            } => write!(
                f,
                "start address {address:o} is beyond the end of memory (size {memory_size:o})"
            ),
        }
    }
}

impl Error for ImageError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ImageError::Io { error, .. } => Some(error),
            ImageError::AddressOutOfRange { .. } => None,
        }
    }
}

/// Failure to attach a serial channel.  Whatever channel was
/// attached before remains attached.
#[derive(Debug)]
pub enum ChannelError {
    OpenFile { path: PathBuf, error: io::Error },
    Connect { address: String, error: io::Error },
}

impl Display for ChannelError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            ChannelError::OpenFile { path, error } => {
                write!(f, "failed to open {}: {}", path.display(), error)
            }
            ChannelError::Connect { address, error } => {
                write!(f, "failed to connect to {address}: {error}")
            }
        }
    }
}

impl Error for ChannelError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ChannelError::OpenFile { error, .. } | ChannelError::Connect { error, .. } => {
                Some(error)
            }
        }
    }
}

#[test]
fn test_iot_conflict_message() {
    let e = ConfigurationError::IotConflict {
        code: 0o71,
        existing: "Display",
        new: "Clock",
    };
    assert_eq!(e.to_string(), "IOT conflict on 000071 between Display and Clock");
}
