//! Emulator configuration.
//!
//! The configuration is built once (normally from command-line
//! options) and owned by the [`crate::Imlac`] system, which lends it
//! to the components that need it.
use serde::{Deserialize, Serialize};

use base::prelude::*;

/// Memory sizes (in words) that the Imlac could be fitted with.
pub const SUPPORTED_MEMORY_SIZES: [usize; 3] = [4096, 8192, 16384];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    /// Which model we emulate.  This selects the instruction decoders
    /// and the display processor variant.
    pub cpu_type: CpuType,

    /// Enables the MIT modifications (DADR, the extended display
    /// jump range and the wider PDS-4 scissor coordinates).
    pub mit_mode: bool,

    /// When set, an unimplemented or undecodable instruction halts
    /// the processor which tried to execute it.  Otherwise it is
    /// logged and skipped.
    pub halt_on_invalid_opcodes: bool,

    /// Memory size in words.
    pub memory_size: usize,
}

impl Configuration {
    #[must_use]
    pub fn new() -> Configuration {
        Configuration {
            cpu_type: CpuType::Pds1,
            mit_mode: false,
            halt_on_invalid_opcodes: true,
            memory_size: 16384,
        }
    }
}

impl Default for Configuration {
    fn default() -> Configuration {
        Configuration::new()
    }
}

#[test]
fn test_default_configuration() {
    let config = Configuration::default();
    assert_eq!(config.cpu_type, CpuType::Pds1);
    assert!(!config.mit_mode);
    assert!(config.halt_on_invalid_opcodes);
    assert!(SUPPORTED_MEMORY_SIZES.contains(&config.memory_size));
}
