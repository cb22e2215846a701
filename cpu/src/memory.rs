//! Imlac core memory.
//!
//! Memory is a flat array of 16-bit words shared by the main
//! processor and the display processor.  Addresses wrap modulo the
//! memory size, so no access is ever out of bounds.
//!
//! Both processors cache decoded instructions per address.  The
//! caches live here, beside the words they were decoded from, so
//! that a store from either processor invalidates both of them
//! without any component needing a back-pointer to the other.
use tracing::{event, Level};

use base::prelude::*;

use super::config::SUPPORTED_MEMORY_SIZES;
use super::error::MemorySizeError;

/// What the display processor last did with a memory location.
/// Disassembly uses this when it is asked to pick the mode itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DisplayCacheEntry {
    decoded: Option<DisplayInstruction>,
    usage_mode: DisplayMode,
}

#[derive(Debug)]
pub struct MemoryUnit {
    words: Vec<Word>,
    processor_cache: Vec<Option<Instruction>>,
    display_cache: Vec<Option<DisplayCacheEntry>>,
}

impl MemoryUnit {
    pub fn new(size: usize) -> Result<MemoryUnit, MemorySizeError> {
        let mut mem = MemoryUnit {
            words: Vec::new(),
            processor_cache: Vec::new(),
            display_cache: Vec::new(),
        };
        mem.set_size(size)?;
        Ok(mem)
    }

    /// Changes the size of memory.  The contents are lost and both
    /// instruction caches are emptied.
    pub fn set_size(&mut self, size: usize) -> Result<(), MemorySizeError> {
        if !SUPPORTED_MEMORY_SIZES.contains(&size) {
            return Err(MemorySizeError(size));
        }
        event!(Level::DEBUG, "memory size set to {} words", size);
        self.words = vec![0; size];
        self.processor_cache = vec![None; size];
        self.display_cache = vec![None; size];
        Ok(())
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.words.len()
    }

    /// The mask which wraps an address into the memory.
    #[must_use]
    pub fn mask(&self) -> Word {
        // Sizes are at most 16K words so this cannot truncate.
        (self.words.len() - 1) as Word
    }

    fn index(&self, address: Word) -> usize {
        usize::from(address & self.mask())
    }

    #[must_use]
    pub fn fetch(&self, address: Word) -> Word {
        self.words[self.index(address)]
    }

    pub fn store(&mut self, address: Word, value: Word) {
        let i = self.index(address);
        self.words[i] = value;
        self.processor_cache[i] = None;
        self.display_cache[i] = None;
    }

    #[must_use]
    pub fn cached_instruction(&self, address: Word) -> Option<Instruction> {
        self.processor_cache[self.index(address)]
    }

    pub fn cache_instruction(&mut self, address: Word, inst: Instruction) {
        let i = self.index(address);
        self.processor_cache[i] = Some(inst);
    }

    /// Returns the display instruction previously decoded (in
    /// Processor mode) at `address`.
    #[must_use]
    pub fn cached_display_instruction(&self, address: Word) -> Option<DisplayInstruction> {
        self.display_cache[self.index(address)].and_then(|entry| entry.decoded)
    }

    pub fn cache_display_instruction(&mut self, address: Word, inst: DisplayInstruction) {
        let i = self.index(address);
        self.display_cache[i] = Some(DisplayCacheEntry {
            decoded: Some(inst),
            usage_mode: DisplayMode::Processor,
        });
    }

    /// Records the mode in which the display processor used the word
    /// at `address`.
    pub fn set_display_usage(&mut self, address: Word, mode: DisplayMode) {
        let i = self.index(address);
        match self.display_cache[i].as_mut() {
            Some(entry) => entry.usage_mode = mode,
            None => {
                self.display_cache[i] = Some(DisplayCacheEntry {
                    decoded: None,
                    usage_mode: mode,
                });
            }
        }
    }

    #[must_use]
    pub fn display_usage(&self, address: Word) -> DisplayMode {
        self.display_cache[self.index(address)]
            .map(|entry| entry.usage_mode)
            .unwrap_or(DisplayMode::Indeterminate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_strategy::{proptest, Arbitrary};

    fn must_decode(word: Word) -> Instruction {
        match decode(word, CpuType::Pds1) {
            Ok(inst) => inst,
            Err(e) => panic!("test data should decode: {e}"),
        }
    }

    fn must_decode_display(word: Word) -> DisplayInstruction {
        match decode_pds1(word, false) {
            Ok(inst) => inst,
            Err(e) => panic!("test data should decode: {e}"),
        }
    }

    #[test]
    fn test_unsupported_size() {
        assert_eq!(MemoryUnit::new(12288).err(), Some(MemorySizeError(12288)));
        let mut mem = MemoryUnit::new(4096).expect("4K is a supported size");
        assert!(mem.set_size(100).is_err());
        assert_eq!(mem.size(), 4096);
    }

    #[test]
    fn test_store_invalidates_both_caches() {
        let mut mem = MemoryUnit::new(4096).expect("4K is a supported size");
        mem.cache_instruction(0o100, must_decode(0o004000));
        mem.cache_display_instruction(0o100, must_decode_display(0o010000));
        assert!(mem.cached_instruction(0o100).is_some());
        assert_eq!(mem.display_usage(0o100), DisplayMode::Processor);

        // 0o10100 wraps around to 0o100 in a 4K memory.
        mem.store(0o10100, 0o20);
        assert_eq!(mem.fetch(0o100), 0o20);
        assert!(mem.cached_instruction(0o100).is_none());
        assert!(mem.cached_display_instruction(0o100).is_none());
        assert_eq!(mem.display_usage(0o100), DisplayMode::Indeterminate);
    }

    #[test]
    fn test_resize_discards_caches() {
        let mut mem = MemoryUnit::new(16384).expect("16K is a supported size");
        mem.store(0o30000, 0o1234);
        mem.cache_instruction(0o200, must_decode(0o004000));
        mem.set_size(8192).expect("8K is a supported size");
        assert_eq!(mem.size(), 8192);
        assert_eq!(mem.mask(), 0o17777);
        assert!(mem.cached_instruction(0o200).is_none());
        assert_eq!(mem.fetch(0o30000), 0);
    }

    #[test]
    fn test_usage_survives_decode() {
        let mut mem = MemoryUnit::new(4096).expect("4K is a supported size");
        mem.set_display_usage(0o500, DisplayMode::Increment);
        assert_eq!(mem.display_usage(0o500), DisplayMode::Increment);
        assert!(mem.cached_display_instruction(0o500).is_none());
    }

    #[derive(Debug, Arbitrary)]
    struct StoreInput {
        #[strategy(0usize..3)]
        size_index: usize,
        address: u16,
        value: u16,
    }

    #[proptest]
    fn store_then_fetch_wraps(input: StoreInput) {
        let size = SUPPORTED_MEMORY_SIZES[input.size_index];
        let mut mem = MemoryUnit::new(size).expect("supported size");
        mem.cache_instruction(input.address, must_decode(0o004000));
        mem.store(input.address, input.value);
        let wrapped = input.address & mem.mask();
        assert_eq!(mem.fetch(wrapped), input.value);
        assert!(usize::from(wrapped) < size);
        assert!(mem.cached_instruction(wrapped).is_none());
    }
}
