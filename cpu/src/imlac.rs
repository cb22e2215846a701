//! The whole machine.
//!
//! [`Imlac`] owns the memory, both processors, the I/O devices, the
//! breakpoints and the console.  [`Imlac::tick`] advances everything
//! by one memory cycle, in a fixed order: the main processor, the
//! display processor, the I/O devices and finally the interrupt
//! facility, so that the devices have posted their status before
//! interrupts are arbitrated.
//!
//! The rest of this module is the debugger's view of the machine:
//! loading and saving memory, disassembly, status displays and the
//! run loop.
use std::cmp::min;
use std::fmt::{self, Display, Formatter};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{event, Level};

use base::prelude::*;

use crate::breakpoints::{BreakpointKinds, BreakpointManager};
use crate::config::Configuration;
use crate::console::{Console, HeadlessConsole};
use crate::context::{Bus, DisplayBus};
use crate::display::DisplayProcessor;
use crate::error::{
    ChannelError, ConfigurationError, ExecutionError, FailedUnit, ImageError, Unimplemented,
};
use crate::io::channel::{NullChannel, StreamChannel};
use crate::io::telnet::TelnetChannel;
use crate::io::{Devices, IotDevice, IotTarget};
use crate::memory::MemoryUnit;
use crate::processor::{Processor, BOOTSTRAP_ADDRESS};
use crate::types::{ExecState, ProcessorState};

/// The bootstrap loader is this many words long.
pub const BOOTSTRAP_LENGTH: usize = 0o40;

/// What the debugger has asked the machine to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionState {
    Debugging,
    Halted,
    /// Run one memory cycle.
    SingleStep,
    /// Run until the main processor has completed an instruction.
    SingleInstruction,
    /// Run until the display processor reaches the end of a frame.
    SingleFrame,
    UntilDisplayStart,
    Running,
    Quit,
}

/// Why [`Imlac::run`] returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// Nothing to run in this execution state.
    Idle,
    Stepped,
    FrameCompleted,
    DisplayStarted,
    Halted {
        pc: Word,
    },
    Breakpoint {
        kinds: BreakpointKinds,
        address: Word,
    },
    DisplayBreakpoint {
        address: Word,
    },
    UserBreak,
    Error(ExecutionError),
}

impl Display for StopReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            StopReason::Idle => f.write_str("Idle."),
            StopReason::Stepped => f.write_str("Stepped."),
            StopReason::FrameCompleted => f.write_str("Frame completed."),
            StopReason::DisplayStarted => f.write_str("Display started."),
            StopReason::Halted { pc } => write!(f, "Main processor halted at {}", Octal(*pc)),
            StopReason::Breakpoint { kinds, address } => {
                write!(f, "Breakpoint hit: {} at address {}", kinds, Octal(*address))
            }
            StopReason::DisplayBreakpoint { address } => {
                write!(f, "Display breakpoint hit at address {}", Octal(*address))
            }
            StopReason::UserBreak => f.write_str("User break."),
            StopReason::Error(e) => write!(f, "Internal error during execution: {e}"),
        }
    }
}

/// How [`Imlac::disassemble`] should interpret memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisassemblyMode {
    Processor,
    DisplayProcessor,
    DisplayIncrement,
    /// Display code, interpreted the way the display processor last
    /// used it.
    DisplayAuto,
    DisplayCompact,
}

pub struct Imlac<C: Console = HeadlessConsole> {
    config: Configuration,
    mem: MemoryUnit,
    processor: Processor,
    display: DisplayProcessor,
    devices: Devices,
    breakpoints: BreakpointManager,
    console: C,
}

impl<C: Console> Imlac<C> {
    /// Puts together a machine.  Every device registers its IOT
    /// codes with the main processor; a clash is a configuration
    /// error.
    pub fn new(config: Configuration, console: C) -> Result<Imlac<C>, ConfigurationError> {
        let mem = MemoryUnit::new(config.memory_size)?;
        let display = DisplayProcessor::new(config.cpu_type, config.mit_mode);
        let devices = Devices::new();
        let mut processor = Processor::new();
        processor.register(IotTarget::Display, display.name(), display.handled_iots())?;
        for (target, device) in devices.each() {
            processor.register(target, device.name(), device.handled_iots())?;
        }
        event!(
            Level::INFO,
            "{} with {} words of memory{}",
            config.cpu_type,
            config.memory_size,
            if config.mit_mode {
                " and the MIT modifications"
            } else {
                ""
            }
        );
        let mut imlac = Imlac {
            config,
            mem,
            processor,
            display,
            devices,
            breakpoints: BreakpointManager::new(),
            console,
        };
        imlac.reset();
        Ok(imlac)
    }

    /// Resets the processors and devices.  Memory is unchanged.
    pub fn reset(&mut self) {
        self.devices.reset();
        self.display.reset(&mut self.console);
        self.processor.reset();
    }

    #[must_use]
    pub fn config(&self) -> &Configuration {
        &self.config
    }

    #[must_use]
    pub fn memory(&self) -> &MemoryUnit {
        &self.mem
    }

    pub fn memory_mut(&mut self) -> &mut MemoryUnit {
        &mut self.mem
    }

    #[must_use]
    pub fn processor(&self) -> &Processor {
        &self.processor
    }

    pub fn processor_mut(&mut self) -> &mut Processor {
        &mut self.processor
    }

    #[must_use]
    pub fn display(&self) -> &DisplayProcessor {
        &self.display
    }

    pub fn display_mut(&mut self) -> &mut DisplayProcessor {
        &mut self.display
    }

    #[must_use]
    pub fn devices(&self) -> &Devices {
        &self.devices
    }

    pub fn devices_mut(&mut self) -> &mut Devices {
        &mut self.devices
    }

    #[must_use]
    pub fn breakpoints(&self) -> &BreakpointManager {
        &self.breakpoints
    }

    pub fn breakpoints_mut(&mut self) -> &mut BreakpointManager {
        &mut self.breakpoints
    }

    #[must_use]
    pub fn console(&self) -> &C {
        &self.console
    }

    pub fn console_mut(&mut self) -> &mut C {
        &mut self.console
    }

    /// Runs one memory cycle of the whole machine.
    ///
    /// If a processor meets an instruction it cannot execute, what
    /// happens depends on the configuration: either that processor
    /// halts and the failure is returned, or the failure is logged
    /// and the machine carries on.  In either case the rest of the
    /// machine completes the cycle.
    pub fn tick(&mut self) -> Result<(), ExecutionError> {
        let mut failure: Option<ExecutionError> = None;

        let mut bus = Bus {
            config: &self.config,
            mem: &mut self.mem,
            display: &mut self.display,
            devices: &mut self.devices,
            breakpoints: &self.breakpoints,
            console: &mut self.console,
        };
        if let Err(cause) = self.processor.clock(&mut bus) {
            failure = self.invalid_instruction(FailedUnit::MainProcessor, cause);
        }

        let mut display_bus = DisplayBus {
            mem: &mut self.mem,
            breakpoints: &self.breakpoints,
            console: &mut self.console,
        };
        if let Err(cause) = self.display.clock(&mut display_bus) {
            let display_failure = self.invalid_instruction(FailedUnit::DisplayProcessor, cause);
            failure = failure.or(display_failure);
        }

        self.devices.clock(&self.console);

        let status = self.devices.interrupt_status(self.display.frame_latch());
        if self
            .devices
            .interrupt
            .clock(status, self.processor.can_be_interrupted())
        {
            self.processor.interrupt(&mut self.mem);
        }

        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn invalid_instruction(
        &mut self,
        unit: FailedUnit,
        cause: Unimplemented,
    ) -> Option<ExecutionError> {
        if self.config.halt_on_invalid_opcodes {
            match unit {
                FailedUnit::MainProcessor => self.processor.halt(),
                FailedUnit::DisplayProcessor => self.display.halt(),
            }
            Some(ExecutionError { unit, cause })
        } else {
            event!(Level::ERROR, "{}: {}", unit, cause);
            None
        }
    }

    /// Runs the main processor until it completes an instruction
    /// (or stops).
    pub fn step_instruction(&mut self) -> Result<(), ExecutionError> {
        loop {
            self.tick()?;
            if self.processor.exec_state() == ExecState::Fetch
                || self.processor.state() != ProcessorState::Running
            {
                return Ok(());
            }
        }
    }

    /// Runs the machine in the given mode until the mode's stopping
    /// condition is met, something goes wrong, or `stop` is set
    /// (which is checked between cycles).
    ///
    /// Every mode which runs anything starts the main processor, and
    /// resumes both processors from any breakpoint they are stopped
    /// at.
    pub fn run(&mut self, mode: ExecutionState, stop: &AtomicBool) -> StopReason {
        if matches!(
            mode,
            ExecutionState::Debugging | ExecutionState::Halted | ExecutionState::Quit
        ) {
            return StopReason::Idle;
        }
        self.processor.resume_from_breakpoint();
        self.display.resume_from_breakpoint();
        self.processor.set_state(ProcessorState::Running);

        if mode == ExecutionState::SingleStep {
            let result = self.tick();
            self.console.render_current(false);
            return match result {
                Ok(()) => StopReason::Stepped,
                Err(e) => StopReason::Error(e),
            };
        }

        loop {
            if stop.load(Ordering::Relaxed) {
                return StopReason::UserBreak;
            }
            if let Err(e) = self.tick() {
                return StopReason::Error(e);
            }
            if let Some(reason) = self.stopping_condition(mode) {
                return reason;
            }
        }
    }

    fn stopping_condition(&self, mode: ExecutionState) -> Option<StopReason> {
        match mode {
            ExecutionState::SingleInstruction => {
                if self.processor.exec_state() == ExecState::Fetch
                    || self.processor.state() != ProcessorState::Running
                {
                    return Some(StopReason::Stepped);
                }
            }
            ExecutionState::SingleFrame => {
                if self.display.frame_latch() {
                    return Some(StopReason::FrameCompleted);
                }
            }
            ExecutionState::UntilDisplayStart => {
                if self.display.state() == ProcessorState::Running {
                    return Some(StopReason::DisplayStarted);
                }
            }
            _ => {}
        }
        match (self.processor.state(), self.processor.breakpoint_address()) {
            // Once the main processor halts nothing can start the
            // display, so waiting for it would never end.
            (ProcessorState::Halted, _)
                if matches!(
                    mode,
                    ExecutionState::Running | ExecutionState::UntilDisplayStart
                ) =>
            {
                return Some(StopReason::Halted {
                    pc: self.processor.pc(),
                });
            }
            (ProcessorState::BreakpointHalt, Some(address)) => {
                return Some(StopReason::Breakpoint {
                    kinds: self.breakpoints.get(address),
                    address,
                });
            }
            _ => {}
        }
        match (self.display.state(), self.display.breakpoint_address()) {
            (ProcessorState::BreakpointHalt, Some(address)) => {
                Some(StopReason::DisplayBreakpoint { address })
            }
            _ => None,
        }
    }

    fn check_start_address(&self, start: Word) -> Result<usize, ImageError> {
        let start = usize::from(start);
        if start > self.mem.size() {
            Err(ImageError::AddressOutOfRange {
                address: start,
                memory_size: self.mem.size(),
            })
        } else {
            Ok(start)
        }
    }

    /// Loads `len` words from a file of big-endian 16-bit words into
    /// memory at `start`.  The range is clipped to the end of memory,
    /// and a short file loads as much as it holds.  Returns the
    /// number of words loaded.
    pub fn load_memory(&mut self, path: &Path, start: Word, len: usize) -> Result<usize, ImageError> {
        let first = self.check_start_address(start)?;
        let bytes = fs::read(path).map_err(|error| ImageError::Io {
            path: path.to_path_buf(),
            error,
        })?;
        let end = min(self.mem.size(), first + len);
        let mut loaded = 0;
        for (address, pair) in (start..).zip(bytes.chunks_exact(2).take(end - first)) {
            self.mem.store(address, Word::from_be_bytes([pair[0], pair[1]]));
            loaded += 1;
        }
        event!(
            Level::INFO,
            "loaded {} words from {} at {}",
            loaded,
            path.display(),
            Octal(start)
        );
        Ok(loaded)
    }

    /// Saves `len` words of memory, starting at `start`, as big-endian
    /// 16-bit words.  The range is clipped to the end of memory.
    pub fn save_memory(&self, path: &Path, start: Word, len: usize) -> Result<usize, ImageError> {
        let first = self.check_start_address(start)?;
        let end = min(self.mem.size(), first + len);
        let bytes: Vec<u8> = (start..)
            .take(end - first)
            .flat_map(|address| self.mem.fetch(address).to_be_bytes())
            .collect();
        fs::write(path, &bytes).map_err(|error| ImageError::Io {
            path: path.to_path_buf(),
            error,
        })?;
        Ok(end - first)
    }

    /// Loads a bootstrap loader and points the main processor at it.
    pub fn bootstrap(&mut self, path: &Path) -> Result<(), ImageError> {
        self.load_memory(path, BOOTSTRAP_ADDRESS, BOOTSTRAP_LENGTH)?;
        self.processor.set_pc(BOOTSTRAP_ADDRESS);
        Ok(())
    }

    /// Disassembles `len` words starting at `start`, one line per
    /// instruction.
    pub fn disassemble(
        &self,
        start: Word,
        len: usize,
        mode: DisassemblyMode,
    ) -> Result<Vec<String>, ImageError> {
        let first = self.check_start_address(start)?;
        let end = min(self.mem.size(), first + len);
        let mut lines = Vec::new();
        let mut offset = 0;
        while first + offset < end {
            // `first + offset` is below the memory size, which fits a Word.
            let address = start.wrapping_add(offset as Word);
            let (text, length) = self.disassemble_at(address, mode);
            lines.push(format!(
                "{}\\{} {}",
                Octal(address),
                Octal(self.mem.fetch(address)),
                text
            ));
            offset += length.max(1);
        }
        Ok(lines)
    }

    fn disassemble_at(&self, address: Word, mode: DisassemblyMode) -> (String, usize) {
        let display_mode = match mode {
            DisassemblyMode::Processor => {
                let text = Processor::disassemble(&self.mem, self.config.cpu_type, address)
                    .unwrap_or_else(|_| "<invalid instruction>".to_string());
                return (text, 1);
            }
            DisassemblyMode::DisplayProcessor => DisplayMode::Processor,
            DisassemblyMode::DisplayIncrement => DisplayMode::Increment,
            DisassemblyMode::DisplayAuto => DisplayMode::Indeterminate,
            DisassemblyMode::DisplayCompact => DisplayMode::CompactAddressing,
        };
        self.display.disassemble(&self.mem, address, display_mode)
    }

    /// Shows memory four words to a line, as octal and as pairs of
    /// characters.  At most the whole of memory is shown.
    #[must_use]
    pub fn dump_memory(&self, start: Word, len: usize) -> Vec<String> {
        let len = min(len, self.mem.size());
        (0..len)
            .step_by(4)
            .map(|offset| {
                // Offsets wrap like addresses do.
                let base = start.wrapping_add(offset as Word);
                let words: Vec<Word> = (0..4)
                    .map(|i| self.mem.fetch(base.wrapping_add(i)))
                    .collect();
                let mut line = format!("{}: ", Octal(base));
                for w in &words {
                    line.push_str(&format!("{} ", Octal(*w)));
                }
                for w in &words {
                    let (left, right) = split_bytes(*w);
                    line.push(printable(left));
                    line.push(printable(right));
                    line.push(' ');
                }
                line.trim_end().to_string()
            })
            .collect()
    }

    /// The state of both processors, for the debugger.
    #[must_use]
    pub fn status_text(&self) -> String {
        let pc = self.processor.pc();
        let disassembly = Processor::disassemble(&self.mem, self.config.cpu_type, pc)
            .unwrap_or_else(|_| "<invalid instruction>".to_string());
        let d = &self.display;
        format!(
            "PC={} AC={} MB={} - {}\n{}\nDPC={} DT={} DPCE={} X={} Y={}\nMode={} HalfWord={}",
            Octal(pc),
            Octal(self.processor.ac()),
            Octal(self.mem.fetch(pc)),
            self.processor.state(),
            disassembly,
            Octal(d.pc()),
            Octal(d.stack_top()),
            Octal(d.pc_entry()),
            d.x(),
            d.y(),
            d.mode(),
            d.half()
        )
    }

    /// Lists the breakpoints, for the debugger.
    #[must_use]
    pub fn breakpoints_text(&self) -> String {
        let entries = self.breakpoints.enumerate();
        let mut lines: Vec<String> = entries
            .iter()
            .map(|e| format!("Address {}, break on {}", Octal(e.address), e.kinds))
            .collect();
        if lines.is_empty() {
            lines.push("No breakpoints are currently defined.".to_string());
        }
        lines.push(String::new());
        lines.push(format!(
            "Breakpoints are {} globally.",
            if self.breakpoints.enabled() {
                "enabled"
            } else {
                "disabled"
            }
        ));
        lines.join("\n")
    }

    pub fn set_data_switches(&mut self, value: Word) {
        self.processor.set_data_switches(value);
    }

    /// Feeds the TTY from the contents of a file.
    pub fn attach_tty_file(&mut self, path: &Path) -> Result<(), ChannelError> {
        let channel = StreamChannel::from_file(path)?;
        self.devices.tty.set_channel(Box::new(channel));
        Ok(())
    }

    /// Connects the TTY to a telnet server at `address` (`host:port`).
    pub fn attach_tty_telnet(&mut self, address: &str) -> Result<(), ChannelError> {
        let channel = TelnetChannel::connect(address)?;
        self.devices.tty.set_channel(Box::new(channel));
        Ok(())
    }

    pub fn detach_tty(&mut self) {
        self.devices.tty.set_channel(Box::new(NullChannel));
    }

    pub fn load_paper_tape(&mut self, path: &Path) -> Result<(), ChannelError> {
        self.devices.ptr.load_tape(path)
    }

    /// Changes the memory size.  The contents of memory and the
    /// decode caches are discarded.
    pub fn set_memory_size(&mut self, words: usize) -> Result<(), ConfigurationError> {
        self.mem.set_size(words)?;
        self.config.memory_size = words;
        Ok(())
    }

    pub fn set_breakpoint(&mut self, address: Word, kinds: BreakpointKinds) {
        self.breakpoints.set(address, kinds);
    }
}

fn printable(byte: u8) -> char {
    let c = char::from(byte);
    if c.is_ascii_graphic() {
        c
    } else {
        '.'
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::console::RecordingConsole;
    use crate::io::channel::SerialChannel;

    fn machine(cpu_type: CpuType) -> Imlac<RecordingConsole> {
        let config = Configuration {
            cpu_type,
            memory_size: 4096,
            ..Configuration::default()
        };
        Imlac::new(config, RecordingConsole::new()).expect("the standard devices do not conflict")
    }

    fn load(imlac: &mut Imlac<RecordingConsole>, address: Word, words: &[Word]) {
        for (offset, w) in (0..).zip(words.iter()) {
            imlac.memory_mut().store(address + offset, *w);
        }
    }

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("imlac-{}-{}", std::process::id(), name))
    }

    #[test]
    fn test_standard_devices_register() {
        for cpu_type in [CpuType::Pds1, CpuType::Pds4] {
            let imlac = machine(cpu_type);
            let p = imlac.processor();
            assert_eq!(p.iot_target(0o3), Some(IotTarget::Display));
            assert_eq!(p.iot_target(0o21), Some(IotTarget::Keyboard));
            assert_eq!(p.iot_target(0o121), Some(IotTarget::Clock));
            assert_eq!(p.iot_target(0o161), Some(IotTarget::Interrupt));
            assert_eq!(p.iot_target(0o51), Some(IotTarget::PaperTapeReader));
            assert_eq!(p.iot_target(0o41), Some(IotTarget::Tty));
        }
    }

    #[test]
    fn test_bad_memory_size_is_rejected() {
        let config = Configuration {
            memory_size: 5000,
            ..Configuration::default()
        };
        assert!(matches!(
            Imlac::new(config, RecordingConsole::new()),
            Err(ConfigurationError::MemorySize(_))
        ));
    }

    #[test]
    fn test_store_then_halt() {
        let mut imlac = machine(CpuType::Pds1);
        // LAW 0; DAC 100; HLT
        load(&mut imlac, 0o40, &[0o004000, 0o020100, 0o000000]);
        imlac.memory_mut().store(0o100, 0o7777);
        imlac.processor_mut().set_pc(0o40);
        imlac.processor_mut().set_state(ProcessorState::Running);
        for _ in 0..3 {
            imlac.step_instruction().expect("valid program");
        }
        assert_eq!(imlac.memory().fetch(0o100), 0);
        assert_eq!(imlac.processor().state(), ProcessorState::Halted);
    }

    #[test]
    fn test_run_until_halted() {
        let mut imlac = machine(CpuType::Pds1);
        load(&mut imlac, 0o40, &[0o004005, 0o020100, 0o000000]);
        let stop = AtomicBool::new(false);
        let reason = imlac.run(ExecutionState::Running, &stop);
        assert_eq!(reason, StopReason::Halted { pc: 0o43 });
        assert_eq!(reason.to_string(), "Main processor halted at 000043");
        assert_eq!(imlac.memory().fetch(0o100), 5);
    }

    #[test]
    fn test_run_stops_at_breakpoint() {
        let mut imlac = machine(CpuType::Pds1);
        load(&mut imlac, 0o40, &[0o100000, 0o100000, 0o100000, 0o000000]);
        imlac.set_breakpoint(0o42, BreakpointKinds::EXECUTION);
        imlac.breakpoints_mut().set_enabled(true);
        let stop = AtomicBool::new(false);
        let reason = imlac.run(ExecutionState::Running, &stop);
        assert_eq!(
            reason,
            StopReason::Breakpoint {
                kinds: BreakpointKinds::EXECUTION,
                address: 0o42
            }
        );
        assert_eq!(reason.to_string(), "Breakpoint hit: Execution at address 000042");

        // Running again resumes from the breakpoint.
        let reason = imlac.run(ExecutionState::Running, &stop);
        assert_eq!(reason, StopReason::Halted { pc: 0o44 });
    }

    #[test]
    fn test_user_break() {
        let mut imlac = machine(CpuType::Pds1);
        // JMP 40
        load(&mut imlac, 0o40, &[0o010040]);
        let stop = AtomicBool::new(true);
        assert_eq!(
            imlac.run(ExecutionState::Running, &stop),
            StopReason::UserBreak
        );
    }

    #[test]
    fn test_single_step_renders() {
        let mut imlac = machine(CpuType::Pds1);
        load(&mut imlac, 0o40, &[0o100000]);
        let stop = AtomicBool::new(false);
        assert_eq!(
            imlac.run(ExecutionState::SingleStep, &stop),
            StopReason::Stepped
        );
        assert_eq!(imlac.processor().pc(), 0o41);
        assert_eq!(
            imlac.run(ExecutionState::Debugging, &stop),
            StopReason::Idle
        );
    }

    #[test]
    fn test_until_display_start_and_frame() {
        let mut imlac = machine(CpuType::Pds4);
        // LAW 1000; DLA; JMP 42
        load(&mut imlac, 0o40, &[0o005000, 0o001003, 0o010042]);
        // DJMP 1000
        load(&mut imlac, 0o1000, &[0o061000]);
        let stop = AtomicBool::new(false);
        assert_eq!(
            imlac.run(ExecutionState::UntilDisplayStart, &stop),
            StopReason::DisplayStarted
        );
        assert_eq!(imlac.display().pc(), 0o1000);
        assert_eq!(
            imlac.run(ExecutionState::SingleFrame, &stop),
            StopReason::FrameCompleted
        );
        assert_eq!(imlac.console().frames, 1);
    }

    #[test]
    fn test_invalid_instruction_policy() {
        let mut imlac = machine(CpuType::Pds1);
        load(&mut imlac, 0o40, &[0o103000, 0o000000]);
        imlac.processor_mut().set_state(ProcessorState::Running);
        let err = imlac.tick().expect_err("undecodable");
        assert_eq!(err.unit, FailedUnit::MainProcessor);
        assert_eq!(imlac.processor().state(), ProcessorState::Halted);

        let config = Configuration {
            memory_size: 4096,
            halt_on_invalid_opcodes: false,
            ..Configuration::default()
        };
        let mut imlac =
            Imlac::new(config, RecordingConsole::new()).expect("valid configuration");
        load(&mut imlac, 0o40, &[0o103000, 0o000000]);
        let stop = AtomicBool::new(false);
        assert_eq!(
            imlac.run(ExecutionState::Running, &stop),
            StopReason::Halted { pc: 0o42 }
        );
    }

    #[test]
    fn test_interrupt_taken_between_instructions() {
        let mut imlac = machine(CpuType::Pds1);
        // LAW 20; IOT 141 (set mask to keyboard); IOT 162 (enable); JMP 43
        load(&mut imlac, 0o40, &[0o004020, 0o001141, 0o001162, 0o010043]);
        imlac.processor_mut().set_pc(0o40);
        imlac.processor_mut().set_state(ProcessorState::Running);
        for _ in 0..4 {
            imlac.step_instruction().expect("valid program");
        }
        assert_ne!(imlac.processor().pc(), 1);
        imlac
            .console_mut()
            .press(crate::io::keyboard::ImlacKey::A, Default::default());
        // The key arrives while JMP is part way through, so the
        // interrupt waits for the instruction to finish.
        imlac.tick().expect("valid program");
        assert_ne!(imlac.processor().pc(), 1);
        assert!(imlac.devices().interrupt.pending());
        imlac.tick().expect("valid program");
        assert_eq!(imlac.processor().pc(), 1);
        assert_eq!(imlac.memory().fetch(0), 0o43);
    }

    #[derive(Debug)]
    struct Recorder {
        written: Arc<Mutex<Vec<u8>>>,
    }

    impl SerialChannel for Recorder {
        fn name(&self) -> String {
            "recorder".to_string()
        }

        fn read(&mut self) -> u8 {
            0
        }

        fn write(&mut self, value: u8) {
            self.written.lock().expect("lock").push(value);
        }

        fn data_available(&self) -> bool {
            false
        }

        fn output_ready(&self) -> bool {
            true
        }

        fn reset(&mut self) {}

        fn close(&mut self) {}
    }

    #[test]
    fn test_tty_transmit() {
        let mut imlac = machine(CpuType::Pds1);
        let written = Arc::new(Mutex::new(Vec::new()));
        imlac.devices_mut().tty.set_channel(Box::new(Recorder {
            written: Arc::clone(&written),
        }));
        // LAW 101; TPC; HLT
        load(&mut imlac, 0o40, &[0o004101, 0o001043, 0o000000]);
        let stop = AtomicBool::new(false);
        imlac.run(ExecutionState::Running, &stop);
        for _ in 0..10 {
            imlac.tick().expect("halted machine");
        }
        assert_eq!(*written.lock().expect("lock"), vec![0x41]);
        assert!(imlac.devices().tty.send_ready());
    }

    #[test]
    fn test_memory_image_round_trip() {
        let mut imlac = machine(CpuType::Pds1);
        load(&mut imlac, 0o200, &[0o123456, 0o000001, 0o177777]);
        let path = temp_path("image");
        assert_eq!(imlac.save_memory(&path, 0o200, 3).expect("save"), 3);
        let bytes = fs::read(&path).expect("read back");
        assert_eq!(bytes, vec![0xa7, 0x2e, 0x00, 0x01, 0xff, 0xff]);

        let mut other = machine(CpuType::Pds1);
        // Asking for more than the file holds loads what is there.
        assert_eq!(other.load_memory(&path, 0o300, 10).expect("load"), 3);
        assert_eq!(other.memory().fetch(0o300), 0o123456);
        assert_eq!(other.memory().fetch(0o302), 0o177777);
        assert_eq!(other.memory().fetch(0o303), 0);
        fs::remove_file(&path).expect("clean up");
    }

    #[test]
    fn test_image_errors() {
        let mut imlac = machine(CpuType::Pds1);
        let path = temp_path("no-such-file");
        assert!(matches!(
            imlac.load_memory(&path, 0o40, 1),
            Err(ImageError::Io { .. })
        ));
        assert!(matches!(
            imlac.save_memory(&path, 0o17777, 1),
            Err(ImageError::AddressOutOfRange { .. })
        ));
    }

    #[test]
    fn test_bootstrap() {
        let mut imlac = machine(CpuType::Pds1);
        let path = temp_path("bootstrap");
        let mut bytes = Vec::new();
        for w in [0o004000u16, 0o020100, 0o000000] {
            bytes.extend_from_slice(&w.to_be_bytes());
        }
        fs::write(&path, &bytes).expect("write bootstrap");
        imlac.processor_mut().set_pc(0o1234);
        imlac.bootstrap(&path).expect("load bootstrap");
        fs::remove_file(&path).expect("clean up");
        assert_eq!(imlac.processor().pc(), 0o40);
        assert_eq!(imlac.memory().fetch(0o41), 0o020100);
    }

    #[test]
    fn test_disassembly_listing() {
        let mut imlac = machine(CpuType::Pds1);
        load(&mut imlac, 0o40, &[0o004017, 0o103000]);
        let lines = imlac
            .disassemble(0o40, 2, DisassemblyMode::Processor)
            .expect("in range");
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("000040\\004017 LAW"), "{}", lines[0]);
        assert_eq!(lines[1], "000041\\103000 <invalid instruction>");

        // A PDS-1 long vector occupies three words.
        load(&mut imlac, 0o100, &[0o040000, 0o020003, 0o040001, 0o000000]);
        let lines = imlac
            .disassemble(0o100, 4, DisassemblyMode::DisplayProcessor)
            .expect("in range");
        assert_eq!(lines.len(), 2);
        assert!(lines[1].starts_with("000103\\"), "{}", lines[1]);
    }

    #[test]
    fn test_dump_memory() {
        let mut imlac = machine(CpuType::Pds1);
        load(&mut imlac, 0o100, &[0x4142, 0x0043, 0, 0x7a7a]);
        assert_eq!(
            imlac.dump_memory(0o100, 4),
            vec!["000100: 040502 000103 000000 075172 AB .C .. zz".to_string()]
        );
    }

    #[test]
    fn test_dump_memory_is_limited_to_memory_size() {
        let mut imlac = machine(CpuType::Pds1);
        load(&mut imlac, 0o7776, &[0o1, 0o2]);
        imlac.memory_mut().store(0, 0o7);
        let lines = imlac.dump_memory(0o7774, 0x20000);
        assert_eq!(lines.len(), 4096 / 4);
        assert!(lines[0].starts_with("007774: 000000 000000 000001 000002"));
        // The dump wraps around the top of memory.
        assert!(lines[1].starts_with("010000: 000007 "));
        assert_eq!(lines.last().map(|l| &l[..8]), Some("017770: "));
    }

    #[test]
    fn test_status_and_breakpoint_text() {
        let mut imlac = machine(CpuType::Pds1);
        imlac.memory_mut().store(0o40, 0o004017);
        let status = imlac.status_text();
        assert!(
            status.starts_with("PC=000040 AC=000000 MB=004017 - Halted\nLAW"),
            "{status}"
        );
        assert!(status.contains("DPC=000000"), "{status}");

        assert_eq!(
            imlac.breakpoints_text(),
            "No breakpoints are currently defined.\n\nBreakpoints are disabled globally."
        );
        imlac.set_breakpoint(0o100, BreakpointKinds::READ | BreakpointKinds::WRITE);
        imlac.breakpoints_mut().set_enabled(true);
        assert_eq!(
            imlac.breakpoints_text(),
            "Address 000100, break on Read, Write\n\nBreakpoints are enabled globally."
        );
    }

    #[test]
    fn test_set_memory_size() {
        let mut imlac = machine(CpuType::Pds1);
        imlac.set_memory_size(8192).expect("8K is supported");
        assert_eq!(imlac.memory().size(), 8192);
        assert_eq!(imlac.config().memory_size, 8192);
        assert!(imlac.set_memory_size(1000).is_err());
        assert_eq!(imlac.memory().size(), 8192);
    }

    #[test]
    fn test_reset_keeps_memory() {
        let mut imlac = machine(CpuType::Pds1);
        imlac.memory_mut().store(0o500, 0o1234);
        imlac.processor_mut().set_ac(0o55);
        imlac.reset();
        assert_eq!(imlac.processor().ac(), 0);
        assert_eq!(imlac.processor().pc(), 0o40);
        assert_eq!(imlac.memory().fetch(0o500), 0o1234);
    }
}
