use base::prelude::*;

use super::*;
use crate::console::RecordingConsole;

struct Rig {
    mem: MemoryUnit,
    breakpoints: BreakpointManager,
    console: RecordingConsole,
    display: DisplayProcessor,
}

impl Rig {
    fn new(cpu_type: CpuType) -> Rig {
        Rig {
            mem: MemoryUnit::new(4096).expect("4K is a supported size"),
            breakpoints: BreakpointManager::new(),
            console: RecordingConsole::new(),
            display: DisplayProcessor::new(cpu_type, false),
        }
    }

    fn load(&mut self, address: Word, words: &[Word]) {
        for (offset, w) in (0..).zip(words.iter()) {
            self.mem.store(address + offset, *w);
        }
    }

    fn start_at(&mut self, address: Word) {
        self.display.core_mut().load_pc(address);
        self.display.start(&mut self.console);
    }

    fn clock(&mut self) -> Result<(), Unimplemented> {
        let mut bus = DisplayBus {
            mem: &mut self.mem,
            breakpoints: &self.breakpoints,
            console: &mut self.console,
        };
        self.display.clock(&mut bus)
    }

    fn run_until_halted(&mut self) {
        for _ in 0..100 {
            if self.display.state() == ProcessorState::Halted {
                return;
            }
            if let Err(e) = self.clock() {
                panic!("display program failed: {e}");
            }
        }
        panic!("display did not halt");
    }
}

#[test]
fn test_pds1_long_vector_is_scaled_and_doubled() {
    let mut rig = Rig::new(CpuType::Pds1);
    rig.load(
        0o100,
        &[
            0o010050, // DLXA 050: X = 0o120
            0o020050, // DLYA 050: Y = 0o120
            0o004006, // DSTS 2
            0o040000, // DLVH
            0o020003, // beam on, M = 3
            0o040001, // X negative, N = 1
            0o000000, // DHLT
        ],
    );
    rig.start_at(0o100);
    rig.run_until_halted();

    assert_eq!(rig.console.scale, 2.0);
    let moves = rig.console.moves();
    assert_eq!(
        moves.last().copied(),
        Some((0o120 - 12, 0o120 + 4, DrawingMode::Normal))
    );
    assert_eq!(rig.display.pc(), 0o107);
    assert!(rig.display.halted_flag());
}

#[test]
fn test_pds1_increment_mode() {
    let mut rig = Rig::new(CpuType::Pds1);
    rig.load(
        0o100,
        &[
            0o010000, // DLXA 0
            0o020000, // DLYA 0
            0o030311, // DEIM B+1,+1
            0o144500, // B+1,+1 | ESC
            0o000000, // DHLT
        ],
    );
    rig.start_at(0o100);
    rig.run_until_halted();

    assert_eq!(
        rig.console.moves(),
        vec![
            (0, 0, DrawingMode::Off),
            (0, 0, DrawingMode::Off),
            (2, 2, DrawingMode::Dotted),
            (4, 4, DrawingMode::Dotted),
            (4, 4, DrawingMode::Off),
        ]
    );
    assert_eq!(rig.display.mode(), DisplayMode::Processor);
    assert_eq!(rig.mem.display_usage(0o103), DisplayMode::Increment);
    assert_eq!(rig.mem.display_usage(0o102), DisplayMode::Processor);
    let (text, _) = rig
        .display
        .disassemble(&rig.mem, 0o103, DisplayMode::Indeterminate);
    assert_eq!(text, "INC B+1,+1|ESC");
}

#[test]
fn test_subroutine_call_and_return() {
    let mut rig = Rig::new(CpuType::Pds1);
    rig.load(0o100, &[0o050200, 0o000000]);
    rig.load(0o200, &[0o004040]);
    rig.start_at(0o100);
    rig.clock().expect("DJMS");
    assert_eq!(rig.display.pc(), 0o200);
    assert_eq!(rig.display.stack_top(), 0o101);
    rig.run_until_halted();
    assert_eq!(rig.display.stack_depth(), 0);
    assert_eq!(rig.display.pc(), 0o102);
}

#[test]
fn test_pds1_sgr1_position_returns_from_subroutine() {
    let mut rig = Rig::new(CpuType::Pds1);
    rig.load(
        0o100,
        &[
            0o070777, // SGR1 enabled, return, beam on
            0o050200, // DJMS 200
            0o000000, // DHLT
        ],
    );
    rig.load(0o200, &[0o010050, 0o000000]); // DLXA 050
    rig.start_at(0o100);
    rig.clock().expect("SGR1");
    rig.clock().expect("DJMS");
    assert_eq!(rig.display.pc(), 0o200);
    rig.clock().expect("DLXA");

    assert_eq!(rig.console.moves(), vec![(0o120, 0, DrawingMode::Sgr1)]);
    assert_eq!(rig.display.pc(), 0o102);
    assert_eq!(rig.display.stack_depth(), 0);
    rig.run_until_halted();
    assert_eq!(rig.display.pc(), 0o103);
}

#[test]
fn test_pds1_sgr1_without_beam_moves_dark() {
    let mut rig = Rig::new(CpuType::Pds1);
    rig.load(0o100, &[0o070771, 0o020010, 0o000000]); // SGR1 enabled; DLYA 010
    rig.start_at(0o100);
    rig.run_until_halted();
    assert_eq!(rig.console.moves(), vec![(0, 0o20, DrawingMode::Off)]);
}

#[test]
fn test_pop_on_empty_stack_leaves_pc() {
    let mut display = DisplayProcessor::new(CpuType::Pds1, false);
    display.core_mut().load_pc(0o1234);
    display.pop();
    assert_eq!(display.pc(), 0o1234);
}

#[test]
fn test_stack_is_bounded() {
    let mut display = DisplayProcessor::new(CpuType::Pds4, false);
    for pc in 0..(STACK_DEPTH as Word + 3) {
        display.core_mut().pc = pc;
        display.push();
    }
    assert_eq!(display.stack_depth(), STACK_DEPTH);
    assert_eq!(display.stack_top(), STACK_DEPTH as Word + 3);
}

#[test]
fn test_frame_latch() {
    let mut rig = Rig::new(CpuType::Pds1);
    for _ in 0..PDS1_FRAME_PERIOD {
        rig.clock().expect("halted display does nothing");
    }
    assert!(!rig.display.frame_latch());
    rig.clock().expect("halted display does nothing");
    assert!(rig.display.frame_latch());
    assert_eq!(rig.console.frames, 1);

    let (mut ac, mut pc) = (0, 0o100);
    let mut ctx = IotContext {
        ac: &mut ac,
        pc: &mut pc,
        console: &mut rig.console,
    };
    rig.display
        .execute_iot(0o71, &mut ctx)
        .expect("DCF is implemented");
    assert!(!rig.display.frame_latch());
}

#[test]
fn test_display_breakpoint() {
    let mut rig = Rig::new(CpuType::Pds1);
    rig.load(0o100, &[0o010000, 0o020000, 0o000000]);
    rig.breakpoints.set(0o101, BreakpointKinds::DISPLAY);
    rig.breakpoints.set_enabled(true);
    rig.start_at(0o100);
    rig.clock().expect("DLXA");
    assert_eq!(rig.display.state(), ProcessorState::BreakpointHalt);
    assert_eq!(rig.display.breakpoint_address(), Some(0o101));
    rig.display.resume_from_breakpoint();
    assert_eq!(rig.display.state(), ProcessorState::Running);
}

#[test]
fn test_undecodable_instruction() {
    let mut rig = Rig::new(CpuType::Pds1);
    rig.load(0o100, &[0o070000]);
    rig.start_at(0o100);
    let err = rig.clock().expect_err("070000 is not a PDS-1 display instruction");
    assert_eq!(err.address, 0o100);
}

#[test]
fn test_pds4_iots_start_display() {
    let mut rig = Rig::new(CpuType::Pds4);
    let (mut ac, mut pc) = (0o2100, 0o40);
    let mut ctx = IotContext {
        ac: &mut ac,
        pc: &mut pc,
        console: &mut rig.console,
    };
    rig.display
        .execute_iot(0o3, &mut ctx)
        .expect("DLA is implemented");
    assert!(rig.display.is_running());
    assert_eq!(rig.display.pc(), 0o2100);
    assert_eq!(rig.display.pc_entry(), 0o2100);
    assert_eq!(rig.console.intensity, 16);
}

#[test]
fn test_pds4_long_vector_with_return() {
    let mut rig = Rig::new(CpuType::Pds4);
    rig.load(0o100, &[0o010100, 0o020100, 0o050200, 0o000000]);
    rig.load(0o200, &[0o040002, 0o110001]);
    rig.start_at(0o100);
    rig.run_until_halted();
    assert_eq!(
        rig.console.moves().last().copied(),
        Some((0o104, 0o102, DrawingMode::Normal))
    );
    assert_eq!(rig.display.pc(), 0o104);
}

#[test]
fn test_pds4_long_vector_modes() {
    let mut rig = Rig::new(CpuType::Pds4);
    rig.load(
        0o100,
        &[
            0o010100, // DLXA 100
            0o020100, // DLYA 100
            0o040002, // DLVH M=4
            0o050001, // dotted, beam on, N=2
            0o040002, // DLVH M=4
            0o030001, // dashed, beam on, N=2
            0o040002, // DLVH M=4
            0o014001, // beam on, M is Y, N=2
            0o000000, // DHLT
        ],
    );
    rig.start_at(0o100);
    rig.run_until_halted();
    assert_eq!(
        rig.console.moves(),
        vec![
            (0o100, 0, DrawingMode::Off),
            (0o100, 0o100, DrawingMode::Off),
            (0o104, 0o102, DrawingMode::Dotted),
            // Dashing is not emulated.
            (0o110, 0o104, DrawingMode::Normal),
            (0o112, 0o110, DrawingMode::Normal),
        ]
    );
    assert_eq!(rig.display.pc(), 0o111);
}

#[test]
fn test_pds4_dfxy_position_returns_from_subroutine() {
    let mut rig = Rig::new(CpuType::Pds4);
    rig.load(
        0o100,
        &[
            0o077777, // DFXY enabled, return, beam on
            0o050200, // DJMS 200
            0o000000, // DHLT
        ],
    );
    rig.load(0o200, &[0o020100, 0o000000]); // DLYA 100
    rig.start_at(0o100);
    rig.clock().expect("DFXY");
    rig.clock().expect("DJMS");
    rig.clock().expect("DLYA");

    assert_eq!(rig.console.moves(), vec![(0, 0o100, DrawingMode::Sgr1)]);
    assert_eq!(rig.display.pc(), 0o102);
    assert_eq!(rig.display.stack_depth(), 0);
}

#[test]
fn test_pds4_intensity_and_blink() {
    let mut rig = Rig::new(CpuType::Pds4);
    rig.load(
        0o100,
        &[
            0o077725, // DVIC 5
            0o077623, // DBLI 1
            0o077622, // DBLI 0
            0o077737, // DVIC 17
            0o000000, // DHLT
        ],
    );
    rig.start_at(0o100);
    assert_eq!(rig.console.intensity, 16);
    assert!(!rig.console.blink);

    rig.clock().expect("DVIC");
    assert_eq!(rig.console.intensity, 5);
    rig.clock().expect("DBLI");
    assert!(rig.console.blink);
    rig.clock().expect("DBLI");
    assert!(!rig.console.blink);
    rig.clock().expect("DVIC");
    assert_eq!(rig.console.intensity, 0o17);
    rig.run_until_halted();
    assert_eq!(rig.display.pc(), 0o105);
}

#[test]
fn test_pds4_compact_addressing() {
    let mut rig = Rig::new(CpuType::Pds4);
    rig.load(
        0o100,
        &[
            0o077621, // DCAM
            0o000400, // table base
            0o000001, // call entries 0 and 1
            0o177400, // end
            0o000000, // DHLT
        ],
    );
    rig.load(0o400, &[0o300, 0o310]);
    rig.load(0o300, &[0o010010, 0o004040]); // DLXA 010; DRJM
    rig.load(0o310, &[0o020020, 0o004040]); // DLYA 020; DRJM
    rig.start_at(0o100);

    rig.clock().expect("DCAM");
    assert_eq!(rig.display.mode(), DisplayMode::CompactAddressing);
    rig.clock().expect("first call");
    assert_eq!(rig.display.pc(), 0o300);
    assert_eq!(rig.display.stack_top(), 0o102);

    rig.run_until_halted();
    assert_eq!(rig.display.x(), 0o10);
    assert_eq!(rig.display.y(), 0o20);
    assert_eq!(rig.display.stack_depth(), 0);
    assert_eq!(rig.display.pc(), 0o105);
    assert_eq!(rig.mem.display_usage(0o103), DisplayMode::CompactAddressing);
}

#[test]
fn test_pds4_misaligned_compact_table() {
    let mut rig = Rig::new(CpuType::Pds4);
    rig.load(0o100, &[0o077621, 0o000401, 0o177400]);
    rig.start_at(0o100);
    assert!(rig.clock().is_err());
    assert_eq!(rig.display.mode(), DisplayMode::Processor);
}

#[test]
fn test_pds4_dopr_scale_and_block() {
    let mut rig = Rig::new(CpuType::Pds4);
    // DSTS 1 with bit 5; DSTB 2 with bit 5; DHLT.
    rig.load(0o100, &[0o006005, 0o006012, 0o000000]);
    rig.start_at(0o100);
    rig.run_until_halted();
    assert_eq!(rig.display.scale(), 5);
    assert_eq!(rig.display.core().block, 6 << 12);
}
