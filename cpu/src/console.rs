//! The operator's console: the display screen, the keyboard and
//! the data switches.
//!
//! The emulator core draws on the screen and reads the keyboard only
//! through the [`Console`] trait.  A graphical front end would
//! implement it on top of its renderer; [`HeadlessConsole`] keeps a
//! record of what was drawn instead, which is what the command-line
//! runner (and the tests) use.
//!
//! The keyboard and data switch state of a [`HeadlessConsole`] lives
//! behind an [`InputHandle`], which may be cloned and handed to
//! another thread.  That thread can press keys and flip switches
//! while the emulator is running.
use std::collections::BTreeSet;
use std::fmt::{self, Display, Formatter};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{event, Level};

use base::prelude::*;

use crate::io::keyboard::{ImlacKey, KeyModifiers};

/// How the beam is to behave while it moves to a new position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawingMode {
    /// Beam off; just move.
    Off,
    Normal,
    Dotted,
    /// The PDS-1 SGR-1 option's reduced intensity.
    Sgr1,
    Point,
}

impl Display for DrawingMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        f.write_str(match self {
            DrawingMode::Off => "Off",
            DrawingMode::Normal => "Normal",
            DrawingMode::Dotted => "Dotted",
            DrawingMode::Sgr1 => "SGR-1",
            DrawingMode::Point => "Point",
        })
    }
}

/// Where a data switch takes its value from when data switch
/// mapping is enabled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DataSwitchSource {
    #[default]
    Zero,
    One,
    Key(ImlacKey),
}

/// Whether a data switch mapped to a key follows the key (Momentary)
/// or flips each time the key is pressed (Toggle).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DataSwitchMappingMode {
    #[default]
    Momentary,
    Toggle,
}

pub const DATA_SWITCH_COUNT: usize = 16;

pub trait Console {
    /// True when a key has been pressed and not yet unlatched.
    fn new_key_pressed(&self) -> bool;
    fn key(&self) -> ImlacKey;
    fn key_modifiers(&self) -> KeyModifiers;
    fn unlatch_key(&mut self);

    fn data_switches(&self) -> Word;
    fn set_data_switches(&mut self, value: Word);

    /// When true, the main processor takes its data switch value from
    /// the console on every cycle.
    fn data_switch_mapping_enabled(&self) -> bool;

    /// `switch` 0 is the most significant data switch.
    fn map_data_switch(&mut self, switch: usize, source: DataSwitchSource) {
        event!(
            Level::WARN,
            "this console does not support mapping data switch {} to {:?}",
            switch,
            source
        );
    }

    fn clear_display(&mut self);
    fn move_absolute(&mut self, x: Word, y: Word, mode: DrawingMode);
    fn draw_point(&mut self, x: Word, y: Word);

    /// Shows what has been drawn so far.  `complete` is false when
    /// the frame is only partly drawn (for example when single
    /// stepping).
    fn render_current(&mut self, complete: bool);
    fn frame_done(&mut self);
    fn set_scale(&mut self, scale: f32);

    /// PDS-4 beam intensity.  The display starts at 16, full
    /// brightness.
    fn set_intensity(&mut self, _intensity: Word) {}
    fn set_blink(&mut self, _on: bool) {}
}

/// One drawing operation recorded by [`HeadlessConsole`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DrawOp {
    Clear,
    Move { x: Word, y: Word, mode: DrawingMode },
    Point { x: Word, y: Word },
}

#[derive(Debug, Default)]
struct InputState {
    key: ImlacKey,
    modifiers: KeyModifiers,
    key_latched: bool,
    held: BTreeSet<ImlacKey>,
    data_switches: Word,
    mapping_enabled: bool,
    mapping_mode: DataSwitchMappingMode,
    mapping: [DataSwitchSource; DATA_SWITCH_COUNT],
    toggled: [bool; DATA_SWITCH_COUNT],
}

impl InputState {
    fn mapped_data_switches(&self) -> Word {
        self.mapping
            .iter()
            .enumerate()
            .fold(0, |acc, (switch, source)| {
                let on = match source {
                    DataSwitchSource::Zero => false,
                    DataSwitchSource::One => true,
                    DataSwitchSource::Key(key) => match self.mapping_mode {
                        DataSwitchMappingMode::Momentary => self.held.contains(key),
                        DataSwitchMappingMode::Toggle => self.toggled[switch],
                    },
                };
                (acc << 1) | Word::from(on)
            })
    }
}

/// The keyboard and data switch state of a [`HeadlessConsole`].
///
/// Poisoned locks are recovered from, since the state is a handful
/// of plain values that cannot be left inconsistent.
#[derive(Debug, Clone, Default)]
pub struct InputHandle {
    state: Arc<RwLock<InputState>>,
}

impl InputHandle {
    fn read(&self) -> RwLockReadGuard<'_, InputState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, InputState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn press_key(&self, key: ImlacKey, modifiers: KeyModifiers) {
        let mut state = self.write();
        state.key = key;
        state.modifiers = modifiers;
        state.key_latched = true;
        if state.held.insert(key) && state.mapping_mode == DataSwitchMappingMode::Toggle {
            for switch in 0..DATA_SWITCH_COUNT {
                if state.mapping[switch] == DataSwitchSource::Key(key) {
                    state.toggled[switch] = !state.toggled[switch];
                }
            }
        }
    }

    pub fn release_key(&self, key: ImlacKey) {
        self.write().held.remove(&key);
    }

    pub fn set_data_switches(&self, value: Word) {
        self.write().data_switches = value;
    }

    pub fn set_data_switch_mapping_enabled(&self, enabled: bool) {
        self.write().mapping_enabled = enabled;
    }

    pub fn set_data_switch_mapping_mode(&self, mode: DataSwitchMappingMode) {
        let mut state = self.write();
        state.mapping_mode = mode;
        state.toggled = [false; DATA_SWITCH_COUNT];
    }
}

/// A console with no screen.  It keeps the drawing operations of the
/// frame being drawn and of the last completed frame.
#[derive(Debug)]
pub struct HeadlessConsole {
    input: InputHandle,
    current_frame: Vec<DrawOp>,
    last_frame: Vec<DrawOp>,
    frames_completed: u64,
    scale: f32,
    intensity: Word,
    blink: bool,
}

impl HeadlessConsole {
    #[must_use]
    pub fn new() -> HeadlessConsole {
        HeadlessConsole {
            input: InputHandle::default(),
            current_frame: Vec::new(),
            last_frame: Vec::new(),
            frames_completed: 0,
            scale: 1.0,
            intensity: 0,
            blink: false,
        }
    }

    /// Returns a handle through which another thread can operate the
    /// keyboard and the data switches.
    #[must_use]
    pub fn input_handle(&self) -> InputHandle {
        self.input.clone()
    }

    #[must_use]
    pub fn frames_completed(&self) -> u64 {
        self.frames_completed
    }

    #[must_use]
    pub fn current_frame(&self) -> &[DrawOp] {
        &self.current_frame
    }

    #[must_use]
    pub fn last_frame(&self) -> &[DrawOp] {
        &self.last_frame
    }

    #[must_use]
    pub fn scale(&self) -> f32 {
        self.scale
    }

    #[must_use]
    pub fn intensity(&self) -> Word {
        self.intensity
    }

    #[must_use]
    pub fn blink(&self) -> bool {
        self.blink
    }
}

impl Default for HeadlessConsole {
    fn default() -> HeadlessConsole {
        HeadlessConsole::new()
    }
}

impl Console for HeadlessConsole {
    fn new_key_pressed(&self) -> bool {
        self.input.read().key_latched
    }

    fn key(&self) -> ImlacKey {
        self.input.read().key
    }

    fn key_modifiers(&self) -> KeyModifiers {
        self.input.read().modifiers
    }

    fn unlatch_key(&mut self) {
        self.input.write().key_latched = false;
    }

    fn data_switches(&self) -> Word {
        let state = self.input.read();
        if state.mapping_enabled {
            state.mapped_data_switches()
        } else {
            state.data_switches
        }
    }

    fn set_data_switches(&mut self, value: Word) {
        self.input.set_data_switches(value);
    }

    fn data_switch_mapping_enabled(&self) -> bool {
        self.input.read().mapping_enabled
    }

    fn map_data_switch(&mut self, switch: usize, source: DataSwitchSource) {
        match self.input.write().mapping.get_mut(switch) {
            Some(slot) => *slot = source,
            None => {
                event!(Level::WARN, "there is no data switch {}", switch);
            }
        }
    }

    fn clear_display(&mut self) {
        self.current_frame.clear();
        self.current_frame.push(DrawOp::Clear);
    }

    fn move_absolute(&mut self, x: Word, y: Word, mode: DrawingMode) {
        self.current_frame.push(DrawOp::Move { x, y, mode });
    }

    fn draw_point(&mut self, x: Word, y: Word) {
        self.current_frame.push(DrawOp::Point { x, y });
    }

    fn render_current(&mut self, complete: bool) {
        event!(
            target: "imlac::display",
            Level::TRACE,
            "render ({} operations, complete={})",
            self.current_frame.len(),
            complete
        );
    }

    fn frame_done(&mut self) {
        self.frames_completed += 1;
        self.last_frame = std::mem::take(&mut self.current_frame);
    }

    fn set_scale(&mut self, scale: f32) {
        self.scale = scale;
    }

    fn set_intensity(&mut self, intensity: Word) {
        self.intensity = intensity;
    }

    fn set_blink(&mut self, on: bool) {
        self.blink = on;
    }
}

/// A console for unit tests: everything is a public field.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct RecordingConsole {
    pub ops: Vec<DrawOp>,
    pub frames: u64,
    pub scale: f32,
    pub intensity: Word,
    pub blink: bool,
    pub key: ImlacKey,
    pub modifiers: KeyModifiers,
    pub key_latched: bool,
    pub data_switches: Word,
    pub mapping_enabled: bool,
}

#[cfg(test)]
impl RecordingConsole {
    pub fn new() -> RecordingConsole {
        RecordingConsole {
            scale: 1.0,
            ..RecordingConsole::default()
        }
    }

    pub fn press(&mut self, key: ImlacKey, modifiers: KeyModifiers) {
        self.key = key;
        self.modifiers = modifiers;
        self.key_latched = true;
    }

    /// The positions of the moves drawn so far, with their modes.
    pub fn moves(&self) -> Vec<(Word, Word, DrawingMode)> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::Move { x, y, mode } => Some((*x, *y, *mode)),
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
impl Console for RecordingConsole {
    fn new_key_pressed(&self) -> bool {
        self.key_latched
    }

    fn key(&self) -> ImlacKey {
        self.key
    }

    fn key_modifiers(&self) -> KeyModifiers {
        self.modifiers
    }

    fn unlatch_key(&mut self) {
        self.key_latched = false;
    }

    fn data_switches(&self) -> Word {
        self.data_switches
    }

    fn set_data_switches(&mut self, value: Word) {
        self.data_switches = value;
    }

    fn data_switch_mapping_enabled(&self) -> bool {
        self.mapping_enabled
    }

    fn clear_display(&mut self) {
        self.ops.push(DrawOp::Clear);
    }

    fn move_absolute(&mut self, x: Word, y: Word, mode: DrawingMode) {
        self.ops.push(DrawOp::Move { x, y, mode });
    }

    fn draw_point(&mut self, x: Word, y: Word) {
        self.ops.push(DrawOp::Point { x, y });
    }

    fn render_current(&mut self, _complete: bool) {}

    fn frame_done(&mut self) {
        self.frames += 1;
    }

    fn set_scale(&mut self, scale: f32) {
        self.scale = scale;
    }

    fn set_intensity(&mut self, intensity: Word) {
        self.intensity = intensity;
    }

    fn set_blink(&mut self, on: bool) {
        self.blink = on;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_recording() {
        let mut console = HeadlessConsole::new();
        console.move_absolute(0o100, 0o200, DrawingMode::Normal);
        console.draw_point(0o100, 0o200);
        assert_eq!(console.current_frame().len(), 2);
        console.frame_done();
        assert_eq!(console.frames_completed(), 1);
        assert!(console.current_frame().is_empty());
        assert_eq!(
            console.last_frame(),
            &[
                DrawOp::Move {
                    x: 0o100,
                    y: 0o200,
                    mode: DrawingMode::Normal
                },
                DrawOp::Point { x: 0o100, y: 0o200 },
            ]
        );
    }

    #[test]
    fn test_key_latch_through_handle() {
        let mut console = HeadlessConsole::new();
        let input = console.input_handle();
        assert!(!console.new_key_pressed());
        let presser = std::thread::spawn(move || {
            input.press_key(ImlacKey::Q, KeyModifiers::CTRL);
        });
        presser.join().expect("key press thread should not panic");
        assert!(console.new_key_pressed());
        assert_eq!(console.key(), ImlacKey::Q);
        assert_eq!(console.key_modifiers(), KeyModifiers::CTRL);
        console.unlatch_key();
        assert!(!console.new_key_pressed());
    }

    #[test]
    fn test_momentary_data_switch_mapping() {
        let mut console = HeadlessConsole::new();
        let input = console.input_handle();
        input.set_data_switches(0o123);
        assert_eq!(console.data_switches(), 0o123);

        console.map_data_switch(0, DataSwitchSource::One);
        console.map_data_switch(15, DataSwitchSource::Key(ImlacKey::Space));
        input.set_data_switch_mapping_enabled(true);
        assert!(console.data_switch_mapping_enabled());
        assert_eq!(console.data_switches(), 0o100000);
        input.press_key(ImlacKey::Space, KeyModifiers::NONE);
        assert_eq!(console.data_switches(), 0o100001);
        input.release_key(ImlacKey::Space);
        assert_eq!(console.data_switches(), 0o100000);
    }

    #[test]
    fn test_toggle_data_switch_mapping() {
        let mut console = HeadlessConsole::new();
        let input = console.input_handle();
        console.map_data_switch(14, DataSwitchSource::Key(ImlacKey::A));
        input.set_data_switch_mapping_mode(DataSwitchMappingMode::Toggle);
        input.set_data_switch_mapping_enabled(true);
        input.press_key(ImlacKey::A, KeyModifiers::NONE);
        input.release_key(ImlacKey::A);
        assert_eq!(console.data_switches(), 0o2);
        input.press_key(ImlacKey::A, KeyModifiers::NONE);
        input.release_key(ImlacKey::A);
        assert_eq!(console.data_switches(), 0);
    }
}
