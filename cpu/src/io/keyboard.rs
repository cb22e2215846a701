//! The Imlac keyboard.
//!
//! The console tells us when a key has been pressed; the keyboard
//! latches a "key ready" flag until the program clears it with an
//! IOT.  The code the program reads is a 7-bit character code with
//! bit 0o200 set and the modifier keys in the bits above that.
use std::fmt::{self, Display, Formatter};
use std::ops::BitOr;

use tracing::{event, Level};

use base::prelude::*;

use super::{IotContext, IotDevice};
use crate::console::Console;
use crate::error::Unimplemented;

/// The keys of the Imlac keyboard.
///
/// The discriminant of each key is the code it produces when shift
/// is not held.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ImlacKey {
    #[default]
    None = 0,
    DataXmit = 0o2,
    Down = 0o4,
    Right = 0o5,
    Up = 0o6,
    Left = 0o10,
    Tab = 0o11,
    Lf = 0o12,
    Ff = 0o14,
    Cr = 0o15,
    PageXmit = 0o16,
    Home = 0o17,
    D0 = 0o30,
    Brk = 0o31,
    D2 = 0o32,
    Esc = 0o33,
    D4 = 0o34,
    D5 = 0o35,
    D6 = 0o36,
    Unlabeled = 0o37,
    Space = 0o40,
    Comma = 0o54,
    Minus = 0o55,
    Period = 0o56,
    Slash = 0o57,
    K0 = 0o60,
    K1 = 0o61,
    K2 = 0o62,
    K3 = 0o63,
    K4 = 0o64,
    K5 = 0o65,
    K6 = 0o66,
    K7 = 0o67,
    K8 = 0o70,
    K9 = 0o71,
    Colon = 0o72,
    Semicolon = 0o73,
    A = 0o141,
    B = 0o142,
    C = 0o143,
    D = 0o144,
    E = 0o145,
    F = 0o146,
    G = 0o147,
    H = 0o150,
    I = 0o151,
    J = 0o152,
    K = 0o153,
    L = 0o154,
    M = 0o155,
    N = 0o156,
    O = 0o157,
    P = 0o160,
    Q = 0o161,
    R = 0o162,
    S = 0o163,
    T = 0o164,
    U = 0o165,
    V = 0o166,
    W = 0o167,
    X = 0o170,
    Y = 0o171,
    Z = 0o172,
    Del = 0o177,
    Invalid = 0o377,
}

impl ImlacKey {
    /// The character code produced by the key with shift up.
    #[must_use]
    pub fn normal_code(self) -> Word {
        self as Word
    }

    /// The character code produced by the key with shift down, if
    /// shift changes it.
    #[must_use]
    pub fn shifted_code(self) -> Option<Word> {
        use ImlacKey::*;
        let code = self as Word;
        match self {
            Comma | Minus | Period | Slash => Some(code + 0o20),
            K1 | K2 | K3 | K4 | K5 | K6 | K7 | K8 | K9 => Some(code - 0o20),
            Colon | Semicolon => Some(code - 0o20),
            A | B | C | D | E | F | G | H | I | J | K | L | M | N | O | P | Q | R | S | T
            | U | V | W | X | Y | Z => Some(code - 0o40),
            _ => Option::None,
        }
    }

    /// The code a program reads for this key given the modifier
    /// keys held down with it.
    #[must_use]
    pub fn scancode(self, modifiers: KeyModifiers) -> Word {
        if self == ImlacKey::Invalid {
            return 0;
        }
        let code = if modifiers.contains(KeyModifiers::SHIFT) {
            self.shifted_code().unwrap_or_else(|| self.normal_code())
        } else {
            self.normal_code()
        };
        code | 0o200 | modifiers.bits()
    }
}

/// The modifier keys, in the bit positions a program sees them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct KeyModifiers(Word);

impl KeyModifiers {
    pub const NONE: KeyModifiers = KeyModifiers(0);
    pub const SHIFT: KeyModifiers = KeyModifiers(0x100);
    pub const CTRL: KeyModifiers = KeyModifiers(0x200);
    pub const REPEAT: KeyModifiers = KeyModifiers(0x400);

    #[must_use]
    pub fn bits(&self) -> Word {
        self.0
    }

    #[must_use]
    pub fn contains(&self, other: KeyModifiers) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for KeyModifiers {
    type Output = KeyModifiers;

    fn bitor(self, rhs: KeyModifiers) -> KeyModifiers {
        KeyModifiers(self.0 | rhs.0)
    }
}

impl Display for KeyModifiers {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        let mut names = Vec::new();
        for (bit, name) in [
            (KeyModifiers::SHIFT, "Shift"),
            (KeyModifiers::CTRL, "Ctrl"),
            (KeyModifiers::REPEAT, "Rept"),
        ] {
            if self.contains(bit) {
                names.push(name);
            }
        }
        f.write_str(&names.join("+"))
    }
}

const KRB: Word = 0o21;
const KCF: Word = 0o22;
const KRC: Word = 0o23;

#[derive(Debug, Default)]
pub struct Keyboard {
    ready: bool,
}

impl Keyboard {
    #[must_use]
    pub fn new() -> Keyboard {
        Keyboard { ready: false }
    }

    #[must_use]
    pub fn ready(&self) -> bool {
        self.ready
    }

    pub fn clock(&mut self, console: &dyn Console) {
        if !self.ready && console.new_key_pressed() {
            event!(
                target: "imlac::keyboard",
                Level::DEBUG,
                "key {:?} ({}) is ready",
                console.key(),
                console.key_modifiers()
            );
            self.ready = true;
        }
    }

    fn read_key(ctx: &mut IotContext<'_>) {
        let code = ctx.console.key().scancode(ctx.console.key_modifiers());
        *ctx.ac |= code;
    }

    fn clear_ready(&mut self, ctx: &mut IotContext<'_>) {
        self.ready = false;
        ctx.console.unlatch_key();
    }
}

impl IotDevice for Keyboard {
    fn name(&self) -> &'static str {
        "Keyboard"
    }

    fn handled_iots(&self) -> &'static [Word] {
        &[KRB, KCF, KRC]
    }

    fn execute_iot(&mut self, code: Word, ctx: &mut IotContext<'_>) -> Result<(), Unimplemented> {
        match code {
            KRB => Keyboard::read_key(ctx),
            KCF => self.clear_ready(ctx),
            KRC => {
                Keyboard::read_key(ctx);
                self.clear_ready(ctx);
            }
            _ => {
                return Err(Unimplemented::new(
                    *ctx.pc,
                    format!("keyboard IOT {}", Octal(code)),
                ));
            }
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.ready = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::RecordingConsole;

    #[test]
    fn test_scancodes() {
        assert_eq!(ImlacKey::A.scancode(KeyModifiers::NONE), 0o341);
        assert_eq!(ImlacKey::A.scancode(KeyModifiers::SHIFT), 0x100 | 0o200 | 0o101);
        // Keys without a shifted code keep their normal code.
        assert_eq!(
            ImlacKey::Cr.scancode(KeyModifiers::SHIFT | KeyModifiers::CTRL),
            0x300 | 0o200 | 0o15
        );
        assert_eq!(ImlacKey::K1.scancode(KeyModifiers::SHIFT), 0x100 | 0o200 | 0o41);
        assert_eq!(ImlacKey::K0.scancode(KeyModifiers::SHIFT), 0x100 | 0o200 | 0o60);
        assert_eq!(ImlacKey::Comma.scancode(KeyModifiers::SHIFT), 0x100 | 0o200 | 0o74);
        assert_eq!(ImlacKey::Invalid.scancode(KeyModifiers::REPEAT), 0);
    }

    #[test]
    fn test_ready_latch_and_read() {
        let mut console = RecordingConsole::new();
        let mut kbd = Keyboard::new();
        kbd.clock(&console);
        assert!(!kbd.ready());

        console.press(ImlacKey::Space, KeyModifiers::NONE);
        kbd.clock(&console);
        assert!(kbd.ready());

        let mut ac: Word = 0o100000;
        let mut pc: Word = 0o40;
        let mut ctx = IotContext {
            ac: &mut ac,
            pc: &mut pc,
            console: &mut console,
        };
        kbd.execute_iot(KRC, &mut ctx).expect("KRC is implemented");
        assert!(!kbd.ready());
        assert_eq!(ac, 0o100000 | 0o240);
        assert!(!console.new_key_pressed());
    }
}
