//! Modifier key definitions and state tracking
//!
//! Provides constants for the macOS modifier key flags and a struct
//! for tracking which modifiers are held across all keyboards.

/// Modifier key flag masks
///
/// Values match the device-independent bits of `CGEventFlags`, so flags
/// read from a Quartz event can be used directly.
pub mod flags {
    /// Caps Lock (never rewritten, only passed through)
    pub const CAPS_LOCK: u64 = 0x0001_0000;
    /// Shift key modifier flag
    pub const SHIFT: u64 = 0x0002_0000;
    /// Control key modifier flag
    pub const CONTROL: u64 = 0x0004_0000;
    /// Option/Alt key modifier flag
    pub const OPTION: u64 = 0x0008_0000;
    /// Command key modifier flag
    pub const COMMAND: u64 = 0x0010_0000;

    /// Every modifier the normalizer can track
    pub const ALL_MODIFIERS: u64 = CONTROL | SHIFT | COMMAND | OPTION;
}

/// Tracks which modifier keys are currently held, on any keyboard
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModifierState {
    /// Control key is held
    pub control: bool,
    /// Shift key is held
    pub shift: bool,
    /// Command key is held
    pub command: bool,
    /// Option/Alt key is held
    pub option: bool,
}

impl ModifierState {
    /// Project a raw flag mask onto the four tracked modifiers
    pub fn from_flags(bits: u64) -> Self {
        Self {
            control: bits & flags::CONTROL != 0,
            shift: bits & flags::SHIFT != 0,
            command: bits & flags::COMMAND != 0,
            option: bits & flags::OPTION != 0,
        }
    }

    /// Flag bits implied by this state
    pub fn to_flags(self) -> u64 {
        let mut bits = 0;
        if self.control {
            bits |= flags::CONTROL;
        }
        if self.shift {
            bits |= flags::SHIFT;
        }
        if self.command {
            bits |= flags::COMMAND;
        }
        if self.option {
            bits |= flags::OPTION;
        }
        bits
    }

    /// Check if all modifiers are released
    pub fn is_empty(&self) -> bool {
        !self.control && !self.shift && !self.command && !self.option
    }
}
