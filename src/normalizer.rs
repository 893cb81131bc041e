//! Cross-keyboard modifier normalization
//!
//! macOS keeps modifier state per device, so Control held on one keyboard
//! does not apply to a key pressed on another. The normalizer keeps a
//! single view of the modifiers, updated from every flags-changed event,
//! and stamps it onto each key press and release.

use tracing::{debug, trace};

use crate::modifiers::{flags, ModifierState};

/// Kind of input event delivered by the event tap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// The set of held modifier keys changed
    FlagsChanged,
    /// A non-modifier key was pressed
    KeyDown,
    /// A non-modifier key was released
    KeyUp,
    /// Anything else; never inspected
    Other,
}

/// An input event as seen by the handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputEvent {
    pub kind: EventKind,
    /// Virtual key code, carried for diagnostics only
    pub key_code: u16,
    /// Modifier flag mask reported by the originating device
    pub flags: u64,
}

impl InputEvent {
    pub fn new(kind: EventKind, key_code: u16, flags: u64) -> Self {
        Self {
            kind,
            key_code,
            flags,
        }
    }
}

/// Handles each event delivered by an event tap
///
/// Calls are serial and never reentrant. The returned event replaces the
/// original in the input stream.
pub trait EventHandler {
    fn handle(&mut self, event: InputEvent) -> InputEvent;
}

/// Shares modifier state across all attached keyboards
#[derive(Debug, Clone)]
pub struct Normalizer {
    /// Union of modifiers from the most recent flags-changed event
    state: ModifierState,
    /// Modifier bits stamped onto key events
    tracked: u64,
}

impl Normalizer {
    /// Event kinds the tap must register for
    pub const EVENT_KINDS: [EventKind; 3] =
        [EventKind::FlagsChanged, EventKind::KeyDown, EventKind::KeyUp];

    /// Create a normalizer that tracks all four modifiers
    pub fn new() -> Self {
        Self::with_tracked(flags::ALL_MODIFIERS)
    }

    /// Create a normalizer that only stamps the modifiers in `mask`
    ///
    /// Modifiers outside the mask are left as the originating keyboard
    /// reported them.
    pub fn with_tracked(mask: u64) -> Self {
        Self {
            state: ModifierState::default(),
            tracked: mask & flags::ALL_MODIFIERS,
        }
    }

    /// Current modifier state
    pub fn state(&self) -> ModifierState {
        self.state
    }

    fn update_state(&mut self, reported: u64) {
        let new_state = ModifierState::from_flags(reported);
        if new_state != self.state {
            debug!(old = ?self.state, new = ?new_state, "modifier state changed");
            if new_state.is_empty() {
                debug!("all modifiers released");
            }
        }
        self.state = new_state;
    }

    fn stamp(&self, reported: u64) -> u64 {
        (self.state.to_flags() & self.tracked) | (reported & !self.tracked)
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl EventHandler for Normalizer {
    fn handle(&mut self, mut event: InputEvent) -> InputEvent {
        match event.kind {
            EventKind::FlagsChanged => self.update_state(event.flags),
            EventKind::KeyDown | EventKind::KeyUp => {
                let stamped = self.stamp(event.flags);
                if stamped != event.flags {
                    trace!(
                        kind = ?event.kind,
                        key_code = event.key_code,
                        reported = event.flags,
                        stamped,
                        "rewrote key event flags"
                    );
                }
                event.flags = stamped;
            }
            EventKind::Other => {}
        }
        event
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY_C: u16 = 8;
    /// Device-dependent left-control bit (NX_DEVICELCTLKEYMASK)
    const DEVICE_LEFT_CONTROL: u64 = 0x0000_0001;
    /// Numeric pad and non-coalesced bits
    const NUMERIC_PAD: u64 = 0x0020_0000;
    const NON_COALESCED: u64 = 0x0000_0100;

    fn flags_changed(bits: u64) -> InputEvent {
        InputEvent::new(EventKind::FlagsChanged, 59, bits)
    }

    fn key_down(bits: u64) -> InputEvent {
        InputEvent::new(EventKind::KeyDown, KEY_C, bits)
    }

    fn key_up(bits: u64) -> InputEvent {
        InputEvent::new(EventKind::KeyUp, KEY_C, bits)
    }

    #[test]
    fn test_initial_state_is_empty() {
        let normalizer = Normalizer::new();
        assert!(normalizer.state().is_empty());
    }

    #[test]
    fn test_key_event_without_modifiers_is_unchanged() {
        let mut normalizer = Normalizer::new();
        let event = key_down(flags::CAPS_LOCK);
        assert_eq!(normalizer.handle(event), event);
    }

    #[test]
    fn test_non_modifier_bits_pass_through() {
        let mut normalizer = Normalizer::new();
        normalizer.handle(flags_changed(flags::COMMAND));

        let passthrough = flags::CAPS_LOCK | DEVICE_LEFT_CONTROL | NUMERIC_PAD | NON_COALESCED;
        for event in [key_down(passthrough), key_up(passthrough | flags::SHIFT)] {
            let out = normalizer.handle(event);
            assert_eq!(out.flags & !flags::ALL_MODIFIERS, passthrough);
            assert_eq!(out.flags & flags::ALL_MODIFIERS, flags::COMMAND);
            assert_eq!(out.key_code, event.key_code);
            assert_eq!(out.kind, event.kind);
        }
    }

    #[test]
    fn test_flags_changed_replaces_whole_state() {
        let mut normalizer = Normalizer::new();
        normalizer.handle(flags_changed(flags::CONTROL | flags::SHIFT));
        normalizer.handle(flags_changed(flags::OPTION));

        assert_eq!(
            normalizer.state(),
            ModifierState {
                control: false,
                shift: false,
                command: false,
                option: true,
            }
        );
    }

    #[test]
    fn test_flags_changed_passes_through_unmodified() {
        let mut normalizer = Normalizer::new();
        normalizer.handle(flags_changed(flags::SHIFT));

        let event = flags_changed(flags::CONTROL | DEVICE_LEFT_CONTROL | flags::CAPS_LOCK);
        assert_eq!(normalizer.handle(event), event);
    }

    #[test]
    fn test_control_from_other_keyboard_applies_to_key_down() {
        let mut normalizer = Normalizer::new();

        // Keyboard A reports Control held
        normalizer.handle(flags_changed(flags::CONTROL | DEVICE_LEFT_CONTROL));
        // Keyboard B sends 'c' with no local modifiers
        let out = normalizer.handle(key_down(0));

        assert_eq!(out.flags & flags::ALL_MODIFIERS, flags::CONTROL);
    }

    #[test]
    fn test_basic_cross_keyboard_combo() {
        let mut normalizer = Normalizer::new();
        normalizer.handle(flags_changed(flags::CONTROL));
        let out = normalizer.handle(key_down(0));
        assert_eq!(out.flags, flags::CONTROL);
    }

    #[test]
    fn test_release_clears_state() {
        let mut normalizer = Normalizer::new();

        normalizer.handle(flags_changed(flags::CONTROL));
        assert_eq!(normalizer.handle(key_down(0)).flags, flags::CONTROL);
        assert_eq!(normalizer.handle(key_up(0)).flags, flags::CONTROL);

        normalizer.handle(flags_changed(0));
        assert_eq!(normalizer.handle(key_down(0)).flags, 0);
    }

    #[test]
    fn test_stale_local_modifier_is_cleared() {
        let mut normalizer = Normalizer::new();
        normalizer.handle(flags_changed(0));

        // Keyboard still reports Shift locally after it was released elsewhere
        let out = normalizer.handle(key_down(flags::SHIFT | flags::CAPS_LOCK));
        assert_eq!(out.flags, flags::CAPS_LOCK);
    }

    #[test]
    fn test_modifiers_from_different_keyboards_union() {
        let mut normalizer = Normalizer::new();
        normalizer.handle(flags_changed(flags::CONTROL | flags::SHIFT));

        let out = normalizer.handle(key_down(flags::SHIFT));
        assert_eq!(out.flags, flags::CONTROL | flags::SHIFT);
    }

    #[test]
    fn test_other_events_are_ignored() {
        let mut normalizer = Normalizer::new();
        normalizer.handle(flags_changed(flags::OPTION));
        let before = normalizer.state();

        let event = InputEvent::new(EventKind::Other, 0, flags::CONTROL | flags::COMMAND);
        assert_eq!(normalizer.handle(event), event);
        assert_eq!(normalizer.state(), before);
    }

    #[test]
    fn test_restricted_mask_only_stamps_tracked_modifiers() {
        let mut normalizer = Normalizer::with_tracked(flags::CONTROL);
        normalizer.handle(flags_changed(flags::CONTROL | flags::SHIFT));

        // State still records every modifier
        assert!(normalizer.state().shift);

        let out = normalizer.handle(key_down(flags::OPTION));
        assert_eq!(out.flags, flags::CONTROL | flags::OPTION);
    }

    #[test]
    fn test_tracked_mask_ignores_non_modifier_bits() {
        let mut normalizer = Normalizer::with_tracked(flags::CONTROL | flags::CAPS_LOCK);
        normalizer.handle(flags_changed(0));

        let out = normalizer.handle(key_down(flags::CAPS_LOCK));
        assert_eq!(out.flags, flags::CAPS_LOCK);
    }

    #[test]
    fn test_event_kinds_of_interest() {
        assert!(Normalizer::EVENT_KINDS.contains(&EventKind::FlagsChanged));
        assert!(Normalizer::EVENT_KINDS.contains(&EventKind::KeyDown));
        assert!(Normalizer::EVENT_KINDS.contains(&EventKind::KeyUp));
        assert!(!Normalizer::EVENT_KINDS.contains(&EventKind::Other));
    }
}
