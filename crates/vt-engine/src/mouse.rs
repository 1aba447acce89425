// SPDX-License-Identifier: MIT
//
// Mouse reports: decoding and button tracking.
//
// xterm's X10/normal tracking sends `ESC [ M b x y` where each byte is the
// value plus 32. The button byte packs:
//
//   bits 0-1   button (0 left, 1 middle, 2 right, 3 release)
//   bit  2     shift
//   bit  3     meta
//   bit  4     ctrl
//   bit  5     motion (drag, with ?1002)
//   bit  6     wheel: buttons 4 and 5
//
// The GPM translator (`gpm.rs`) feeds the same shape but uses two bits
// xterm never sets: a release flag naming the button that went up, and a
// multiple-click field for double and triple clicks.
//
// Plain xterm releases do not say which button went up, so the decoder
// keeps the set of buttons currently held and fills the gap from it.

use std::fmt;

use bitflags::bitflags;

/// Motion with a button held.
pub const MOUSE_DRAG_FLAG: i64 = 32;
/// A specific, known button was released.
pub const MOUSE_RELEASE_FLAG: i64 = 2048;
/// Double (1) or triple (2) click, shifted left by 9.
pub const MOUSE_MULTIPLE_CLICK_MASK: i64 = 1536;
/// One unit of [`MOUSE_MULTIPLE_CLICK_MASK`].
pub const MOUSE_MULTIPLE_CLICK_FLAG: i64 = 512;

// ─── Types ──────────────────────────────────────────────────────────────────

bitflags! {
    /// Modifier keys held during a mouse event.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    pub struct Modifiers: u8 {
        const SHIFT = 0b001;
        const META  = 0b010;
        const CTRL  = 0b100;
    }
}

/// What the mouse did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseAction {
    Press,
    Release,
    Drag,
    /// A double or triple click (see [`MouseEvent::clicks`]).
    Click,
}

impl MouseAction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Press => "press",
            Self::Release => "release",
            Self::Drag => "drag",
            Self::Click => "click",
        }
    }
}

/// A decoded mouse report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MouseEvent {
    pub action: MouseAction,
    /// 1 left, 2 middle, 3 right, 4/5 wheel; 0 when unknown.
    pub button: u8,
    /// 0-indexed column.
    pub x: u16,
    /// 0-indexed row.
    pub y: u16,
    pub modifiers: Modifiers,
    /// 1 for single, 2 for double, 3 for triple clicks.
    pub clicks: u8,
}

impl MouseEvent {
    /// The event name, e.g. `"shift mouse press"` or `"double mouse click"`.
    #[must_use]
    pub fn name(&self) -> String {
        let mut name = String::new();
        if self.modifiers.contains(Modifiers::SHIFT) {
            name.push_str("shift ");
        }
        if self.modifiers.contains(Modifiers::META) {
            name.push_str("meta ");
        }
        if self.modifiers.contains(Modifiers::CTRL) {
            name.push_str("ctrl ");
        }
        match self.clicks {
            2 => name.push_str("double "),
            3 => name.push_str("triple "),
            _ => {}
        }
        name.push_str("mouse ");
        name.push_str(self.action.as_str());
        name
    }

    /// The `(kind, button, x, y)` view.
    #[must_use]
    pub fn as_tuple(&self) -> (String, u8, u16, u16) {
        (self.name(), self.button, self.x, self.y)
    }
}

impl fmt::Display for MouseEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

// ─── Decoding ───────────────────────────────────────────────────────────────

/// Decode the three codes following `ESC [ M`.
///
/// Returns `None` when fewer than three codes are available; the caller
/// decides whether that means "wait" or "give up".
#[must_use]
pub fn decode_mouse(codes: &[u32]) -> Option<MouseEvent> {
    let &[b, x, y, ..] = codes else {
        return None;
    };
    let b = i64::from(b) - 32;
    let x = (i64::from(x) - 33).rem_euclid(256);
    let y = (i64::from(y) - 33).rem_euclid(256);

    let mut modifiers = Modifiers::empty();
    if b & 4 != 0 {
        modifiers |= Modifiers::SHIFT;
    }
    if b & 8 != 0 {
        modifiers |= Modifiers::META;
    }
    if b & 16 != 0 {
        modifiers |= Modifiers::CTRL;
    }

    let clicks = match (b & MOUSE_MULTIPLE_CLICK_MASK) >> 9 {
        1 => 2,
        2 => 3,
        _ => 1,
    };

    let mut button = ((b & 64) / 64) * 3 + (b & 3) + 1;
    let action = if b & 3 == 3 {
        button = 0;
        MouseAction::Release
    } else if b & MOUSE_RELEASE_FLAG != 0 {
        MouseAction::Release
    } else if b & MOUSE_DRAG_FLAG != 0 {
        MouseAction::Drag
    } else if b & MOUSE_MULTIPLE_CLICK_MASK != 0 {
        MouseAction::Click
    } else {
        MouseAction::Press
    };

    Some(MouseEvent {
        action,
        button: u8::try_from(button).unwrap_or(0),
        x: u16::try_from(x).unwrap_or(0),
        y: u16::try_from(y).unwrap_or(0),
        modifiers,
        clicks,
    })
}

// ─── Button Tracking ────────────────────────────────────────────────────────

/// Buttons currently held: bit 1 left, bit 2 middle, bit 4 right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ButtonState(u8);

impl ButtonState {
    pub const LEFT: u8 = 1;
    pub const MIDDLE: u8 = 2;
    pub const RIGHT: u8 = 4;

    /// Bit for a button number, 0 for wheel and unknown buttons.
    #[must_use]
    pub const fn bit(button: u8) -> u8 {
        match button {
            1 => Self::LEFT,
            2 => Self::MIDDLE,
            3 => Self::RIGHT,
            _ => 0,
        }
    }

    #[inline]
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & 7)
    }

    #[inline]
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn is_held(self, bit: u8) -> bool {
        self.0 & bit != 0
    }

    #[inline]
    pub const fn press(&mut self, bit: u8) {
        self.0 |= bit;
    }

    #[inline]
    pub const fn release(&mut self, bit: u8) {
        self.0 &= !bit;
    }

    /// The lowest held button number, if any.
    #[must_use]
    pub const fn lowest_held(self) -> Option<u8> {
        if self.is_held(Self::LEFT) {
            Some(1)
        } else if self.is_held(Self::MIDDLE) {
            Some(2)
        } else if self.is_held(Self::RIGHT) {
            Some(3)
        } else {
            None
        }
    }

    /// Update from a decoded event, filling in an unknown released button.
    ///
    /// Presses set the button's bit. A release of button 0 takes the
    /// lowest held button's identity and clears only that bit.
    pub fn observe(&mut self, mut event: MouseEvent) -> MouseEvent {
        match event.action {
            MouseAction::Press => self.press(Self::bit(event.button)),
            MouseAction::Release => {
                if event.button == 0 {
                    if let Some(held) = self.lowest_held() {
                        event.button = held;
                    }
                }
                self.release(Self::bit(event.button));
            }
            MouseAction::Drag | MouseAction::Click => {}
        }
        event
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn mouse(b: u32, x: u32, y: u32) -> MouseEvent {
        decode_mouse(&[b, x, y]).unwrap()
    }

    #[test]
    fn left_press_at_origin() {
        let ev = mouse(32, 33, 33);
        assert_eq!(ev.action, MouseAction::Press);
        assert_eq!(ev.button, 1);
        assert_eq!((ev.x, ev.y), (0, 0));
        assert_eq!(ev.modifiers, Modifiers::empty());
        assert_eq!(ev.name(), "mouse press");
    }

    #[test]
    fn right_press_with_modifiers() {
        let ev = mouse(32 + 2 + 4 + 16, 43, 38);
        assert_eq!(ev.button, 3);
        assert_eq!((ev.x, ev.y), (10, 5));
        assert_eq!(ev.name(), "shift ctrl mouse press");
    }

    #[test]
    fn release_is_button_zero() {
        let ev = mouse(32 + 3, 33, 33);
        assert_eq!(ev.action, MouseAction::Release);
        assert_eq!(ev.button, 0);
    }

    #[test]
    fn drag_flag() {
        let ev = mouse(32 + 32, 40, 40);
        assert_eq!(ev.action, MouseAction::Drag);
        assert_eq!(ev.button, 1);
        assert_eq!(ev.name(), "mouse drag");
    }

    #[test]
    fn wheel_buttons() {
        assert_eq!(mouse(32 + 64, 33, 33).button, 4);
        assert_eq!(mouse(32 + 65, 33, 33).button, 5);
    }

    #[test]
    fn coordinates_wrap_past_223() {
        // Byte 0 after the +33 offset wraps to column 223.
        assert_eq!(mouse(32, 0, 33).x, 223);
    }

    #[test]
    fn multiple_click_prefixes() {
        let double = mouse(32 + 512, 33, 33);
        assert_eq!(double.action, MouseAction::Click);
        assert_eq!(double.clicks, 2);
        assert_eq!(double.name(), "double mouse click");

        let triple = mouse(32 + 1024 + 8, 33, 33);
        assert_eq!(triple.name(), "meta triple mouse click");
    }

    #[test]
    fn release_flag_keeps_button() {
        let ev = mouse(32 + 2048 + 1, 33, 33);
        assert_eq!(ev.action, MouseAction::Release);
        assert_eq!(ev.button, 2);
    }

    #[test]
    fn too_short_is_none() {
        assert_eq!(decode_mouse(&[32, 33]), None);
    }

    #[test]
    fn tuple_view() {
        assert_eq!(mouse(32, 34, 35).as_tuple(), ("mouse press".to_string(), 1, 1, 2));
    }

    // ── ButtonState ─────────────────────────────────────────────────

    #[test]
    fn press_and_release_track_bits() {
        let mut state = ButtonState::default();
        state.observe(mouse(32, 33, 33));
        state.observe(mouse(34, 33, 33));
        assert_eq!(state.bits(), ButtonState::LEFT | ButtonState::RIGHT);

        let released = state.observe(mouse(32 + 2048 + 2, 33, 33));
        assert_eq!(released.button, 3);
        assert_eq!(state.bits(), ButtonState::LEFT);
    }

    #[test]
    fn unknown_release_takes_lowest_held() {
        let mut state = ButtonState::from_bits(ButtonState::MIDDLE | ButtonState::RIGHT);
        let ev = state.observe(mouse(35, 33, 33));
        assert_eq!(ev.button, 2);
        assert_eq!(state.bits(), ButtonState::RIGHT);
    }

    #[test]
    fn unknown_release_with_nothing_held() {
        let mut state = ButtonState::default();
        let ev = state.observe(mouse(35, 33, 33));
        assert_eq!(ev.button, 0);
        assert_eq!(state.bits(), 0);
    }

    #[test]
    fn wheel_is_not_tracked() {
        let mut state = ButtonState::default();
        state.observe(mouse(32 + 64, 33, 33));
        assert_eq!(state.bits(), 0);
    }
}
