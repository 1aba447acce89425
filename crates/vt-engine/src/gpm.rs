// SPDX-License-Identifier: MIT
//
// GPM mouse support on the Linux console.
//
// The console has no xterm mouse reporting. GPM's `mev` helper prints one
// line per mouse event instead:
//
//   mouse: event 0x14, at 10,5 (delta 0,0), buttons 4, modifiers 0x00
//
// Each line is turned into xterm-style codes (`ESC [ M b x y`, each value
// plus 32) and fed to the same decoder as terminal input. The button byte
// may carry the release and multiple-click flags from `mouse.rs`, which
// xterm never sends but the decoder understands.
//
// `mev` reports 1-based coordinates, so adding 32 lands on exactly what
// xterm would have sent for the same cell.
//
// Anything going wrong with the helper only turns mouse support off.

use std::io::Read;
use std::process::{Child, ChildStdout, Command, Stdio};

use tracing::{debug, warn};

use crate::error::GpmError;
use crate::mouse::{ButtonState, MOUSE_DRAG_FLAG, MOUSE_MULTIPLE_CLICK_FLAG, MOUSE_RELEASE_FLAG};

/// `mev` event types we act on.
const EV_PRESS: u32 = 20;
const EV_DOUBLE_PRESS: u32 = 36;
const EV_TRIPLE_PRESS: u32 = 52;
const EV_DOUBLE_RELEASE: u32 = 40;
const EV_DRAG: u32 = 146;

/// Event mask passed to `mev -e`: moves with buttons, presses, releases.
const MEV_EVENT_MASK: &str = "158";

// ─── Event Lines ─────────────────────────────────────────────────────────────

/// One parsed `mev` line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MevEvent {
    pub event: u32,
    /// 1-based column.
    pub x: u32,
    /// 1-based row.
    pub y: u32,
    /// 4 left, 2 middle, 1 right.
    pub buttons: u32,
    pub modifiers: u32,
}

fn hex_after_x(field: &str) -> Option<u32> {
    let digits = field.rsplit('x').next()?.trim();
    u32::from_str_radix(digits, 16).ok()
}

/// Parse a line printed by `mev`.
///
/// # Errors
///
/// [`GpmError::Malformed`] unless the line has the six comma-separated
/// fields `mev` prints.
pub fn parse_mev_line(line: &str) -> Result<MevEvent, GpmError> {
    let malformed = || GpmError::Malformed(line.trim_end().to_string());
    let fields: Vec<&str> = line.split(',').collect();
    let &[ev, x, y, _delta, b, m] = fields.as_slice() else {
        return Err(malformed());
    };

    let last_token = |s: &str| s.split_whitespace().last().and_then(|t| t.parse::<u32>().ok());
    Ok(MevEvent {
        event: hex_after_x(ev).ok_or_else(malformed)?,
        x: last_token(x).ok_or_else(malformed)?,
        y: y.split_whitespace()
            .next()
            .and_then(|t| t.parse().ok())
            .ok_or_else(malformed)?,
        buttons: last_token(b).ok_or_else(malformed)?,
        modifiers: hex_after_x(m).ok_or_else(malformed)?,
    })
}

// ─── Translation ─────────────────────────────────────────────────────────────

/// `mev` button bit, xterm button code, tracked bit.
const BUTTONS: [(u32, u32, u8); 3] = [
    (4, 0, ButtonState::LEFT),
    (2, 1, ButtonState::MIDDLE),
    (1, 2, ButtonState::RIGHT),
];

/// Turn one event into xterm mouse codes.
///
/// `held` is the button state before the event; the state after it is
/// returned alongside the codes. Presses are reported only for buttons not
/// already held and releases only for buttons that are.
#[must_use]
pub fn translate(ev: &MevEvent, held: ButtonState) -> (Vec<u32>, ButtonState) {
    let mut modifiers = 0;
    if ev.modifiers & 1 != 0 {
        modifiers |= 4;
    }
    if ev.modifiers & 10 != 0 {
        modifiers |= 8;
    }
    if ev.modifiers & 4 != 0 {
        modifiers |= 16;
    }

    let mut codes = Vec::new();
    let mut append = |button: i64| {
        let b = u32::try_from(button).unwrap_or(0) | modifiers;
        codes.extend([0x1B, u32::from(b'['), u32::from(b'M'), b + 32, ev.x + 32, ev.y + 32]);
    };

    let mut next = held;
    match ev.event {
        EV_PRESS | EV_DOUBLE_PRESS | EV_TRIPLE_PRESS => {
            for (mev_bit, code, bit) in BUTTONS {
                if ev.buttons & mev_bit != 0 && !held.is_held(bit) {
                    append(i64::from(code));
                    next.press(bit);
                }
            }
        }
        EV_DRAG => {
            if let Some(&(_, code, _)) = BUTTONS.iter().find(|(mev_bit, ..)| ev.buttons & mev_bit != 0) {
                append(i64::from(code) + MOUSE_DRAG_FLAG);
            }
        }
        _ => {
            for (mev_bit, code, bit) in BUTTONS {
                if ev.buttons & mev_bit != 0 && held.is_held(bit) {
                    append(i64::from(code) + MOUSE_RELEASE_FLAG);
                    next.release(bit);
                }
            }
        }
    }

    let clicks = match ev.event {
        EV_DOUBLE_RELEASE => 1,
        EV_TRIPLE_PRESS => 2,
        _ => 0,
    };
    if clicks > 0 {
        for (mev_bit, code, bit) in BUTTONS {
            if ev.buttons & mev_bit != 0 && held.is_held(bit) {
                append(i64::from(code) + MOUSE_MULTIPLE_CLICK_FLAG * clicks);
            }
        }
    }

    (codes, next)
}

// ─── Tracker ─────────────────────────────────────────────────────────────────

/// A running `mev` helper.
///
/// The child is killed on drop.
pub struct GpmTracker {
    child: Child,
    stdout: ChildStdout,
    partial: Vec<u8>,
}

impl GpmTracker {
    /// Start `mev`.
    ///
    /// # Errors
    ///
    /// [`GpmError::Io`] if the helper cannot be spawned.
    pub fn start() -> Result<Self, GpmError> {
        Self::spawn(Command::new("mev").args(["-e", MEV_EVENT_MASK]))
    }

    /// Start an arbitrary helper speaking the `mev` line format.
    ///
    /// # Errors
    ///
    /// [`GpmError::Io`] if the command cannot be spawned.
    pub fn spawn(command: &mut Command) -> Result<Self, GpmError> {
        let mut child = command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;
        let Some(stdout) = child.stdout.take() else {
            let _ = child.kill();
            return Err(GpmError::Malformed("helper has no stdout".into()));
        };

        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;
            if let Err(e) = crate::poll::set_nonblocking_cloexec(stdout.as_raw_fd()) {
                let _ = child.kill();
                return Err(e.into());
            }
        }

        debug!(pid = child.id(), "gpm helper started");
        Ok(Self {
            child,
            stdout,
            partial: Vec::new(),
        })
    }

    /// The helper's output descriptor, for `poll()`.
    #[cfg(unix)]
    #[must_use]
    pub fn fd(&self) -> std::os::unix::io::RawFd {
        use std::os::unix::io::AsRawFd;
        self.stdout.as_raw_fd()
    }

    /// Read what the helper printed and translate complete lines.
    ///
    /// Returns the decoder codes for every complete line, threading
    /// `held` through them.
    ///
    /// # Errors
    ///
    /// [`GpmError::Io`] on read failure or EOF (the helper exited), and
    /// [`GpmError::Malformed`] on a line that does not parse.
    pub fn read_codes(&mut self, held: ButtonState) -> Result<Vec<u32>, GpmError> {
        let mut buf = [0u8; 1024];
        loop {
            match self.stdout.read(&mut buf) {
                Ok(0) => {
                    return Err(GpmError::Io(std::io::ErrorKind::UnexpectedEof.into()));
                }
                Ok(n) => self.partial.extend_from_slice(&buf[..n]),
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(e) => return Err(e.into()),
            }
        }

        let mut codes = Vec::new();
        let mut state = held;
        while let Some(nl) = self.partial.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.partial.drain(..=nl).collect();
            let line = String::from_utf8_lossy(&line);
            let event = parse_mev_line(&line)?;
            let (more, next) = translate(&event, state);
            codes.extend(more);
            state = next;
        }
        Ok(codes)
    }

    /// Stop the helper.
    pub fn stop(&mut self) {
        if let Err(e) = self.child.kill() {
            warn!(error = %e, "failed to stop gpm helper");
        }
        let _ = self.child.wait();
    }
}

impl Drop for GpmTracker {
    fn drop(&mut self) {
        self.stop();
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mouse::{decode_mouse, MouseAction};
    use pretty_assertions::assert_eq;

    const PRESS_LINE: &str = "mouse: event 0x14, at 10,5 (delta 0,0), buttons 4, modifiers 0x00\n";

    fn event(ev: u32, buttons: u32) -> MevEvent {
        MevEvent {
            event: ev,
            x: 1,
            y: 1,
            buttons,
            modifiers: 0,
        }
    }

    /// Decode the mouse reports in a code stream.
    fn reports(codes: &[u32]) -> Vec<(MouseAction, u8, u8)> {
        codes
            .chunks(6)
            .map(|c| {
                let ev = decode_mouse(&c[3..]).unwrap();
                (ev.action, ev.button, ev.clicks)
            })
            .collect()
    }

    #[test]
    fn parses_mev_line() {
        assert_eq!(
            parse_mev_line(PRESS_LINE).unwrap(),
            MevEvent {
                event: 0x14,
                x: 10,
                y: 5,
                buttons: 4,
                modifiers: 0,
            }
        );
    }

    #[test]
    fn rejects_wrong_field_count() {
        assert!(matches!(parse_mev_line("garbage\n"), Err(GpmError::Malformed(_))));
        assert!(matches!(
            parse_mev_line("event 0xzz, at 1,1 (delta 0,0), buttons 4, modifiers 0x00"),
            Err(GpmError::Malformed(_))
        ));
    }

    #[test]
    fn press_becomes_xterm_report() {
        let ev = parse_mev_line(PRESS_LINE).unwrap();
        let (codes, next) = translate(&ev, ButtonState::default());
        assert_eq!(codes, vec![27, 91, 77, 32, 42, 37]);
        assert_eq!(next.bits(), ButtonState::LEFT);

        let decoded = decode_mouse(&codes[3..]).unwrap();
        assert_eq!((decoded.x, decoded.y), (9, 4));
    }

    #[test]
    fn held_buttons_are_not_pressed_again() {
        let held = ButtonState::from_bits(ButtonState::LEFT);
        let (codes, next) = translate(&event(EV_PRESS, 4 | 1), held);
        assert_eq!(reports(&codes), vec![(MouseAction::Press, 3, 1)]);
        assert_eq!(next.bits(), ButtonState::LEFT | ButtonState::RIGHT);
    }

    #[test]
    fn release_names_the_button() {
        let held = ButtonState::from_bits(ButtonState::LEFT | ButtonState::MIDDLE);
        let (codes, next) = translate(&event(24, 2), held);
        assert_eq!(reports(&codes), vec![(MouseAction::Release, 2, 1)]);
        assert_eq!(next.bits(), ButtonState::LEFT);
    }

    #[test]
    fn release_of_unheld_button_is_dropped() {
        let (codes, next) = translate(&event(24, 4), ButtonState::default());
        assert!(codes.is_empty());
        assert_eq!(next.bits(), 0);
    }

    #[test]
    fn drag_reports_first_button() {
        let held = ButtonState::from_bits(ButtonState::MIDDLE);
        let (codes, next) = translate(&event(EV_DRAG, 2), held);
        assert_eq!(reports(&codes), vec![(MouseAction::Drag, 2, 1)]);
        assert_eq!(next, held);
    }

    #[test]
    fn double_click_on_release() {
        let held = ButtonState::from_bits(ButtonState::LEFT);
        let (codes, next) = translate(&event(EV_DOUBLE_RELEASE, 4), held);
        assert_eq!(
            reports(&codes),
            vec![(MouseAction::Release, 1, 1), (MouseAction::Click, 1, 2)]
        );
        assert_eq!(next.bits(), 0);
    }

    #[test]
    fn triple_click_on_press() {
        let held = ButtonState::from_bits(ButtonState::LEFT);
        let (codes, _) = translate(&event(EV_TRIPLE_PRESS, 4), held);
        assert_eq!(reports(&codes), vec![(MouseAction::Click, 1, 3)]);
    }

    #[test]
    fn modifiers_map_to_xterm_bits() {
        let ev = MevEvent {
            modifiers: 1 | 4 | 8,
            ..event(EV_PRESS, 4)
        };
        let (codes, _) = translate(&ev, ButtonState::default());
        assert_eq!(codes[3], 32 + 4 + 8 + 16);
    }

    #[cfg(unix)]
    #[test]
    fn tracker_reads_helper_output() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", &format!("printf '{}'; exec sleep 5", PRESS_LINE.trim_end())]);
        let mut tracker = GpmTracker::spawn(&mut cmd).unwrap();
        let mut codes = Vec::new();
        for _ in 0..200 {
            codes = tracker.read_codes(ButtonState::default()).unwrap();
            if !tracker.partial.is_empty() || !codes.is_empty() {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        // No newline yet: the line stays buffered.
        assert!(codes.is_empty());
        assert!(tracker.partial.starts_with(b"mouse: event 0x14"));
        tracker.stop();
    }

    #[cfg(unix)]
    #[test]
    fn tracker_eof_is_an_error() {
        let mut tracker = GpmTracker::spawn(Command::new("true").arg("")).unwrap();
        let mut result = Ok(Vec::new());
        for _ in 0..200 {
            result = tracker.read_codes(ButtonState::default());
            if result.is_err() {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        assert!(matches!(result, Err(GpmError::Io(_))));
    }

    #[test]
    fn missing_helper_fails_to_start() {
        let err = GpmTracker::spawn(&mut Command::new("/nonexistent/mev-helper")).err().unwrap();
        assert!(matches!(err, GpmError::Io(_)));
    }
}
