// SPDX-License-Identifier: MIT
//
// Terminal input decoder.
//
// Turns raw input codes into logical events: characters, named keys,
// modifier-prefixed keys, mouse reports and cursor-position reports.
// Codes are `u32` rather than bytes so curses keypad values (258 and up)
// and translated GPM reports ride the same path as terminal bytes.
//
// Keys are plain strings ("a", "enter", "ctrl x", "shift page up",
// "meta f5"). Modifier words always appear in the order shift, meta,
// ctrl.
//
// # Design
//
// [`decode`] is a pure step over a slice of codes. It returns one of:
//
//   Decoded      an event plus how many codes it used
//   NeedMore     the codes are a strict prefix of something longer, and
//                the caller said more input may still arrive
//   Placeholder  an undecodable code, reported as "<N>" and skipped
//
// Escape sequences are matched against a prefix trie built once from a
// static table. When the trie cannot extend a run and no more input is
// coming, ESC + rest falls back to "meta " + the decoded rest.
//
// [`Decoder`] wraps the step with the session state: unresolved codes
// held between reads, and the mouse buttons currently down.

use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;
use std::time::Duration;

use tracing::trace;

use crate::mouse::{self, ButtonState, MouseEvent};
use crate::width::{self, ByteEncoding};

const ESC: u32 = 0x1B;

// ─── Event Types ────────────────────────────────────────────────────────────

/// A decoded input event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A key: a character, a name, or a modifier-prefixed name.
    Key(String),
    /// Both bytes of a double-byte character (wide encodings only).
    DoubleByte([u8; 2]),
    /// A mouse report.
    Mouse(MouseEvent),
    /// Reply to [`REPORT_CURSOR_POSITION`](crate::escape::REPORT_CURSOR_POSITION),
    /// 0-indexed.
    CursorPosition { x: u16, y: u16 },
    /// The terminal changed size.
    WindowResize,
}

impl Event {
    /// Build a key event.
    #[must_use]
    pub fn key(name: impl Into<String>) -> Self {
        Self::Key(name.into())
    }

    /// The key name, if this is a key.
    #[must_use]
    pub fn as_key(&self) -> Option<&str> {
        match self {
            Self::Key(k) => Some(k),
            _ => None,
        }
    }

    /// Whether this is the key `name`.
    #[must_use]
    pub fn is_key(&self, name: &str) -> bool {
        self.as_key() == Some(name)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(k) => f.write_str(k),
            Self::DoubleByte([a, b]) => write!(f, "<{a:#04x} {b:#04x}>"),
            Self::Mouse(m) => write!(f, "{m}"),
            Self::CursorPosition { .. } => f.write_str("cursor position"),
            Self::WindowResize => f.write_str("window resize"),
        }
    }
}

/// Outcome of one [`decode`] step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeStep {
    /// An event built from the first `consumed` codes.
    Decoded { event: Event, consumed: usize },
    /// The codes start a longer sequence; call again with more appended.
    NeedMoreInput,
    /// `code` cannot be decoded. Always consumes exactly one code.
    Placeholder { code: u32, consumed: usize },
}

impl DecodeStep {
    const fn decoded(event: Event, consumed: usize) -> Self {
        Self::Decoded { event, consumed }
    }

    fn key(name: impl Into<String>, consumed: usize) -> Self {
        Self::Decoded {
            event: Event::Key(name.into()),
            consumed,
        }
    }

    const fn placeholder(code: u32) -> Self {
        Self::Placeholder { code, consumed: 1 }
    }
}

// ─── Key Table ──────────────────────────────────────────────────────────────

/// Single codes with a fixed name. Values above 255 are curses keypad codes.
fn keyconv(code: u32) -> Option<String> {
    let name = match code {
        8 | 127 | 263 => "backspace",
        9 => "tab",
        10 | 13 | 343 => "enter",
        258 => "down",
        259 => "up",
        260 => "left",
        261 => "right",
        262 => "home",
        265..=276 => return Some(format!("f{}", code - 264)),
        277..=288 => return Some(format!("shift f{}", code - 276)),
        330 => "delete",
        331 => "insert",
        338 => "page down",
        339 => "page up",
        350 => "5",
        360 => "end",
        _ => return None,
    };
    Some(name.to_string())
}

/// Modifier words for an xterm modifier digit (`'2'` is shift, `'5'` ctrl).
fn escape_modifier(digit: u8) -> String {
    let mode = digit.saturating_sub(b'1');
    let mut prefix = String::new();
    if mode & 1 != 0 {
        prefix.push_str("shift ");
    }
    if mode & 2 != 0 {
        prefix.push_str("meta ");
    }
    if mode & 4 != 0 {
        prefix.push_str("ctrl ");
    }
    prefix
}

/// What a complete trie path means.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Leaf {
    Key(String),
    /// `ESC [ M`: three mouse codes follow.
    Mouse,
}

/// Every escape sequence the decoder knows, without the leading ESC.
///
/// The mouse prefix `[M` is not listed; it is added to the trie separately.
#[must_use]
pub fn key_sequences() -> Vec<(String, String)> {
    let mut seqs: Vec<(String, String)> = Vec::new();
    let mut add = |seq: &str, key: &str| seqs.push((seq.to_string(), key.to_string()));

    #[rustfmt::skip]
    let fixed: &[(&str, &str)] = &[
        ("[A", "up"), ("[B", "down"), ("[C", "right"), ("[D", "left"),
        ("[E", "5"), ("[F", "end"), ("[G", "5"), ("[H", "home"),

        ("[1~", "home"), ("[2~", "insert"), ("[3~", "delete"), ("[4~", "end"),
        ("[5~", "page up"), ("[6~", "page down"),
        ("[7~", "home"), ("[8~", "end"),

        ("[[A", "f1"), ("[[B", "f2"), ("[[C", "f3"), ("[[D", "f4"), ("[[E", "f5"),

        ("[11~", "f1"), ("[12~", "f2"), ("[13~", "f3"), ("[14~", "f4"),
        ("[15~", "f5"), ("[17~", "f6"), ("[18~", "f7"), ("[19~", "f8"),
        ("[20~", "f9"), ("[21~", "f10"), ("[23~", "f11"), ("[24~", "f12"),
        ("[25~", "f13"), ("[26~", "f14"), ("[28~", "f15"), ("[29~", "f16"),
        ("[31~", "f17"), ("[32~", "f18"), ("[33~", "f19"), ("[34~", "f20"),

        ("OA", "up"), ("OB", "down"), ("OC", "right"), ("OD", "left"),
        ("OH", "home"), ("OF", "end"),
        ("OP", "f1"), ("OQ", "f2"), ("OR", "f3"), ("OS", "f4"),
        ("Oo", "/"), ("Oj", "*"), ("Om", "-"), ("Ok", "+"),

        ("[Z", "shift tab"),
        ("On", "."),

        ("[200~", "begin paste"), ("[201~", "end paste"),

        ("[0n", "status ok"),
    ];
    for &(seq, key) in fixed {
        add(seq, key);
    }

    // rxvt: lowercase arrows.
    for (prefix, modifier) in [("O", "meta "), ("[", "shift ")] {
        for (letter, key) in ['a', 'b', 'c', 'd'].into_iter().zip(["up", "down", "right", "left"]) {
            add(&format!("{prefix}{letter}"), &format!("{modifier}{key}"));
        }
    }

    // rxvt: `$` shift, `^` meta on the editing keys.
    for (modifier, symbol) in [("shift ", '$'), ("meta ", '^')] {
        for (digit, key) in ['2', '3', '5', '6', '7', '8']
            .into_iter()
            .zip(["insert", "delete", "page up", "page down", "home", "end"])
        {
            add(&format!("[{digit}{symbol}"), &format!("{modifier}{key}"));
        }
    }

    // Application keypad digits.
    for n in 0..10u8 {
        add(&format!("O{}", char::from(b'p' + n)), &n.to_string());
    }

    // Modified cursor keys: `[dX` and `[1;dX`.
    for prefix in ["[", "[1;"] {
        for digit in b'1'..=b'8' {
            for (letter, key) in "ABCDEFGH"
                .chars()
                .zip(["up", "down", "right", "left", "5", "end", "5", "home"])
            {
                add(
                    &format!("{prefix}{}{letter}", char::from(digit)),
                    &format!("{}{key}", escape_modifier(digit)),
                );
            }
        }
    }

    // Modified F1-F4: `OdX`.
    for digit in b'1'..=b'8' {
        for (letter, key) in "PQRS".chars().zip(["f1", "f2", "f3", "f4"]) {
            add(
                &format!("O{}{letter}", char::from(digit)),
                &format!("{}{key}", escape_modifier(digit)),
            );
        }
    }

    // Modified tilde keys: `[N;d~`.
    const TILDE_KEYS: [(u8, &str); 23] = [
        (3, "delete"), (5, "page up"), (6, "page down"),
        (11, "f1"), (12, "f2"), (13, "f3"), (14, "f4"), (15, "f5"),
        (17, "f6"), (18, "f7"), (19, "f8"), (20, "f9"), (21, "f10"),
        (23, "f11"), (24, "f12"), (25, "f13"), (26, "f14"),
        (28, "f15"), (29, "f16"), (31, "f17"), (32, "f18"), (33, "f19"), (34, "f20"),
    ];
    for digit in b'1'..=b'8' {
        for (num, key) in TILDE_KEYS {
            add(
                &format!("[{num};{}~", char::from(digit)),
                &format!("{}{key}", escape_modifier(digit)),
            );
        }
    }

    seqs
}

// ─── Trie ───────────────────────────────────────────────────────────────────

#[derive(Debug)]
enum Node {
    Leaf(Leaf),
    Branch(HashMap<u32, Node>),
}

impl Node {
    fn insert(&mut self, seq: &[u32], leaf: Leaf) {
        let Self::Branch(children) = self else {
            debug_assert!(false, "key sequence conflicts with a shorter one");
            return;
        };
        match seq {
            [] => debug_assert!(false, "empty key sequence"),
            [last] => {
                children.insert(*last, Self::Leaf(leaf));
            }
            [first, rest @ ..] => children
                .entry(*first)
                .or_insert_with(|| Self::Branch(HashMap::new()))
                .insert(rest, leaf),
        }
    }
}

static INPUT_TRIE: LazyLock<Node> = LazyLock::new(|| {
    let mut root = Node::Branch(HashMap::new());
    for (seq, key) in key_sequences() {
        let codes: Vec<u32> = seq.bytes().map(u32::from).collect();
        root.insert(&codes, Leaf::Key(key));
    }
    root.insert(&[u32::from(b'['), u32::from(b'M')], Leaf::Mouse);
    root
});

/// Result of a lookup that may need more codes.
enum Lookup {
    Found(Event, usize),
    NeedMore,
    NoMatch,
}

/// Match the codes after an ESC against the trie.
fn trie_lookup(keys: &[u32], more_available: bool) -> Lookup {
    let mut node = &*INPUT_TRIE;
    let mut used = 0;
    loop {
        match node {
            Node::Leaf(Leaf::Key(key)) => return Lookup::Found(Event::Key(key.clone()), used),
            Node::Leaf(Leaf::Mouse) => {
                return match mouse::decode_mouse(&keys[used..]) {
                    Some(ev) => Lookup::Found(Event::Mouse(ev), used + 3),
                    None if more_available => Lookup::NeedMore,
                    None => Lookup::NoMatch,
                };
            }
            Node::Branch(children) => {
                let Some(code) = keys.get(used) else {
                    return if more_available {
                        Lookup::NeedMore
                    } else {
                        Lookup::NoMatch
                    };
                };
                match children.get(code) {
                    Some(next) => {
                        node = next;
                        used += 1;
                    }
                    None => return Lookup::NoMatch,
                }
            }
        }
    }
}

/// Read `ESC [ <y> ; <x> R`. Numbers are 1-based with no leading zeros.
fn read_cursor_position(keys: &[u32], more_available: bool) -> Lookup {
    let need_more = || {
        if more_available {
            Lookup::NeedMore
        } else {
            Lookup::NoMatch
        }
    };

    let Some(&first) = keys.first() else {
        return need_more();
    };
    if first != u32::from(b'[') {
        return Lookup::NoMatch;
    }

    let mut i = 1;
    let mut coords = [0u32; 2];
    for (n, terminator) in [b';', b'R'].into_iter().enumerate() {
        let value = &mut coords[n];
        loop {
            let Some(&k) = keys.get(i) else {
                return need_more();
            };
            i += 1;
            if k == u32::from(terminator) {
                if *value == 0 {
                    return Lookup::NoMatch;
                }
                break;
            }
            if !(u32::from(b'0')..=u32::from(b'9')).contains(&k) {
                return Lookup::NoMatch;
            }
            if *value == 0 && k == u32::from(b'0') {
                return Lookup::NoMatch;
            }
            *value = value.saturating_mul(10).saturating_add(k - u32::from(b'0'));
        }
    }

    let [y, x] = coords;
    let to_u16 = |v: u32| u16::try_from(v - 1).unwrap_or(u16::MAX);
    Lookup::Found(Event::CursorPosition { x: to_u16(x), y: to_u16(y) }, i)
}

// ─── Decode Step ────────────────────────────────────────────────────────────

/// Decode one event from the front of `codes`.
///
/// `more_available` says whether more input may still arrive for this
/// batch. When it is `true`, an incomplete sequence yields
/// [`DecodeStep::NeedMoreInput`] instead of a guess.
#[must_use]
pub fn decode(codes: &[u32], more_available: bool, enc: ByteEncoding) -> DecodeStep {
    let Some(&code) = codes.first() else {
        return DecodeStep::NeedMoreInput;
    };

    if (32..=126).contains(&code) {
        return DecodeStep::key(char_of(code), 1);
    }
    if let Some(name) = keyconv(code) {
        return DecodeStep::key(name, 1);
    }
    if (1..=26).contains(&code) {
        return DecodeStep::key(format!("ctrl {}", char_of(u32::from(b'a') + code - 1)), 1);
    }
    if (28..=31).contains(&code) {
        return DecodeStep::key(format!("ctrl {}", char_of(u32::from(b'A') + code - 1)), 1);
    }

    if enc == ByteEncoding::Wide && (0x80..256).contains(&code) {
        match codes.get(1) {
            None if more_available => return DecodeStep::NeedMoreInput,
            Some(&next) if next < 256 => {
                let pair = [code as u8, next as u8];
                if width::within_double_byte(&pair, 0, 1) != 0 {
                    return DecodeStep::decoded(Event::DoubleByte(pair), 2);
                }
            }
            _ => {}
        }
    }

    if enc == ByteEncoding::Utf8 && (128..256).contains(&code) {
        return decode_utf8(codes, more_available);
    }

    if (128..256).contains(&code) {
        return DecodeStep::key(char_of(code), 1);
    }
    if code != ESC {
        return DecodeStep::placeholder(code);
    }

    decode_escape(codes, more_available, enc)
}

fn decode_utf8(codes: &[u32], more_available: bool) -> DecodeStep {
    let lead = codes[0];
    let need = match lead {
        _ if lead & 0xE0 == 0xC0 => 1,
        _ if lead & 0xF0 == 0xE0 => 2,
        _ if lead & 0xF8 == 0xF0 => 3,
        _ => return DecodeStep::placeholder(lead),
    };

    for i in 0..need {
        let Some(&k) = codes.get(i + 1) else {
            return if more_available {
                DecodeStep::NeedMoreInput
            } else {
                DecodeStep::placeholder(lead)
            };
        };
        if k > 255 || k & 0xC0 != 0x80 {
            return DecodeStep::placeholder(lead);
        }
    }

    let bytes: Vec<u8> = codes[..=need].iter().map(|&c| c as u8).collect();
    match std::str::from_utf8(&bytes) {
        Ok(s) => DecodeStep::key(s, need + 1),
        Err(_) => DecodeStep::placeholder(lead),
    }
}

fn decode_escape(codes: &[u32], more_available: bool, enc: ByteEncoding) -> DecodeStep {
    let rest = &codes[1..];

    let found = match trie_lookup(rest, more_available) {
        Lookup::NoMatch => read_cursor_position(rest, more_available),
        other => other,
    };
    match found {
        Lookup::Found(event, used) => return DecodeStep::decoded(event, used + 1),
        Lookup::NeedMore => return DecodeStep::NeedMoreInput,
        Lookup::NoMatch => {}
    }

    if rest.is_empty() {
        return DecodeStep::key("esc", 1);
    }

    // ESC + key: meta.
    match decode(rest, more_available, enc) {
        DecodeStep::NeedMoreInput => DecodeStep::NeedMoreInput,
        DecodeStep::Placeholder { code, consumed } => {
            DecodeStep::key(format!("meta <{code}>"), consumed + 1)
        }
        DecodeStep::Decoded {
            event: Event::Key(key),
            consumed,
        } if key != "esc" && !key.contains("meta ") => {
            DecodeStep::key(format!("meta {key}"), consumed + 1)
        }
        // Mouse reports, a second ESC or an already-meta key: report
        // the ESC on its own and decode the rest next time round.
        DecodeStep::Decoded { .. } => DecodeStep::key("esc", 1),
    }
}

/// The character for a code known to be a valid scalar value.
fn char_of(code: u32) -> char {
    char::from_u32(code).unwrap_or('?')
}

// ─── Decoder ────────────────────────────────────────────────────────────────

/// Decoder settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderConfig {
    /// How bytes above 127 are interpreted.
    pub encoding: ByteEncoding,
    /// How long to wait for the rest of an incomplete sequence before
    /// [`flush`](Decoder::flush)ing it. Default: 125 ms.
    pub complete_wait: Duration,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            encoding: ByteEncoding::Utf8,
            complete_wait: Duration::from_millis(125),
        }
    }
}

/// Events from one [`Decoder::feed`] call.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Feed {
    pub events: Vec<Event>,
    /// `Some` while codes are pending: poll no longer than this, then
    /// call [`Decoder::flush`].
    pub timeout: Option<Duration>,
}

/// Per-session input decoder.
///
/// Feed it whatever was read; it returns the events it could decode and
/// keeps an unresolved tail (a lone ESC, half a UTF-8 character) for the
/// next call.
#[derive(Debug, Default)]
pub struct Decoder {
    pending: Vec<u32>,
    config: DecoderConfig,
    buttons: ButtonState,
}

impl Decoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_config(config: DecoderConfig) -> Self {
        Self {
            pending: Vec::with_capacity(16),
            config,
            buttons: ButtonState::default(),
        }
    }

    #[inline]
    #[must_use]
    pub const fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Codes held back from earlier calls.
    #[inline]
    #[must_use]
    pub fn pending(&self) -> &[u32] {
        &self.pending
    }

    #[inline]
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Mouse buttons currently held.
    #[inline]
    #[must_use]
    pub const fn button_state(&self) -> ButtonState {
        self.buttons
    }

    /// Mutable access for translators (GPM) that share the tracking.
    #[inline]
    pub const fn button_state_mut(&mut self) -> &mut ButtonState {
        &mut self.buttons
    }

    /// Decode freshly read bytes.
    pub fn feed(&mut self, bytes: &[u8], more_available: bool) -> Feed {
        self.feed_codes(bytes.iter().copied().map(u32::from), more_available)
    }

    /// Decode codes that are not plain bytes (curses keys, GPM reports).
    pub fn feed_codes(&mut self, codes: impl IntoIterator<Item = u32>, more_available: bool) -> Feed {
        self.pending.extend(codes);
        let codes = std::mem::take(&mut self.pending);
        let events = self.run(&codes, more_available);
        let timeout = self.has_pending().then_some(self.config.complete_wait);
        Feed { events, timeout }
    }

    /// Give up waiting: decode whatever is pending as final input.
    pub fn flush(&mut self) -> Vec<Event> {
        let codes = std::mem::take(&mut self.pending);
        self.run(&codes, false)
    }

    fn run(&mut self, codes: &[u32], more_available: bool) -> Vec<Event> {
        let mut events = Vec::new();
        let mut i = 0;
        while i < codes.len() {
            match decode(&codes[i..], more_available, self.config.encoding) {
                DecodeStep::Decoded { event, consumed } => {
                    events.push(self.track(event));
                    i += consumed.max(1);
                }
                DecodeStep::NeedMoreInput => {
                    self.pending.extend_from_slice(&codes[i..]);
                    break;
                }
                DecodeStep::Placeholder { code, consumed } => {
                    trace!(code, "undecodable input code");
                    events.push(Event::Key(format!("<{code}>")));
                    i += consumed.max(1);
                }
            }
        }
        events
    }

    fn track(&mut self, event: Event) -> Event {
        match event {
            Event::Mouse(m) => Event::Mouse(self.buttons.observe(m)),
            other => other,
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mouse::{Modifiers, MouseAction};
    use pretty_assertions::assert_eq;

    /// Helper: decode bytes as final input and return all events.
    fn parse(data: &[u8]) -> Vec<Event> {
        Decoder::new().feed(data, false).events
    }

    /// Helper: decode bytes, return exactly one event.
    fn parse_one(data: &[u8]) -> Event {
        let events = parse(data);
        assert_eq!(events.len(), 1, "expected 1 event, got {events:?}");
        events.into_iter().next().unwrap()
    }

    fn key(name: &str) -> Event {
        Event::key(name)
    }

    fn step(data: &[u8], more: bool) -> DecodeStep {
        let codes: Vec<u32> = data.iter().copied().map(u32::from).collect();
        decode(&codes, more, ByteEncoding::Utf8)
    }

    // ── Single codes ────────────────────────────────────────────────

    #[test]
    fn printable_ascii() {
        assert_eq!(parse(b"aZ~"), vec![key("a"), key("Z"), key("~")]);
        assert_eq!(parse_one(b" "), key(" "));
    }

    #[test]
    fn control_table() {
        assert_eq!(parse_one(b"\t"), key("tab"));
        assert_eq!(parse_one(b"\r"), key("enter"));
        assert_eq!(parse_one(b"\n"), key("enter"));
        assert_eq!(parse_one(b"\x7f"), key("backspace"));
        assert_eq!(parse_one(b"\x08"), key("backspace"));
    }

    #[test]
    fn ctrl_letters() {
        assert_eq!(parse_one(b"\x01"), key("ctrl a"));
        assert_eq!(parse_one(b"\x1a"), key("ctrl z"));
        assert_eq!(parse_one(b"\x03"), key("ctrl c"));
    }

    #[test]
    fn ctrl_punctuation() {
        assert_eq!(parse_one(b"\x1c"), key("ctrl \\"));
        assert_eq!(parse_one(b"\x1d"), key("ctrl ]"));
        assert_eq!(parse_one(b"\x1e"), key("ctrl ^"));
        assert_eq!(parse_one(b"\x1f"), key("ctrl _"));
    }

    #[test]
    fn nul_is_placeholder() {
        assert_eq!(step(b"\x00", false), DecodeStep::Placeholder { code: 0, consumed: 1 });
        assert_eq!(parse_one(b"\x00"), key("<0>"));
    }

    #[test]
    fn curses_keypad_codes() {
        let mut d = Decoder::new();
        let events = d.feed_codes([258, 265, 288, 338, 360, 999], false).events;
        assert_eq!(
            events,
            vec![
                key("down"),
                key("f1"),
                key("shift f12"),
                key("page down"),
                key("end"),
                key("<999>"),
            ]
        );
    }

    // ── Escape sequences ────────────────────────────────────────────

    #[test]
    fn every_table_entry_decodes_exactly() {
        for (seq, name) in key_sequences() {
            let mut bytes = vec![0x1b];
            bytes.extend_from_slice(seq.as_bytes());
            let codes: Vec<u32> = bytes.iter().copied().map(u32::from).collect();
            assert_eq!(
                decode(&codes, false, ByteEncoding::Utf8),
                DecodeStep::Decoded {
                    event: key(&name),
                    consumed: bytes.len()
                },
                "ESC {seq}"
            );
        }
    }

    #[test]
    fn every_strict_prefix_needs_more() {
        for (seq, _) in key_sequences() {
            let mut bytes = vec![0x1b];
            bytes.extend_from_slice(seq.as_bytes());
            for len in 1..bytes.len() {
                assert_eq!(
                    step(&bytes[..len], true),
                    DecodeStep::NeedMoreInput,
                    "prefix {len} of ESC {seq}"
                );
            }
        }
    }

    #[test]
    fn arrows_and_modified_arrows() {
        assert_eq!(parse_one(b"\x1b[A"), key("up"));
        assert_eq!(parse_one(b"\x1bOD"), key("left"));
        assert_eq!(parse_one(b"\x1b[1;5C"), key("ctrl right"));
        assert_eq!(parse_one(b"\x1b[2A"), key("shift up"));
        assert_eq!(parse_one(b"\x1b[1;8H"), key("shift meta ctrl home"));
    }

    #[test]
    fn modified_function_keys() {
        assert_eq!(parse_one(b"\x1bO2P"), key("shift f1"));
        assert_eq!(parse_one(b"\x1b[15;3~"), key("meta f5"));
        assert_eq!(parse_one(b"\x1b[3;5~"), key("ctrl delete"));
    }

    #[test]
    fn rxvt_forms() {
        assert_eq!(parse_one(b"\x1bOa"), key("meta up"));
        assert_eq!(parse_one(b"\x1b[d"), key("shift left"));
        assert_eq!(parse_one(b"\x1b[5$"), key("shift page up"));
        assert_eq!(parse_one(b"\x1b[8^"), key("meta end"));
        assert_eq!(parse_one(b"\x1bOp"), key("0"));
        assert_eq!(parse_one(b"\x1bOy"), key("9"));
    }

    #[test]
    fn status_report() {
        assert_eq!(parse_one(b"\x1b[0n"), key("status ok"));
    }

    #[test]
    fn escape_modifier_order() {
        assert_eq!(escape_modifier(b'1'), "");
        assert_eq!(escape_modifier(b'2'), "shift ");
        assert_eq!(escape_modifier(b'3'), "meta ");
        assert_eq!(escape_modifier(b'5'), "ctrl ");
        assert_eq!(escape_modifier(b'8'), "shift meta ctrl ");
    }

    // ── ESC fallbacks ───────────────────────────────────────────────

    #[test]
    fn lone_esc_waits_then_flushes() {
        let mut d = Decoder::new();
        let feed = d.feed(b"\x1b", true);
        assert!(feed.events.is_empty());
        assert_eq!(feed.timeout, Some(Duration::from_millis(125)));
        assert_eq!(d.pending(), &[0x1b]);

        assert_eq!(d.flush(), vec![key("esc")]);
        assert!(!d.has_pending());
    }

    #[test]
    fn lone_esc_without_more_input() {
        assert_eq!(parse_one(b"\x1b"), key("esc"));
    }

    #[test]
    fn meta_letter() {
        assert_eq!(parse_one(b"\x1bx"), key("meta x"));
        assert_eq!(parse_one(b"\x1b\x01"), key("meta ctrl a"));
        assert_eq!(step(b"\x1bx", true), DecodeStep::Decoded { event: key("meta x"), consumed: 2 });
    }

    #[test]
    fn meta_of_sequence() {
        assert_eq!(parse_one(b"\x1b\x1b[A"), key("meta up"));
    }

    #[test]
    fn double_esc_is_two_escapes() {
        assert_eq!(parse(b"\x1b\x1b"), vec![key("esc"), key("esc")]);
    }

    #[test]
    fn esc_before_meta_key_splits() {
        assert_eq!(parse(b"\x1b\x1b\x1bx"), vec![key("esc"), key("esc"), key("meta x")]);
    }

    #[test]
    fn meta_placeholder() {
        assert_eq!(parse_one(b"\x1b\x00"), key("meta <0>"));
    }

    #[test]
    fn unknown_csi_tail_falls_back_to_meta() {
        assert_eq!(parse(b"\x1b[x"), vec![key("meta ["), key("x")]);
    }

    #[test]
    fn partial_sequence_resumes_across_feeds() {
        let mut d = Decoder::new();
        assert!(d.feed(b"\x1b[1;", true).events.is_empty());
        let feed = d.feed(b"5Ab", true);
        assert_eq!(feed.events, vec![key("ctrl up"), key("b")]);
        assert_eq!(feed.timeout, None);
    }

    // ── Cursor position reports ─────────────────────────────────────

    #[test]
    fn cursor_position_report() {
        assert_eq!(parse_one(b"\x1b[12;40R"), Event::CursorPosition { x: 39, y: 11 });
        assert_eq!(parse_one(b"\x1b[1;1R"), Event::CursorPosition { x: 0, y: 0 });
    }

    #[test]
    fn cursor_position_rejects_zero_and_leading_zero() {
        for data in [&b"\x1b[0;5R"[..], b"\x1b[05;5R", b"\x1b[5;0R"] {
            assert!(
                parse(data)
                    .iter()
                    .all(|e| !matches!(e, Event::CursorPosition { .. })),
                "{data:?}"
            );
        }
    }

    #[test]
    fn cursor_position_partial_needs_more() {
        assert_eq!(step(b"\x1b[12;4", true), DecodeStep::NeedMoreInput);
        assert_eq!(step(b"\x1b[12", true), DecodeStep::NeedMoreInput);
    }

    // ── Mouse ───────────────────────────────────────────────────────

    #[test]
    fn mouse_press_at_origin() {
        let Event::Mouse(m) = parse_one(b"\x1b[M !!") else {
            panic!("expected mouse event");
        };
        assert_eq!(m.action, MouseAction::Press);
        assert_eq!(m.button, 1);
        assert_eq!((m.x, m.y), (0, 0));
        assert_eq!(m.modifiers, Modifiers::empty());
    }

    #[test]
    fn mouse_needs_three_codes() {
        assert_eq!(step(b"\x1b[M !", true), DecodeStep::NeedMoreInput);
        assert_eq!(parse(b"\x1b[M !"), vec![key("meta ["), key("M"), key(" "), key("!")]);
    }

    #[test]
    fn xterm_release_gets_tracked_button() {
        let mut d = Decoder::new();
        d.feed(b"\x1b[M\"!!", false); // right press
        let events = d.feed(b"\x1b[M#!!", false).events;
        let Event::Mouse(m) = &events[0] else {
            panic!("expected mouse event");
        };
        assert_eq!(m.action, MouseAction::Release);
        assert_eq!(m.button, 3);
        assert_eq!(d.button_state().bits(), 0);
    }

    #[test]
    fn esc_then_mouse_splits() {
        let events = parse(b"\x1b\x1b[M !!");
        assert_eq!(events[0], key("esc"));
        assert!(matches!(events[1], Event::Mouse(_)));
        assert_eq!(events.len(), 2);
    }

    // ── Multi-byte input ────────────────────────────────────────────

    #[test]
    fn utf8_characters() {
        assert_eq!(parse("é中😀".as_bytes()), vec![key("é"), key("中"), key("😀")]);
    }

    #[test]
    fn utf8_split_across_feeds() {
        let mut d = Decoder::new();
        let bytes = "中".as_bytes();
        assert!(d.feed(&bytes[..2], true).events.is_empty());
        assert_eq!(d.feed(&bytes[2..], true).events, vec![key("中")]);
    }

    #[test]
    fn utf8_truncated_is_placeholder() {
        assert_eq!(parse(&[0xE4, 0xB8]), vec![key("<228>"), key("<184>")]);
    }

    #[test]
    fn utf8_bad_continuation_keeps_sync() {
        assert_eq!(parse(&[0xC3, b'a']), vec![key("<195>"), key("a")]);
    }

    #[test]
    fn narrow_high_bytes_are_latin1() {
        let mut d = Decoder::with_config(DecoderConfig {
            encoding: ByteEncoding::Narrow,
            ..DecoderConfig::default()
        });
        assert_eq!(d.feed(&[0xE9], false).events, vec![key("é")]);
    }

    #[test]
    fn wide_double_byte() {
        let mut d = Decoder::with_config(DecoderConfig {
            encoding: ByteEncoding::Wide,
            ..DecoderConfig::default()
        });
        assert!(d.feed(&[0xA4], true).events.is_empty());
        assert_eq!(d.feed(&[0x40], true).events, vec![Event::DoubleByte([0xA4, 0x40])]);
    }

    #[test]
    fn wide_lead_without_partner() {
        let mut d = Decoder::with_config(DecoderConfig {
            encoding: ByteEncoding::Wide,
            ..DecoderConfig::default()
        });
        assert_eq!(d.feed(&[0xA4, b'\r'], false).events, vec![key("¤"), key("enter")]);
    }

    // ── Display ─────────────────────────────────────────────────────

    #[test]
    fn display_forms() {
        assert_eq!(Event::WindowResize.to_string(), "window resize");
        assert_eq!(Event::CursorPosition { x: 1, y: 2 }.to_string(), "cursor position");
        assert_eq!(key("shift up").to_string(), "shift up");
    }
}
