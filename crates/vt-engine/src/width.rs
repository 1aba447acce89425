// SPDX-License-Identifier: MIT
//
// Display width and byte-encoding helpers.
//
// Everything here works on raw byte strings plus an explicit
// [`ByteEncoding`]. Three encodings matter to a terminal:
//
//   Narrow — one byte per column, no multi-byte characters at all.
//   Wide   — legacy double-byte encodings (Big5, GBK, UHC, EUC) where a
//            byte >= 0x80 starts a two-byte, two-column character.
//   Utf8   — code points decoded on the fly and measured with the
//            band table below.
//
// The width table is a fixed compatibility contract: the renderer, the
// layout code that fed it, and the terminal all have to agree on where
// a row ends. It deliberately does not track newer Unicode releases.
//
// Nothing in this module fails. Malformed UTF-8 decodes to `?` one byte
// at a time, so callers can always make progress.

use crate::canvas::Charset;

// ─── Encoding ───────────────────────────────────────────────────────────────

/// How the bytes of a string map to characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ByteEncoding {
    /// One byte, one column.
    Narrow,
    /// Legacy double-byte encodings.
    Wide,
    /// UTF-8.
    #[default]
    Utf8,
}

impl ByteEncoding {
    /// Pick an encoding from a locale name (`LANG`, `LC_ALL`, ...).
    ///
    /// Anything mentioning UTF-8 selects [`Utf8`](Self::Utf8), the CJK
    /// legacy charsets select [`Wide`](Self::Wide), the rest is narrow.
    #[must_use]
    pub fn from_locale(locale: &str) -> Self {
        let lower = locale.to_ascii_lowercase();
        if lower.contains("utf-8") || lower.contains("utf8") {
            Self::Utf8
        } else if ["big5", "gbk", "gb2312", "gb18030", "euc", "uhc", "cp949", "cp936"]
            .iter()
            .any(|cs| lower.contains(cs))
        {
            Self::Wide
        } else {
            Self::Narrow
        }
    }
}

// ─── Width Table ────────────────────────────────────────────────────────────

/// `(max_code_point, columns)` bands in ascending order.
#[rustfmt::skip]
const WIDTHS: &[(u32, u8)] = &[
    (126, 1), (159, 0), (687, 1), (710, 0), (711, 1),
    (727, 0), (733, 1), (879, 0), (1154, 1), (1161, 0),
    (4347, 1), (4447, 2), (7467, 1), (7521, 0), (8369, 1),
    (8426, 0), (9000, 1), (9002, 2), (11021, 1), (12350, 2),
    (12351, 1), (12438, 2), (12442, 0), (19893, 2), (19967, 1),
    (55203, 2), (63743, 1), (64106, 2), (65039, 1), (65059, 0),
    (65131, 2), (65279, 1), (65376, 2), (65500, 1), (65510, 2),
    (120_831, 1), (262_141, 2), (1_114_109, 1),
];

/// Display width of a code point: 0, 1 or 2 columns.
///
/// SO and SI (0x0E, 0x0F) are zero width because the renderer uses them
/// as charset shifts. Code points past the table are one column.
#[must_use]
pub const fn width_of(cp: u32) -> u8 {
    if cp == 0x0E || cp == 0x0F {
        return 0;
    }
    let mut i = 0;
    while i < WIDTHS.len() {
        let (max, width) = WIDTHS[i];
        if cp <= max {
            return width;
        }
        i += 1;
    }
    1
}

// ─── UTF-8 Decoding ─────────────────────────────────────────────────────────

const REPLACEMENT: u32 = b'?' as u32;

#[inline]
const fn is_continuation(b: u8) -> bool {
    b & 0xC0 == 0x80
}

/// Decode the code point starting at `pos`.
///
/// Returns `(code_point, next_pos)`. Truncated, malformed and overlong
/// sequences yield `('?', pos + 1)`.
#[must_use]
pub fn decode_one(text: &[u8], pos: usize) -> (u32, usize) {
    let error = (REPLACEMENT, pos + 1);
    let Some(&b1) = text.get(pos) else {
        return error;
    };
    if b1 & 0x80 == 0 {
        return (u32::from(b1), pos + 1);
    }

    let rest = &text[pos + 1..];
    let (len, init) = match b1 {
        _ if b1 & 0xE0 == 0xC0 => (2, u32::from(b1 & 0x1F)),
        _ if b1 & 0xF0 == 0xE0 => (3, u32::from(b1 & 0x0F)),
        _ if b1 & 0xF8 == 0xF0 => (4, u32::from(b1 & 0x07)),
        _ => return error,
    };
    if rest.len() < len - 1 {
        return error;
    }

    let mut cp = init;
    for &b in &rest[..len - 1] {
        if !is_continuation(b) {
            return error;
        }
        cp = (cp << 6) | u32::from(b & 0x3F);
    }

    let min = match len {
        2 => 0x80,
        3 => 0x800,
        _ => 0x1_0000,
    };
    if cp < min {
        return error;
    }
    (cp, pos + len)
}

/// Decode the code point whose last byte sits at `pos`.
///
/// Returns `(code_point, start)` where `start` is the offset of the
/// character's first byte. Walks back at most four bytes; when no lead
/// byte is found the result is `('?', pos)`.
#[must_use]
pub fn decode_one_right(text: &[u8], pos: usize) -> (u32, usize) {
    let lowest = pos.saturating_sub(3);
    let mut p = pos;
    loop {
        match text.get(p) {
            Some(&b) if !is_continuation(b) => return (decode_one(text, p).0, p),
            Some(_) if p > lowest => p -= 1,
            _ => return (REPLACEMENT, pos),
        }
    }
}

// ─── Width Queries ──────────────────────────────────────────────────────────

/// Display width of `text[start..end]`.
#[must_use]
pub fn calc_width(text: &[u8], start: usize, end: usize, enc: ByteEncoding) -> usize {
    let end = end.min(text.len());
    if start >= end {
        return 0;
    }
    if enc != ByteEncoding::Utf8 || text[start..end].is_ascii() {
        return end - start;
    }

    let mut i = start;
    let mut width = 0;
    while i < end {
        let (cp, next) = decode_one(text, i);
        width += usize::from(width_of(cp));
        i = next;
    }
    width
}

/// Display width of a whole string.
#[inline]
#[must_use]
pub fn str_width(text: &str) -> usize {
    calc_width(text.as_bytes(), 0, text.len(), ByteEncoding::Utf8)
}

/// Find the byte offset in `text[start..end]` closest to column `pref_col`.
///
/// Returns `(pos, col)`: the last character boundary whose column does not
/// exceed `pref_col`, and the column it lands on. A double-width character
/// straddling `pref_col` is left out.
#[must_use]
pub fn calc_text_pos(
    text: &[u8],
    start: usize,
    end: usize,
    pref_col: usize,
    enc: ByteEncoding,
) -> (usize, usize) {
    let end = end.min(text.len());
    if enc == ByteEncoding::Utf8 {
        let mut i = start;
        let mut col = 0;
        while i < end {
            let (cp, next) = decode_one(text, i);
            let w = usize::from(width_of(cp));
            if col + w > pref_col {
                return (i, col);
            }
            i = next;
            col += w;
        }
        return (i, col);
    }

    let mut i = start + pref_col;
    if i >= end {
        return (end, end.saturating_sub(start));
    }
    if enc == ByteEncoding::Wide && within_double_byte(text, start, i) == 2 {
        i -= 1;
    }
    (i, i - start)
}

// ─── Double-Byte Navigation ─────────────────────────────────────────────────

/// Where `pos` falls relative to a double-byte character.
///
/// Returns 0 for a single-byte character, 1 for the first half of a
/// double-byte character and 2 for the second half. `line_start` bounds
/// the backwards scan.
#[must_use]
pub fn within_double_byte(text: &[u8], line_start: usize, pos: usize) -> u8 {
    let Some(&v) = text.get(pos) else {
        return 0;
    };

    if (0x40..0x7F).contains(&v) {
        // May be the trailing half of Big5, UHC or GBK.
        if pos == line_start {
            return 0;
        }
        if text[pos - 1] >= 0x81 && within_double_byte(text, line_start, pos - 1) == 1 {
            return 2;
        }
        return 0;
    }
    if v < 0x80 {
        return 0;
    }

    let mut run = 0;
    let mut i = pos;
    while i > line_start {
        if text[i - 1] < 0x80 {
            break;
        }
        run += 1;
        i -= 1;
    }
    if run % 2 == 0 { 1 } else { 2 }
}

/// Offset of the character after the one at `start`, bounded by `end`.
#[must_use]
pub fn move_next_char(text: &[u8], start: usize, end: usize, enc: ByteEncoding) -> usize {
    match enc {
        ByteEncoding::Utf8 => {
            let mut o = start + 1;
            while o < end && text.get(o).is_some_and(|&b| is_continuation(b)) {
                o += 1;
            }
            o
        }
        ByteEncoding::Wide if within_double_byte(text, start, start) == 1 => start + 2,
        _ => start + 1,
    }
}

/// Offset of the character before `end`, bounded by `start`.
#[must_use]
pub fn move_prev_char(text: &[u8], start: usize, end: usize, enc: ByteEncoding) -> usize {
    if end <= start {
        return start;
    }
    match enc {
        ByteEncoding::Utf8 => {
            let mut o = end - 1;
            while o > start && text.get(o).is_some_and(|&b| is_continuation(b)) {
                o -= 1;
            }
            o
        }
        ByteEncoding::Wide if within_double_byte(text, start, end - 1) == 2 => end - 2,
        _ => end - 1,
    }
}

/// Whether the character at `offs` occupies two columns.
#[must_use]
pub fn is_wide_char(text: &[u8], offs: usize, enc: ByteEncoding) -> bool {
    match enc {
        ByteEncoding::Utf8 => width_of(decode_one(text, offs).0) == 2,
        ByteEncoding::Wide => within_double_byte(text, offs, offs) == 1,
        ByteEncoding::Narrow => false,
    }
}

// ─── DEC Special Graphics ───────────────────────────────────────────────────

/// Unicode characters the DEC special-graphics set can draw.
pub const DEC_SPECIAL_CHARS: &str = "▮◆▒␉␌␍␊°±␤␋┘┐┌└┼⎺⎻─⎼⎽├┤┴┬│≤≥π≠£·";

/// The bytes that draw [`DEC_SPECIAL_CHARS`] once G1 is shifted in.
pub const ALT_DEC_SPECIAL_CHARS: &str = "_`abcdefghijklmnopqrstuvwxyz{|}~";

/// The DEC special-graphics byte for `ch`, if it has one.
#[must_use]
pub fn dec_special_for(ch: char) -> Option<char> {
    DEC_SPECIAL_CHARS
        .chars()
        .position(|c| c == ch)
        .and_then(|i| ALT_DEC_SPECIAL_CHARS.chars().nth(i))
}

/// Split `text` into runs, moving line-drawing characters to the DEC
/// special charset.
///
/// Adjacent characters of the same kind share a run, so `"┌─┐"` becomes a
/// single [`Charset::Special`] run of `"lqk"`.
#[must_use]
pub fn split_dec_special(text: &str) -> Vec<(Charset, String)> {
    let mut runs: Vec<(Charset, String)> = Vec::new();
    for ch in text.chars() {
        let (charset, out) = match dec_special_for(ch) {
            Some(alt) => (Charset::Special, alt),
            None => (Charset::Default, ch),
        };
        match runs.last_mut() {
            Some((cs, run)) if *cs == charset => run.push(out),
            _ => runs.push((charset, out.to_string())),
        }
    }
    runs
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    // ── width_of ────────────────────────────────────────────────────

    #[test]
    fn ascii_is_single_width() {
        assert_eq!(width_of(u32::from('a')), 1);
        assert_eq!(width_of(u32::from('~')), 1);
    }

    #[test]
    fn c1_controls_are_zero_width() {
        assert_eq!(width_of(0x80), 0);
        assert_eq!(width_of(0x9F), 0);
    }

    #[test]
    fn shift_bytes_are_zero_width() {
        assert_eq!(width_of(0x0E), 0);
        assert_eq!(width_of(0x0F), 0);
    }

    #[test]
    fn cjk_is_double_width() {
        assert_eq!(width_of(u32::from('中')), 2);
        assert_eq!(width_of(u32::from('あ')), 2);
        assert_eq!(width_of(0xAC00), 2); // Hangul syllable
    }

    #[test]
    fn combining_marks_are_zero_width() {
        assert_eq!(width_of(0x0301), 0);
    }

    #[test]
    fn band_boundaries_are_inclusive() {
        assert_eq!(width_of(4447), 2);
        assert_eq!(width_of(4448), 1);
        assert_eq!(width_of(19893), 2);
        assert_eq!(width_of(19894), 1);
    }

    #[test]
    fn past_table_is_single_width() {
        assert_eq!(width_of(1_114_110), 1);
        assert_eq!(width_of(u32::MAX), 1);
    }

    // ── decode_one ──────────────────────────────────────────────────

    #[test]
    fn decode_ascii() {
        assert_eq!(decode_one(b"abc", 1), (u32::from('b'), 2));
    }

    #[test]
    fn decode_multibyte() {
        let text = "é中😀".as_bytes();
        assert_eq!(decode_one(text, 0), (0xE9, 2));
        assert_eq!(decode_one(text, 2), (0x4E2D, 5));
        assert_eq!(decode_one(text, 5), (0x1F600, 9));
    }

    #[test]
    fn decode_truncated_is_replacement() {
        assert_eq!(decode_one(&[0xE4, 0xB8], 0), (REPLACEMENT, 1));
        assert_eq!(decode_one(&[0xF0, 0x9F, 0x98], 0), (REPLACEMENT, 1));
    }

    #[test]
    fn decode_bad_continuation_is_replacement() {
        assert_eq!(decode_one(&[0xC3, 0x41], 0), (REPLACEMENT, 1));
        assert_eq!(decode_one(&[0xF0, 0x9F, 0x98, 0x41], 0), (REPLACEMENT, 1));
    }

    #[test]
    fn decode_overlong_is_replacement() {
        assert_eq!(decode_one(&[0xC0, 0x80], 0), (REPLACEMENT, 1));
        assert_eq!(decode_one(&[0xE0, 0x80, 0x80], 0), (REPLACEMENT, 1));
        assert_eq!(decode_one(&[0xF0, 0x80, 0x80, 0x80], 0), (REPLACEMENT, 1));
    }

    #[test]
    fn decode_stray_continuation_is_replacement() {
        assert_eq!(decode_one(&[0x80], 0), (REPLACEMENT, 1));
    }

    #[test]
    fn decode_past_end_does_not_panic() {
        assert_eq!(decode_one(b"a", 5), (REPLACEMENT, 6));
    }

    #[test]
    fn decode_right_finds_lead_byte() {
        let text = "a中".as_bytes();
        assert_eq!(decode_one_right(text, 3), (0x4E2D, 1));
        assert_eq!(decode_one_right(text, 0), (u32::from('a'), 0));
    }

    #[test]
    fn decode_right_gives_up_after_four_bytes() {
        let text = [0x80, 0x80, 0x80, 0x80, 0x80];
        assert_eq!(decode_one_right(&text, 4), (REPLACEMENT, 4));
    }

    // ── calc_width / calc_text_pos ──────────────────────────────────

    #[test]
    fn width_of_mixed_text() {
        let text = "ab中c".as_bytes();
        assert_eq!(calc_width(text, 0, text.len(), ByteEncoding::Utf8), 5);
        assert_eq!(str_width("中文"), 4);
    }

    #[test]
    fn narrow_width_counts_bytes() {
        let text = "中".as_bytes();
        assert_eq!(calc_width(text, 0, text.len(), ByteEncoding::Narrow), 3);
    }

    #[test]
    fn text_pos_stops_before_overflow() {
        let text = "ab中c".as_bytes();
        assert_eq!(calc_text_pos(text, 0, text.len(), 3, ByteEncoding::Utf8), (2, 2));
        assert_eq!(calc_text_pos(text, 0, text.len(), 4, ByteEncoding::Utf8), (5, 4));
    }

    #[test]
    fn text_pos_past_end_clamps() {
        let text = b"abc";
        assert_eq!(calc_text_pos(text, 0, 3, 10, ByteEncoding::Utf8), (3, 3));
        assert_eq!(calc_text_pos(text, 0, 3, 10, ByteEncoding::Narrow), (3, 3));
    }

    #[test]
    fn text_pos_narrow_is_offset() {
        assert_eq!(calc_text_pos(b"abcdef", 1, 6, 2, ByteEncoding::Narrow), (3, 2));
    }

    #[test]
    fn text_pos_wide_backs_off_second_half() {
        // "a" then a two-byte Big5 character.
        let text = [b'a', 0xA4, 0x40, b'b'];
        assert_eq!(calc_text_pos(&text, 0, 4, 2, ByteEncoding::Wide), (1, 1));
        assert_eq!(calc_text_pos(&text, 0, 4, 3, ByteEncoding::Wide), (3, 3));
    }

    // ── Double-byte navigation ──────────────────────────────────────

    #[test]
    fn within_double_byte_halves() {
        let text = [b'a', 0xA4, 0xA4, b'b'];
        assert_eq!(within_double_byte(&text, 0, 0), 0);
        assert_eq!(within_double_byte(&text, 0, 1), 1);
        assert_eq!(within_double_byte(&text, 0, 2), 2);
        assert_eq!(within_double_byte(&text, 0, 3), 0);
    }

    #[test]
    fn within_double_byte_low_trail() {
        let text = [0xA4, 0x40];
        assert_eq!(within_double_byte(&text, 0, 1), 2);
        assert_eq!(within_double_byte(&text, 1, 1), 0);
    }

    #[test]
    fn move_next_skips_continuations() {
        let text = "中a".as_bytes();
        assert_eq!(move_next_char(text, 0, text.len(), ByteEncoding::Utf8), 3);
        assert_eq!(move_next_char(text, 3, text.len(), ByteEncoding::Utf8), 4);
    }

    #[test]
    fn move_prev_skips_continuations() {
        let text = "a中".as_bytes();
        assert_eq!(move_prev_char(text, 0, text.len(), ByteEncoding::Utf8), 1);
        assert_eq!(move_prev_char(text, 0, 1, ByteEncoding::Utf8), 0);
    }

    #[test]
    fn move_wide_steps_over_pairs() {
        let text = [0xA4, 0xA4, b'b'];
        assert_eq!(move_next_char(&text, 0, 3, ByteEncoding::Wide), 2);
        assert_eq!(move_prev_char(&text, 0, 2, ByteEncoding::Wide), 0);
        assert_eq!(move_prev_char(&text, 0, 3, ByteEncoding::Wide), 2);
    }

    #[test]
    fn wide_char_detection() {
        let text = "a中".as_bytes();
        assert!(!is_wide_char(text, 0, ByteEncoding::Utf8));
        assert!(is_wide_char(text, 1, ByteEncoding::Utf8));
        assert!(is_wide_char(&[0xA4, 0xA4], 0, ByteEncoding::Wide));
        assert!(!is_wide_char(&[0xA4, 0xA4], 0, ByteEncoding::Narrow));
    }

    #[test]
    fn locale_detection() {
        assert_eq!(ByteEncoding::from_locale("en_US.UTF-8"), ByteEncoding::Utf8);
        assert_eq!(ByteEncoding::from_locale("zh_TW.Big5"), ByteEncoding::Wide);
        assert_eq!(ByteEncoding::from_locale("C"), ByteEncoding::Narrow);
    }

    // ── DEC special graphics ────────────────────────────────────────

    #[test]
    fn dec_tables_line_up() {
        assert_eq!(DEC_SPECIAL_CHARS.chars().count(), 32);
        assert_eq!(ALT_DEC_SPECIAL_CHARS.chars().count(), 32);
    }

    #[test]
    fn dec_box_drawing() {
        assert_eq!(dec_special_for('┌'), Some('l'));
        assert_eq!(dec_special_for('─'), Some('q'));
        assert_eq!(dec_special_for('│'), Some('x'));
        assert_eq!(dec_special_for('a'), None);
    }

    #[test]
    fn split_groups_runs() {
        assert_eq!(
            split_dec_special("a┌─┐b"),
            vec![
                (Charset::Default, "a".to_string()),
                (Charset::Special, "lqk".to_string()),
                (Charset::Default, "b".to_string()),
            ]
        );
    }

    #[test]
    fn split_empty_is_empty() {
        assert!(split_dec_special("").is_empty());
    }
}
