// SPDX-License-Identifier: MIT
//
// Device color model: descriptors, quantization, and SGR output.
//
// Colors are described with short strings and resolved once into a
// terminal palette index. The accepted descriptors are:
//
//   "default" or ""   the terminal's own color
//   "dark red", ...   one of the 16 basic color names
//   "#rgb"            one hex digit per channel, quantized into the cube
//   "gN"              gray, N in 0..=100 percent
//   "g#xx"            gray, hex 00..ff
//   "hN"              a raw palette index
//
// 256-color terminals carry a 6×6×6 cube at 16..=231 plus a 24-step gray
// ramp at 232..=255. 88-color terminals carry a 4×4×4 cube at 16..=79 and
// an 8-step ramp at 80..=87. Pure black and white always come from the
// cube, never from the ramp.
//
// Quantization uses midpoint lookup tables: every input level maps to the
// nearest step, with ties going up. The tables are built once on first
// use and shared read-only afterwards.

use std::fmt;
use std::sync::LazyLock;

use bitflags::bitflags;

use crate::error::ColorError;

// ─── Depth ──────────────────────────────────────────────────────────────────

/// How many colors a terminal (or an attribute) can address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Depth {
    /// Monochrome: settings only, no colors.
    Mono,
    /// The 16 basic colors.
    #[default]
    Basic,
    /// 88-color palette (rxvt).
    High88,
    /// 256-color palette (xterm).
    High256,
}

impl Depth {
    /// Number of addressable colors.
    #[inline]
    #[must_use]
    pub const fn colors(self) -> u16 {
        match self {
            Self::Mono => 1,
            Self::Basic => 16,
            Self::High88 => 88,
            Self::High256 => 256,
        }
    }

    /// Geometry used when parsing high colors at this depth.
    fn geometry(self) -> &'static Geometry {
        match self {
            Self::High88 => &GEOMETRY_88,
            _ => &GEOMETRY_256,
        }
    }
}

impl TryFrom<u16> for Depth {
    type Error = ColorError;

    fn try_from(colors: u16) -> Result<Self, Self::Error> {
        match colors {
            1 => Ok(Self::Mono),
            16 => Ok(Self::Basic),
            88 => Ok(Self::High88),
            256 => Ok(Self::High256),
            other => Err(ColorError::InvalidDepth(other)),
        }
    }
}

impl fmt::Display for Depth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.colors())
    }
}

// ─── Constants ──────────────────────────────────────────────────────────────

/// The 16 basic color names, in palette order.
pub const BASIC_COLORS: [&str; 16] = [
    "black",
    "dark red",
    "dark green",
    "brown",
    "dark blue",
    "dark magenta",
    "dark cyan",
    "light gray",
    "dark gray",
    "light red",
    "light green",
    "yellow",
    "light blue",
    "light magenta",
    "light cyan",
    "white",
];

/// xterm's default RGB values for the basic colors.
#[rustfmt::skip]
pub const BASIC_RGB: [(u8, u8, u8); 16] = [
    (0x00, 0x00, 0x00), (0xcd, 0x00, 0x00), (0x00, 0xcd, 0x00), (0xcd, 0xcd, 0x00),
    (0x00, 0x00, 0xee), (0xcd, 0x00, 0xcd), (0x00, 0xcd, 0xcd), (0xe5, 0xe5, 0xe5),
    (0x7f, 0x7f, 0x7f), (0xff, 0x00, 0x00), (0x00, 0xff, 0x00), (0xff, 0xff, 0x00),
    (0x5c, 0x5c, 0xff), (0xff, 0x00, 0xff), (0x00, 0xff, 0xff), (0xff, 0xff, 0xff),
];

/// First palette index of the color cube, for both geometries.
pub const CUBE_START: u8 = 16;

/// The cube's black corner.
pub const CUBE_BLACK: u8 = CUBE_START;

const CUBE_STEPS_256: [u8; 6] = [0x00, 0x5f, 0x87, 0xaf, 0xd7, 0xff];

#[rustfmt::skip]
const GRAY_STEPS_256: [u8; 24] = [
    0x08, 0x12, 0x1c, 0x26, 0x30, 0x3a, 0x44, 0x4e, 0x58, 0x62, 0x6c, 0x76,
    0x80, 0x8a, 0x94, 0x9e, 0xa8, 0xb2, 0xbc, 0xc6, 0xd0, 0xda, 0xe4, 0xee,
];

const CUBE_STEPS_88: [u8; 4] = [0x00, 0x8b, 0xcd, 0xff];

const GRAY_STEPS_88: [u8; 8] = [0x2e, 0x5c, 0x73, 0x8b, 0xa2, 0xb9, 0xd0, 0xe7];

// ─── Scaling ────────────────────────────────────────────────────────────────

/// Scale `val` from `0..val_range` to `0..out_range`, rounding half up.
///
/// A `val_range` below 2 or an empty `out_range` has no scale and gives 0.
///
/// ```
/// use vt_engine::color::int_scale;
///
/// assert_eq!(int_scale(2, 6, 101), 40);
/// assert_eq!(int_scale(1, 3, 4), 2);
/// ```
#[must_use]
pub const fn int_scale(val: u32, val_range: u32, out_range: u32) -> u32 {
    if val_range < 2 || out_range == 0 {
        return 0;
    }
    let num = val * (out_range - 1) * 2 + (val_range - 1);
    let dem = (val_range - 1) * 2;
    num / dem
}

/// Lookup table from every level in `0..size` to the index of its nearest
/// step in `values`. Thresholds sit at `(a + b + 1) / 2`.
fn value_lookup_table(values: &[u8], size: usize) -> Vec<u8> {
    let mut table = Vec::with_capacity(size);
    for (i, pair) in values.windows(2).enumerate() {
        let middle = (usize::from(pair[0]) + usize::from(pair[1]) + 1) / 2;
        table.resize(middle.min(size), u8::try_from(i).unwrap_or(u8::MAX));
    }
    let last = u8::try_from(values.len().saturating_sub(1)).unwrap_or(u8::MAX);
    table.resize(size, last);
    table
}

// ─── Geometry ───────────────────────────────────────────────────────────────

/// Shape of one high-color palette.
struct Geometry {
    colors: u16,
    cube: &'static [u8],
    gray: &'static [u8],
    cube_white: u8,
    gray_start: u8,
    /// Level (0..=255) to cube step index.
    cube_lookup: LazyLock<Vec<u8>>,
    /// Level (0..=255) to an index into `[0, gray.., 255]`.
    gray_lookup: LazyLock<Vec<u8>>,
}

impl Geometry {
    #[inline]
    const fn cube_size(&self) -> u8 {
        self.cube.len() as u8
    }

    #[inline]
    const fn gray_size(&self) -> u8 {
        self.gray.len() as u8
    }

    /// Cube step for one hex digit of a `#rgb` descriptor.
    fn cube_step_for_digit(&self, digit: u8) -> u8 {
        let level = int_scale(u32::from(digit), 16, 0x100);
        self.cube_lookup[level as usize]
    }

    /// Palette index for a gray level in `0..=255`.
    fn gray_index(&self, level: u8) -> ColorRef {
        match self.gray_lookup[usize::from(level)] {
            0 => self.cube(CUBE_BLACK),
            g if g - 1 == self.gray_size() => self.cube(self.cube_white),
            g => self.ramp(self.gray_start + g - 1),
        }
    }

    const fn cube(&self, idx: u8) -> ColorRef {
        if self.colors == 88 {
            ColorRef::Cube88(idx)
        } else {
            ColorRef::Cube256(idx)
        }
    }

    const fn ramp(&self, idx: u8) -> ColorRef {
        if self.colors == 88 {
            ColorRef::Gray88(idx)
        } else {
            ColorRef::Gray256(idx)
        }
    }

    /// xterm RGB for any palette index of this geometry.
    fn rgb(&self, idx: u8) -> (u8, u8, u8) {
        let size = self.cube_size();
        if idx < CUBE_START {
            BASIC_RGB[usize::from(idx)]
        } else if idx < self.gray_start {
            let i = idx - CUBE_START;
            let step = |n: u8| self.cube[usize::from(n % size)];
            (step(i / (size * size)), step(i / size), step(i))
        } else {
            let g = self.gray[usize::from((idx - self.gray_start).min(self.gray_size() - 1))];
            (g, g, g)
        }
    }
}

fn gray_levels(steps: &[u8]) -> Vec<u8> {
    let mut levels = Vec::with_capacity(steps.len() + 2);
    levels.push(0);
    levels.extend_from_slice(steps);
    levels.push(0xff);
    levels
}

static GEOMETRY_256: Geometry = Geometry {
    colors: 256,
    cube: &CUBE_STEPS_256,
    gray: &GRAY_STEPS_256,
    cube_white: 231,
    gray_start: 232,
    cube_lookup: LazyLock::new(|| value_lookup_table(&CUBE_STEPS_256, 0x100)),
    gray_lookup: LazyLock::new(|| value_lookup_table(&gray_levels(&GRAY_STEPS_256), 0x100)),
};

static GEOMETRY_88: Geometry = Geometry {
    colors: 88,
    cube: &CUBE_STEPS_88,
    gray: &GRAY_STEPS_88,
    cube_white: 79,
    gray_start: 80,
    cube_lookup: LazyLock::new(|| value_lookup_table(&CUBE_STEPS_88, 0x100)),
    gray_lookup: LazyLock::new(|| value_lookup_table(&gray_levels(&GRAY_STEPS_88), 0x100)),
};

// ─── ColorRef ───────────────────────────────────────────────────────────────

/// A resolved color: the palette index plus where it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ColorRef {
    /// The terminal's default color.
    #[default]
    Default,
    /// One of the 16 basic colors.
    Basic(u8),
    /// 256-color cube entry.
    Cube256(u8),
    /// 256-color gray ramp entry.
    Gray256(u8),
    /// 88-color cube entry.
    Cube88(u8),
    /// 88-color gray ramp entry.
    Gray88(u8),
    /// A raw palette index from an `hN` descriptor.
    Direct(u8),
}

impl ColorRef {
    /// The palette index, or `None` for the default color.
    #[inline]
    #[must_use]
    pub const fn index(self) -> Option<u8> {
        match self {
            Self::Default => None,
            Self::Basic(n)
            | Self::Cube256(n)
            | Self::Gray256(n)
            | Self::Cube88(n)
            | Self::Gray88(n)
            | Self::Direct(n) => Some(n),
        }
    }

    /// Whether this color is addressed with `38;5;N` / `48;5;N`.
    #[inline]
    #[must_use]
    pub const fn is_high(self) -> bool {
        !matches!(self, Self::Default | Self::Basic(_))
    }

    /// Colors a terminal needs to show this color.
    ///
    /// `Direct` indexes are ambiguous between geometries and take the
    /// depth they were parsed at.
    #[must_use]
    pub const fn required_colors(self, parsed_at: Depth) -> u16 {
        match self {
            Self::Default => 1,
            Self::Basic(_) => 16,
            Self::Cube88(_) | Self::Gray88(_) => 88,
            Self::Cube256(_) | Self::Gray256(_) => 256,
            Self::Direct(_) => {
                if matches!(parsed_at, Depth::High88) {
                    88
                } else {
                    256
                }
            }
        }
    }

    /// xterm RGB for this color, `None` for the default.
    #[must_use]
    pub fn rgb(self, depth: Depth) -> Option<(u8, u8, u8)> {
        match self {
            Self::Default => None,
            Self::Basic(n) => Some(BASIC_RGB[usize::from(n & 0x0f)]),
            Self::Cube256(n) | Self::Gray256(n) => Some(GEOMETRY_256.rgb(n)),
            Self::Cube88(n) | Self::Gray88(n) => Some(GEOMETRY_88.rgb(n)),
            Self::Direct(n) => Some(depth.geometry().rgb(n)),
        }
    }

    /// The canonical descriptor: a name, `#rgb`, `gN` or `hN`.
    #[must_use]
    pub fn describe(self) -> String {
        match self {
            Self::Default => "default".to_string(),
            Self::Basic(n) => BASIC_COLORS[usize::from(n & 0x0f)].to_string(),
            Self::Direct(n) => format!("h{n}"),
            Self::Cube256(n) => describe_cube(&GEOMETRY_256, n),
            Self::Cube88(n) => describe_cube(&GEOMETRY_88, n),
            Self::Gray256(n) => describe_gray(&GEOMETRY_256, n),
            Self::Gray88(n) => describe_gray(&GEOMETRY_88, n),
        }
    }
}

fn describe_cube(geo: &Geometry, idx: u8) -> String {
    let (r, g, b) = geo.rgb(idx);
    let digit = |v: u8| int_scale(u32::from(v), 0x100, 16);
    format!("#{:x}{:x}{:x}", digit(r), digit(g), digit(b))
}

fn describe_gray(geo: &Geometry, idx: u8) -> String {
    let (v, _, _) = geo.rgb(idx);
    format!("g{}", int_scale(u32::from(v), 0x100, 101))
}

impl fmt::Display for ColorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

// ─── Parsing ────────────────────────────────────────────────────────────────

/// Resolve a color descriptor at the given depth.
///
/// High colors use the 88-color geometry when `depth` is
/// [`Depth::High88`] and the 256-color geometry otherwise.
///
/// # Errors
///
/// [`ColorError::Unrecognised`] for bad syntax, and
/// [`ColorError::DepthExceeded`] when the color needs more colors than
/// `depth` provides (a cube color at depth 16, for example).
pub fn parse_color(desc: &str, depth: Depth) -> Result<ColorRef, ColorError> {
    let color = if desc.is_empty() || desc == "default" {
        ColorRef::Default
    } else if let Some(i) = BASIC_COLORS.iter().position(|&name| name == desc) {
        ColorRef::Basic(i as u8)
    } else {
        parse_high(desc, depth.geometry())
            .ok_or_else(|| ColorError::Unrecognised(desc.to_string()))?
    };

    let required = color.required_colors(depth);
    if required > depth.colors() {
        return Err(ColorError::DepthExceeded {
            desc: desc.to_string(),
            required,
            depth: depth.colors(),
        });
    }
    Ok(color)
}

fn parse_high(desc: &str, geo: &Geometry) -> Option<ColorRef> {
    if desc.len() > 4 || !desc.is_ascii() {
        return None;
    }

    if let Some(num) = desc.strip_prefix('h') {
        let n = parse_decimal(num)?;
        if n >= geo.colors {
            return None;
        }
        return u8::try_from(n).ok().map(ColorRef::Direct);
    }

    if let Some(hex) = desc.strip_prefix('#') {
        let digits: Vec<u8> = hex
            .chars()
            .map(|c| c.to_digit(16).map(|d| d as u8))
            .collect::<Option<_>>()?;
        let [r, g, b] = digits[..] else {
            return None;
        };
        let size = geo.cube_size();
        let (r, g, b) = (
            geo.cube_step_for_digit(r),
            geo.cube_step_for_digit(g),
            geo.cube_step_for_digit(b),
        );
        return Some(geo.cube(CUBE_START + (r * size + g) * size + b));
    }

    if let Some(hex) = desc.strip_prefix("g#") {
        return parse_hex(hex).map(|level| geo.gray_index(level));
    }

    if let Some(num) = desc.strip_prefix('g') {
        let pct: u16 = parse_decimal(num)?;
        if pct > 100 {
            return None;
        }
        let level = int_scale(u32::from(pct), 101, 0x100);
        return Some(geo.gray_index(level as u8));
    }

    None
}

/// Plain decimal digits only: no sign, no whitespace.
fn parse_decimal(s: &str) -> Option<u16> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Plain hex digits only. `from_str_radix` alone would take a leading `+`.
fn parse_hex(s: &str) -> Option<u8> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u8::from_str_radix(s, 16).ok()
}

// ─── Settings ───────────────────────────────────────────────────────────────

bitflags! {
    /// Text decorations an attribute can carry.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Settings: u8 {
        const BOLD      = 0b001;
        const UNDERLINE = 0b010;
        const STANDOUT  = 0b100;
    }
}

impl Settings {
    /// Parse a single setting name.
    #[must_use]
    pub fn from_setting(name: &str) -> Option<Self> {
        match name {
            "bold" => Some(Self::BOLD),
            "underline" => Some(Self::UNDERLINE),
            "standout" => Some(Self::STANDOUT),
            _ => None,
        }
    }
}

// ─── AttrSpec ───────────────────────────────────────────────────────────────

/// A complete display attribute: two colors, settings and a depth ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AttrSpec {
    foreground: ColorRef,
    background: ColorRef,
    settings: Settings,
    depth: Depth,
}

impl AttrSpec {
    /// Build an attribute from foreground and background descriptors.
    ///
    /// `fg` is a comma-separated list holding at most one color and any of
    /// `bold`, `underline`, `standout`. `bg` holds a single color.
    ///
    /// # Errors
    ///
    /// Any [`ColorError`]: bad descriptors, repeated settings, two colors
    /// on one side, settings on the background, a bright background at
    /// depth 16, or colors beyond `depth`.
    pub fn new(fg: &str, bg: &str, depth: Depth) -> Result<Self, ColorError> {
        let mut settings = Settings::empty();
        let mut foreground = None;
        for part in fg.split(',').map(str::trim) {
            if let Some(flag) = Settings::from_setting(part) {
                if settings.contains(flag) {
                    return Err(ColorError::DuplicateSetting {
                        setting: part.to_string(),
                        spec: fg.to_string(),
                    });
                }
                settings |= flag;
                continue;
            }
            let color = parse_color(part, depth)?;
            if foreground.replace(color).is_some() {
                return Err(ColorError::MultipleColors(fg.to_string()));
            }
        }

        let mut background = None;
        for part in bg.split(',').map(str::trim) {
            if Settings::from_setting(part).is_some() {
                return Err(ColorError::BackgroundSetting(bg.to_string()));
            }
            let color = parse_color(part, depth)?;
            if background.replace(color).is_some() {
                return Err(ColorError::MultipleColors(bg.to_string()));
            }
        }
        let background = background.unwrap_or_default();

        if depth == Depth::Basic && matches!(background, ColorRef::Basic(8..)) {
            return Err(ColorError::BrightBackground(bg.to_string()));
        }

        Ok(Self {
            foreground: foreground.unwrap_or_default(),
            background,
            settings,
            depth,
        })
    }

    /// Default colors, no settings.
    #[inline]
    #[must_use]
    pub fn plain() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub const fn foreground(&self) -> ColorRef {
        self.foreground
    }

    #[inline]
    #[must_use]
    pub const fn background(&self) -> ColorRef {
        self.background
    }

    #[inline]
    #[must_use]
    pub const fn settings(&self) -> Settings {
        self.settings
    }

    #[inline]
    #[must_use]
    pub const fn depth(&self) -> Depth {
        self.depth
    }

    #[inline]
    #[must_use]
    pub const fn bold(&self) -> bool {
        self.settings.contains(Settings::BOLD)
    }

    #[inline]
    #[must_use]
    pub const fn underline(&self) -> bool {
        self.settings.contains(Settings::UNDERLINE)
    }

    #[inline]
    #[must_use]
    pub const fn standout(&self) -> bool {
        self.settings.contains(Settings::STANDOUT)
    }

    /// The same attribute with `settings` cleared.
    #[inline]
    #[must_use]
    pub const fn without(mut self, settings: Settings) -> Self {
        self.settings = self.settings.difference(settings);
        self
    }

    /// Colors actually needed by this attribute (1, 16, 88 or 256).
    #[must_use]
    pub fn colors(&self) -> u16 {
        self.foreground
            .required_colors(self.depth)
            .max(self.background.required_colors(self.depth))
    }

    /// xterm RGB for both sides, `None` where the default color is used.
    #[must_use]
    pub fn rgb_values(&self) -> (Option<(u8, u8, u8)>, Option<(u8, u8, u8)>) {
        (
            self.foreground.rgb(self.depth),
            self.background.rgb(self.depth),
        )
    }

    /// The SGR sequence selecting this attribute.
    ///
    /// Always starts with a reset (`0;`) so nothing leaks from the previous
    /// run. With `bright_is_bold`, bright foregrounds use `1;3N` instead of
    /// the `9N` codes some terminals lack. Backgrounds never use bold.
    #[must_use]
    pub fn to_escape(&self, bright_is_bold: bool) -> String {
        let fg = match self.foreground {
            ColorRef::Default => "39".to_string(),
            ColorRef::Basic(n) if n < 8 => (30 + n).to_string(),
            ColorRef::Basic(n) if bright_is_bold => format!("1;{}", 30 + n - 8),
            ColorRef::Basic(n) => (90 + n - 8).to_string(),
            high => format!("38;5;{}", high.index().unwrap_or(0)),
        };

        let mut st = String::new();
        if self.bold() {
            st.push_str("1;");
        }
        if self.underline() {
            st.push_str("4;");
        }
        if self.standout() {
            st.push_str("7;");
        }

        let bg = match self.background {
            ColorRef::Default => "49".to_string(),
            ColorRef::Basic(n) if n < 8 => (40 + n).to_string(),
            ColorRef::Basic(n) => (100 + n - 8).to_string(),
            high => format!("48;5;{}", high.index().unwrap_or(0)),
        };

        format!("\x1b[0;{fg};{st}{bg}m")
    }

    /// The foreground descriptor, settings included.
    #[must_use]
    pub fn foreground_desc(&self) -> String {
        let mut parts = vec![self.foreground.describe()];
        for (flag, name) in [
            (Settings::BOLD, "bold"),
            (Settings::UNDERLINE, "underline"),
            (Settings::STANDOUT, "standout"),
        ] {
            if self.settings.contains(flag) {
                parts.push(name.to_string());
            }
        }
        parts.join(",")
    }
}

impl fmt::Display for AttrSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on {}", self.foreground_desc(), self.background)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
