// SPDX-License-Identifier: MIT
//
// Configuration error types.
//
// Runtime I/O keeps using `io::Result` throughout the crate. These enums
// cover the mistakes a caller can make while describing colors and
// palettes, which are reported at registration time and never at render
// time.

use std::io;

use thiserror::Error;

/// A color or attribute descriptor could not be used.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ColorError {
    /// The descriptor is not a known name or color syntax.
    #[error("unrecognised color specification {0:?}")]
    Unrecognised(String),

    /// The color needs more palette entries than the declared depth allows.
    #[error("color {desc:?} requires {required} colors but the depth is {depth}")]
    DepthExceeded {
        desc: String,
        required: u16,
        depth: u16,
    },

    /// The same setting (`bold`, `underline`, `standout`) appears twice.
    #[error("setting {setting:?} specified more than once in {spec:?}")]
    DuplicateSetting { setting: String, spec: String },

    /// More than one color was given for one side.
    #[error("more than one color given in {0:?}")]
    MultipleColors(String),

    /// Backgrounds carry a color only.
    #[error("background {0:?} may not carry settings")]
    BackgroundSetting(String),

    /// 16-color terminals cannot show a bright background.
    #[error("background {0:?} needs bright colors, not available with 16 colors")]
    BrightBackground(String),

    /// Depth must be 1, 16, 88 or 256.
    #[error("invalid color depth {0}, expected 1, 16, 88 or 256")]
    InvalidDepth(u16),
}

/// A palette entry could not be registered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaletteError {
    /// One of the entry's descriptors failed to parse.
    #[error("palette entry {name:?}: {source}")]
    Color { name: String, source: ColorError },

    /// Entries are fixed once the screen is started.
    #[error("palette entries must be registered before the screen is started")]
    ScreenActive,
}

/// Failure of the GPM mouse helper.
///
/// Never fatal: the session drops mouse augmentation and keeps decoding
/// keyboard input.
#[derive(Debug, Error)]
pub enum GpmError {
    /// The helper process could not be started or read.
    #[error("gpm helper I/O: {0}")]
    Io(#[from] io::Error),

    /// The helper printed something that is not an event line.
    #[error("malformed gpm event line {0:?}")]
    Malformed(String),
}
