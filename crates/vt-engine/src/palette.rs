// SPDX-License-Identifier: MIT
//
// Named attributes resolved for every terminal depth.
//
// An application registers each style once, up front, with descriptors
// for 16-color terminals and optionally better ones for 88/256-color
// terminals. All four variants are built eagerly so a bad descriptor is
// reported at registration, long before anything is drawn.

use std::collections::HashMap;

use tracing::debug;

use crate::canvas::Style;
use crate::color::{AttrSpec, Depth};
use crate::error::{ColorError, PaletteError};

/// The four depth variants of one palette entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaletteEntry {
    pub mono: AttrSpec,
    pub basic: AttrSpec,
    pub high_88: AttrSpec,
    pub high_256: AttrSpec,
}

impl PaletteEntry {
    /// The variant to use on a terminal with `depth` colors.
    #[must_use]
    pub const fn for_depth(&self, depth: Depth) -> &AttrSpec {
        match depth {
            Depth::Mono => &self.mono,
            Depth::Basic => &self.basic,
            Depth::High88 => &self.high_88,
            Depth::High256 => &self.high_256,
        }
    }
}

/// `hN` with N above 15 means different colors in the 88 and 256 palettes.
fn uses_large_direct_index(desc: &str) -> bool {
    desc.split(',').map(str::trim).any(|part| {
        part.strip_prefix('h')
            .and_then(|n| n.parse::<u16>().ok())
            .is_some_and(|n| n > 15)
    })
}

/// Palette name → attribute variants.
#[derive(Debug, Clone, Default)]
pub struct Palette {
    entries: HashMap<String, PaletteEntry>,
}

impl Palette {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the entry `name`.
    ///
    /// - `fg`, `bg`: descriptors for 16-color terminals.
    /// - `mono`: settings for monochrome terminals, `default` when `None`.
    /// - `fg_high`, `bg_high`: descriptors for 88/256-color terminals,
    ///   falling back to `fg` and `bg`.
    ///
    /// The 88-color variant reuses the 16-color one when a high descriptor
    /// is an `hN` index above 15, since those indexes name different
    /// colors in the two palettes.
    ///
    /// # Errors
    ///
    /// [`PaletteError::Color`] naming the entry and the failing descriptor.
    pub fn register_entry(
        &mut self,
        name: &str,
        fg: &str,
        bg: &str,
        mono: Option<&str>,
        fg_high: Option<&str>,
        bg_high: Option<&str>,
    ) -> Result<(), PaletteError> {
        let wrap = |source: ColorError| PaletteError::Color {
            name: name.to_string(),
            source,
        };

        let basic = AttrSpec::new(fg, bg, Depth::Basic).map_err(wrap)?;
        let mono = AttrSpec::new(mono.unwrap_or("default"), "default", Depth::Mono).map_err(wrap)?;
        let fg_high = fg_high.unwrap_or(fg);
        let bg_high = bg_high.unwrap_or(bg);
        let high_256 = AttrSpec::new(fg_high, bg_high, Depth::High256).map_err(wrap)?;
        let high_88 = if uses_large_direct_index(fg_high) || uses_large_direct_index(bg_high) {
            basic
        } else {
            AttrSpec::new(fg_high, bg_high, Depth::High88).map_err(wrap)?
        };

        debug!(name, %basic, %high_256, "palette entry registered");
        self.entries.insert(
            name.to_string(),
            PaletteEntry {
                mono,
                basic,
                high_88,
                high_256,
            },
        );
        Ok(())
    }

    /// Look up an entry.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&PaletteEntry> {
        self.entries.get(name)
    }

    /// Number of registered entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The attribute a run with `style` gets at `depth`.
    ///
    /// Unknown names resolve to default colors without settings.
    #[must_use]
    pub fn resolve(&self, style: &Style, depth: Depth) -> AttrSpec {
        match style {
            Style::Spec(spec) => *spec,
            Style::Named(name) => self
                .entries
                .get(name)
                .map_or_else(AttrSpec::plain, |entry| *entry.for_depth(depth)),
        }
    }
}
