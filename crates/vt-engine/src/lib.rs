// SPDX-License-Identifier: MIT
//
// vt-engine — terminal control-protocol engine.
//
// Two directions over one tty. Inbound, raw bytes become logical events:
// keys with modifiers, mouse reports, cursor position reports, resizes.
// The decoder is a streaming state machine over a prefix trie and copes
// with input split at any byte. Outbound, a canvas of styled text runs
// becomes the fewest escape sequences that bring the terminal up to date,
// with colors quantized to what the terminal can show.
//
// No terminal library underneath: termios, poll and escape sequences
// directly.

pub mod canvas;
pub mod color;
pub mod error;
pub mod escape;
#[cfg(unix)]
pub mod event_loop;
#[cfg(unix)]
pub mod gpm;
pub mod input;
pub mod mouse;
pub mod output;
pub mod palette;
pub mod poll;
pub mod render;
pub mod resize;
pub mod screen;
pub mod terminal;
pub mod width;

pub use canvas::{Canvas, Cell, Charset, Row, Style};
pub use color::{AttrSpec, ColorRef, Depth, Settings};
pub use error::{ColorError, GpmError, PaletteError};
pub use input::{Decoder, DecoderConfig, Event};
pub use mouse::{MouseAction, MouseEvent};
pub use palette::Palette;
pub use render::{DisplayMode, RenderOutcome, Renderer, TerminalProperties};
pub use screen::{Query, RawScreen, ScreenBackend, ScreenConfig};
pub use terminal::Size;
