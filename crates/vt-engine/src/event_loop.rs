// SPDX-License-Identifier: MIT
//
// Event loop — the driver that wires the engine to a real tty.
//
// One thread, one `poll()`. Each iteration waits on up to three
// descriptors: stdin, the resize self-pipe and (on the Linux console with
// mouse enabled) the GPM helper. Whatever is ready gets turned into
// events, the app handles them, and a dirty frame is painted and drawn.
//
// Waiting:
//
//   - While the decoder holds an incomplete sequence (a lone ESC, half a
//     UTF-8 character), poll no longer than its completion wait. If that
//     runs out with nothing new, the tail is flushed as final input.
//   - Otherwise poll for `idle_timeout`, or forever when it is `None`.
//
// Resizes are consumed here and nowhere else: `take()` drains the pipe,
// the size is re-queried, the screen drops its previous frame, and
// `Event::WindowResize` goes to the app ahead of any input read in the
// same iteration. The renderer only peeks at the flag, which is how a
// frame started before the signal gets abandoned.

use std::io;
use std::os::unix::io::{AsRawFd, RawFd};
use std::time::Duration;

use tracing::{debug, warn};

use crate::canvas::Canvas;
use crate::gpm::GpmTracker;
use crate::input::{Decoder, DecoderConfig, Event};
use crate::poll::{READ_BUF_SIZE, has_input, read_fd, wait_readable};
use crate::render::{RenderOutcome, TerminalProperties};
use crate::resize::ResizeNotifier;
use crate::screen::{Query, RawScreen, ScreenBackend, ScreenConfig};
use crate::terminal::{Size, Terminal};

// ─── App Trait ───────────────────────────────────────────────────────────────

/// What the app tells the loop after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Continue,
    /// Send a query to the terminal and keep going. The reply comes back
    /// as a later event.
    Query(Query),
    /// Leave the loop and restore the terminal.
    Quit,
}

/// An application driven by [`EventLoop`].
///
/// Per iteration the loop calls [`on_resize`](App::on_resize) if the
/// terminal changed size, [`on_event`](App::on_event) for each decoded
/// event, [`on_tick`](App::on_tick), and finally [`paint`](App::paint) if
/// anything made the frame dirty. Only `paint` is required.
pub trait App {
    /// Return [`Action::Quit`] to exit the loop.
    fn on_event(&mut self, _event: &Event) -> Action {
        Action::Continue
    }

    /// The screen has already adopted `size` when this is called.
    fn on_resize(&mut self, _size: Size) {}

    /// Called once per wakeup. Return `true` to request a repaint.
    fn on_tick(&mut self) -> bool {
        false
    }

    /// Produce a canvas of exactly `size`. Set its cursor to show the
    /// hardware cursor.
    fn paint(&mut self, size: Size) -> Canvas;
}

/// What the app asked for while handling a batch of events.
#[derive(Debug, Default, PartialEq, Eq)]
struct Dispatched {
    quit: bool,
    /// In the order the app asked.
    queries: Vec<Query>,
}

/// Hand `events` to the app in order.
///
/// Stops as soon as the app asks to quit; the remaining events are
/// dropped.
fn dispatch(app: &mut impl App, events: &[Event]) -> Dispatched {
    let mut out = Dispatched::default();
    for event in events {
        match app.on_event(event) {
            Action::Continue => {}
            Action::Query(query) => out.queries.push(query),
            Action::Quit => {
                out.quit = true;
                break;
            }
        }
    }
    out
}

// ─── Loop Config ─────────────────────────────────────────────────────────────

/// Event loop settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopConfig {
    /// Poll timeout with no pending input. `None` sleeps until something
    /// happens; `Some` also gives [`App::on_tick`] a steady beat.
    pub idle_timeout: Option<Duration>,
    /// Full-screen on the alternate buffer, or partial display below the
    /// shell prompt.
    pub alternate_buffer: bool,
    /// Mouse tracking, plus GPM on the Linux console.
    pub mouse: bool,
    pub decoder: DecoderConfig,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            idle_timeout: None,
            alternate_buffer: true,
            mouse: false,
            decoder: DecoderConfig::default(),
        }
    }
}

impl LoopConfig {
    const fn screen_config(&self) -> ScreenConfig {
        ScreenConfig {
            alternate_buffer: self.alternate_buffer,
            mouse: self.mouse,
        }
    }

    /// The poll timeout for the current decoder state.
    fn wait_for(&self, decoder: &Decoder) -> Option<Duration> {
        if decoder.has_pending() {
            Some(decoder.config().complete_wait)
        } else {
            self.idle_timeout
        }
    }
}

/// Whether the console mouse helper should run for this `TERM`.
fn wants_gpm(mouse: bool, term: Option<&str>) -> bool {
    mouse && term.is_some_and(|t| t.starts_with("linux"))
}

// ─── EventLoop ───────────────────────────────────────────────────────────────

/// Owns the tty, the screen drawn on stdout, and the input decoder.
///
/// # Example
///
/// ```no_run
/// use vt_engine::canvas::Canvas;
/// use vt_engine::event_loop::{Action, App, EventLoop};
/// use vt_engine::input::Event;
/// use vt_engine::terminal::Size;
///
/// struct Quitter;
///
/// impl App for Quitter {
///     fn on_event(&mut self, event: &Event) -> Action {
///         if event.is_key("q") { Action::Quit } else { Action::Continue }
///     }
///
///     fn paint(&mut self, size: Size) -> Canvas {
///         Canvas::blank(size.cols, size.rows)
///     }
/// }
///
/// let mut event_loop = EventLoop::new()?;
/// event_loop.run(&mut Quitter)?;
/// # Ok::<(), std::io::Error>(())
/// ```
pub struct EventLoop {
    terminal: Terminal,
    screen: RawScreen<io::Stdout>,
    decoder: Decoder,
    config: LoopConfig,
}

impl EventLoop {
    /// # Errors
    ///
    /// Terminal initialization failures.
    pub fn new() -> io::Result<Self> {
        Self::with_config(LoopConfig::default())
    }

    /// # Errors
    ///
    /// Terminal initialization failures.
    pub fn with_config(config: LoopConfig) -> io::Result<Self> {
        let terminal = Terminal::new()?;
        let screen = RawScreen::new(
            io::stdout(),
            terminal.size(),
            config.screen_config(),
            TerminalProperties::detect(),
        );
        Ok(Self {
            terminal,
            screen,
            decoder: Decoder::with_config(config.decoder),
            config,
        })
    }

    #[inline]
    #[must_use]
    pub fn size(&self) -> Size {
        self.screen.cols_rows()
    }

    #[inline]
    #[must_use]
    pub const fn config(&self) -> &LoopConfig {
        &self.config
    }

    /// The screen, for palette registration before [`run`](Self::run).
    #[inline]
    pub const fn screen_mut(&mut self) -> &mut RawScreen<io::Stdout> {
        &mut self.screen
    }

    /// Run until the app returns [`Action::Quit`] or stdin closes.
    ///
    /// Raw mode, the resize handler and the screen are set up here and
    /// torn down on the way out, also when the loop fails.
    ///
    /// # Errors
    ///
    /// Terminal, poll, read and write failures.
    pub fn run(&mut self, app: &mut impl App) -> io::Result<()> {
        self.terminal.enter()?;
        let notifier = match ResizeNotifier::install() {
            Ok(n) => n,
            Err(e) => {
                let _ = self.terminal.leave();
                return Err(e);
            }
        };

        let result = self.session(app, &notifier);

        // Always clean up, even if the loop errored.
        let stopped = self.screen.stop();
        drop(notifier);
        self.terminal.leave()?;

        result.and(stopped)
    }

    fn session(&mut self, app: &mut impl App, notifier: &ResizeNotifier) -> io::Result<()> {
        self.screen.start()?;
        // The size may have changed between construction and now.
        let size = self.terminal.refresh_size();
        self.screen.set_size(size);

        let mut gpm = self.start_gpm();
        self.run_inner(app, notifier, &mut gpm)
    }

    fn start_gpm(&self) -> Option<GpmTracker> {
        let term = std::env::var("TERM").ok();
        if !wants_gpm(self.config.mouse, term.as_deref()) {
            return None;
        }
        match GpmTracker::start() {
            Ok(tracker) => Some(tracker),
            Err(e) => {
                warn!(error = %e, "gpm helper unavailable, console mouse disabled");
                None
            }
        }
    }

    fn run_inner(
        &mut self,
        app: &mut impl App,
        notifier: &ResizeNotifier,
        gpm: &mut Option<GpmTracker>,
    ) -> io::Result<()> {
        let stdin: RawFd = io::stdin().as_raw_fd();
        let mut buf = [0u8; READ_BUF_SIZE];
        let mut dirty = true; // First frame always renders.

        loop {
            // ── Render if dirty ──────────────────────────────────
            if dirty {
                let size = self.screen.cols_rows();
                let canvas = app.paint(size);
                if self.screen.draw_screen(&canvas, notifier)? == RenderOutcome::Abandoned
                    && !notifier.pending()
                {
                    debug!(cols = size.cols, rows = size.rows, "canvas does not fit screen");
                }
                dirty = false;
            }

            // ── Wait ─────────────────────────────────────────────
            let mut fds = vec![stdin, notifier.fd()];
            if let Some(tracker) = gpm.as_ref() {
                fds.push(tracker.fd());
            }
            let ready = wait_readable(&fds, self.config.wait_for(&self.decoder))?;
            let is_ready = |i: usize| ready.get(i).copied().unwrap_or(false);

            let mut events = Vec::new();

            // ── Resize ───────────────────────────────────────────
            let resized = (is_ready(1) || notifier.pending()) && notifier.take();
            if resized {
                let size = self.terminal.refresh_size();
                self.screen.set_size(size);
                app.on_resize(size);
                events.push(Event::WindowResize);
            }

            // ── Terminal input ───────────────────────────────────
            if is_ready(0) {
                let n = read_fd(stdin, &mut buf)?;
                if n == 0 {
                    debug!("stdin closed");
                    let tail = self.decoder.flush();
                    let _ = dispatch(app, &tail);
                    return Ok(());
                }
                let more = has_input(stdin)?;
                events.extend(self.decoder.feed(&buf[..n], more).events);
            }

            // ── Console mouse ────────────────────────────────────
            if is_ready(2) {
                if let Some(tracker) = gpm.as_mut() {
                    match tracker.read_codes(self.decoder.button_state()) {
                        Ok(codes) => events.extend(self.decoder.feed_codes(codes, false).events),
                        Err(e) => {
                            warn!(error = %e, "gpm helper failed, console mouse disabled");
                            *gpm = None;
                        }
                    }
                }
            }

            // ── Escape timeout ───────────────────────────────────
            if !ready.iter().any(|&r| r) && !resized && self.decoder.has_pending() {
                events.extend(self.decoder.flush());
            }

            // ── Dispatch ─────────────────────────────────────────
            let dispatched = dispatch(app, &events);
            if dispatched.quit {
                return Ok(());
            }
            for query in dispatched.queries {
                self.screen.query(query)?;
            }
            if !events.is_empty() {
                dirty = true;
            }

            if app.on_tick() {
                dirty = true;
            }
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
