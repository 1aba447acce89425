// SPDX-License-Identifier: MIT
//
// vt-probe — watch the decoder and renderer work on a live terminal.
//
// Every decoded event is listed on screen as it arrives, newest at the
// bottom: key names, mouse reports with their tuple view, cursor position
// reports and resizes. Useful for checking what a terminal actually sends.
// Press c to ask for the cursor position and s for a status report; the
// replies show up as events.
//
//   vt-probe            full screen on the alternate buffer
//   vt-probe --partial  draw below the prompt, leave the output behind
//   vt-probe --mouse    enable mouse tracking (GPM on the Linux console)
//
// Set VT_PROBE_LOG=<file> to write engine logs there; RUST_LOG picks the
// level. Stdout is the screen, so logs never go to it.
//
// Layout:
//
//   title (q quits, c and s send queries)
//   ┌──────────────────────
//   events, newest last
//   status: size, resizes, held buttons

use std::collections::VecDeque;
use std::env;
use std::fs::File;
use std::process;
use std::time::Duration;

use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use vt_engine::canvas::{Canvas, text_row};
use vt_engine::event_loop::{Action, App, EventLoop, LoopConfig};
use vt_engine::input::Event;
use vt_engine::screen::{Query, ScreenBackend};
use vt_engine::terminal::Size;

/// Events kept for display.
const HISTORY: usize = 256;

// ─── Probe ───────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Probe {
    events: VecDeque<String>,
    resizes: u32,
    size: Size,
}

impl Probe {
    fn describe(event: &Event) -> String {
        match event {
            Event::Mouse(m) => {
                let (kind, button, x, y) = m.as_tuple();
                format!("{m}  ({kind}, {button}, {x}, {y})")
            }
            Event::CursorPosition { x, y } => format!("cursor position  ({x}, {y})"),
            other => other.to_string(),
        }
    }

    fn record(&mut self, line: String) {
        if self.events.len() == HISTORY {
            self.events.pop_front();
        }
        self.events.push_back(line);
    }
}

impl App for Probe {
    fn on_event(&mut self, event: &Event) -> Action {
        if event.is_key("q") || event.is_key("ctrl c") {
            return Action::Quit;
        }
        if matches!(event, Event::WindowResize) {
            self.resizes += 1;
        }
        self.record(Self::describe(event));
        if event.is_key("c") {
            Action::Query(Query::CursorPosition)
        } else if event.is_key("s") {
            Action::Query(Query::Status)
        } else {
            Action::Continue
        }
    }

    fn on_resize(&mut self, size: Size) {
        self.size = size;
    }

    fn paint(&mut self, size: Size) -> Canvas {
        self.size = size;
        let cols = size.cols;
        let rows = usize::from(size.rows);
        let mut canvas = Canvas::blank(cols, size.rows);
        if rows == 0 {
            return canvas;
        }

        canvas.paint_text(0, "title", " vt-probe  (q quits, c cursor, s status)", cols);
        if rows < 3 {
            return canvas;
        }

        let rule = format!("┌{}", "─".repeat(usize::from(cols.saturating_sub(1))));
        canvas.paint_text(1, "border", &rule, cols);

        let room = rows - 3;
        let skip = self.events.len().saturating_sub(room);
        for (i, line) in self.events.iter().skip(skip).enumerate() {
            canvas.paint_text(2 + i, "event", &format!("│ {line}"), cols);
        }

        let status = format!(
            " {}x{}  resizes {}  events {}",
            size.cols,
            size.rows,
            self.resizes,
            self.events.len()
        );
        canvas.paint_text(rows - 1, "title", &status, cols);
        canvas
    }
}

// ─── Setup ───────────────────────────────────────────────────────────────────

fn init_logging() {
    let Ok(path) = env::var("VT_PROBE_LOG") else {
        return;
    };
    let file = match File::create(&path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("vt-probe: cannot open log file {path}: {e}");
            process::exit(1);
        }
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
        .with(fmt::layer().with_writer(file).with_ansi(false))
        .init();
}

fn config_from_args(args: &[String]) -> LoopConfig {
    let mut config = LoopConfig {
        idle_timeout: Some(Duration::from_secs(1)),
        ..LoopConfig::default()
    };
    for arg in args {
        match arg.as_str() {
            "--partial" => config.alternate_buffer = false,
            "--mouse" => config.mouse = true,
            other => {
                eprintln!("vt-probe: unknown argument {other}");
                process::exit(2);
            }
        }
    }
    config
}

fn main() {
    init_logging();

    let args: Vec<String> = env::args().skip(1).collect();
    let config = config_from_args(&args);

    let mut event_loop = EventLoop::with_config(config).unwrap_or_else(|e| {
        eprintln!("vt-probe: failed to initialize terminal: {e}");
        process::exit(1);
    });

    let screen = event_loop.screen_mut();
    for (name, fg, bg, mono) in [
        ("title", "black", "light gray", Some("standout")),
        ("border", "dark cyan", "default", None),
        ("event", "light green", "default", Some("bold")),
    ] {
        if let Err(e) = screen.register_palette_entry(name, fg, bg, mono, None, None) {
            eprintln!("vt-probe: {e}");
            process::exit(1);
        }
    }

    info!(?config, "starting");
    let mut probe = Probe::default();
    if let Err(e) = event_loop.run(&mut probe) {
        eprintln!("vt-probe: {e}");
        process::exit(1);
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
