// Copyright (c) 2026 rezky_nightky

mod audio;
mod config;
mod droplet;
mod error;
mod field;
mod frame;
mod glyphs;
mod graph;
mod loader;
mod motion;
mod overlay;
mod palette;
mod scheduler;
mod stage;
mod surface;
mod terminal;
mod theme;

use std::env;
use std::path::Path;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[cfg(unix)]
use std::thread;

use anyhow::Context;
use clap::builder::styling::{AnsiColor as ClapAnsiColor, Color as ClapColor};
use clap::builder::styling::{Effects as ClapEffects, Style as ClapStyle};
use clap::builder::Styles as ClapStyles;
use clap::{CommandFactory, FromArgMatches};
use crossterm::event::{Event, KeyEventKind};
use tracing_subscriber::EnvFilter;

#[cfg(unix)]
use signal_hook::consts::{SIGHUP, SIGINT, SIGTERM};
#[cfg(unix)]
use signal_hook::iterator::Signals;

use crate::audio::{AudioManager, BellSink};
use crate::config::{
    color_enabled_stdout, default_params_usage_for_help, print_list_themes, Args, Settings,
    Tunables,
};
use crate::frame::Frame;
use crate::motion::MotionManager;
use crate::palette::{quantize, ColorMode};
use crate::stage::{input_from_event, Capabilities, Control, Stage};
use crate::terminal::{restore_terminal_best_effort, Terminal};
use crate::theme::{ThemeHandle, ThemeManager};

const LOG_ENV: &str = "GLYPHRAIN_LOG";

const HELP_TEMPLATE_PLAIN: &str = "\
{before-help}{about-with-newline}
USAGE:
  {usage}

{all-args}{after-help}";

const HELP_TEMPLATE_COLOR: &str = "\
{before-help}{about-with-newline}
\x1b[1;36mUSAGE:\x1b[0m
  {usage}

{all-args}{after-help}";

fn clap_styles() -> ClapStyles {
    ClapStyles::styled()
        .header(
            ClapStyle::new()
                .effects(ClapEffects::BOLD)
                .fg_color(Some(ClapColor::Ansi(ClapAnsiColor::Cyan))),
        )
        .usage(
            ClapStyle::new()
                .effects(ClapEffects::BOLD)
                .fg_color(Some(ClapColor::Ansi(ClapAnsiColor::Green))),
        )
        .literal(ClapStyle::new().fg_color(Some(ClapColor::Ansi(ClapAnsiColor::Yellow))))
        .placeholder(ClapStyle::new().fg_color(Some(ClapColor::Ansi(ClapAnsiColor::Magenta))))
}

fn detect_color_mode_auto() -> ColorMode {
    let colorterm = env::var("COLORTERM")
        .unwrap_or_default()
        .to_ascii_lowercase();
    if colorterm.contains("truecolor") || colorterm.contains("24bit") {
        return ColorMode::TrueColor;
    }

    let term = env::var("TERM").unwrap_or_default().to_ascii_lowercase();
    if term == "dumb" {
        return ColorMode::Mono;
    }
    ColorMode::Color256
}

/// Logs go to a file only; the alternate screen owns stdout and stderr.
fn init_logging(path: &Path) -> anyhow::Result<()> {
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open log file {}", path.display()))?;
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install logger: {}", e))?;
    Ok(())
}

fn print_info() {
    println!("Version: v{}", env!("CARGO_PKG_VERSION"));
    println!("Build: {}", env!("GLYPHRAIN_BUILD"));
    let sha = env!("GLYPHRAIN_GIT_SHA");
    if !sha.is_empty() {
        println!("Commit: {}", sha);
    }
    println!("Copyright: (c) 2026 {}", env!("CARGO_PKG_AUTHORS"));
    println!("License: {}", env!("CARGO_PKG_LICENSE"));
    println!("Source: {}", env!("CARGO_PKG_REPOSITORY"));
}

fn main() -> anyhow::Result<()> {
    std::panic::set_hook(Box::new(|info| {
        restore_terminal_best_effort();
        eprintln!("{}", info);
    }));

    #[cfg(unix)]
    {
        if let Ok(mut signals) = Signals::new([SIGINT, SIGTERM, SIGHUP]) {
            thread::spawn(move || {
                if let Some(sig) = signals.forever().next() {
                    restore_terminal_best_effort();
                    std::process::exit(128 + sig);
                }
            });
        }
    }

    #[cfg(windows)]
    {
        if let Err(e) = ctrlc::set_handler(|| {
            restore_terminal_best_effort();
            std::process::exit(130);
        }) {
            eprintln!("failed to install Ctrl-C handler: {}", e);
        }
    }

    let mut cmd = Args::command();
    cmd = cmd.styles(clap_styles());
    cmd = cmd.before_help(default_params_usage_for_help());
    let help_template = if color_enabled_stdout() {
        HELP_TEMPLATE_COLOR
    } else {
        HELP_TEMPLATE_PLAIN
    };
    cmd = cmd.help_template(help_template);
    cmd.build();

    if cmd.get_arguments().any(|a| a.get_id().as_str() == "help") {
        cmd = cmd.mut_arg("help", |a| a.help_heading("HELP"));
    }
    cmd.build();

    let matches = cmd.get_matches();
    let args = Args::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());

    if args.list_themes {
        print_list_themes();
        return Ok(());
    }

    if args.version {
        println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    if args.info {
        print_info();
        return Ok(());
    }

    if let Some(path) = &args.log_file {
        init_logging(path)?;
    }

    let tunables = match &args.config {
        Some(path) => Tunables::load(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => Tunables::default(),
    };
    let settings = Settings::resolve(&args, tunables)?;
    let color_mode = settings.color_mode.unwrap_or_else(detect_color_mode_auto);
    let metrics = settings.stage.metrics;

    let colors = ThemeHandle::default();
    let caps = Capabilities::build(
        ThemeManager::new(&settings.theme, colors.clone()),
        AudioManager::new(!settings.mute, settings.volume, Box::new(BellSink)),
        MotionManager::from_env(settings.reduced_motion),
    );

    let mut term = Terminal::new()?;
    let (w, h) = term.size()?;

    let mut stage = Stage::new(settings.stage.clone(), colors, caps, w, h);
    stage.boot();

    let mut frame_bg = quantize(stage.background_color(), color_mode);
    let mut frame = Frame::new(w, h, frame_bg);

    let start_time = Instant::now();
    let end_time = settings.duration.map(|d| start_time + d);
    let target_period = Duration::from_secs_f64(1.0 / settings.fps);
    let mut next_frame = Instant::now();
    let mut running = true;

    tracing::info!(
        cols = w,
        rows = h,
        fps = settings.fps,
        ?color_mode,
        "glyphrain started"
    );

    while running {
        if end_time.is_some_and(|end| Instant::now() >= end) {
            break;
        }
        let mut pending_resize: Option<(u16, u16)> = None;

        loop {
            while Terminal::poll_event(Duration::from_millis(0))? {
                let ev = Terminal::read_event()?;
                match ev {
                    Event::Resize(nw, nh) => {
                        pending_resize = Some((nw, nh));
                    }
                    Event::Key(k) if k.kind == KeyEventKind::Press && settings.screensaver => {
                        running = false;
                        break;
                    }
                    other => {
                        let Some(input) = input_from_event(&other, metrics) else {
                            continue;
                        };
                        if stage.handle(input) == Control::Quit {
                            running = false;
                            break;
                        }
                    }
                }
            }

            if !running || pending_resize.is_some() {
                break;
            }

            let now = Instant::now();
            if now >= next_frame {
                break;
            }

            let mut timeout = next_frame - now;
            if let Some(end) = end_time {
                if now >= end {
                    break;
                }
                timeout = timeout.min(end - now);
            }
            let _ = Terminal::poll_event(timeout)?;
        }

        if !running {
            break;
        }

        if let Some((nw, nh)) = pending_resize {
            stage.resize(nw, nh);
            frame = Frame::new(nw, nh, frame_bg);
        }

        stage.pump(target_period);

        let bg = quantize(stage.background_color(), color_mode);
        if bg != frame_bg {
            frame_bg = bg;
            frame.clear_with_bg(bg);
        }
        stage.compose(&mut frame, color_mode);
        if frame.is_dirty_all() || !frame.dirty_indices().is_empty() {
            term.draw(&mut frame)?;
        }

        next_frame += target_period;
        let now = Instant::now();
        if now > next_frame {
            next_frame = now;
        }
    }

    stage.shutdown();
    drop(term);
    tracing::info!(elapsed_s = start_time.elapsed().as_secs_f64(), "glyphrain stopped");
    Ok(())
}
