// Copyright (c) 2026 rezky_nightky

use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use clap::Parser;
use serde::Deserialize;

use crate::droplet::SpeedRange;
use crate::error::{GlyphError, GlyphResult};
use crate::field::FieldConfig;
use crate::glyphs::{glyph_set_from_str, parse_user_hex_chars, GlyphPool};
use crate::graph::{GraphConfig, RingSpec};
use crate::loader::{default_phases, LoaderConfig, Phase};
use crate::palette::ColorMode;
use crate::stage::{LayerToggles, StageConfig};
use crate::surface::CellMetrics;
use crate::theme::Theme;

pub const DEFAULT_PARAMS_USAGE: &str = "DEFAULT PARAMS USAGE:\n  glyphrain --fps 60 --theme matrix --glyphs matrix --speed 1,4 --glyph-size 16 --volume 0.3";

pub fn color_enabled_stdout() -> bool {
    if std::env::var_os("NO_COLOR").is_some() {
        return false;
    }
    if matches!(std::env::var("CLICOLOR").ok().as_deref(), Some("0")) {
        return false;
    }
    std::io::stdout().is_terminal()
}

fn colorize_usage(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 32);
    for line in text.lines() {
        if !line.starts_with(' ') && line.ends_with(':') {
            out.push_str("\x1b[1;36m");
            out.push_str(line);
            out.push_str("\x1b[0m\n");
        } else if let Some(rest) = line.strip_prefix("  glyphrain") {
            out.push_str("  \x1b[1;34mglyphrain\x1b[0m");
            out.push_str(rest);
            out.push('\n');
        } else {
            out.push_str(line);
            out.push('\n');
        }
    }
    out
}

pub fn default_params_usage_for_help() -> String {
    if color_enabled_stdout() {
        colorize_usage(DEFAULT_PARAMS_USAGE)
    } else {
        DEFAULT_PARAMS_USAGE.to_string()
    }
}

/// `MIN,MAX` in pixels per tick.
impl FromStr for SpeedRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (a, b) = s
            .split_once(',')
            .ok_or_else(|| "expected: MIN,MAX".to_string())?;
        let min: f32 = a
            .trim()
            .parse()
            .map_err(|_| "invalid min value".to_string())?;
        let max: f32 = b
            .trim()
            .parse()
            .map_err(|_| "invalid max value".to_string())?;
        if !min.is_finite() || !max.is_finite() || min < 0.0 || max < 0.0 {
            return Err("speeds must be finite and >= 0".to_string());
        }
        Ok(SpeedRange::new(min, max))
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "glyphrain",
    version,
    disable_version_flag = true,
    about = "Code rain, spiderweb and loader animations for the terminal"
)]
pub struct Args {
    #[arg(
        long = "duration",
        help_heading = "GENERAL",
        help = "Stop after N seconds (min 0.1 max 86400; <=0 disables)"
    )]
    pub duration: Option<f64>,

    #[arg(
        short = 's',
        long = "screensaver",
        help_heading = "GENERAL",
        help = "Screensaver mode (exit on keypress)"
    )]
    pub screensaver: bool,

    #[arg(
        long = "config",
        value_name = "FILE",
        help_heading = "GENERAL",
        help = "Load tunables from a JSON file"
    )]
    pub config: Option<PathBuf>,

    #[arg(
        long = "log-file",
        value_name = "PATH",
        help_heading = "GENERAL",
        help = "Write logs to PATH (filter via GLYPHRAIN_LOG)"
    )]
    pub log_file: Option<PathBuf>,

    #[arg(long = "no-background", help_heading = "GENERAL", help = "Disable the background rain")]
    pub no_background: bool,

    #[arg(long = "no-rain", help_heading = "GENERAL", help = "Disable the code rain")]
    pub no_rain: bool,

    #[arg(long = "no-web", help_heading = "GENERAL", help = "Disable the spiderweb")]
    pub no_web: bool,

    #[arg(long = "no-loader", help_heading = "GENERAL", help = "Skip the loading sequence")]
    pub no_loader: bool,

    #[arg(
        long = "seed",
        help_heading = "GENERAL",
        help = "Seed every random generator (reproducible runs)"
    )]
    pub seed: Option<u64>,

    #[arg(
        short = 't',
        long = "theme",
        default_value = "matrix",
        help_heading = "APPEARANCE",
        help = "Color theme (see --list-themes)"
    )]
    pub theme: String,

    #[arg(
        long = "colormode",
        help_heading = "APPEARANCE",
        help = "Force color mode (allowed: 0,16,8/256,24/32). Default: 24-bit if supported (COLORTERM), else 8-bit"
    )]
    pub colormode: Option<u16>,

    #[arg(
        long = "glyphs",
        default_value = "matrix",
        help_heading = "APPEARANCE",
        help = "Glyph set: matrix, tokens, binary"
    )]
    pub glyphs: String,

    #[arg(
        long = "chars",
        help_heading = "APPEARANCE",
        help = "Custom glyphs as comma-separated hex code points (e.g. 30,31)"
    )]
    pub chars: Option<String>,

    #[arg(
        long = "glyph-size",
        help_heading = "APPEARANCE",
        help = "Rain glyph size in pixels (min 4 max 128)"
    )]
    pub glyph_size: Option<f32>,

    #[arg(
        long = "reduced-motion",
        help_heading = "APPEARANCE",
        help = "Static loader and no animated layers (also GLYPHRAIN_REDUCED_MOTION)"
    )]
    pub reduced_motion: bool,

    #[arg(long = "mute", help_heading = "APPEARANCE", help = "Start with sound cues off")]
    pub mute: bool,

    #[arg(
        long = "volume",
        help_heading = "APPEARANCE",
        help = "Cue volume (min 0 max 1)"
    )]
    pub volume: Option<f32>,

    #[arg(
        short = 'f',
        long = "fps",
        default_value_t = 60.0,
        help_heading = "PERFORMANCE",
        help = "Target FPS (min 1 max 240)"
    )]
    pub fps: f64,

    #[arg(
        short = 'S',
        long = "speed",
        value_name = "MIN,MAX",
        help_heading = "PERFORMANCE",
        help = "Rain speed range in pixels per frame"
    )]
    pub speed: Option<SpeedRange>,

    #[arg(
        long = "list-themes",
        help_heading = "HELP",
        help = "List available themes and exit"
    )]
    pub list_themes: bool,

    #[arg(
        long = "info",
        short = 'i',
        help_heading = "HELP",
        help = "Print version info and exit"
    )]
    pub info: bool,

    #[arg(
        long = "version",
        short = 'v',
        help_heading = "HELP",
        help = "Print version and exit"
    )]
    pub version: bool,
}

pub fn print_list_themes() {
    if color_enabled_stdout() {
        println!("\x1b[1;36mAVAILABLE THEMES:\x1b[0m");
    } else {
        println!("AVAILABLE THEMES:");
    }
    println!();
    println!("VALUE        COLOR      BACKGROUND");
    for theme in [Theme::Matrix, Theme::Light] {
        let c = theme.colors();
        println!("{:<12} {:<10} {}", theme.name(), c.color, c.background);
    }
}

/// Tunables read from `--config`. Missing keys keep their defaults.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Tunables {
    pub glyph_size: f32,
    pub speed: (f32, f32),
    pub trail_length: usize,
    pub trail_spacing: f32,
    pub morph_probability: f32,
    pub glitch_probability: f32,
    pub glitch_trigger_probability: f32,
    pub glitch_duration_ms: f32,
    pub intensity_factor: f32,
    pub fade_alpha: f32,
    pub background_max_drops: usize,
    pub rings: Vec<RingSpec>,
    pub edge_max_distance: f32,
    pub bulge_radius: f32,
    pub bulge_strength: f32,
    pub loader_phases: Vec<Phase>,
    pub loader_complete_message: String,
    pub loader_step_ms: f32,
    pub loader_hold_ms: f32,
    pub loader_explosion_ms: f32,
    pub loader_fade_ms: f32,
    pub volume: f32,
}

impl Default for Tunables {
    fn default() -> Self {
        let rain = FieldConfig::rain();
        let graph = GraphConfig::default();
        let loader = LoaderConfig::default();
        Self {
            glyph_size: rain.glyph_size,
            speed: (rain.speed.min, rain.speed.max),
            trail_length: rain.trail_length,
            trail_spacing: rain.trail_spacing,
            morph_probability: rain.morph_probability,
            glitch_probability: rain.glitch_probability,
            glitch_trigger_probability: rain.glitch_trigger_probability,
            glitch_duration_ms: rain.glitch_duration_ms,
            intensity_factor: rain.intensity_factor,
            fade_alpha: rain.fade_alpha,
            background_max_drops: FieldConfig::background().max_drops.unwrap_or(50),
            rings: graph.rings,
            edge_max_distance: graph.max_distance,
            bulge_radius: graph.bulge_radius,
            bulge_strength: graph.bulge_strength,
            loader_phases: default_phases(),
            loader_complete_message: loader.complete_message,
            loader_step_ms: loader.step_ms,
            loader_hold_ms: loader.hold_ms,
            loader_explosion_ms: loader.explosion_ms,
            loader_fade_ms: loader.fade_ms,
            volume: 0.3,
        }
    }
}

fn require_range(name: &str, v: f32, min: f32, max: f32) -> GlyphResult<f32> {
    if !v.is_finite() {
        return Err(GlyphError::config(format!(
            "failed to apply {} {} (must be a finite number)",
            name, v
        )));
    }
    if v < min || v > max {
        return Err(GlyphError::config(format!(
            "failed to apply {} {} (min {} max {})",
            name, v, min, max
        )));
    }
    Ok(v)
}

fn require_count(name: &str, v: usize, max: usize) -> GlyphResult<usize> {
    if v > max {
        return Err(GlyphError::config(format!(
            "failed to apply {} {} (max {})",
            name, v, max
        )));
    }
    Ok(v)
}

impl Tunables {
    pub fn from_json(text: &str) -> GlyphResult<Self> {
        serde_json::from_str(text).map_err(|e| GlyphError::serde(e.to_string()))
    }

    pub fn load(path: &Path) -> GlyphResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let t = Self::from_json(&text)?;
        tracing::info!(path = %path.display(), "tunables loaded");
        Ok(t)
    }

    pub fn validate(&self) -> GlyphResult<()> {
        require_range("glyph_size", self.glyph_size, 4.0, 128.0)?;
        require_range("speed min", self.speed.0, 0.0, 1000.0)?;
        require_range("speed max", self.speed.1, 0.0, 1000.0)?;
        require_count("trail_length", self.trail_length, 200)?;
        require_range("trail_spacing", self.trail_spacing, 1.0, 1000.0)?;
        for (name, p) in [
            ("morph_probability", self.morph_probability),
            ("glitch_probability", self.glitch_probability),
            ("glitch_trigger_probability", self.glitch_trigger_probability),
        ] {
            require_range(name, p, 0.0, 1.0)?;
        }
        require_range("glitch_duration_ms", self.glitch_duration_ms, 0.0, 60_000.0)?;
        require_range("intensity_factor", self.intensity_factor, 1.0, 10.0)?;
        require_range("fade_alpha", self.fade_alpha, 0.001, 1.0)?;
        require_count("background_max_drops", self.background_max_drops, 10_000)?;
        require_count("rings", self.rings.len(), 64)?;
        for ring in &self.rings {
            require_range("ring radius", ring.radius, 0.0, 100_000.0)?;
            require_count("ring count", ring.count, 2_000)?;
        }
        require_range("edge_max_distance", self.edge_max_distance, 0.0, 100_000.0)?;
        require_range("bulge_radius", self.bulge_radius, 0.0, 100_000.0)?;
        require_range("bulge_strength", self.bulge_strength, -10_000.0, 10_000.0)?;
        for phase in &self.loader_phases {
            require_range("phase target", phase.target, 0.0, 100.0)?;
        }
        require_range("loader_step_ms", self.loader_step_ms, 1.0, 60_000.0)?;
        require_range("loader_hold_ms", self.loader_hold_ms, 0.0, 60_000.0)?;
        require_range("loader_explosion_ms", self.loader_explosion_ms, 0.0, 60_000.0)?;
        require_range("loader_fade_ms", self.loader_fade_ms, 0.0, 60_000.0)?;
        require_range("volume", self.volume, 0.0, 1.0)?;
        Ok(())
    }
}

pub fn parse_color_mode(m: u16) -> GlyphResult<ColorMode> {
    match m {
        0 => Ok(ColorMode::Mono),
        16 => Ok(ColorMode::Color16),
        8 | 256 => Ok(ColorMode::Color256),
        24 | 32 => Ok(ColorMode::TrueColor),
        _ => Err(GlyphError::config(format!(
            "invalid --colormode: {} (allowed: 0,16,8/256,24/32)",
            m
        ))),
    }
}

/// Everything the binary needs after CLI and file settings are merged and checked.
#[derive(Clone, Debug)]
pub struct Settings {
    pub fps: f64,
    pub duration: Option<Duration>,
    pub screensaver: bool,
    pub theme: String,
    pub color_mode: Option<ColorMode>,
    pub reduced_motion: bool,
    pub mute: bool,
    pub volume: f32,
    pub stage: StageConfig,
}

impl Settings {
    pub fn resolve(args: &Args, mut tunables: Tunables) -> GlyphResult<Self> {
        if let Some(g) = args.glyph_size {
            tunables.glyph_size = g;
        }
        if let Some(s) = args.speed {
            tunables.speed = (s.min, s.max);
        }
        if let Some(v) = args.volume {
            tunables.volume = v;
        }
        tunables.validate()?;

        let fps = require_range("--fps", args.fps as f32, 1.0, 240.0)? as f64;
        let duration = match args.duration {
            Some(s) if !s.is_finite() => {
                return Err(GlyphError::config(format!(
                    "failed to apply --duration {} (must be a finite number)",
                    s
                )))
            }
            Some(s) if s > 0.0 => {
                let s = require_range("--duration", s as f32, 0.1, 86_400.0)?;
                Some(Duration::from_secs_f32(s))
            }
            _ => None,
        };
        let color_mode = args.colormode.map(parse_color_mode).transpose()?;

        let pool = match &args.chars {
            Some(spec) => {
                let chars = parse_user_hex_chars(spec).map_err(GlyphError::config)?;
                if chars.is_empty() {
                    return Err(GlyphError::config("--chars: no characters given"));
                }
                GlyphPool::from_chars(chars)
            }
            None => GlyphPool::for_set(glyph_set_from_str(&args.glyphs).map_err(GlyphError::config)?),
        };

        let t = &tunables;
        let rain = FieldConfig {
            glyph_size: t.glyph_size,
            speed: SpeedRange::new(t.speed.0, t.speed.1),
            trail_length: t.trail_length,
            trail_spacing: t.trail_spacing,
            morph_probability: t.morph_probability,
            glitch_probability: t.glitch_probability,
            glitch_trigger_probability: t.glitch_trigger_probability,
            glitch_duration_ms: t.glitch_duration_ms,
            intensity_factor: t.intensity_factor,
            fade_alpha: t.fade_alpha,
            ..FieldConfig::rain()
        };
        let background = FieldConfig {
            max_drops: Some(t.background_max_drops),
            ..FieldConfig::background()
        };
        let graph = GraphConfig {
            rings: t.rings.clone(),
            max_distance: t.edge_max_distance,
            bulge_radius: t.bulge_radius,
            bulge_strength: t.bulge_strength,
        };
        let loader = LoaderConfig {
            phases: t.loader_phases.clone(),
            complete_message: t.loader_complete_message.clone(),
            step_ms: t.loader_step_ms,
            hold_ms: t.loader_hold_ms,
            explosion_ms: t.loader_explosion_ms,
            fade_ms: t.loader_fade_ms,
            ..LoaderConfig::default()
        };

        Ok(Self {
            fps,
            duration,
            screensaver: args.screensaver,
            theme: args.theme.clone(),
            color_mode,
            reduced_motion: args.reduced_motion,
            mute: args.mute,
            volume: t.volume,
            stage: StageConfig {
                layers: LayerToggles {
                    background: !args.no_background,
                    rain: !args.no_rain,
                    web: !args.no_web,
                    loader: !args.no_loader,
                },
                pool,
                rain,
                background,
                graph,
                loader,
                metrics: CellMetrics::default(),
                seed: args.seed,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["glyphrain"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn defaults_resolve_cleanly() {
        let s = Settings::resolve(&args(&[]), Tunables::default()).unwrap();
        assert_eq!(s.fps, 60.0);
        assert_eq!(s.duration, None);
        assert_eq!(s.volume, 0.3);
        assert_eq!(s.stage.layers, LayerToggles::default());
        assert_eq!(s.stage.rain, FieldConfig::rain());
        assert_eq!(s.stage.graph, GraphConfig::default());
    }

    #[test]
    fn speed_flag_parses_and_sorts() {
        let a = args(&["--speed", "5,2"]);
        assert_eq!(a.speed, Some(SpeedRange::new(2.0, 5.0)));
        assert!(Args::try_parse_from(["glyphrain", "--speed", "3"]).is_err());
        assert!(Args::try_parse_from(["glyphrain", "--speed", "-1,2"]).is_err());
    }

    #[test]
    fn cli_overrides_file_tunables() {
        let t = Tunables::from_json(r#"{"glyph_size": 20, "volume": 0.5}"#).unwrap();
        let s = Settings::resolve(&args(&["--glyph-size", "12", "--speed", "1,2"]), t).unwrap();
        assert_eq!(s.stage.rain.glyph_size, 12.0);
        assert_eq!(s.stage.rain.speed, SpeedRange::new(1.0, 2.0));
        assert_eq!(s.volume, 0.5);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let t = Tunables::from_json(
            r#"{"rings": [{"radius": 200, "count": 6}], "loader_phases": [{"message": "GO", "target": 100}]}"#,
        )
        .unwrap();
        assert_eq!(t.rings, vec![RingSpec::new(200.0, 6)]);
        assert_eq!(t.loader_phases.len(), 1);
        assert_eq!(t.trail_length, 15);
        assert_eq!((t.loader_explosion_ms, t.loader_fade_ms), (1500.0, 500.0));
    }

    #[test]
    fn bad_json_is_a_serde_error() {
        let err = Tunables::from_json(r#"{"glyph_sise": 3}"#).unwrap_err();
        assert!(matches!(err, GlyphError::Serde(_)));
        assert!(Tunables::from_json("{").is_err());
    }

    #[test]
    fn out_of_range_values_are_config_errors() {
        let t = Tunables {
            morph_probability: 1.5,
            ..Tunables::default()
        };
        assert!(matches!(t.validate(), Err(GlyphError::Config(_))));

        let slower = Tunables::from_json(r#"{"intensity_factor": 0.5}"#).unwrap();
        let err = slower.validate().unwrap_err();
        assert!(err.to_string().contains("intensity_factor"));
        let negative_fade = Tunables::from_json(r#"{"loader_fade_ms": -1}"#).unwrap();
        assert!(negative_fade.validate().is_err());

        let err = Settings::resolve(&args(&["--fps", "500"]), Tunables::default()).unwrap_err();
        assert!(err.to_string().contains("--fps"));
        assert!(Settings::resolve(&args(&["--volume", "2"]), Tunables::default()).is_err());
        assert!(Settings::resolve(&args(&["--colormode", "7"]), Tunables::default()).is_err());
    }

    #[test]
    fn duration_zero_disables() {
        let s = Settings::resolve(&args(&["--duration", "0"]), Tunables::default()).unwrap();
        assert_eq!(s.duration, None);
        let s = Settings::resolve(&args(&["--duration", "2"]), Tunables::default()).unwrap();
        assert_eq!(s.duration, Some(Duration::from_secs(2)));
    }

    #[test]
    fn glyph_sources() {
        let s = Settings::resolve(&args(&["--chars", "30,31"]), Tunables::default()).unwrap();
        assert_eq!(s.stage.pool, GlyphPool::from_chars(['0', '1']));
        let s = Settings::resolve(&args(&["--glyphs", "binary"]), Tunables::default()).unwrap();
        assert_eq!(s.stage.pool, GlyphPool::binary());
        assert!(Settings::resolve(&args(&["--glyphs", "emoji"]), Tunables::default()).is_err());
    }

    #[test]
    fn layer_switches() {
        let s = Settings::resolve(&args(&["--no-web", "--no-loader"]), Tunables::default()).unwrap();
        assert!(!s.stage.layers.web && !s.stage.layers.loader);
        assert!(s.stage.layers.rain && s.stage.layers.background);
    }

    #[test]
    fn color_modes() {
        assert_eq!(parse_color_mode(0).unwrap(), ColorMode::Mono);
        assert_eq!(parse_color_mode(256).unwrap(), ColorMode::Color256);
        assert_eq!(parse_color_mode(32).unwrap(), ColorMode::TrueColor);
    }
}
