// Copyright (c) 2026 rezky_nightky

use crossterm::style::Color;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColorMode {
    Mono,
    Color16,
    Color256,
    TrueColor,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Linear mix from `self` (t = 0) to `other` (t = 1).
    pub fn mix(self, other: Rgb, t: f32) -> Rgb {
        let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
        Rgb {
            r: lerp_u8(self.r, other.r, t),
            g: lerp_u8(self.g, other.g, t),
            b: lerp_u8(self.b, other.b, t),
        }
    }
}

/// A paint: color plus opacity in `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rgba {
    pub rgb: Rgb,
    pub a: f32,
}

impl Rgba {
    pub fn opaque(rgb: Rgb) -> Self {
        Self { rgb, a: 1.0 }
    }

    pub fn new(rgb: Rgb, a: f32) -> Self {
        let a = if a.is_finite() { a.clamp(0.0, 1.0) } else { 0.0 };
        Self { rgb, a }
    }

    /// Same color, opacity replaced.
    pub fn with_opacity(self, a: f32) -> Self {
        Self::new(self.rgb, a)
    }
}

fn lerp_u8(a: u8, b: u8, t: f32) -> u8 {
    let a = a as f32;
    let b = b as f32;
    (a + (b - a) * t).round().clamp(0.0, 255.0) as u8
}

/// Parses `#rgb`, `#rrggbb`, `rgb(r, g, b)` and `rgba(r, g, b, a)`.
pub fn parse_color(s: &str) -> Option<Rgba> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix('#') {
        return parse_hex(hex).map(Rgba::opaque);
    }

    let lower = s.to_ascii_lowercase();
    let inner = lower
        .strip_prefix("rgba(")
        .or_else(|| lower.strip_prefix("rgb("))?
        .strip_suffix(')')?;

    let parts: Vec<&str> = inner.split(',').map(str::trim).collect();
    if parts.len() != 3 && parts.len() != 4 {
        return None;
    }
    let channel = |p: &str| -> Option<u8> {
        let v: f32 = p.parse().ok()?;
        v.is_finite().then(|| v.round().clamp(0.0, 255.0) as u8)
    };
    let rgb = Rgb::new(channel(parts[0])?, channel(parts[1])?, channel(parts[2])?);
    let a = match parts.get(3) {
        Some(p) => p.parse::<f32>().ok()?,
        None => 1.0,
    };
    Some(Rgba::new(rgb, a))
}

fn parse_hex(hex: &str) -> Option<Rgb> {
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    match hex.len() {
        3 => {
            let d = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok().map(|v| v * 17);
            Some(Rgb::new(d(0)?, d(1)?, d(2)?))
        }
        6 => {
            let d = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
            Some(Rgb::new(d(0)?, d(2)?, d(4)?))
        }
        _ => None,
    }
}

fn dist2(a: Rgb, b: Rgb) -> i32 {
    let dr = (a.r as i32) - (b.r as i32);
    let dg = (a.g as i32) - (b.g as i32);
    let db = (a.b as i32) - (b.b as i32);
    (dr * dr) + (dg * dg) + (db * db)
}

fn rgb_to_ansi256(c: Rgb) -> u8 {
    const CUBE_LEVELS: [u8; 6] = [0, 95, 135, 175, 215, 255];

    let r6 = ((c.r as u16 * 5) + 127) / 255;
    let g6 = ((c.g as u16 * 5) + 127) / 255;
    let b6 = ((c.b as u16 * 5) + 127) / 255;

    let cube = Rgb::new(
        CUBE_LEVELS[r6 as usize],
        CUBE_LEVELS[g6 as usize],
        CUBE_LEVELS[b6 as usize],
    );
    let cube_idx = 16 + (36 * r6 as u8) + (6 * g6 as u8) + (b6 as u8);

    let avg = ((c.r as u16 + c.g as u16 + c.b as u16) / 3) as u8;
    let (gray_idx, gray) = match avg {
        0..=7 => (16, Rgb::BLACK),
        239..=255 => (231, Rgb::WHITE),
        _ => {
            let step = (avg - 8) / 10;
            let v = 8 + 10 * step;
            (232 + step, Rgb::new(v, v, v))
        }
    };

    if dist2(c, gray) < dist2(c, cube) {
        gray_idx
    } else {
        cube_idx
    }
}

fn rgb_to_color16(c: Rgb) -> Color {
    const TABLE: [(Color, Rgb); 16] = [
        (Color::Black, Rgb::new(0, 0, 0)),
        (Color::DarkGrey, Rgb::new(128, 128, 128)),
        (Color::Grey, Rgb::new(192, 192, 192)),
        (Color::White, Rgb::new(255, 255, 255)),
        (Color::DarkRed, Rgb::new(128, 0, 0)),
        (Color::Red, Rgb::new(255, 0, 0)),
        (Color::DarkGreen, Rgb::new(0, 128, 0)),
        (Color::Green, Rgb::new(0, 255, 0)),
        (Color::DarkBlue, Rgb::new(0, 0, 128)),
        (Color::Blue, Rgb::new(0, 0, 255)),
        (Color::DarkCyan, Rgb::new(0, 128, 128)),
        (Color::Cyan, Rgb::new(0, 255, 255)),
        (Color::DarkMagenta, Rgb::new(128, 0, 128)),
        (Color::Magenta, Rgb::new(255, 0, 255)),
        (Color::DarkYellow, Rgb::new(128, 128, 0)),
        (Color::Yellow, Rgb::new(255, 255, 0)),
    ];

    TABLE
        .iter()
        .min_by_key(|(_, rgb)| dist2(c, *rgb))
        .map(|(color, _)| *color)
        .unwrap_or(Color::White)
}

/// Maps a color to what the terminal can show. `None` means "terminal default".
pub fn quantize(c: Rgb, mode: ColorMode) -> Option<Color> {
    match mode {
        ColorMode::Mono => None,
        ColorMode::Color16 => Some(rgb_to_color16(c)),
        ColorMode::Color256 => Some(Color::AnsiValue(rgb_to_ansi256(c))),
        ColorMode::TrueColor => Some(Color::Rgb {
            r: c.r,
            g: c.g,
            b: c.b,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_and_rgba_strings() {
        assert_eq!(
            parse_color("#00FF41"),
            Some(Rgba::opaque(Rgb::new(0, 255, 65)))
        );
        assert_eq!(parse_color("#fff"), Some(Rgba::opaque(Rgb::WHITE)));
        let glow = parse_color("rgba(0,255,65,0.55)").unwrap();
        assert_eq!(glow.rgb, Rgb::new(0, 255, 65));
        assert!((glow.a - 0.55).abs() < 1e-6);
        assert_eq!(
            parse_color("rgb(1, 2, 3)"),
            Some(Rgba::opaque(Rgb::new(1, 2, 3)))
        );
    }

    #[test]
    fn rejects_garbage_colors() {
        assert_eq!(parse_color("green"), None);
        assert_eq!(parse_color("#12345"), None);
        assert_eq!(parse_color("rgba(1,2)"), None);
        assert_eq!(parse_color("rgba(1,2,3,x)"), None);
    }

    #[test]
    fn with_opacity_keeps_color_and_clamps() {
        let c = Rgba::opaque(Rgb::new(10, 20, 30)).with_opacity(1.7);
        assert_eq!(c.rgb, Rgb::new(10, 20, 30));
        assert_eq!(c.a, 1.0);
        assert_eq!(Rgba::new(Rgb::BLACK, f32::NAN).a, 0.0);
    }

    #[test]
    fn quantize_follows_color_mode() {
        let green = Rgb::new(0, 255, 0);
        assert_eq!(quantize(green, ColorMode::Mono), None);
        assert_eq!(quantize(green, ColorMode::Color16), Some(Color::Green));
        assert_eq!(quantize(green, ColorMode::Color256), Some(Color::AnsiValue(46)));
        assert_eq!(
            quantize(green, ColorMode::TrueColor),
            Some(Color::Rgb { r: 0, g: 255, b: 0 })
        );
    }

    #[test]
    fn mix_interpolates_endpoints() {
        assert_eq!(Rgb::BLACK.mix(Rgb::WHITE, 0.0), Rgb::BLACK);
        assert_eq!(Rgb::BLACK.mix(Rgb::WHITE, 1.0), Rgb::WHITE);
        assert_eq!(Rgb::BLACK.mix(Rgb::WHITE, 0.5), Rgb::new(128, 128, 128));
    }
}
