// Copyright (c) 2026 rezky_nightky

use std::cell::Cell;
use std::rc::Rc;

use crate::error::{GlyphError, GlyphResult};
use crate::palette::{parse_color, Rgb, Rgba};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Theme {
    Matrix,
    Light,
}

impl Theme {
    pub fn parse(s: &str) -> Option<Theme> {
        match s.trim().to_ascii_lowercase().as_str() {
            "matrix" | "night" | "dark" => Some(Theme::Matrix),
            "light" | "day" | "high-contrast" => Some(Theme::Light),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Theme::Matrix => "matrix",
            Theme::Light => "light",
        }
    }

    pub fn colors(self) -> ThemeColors {
        match self {
            Theme::Matrix => ThemeColors {
                color: "#00FF41",
                glow: "rgba(0,255,65,0.55)",
                background: "#000000",
            },
            Theme::Light => ThemeColors {
                color: "#00FFFF",
                glow: "rgba(0,255,255,0.60)",
                background: "#ffffff",
            },
        }
    }

    pub fn toggled(self) -> Theme {
        match self {
            Theme::Matrix => Theme::Light,
            Theme::Light => Theme::Matrix,
        }
    }
}

/// Paint-style color strings for the current theme.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ThemeColors {
    pub color: &'static str,
    pub glow: &'static str,
    pub background: &'static str,
}

/// Parsed paints for one draw call.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Paints {
    pub color: Rgba,
    pub glow: Rgba,
    pub background: Rgb,
}

impl ThemeColors {
    /// Parses the strings, falling back to the matrix defaults for anything unreadable.
    pub fn resolve(&self) -> Paints {
        let fallback = Theme::Matrix.colors();
        let pick = |s: &str, fb: &str| {
            parse_color(s)
                .or_else(|| parse_color(fb))
                .unwrap_or(Rgba::opaque(Rgb::new(0, 255, 65)))
        };
        Paints {
            color: pick(self.color, fallback.color),
            glow: pick(self.glow, fallback.glow),
            background: pick(self.background, fallback.background).rgb,
        }
    }
}

/// Read-only color provider. Engines call it on every draw and never cache the result.
pub trait ColorSource {
    fn colors(&self) -> ThemeColors;

    fn paints(&self) -> Paints {
        self.colors().resolve()
    }
}

/// Shared view of the current theme. Cloning shares the same state.
#[derive(Clone, Debug)]
pub struct ThemeHandle(Rc<Cell<Theme>>);

impl ThemeHandle {
    pub fn new(theme: Theme) -> Self {
        Self(Rc::new(Cell::new(theme)))
    }

    pub fn current(&self) -> Theme {
        self.0.get()
    }

    fn set(&self, theme: Theme) {
        self.0.set(theme);
    }
}

impl Default for ThemeHandle {
    fn default() -> Self {
        Self::new(Theme::Matrix)
    }
}

impl ColorSource for ThemeHandle {
    fn colors(&self) -> ThemeColors {
        self.current().colors()
    }
}

/// The only writer of the shared theme.
#[derive(Debug)]
pub struct ThemeManager {
    handle: ThemeHandle,
}

impl ThemeManager {
    pub fn new(initial: &str, handle: ThemeHandle) -> GlyphResult<Self> {
        let theme = Theme::parse(initial)
            .ok_or_else(|| GlyphError::theme(format!("unknown theme: {}", initial)))?;
        handle.set(theme);
        tracing::debug!(theme = theme.name(), "theme manager ready");
        Ok(Self { handle })
    }

    pub fn current(&self) -> Theme {
        self.handle.current()
    }

    pub fn toggle(&mut self) -> Theme {
        let next = self.current().toggled();
        self.handle.set(next);
        tracing::info!(theme = next.name(), "theme toggled");
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manager_writes_are_visible_through_every_handle() {
        let handle = ThemeHandle::default();
        let reader = handle.clone();
        let mut mgr = ThemeManager::new("matrix", handle).unwrap();
        assert_eq!(reader.colors().color, "#00FF41");

        mgr.toggle();
        assert_eq!(reader.colors().color, "#00FFFF");
        assert_eq!(mgr.current(), Theme::Light);
    }

    #[test]
    fn unknown_theme_is_an_error() {
        let err = ThemeManager::new("sepia", ThemeHandle::default()).unwrap_err();
        assert!(err.to_string().contains("unknown theme"));

        let mgr = ThemeManager::new("light", ThemeHandle::default()).unwrap();
        assert_eq!(mgr.current(), Theme::Light);
    }

    #[test]
    fn resolve_falls_back_on_bad_strings() {
        let colors = ThemeColors {
            color: "not-a-color",
            glow: "rgba(1,2,3,0.5)",
            background: "#zzzzzz",
        };
        let p = colors.resolve();
        assert_eq!(p.color.rgb, Rgb::new(0, 255, 65));
        assert_eq!(p.glow.rgb, Rgb::new(1, 2, 3));
        assert_eq!(p.background, Rgb::BLACK);
    }
}
