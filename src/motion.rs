// Copyright (c) 2026 rezky_nightky

use std::env;

use crate::error::{GlyphError, GlyphResult};

pub const REDUCED_MOTION_ENV: &str = "GLYPHRAIN_REDUCED_MOTION";

/// Reads a reduced-motion preference value. Unset or empty means "no preference".
pub fn parse_preference(value: &str) -> Result<bool, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "" | "0" | "false" | "no" | "off" | "no-preference" => Ok(false),
        "1" | "true" | "yes" | "on" | "reduce" => Ok(true),
        other => Err(format!("invalid {} value: {}", REDUCED_MOTION_ENV, other)),
    }
}

/// Reduced-motion preference, seeded from the CLI flag and the environment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MotionManager {
    reduced: bool,
}

impl MotionManager {
    pub fn new(flag: bool, env_value: Option<&str>) -> GlyphResult<Self> {
        let from_env = match env_value {
            Some(v) => parse_preference(v).map_err(GlyphError::config)?,
            None => false,
        };
        let reduced = flag || from_env;
        tracing::debug!(reduced, "motion manager ready");
        Ok(Self { reduced })
    }

    pub fn from_env(flag: bool) -> GlyphResult<Self> {
        match env::var(REDUCED_MOTION_ENV) {
            Ok(v) => Self::new(flag, Some(&v)),
            Err(env::VarError::NotPresent) => Self::new(flag, None),
            Err(e) => Err(GlyphError::config(format!("{}: {}", REDUCED_MOTION_ENV, e))),
        }
    }

    pub fn is_reduced(&self) -> bool {
        self.reduced
    }

    pub fn toggle(&mut self) -> bool {
        self.reduced = !self.reduced;
        tracing::info!(reduced = self.reduced, "reduced motion toggled");
        self.reduced
    }
}
