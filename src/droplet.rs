// Copyright (c) 2026 rezky_nightky

use std::collections::VecDeque;

use rand::Rng;

use crate::glyphs::GlyphPool;

/// Where a droplet re-enters after leaving the bottom edge.
pub const RESPAWN_Y: f32 = -20.0;

#[derive(Clone, Debug, PartialEq)]
pub struct TrailPoint {
    pub x: f32,
    pub y: f32,
    pub glyph: String,
    pub opacity: f32,
}

/// Speed bounds in pixels per tick. Always `0 <= min <= max`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpeedRange {
    pub min: f32,
    pub max: f32,
}

impl SpeedRange {
    /// Swaps reversed bounds and clamps negatives to zero.
    pub fn new(a: f32, b: f32) -> Self {
        let fix = |v: f32| if v.is_finite() { v.max(0.0) } else { 0.0 };
        let (a, b) = (fix(a), fix(b));
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    pub fn sample<R: Rng>(&self, rng: &mut R) -> f32 {
        self.min + rng.random::<f32>() * (self.max - self.min)
    }

    #[cfg(test)]
    pub fn contains(&self, v: f32) -> bool {
        v >= self.min && v <= self.max
    }
}

/// Opacity bounds for background droplets.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OpacityRange {
    pub min: f32,
    pub span: f32,
}

impl OpacityRange {
    pub fn sample<R: Rng>(&self, rng: &mut R) -> f32 {
        (self.min + rng.random::<f32>() * self.span).clamp(0.0, 1.0)
    }
}

/// One column-anchored falling glyph.
#[derive(Clone, Debug, PartialEq)]
pub struct Droplet {
    x: f32,
    pub y: f32,
    pub speed: f32,
    pub glyph: String,
    pub opacity: f32,
    pub trail: VecDeque<TrailPoint>,
    pub glitch_timer_ms: f32,
}

impl Droplet {
    pub fn new<R: Rng>(
        x: f32,
        height: f32,
        speed: SpeedRange,
        opacity: Option<OpacityRange>,
        pool: &GlyphPool,
        rng: &mut R,
    ) -> Self {
        let y = if height > 0.0 {
            rng.random::<f32>() * height
        } else {
            0.0
        };
        Self {
            x,
            y,
            speed: speed.sample(rng),
            glyph: pool.pick(rng).to_string(),
            opacity: opacity.map_or(1.0, |o| o.sample(rng)),
            trail: VecDeque::new(),
            glitch_timer_ms: 0.0,
        }
    }

    pub fn x(&self) -> f32 {
        self.x
    }

    /// Records the current position, evicting the oldest point past `cap`.
    pub fn push_trail(&mut self, cap: usize) {
        if cap == 0 {
            self.trail.clear();
            return;
        }
        self.trail.push_back(TrailPoint {
            x: self.x,
            y: self.y,
            glyph: self.glyph.clone(),
            opacity: self.opacity,
        });
        while self.trail.len() > cap {
            self.trail.pop_front();
        }
    }

    /// Moves down one tick. Returns `true` when the droplet wrapped to the top.
    pub fn advance<R: Rng>(
        &mut self,
        height: f32,
        speed: SpeedRange,
        opacity: Option<OpacityRange>,
        pool: &GlyphPool,
        rng: &mut R,
    ) -> bool {
        self.y += self.speed;
        if self.y <= height {
            return false;
        }
        self.y = RESPAWN_Y;
        self.glyph = pool.pick(rng).to_string();
        self.speed = speed.sample(rng);
        if let Some(o) = opacity {
            self.opacity = o.sample(rng);
            self.trail.clear();
        }
        true
    }

    pub fn morph<R: Rng>(&mut self, pool: &GlyphPool, rng: &mut R) {
        self.glyph = pool.pick(rng).to_string();
    }

    pub fn is_glitching(&self) -> bool {
        self.glitch_timer_ms > 0.0
    }

    pub fn tick_glitch(&mut self, dt_ms: f32) {
        if self.glitch_timer_ms > 0.0 {
            self.glitch_timer_ms = (self.glitch_timer_ms - dt_ms).max(0.0);
        }
    }
}
