// Copyright (c) 2026 rezky_nightky

use std::rc::Rc;
use std::time::Duration;

use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::droplet::{Droplet, OpacityRange, SpeedRange};
use crate::glyphs::GlyphPool;
use crate::palette::Rgba;
use crate::scheduler::{Animated, FrameScheduler, Layer, Lifecycle};
use crate::surface::{Shadow, Surface};
use crate::theme::ColorSource;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldStyle {
    /// Dense foreground rain with distance-faded trails and glitches.
    Rain,
    /// Sparse decorative rain that remembers where each droplet has been.
    Background,
    /// Plain binary rain behind the loader.
    Loader,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldConfig {
    pub style: FieldStyle,
    pub glyph_size: f32,
    pub speed: SpeedRange,
    pub trail_length: usize,
    pub trail_spacing: f32,
    pub trail_decay: f32,
    pub trail_alpha: f32,
    pub morph_probability: f32,
    pub glitch_probability: f32,
    pub glitch_trigger_probability: f32,
    pub glitch_duration_ms: f32,
    pub intensity_factor: f32,
    pub max_drops: Option<usize>,
    pub fade_alpha: f32,
    pub glow_blur: f32,
    pub opacity: Option<OpacityRange>,
}

impl FieldConfig {
    pub fn rain() -> Self {
        Self {
            style: FieldStyle::Rain,
            glyph_size: 16.0,
            speed: SpeedRange::new(1.0, 4.0),
            trail_length: 15,
            trail_spacing: 18.0,
            trail_decay: 0.08,
            trail_alpha: 0.4,
            morph_probability: 0.05,
            glitch_probability: 0.005,
            glitch_trigger_probability: 0.3,
            glitch_duration_ms: 100.0,
            intensity_factor: 1.5,
            max_drops: None,
            fade_alpha: 0.05,
            glow_blur: 8.0,
            opacity: None,
        }
    }

    pub fn background() -> Self {
        Self {
            style: FieldStyle::Background,
            speed: SpeedRange::new(0.5, 2.0),
            trail_length: 10,
            trail_spacing: 0.0,
            trail_decay: 0.0,
            trail_alpha: 0.36,
            glitch_probability: 0.0,
            max_drops: Some(50),
            opacity: Some(OpacityRange {
                min: 0.3,
                span: 0.5,
            }),
            ..Self::rain()
        }
    }

    pub fn loader() -> Self {
        Self {
            style: FieldStyle::Loader,
            glyph_size: 12.0,
            speed: SpeedRange::new(1.0, 3.0),
            trail_length: 0,
            trail_spacing: 0.0,
            trail_decay: 0.0,
            trail_alpha: 0.0,
            morph_probability: 0.01,
            glitch_probability: 0.0,
            fade_alpha: 0.03,
            glow_blur: 0.0,
            ..Self::rain()
        }
    }

    /// Clamps everything into ranges the tick loop can't trip over.
    pub fn sanitized(mut self) -> Self {
        let prob = |p: f32| if p.is_finite() { p.clamp(0.0, 1.0) } else { 0.0 };
        let non_neg = |v: f32| if v.is_finite() { v.max(0.0) } else { 0.0 };

        self.glyph_size = if self.glyph_size.is_finite() {
            self.glyph_size.max(1.0)
        } else {
            16.0
        };
        self.speed = SpeedRange::new(self.speed.min, self.speed.max);
        self.trail_spacing = non_neg(self.trail_spacing);
        self.trail_decay = non_neg(self.trail_decay);
        self.trail_alpha = prob(self.trail_alpha);
        self.morph_probability = prob(self.morph_probability);
        self.glitch_probability = prob(self.glitch_probability);
        self.glitch_trigger_probability = prob(self.glitch_trigger_probability);
        self.glitch_duration_ms = non_neg(self.glitch_duration_ms);
        self.intensity_factor = if self.intensity_factor.is_finite() {
            self.intensity_factor.max(1.0)
        } else {
            1.0
        };
        self.fade_alpha = prob(self.fade_alpha);
        self.glow_blur = non_neg(self.glow_blur);
        self
    }
}

/// A column of droplets per glyph width, bound to one surface.
///
/// Without a surface every public method is a no-op, so an optional layer can
/// be constructed unconditionally.
pub struct ParticleField<S: Surface> {
    life: Lifecycle,
    surface: Option<S>,
    config: FieldConfig,
    pool: GlyphPool,
    glitch_pool: GlyphPool,
    colors: Rc<dyn ColorSource>,
    rng: StdRng,
    drops: Vec<Droplet>,
    width: f32,
    height: f32,
}

impl<S: Surface> ParticleField<S> {
    pub fn new(
        layer: Layer,
        surface: Option<S>,
        config: FieldConfig,
        pool: GlyphPool,
        colors: Rc<dyn ColorSource>,
    ) -> Self {
        if surface.is_none() {
            tracing::warn!(?layer, "particle field has no surface; layer disabled");
        }
        let mut field = Self {
            life: Lifecycle::new(layer),
            surface,
            config: config.sanitized(),
            pool,
            glitch_pool: GlyphPool::glitch(),
            colors,
            rng: StdRng::from_os_rng(),
            drops: Vec::new(),
            width: 0.0,
            height: 0.0,
        };
        field.reinit_from_surface();
        field
    }

    /// Reseeds the generator and rebuilds the droplets from it.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self.reinit_from_surface();
        self
    }

    fn reinit_from_surface(&mut self) {
        let Some(s) = self.surface.as_ref() else {
            return;
        };
        let (w, h) = (s.width(), s.height());
        let (g, speed) = (self.config.glyph_size, self.config.speed);
        self.initialize(w, h, g, speed);
    }

    #[allow(dead_code)]
    pub fn config(&self) -> &FieldConfig {
        &self.config
    }

    #[allow(dead_code)]
    pub fn drops(&self) -> &[Droplet] {
        &self.drops
    }

    pub fn surface(&self) -> Option<&S> {
        self.surface.as_ref()
    }

    pub fn surface_mut(&mut self) -> Option<&mut S> {
        self.surface.as_mut()
    }

    /// Rebuilds every droplet for the given dimensions.
    pub fn initialize(&mut self, width: f32, height: f32, glyph_size: f32, speed: SpeedRange) {
        if self.surface.is_none() {
            return;
        }
        self.config.glyph_size = if glyph_size.is_finite() {
            glyph_size.max(1.0)
        } else {
            self.config.glyph_size
        };
        self.config.speed = SpeedRange::new(speed.min, speed.max);
        self.width = if width.is_finite() { width.max(0.0) } else { 0.0 };
        self.height = if height.is_finite() { height.max(0.0) } else { 0.0 };

        let g = self.config.glyph_size;
        let cols = (self.width / g).floor() as usize;
        let count = self.config.max_drops.map_or(cols, |m| cols.min(m));
        let (h, speed, opacity) = (self.height, self.config.speed, self.config.opacity);

        self.drops = (0..count)
            .map(|i| Droplet::new(i as f32 * g, h, speed, opacity, &self.pool, &mut self.rng))
            .collect();

        tracing::debug!(
            layer = ?self.life.layer(),
            width = self.width,
            height = self.height,
            drops = self.drops.len(),
            "particle field initialized"
        );
    }

    pub fn resize(&mut self, width: f32, height: f32) {
        let Some(s) = self.surface.as_mut() else {
            return;
        };
        s.resize(width, height);
        s.clear();
        self.reinit_from_surface();
    }

    /// Arms the glitch timer on a random subset of droplets.
    pub fn trigger_glitch(&mut self) {
        if self.surface.is_none() {
            return;
        }
        let p = self.config.glitch_trigger_probability;
        let ms = self.config.glitch_duration_ms;
        for d in &mut self.drops {
            if self.rng.random::<f32>() < p {
                d.glitch_timer_ms = ms;
            }
        }
    }

    /// Multiplies every speed by the intensity factor. Repeated calls compound.
    pub fn increase_intensity(&mut self) {
        if self.surface.is_none() {
            return;
        }
        let f = self.config.intensity_factor;
        for d in &mut self.drops {
            d.speed *= f;
        }
        tracing::debug!(layer = ?self.life.layer(), factor = f, "intensity increased");
    }

    /// Washes the whole surface with the glow color once.
    pub fn create_explosion(&mut self) {
        let glow = self.colors.paints().glow;
        if let Some(s) = self.surface.as_mut() {
            s.fill_all(glow);
        }
    }

    pub(crate) fn tick(&mut self, dt: Duration) {
        let Some(surface) = self.surface.as_mut() else {
            return;
        };
        if self.drops.is_empty() {
            return;
        }

        let cfg = &self.config;
        let paints = self.colors.paints();
        let dt_ms = dt.as_secs_f32() * 1000.0;

        surface.fill_all(Rgba::new(paints.background, cfg.fade_alpha));
        surface.set_font(cfg.glyph_size);

        for d in &mut self.drops {
            match cfg.style {
                FieldStyle::Rain => {
                    for k in 1..=cfg.trail_length {
                        let ty = d.y - k as f32 * cfg.trail_spacing;
                        if ty <= 0.0 {
                            break;
                        }
                        let op = (1.0 - k as f32 * cfg.trail_decay).max(0.0) * cfg.trail_alpha;
                        if op > 0.0 {
                            surface.fill_text(&d.glyph, d.x(), ty, paints.glow.with_opacity(op));
                        }
                    }
                }
                FieldStyle::Background => {
                    let len = d.trail.len() as f32;
                    for (i, p) in d.trail.iter().enumerate() {
                        let op = p.opacity * (1.0 - i as f32 / len) * cfg.trail_alpha;
                        surface.fill_text(&p.glyph, p.x, p.y, paints.glow.with_opacity(op));
                    }
                }
                FieldStyle::Loader => {}
            }

            let timed = d.is_glitching();
            let glitched = timed
                || (cfg.glitch_probability > 0.0
                    && self.rng.random::<f32>() < cfg.glitch_probability);

            if glitched {
                let blur = if timed { 5.0 } else { 0.0 };
                surface.set_shadow((blur > 0.0).then_some(Shadow {
                    color: paints.glow,
                    blur,
                }));
                let g = self.glitch_pool.pick(&mut self.rng);
                surface.fill_text(g, d.x(), d.y, paints.color);
            } else {
                let (paint, blur) = match cfg.style {
                    FieldStyle::Rain => (paints.color, cfg.glow_blur),
                    FieldStyle::Background => {
                        (paints.glow.with_opacity(d.opacity * 1.1), cfg.glow_blur)
                    }
                    FieldStyle::Loader => (paints.color, 0.0),
                };
                surface.set_shadow((blur > 0.0).then_some(Shadow {
                    color: paints.glow,
                    blur,
                }));
                surface.fill_text(&d.glyph, d.x(), d.y, paint);
            }
            surface.set_shadow(None);

            if cfg.style == FieldStyle::Background {
                d.push_trail(cfg.trail_length);
            }
            d.advance(self.height, cfg.speed, cfg.opacity, &self.pool, &mut self.rng);
            if self.rng.random::<f32>() < cfg.morph_probability {
                d.morph(&self.pool, &mut self.rng);
            }
            d.tick_glitch(dt_ms);
        }
    }
}

impl<S: Surface> Animated for ParticleField<S> {
    fn lifecycle(&self) -> &Lifecycle {
        &self.life
    }

    fn lifecycle_mut(&mut self) -> &mut Lifecycle {
        &mut self.life
    }

    fn step(&mut self, dt: Duration, _sched: &mut FrameScheduler) {
        self.tick(dt);
    }

    fn start(&mut self, sched: &mut FrameScheduler) {
        if self.surface.is_none() {
            return;
        }
        if self.life.start(sched) {
            tracing::debug!(layer = ?self.life.layer(), drops = self.drops.len(), "field started");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::glyphs::GLITCH_CHARS;
    use crate::surface::recorder::{Op, Recorder};
    use crate::theme::{Theme, ThemeHandle, ThemeManager};

    const DT: Duration = Duration::from_millis(16);

    fn field(w: f32, h: f32, config: FieldConfig) -> ParticleField<Recorder> {
        ParticleField::new(
            Layer::Rain,
            Some(Recorder::new(w, h)),
            config,
            GlyphPool::binary(),
            Rc::new(ThemeHandle::default()),
        )
        .with_seed(42)
    }

    fn quiet_rain() -> FieldConfig {
        FieldConfig {
            glitch_probability: 0.0,
            ..FieldConfig::rain()
        }
    }

    fn recorded(f: &ParticleField<Recorder>) -> &Recorder {
        f.surface().unwrap()
    }

    #[test]
    fn drop_count_is_width_over_glyph_size() {
        let mut f = field(1600.0, 900.0, FieldConfig::rain());
        f.initialize(1600.0, 900.0, 16.0, SpeedRange::new(1.0, 4.0));
        assert_eq!(f.drops().len(), 100);

        for (w, g) in [(0.0, 16.0), (15.0, 16.0), (17.0, 16.0), (999.0, 12.0), (1280.0, 7.0)] {
            f.initialize(w, 600.0, g, SpeedRange::new(1.0, 4.0));
            assert_eq!(f.drops().len(), (w / g).floor() as usize);
        }
    }

    #[test]
    fn initial_state_is_within_bounds() {
        let f = field(800.0, 600.0, FieldConfig::rain());
        for (i, d) in f.drops().iter().enumerate() {
            assert_eq!(d.x(), i as f32 * 16.0);
            assert!((0.0..600.0).contains(&d.y));
            assert!(f.config().speed.contains(d.speed));
        }
    }

    #[test]
    fn background_caps_drop_count() {
        let f = field(1600.0, 900.0, FieldConfig::background());
        assert_eq!(f.drops().len(), 50);
        assert!(f.drops().iter().all(|d| (0.3..0.8).contains(&d.opacity)));
    }

    #[test]
    fn zero_width_tick_is_a_no_op() {
        let mut f = field(0.0, 600.0, FieldConfig::rain());
        assert!(f.drops().is_empty());
        f.tick(DT);
        assert!(recorded(&f).ops.is_empty());
    }

    #[test]
    fn intensity_compounds() {
        let mut f = field(160.0, 100.0, FieldConfig::rain());
        f.drops[0].speed = 2.0;
        f.increase_intensity();
        f.increase_intensity();
        assert!((f.drops()[0].speed - 2.0 * 1.5 * 1.5).abs() < 1e-6);
    }

    #[test]
    fn certain_glitch_renders_glitch_glyphs() {
        let mut f = field(
            320.0,
            600.0,
            FieldConfig {
                glitch_trigger_probability: 1.0,
                ..quiet_rain()
            },
        );
        f.trigger_glitch();
        assert!(f.drops().iter().all(|d| d.glitch_timer_ms == 100.0));
        f.tick(DT);
        let glitched = recorded(&f)
            .texts()
            .iter()
            .filter(|t| GLITCH_CHARS.contains(**t))
            .count();
        assert!(glitched >= 1);
    }

    #[test]
    fn impossible_glitch_renders_none() {
        let mut f = field(
            320.0,
            600.0,
            FieldConfig {
                glitch_trigger_probability: 0.0,
                ..quiet_rain()
            },
        );
        f.trigger_glitch();
        f.tick(DT);
        assert!(recorded(&f).texts().iter().all(|t| *t == "0" || *t == "1"));
        assert!(f.drops().iter().all(|d| !d.is_glitching()));
    }

    #[test]
    fn glitch_leaves_motion_alone() {
        let mut f = field(
            160.0,
            1_000_000.0,
            FieldConfig {
                glitch_trigger_probability: 1.0,
                morph_probability: 0.0,
                ..quiet_rain()
            },
        );
        let before: Vec<(f32, f32, String)> = f
            .drops()
            .iter()
            .map(|d| (d.y, d.speed, d.glyph.clone()))
            .collect();
        f.trigger_glitch();
        f.tick(DT);
        for (d, (y, speed, glyph)) in f.drops().iter().zip(before) {
            assert_eq!(d.speed, speed);
            assert_eq!(d.y, y + speed);
            assert_eq!(d.glyph, glyph);
        }
    }

    #[test]
    fn rain_trail_fades_with_distance() {
        let mut f = field(16.0, 2000.0, quiet_rain());
        f.drops[0].y = 1000.0;
        f.tick(DT);
        let trail: Vec<(f32, f32)> = recorded(&f)
            .ops
            .iter()
            .filter_map(|op| match op {
                Op::Text { y, paint, shadow: None, .. } => Some((*y, paint.a)),
                _ => None,
            })
            .collect();
        assert_eq!(trail.len(), 12);
        assert_eq!(trail[0].0, 1000.0 - 18.0);
        assert!((trail[0].1 - 0.92 * 0.4).abs() < 1e-5);
        assert!(trail.windows(2).all(|w| w[1].1 < w[0].1));
    }

    #[test]
    fn trail_stops_at_the_top_edge() {
        let mut f = field(16.0, 2000.0, quiet_rain());
        f.drops[0].y = 40.0;
        f.tick(DT);
        // 40 - 18 > 0, 40 - 36 > 0, 40 - 54 <= 0
        assert_eq!(recorded(&f).texts().len(), 3);
    }

    #[test]
    fn colors_are_read_fresh_each_tick() {
        let handle = ThemeHandle::default();
        let mut mgr = ThemeManager::new("matrix", handle.clone()).unwrap();
        let mut f = ParticleField::new(
            Layer::Rain,
            Some(Recorder::new(16.0, 100.0)),
            quiet_rain(),
            GlyphPool::binary(),
            Rc::new(handle),
        )
        .with_seed(1);

        let main_paint = |f: &ParticleField<Recorder>| {
            recorded(f).ops.iter().rev().find_map(|op| match op {
                Op::Text {
                    paint,
                    shadow: Some(_),
                    ..
                } => Some(paint.rgb),
                _ => None,
            })
        };

        f.tick(DT);
        assert_eq!(main_paint(&f), Some(Theme::Matrix.colors().resolve().color.rgb));
        mgr.toggle();
        f.tick(DT);
        assert_eq!(main_paint(&f), Some(Theme::Light.colors().resolve().color.rgb));
    }

    #[test]
    fn background_trail_uses_stored_opacity() {
        let mut f = field(16.0, 10_000.0, FieldConfig::background());
        f.drops[0].y = 100.0;
        f.drops[0].speed = 1.0;
        f.drops[0].opacity = 0.5;
        for _ in 0..3 {
            f.tick(DT);
        }
        assert_eq!(f.drops()[0].trail.len(), 3);

        let paints: Vec<f32> = recorded(&f)
            .ops
            .iter()
            .filter_map(|op| match op {
                Op::Text {
                    paint,
                    shadow: None,
                    ..
                } => Some(paint.a),
                _ => None,
            })
            .collect();
        // tick 2 draws one point, tick 3 draws two.
        assert_eq!(paints.len(), 3);
        assert!((paints[0] - 0.5 * 0.36).abs() < 1e-5);
        assert!((paints[2] - 0.5 * 0.5 * 0.36).abs() < 1e-5);
    }

    #[test]
    fn missing_surface_makes_everything_a_no_op() {
        let mut sched = FrameScheduler::new();
        let mut f: ParticleField<Recorder> = ParticleField::new(
            Layer::Rain,
            None,
            FieldConfig::rain(),
            GlyphPool::matrix(),
            Rc::new(ThemeHandle::default()),
        );
        f.initialize(1600.0, 900.0, 16.0, SpeedRange::new(1.0, 4.0));
        f.resize(800.0, 600.0);
        f.trigger_glitch();
        f.increase_intensity();
        f.create_explosion();
        f.start(&mut sched);
        f.tick(DT);
        assert!(f.drops().is_empty());
        assert!(!f.is_running());
        assert_eq!(sched.pending_count(), 0);
    }

    #[test]
    fn resize_rebuilds_from_scratch() {
        let mut f = field(320.0, 600.0, FieldConfig::rain());
        f.drops[0].speed = 99.0;
        f.resize(640.0, 480.0);
        assert_eq!(f.drops().len(), 40);
        assert!(f.drops().iter().all(|d| d.speed <= 4.0));
        assert!(recorded(&f).ops.contains(&Op::Clear));
    }

    #[test]
    fn no_draws_after_stop() {
        let mut sched = FrameScheduler::new();
        let mut f = field(160.0, 100.0, FieldConfig::rain());
        f.start(&mut sched);
        for (h, _) in sched.take_due() {
            f.on_frame(h, DT, &mut sched);
        }
        let drawn = recorded(&f).ops.len();
        assert!(drawn > 0);

        f.stop(&mut sched);
        f.stop(&mut sched);
        for (h, _) in sched.take_due() {
            f.on_frame(h, DT, &mut sched);
        }
        assert_eq!(recorded(&f).ops.len(), drawn);
    }

    #[test]
    fn explosion_fills_with_glow() {
        let mut f = field(160.0, 100.0, FieldConfig::rain());
        f.create_explosion();
        let glow = Theme::Matrix.colors().resolve().glow;
        assert!(recorded(&f).ops.iter().any(|op| matches!(
            op,
            Op::FillRect { paint, .. } if *paint == glow
        )));
    }
}
