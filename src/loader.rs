// Copyright (c) 2026 rezky_nightky

use std::rc::Rc;
use std::time::Duration;

use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::Deserialize;

use crate::field::{FieldConfig, ParticleField};
use crate::glyphs::GlyphPool;
use crate::overlay::MessageBox;
use crate::palette::Rgba;
use crate::scheduler::{Animated, FrameHandle, FrameScheduler, Layer, Lifecycle};
use crate::surface::Surface;
use crate::theme::ColorSource;

const OVERLAY_LINE_H: f32 = 16.0;
const BAR_WIDTH: usize = 20;
const STATIC_MESSAGE: &str = "Loading...";
const ERROR_TEXT: &str = "SYSTEM ERROR\nMATRIX_ENTRY_FAILED\nSCREEN CORRUPTION DETECTED";
const CORRUPTION_PROBABILITY: f64 = 0.3;
const FADE_STEP_ALPHA: f32 = 0.25;

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Phase {
    pub message: String,
    pub target: f32,
}

impl Phase {
    pub fn new(message: &str, target: f32) -> Self {
        Self {
            message: message.to_string(),
            target,
        }
    }
}

pub fn default_phases() -> Vec<Phase> {
    vec![
        Phase::new("INITIALIZING SYSTEMS...", 20.0),
        Phase::new("LOADING MATRIX PROTOCOLS...", 40.0),
        Phase::new("ESTABLISHING CONNECTIONS...", 60.0),
        Phase::new("PREPARING INTERFACE...", 80.0),
        Phase::new("SYSTEMS READY...", 100.0),
    ]
}

#[derive(Clone, Debug, PartialEq)]
pub struct LoaderConfig {
    pub phases: Vec<Phase>,
    pub complete_message: String,
    pub step_ms: f32,
    pub hold_ms: f32,
    pub explosion_ms: f32,
    pub fade_ms: f32,
    pub increment: (f32, f32),
    pub reduced_motion: bool,
    pub rain: FieldConfig,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            phases: default_phases(),
            complete_message: "MATRIX ENTRY COMPLETE".to_string(),
            step_ms: 50.0,
            hold_ms: 500.0,
            explosion_ms: 1500.0,
            fade_ms: 500.0,
            increment: (3.0, 15.0),
            reduced_motion: false,
            rain: FieldConfig::loader(),
        }
    }
}

impl LoaderConfig {
    /// Targets clamped to `0..=100` and made non-decreasing, with a final 100% phase.
    fn sanitized(mut self) -> Self {
        let mut floor = 0.0f32;
        for p in &mut self.phases {
            let t = if p.target.is_finite() { p.target } else { 0.0 };
            p.target = t.clamp(floor, 100.0);
            floor = p.target;
        }
        match self.phases.last_mut() {
            Some(last) => last.target = 100.0,
            None => self.phases.push(Phase::new(STATIC_MESSAGE, 100.0)),
        }

        let pos = |v: f32, fallback: f32| if v.is_finite() && v > 0.0 { v } else { fallback };
        self.step_ms = pos(self.step_ms, 50.0).max(1.0);
        let non_neg = |v: f32| if v.is_finite() { v.max(0.0) } else { 0.0 };
        self.hold_ms = non_neg(self.hold_ms);
        self.explosion_ms = non_neg(self.explosion_ms);
        self.fade_ms = non_neg(self.fade_ms);
        let lo = pos(self.increment.0, 3.0);
        let hi = pos(self.increment.1, 15.0);
        self.increment = if lo < hi { (lo, hi) } else { (hi, hi + 1.0) };
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoaderState {
    Idle,
    Running,
    Holding,
    /// Explosion flash with the error box on top.
    Exploding,
    /// Error box with its characters scrambled each frame.
    Corrupting,
    /// Second, longer flash that burns out.
    Flashing,
    /// Rain stopped, its remains faded toward the background.
    Fading,
    Complete,
    Destroyed,
}

type Callback = Box<dyn FnOnce()>;

/// Scripted progress overlay with binary rain behind it.
///
/// Phases are shown one at a time, in order. At 100% the completion message is
/// held for `hold_ms`, then the finale plays: explosion, corruption, a final
/// flash and a fade. Only after the last stage are both surfaces cleared and the
/// completion callback run, once. The static (reduced-motion) form skips the
/// finale.
pub struct LoaderSequence<S: Surface> {
    life: Lifecycle,
    config: LoaderConfig,
    state: LoaderState,
    phase: usize,
    progress: f32,
    message: String,
    elapsed_ms: f32,
    stage_left_ms: f32,
    overlay: Option<S>,
    rain: ParticleField<S>,
    glitch: GlyphPool,
    colors: Rc<dyn ColorSource>,
    rng: StdRng,
    on_complete: Option<Callback>,
}

impl<S: Surface> LoaderSequence<S> {
    pub fn new(
        config: LoaderConfig,
        overlay: Option<S>,
        rain_surface: Option<S>,
        colors: Rc<dyn ColorSource>,
    ) -> Self {
        let config = config.sanitized();
        if overlay.is_none() {
            tracing::warn!("loader has no overlay surface; running headless");
        }
        let rain = ParticleField::new(
            Layer::LoaderRain,
            rain_surface,
            config.rain.clone(),
            GlyphPool::binary(),
            colors.clone(),
        );
        Self {
            life: Lifecycle::new(Layer::Loader),
            state: LoaderState::Idle,
            phase: 0,
            progress: 0.0,
            message: String::new(),
            elapsed_ms: 0.0,
            stage_left_ms: 0.0,
            overlay,
            rain,
            glitch: GlyphPool::glitch(),
            colors,
            rng: StdRng::from_os_rng(),
            on_complete: None,
            config,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self.rain = self.rain.with_seed(seed.wrapping_add(1));
        self
    }

    pub fn on_complete(mut self, f: impl FnOnce() + 'static) -> Self {
        self.on_complete = Some(Box::new(f));
        self
    }

    pub fn state(&self) -> LoaderState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        !matches!(
            self.state,
            LoaderState::Idle | LoaderState::Complete | LoaderState::Destroyed
        )
    }

    #[allow(dead_code)]
    pub fn progress(&self) -> f32 {
        self.progress
    }

    pub fn percent(&self) -> u8 {
        self.progress.floor().clamp(0.0, 100.0) as u8
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn overlay_surface(&self) -> Option<&S> {
        self.overlay.as_ref()
    }

    pub fn rain(&self) -> &ParticleField<S> {
        &self.rain
    }

    pub fn resize(&mut self, width: f32, height: f32) {
        if let Some(s) = self.overlay.as_mut() {
            s.resize(width, height);
            s.clear();
        }
        self.rain.resize(width, height);
    }

    /// Tears the loader down without running the completion callback.
    pub fn destroy(&mut self, sched: &mut FrameScheduler) {
        if self.state == LoaderState::Destroyed {
            return;
        }
        self.release(sched);
        self.on_complete = None;
        self.state = LoaderState::Destroyed;
        tracing::info!("loader destroyed");
    }

    fn release(&mut self, sched: &mut FrameScheduler) {
        self.rain.stop(sched);
        self.life.stop(sched);
        if let Some(s) = self.overlay.as_mut() {
            s.clear();
        }
        if let Some(s) = self.rain.surface_mut() {
            s.clear();
        }
    }

    fn finish(&mut self, sched: &mut FrameScheduler) {
        self.release(sched);
        self.state = LoaderState::Complete;
        tracing::info!("loader complete");
        if let Some(cb) = self.on_complete.take() {
            cb();
        }
    }

    fn stage_ms(&self, state: LoaderState) -> f32 {
        match state {
            LoaderState::Holding => self.config.hold_ms,
            LoaderState::Exploding | LoaderState::Corrupting | LoaderState::Fading => {
                self.config.fade_ms
            }
            LoaderState::Flashing => self.config.explosion_ms,
            _ => 0.0,
        }
    }

    fn next_stage(&self) -> Option<LoaderState> {
        match self.state {
            LoaderState::Holding if self.config.reduced_motion => None,
            LoaderState::Holding => Some(LoaderState::Exploding),
            LoaderState::Exploding => Some(LoaderState::Corrupting),
            LoaderState::Corrupting => Some(LoaderState::Flashing),
            LoaderState::Flashing => Some(LoaderState::Fading),
            _ => None,
        }
    }

    fn enter_stage(&mut self, state: LoaderState, sched: &mut FrameScheduler) {
        self.state = state;
        self.stage_left_ms = self.stage_ms(state);
        match state {
            LoaderState::Exploding => {
                self.rain.create_explosion();
                self.message = ERROR_TEXT.to_string();
            }
            LoaderState::Fading => self.rain.stop(sched),
            _ => {}
        }
        tracing::debug!(stage = ?state, "loader finale");
    }

    /// Share of the current stage still to run, 1.0 on entry.
    fn stage_fraction_left(&self) -> f32 {
        let total = self.stage_ms(self.state);
        if total > 0.0 {
            (self.stage_left_ms / total).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    fn corrupted(&mut self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        for ch in text.chars() {
            if ch.is_whitespace() || !self.rng.random_bool(CORRUPTION_PROBABILITY) {
                out.push(ch);
            } else {
                out.push_str(self.glitch.pick(&mut self.rng));
            }
        }
        out
    }

    fn enter_phase(&mut self, idx: usize) {
        self.phase = idx;
        if let Some(p) = self.config.phases.get(idx) {
            self.message.clone_from(&p.message);
            tracing::debug!(phase = idx, message = %p.message, "loader phase");
        }
    }

    fn advance_step(&mut self) {
        let target = self.config.phases.get(self.phase).map_or(100.0, |p| p.target);
        if self.progress >= target {
            if self.phase + 1 < self.config.phases.len() {
                self.enter_phase(self.phase + 1);
            } else {
                self.state = LoaderState::Holding;
                self.stage_left_ms = self.config.hold_ms;
                self.message.clone_from(&self.config.complete_message);
                return;
            }
        }
        let target = self.config.phases.get(self.phase).map_or(100.0, |p| p.target);
        let (lo, hi) = self.config.increment;
        let inc = self.rng.random_range(lo..hi);
        self.progress = (self.progress + inc).min(target);
    }

    fn overlay_text(&self) -> String {
        let filled = ((self.progress / 100.0) * BAR_WIDTH as f32).round() as usize;
        let filled = filled.min(BAR_WIDTH);
        format!(
            "{}\n\n[{}{}]\n{}%",
            self.message,
            "#".repeat(filled),
            ".".repeat(BAR_WIDTH - filled),
            self.percent()
        )
    }

    fn draw_overlay(&mut self) {
        let text = match self.state {
            LoaderState::Exploding => self.message.clone(),
            LoaderState::Corrupting => self.corrupted(ERROR_TEXT),
            LoaderState::Flashing | LoaderState::Fading => String::new(),
            _ => self.overlay_text(),
        };
        let flash = match self.state {
            LoaderState::Exploding | LoaderState::Flashing => Some(self.stage_fraction_left()),
            _ => None,
        };
        let paints = self.colors.paints();
        let Some(s) = self.overlay.as_mut() else {
            return;
        };
        s.clear();
        if let Some(a) = flash {
            s.fill_all(paints.glow.with_opacity(a));
        }
        if text.is_empty() {
            return;
        }
        MessageBox::default().draw(
            s,
            &text,
            OVERLAY_LINE_H,
            paints.color,
            Rgba::opaque(paints.background),
        );
    }

    /// Routes a dispatched frame to the loader or its rain.
    pub fn dispatch(
        &mut self,
        handle: FrameHandle,
        layer: Layer,
        dt: Duration,
        sched: &mut FrameScheduler,
    ) -> bool {
        match layer {
            Layer::Loader => self.on_frame(handle, dt, sched),
            Layer::LoaderRain => self.rain.on_frame(handle, dt, sched),
            _ => false,
        }
    }
}

impl<S: Surface> Animated for LoaderSequence<S> {
    fn lifecycle(&self) -> &Lifecycle {
        &self.life
    }

    fn lifecycle_mut(&mut self) -> &mut Lifecycle {
        &mut self.life
    }

    fn start(&mut self, sched: &mut FrameScheduler) {
        if self.state != LoaderState::Idle {
            return;
        }
        if self.config.reduced_motion {
            self.state = LoaderState::Holding;
            self.progress = 100.0;
            self.message = STATIC_MESSAGE.to_string();
            self.stage_left_ms = self.config.hold_ms;
        } else {
            self.state = LoaderState::Running;
            self.enter_phase(0);
            self.rain.start(sched);
        }
        self.life.start(sched);
        self.draw_overlay();
        tracing::info!(
            phases = self.config.phases.len(),
            reduced_motion = self.config.reduced_motion,
            "loader started"
        );
    }

    fn stop(&mut self, sched: &mut FrameScheduler) {
        self.destroy(sched);
    }

    fn step(&mut self, dt: Duration, sched: &mut FrameScheduler) {
        let dt_ms = dt.as_secs_f32() * 1000.0;
        match self.state {
            LoaderState::Running => {
                self.elapsed_ms += dt_ms;
                while self.elapsed_ms >= self.config.step_ms && self.state == LoaderState::Running
                {
                    self.elapsed_ms -= self.config.step_ms;
                    self.advance_step();
                }
                if self.state == LoaderState::Holding {
                    self.elapsed_ms = 0.0;
                }
            }
            LoaderState::Idle | LoaderState::Complete | LoaderState::Destroyed => return,
            _ => {
                self.stage_left_ms -= dt_ms;
                while self.stage_left_ms <= 0.0 {
                    let Some(next) = self.next_stage() else {
                        self.finish(sched);
                        return;
                    };
                    let carry = self.stage_left_ms;
                    self.enter_stage(next, sched);
                    self.stage_left_ms += carry;
                }
                if self.state == LoaderState::Fading {
                    let bg = self.colors.paints().background;
                    if let Some(s) = self.rain.surface_mut() {
                        s.fill_all(Rgba::new(bg, FADE_STEP_ALPHA));
                    }
                }
            }
        }
        self.draw_overlay();
    }
}

/// Keeps at most one loader alive.
pub struct LoaderHost<S: Surface> {
    active: Option<LoaderSequence<S>>,
}

impl<S: Surface> Default for LoaderHost<S> {
    fn default() -> Self {
        Self { active: None }
    }
}

impl<S: Surface> LoaderHost<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Destroys any current loader, then starts `loader`.
    pub fn show(&mut self, mut loader: LoaderSequence<S>, sched: &mut FrameScheduler) {
        if let Some(mut prev) = self.active.take() {
            if prev.is_active() {
                tracing::info!("loader superseded");
            }
            prev.destroy(sched);
        }
        loader.start(sched);
        self.active = Some(loader);
    }

    pub fn active(&self) -> Option<&LoaderSequence<S>> {
        self.active.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.active.as_ref().is_some_and(|l| l.is_active())
    }

    pub fn dispatch(
        &mut self,
        handle: FrameHandle,
        layer: Layer,
        dt: Duration,
        sched: &mut FrameScheduler,
    ) -> bool {
        let ran = match self.active.as_mut() {
            Some(l) => l.dispatch(handle, layer, dt, sched),
            None => false,
        };
        if self
            .active
            .as_ref()
            .is_some_and(|l| l.state() == LoaderState::Complete)
        {
            self.active = None;
        }
        ran
    }

    pub fn resize(&mut self, width: f32, height: f32) {
        if let Some(l) = self.active.as_mut() {
            l.resize(width, height);
        }
    }

    pub fn dismiss(&mut self, sched: &mut FrameScheduler) {
        if let Some(mut l) = self.active.take() {
            l.destroy(sched);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};

    use super::*;
    use crate::surface::recorder::{Op, Recorder};
    use crate::theme::ThemeHandle;

    const DT: Duration = Duration::from_millis(50);

    fn loader(config: LoaderConfig) -> LoaderSequence<Recorder> {
        LoaderSequence::new(
            config,
            Some(Recorder::new(640.0, 320.0)),
            Some(Recorder::new(640.0, 320.0)),
            Rc::new(ThemeHandle::default()),
        )
        .with_seed(4)
    }

    fn pump(host: &mut LoaderHost<Recorder>, sched: &mut FrameScheduler) {
        for (h, layer) in sched.take_due() {
            host.dispatch(h, layer, DT, sched);
        }
    }

    fn drive(l: &mut LoaderSequence<Recorder>, sched: &mut FrameScheduler) {
        for (h, layer) in sched.take_due() {
            l.dispatch(h, layer, DT, sched);
        }
    }

    fn run_until(l: &mut LoaderSequence<Recorder>, sched: &mut FrameScheduler, state: LoaderState) {
        for _ in 0..400 {
            if l.state() == state {
                return;
            }
            drive(l, sched);
        }
        panic!("loader never reached {:?}", state);
    }

    /// Glyphs painted since the surface was last cleared.
    fn drawn(s: &Recorder) -> String {
        let start = s
            .ops
            .iter()
            .rposition(|op| *op == Op::Clear)
            .map_or(0, |i| i + 1);
        s.ops[start..]
            .iter()
            .filter_map(|op| match op {
                Op::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    fn counter() -> (Rc<Cell<u32>>, impl FnOnce() + 'static) {
        let c = Rc::new(Cell::new(0));
        let c2 = c.clone();
        (c, move || c2.set(c2.get() + 1))
    }

    #[test]
    fn phases_run_in_order_then_complete_once() {
        let mut sched = FrameScheduler::new();
        let mut host = LoaderHost::new();
        let (fired, cb) = counter();
        let seen: Rc<RefCell<Vec<String>>> = Rc::default();

        host.show(loader(LoaderConfig::default()).on_complete(cb), &mut sched);
        for _ in 0..400 {
            if let Some(l) = host.active() {
                let mut s = seen.borrow_mut();
                if s.last().map(String::as_str) != Some(l.message()) {
                    s.push(l.message().to_string());
                }
            }
            pump(&mut host, &mut sched);
        }

        let expected: Vec<String> = default_phases()
            .into_iter()
            .map(|p| p.message)
            .chain(std::iter::once("MATRIX ENTRY COMPLETE".to_string()))
            .collect();
        assert_eq!(*seen.borrow(), expected);
        assert_eq!(fired.get(), 1);
        assert!(host.active().is_none());
        assert_eq!(sched.pending_count(), 0);
    }

    #[test]
    fn progress_never_passes_the_current_phase_target() {
        let mut sched = FrameScheduler::new();
        let mut l = loader(LoaderConfig::default());
        l.start(&mut sched);
        for _ in 0..60 {
            l.step(DT, &mut sched);
            if l.state() != LoaderState::Running {
                break;
            }
            assert!(l.progress() <= l.config.phases[l.phase].target);
        }
    }

    #[test]
    fn superseded_loader_never_fires() {
        let mut sched = FrameScheduler::new();
        let mut host = LoaderHost::new();
        let (first, cb1) = counter();
        let (second, cb2) = counter();

        host.show(loader(LoaderConfig::default()).on_complete(cb1), &mut sched);
        pump(&mut host, &mut sched);
        host.show(loader(LoaderConfig::default()).on_complete(cb2), &mut sched);
        for _ in 0..400 {
            pump(&mut host, &mut sched);
        }
        assert_eq!(first.get(), 0);
        assert_eq!(second.get(), 1);
    }

    #[test]
    fn completion_stops_the_rain_and_schedules_nothing() {
        let mut sched = FrameScheduler::new();
        let mut host = LoaderHost::new();
        let flag = Rc::new(Cell::new(false));
        let f2 = flag.clone();
        host.show(
            loader(LoaderConfig {
                hold_ms: 0.0,
                ..LoaderConfig::default()
            })
            .on_complete(move || f2.set(true)),
            &mut sched,
        );

        let mut rain_ran = false;
        for _ in 0..400 {
            if let Some(l) = host.active() {
                rain_ran |= l.rain().is_running();
            }
            pump(&mut host, &mut sched);
            if flag.get() {
                break;
            }
        }
        assert!(flag.get());
        assert!(rain_ran);
        assert!(host.active().is_none());
        assert_eq!(sched.pending_count(), 0);
    }

    #[test]
    fn finale_runs_in_order_before_the_callback() {
        let mut sched = FrameScheduler::new();
        let (fired, cb) = counter();
        let mut l = loader(LoaderConfig::default()).on_complete(cb);
        l.start(&mut sched);

        let mut stages = vec![l.state()];
        for _ in 0..400 {
            drive(&mut l, &mut sched);
            if l.state() != LoaderState::Complete {
                assert_eq!(fired.get(), 0);
            }
            if stages.last() != Some(&l.state()) {
                stages.push(l.state());
            }
        }
        assert_eq!(
            stages,
            vec![
                LoaderState::Running,
                LoaderState::Holding,
                LoaderState::Exploding,
                LoaderState::Corrupting,
                LoaderState::Flashing,
                LoaderState::Fading,
                LoaderState::Complete,
            ]
        );
        assert_eq!(fired.get(), 1);
        assert_eq!(sched.pending_count(), 0);
    }

    #[test]
    fn explosion_flashes_and_shows_the_error_box() {
        let mut sched = FrameScheduler::new();
        let mut l = loader(LoaderConfig::default());
        let glow = ThemeHandle::default().paints().glow;
        l.start(&mut sched);
        run_until(&mut l, &mut sched, LoaderState::Exploding);

        assert_eq!(l.message(), ERROR_TEXT);
        let rain_ops = &l.rain().surface().unwrap().ops;
        assert!(rain_ops.contains(&Op::FillRect {
            w: 640.0,
            h: 320.0,
            paint: glow,
        }));
        let overlay = l.overlay_surface().unwrap();
        assert!(overlay.ops.iter().any(|op| matches!(
            op,
            Op::FillRect { paint, .. } if paint.rgb == glow.rgb && paint.a > 0.9
        )));
        let clean = drawn(overlay);
        assert!(clean.contains("SYSTEMERROR"));
        assert!(clean.contains("MATRIX_ENTRY_FAILED"));

        run_until(&mut l, &mut sched, LoaderState::Corrupting);
        let scrambled = drawn(l.overlay_surface().unwrap());
        assert_eq!(scrambled.chars().count(), clean.chars().count());
        assert_ne!(scrambled, clean);
    }

    #[test]
    fn fade_stops_the_rain_before_completion() {
        let mut sched = FrameScheduler::new();
        let (fired, cb) = counter();
        let mut l = loader(LoaderConfig::default()).on_complete(cb);
        l.start(&mut sched);
        run_until(&mut l, &mut sched, LoaderState::Flashing);
        assert!(l.rain().is_running());
        run_until(&mut l, &mut sched, LoaderState::Fading);
        assert!(!l.rain().is_running());
        assert!(l.is_active());
        assert_eq!(fired.get(), 0);
    }

    #[test]
    fn superseded_mid_finale_only_the_new_loader_fires() {
        let mut sched = FrameScheduler::new();
        let mut host = LoaderHost::new();
        let (first, cb1) = counter();
        let (second, cb2) = counter();

        host.show(loader(LoaderConfig::default()).on_complete(cb1), &mut sched);
        for _ in 0..400 {
            if host.active().map(|l| l.state()) == Some(LoaderState::Flashing) {
                break;
            }
            pump(&mut host, &mut sched);
        }
        assert_eq!(host.active().map(|l| l.state()), Some(LoaderState::Flashing));

        host.show(loader(LoaderConfig::default()).on_complete(cb2), &mut sched);
        for _ in 0..400 {
            pump(&mut host, &mut sched);
        }
        assert_eq!(first.get(), 0);
        assert_eq!(second.get(), 1);
        assert_eq!(sched.pending_count(), 0);
    }

    #[test]
    fn zero_length_finale_ends_with_the_hold() {
        let mut sched = FrameScheduler::new();
        let (fired, cb) = counter();
        let mut l = loader(LoaderConfig {
            hold_ms: 0.0,
            explosion_ms: 0.0,
            fade_ms: 0.0,
            ..LoaderConfig::default()
        })
        .on_complete(cb);
        l.start(&mut sched);
        run_until(&mut l, &mut sched, LoaderState::Holding);
        drive(&mut l, &mut sched);
        assert_eq!(l.state(), LoaderState::Complete);
        assert_eq!(fired.get(), 1);
    }

    #[test]
    fn headless_loader_still_completes_once() {
        let mut sched = FrameScheduler::new();
        let mut host = LoaderHost::new();
        let (fired, cb) = counter();
        let headless = LoaderSequence::<Recorder>::new(
            LoaderConfig::default(),
            None,
            None,
            Rc::new(ThemeHandle::default()),
        )
        .with_seed(9)
        .on_complete(cb);

        host.show(headless, &mut sched);
        assert!(host.is_active());
        for _ in 0..400 {
            pump(&mut host, &mut sched);
        }
        assert_eq!(fired.get(), 1);
        assert!(host.active().is_none());
        assert_eq!(sched.pending_count(), 0);
    }

    #[test]
    fn reduced_motion_shows_a_static_loader() {
        let mut sched = FrameScheduler::new();
        let mut host = LoaderHost::new();
        let (fired, cb) = counter();
        host.show(
            loader(LoaderConfig {
                reduced_motion: true,
                ..LoaderConfig::default()
            })
            .on_complete(cb),
            &mut sched,
        );
        let l = host.active().unwrap();
        assert_eq!(l.message(), "Loading...");
        assert_eq!(l.percent(), 100);
        assert!(!l.rain().is_running());
        assert!(l
            .overlay_surface()
            .unwrap()
            .texts()
            .iter()
            .any(|t| *t == "%"));

        // 500 ms hold at 50 ms per frame
        for _ in 0..9 {
            pump(&mut host, &mut sched);
        }
        assert_eq!(fired.get(), 0);
        pump(&mut host, &mut sched);
        assert_eq!(fired.get(), 1);
    }

    #[test]
    fn destroy_is_idempotent_and_silent() {
        let mut sched = FrameScheduler::new();
        let (fired, cb) = counter();
        let mut l = loader(LoaderConfig::default()).on_complete(cb);
        l.start(&mut sched);
        l.destroy(&mut sched);
        l.destroy(&mut sched);
        l.stop(&mut sched);
        assert_eq!(l.state(), LoaderState::Destroyed);
        assert_eq!(sched.pending_count(), 0);
        assert_eq!(fired.get(), 0);
    }

    #[test]
    fn bad_phase_tables_are_repaired() {
        let cfg = LoaderConfig {
            phases: vec![Phase::new("a", 60.0), Phase::new("b", 30.0), Phase::new("c", 90.0)],
            step_ms: 0.0,
            explosion_ms: -5.0,
            fade_ms: f32::NAN,
            increment: (9.0, 2.0),
            ..LoaderConfig::default()
        }
        .sanitized();
        let targets: Vec<f32> = cfg.phases.iter().map(|p| p.target).collect();
        assert_eq!(targets, vec![60.0, 60.0, 100.0]);
        assert_eq!(cfg.step_ms, 50.0);
        assert_eq!((cfg.explosion_ms, cfg.fade_ms), (0.0, 0.0));
        assert!(cfg.increment.0 < cfg.increment.1);

        let empty = LoaderConfig {
            phases: Vec::new(),
            ..LoaderConfig::default()
        }
        .sanitized();
        assert_eq!(empty.phases.len(), 1);
    }
}
