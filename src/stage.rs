// Copyright (c) 2026 rezky_nightky

use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use crossterm::event::{Event, KeyCode, KeyEventKind, MouseButton, MouseEventKind};
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::audio::{AudioManager, Cue};
use crate::error::GlyphResult;
use crate::field::{FieldConfig, ParticleField};
use crate::frame::Frame;
use crate::glyphs::GlyphPool;
use crate::graph::{GraphConfig, NodeGraph};
use crate::loader::{LoaderConfig, LoaderHost, LoaderSequence};
use crate::motion::MotionManager;
use crate::palette::{ColorMode, Rgb};
use crate::scheduler::{Animated, FrameScheduler, Layer};
use crate::surface::{Canvas, CellMetrics, Surface};
use crate::theme::{ColorSource, ThemeHandle, ThemeManager};

const MOVE_GLITCH_PROBABILITY: f32 = 0.1;
const SCROLL_INTENSITY_PROBABILITY: f32 = 0.05;

const KONAMI: [KeyCode; 10] = [
    KeyCode::Up,
    KeyCode::Up,
    KeyCode::Down,
    KeyCode::Down,
    KeyCode::Left,
    KeyCode::Right,
    KeyCode::Left,
    KeyCode::Right,
    KeyCode::Char('b'),
    KeyCode::Char('a'),
];

/// Optional services. Each slot is built on its own; a failed slot stays empty.
#[derive(Default)]
pub struct Capabilities {
    pub theme: Option<ThemeManager>,
    pub audio: Option<AudioManager>,
    pub motion: Option<MotionManager>,
}

impl Capabilities {
    pub fn build(
        theme: GlyphResult<ThemeManager>,
        audio: GlyphResult<AudioManager>,
        motion: GlyphResult<MotionManager>,
    ) -> Self {
        Self {
            theme: slot("theme", theme),
            audio: slot("audio", audio),
            motion: slot("motion", motion),
        }
    }
}

fn slot<T>(name: &'static str, built: GlyphResult<T>) -> Option<T> {
    match built {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::warn!(capability = name, error = %e, "capability unavailable");
            None
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LayerToggles {
    pub background: bool,
    pub rain: bool,
    pub web: bool,
    pub loader: bool,
}

impl Default for LayerToggles {
    fn default() -> Self {
        Self {
            background: true,
            rain: true,
            web: true,
            loader: true,
        }
    }
}

#[derive(Clone, Debug)]
pub struct StageConfig {
    pub layers: LayerToggles,
    pub pool: GlyphPool,
    pub rain: FieldConfig,
    pub background: FieldConfig,
    pub graph: GraphConfig,
    pub loader: LoaderConfig,
    pub metrics: CellMetrics,
    pub seed: Option<u64>,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            layers: LayerToggles::default(),
            pool: GlyphPool::matrix(),
            rain: FieldConfig::rain(),
            background: FieldConfig::background(),
            graph: GraphConfig::default(),
            loader: LoaderConfig::default(),
            metrics: CellMetrics::default(),
            seed: None,
        }
    }
}

/// Terminal input, already mapped into surface pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Input {
    Pointer { x: f32, y: f32 },
    Click { x: f32, y: f32 },
    Scroll,
    Leave,
    Key(KeyCode),
}

pub fn input_from_event(ev: &Event, metrics: CellMetrics) -> Option<Input> {
    let center = |col: u16, row: u16| {
        (
            col as f32 * metrics.cell_w + metrics.cell_w / 2.0,
            row as f32 * metrics.cell_h + metrics.cell_h / 2.0,
        )
    };
    match ev {
        Event::Key(k) if k.kind == KeyEventKind::Press => Some(Input::Key(k.code)),
        Event::Mouse(m) => match m.kind {
            MouseEventKind::Moved | MouseEventKind::Drag(_) => {
                let (x, y) = center(m.column, m.row);
                Some(Input::Pointer { x, y })
            }
            MouseEventKind::Down(MouseButton::Left) => {
                let (x, y) = center(m.column, m.row);
                Some(Input::Click { x, y })
            }
            MouseEventKind::ScrollUp | MouseEventKind::ScrollDown => Some(Input::Scroll),
            _ => None,
        },
        Event::FocusLost => Some(Input::Leave),
        _ => None,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Control {
    Continue,
    Quit,
}

#[derive(Default)]
struct KonamiBuffer {
    keys: VecDeque<KeyCode>,
}

impl KonamiBuffer {
    fn push(&mut self, code: KeyCode) -> bool {
        let code = match code {
            KeyCode::Char(c) => KeyCode::Char(c.to_ascii_lowercase()),
            other => other,
        };
        self.keys.push_back(code);
        if self.keys.len() > KONAMI.len() {
            self.keys.pop_front();
        }
        if self.keys.iter().eq(KONAMI.iter()) {
            self.keys.clear();
            return true;
        }
        false
    }
}

/// Owns every layer, the scheduler and the optional services, and routes input to them.
pub struct Stage {
    config: StageConfig,
    colors: ThemeHandle,
    caps: Capabilities,
    sched: FrameScheduler,
    background: ParticleField<Canvas>,
    rain: ParticleField<Canvas>,
    web: NodeGraph<Canvas>,
    loaders: LoaderHost<Canvas>,
    loader_done: Rc<Cell<bool>>,
    main_started: bool,
    konami: KonamiBuffer,
    rng: StdRng,
    cols: u16,
    rows: u16,
}

impl Stage {
    pub fn new(
        config: StageConfig,
        colors: ThemeHandle,
        caps: Capabilities,
        cols: u16,
        rows: u16,
    ) -> Self {
        let shared: Rc<dyn ColorSource> = Rc::new(colors.clone());
        let canvas = || Some(Canvas::new(cols, rows, config.metrics));

        let mut background = ParticleField::new(
            Layer::Background,
            canvas(),
            config.background.clone(),
            config.pool.clone(),
            shared.clone(),
        );
        let mut rain = ParticleField::new(
            Layer::Rain,
            canvas(),
            config.rain.clone(),
            config.pool.clone(),
            shared.clone(),
        );
        let mut web = NodeGraph::new(canvas(), config.graph.clone(), shared);
        let rng = match config.seed {
            Some(seed) => {
                background = background.with_seed(seed);
                rain = rain.with_seed(seed.wrapping_add(1));
                web = web.with_seed(seed.wrapping_add(2));
                StdRng::seed_from_u64(seed.wrapping_add(3))
            }
            None => StdRng::from_os_rng(),
        };

        Self {
            config,
            colors,
            caps,
            sched: FrameScheduler::new(),
            background,
            rain,
            web,
            loaders: LoaderHost::new(),
            loader_done: Rc::new(Cell::new(false)),
            main_started: false,
            konami: KonamiBuffer::default(),
            rng,
            cols,
            rows,
        }
    }

    /// Shows the loader first when enabled; the animated layers start once it completes.
    pub fn boot(&mut self) {
        tracing::info!(
            cols = self.cols,
            rows = self.rows,
            layers = ?self.config.layers,
            sound = self.caps.audio.as_ref().is_some_and(|a| a.is_enabled()),
            reduced_motion = self.reduced_motion(),
            "stage boot"
        );
        if self.config.layers.loader {
            self.show_loader();
        } else {
            self.start_main_layers();
        }
    }

    pub fn reduced_motion(&self) -> bool {
        self.caps.motion.as_ref().is_some_and(|m| m.is_reduced())
    }

    pub fn loader_active(&self) -> bool {
        self.loaders.is_active()
    }

    #[cfg(test)]
    pub fn is_running(&self, layer: Layer) -> bool {
        match layer {
            Layer::Background => self.background.is_running(),
            Layer::Rain => self.rain.is_running(),
            Layer::Web => self.web.is_running(),
            Layer::Loader => self.loaders.is_active(),
            Layer::LoaderRain => self
                .loaders
                .active()
                .is_some_and(|l| l.rain().is_running()),
        }
    }

    pub fn show_loader(&mut self) {
        let mut config = self.config.loader.clone();
        config.reduced_motion = self.reduced_motion();
        let done = self.loader_done.clone();
        let mut loader = LoaderSequence::new(
            config,
            Some(Canvas::new(self.cols, self.rows, self.config.metrics)),
            Some(Canvas::new(self.cols, self.rows, self.config.metrics)),
            Rc::new(self.colors.clone()),
        )
        .on_complete(move || done.set(true));
        if let Some(seed) = self.config.seed {
            loader = loader.with_seed(seed.wrapping_add(4));
        }
        self.loaders.show(loader, &mut self.sched);
    }

    fn start_main_layers(&mut self) {
        self.main_started = true;
        if self.reduced_motion() {
            tracing::info!("reduced motion; animated layers stay hidden");
            return;
        }
        let layers = self.config.layers;
        if layers.background {
            self.background.start(&mut self.sched);
        }
        if layers.rain {
            self.rain.start(&mut self.sched);
        }
        if layers.web {
            self.web.start(&mut self.sched);
        }
    }

    fn hide_main_layers(&mut self) {
        self.background.stop(&mut self.sched);
        self.rain.stop(&mut self.sched);
        self.web.stop(&mut self.sched);
        for s in [
            self.background.surface_mut(),
            self.rain.surface_mut(),
            self.web.surface_mut(),
        ]
        .into_iter()
        .flatten()
        {
            s.clear();
        }
    }

    fn on_loader_complete(&mut self) {
        tracing::info!("loader complete; starting layers");
        self.start_main_layers();
        if let Some(audio) = self.caps.audio.as_mut() {
            audio.cue(Cue::LoaderComplete);
        }
    }

    /// Runs every frame that is due, in request order.
    pub fn pump(&mut self, dt: Duration) {
        for (handle, layer) in self.sched.take_due() {
            match layer {
                Layer::Background => {
                    self.background.on_frame(handle, dt, &mut self.sched);
                }
                Layer::Rain => {
                    self.rain.on_frame(handle, dt, &mut self.sched);
                }
                Layer::Web => {
                    self.web.on_frame(handle, dt, &mut self.sched);
                }
                Layer::Loader | Layer::LoaderRain => {
                    self.loaders.dispatch(handle, layer, dt, &mut self.sched);
                }
            }
        }
        if self.loader_done.replace(false) {
            self.on_loader_complete();
        }
    }

    pub fn handle(&mut self, input: Input) -> Control {
        match input {
            Input::Pointer { x, y } => {
                self.web.set_pointer(x, y);
                if self.rain.is_running() && self.rng.random::<f32>() < MOVE_GLITCH_PROBABILITY {
                    self.rain.trigger_glitch();
                }
            }
            Input::Leave => self.web.clear_pointer(),
            Input::Click { x, y } => {
                self.web.set_pointer(x, y);
                if self.rain.is_running() {
                    self.rain.create_explosion();
                    self.rain.trigger_glitch();
                }
                if let Some(audio) = self.caps.audio.as_mut() {
                    audio.cue(Cue::Click);
                }
            }
            Input::Scroll => {
                if self.rng.random::<f32>() < SCROLL_INTENSITY_PROBABILITY {
                    self.rain.increase_intensity();
                }
            }
            Input::Key(code) => return self.handle_key(code),
        }
        Control::Continue
    }

    fn handle_key(&mut self, code: KeyCode) -> Control {
        if self.konami.push(code) {
            tracing::info!("konami sequence");
            self.rain.increase_intensity();
            return Control::Continue;
        }
        match code {
            KeyCode::Esc | KeyCode::Char('q') => return Control::Quit,
            KeyCode::Char('l') => self.show_loader(),
            KeyCode::Char('t') => match self.caps.theme.as_mut() {
                Some(theme) => {
                    theme.toggle();
                }
                None => tracing::debug!("theme toggle ignored; no theme manager"),
            },
            KeyCode::Char('s') => match self.caps.audio.as_mut() {
                Some(audio) => {
                    audio.toggle();
                }
                None => tracing::debug!("sound toggle ignored; no audio manager"),
            },
            KeyCode::Char('r') => self.toggle_motion(),
            _ => {}
        }
        Control::Continue
    }

    fn toggle_motion(&mut self) {
        let Some(motion) = self.caps.motion.as_mut() else {
            tracing::debug!("motion toggle ignored; no motion manager");
            return;
        };
        if motion.toggle() {
            self.hide_main_layers();
        } else if self.main_started {
            self.start_main_layers();
        }
    }

    pub fn resize(&mut self, cols: u16, rows: u16) {
        self.cols = cols;
        self.rows = rows;
        let w = cols as f32 * self.config.metrics.cell_w;
        let h = rows as f32 * self.config.metrics.cell_h;
        self.background.resize(w, h);
        self.rain.resize(w, h);
        self.web.resize(w, h);
        self.loaders.resize(w, h);
        tracing::debug!(cols, rows, "stage resized");
    }

    /// Flattens every layer into `frame`, bottom to top.
    pub fn compose(&self, frame: &mut Frame, mode: ColorMode) {
        let mut layers: Vec<&Canvas> = Vec::with_capacity(5);
        layers.extend(self.background.surface());
        layers.extend(self.rain.surface());
        layers.extend(self.web.surface());
        if let Some(loader) = self.loaders.active() {
            layers.extend(loader.rain().surface());
            layers.extend(loader.overlay_surface());
        }
        frame.compose(&layers, self.colors.paints().background, mode);
    }

    pub fn background_color(&self) -> Rgb {
        self.colors.paints().background
    }

    pub fn shutdown(&mut self) {
        if let Some(l) = self.loaders.active().filter(|_| self.loader_active()) {
            tracing::debug!(percent = l.percent(), message = l.message(), "dismissing active loader");
        }
        self.loaders.dismiss(&mut self.sched);
        self.background.stop(&mut self.sched);
        self.rain.stop(&mut self.sched);
        self.web.stop(&mut self.sched);
        tracing::info!(pending = self.sched.pending_count(), "stage shut down");
    }
}
