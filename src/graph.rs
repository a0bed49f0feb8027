// Copyright (c) 2026 rezky_nightky

use std::f32::consts::{FRAC_PI_2, FRAC_PI_4, PI, TAU};
use std::rc::Rc;
use std::time::Duration;

use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::Deserialize;

use crate::scheduler::{Animated, FrameScheduler, Layer, Lifecycle};
use crate::surface::Surface;
use crate::theme::ColorSource;

const NODE_GLYPH: &str = "o";
const NODE_ALPHA: f32 = 0.9;
const BODY_OFFSET_Y: f32 = 16.0;

#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
pub struct RingSpec {
    pub radius: f32,
    pub count: usize,
}

impl RingSpec {
    pub const fn new(radius: f32, count: usize) -> Self {
        Self { radius, count }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct GraphConfig {
    pub rings: Vec<RingSpec>,
    pub max_distance: f32,
    pub bulge_radius: f32,
    pub bulge_strength: f32,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            rings: vec![
                RingSpec::new(200.0, 15),
                RingSpec::new(300.0, 20),
                RingSpec::new(400.0, 25),
                RingSpec::new(500.0, 30),
            ],
            max_distance: 150.0,
            bulge_radius: 150.0,
            bulge_strength: 40.0,
        }
    }
}

/// An orbiting point anchored on a ring.
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    init_x: f32,
    init_y: f32,
    radius: f32,
    angle: f32,
    angular_speed: f32,
    swing: f32,
    base_rotation: f32,
    x: f32,
    y: f32,
}

impl Node {
    fn new<R: Rng>(init_x: f32, init_y: f32, rng: &mut R) -> Self {
        let mut node = Self {
            init_x,
            init_y,
            radius: 5.0 + rng.random::<f32>() * 15.0,
            angle: rng.random::<f32>() * TAU,
            angular_speed: (0.02 + rng.random::<f32>() * 0.08) / 60.0,
            swing: 0.05 + rng.random::<f32>() * 0.3,
            base_rotation: (rng.random::<f32>() - 0.5) * (PI - 0.4),
            x: init_x,
            y: init_y,
        };
        (node.x, node.y) = node.base_position();
        node
    }

    pub fn initial_position(&self) -> (f32, f32) {
        (self.init_x, self.init_y)
    }

    /// Orbit position before any pointer displacement.
    pub fn base_position(&self) -> (f32, f32) {
        (
            self.init_x + self.angle.cos() * self.radius,
            self.init_y + self.angle.sin() * self.radius,
        )
    }

    /// Rendered position, bulge included.
    pub fn position(&self) -> (f32, f32) {
        (self.x, self.y)
    }

    pub fn rotation(&self) -> f32 {
        self.base_rotation + self.angle.cos() * self.swing
    }

    fn update(&mut self, pointer: Option<(f32, f32)>, bulge_radius: f32, bulge_strength: f32) {
        self.angle = (self.angle + self.angular_speed) % TAU;
        let (bx, by) = self.base_position();
        let (dx, dy) = match pointer {
            Some(p) => bulge_offset((bx, by), p, bulge_radius, bulge_strength),
            None => (0.0, 0.0),
        };
        self.x = bx + dx;
        self.y = by + dy;
    }
}

/// Displacement pushing `base` away from `pointer` when it is within `radius`.
pub fn bulge_offset(base: (f32, f32), pointer: (f32, f32), radius: f32, strength: f32) -> (f32, f32) {
    let dx = pointer.0 - base.0;
    let dy = pointer.1 - base.1;
    let distance = (dx * dx + dy * dy).sqrt();
    if radius <= 0.0 || distance.is_nan() || distance >= radius {
        return (0.0, 0.0);
    }
    let magnitude = (((radius - distance) / radius) * FRAC_PI_4).sin() * strength;
    let away = if distance > 0.0 { (-dy).atan2(-dx) } else { 0.0 };
    (away.cos() * magnitude, away.sin() * magnitude)
}

/// Link between two nodes, by index. Length and angle follow the nodes every tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Edge {
    pub a: usize,
    pub b: usize,
    length: f32,
    angle: f32,
}

impl Edge {
    #[allow(dead_code)]
    pub fn length(&self) -> f32 {
        self.length
    }

    #[allow(dead_code)]
    pub fn angle(&self) -> f32 {
        self.angle
    }

    pub fn opacity(&self) -> f32 {
        (0.4 - self.length / 1000.0).max(0.1)
    }
}

fn body_glyph(rotation: f32) -> &'static str {
    match rotation {
        r if r > 0.4 => "\\",
        r if r < -0.4 => "/",
        _ => "|",
    }
}

/// Rings of orbiting nodes joined by proximity edges.
pub struct NodeGraph<S: Surface> {
    life: Lifecycle,
    surface: Option<S>,
    config: GraphConfig,
    colors: Rc<dyn ColorSource>,
    rng: StdRng,
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    pointer: Option<(f32, f32)>,
}

impl<S: Surface> NodeGraph<S> {
    pub fn new(surface: Option<S>, config: GraphConfig, colors: Rc<dyn ColorSource>) -> Self {
        if surface.is_none() {
            tracing::warn!("node graph has no surface; layer disabled");
        }
        let mut graph = Self {
            life: Lifecycle::new(Layer::Web),
            surface,
            config,
            colors,
            rng: StdRng::from_os_rng(),
            nodes: Vec::new(),
            edges: Vec::new(),
            pointer: None,
        };
        graph.rebuild();
        graph
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self.rebuild();
        self
    }

    #[allow(dead_code)]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    #[allow(dead_code)]
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn surface(&self) -> Option<&S> {
        self.surface.as_ref()
    }

    pub fn surface_mut(&mut self) -> Option<&mut S> {
        self.surface.as_mut()
    }

    fn rebuild(&mut self) {
        let Some(s) = self.surface.as_ref() else {
            return;
        };
        let (cx, cy) = (s.width() / 2.0, s.height() / 2.0);
        let rings = self.config.rings.clone();
        self.build(cx, cy, &rings);
        self.connect(self.config.max_distance);
    }

    /// Replaces all nodes with evenly spaced rings around `(cx, cy)`; edges are dropped.
    pub fn build(&mut self, cx: f32, cy: f32, rings: &[RingSpec]) {
        if self.surface.is_none() {
            return;
        }
        self.nodes.clear();
        self.edges.clear();
        for ring in rings {
            for i in 0..ring.count {
                let a = i as f32 * TAU / ring.count as f32 - FRAC_PI_2;
                let x = cx + a.cos() * ring.radius;
                let y = cy + a.sin() * ring.radius;
                self.nodes.push(Node::new(x, y, &mut self.rng));
            }
        }
        tracing::debug!(nodes = self.nodes.len(), rings = rings.len(), "graph built");
    }

    /// Links every pair whose initial positions are closer than `max_distance`.
    ///
    /// Quadratic in the node count; the default rings hold 90 nodes.
    pub fn connect(&mut self, max_distance: f32) -> usize {
        if self.surface.is_none() {
            return 0;
        }
        self.edges.clear();
        for i in 0..self.nodes.len() {
            for j in (i + 1)..self.nodes.len() {
                let (x1, y1) = self.nodes[i].initial_position();
                let (x2, y2) = self.nodes[j].initial_position();
                let (dx, dy) = (x2 - x1, y2 - y1);
                let length = (dx * dx + dy * dy).sqrt();
                if length < max_distance {
                    self.edges.push(Edge {
                        a: i,
                        b: j,
                        length,
                        angle: dy.atan2(dx),
                    });
                }
            }
        }
        tracing::debug!(edges = self.edges.len(), max_distance, "graph connected");
        self.edges.len()
    }

    pub fn set_pointer(&mut self, x: f32, y: f32) {
        self.pointer = (x.is_finite() && y.is_finite()).then_some((x, y));
    }

    pub fn clear_pointer(&mut self) {
        self.pointer = None;
    }

    pub fn resize(&mut self, width: f32, height: f32) {
        let Some(s) = self.surface.as_mut() else {
            return;
        };
        s.resize(width, height);
        s.clear();
        self.rebuild();
    }

    pub(crate) fn tick(&mut self) {
        let Some(surface) = self.surface.as_mut() else {
            return;
        };
        let (radius, strength) = (self.config.bulge_radius, self.config.bulge_strength);
        for node in &mut self.nodes {
            node.update(self.pointer, radius, strength);
        }
        for edge in &mut self.edges {
            let (x1, y1) = self.nodes[edge.a].position();
            let (x2, y2) = self.nodes[edge.b].position();
            let (dx, dy) = (x2 - x1, y2 - y1);
            edge.length = (dx * dx + dy * dy).sqrt();
            edge.angle = dy.atan2(dx);
        }

        let paints = self.colors.paints();
        surface.clear();
        for edge in &self.edges {
            let (x1, y1) = self.nodes[edge.a].position();
            let (x2, y2) = self.nodes[edge.b].position();
            surface.stroke_line(x1, y1, x2, y2, paints.glow.with_opacity(edge.opacity()));
        }
        let node_paint = paints.color.with_opacity(NODE_ALPHA);
        for node in &self.nodes {
            let (x, y) = node.position();
            surface.fill_text(NODE_GLYPH, x, y, node_paint);
            surface.fill_text(body_glyph(node.rotation()), x, y + BODY_OFFSET_Y, node_paint);
        }
    }
}

impl<S: Surface> Animated for NodeGraph<S> {
    fn lifecycle(&self) -> &Lifecycle {
        &self.life
    }

    fn lifecycle_mut(&mut self) -> &mut Lifecycle {
        &mut self.life
    }

    fn step(&mut self, _dt: Duration, _sched: &mut FrameScheduler) {
        self.tick();
    }

    fn start(&mut self, sched: &mut FrameScheduler) {
        if self.surface.is_none() {
            return;
        }
        if self.life.start(sched) {
            tracing::debug!(nodes = self.nodes.len(), edges = self.edges.len(), "graph started");
        }
    }
}
