// Copyright (c) 2026 rezky_nightky

use std::time::Duration;

/// Which engine a frame request belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Layer {
    Background,
    Rain,
    Web,
    Loader,
    LoaderRain,
}

/// Ticket for one requested frame. Never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FrameHandle(u64);

/// Pending frame requests, drained once per host frame.
#[derive(Debug, Default)]
pub struct FrameScheduler {
    next_id: u64,
    queue: Vec<(FrameHandle, Layer)>,
}

impl FrameScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&mut self, layer: Layer) -> FrameHandle {
        self.next_id = self.next_id.wrapping_add(1);
        let handle = FrameHandle(self.next_id);
        self.queue.push((handle, layer));
        handle
    }

    /// Returns `false` when the handle already ran or was never issued.
    pub fn cancel(&mut self, handle: FrameHandle) -> bool {
        match self.queue.iter().position(|(h, _)| *h == handle) {
            Some(i) => {
                self.queue.remove(i);
                true
            }
            None => false,
        }
    }

    /// Everything requested so far; requests made while dispatching these land in the next batch.
    pub fn take_due(&mut self) -> Vec<(FrameHandle, Layer)> {
        std::mem::take(&mut self.queue)
    }

    pub fn pending_count(&self) -> usize {
        self.queue.len()
    }
}

/// Running flag plus the single in-flight frame of one engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Lifecycle {
    layer: Layer,
    running: bool,
    pending: Option<FrameHandle>,
}

impl Lifecycle {
    pub fn new(layer: Layer) -> Self {
        Self {
            layer,
            running: false,
            pending: None,
        }
    }

    pub fn layer(&self) -> Layer {
        self.layer
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Returns `true` if this call flipped the engine from stopped to running.
    pub fn start(&mut self, sched: &mut FrameScheduler) -> bool {
        let was_running = self.running;
        self.running = true;
        if self.pending.is_none() {
            self.pending = Some(sched.request(self.layer));
        }
        !was_running
    }

    /// Returns `true` if this call flipped the engine from running to stopped.
    pub fn stop(&mut self, sched: &mut FrameScheduler) -> bool {
        let was_running = self.running;
        self.running = false;
        if let Some(h) = self.pending.take() {
            sched.cancel(h);
        }
        was_running
    }

    /// Claims a dispatched frame. Stale or foreign handles are ignored.
    pub fn begin_frame(&mut self, handle: FrameHandle) -> bool {
        if self.pending != Some(handle) {
            return false;
        }
        self.pending = None;
        self.running
    }

    pub fn end_frame(&mut self, sched: &mut FrameScheduler) {
        if self.running && self.pending.is_none() {
            self.pending = Some(sched.request(self.layer));
        }
    }
}

/// Start/stop/tick contract shared by every engine.
pub trait Animated {
    fn lifecycle(&self) -> &Lifecycle;
    fn lifecycle_mut(&mut self) -> &mut Lifecycle;

    /// One frame of update and draw. May call `stop`.
    fn step(&mut self, dt: Duration, sched: &mut FrameScheduler);

    fn start(&mut self, sched: &mut FrameScheduler) {
        if self.lifecycle_mut().start(sched) {
            tracing::debug!(layer = ?self.lifecycle().layer(), "engine started");
        }
    }

    fn stop(&mut self, sched: &mut FrameScheduler) {
        if self.lifecycle_mut().stop(sched) {
            tracing::debug!(layer = ?self.lifecycle().layer(), "engine stopped");
        }
    }

    fn is_running(&self) -> bool {
        self.lifecycle().is_running()
    }

    /// Runs `step` if `handle` is this engine's in-flight frame, then reschedules.
    fn on_frame(&mut self, handle: FrameHandle, dt: Duration, sched: &mut FrameScheduler) -> bool {
        if !self.lifecycle_mut().begin_frame(handle) {
            return false;
        }
        self.step(dt, sched);
        self.lifecycle_mut().end_frame(sched);
        true
    }
}
