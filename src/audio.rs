// Copyright (c) 2026 rezky_nightky

use std::io::{self, Write};

use crate::error::{GlyphError, GlyphResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cue {
    Click,
    LoaderComplete,
}

impl Cue {
    fn bells(self) -> usize {
        match self {
            Cue::Click => 1,
            Cue::LoaderComplete => 2,
        }
    }
}

/// Whatever actually makes the noise.
pub trait CueSink {
    fn emit(&mut self, cue: Cue, volume: f32) -> GlyphResult<()>;
}

/// Rings the terminal bell on stdout.
pub struct BellSink;

impl CueSink for BellSink {
    fn emit(&mut self, cue: Cue, _volume: f32) -> GlyphResult<()> {
        let mut out = io::stdout().lock();
        for _ in 0..cue.bells() {
            out.write_all(b"\x07")?;
        }
        out.flush()?;
        Ok(())
    }
}

/// Owns the only audio-enable flag. Every cue goes through `cue`.
pub struct AudioManager {
    enabled: bool,
    volume: f32,
    sink: Box<dyn CueSink>,
}

impl AudioManager {
    pub fn new(enabled: bool, volume: f32, sink: Box<dyn CueSink>) -> GlyphResult<Self> {
        let volume = check_volume(volume)?;
        tracing::debug!(enabled, volume, "audio manager ready");
        Ok(Self {
            enabled,
            volume,
            sink,
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn toggle(&mut self) -> bool {
        self.enabled = !self.enabled;
        tracing::info!(enabled = self.enabled, "audio toggled");
        self.enabled
    }

    /// Returns `true` if the cue was emitted. Sink failures are logged, not raised.
    pub fn cue(&mut self, cue: Cue) -> bool {
        if !self.enabled || self.volume <= 0.0 {
            return false;
        }
        match self.sink.emit(cue, self.volume) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(?cue, error = %e, "audio cue failed");
                false
            }
        }
    }
}

fn check_volume(v: f32) -> GlyphResult<f32> {
    if !v.is_finite() || !(0.0..=1.0).contains(&v) {
        return Err(GlyphError::audio(format!(
            "volume {} out of range (min 0 max 1)",
            v
        )));
    }
    Ok(v)
}
