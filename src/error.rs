// Copyright (c) 2026 rezky_nightky

pub type GlyphResult<T> = Result<T, GlyphError>;

#[derive(thiserror::Error, Debug)]
pub enum GlyphError {
    #[error("config error: {0}")]
    Config(String),

    #[error("theme error: {0}")]
    Theme(String),

    #[error("audio error: {0}")]
    Audio(String),

    #[error("serialization error: {0}")]
    Serde(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl GlyphError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn theme(msg: impl Into<String>) -> Self {
        Self::Theme(msg.into())
    }

    pub fn audio(msg: impl Into<String>) -> Self {
        Self::Audio(msg.into())
    }

    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }
}
