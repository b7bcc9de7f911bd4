//! Derivative artifact requests and descriptors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Family of derived artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DerivativeKind {
    /// Frame thumbnails sampled along the timeline
    Thumbnails,
    /// Audio waveform peaks
    Waveform,
    /// Thumbnails packed into a single sprite sheet
    SpriteSheet,
}

impl DerivativeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DerivativeKind::Thumbnails => "thumbnails",
            DerivativeKind::Waveform => "waveform",
            DerivativeKind::SpriteSheet => "sprite-sheet",
        }
    }
}

impl fmt::Display for DerivativeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters of one derivative generation request
///
/// `source` may be a bare file name or a full path; only the file name takes part in the
/// cache key. Times are in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub source: String,
    pub kind: DerivativeKind,
    #[serde(default)]
    pub start_time: f64,
    pub duration: f64,
    /// Spacing between samples (frames or peaks)
    pub interval: f64,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub quality: Option<u8>,
}

impl GenerationParams {
    /// Thumbnail request with output dimensions
    pub fn thumbnails(
        source: impl Into<String>,
        start_time: f64,
        duration: f64,
        interval: f64,
        width: u32,
        height: u32,
    ) -> Self {
        Self {
            source: source.into(),
            kind: DerivativeKind::Thumbnails,
            start_time,
            duration,
            interval,
            width: Some(width),
            height: Some(height),
            quality: None,
        }
    }

    /// Waveform request over a time range
    pub fn waveform(source: impl Into<String>, start_time: f64, duration: f64, interval: f64) -> Self {
        Self {
            source: source.into(),
            kind: DerivativeKind::Waveform,
            start_time,
            duration,
            interval,
            width: None,
            height: None,
            quality: None,
        }
    }

    /// Same request against a different source
    pub fn with_source(&self, source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..self.clone()
        }
    }
}

/// Result of a successful generation
///
/// Holds references to the produced files (URLs or paths) plus basic metadata. Callers
/// may persist descriptors in their own project metadata; the cache never does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactDescriptor {
    pub kind: DerivativeKind,
    pub urls: Vec<String>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    /// Number of frames, peaks or sprite cells produced
    pub count: usize,
    /// Covered duration in seconds
    pub duration: f64,
}
