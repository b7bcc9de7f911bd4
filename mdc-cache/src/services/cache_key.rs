//! Cache-key normalization
//!
//! Turns generation parameters into a stable string so identical logical requests from
//! different sessions or machines share one cache entry. Rounding absorbs floating-point
//! noise in the numeric fields:
//! - start time: 0.1 s
//! - duration: 0.1 s
//! - interval: 0.01 s

use crate::models::GenerationParams;
use crate::services::byte_source::bare_file_name;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Normalized generation key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    /// Wrap an already-normalized key string
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Source file name segment of the key
    pub fn file_name(&self) -> Option<&str> {
        self.0.split(':').nth(1)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Normalize generation parameters into a cache key
///
/// Pure and total. Format:
/// `{kind}:{file}:s{start:.1}:d{duration:.1}:i{interval:.2}:{w}x{h}:q{quality}`
/// with `auto` for absent dimensions or quality.
pub fn normalize(params: &GenerationParams) -> CacheKey {
    // ':' is the segment delimiter
    let file_name = bare_file_name(&params.source).replace(':', "_");

    CacheKey(format!(
        "{}:{}:s{:.1}:d{:.1}:i{:.2}:{}x{}:q{}",
        params.kind,
        file_name,
        round_to(params.start_time, 10.0),
        round_to(params.duration, 10.0),
        round_to(params.interval, 100.0),
        optional(params.width),
        optional(params.height),
        optional(params.quality),
    ))
}

/// Round to `1 / scale` precision; non-finite input becomes 0 and -0 becomes 0
fn round_to(value: f64, scale: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    let rounded = (value * scale).round() / scale;
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

fn optional<T: fmt::Display>(value: Option<T>) -> String {
    value.map_or_else(|| "auto".to_string(), |v| v.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DerivativeKind;

    #[test]
    fn test_key_format() {
        let params = GenerationParams::thumbnails("/media/clip.mp4", 1.25, 10.0, 0.5, 160, 90);
        assert_eq!(
            normalize(&params).as_str(),
            "thumbnails:clip.mp4:s1.3:d10.0:i0.50:160x90:qauto"
        );

        let params = GenerationParams::waveform("voice.wav", 0.0, 3.04, 0.013);
        assert_eq!(
            normalize(&params).as_str(),
            "waveform:voice.wav:s0.0:d3.0:i0.01:autoxauto:qauto"
        );
    }

    #[test]
    fn test_path_collapses_to_file_name() {
        let unix = GenerationParams::waveform("/home/a/proj/voice.wav", 0.0, 5.0, 0.01);
        let windows = unix.with_source("D:\\projects\\voice.wav");
        let bare = unix.with_source("voice.wav");

        assert_eq!(normalize(&unix), normalize(&windows));
        assert_eq!(normalize(&unix), normalize(&bare));
    }

    #[test]
    fn test_float_noise_collapses() {
        let a = GenerationParams::thumbnails("a.mp4", 0.1 + 0.2, 9.999_999_9, 0.1, 320, 180);
        let b = GenerationParams::thumbnails("a.mp4", 0.3, 10.0, 0.100_000_001, 320, 180);
        assert_eq!(normalize(&a), normalize(&b));
    }

    #[test]
    fn test_distinct_parameters_distinct_keys() {
        let base = GenerationParams::thumbnails("a.mp4", 0.0, 10.0, 0.5, 160, 90);
        let variants = [
            base.with_source("b.mp4"),
            GenerationParams { start_time: 0.2, ..base.clone() },
            GenerationParams { duration: 10.2, ..base.clone() },
            GenerationParams { interval: 0.52, ..base.clone() },
            GenerationParams { width: Some(320), ..base.clone() },
            GenerationParams { height: Some(180), ..base.clone() },
            GenerationParams { quality: Some(80), ..base.clone() },
            GenerationParams { kind: DerivativeKind::SpriteSheet, ..base.clone() },
        ];

        let base_key = normalize(&base);
        for variant in &variants {
            assert_ne!(normalize(variant), base_key, "{:?}", variant);
        }
    }

    #[test]
    fn test_total_on_odd_numbers() {
        let params = GenerationParams::waveform("a.wav", -0.01, f64::NAN, f64::INFINITY);
        assert_eq!(
            normalize(&params).as_str(),
            "waveform:a.wav:s0.0:d0.0:i0.00:autoxauto:qauto"
        );
    }

    #[test]
    fn test_file_name_segment() {
        let key = normalize(&GenerationParams::waveform("dir/take:2.wav", 0.0, 1.0, 0.01));
        assert_eq!(key.file_name(), Some("take_2.wav"));
    }
}
