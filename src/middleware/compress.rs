use serde::Deserialize;
use tower_http::compression::{CompressionLayer, CompressionLevel};

/// Gzip response compression. `level` is -1 for the library default or 1..=9.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GzipConfig {
    pub enabled: bool,
    pub level: i32,
}

impl Default for GzipConfig {
    fn default() -> Self {
        Self { enabled: true, level: -1 }
    }
}

impl GzipConfig {
    /// The configured level when it is out of range.
    pub fn level_if_invalid(&self) -> Option<i32> {
        match self.level {
            -1 | 1..=9 => None,
            other => Some(other),
        }
    }

    pub fn compression_level(&self) -> CompressionLevel {
        match self.level {
            1..=9 => CompressionLevel::Precise(self.level),
            _ => CompressionLevel::Default,
        }
    }

    /// Gzip only; the layer also sets `Vary: Accept-Encoding`.
    pub fn layer(&self) -> CompressionLayer {
        CompressionLayer::new().gzip(true).no_br().no_deflate().no_zstd().quality(self.compression_level())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_validation() {
        assert_eq!(GzipConfig { enabled: true, level: -1 }.level_if_invalid(), None);
        assert_eq!(GzipConfig { enabled: true, level: 9 }.level_if_invalid(), None);
        assert_eq!(GzipConfig { enabled: true, level: 0 }.level_if_invalid(), Some(0));
        assert_eq!(GzipConfig { enabled: true, level: 12 }.level_if_invalid(), Some(12));
    }
}
