//! Pipeline configuration.
//!
//! All policy the stages consult (taxonomy, confidence threshold,
//! supported media types, payload limit, per-stage time budgets) is
//! supplied here at construction and never mutated at runtime.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::taxonomy::Taxonomy;

/// Environment variable pointing at a config file.
pub const CONFIG_ENV: &str = "DOCPIPE_CONFIG";

/// Per-stage time budgets in milliseconds.
///
/// Classification is in-memory scoring and runs without a budget; OCR and
/// extraction shell out or scan text and must be bounded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StageTimeouts {
    pub ocr_ms: u64,
    pub extraction_ms: u64,
}

impl StageTimeouts {
    pub fn ocr(&self) -> Duration {
        Duration::from_millis(self.ocr_ms)
    }

    pub fn extraction(&self) -> Duration {
        Duration::from_millis(self.extraction_ms)
    }
}

impl Default for StageTimeouts {
    fn default() -> Self {
        Self {
            ocr_ms: 120_000,
            extraction_ms: 30_000,
        }
    }
}

/// Settings for the Tesseract engine adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TesseractConfig {
    /// Tesseract language code.
    pub language: String,
    /// Rasterization resolution for PDF pages.
    pub dpi: u32,
    /// Minimum characters per page for native PDF text to be trusted
    /// without falling back to OCR.
    pub min_chars_per_page: usize,
}

impl Default for TesseractConfig {
    fn default() -> Self {
        Self {
            language: "eng".to_string(),
            dpi: 300,
            min_chars_per_page: 100,
        }
    }
}

/// Static pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub taxonomy: Taxonomy,
    /// Classification confidence below this yields the `unknown` label.
    pub confidence_threshold: f64,
    /// MIME types the OCR stage accepts, matched against sniffed content.
    pub supported_media_types: Vec<String>,
    /// Upload size cap in bytes.
    pub max_payload_bytes: u64,
    pub timeouts: StageTimeouts,
    pub tesseract: TesseractConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            taxonomy: Taxonomy::default(),
            confidence_threshold: 0.35,
            supported_media_types: vec![
                "application/pdf".to_string(),
                "image/png".to_string(),
                "image/jpeg".to_string(),
                "image/tiff".to_string(),
            ],
            max_payload_bytes: 50 * 1024 * 1024,
            timeouts: StageTimeouts::default(),
            tesseract: TesseractConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration.
    ///
    /// Resolution order: explicit path, `DOCPIPE_CONFIG`, then the user
    /// config directory. A missing file yields defaults; a present but
    /// invalid file is an error.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = match path {
            Some(p) => Some(p.to_path_buf()),
            None => match std::env::var(CONFIG_ENV) {
                Ok(p) => Some(PathBuf::from(p)),
                Err(_) => Self::default_path(),
            },
        };

        let config = match path {
            Some(ref p) if p.exists() => {
                let raw = std::fs::read_to_string(p)?;
                let config: Self = toml::from_str(&raw)?;
                tracing::debug!(path = %p.display(), "loaded pipeline config");
                config
            }
            _ => Self::default(),
        };

        config.ensure_valid()?;
        Ok(config)
    }

    /// Default config file location under the user config directory.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("docpipe").join("config.toml"))
    }

    fn ensure_valid(&self) -> anyhow::Result<()> {
        self.taxonomy.validate()?;
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            anyhow::bail!(
                "confidence_threshold must be in [0, 1], got {}",
                self.confidence_threshold
            );
        }
        if self.supported_media_types.is_empty() {
            anyhow::bail!("supported_media_types must not be empty");
        }
        if self.max_payload_bytes == 0 {
            anyhow::bail!("max_payload_bytes must be positive");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        PipelineConfig::default().ensure_valid().unwrap();
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = PipelineConfig::default();
        let raw = toml::to_string(&config).unwrap();
        let parsed: PipelineConfig = toml::from_str(&raw).unwrap();
        assert_eq!(parsed.confidence_threshold, config.confidence_threshold);
        assert_eq!(parsed.taxonomy.labels.len(), config.taxonomy.labels.len());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let parsed: PipelineConfig = toml::from_str("confidence_threshold = 0.5\n").unwrap();
        assert_eq!(parsed.confidence_threshold, 0.5);
        assert_eq!(parsed.timeouts.ocr_ms, StageTimeouts::default().ocr_ms);
        assert!(!parsed.supported_media_types.is_empty());
    }

    #[test]
    fn test_bad_threshold_rejected() {
        let config = PipelineConfig {
            confidence_threshold: 1.5,
            ..Default::default()
        };
        assert!(config.ensure_valid().is_err());
    }
}
