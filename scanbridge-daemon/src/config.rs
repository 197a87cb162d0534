//! Configuration for the scanbridge daemon.

use std::path::Path;

use serde::{Deserialize, Serialize};

use scanbridge_core::PipelineConfig;

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Surface dimensions for the demo display.
    pub display: DisplayConfig,
    /// Change-detection tuning.
    pub scan: ScanConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Demo display surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Surface width in pixels.
    pub width: u32,
    /// Surface height in pixels.
    pub height: u32,
}

/// Change-detection tuning, mapped onto the pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Horizontal bands scanned per full sweep.
    pub rows: u32,
    /// Tiles a scanned row is divided into.
    pub tiles_per_row: u32,
    /// Fraction of hit tiles that promotes a row to full width.
    pub row_threshold: f64,
    /// Scan rate floor, sweeps per second.
    pub min_fps: u32,
    /// Scan rate ceiling, sweeps per second.
    pub max_fps: u32,
    /// Bounded depth of the change-report queue.
    pub report_queue_depth: usize,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            display: DisplayConfig::default(),
            scan: ScanConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 768,
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        let p = PipelineConfig::default();
        Self {
            rows: p.scan_rows,
            tiles_per_row: p.tiles_per_row,
            row_threshold: p.row_threshold,
            min_fps: p.min_fps,
            max_fps: p.max_fps,
            report_queue_depth: p.report_queue_depth,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl DaemonConfig {
    /// Load configuration from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    /// The pipeline view of the scan section.
    pub fn pipeline(&self) -> PipelineConfig {
        PipelineConfig {
            scan_rows: self.scan.rows,
            tiles_per_row: self.scan.tiles_per_row,
            row_threshold: self.scan.row_threshold,
            min_fps: self.scan.min_fps,
            max_fps: self.scan.max_fps,
            report_queue_depth: self.scan.report_queue_depth,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_map_to_a_valid_pipeline_config() {
        let cfg = DaemonConfig::default();
        cfg.pipeline().validate().unwrap();
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let cfg: DaemonConfig = toml::from_str(
            r#"
            [scan]
            max_fps = 15
            "#,
        )
        .unwrap();
        assert_eq!(cfg.scan.max_fps, 15);
        assert_eq!(cfg.display.width, 1024);
        cfg.pipeline().validate().unwrap();
    }
}
