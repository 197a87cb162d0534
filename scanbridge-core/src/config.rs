//! Pipeline tuning knobs.

use serde::{Deserialize, Serialize};

use crate::error::ScanError;

/// Configuration consumed by [`Pipeline::start`](crate::Pipeline::start).
///
/// The grid and threshold values drive the periodic tile scanner; the
/// fps bounds clamp its adaptive scan rate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Number of grid rows the surface is divided into. Each scanner
    /// invocation samples one pixel scanline per grid row.
    pub scan_rows: u32,
    /// Number of horizontal tiles per grid row (at most 64, so a row's
    /// hits fit one bitmask word).
    pub tiles_per_row: u32,
    /// Fraction of hit tiles above which a whole row is reported as one
    /// full-width rectangle.
    pub row_threshold: f64,
    /// Lower bound for the adaptive scan rate, in passes per second.
    pub min_fps: u32,
    /// Upper bound for the adaptive scan rate, in passes per second.
    pub max_fps: u32,
    /// Capacity of the inbound change-report queue.
    pub report_queue_depth: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            scan_rows: 32,
            tiles_per_row: 32,
            row_threshold: 0.5,
            min_fps: 1,
            max_fps: 30,
            report_queue_depth: 256,
        }
    }
}

impl PipelineConfig {
    /// Reject configurations the scanner cannot run with.
    pub fn validate(&self) -> Result<(), ScanError> {
        if self.scan_rows == 0 {
            return Err(ScanError::InvalidConfig("scan_rows must be > 0"));
        }
        if self.tiles_per_row == 0 || self.tiles_per_row > 64 {
            return Err(ScanError::InvalidConfig(
                "tiles_per_row must be in 1..=64",
            ));
        }
        if !(0.0..=1.0).contains(&self.row_threshold) {
            return Err(ScanError::InvalidConfig(
                "row_threshold must be in 0.0..=1.0",
            ));
        }
        if self.min_fps == 0 || self.max_fps < self.min_fps {
            return Err(ScanError::InvalidConfig(
                "fps bounds must satisfy 0 < min_fps <= max_fps",
            ));
        }
        if self.report_queue_depth == 0 {
            return Err(ScanError::InvalidConfig(
                "report_queue_depth must be > 0",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_bad_knobs() {
        let mut cfg = PipelineConfig::default();
        cfg.tiles_per_row = 65;
        assert!(cfg.validate().is_err());

        let mut cfg = PipelineConfig::default();
        cfg.min_fps = 10;
        cfg.max_fps = 5;
        assert!(cfg.validate().is_err());

        let mut cfg = PipelineConfig::default();
        cfg.row_threshold = 1.5;
        assert!(cfg.validate().is_err());
    }
}
