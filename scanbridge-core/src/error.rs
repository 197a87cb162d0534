//! Domain-specific error types for the capture pipeline.
//!
//! All fallible operations return `Result<T, ScanError>`.
//! The split that matters operationally: [`ScanError::is_transient`]
//! distinguishes per-rectangle failures the worker logs and skips from
//! initialization failures that prevent the pipeline from starting.

use thiserror::Error;

/// The canonical error type for the capture pipeline.
#[derive(Debug, Error)]
pub enum ScanError {
    // ── Initialization errors (fatal to the pipeline) ────────────
    /// A configuration knob was outside its valid range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),

    /// The display source reported a zero-sized or otherwise unusable
    /// surface.
    #[error("unusable surface: {width}x{height}")]
    UnusableSurface { width: u32, height: u32 },

    /// Subscribing to damage notifications failed.
    #[error("damage subscription failed: {0}")]
    Subscribe(String),

    /// An OS thread could not be spawned.
    #[error("thread spawn failed: {0}")]
    Spawn(#[from] std::io::Error),

    // ── Transient errors (logged, rectangle dropped) ─────────────
    /// A capture-buffer allocation was refused (the shared-memory
    /// exhaustion case).
    #[error("capture buffer allocation failed for {width}x{height}")]
    NoCaptureBuffer { width: u32, height: u32 },

    /// The native copy into a capture buffer failed.
    #[error("capture of {width}x{height}@{x},{y} failed: {reason}")]
    CaptureFailed {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        reason: String,
    },

    // ── Queue errors ─────────────────────────────────────────────
    /// The inbound report queue is full; the report was dropped.
    #[error("report queue full")]
    QueueFull,

    /// A queue endpoint was closed while the pipeline still needed it.
    #[error("queue closed")]
    QueueClosed,

    // ── Event stream errors ──────────────────────────────────────
    /// The native event connection failed or was closed.
    #[error("display event stream error: {0}")]
    EventStream(String),
}

impl ScanError {
    /// Whether the error is recoverable by dropping the current
    /// rectangle and continuing the loop.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ScanError::NoCaptureBuffer { .. }
                | ScanError::CaptureFailed { .. }
                | ScanError::QueueFull
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(
            ScanError::NoCaptureBuffer {
                width: 5,
                height: 5
            }
            .is_transient()
        );
        assert!(ScanError::QueueFull.is_transient());
        assert!(!ScanError::InvalidConfig("x").is_transient());
        assert!(!ScanError::QueueClosed.is_transient());
    }

    #[test]
    fn display_messages() {
        let e = ScanError::CaptureFailed {
            x: 1,
            y: 2,
            width: 3,
            height: 4,
            reason: "shm".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("3x4"));
        assert!(msg.contains("shm"));
    }
}
