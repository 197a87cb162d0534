//! # scanbridge-core
//!
//! Change-detection and frame-streaming engine for bridging a live
//! framebuffer to a remote display protocol.
//!
//! This crate contains:
//! - **Geometry**: `Rect` and `Region` — disjoint-rectangle algebra for
//!   damage accounting
//! - **Source seam**: `DisplaySource` / `DamageEventStream` / `SessionHooks`
//!   traits isolating the native display connection
//! - **Pipeline**: the damage bridge and scan worker threads, the
//!   full-frame snapshot store, change tracker, and the pull-based
//!   outbound queue of drawables and cursor updates
//! - **Synthetic source**: an in-memory `DisplaySource` for tests and
//!   demo runs
//! - **Error**: `ScanError` — typed, `thiserror`-based error hierarchy
//!
//! The consumer model is pull-based: the pipeline fires a wake callback
//! when work is ready, and the display side pops drawables at its own
//! pace, returning each buffer through [`Pipeline::release`] when done.

pub mod config;
pub mod error;
pub mod geom;
pub mod pipeline;
pub mod source;
pub mod synthetic;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use config::PipelineConfig;
pub use error::ScanError;
pub use geom::{Rect, Region};
pub use pipeline::Pipeline;
pub use pipeline::queue::{OutboundQueue, WakeCallback};
pub use pipeline::tracker::ChangeTracker;
pub use pipeline::types::{
    CaptureBuffer, ChangeReport, CursorUpdate, Drawable, PixelFormat, ReleaseHandle, ReportKind,
    SurfaceDescriptor,
};
pub use source::{DamageEventStream, DisplayEvent, DisplaySource, SessionHooks};
pub use synthetic::SyntheticSource;
