//! Capability traits at the pipeline's external seams.
//!
//! The native display server and the session owner plug in behind these
//! traits; the pipeline depends only on the abstractions. A production
//! adapter wraps the real display connection, and
//! [`crate::synthetic::SyntheticSource`] provides an in-memory one for
//! tests and the daemon.

use std::time::Duration;

use crate::error::ScanError;
use crate::geom::Rect;
use crate::pipeline::types::{CursorUpdate, SurfaceDescriptor};

// ── DisplayEvent ─────────────────────────────────────────────────

/// A notification drained from the native display connection.
#[derive(Debug, Clone)]
pub enum DisplayEvent {
    /// A rectangular area of the tracked surface changed. When `more`
    /// is set the notification is a partial batch and further damage
    /// rectangles follow before the batch is complete.
    Damage { rect: Rect, more: bool },
    /// The tracked surface was reconfigured to a new size.
    Resize { width: u32, height: u32 },
    /// The pointer image changed.
    Cursor(CursorUpdate),
    /// Any other native event; carries the native event code for
    /// logging.
    Other(u32),
}

// ── DisplaySource ────────────────────────────────────────────────

/// The capture side of a native display connection.
///
/// `capture` is expected to be a fast local memory operation (the
/// shared-memory read path); it must fill `out` with tightly packed
/// rows of `rect.width` pixels.
pub trait DisplaySource: Send + Sync + 'static {
    /// Event-stream type returned by [`subscribe`](Self::subscribe).
    type Events: DamageEventStream;

    /// Current surface dimensions and pixel format.
    fn descriptor(&self) -> SurfaceDescriptor;

    /// Copy the pixels of `rect` into `out`.
    ///
    /// `out.len()` is exactly `rect.width * rect.height * bpp`.
    fn capture(&self, rect: Rect, out: &mut [u8]) -> Result<(), ScanError>;

    /// Subscribe for damage/configure notifications. Fatal to the
    /// pipeline when it fails at startup.
    fn subscribe(&self) -> Result<Self::Events, ScanError>;
}

// ── DamageEventStream ────────────────────────────────────────────

/// The event side of a native display connection, owned by the damage
/// bridge thread.
pub trait DamageEventStream: Send + 'static {
    /// Block for up to `timeout` waiting for the next event.
    ///
    /// `Ok(None)` means the timeout elapsed with nothing to read; the
    /// bridge uses it to re-check session liveness. An error means the
    /// connection is gone and the bridge exits.
    fn next_event(&mut self, timeout: Duration) -> Result<Option<DisplayEvent>, ScanError>;

    /// Acknowledge the damage reported so far (the native "subtract"
    /// call), re-arming the notification source.
    fn acknowledge(&mut self) -> Result<(), ScanError>;

    /// Consume any queued native events without acting on them, so no
    /// descriptors leak when the bridge exits.
    fn drain(&mut self) {}
}

// ── SessionHooks ─────────────────────────────────────────────────

/// Upcalls into the session owner.
pub trait SessionHooks: Send + Sync + 'static {
    /// Polled by the worker and bridge threads to know when to exit.
    fn is_alive(&self) -> bool;

    /// The tracked surface was resized; the owner tears down and
    /// rebuilds its primary display surface.
    fn resized(&self, width: u32, height: u32);
}
