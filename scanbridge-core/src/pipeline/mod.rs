//! The change-detection and frame-streaming pipeline.
//!
//! [`Pipeline::start`] wires the damage bridge and scan worker threads
//! around the snapshot store, change tracker, and frame queue, and
//! hands back the pull-based consumer surface: non-blocking pops of
//! ready drawables and cursor updates, plus release routing for
//! buffers the consumer is done displaying.

pub mod queue;
pub mod snapshot;
pub mod tracker;
pub mod types;

pub(crate) mod damage;
pub(crate) mod scanner;
pub(crate) mod worker;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::error::ScanError;
use crate::source::{DisplaySource, SessionHooks};

use queue::{OutboundQueue, ReportSender, WakeCallback, report_channel};
use snapshot::SnapshotStore;
use tracker::ChangeTracker;
use types::{ChangeReport, CursorUpdate, Drawable, ReleaseHandle, SurfaceDescriptor};

/// A running capture pipeline.
///
/// Stops (and joins its threads) on [`stop`](Self::stop) or on drop.
pub struct Pipeline<S: DisplaySource> {
    store: Arc<SnapshotStore<S>>,
    tracker: Arc<ChangeTracker>,
    outbound: Arc<OutboundQueue>,
    report_tx: ReportSender,
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    bridge: Option<JoinHandle<()>>,
}

impl<S: DisplaySource> Pipeline<S> {
    /// Validate configuration, build the full-frame buffer and queues,
    /// subscribe for damage events, and start the bridge and worker
    /// threads. Any failure here is fatal: nothing starts half-way.
    pub fn start(
        source: Arc<S>,
        hooks: Arc<dyn SessionHooks>,
        config: PipelineConfig,
    ) -> Result<Self, ScanError> {
        config.validate()?;

        let store = Arc::new(SnapshotStore::new(Arc::clone(&source))?);
        let (report_tx, report_rx) = report_channel(config.report_queue_depth);
        let tracker = Arc::new(ChangeTracker::new(report_tx.clone()));
        let outbound = Arc::new(OutboundQueue::new());
        let stop = Arc::new(AtomicBool::new(false));

        let events = source.subscribe()?;
        let scanner = scanner::TileScanner::new(&config);

        let bridge = damage::spawn_damage_bridge::<S>(
            events,
            Arc::clone(&tracker),
            Arc::clone(&store),
            Arc::clone(&outbound),
            Arc::clone(&hooks),
            Arc::clone(&stop),
        )?;

        let worker = match worker::spawn_scan_worker(
            report_rx,
            scanner,
            Arc::clone(&store),
            Arc::clone(&tracker),
            Arc::clone(&outbound),
            Arc::clone(&hooks),
        ) {
            Ok(handle) => handle,
            Err(e) => {
                stop.store(true, Ordering::SeqCst);
                let _ = bridge.join();
                return Err(ScanError::Spawn(e));
            }
        };

        let desc = store.descriptor();
        info!(
            width = desc.width,
            height = desc.height,
            rows = config.scan_rows,
            tiles = config.tiles_per_row,
            "pipeline started"
        );

        Ok(Self {
            store,
            tracker,
            outbound,
            report_tx,
            stop,
            worker: Some(worker),
            bridge: Some(bridge),
        })
    }

    // ── Consumer surface (never blocks) ──────────────────────────

    /// Pop the oldest ready drawable, if any.
    pub fn try_pop_drawable(&self) -> Option<Drawable> {
        self.outbound.try_pop_drawable()
    }

    /// Pop the oldest pending cursor update, if any.
    pub fn try_pop_cursor(&self) -> Option<CursorUpdate> {
        self.outbound.try_pop_cursor()
    }

    /// Whether anything is ready to display.
    pub fn has_pending(&self) -> bool {
        self.outbound.has_pending()
    }

    /// Register the consumer's wake-up callback, fired whenever a new
    /// drawable or cursor update is queued.
    pub fn set_wake_callback(&self, waker: WakeCallback) {
        self.outbound.set_wake_callback(waker);
    }

    /// Release a consumed item's backing storage. Safe to call from
    /// the consumer's own thread.
    pub fn release(&self, handle: ReleaseHandle) {
        self.store.release_handle(handle);
    }

    /// Current surface dimensions and format.
    pub fn descriptor(&self) -> SurfaceDescriptor {
        self.store.descriptor()
    }

    /// Copy of the full-frame baseline, for building the consumer's
    /// primary display surface.
    pub fn primary_surface(&self) -> (SurfaceDescriptor, Vec<u8>) {
        self.store.full_frame()
    }

    /// Direct access to the change tracker (for producers outside the
    /// built-in bridge, e.g. an input-injection side channel marking
    /// regions dirty).
    pub fn tracker(&self) -> &Arc<ChangeTracker> {
        &self.tracker
    }

    /// Number of capture buffers currently handed out (queued or held
    /// by the consumer).
    pub fn outstanding_buffers(&self) -> usize {
        self.store.outstanding()
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Stop both threads and release everything still queued.
    /// Idempotent; also runs on drop.
    pub fn stop(&mut self) {
        if self.worker.is_none() && self.bridge.is_none() {
            return;
        }
        self.stop.store(true, Ordering::SeqCst);

        // The blocking send guarantees the sentinel lands even when
        // the queue is momentarily full; the worker is draining it.
        if self.report_tx.send(ChangeReport::shutdown()).is_err() {
            warn!("scan worker already gone at shutdown");
        }
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        if let Some(bridge) = self.bridge.take() {
            let _ = bridge.join();
        }

        // Nothing pulls from the outbound queue any more; route queued
        // drawables back through release so no buffer leaks.
        for drawable in self.outbound.drain() {
            self.store.release_handle(drawable.into_release());
        }
        info!("pipeline stopped");
    }
}

impl<S: DisplaySource> Drop for Pipeline<S> {
    fn drop(&mut self) {
        self.stop();
    }
}
