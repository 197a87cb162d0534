//! The scan worker thread.
//!
//! One thread owns all pipeline sequencing: it pops change reports (or
//! times out and runs a periodic scan pass), captures a snapshot of the
//! reported rectangle, integrates it into the full-frame baseline, and
//! publishes a drawable for the pull-based consumer. No other thread
//! touches the capture/integrate/publish path.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, trace, warn};

use crate::pipeline::queue::{OutboundQueue, Pop, ReportReceiver};
use crate::pipeline::scanner::TileScanner;
use crate::pipeline::snapshot::SnapshotStore;
use crate::pipeline::tracker::ChangeTracker;
use crate::pipeline::types::{ChangeReport, Drawable, ReportKind};
use crate::source::{DisplaySource, SessionHooks};

pub(crate) fn spawn_scan_worker<S: DisplaySource>(
    rx: ReportReceiver,
    scanner: TileScanner,
    store: Arc<SnapshotStore<S>>,
    tracker: Arc<ChangeTracker>,
    outbound: Arc<OutboundQueue>,
    hooks: Arc<dyn SessionHooks>,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("scanbridge-worker".to_string())
        .spawn(move || worker_loop(rx, scanner, &store, &tracker, &outbound, &hooks))
}

fn worker_loop<S: DisplaySource>(
    rx: ReportReceiver,
    mut scanner: TileScanner,
    store: &SnapshotStore<S>,
    tracker: &ChangeTracker,
    outbound: &OutboundQueue,
    hooks: &Arc<dyn SessionHooks>,
) {
    loop {
        match rx.pop_timeout(scanner.pop_interval()) {
            Pop::Report(report) => {
                if report.kind == ReportKind::Shutdown {
                    debug!("scan worker shutting down");
                    break;
                }
                scanner.note_processed();
                process_report(report, store, tracker, outbound);
            }
            Pop::TimedOut => {
                scanner.note_idle();
                if !hooks.is_alive() {
                    break;
                }
                scanner.scan_pass(store, tracker);
            }
            Pop::Closed => {
                debug!("report queue closed, scan worker exiting");
                break;
            }
        }
    }
}

fn process_report<S: DisplaySource>(
    report: ChangeReport,
    store: &SnapshotStore<S>,
    tracker: &ChangeTracker,
    outbound: &OutboundQueue,
) {
    // Subtract before processing so overlapping reports arriving from
    // now on are deduplicated against accurate pending state.
    tracker.remove(&report.rect);

    let buffer = match store.capture(report.rect) {
        Ok(buffer) => buffer,
        Err(e) => {
            warn!(rect = ?report.rect, error = %e, "capture failed, change dropped");
            return;
        }
    };

    // A capture that raced a shrink is discarded, whether fully or
    // partially clipped: the consumer must never receive a rectangle
    // extending past the current surface, and the in-bounds part is
    // already integrated for the rebuilt primary surface.
    match store.copy_into_fullframe(&buffer, report.rect.x, report.rect.y) {
        Some(applied) if applied == report.rect => {
            trace!(rect = ?report.rect, kind = ?report.kind, "drawable published");
            outbound.push_drawable(Drawable::new(buffer));
        }
        Some(applied) => {
            debug!(rect = ?report.rect, ?applied, "stale capture clipped, discarded");
            store.release(buffer);
        }
        None => store.release(buffer),
    }
}

// ── Tests ────────────────────────────────────────────────────────
