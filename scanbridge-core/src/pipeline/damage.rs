//! Damage event bridge.
//!
//! A dedicated thread drains the native display connection's event
//! stream and converts notifications into change reports. Damage
//! rectangles accumulate into a batch region until the source signals
//! the batch is complete (`more == false`); the batch is then
//! acknowledged and submitted as disjoint rectangles so the tracker
//! can dedup each piece independently.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, warn};

use crate::geom::Region;
use crate::pipeline::queue::OutboundQueue;
use crate::pipeline::snapshot::SnapshotStore;
use crate::pipeline::tracker::ChangeTracker;
use crate::pipeline::types::ReportKind;
use crate::source::{DamageEventStream, DisplayEvent, DisplaySource, SessionHooks};

/// Upper bound on one blocking event read, so liveness is re-checked
/// even when the display is idle.
const EVENT_POLL: Duration = Duration::from_millis(100);

pub(crate) fn spawn_damage_bridge<S: DisplaySource>(
    events: S::Events,
    tracker: Arc<ChangeTracker>,
    store: Arc<SnapshotStore<S>>,
    outbound: Arc<OutboundQueue>,
    hooks: Arc<dyn SessionHooks>,
    stop: Arc<AtomicBool>,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("scanbridge-damage".to_string())
        .spawn(move || bridge_loop(events, &tracker, &store, &outbound, &hooks, &stop))
}

fn bridge_loop<S: DisplaySource>(
    mut events: S::Events,
    tracker: &ChangeTracker,
    store: &SnapshotStore<S>,
    outbound: &OutboundQueue,
    hooks: &Arc<dyn SessionHooks>,
    stop: &AtomicBool,
) {
    let mut batch = Region::new();

    loop {
        if stop.load(Ordering::Acquire) || !hooks.is_alive() {
            break;
        }
        match events.next_event(EVENT_POLL) {
            Ok(None) => continue,
            Ok(Some(DisplayEvent::Damage { rect, more })) => {
                batch.union_rect(&rect);
                if more {
                    // Partial batch, further rectangles follow.
                    continue;
                }
                if let Err(e) = events.acknowledge() {
                    warn!(error = %e, "damage acknowledge failed");
                }
                for r in batch.rects() {
                    tracker.try_enqueue(ReportKind::Damage, *r);
                }
                batch.clear();
            }
            Ok(Some(DisplayEvent::Resize { width, height })) => {
                debug!(width, height, "surface reconfigured");
                store.resize(width, height);
                hooks.resized(width, height);
                batch.clear();
            }
            Ok(Some(DisplayEvent::Cursor(update))) => {
                outbound.push_cursor(update);
            }
            Ok(Some(DisplayEvent::Other(code))) => {
                debug!(code, "unexpected display event ignored");
            }
            Err(e) => {
                debug!(error = %e, "display event stream ended");
                break;
            }
        }
    }

    // Leave nothing queued on the native connection.
    events.drain();
}

// ── Tests ────────────────────────────────────────────────────────
