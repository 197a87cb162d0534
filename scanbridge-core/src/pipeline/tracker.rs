//! Deduplication of outstanding change reports.
//!
//! The pending region holds every rectangle that is queued but not yet
//! processed. A flurry of overlapping damage events would otherwise
//! multiply snapshot/copy work superlinearly; the region algebra bounds
//! queued work to the true change footprint.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{trace, warn};

use crate::geom::{Rect, Region};
use crate::pipeline::queue::{ReportSender, try_push};
use crate::pipeline::types::{ChangeReport, ReportKind};

/// Thread-safe pending-region set feeding the inbound report queue.
///
/// Shared by every producer (damage bridge, tile scanner) and the scan
/// worker. Every critical section is a short region operation, never
/// held across I/O.
pub struct ChangeTracker {
    pending: Mutex<Region>,
    tx: ReportSender,
}

impl ChangeTracker {
    pub(crate) fn new(tx: ReportSender) -> Self {
        Self {
            pending: Mutex::new(Region::new()),
            tx,
        }
    }

    fn pending(&self) -> MutexGuard<'_, Region> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue `rect` for processing unless it is already fully covered
    /// by outstanding work. Returns whether a report was enqueued.
    pub fn try_enqueue(&self, kind: ReportKind, rect: Rect) -> bool {
        if rect.is_empty() {
            return false;
        }
        let mut pending = self.pending();
        if pending.covers(&rect) {
            trace!(?rect, "change already pending, discarded");
            return false;
        }
        // Push before the union so a full queue leaves the pending
        // region exactly mirroring what is actually queued.
        match try_push(&self.tx, ChangeReport::new(kind, rect)) {
            Ok(()) => {
                pending.union_rect(&rect);
                true
            }
            Err(_) => {
                warn!(?rect, "report queue full, change dropped");
                false
            }
        }
    }

    /// Subtract `rect` from the pending region. Called by the scan
    /// worker immediately after dequeuing a report, before processing,
    /// so later overlapping reports see accurate pending state.
    pub fn remove(&self, rect: &Rect) {
        self.pending().subtract_rect(rect);
    }

    #[cfg(test)]
    pub(crate) fn pending_covers(&self, rect: &Rect) -> bool {
        self.pending().covers(rect)
    }

    #[cfg(test)]
    pub(crate) fn pending_is_empty(&self) -> bool {
        self.pending().is_empty()
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::queue::{Pop, report_channel};
    use std::time::Duration;

    fn tracker(depth: usize) -> (ChangeTracker, crate::pipeline::queue::ReportReceiver) {
        let (tx, rx) = report_channel(depth);
        (ChangeTracker::new(tx), rx)
    }

    #[test]
    fn duplicate_rect_is_discarded() {
        let (t, rx) = tracker(8);
        let r = Rect::new(10, 10, 5, 5);
        assert!(t.try_enqueue(ReportKind::Damage, r));
        assert!(t.pending_covers(&r));
        // Exact duplicate and fully-contained sub-rect are both subsumed.
        assert!(!t.try_enqueue(ReportKind::Damage, r));
        assert!(!t.try_enqueue(ReportKind::TileScan, Rect::new(11, 11, 2, 2)));

        // Only one report ever reached the queue.
        assert!(matches!(
            rx.pop_timeout(Duration::from_millis(10)),
            Pop::Report(_)
        ));
        assert!(matches!(
            rx.pop_timeout(Duration::from_millis(1)),
            Pop::TimedOut
        ));
    }

    #[test]
    fn partial_overlap_is_enqueued() {
        let (t, rx) = tracker(8);
        assert!(t.try_enqueue(ReportKind::Damage, Rect::new(0, 0, 10, 10)));
        assert!(t.try_enqueue(ReportKind::Damage, Rect::new(5, 5, 10, 10)));
        let mut count = 0;
        while let Pop::Report(_) = rx.pop_timeout(Duration::from_millis(1)) {
            count += 1;
        }
        assert_eq!(count, 2);
    }

    #[test]
    fn remove_restores_pre_enqueue_state() {
        let (t, _rx) = tracker(8);
        let r = Rect::new(3, 4, 5, 6);
        assert!(t.try_enqueue(ReportKind::Damage, r));
        t.remove(&r);
        assert!(t.pending_is_empty());
        // And the rect can be queued again.
        assert!(t.try_enqueue(ReportKind::Damage, r));
    }

    #[test]
    fn full_queue_leaves_pending_region_consistent() {
        let (t, _rx) = tracker(1);
        assert!(t.try_enqueue(ReportKind::Damage, Rect::new(0, 0, 1, 1)));
        let r = Rect::new(50, 50, 5, 5);
        assert!(!t.try_enqueue(ReportKind::Damage, r));
        // The dropped rect is not marked pending, so it can retry later.
        assert!(!t.pending_covers(&r));
    }

    #[test]
    fn empty_rect_is_ignored() {
        let (t, rx) = tracker(8);
        assert!(!t.try_enqueue(ReportKind::Damage, Rect::new(5, 5, 0, 3)));
        assert!(matches!(
            rx.pop_timeout(Duration::from_millis(1)),
            Pop::TimedOut
        ));
    }
}
