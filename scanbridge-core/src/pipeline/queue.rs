//! The two halves of the frame queue.
//!
//! Inbound: a bounded multi-producer channel of [`ChangeReport`]s with
//! a blocking timed pop, consumed only by the scan worker. Outbound: an
//! internally synchronized pair of drawable/cursor queues that the
//! external consumer polls without ever blocking, plus an optional wake
//! callback fired on push.

use std::collections::VecDeque;
use std::sync::mpsc::{self, RecvTimeoutError, TrySendError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::pipeline::types::{ChangeReport, CursorUpdate, Drawable};

/// Recover the guard from a poisoned mutex; the protected queues stay
/// structurally valid even if a holder panicked.
fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── Inbound: change reports ──────────────────────────────────────

/// Producer end of the inbound report queue. Cloned into the change
/// tracker (damage bridge + tile scanner path) and kept by the
/// pipeline for the shutdown sentinel.
pub(crate) type ReportSender = mpsc::SyncSender<ChangeReport>;

/// Outcome of a timed pop on the inbound queue.
#[derive(Debug)]
pub(crate) enum Pop {
    Report(ChangeReport),
    TimedOut,
    Closed,
}

/// Consumer end of the inbound report queue, owned by the scan worker.
pub(crate) struct ReportReceiver {
    rx: mpsc::Receiver<ChangeReport>,
}

impl ReportReceiver {
    /// Block for up to `timeout` waiting for the next report.
    pub(crate) fn pop_timeout(&self, timeout: Duration) -> Pop {
        match self.rx.recv_timeout(timeout) {
            Ok(report) => Pop::Report(report),
            Err(RecvTimeoutError::Timeout) => Pop::TimedOut,
            Err(RecvTimeoutError::Disconnected) => Pop::Closed,
        }
    }
}

/// Create the bounded inbound queue.
pub(crate) fn report_channel(depth: usize) -> (ReportSender, ReportReceiver) {
    let (tx, rx) = mpsc::sync_channel(depth);
    (tx, ReportReceiver { rx })
}

/// Push without blocking; `Err` means the queue is full or closed and
/// the caller rolls back whatever state it staged for this report.
pub(crate) fn try_push(tx: &ReportSender, report: ChangeReport) -> Result<(), ChangeReport> {
    match tx.try_send(report) {
        Ok(()) => Ok(()),
        Err(TrySendError::Full(r)) | Err(TrySendError::Disconnected(r)) => Err(r),
    }
}

// ── Outbound: drawables and cursor updates ───────────────────────

/// Callback invoked after a push so the consumer can schedule a poll.
pub type WakeCallback = Box<dyn Fn() + Send + Sync>;

/// The consumer-facing side of the frame queue.
///
/// Single producer (the scan worker, cursor pushes come through the
/// damage bridge), any number of polling consumers. All pops are
/// non-blocking.
#[derive(Default)]
pub struct OutboundQueue {
    drawables: Mutex<VecDeque<Drawable>>,
    cursors: Mutex<VecDeque<CursorUpdate>>,
    waker: Mutex<Option<Arc<dyn Fn() + Send + Sync>>>,
}

impl OutboundQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the consumer's wake-up callback.
    pub fn set_wake_callback(&self, waker: WakeCallback) {
        *lock(&self.waker) = Some(Arc::from(waker));
    }

    /// The waker mutex is released before the callback runs, so a
    /// callback may re-register itself (or run long) without blocking
    /// the pushing thread's lock.
    fn wake(&self) {
        let waker = lock(&self.waker).clone();
        if let Some(waker) = waker {
            waker();
        }
    }

    pub(crate) fn push_drawable(&self, drawable: Drawable) {
        lock(&self.drawables).push_back(drawable);
        self.wake();
    }

    pub(crate) fn push_cursor(&self, cursor: CursorUpdate) {
        lock(&self.cursors).push_back(cursor);
        self.wake();
    }

    /// Pop the oldest ready drawable, if any.
    pub fn try_pop_drawable(&self) -> Option<Drawable> {
        lock(&self.drawables).pop_front()
    }

    /// Pop the oldest pending cursor update, if any.
    pub fn try_pop_cursor(&self) -> Option<CursorUpdate> {
        lock(&self.cursors).pop_front()
    }

    /// Whether anything is queued on either side.
    pub fn has_pending(&self) -> bool {
        !lock(&self.drawables).is_empty() || !lock(&self.cursors).is_empty()
    }

    /// Drop everything still queued, returning the drawables so their
    /// buffers can be released rather than leaked.
    pub(crate) fn drain(&self) -> Vec<Drawable> {
        lock(&self.cursors).clear();
        lock(&self.drawables).drain(..).collect()
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Rect;
    use crate::pipeline::types::{CaptureBuffer, PixelFormat, ReportKind};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn drawable(v: u8) -> Drawable {
        let rect = Rect::new(0, 0, 1, 1);
        Drawable::new(CaptureBuffer::new(rect, PixelFormat::Rgba8, vec![v; 4]))
    }

    #[test]
    fn timed_pop_reports_and_timeouts() {
        let (tx, rx) = report_channel(4);
        assert!(matches!(
            rx.pop_timeout(Duration::from_millis(1)),
            Pop::TimedOut
        ));

        let report = ChangeReport::new(ReportKind::Damage, Rect::new(1, 2, 3, 4));
        try_push(&tx, report).unwrap();
        match rx.pop_timeout(Duration::from_millis(10)) {
            Pop::Report(r) => assert_eq!(r.rect, report.rect),
            other => panic!("unexpected pop result: {other:?}"),
        }

        drop(tx);
        assert!(matches!(
            rx.pop_timeout(Duration::from_millis(1)),
            Pop::Closed
        ));
    }

    #[test]
    fn try_push_returns_report_when_full() {
        let (tx, _rx) = report_channel(1);
        let r = ChangeReport::shutdown();
        try_push(&tx, r).unwrap();
        assert!(try_push(&tx, r).is_err());
    }

    #[test]
    fn outbound_fifo_and_has_pending() {
        let q = OutboundQueue::new();
        assert!(!q.has_pending());
        q.push_drawable(drawable(1));
        q.push_drawable(drawable(2));
        assert!(q.has_pending());
        assert_eq!(q.try_pop_drawable().unwrap().buffer().data()[0], 1);
        assert_eq!(q.try_pop_drawable().unwrap().buffer().data()[0], 2);
        assert!(q.try_pop_drawable().is_none());
        assert!(!q.has_pending());
    }

    #[test]
    fn wake_fires_on_push() {
        let q = OutboundQueue::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        q.set_wake_callback(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        q.push_drawable(drawable(0));
        q.push_cursor(CursorUpdate {
            x: 0,
            y: 0,
            hot_x: 0,
            hot_y: 0,
            width: 1,
            height: 1,
            data: vec![0; 4],
        });
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert!(q.try_pop_cursor().is_some());
    }

    #[test]
    fn waker_may_reregister_from_inside_the_callback() {
        let q = Arc::new(OutboundQueue::new());
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let queue = Arc::clone(&q);
        let first_hits = Arc::clone(&first);
        let second_hits = Arc::clone(&second);
        q.set_wake_callback(Box::new(move || {
            first_hits.fetch_add(1, Ordering::SeqCst);
            // Swapping the waker from inside the callback must not
            // deadlock against the push that triggered it.
            let counter = Arc::clone(&second_hits);
            queue.set_wake_callback(Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }));
        }));

        q.push_drawable(drawable(1));
        assert_eq!(first.load(Ordering::SeqCst), 1);

        q.push_drawable(drawable(2));
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }
}
