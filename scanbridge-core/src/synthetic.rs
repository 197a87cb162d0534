//! An in-memory display source.
//!
//! Backs the integration tests and the daemon's demo mode: a plain
//! pixel buffer stands in for the framebuffer, and tests inject
//! damage/resize/cursor events exactly where a native connection would
//! produce them. Capture failures can be switched on to exercise the
//! transient-error path.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::error::ScanError;
use crate::geom::Rect;
use crate::pipeline::types::{PixelFormat, SurfaceDescriptor};
use crate::source::{DamageEventStream, DisplayEvent, DisplaySource};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Pixels {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

struct EventBox {
    queue: Mutex<VecDeque<DisplayEvent>>,
    available: Condvar,
    closed: AtomicBool,
}

/// A display source backed by a mutable in-memory pixel buffer.
pub struct SyntheticSource {
    format: PixelFormat,
    pixels: Mutex<Pixels>,
    events: Arc<EventBox>,
    fail_captures: AtomicBool,
    acks: Arc<AtomicUsize>,
}

impl SyntheticSource {
    /// Create a zero-filled surface of the given size.
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        let data = vec![0; width as usize * height as usize * format.bytes_per_pixel()];
        Self {
            format,
            pixels: Mutex::new(Pixels {
                width,
                height,
                data,
            }),
            events: Arc::new(EventBox {
                queue: Mutex::new(VecDeque::new()),
                available: Condvar::new(),
                closed: AtomicBool::new(false),
            }),
            fail_captures: AtomicBool::new(false),
            acks: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Fill every channel of every pixel in `rect` with `value`,
    /// clipped to the surface. No event is raised; pair with
    /// [`damage`](Self::damage) to mimic a real display.
    pub fn paint(&self, rect: Rect, value: u8) {
        let mut px = lock(&self.pixels);
        let Some(clip) = rect.clipped_to(px.width, px.height) else {
            return;
        };
        let bpp = self.format.bytes_per_pixel();
        let stride = px.width as usize * bpp;
        for row in 0..clip.height {
            let off = (clip.y + row) as usize * stride + clip.x as usize * bpp;
            let run = clip.width as usize * bpp;
            px.data[off..off + run].fill(value);
        }
    }

    /// Queue a complete single-rectangle damage notification.
    pub fn damage(&self, rect: Rect) {
        self.inject(DisplayEvent::Damage { rect, more: false });
    }

    /// Queue an arbitrary event (partial damage batches, resizes,
    /// cursor updates, unknown event codes).
    pub fn inject(&self, event: DisplayEvent) {
        if let DisplayEvent::Resize { width, height } = event {
            let mut px = lock(&self.pixels);
            px.width = width;
            px.height = height;
            px.data =
                vec![0; width as usize * height as usize * self.format.bytes_per_pixel()];
        }
        lock(&self.events.queue).push_back(event);
        self.events.available.notify_all();
    }

    /// Close the event stream; blocked readers return an error.
    pub fn close_events(&self) {
        self.events.closed.store(true, Ordering::SeqCst);
        self.events.available.notify_all();
    }

    /// Make every subsequent capture fail until cleared.
    pub fn set_capture_failure(&self, fail: bool) {
        self.fail_captures.store(fail, Ordering::SeqCst);
    }

    /// How many damage batches have been acknowledged.
    pub fn ack_count(&self) -> usize {
        self.acks.load(Ordering::SeqCst)
    }
}

impl DisplaySource for SyntheticSource {
    type Events = SyntheticEvents;

    fn descriptor(&self) -> SurfaceDescriptor {
        let px = lock(&self.pixels);
        SurfaceDescriptor {
            width: px.width,
            height: px.height,
            format: self.format,
        }
    }

    fn capture(&self, rect: Rect, out: &mut [u8]) -> Result<(), ScanError> {
        if self.fail_captures.load(Ordering::SeqCst) {
            return Err(ScanError::CaptureFailed {
                x: rect.x,
                y: rect.y,
                width: rect.width,
                height: rect.height,
                reason: "injected failure".into(),
            });
        }
        let px = lock(&self.pixels);
        if !Rect::new(0, 0, px.width, px.height).contains(&rect) {
            return Err(ScanError::CaptureFailed {
                x: rect.x,
                y: rect.y,
                width: rect.width,
                height: rect.height,
                reason: "outside surface bounds".into(),
            });
        }
        let bpp = self.format.bytes_per_pixel();
        let stride = px.width as usize * bpp;
        let run = rect.width as usize * bpp;
        for row in 0..rect.height {
            let src = (rect.y + row) as usize * stride + rect.x as usize * bpp;
            let dst = row as usize * run;
            out[dst..dst + run].copy_from_slice(&px.data[src..src + run]);
        }
        Ok(())
    }

    fn subscribe(&self) -> Result<Self::Events, ScanError> {
        Ok(SyntheticEvents {
            events: Arc::clone(&self.events),
            acks: Arc::clone(&self.acks),
        })
    }
}

/// Event stream handed to the damage bridge.
pub struct SyntheticEvents {
    events: Arc<EventBox>,
    acks: Arc<AtomicUsize>,
}

impl DamageEventStream for SyntheticEvents {
    fn next_event(&mut self, timeout: Duration) -> Result<Option<DisplayEvent>, ScanError> {
        let mut queue = lock(&self.events.queue);
        if queue.is_empty() {
            if self.events.closed.load(Ordering::SeqCst) {
                return Err(ScanError::EventStream("stream closed".into()));
            }
            let (guard, _timeout) = self
                .events
                .available
                .wait_timeout(queue, timeout)
                .unwrap_or_else(PoisonError::into_inner);
            queue = guard;
        }
        if queue.is_empty() && self.events.closed.load(Ordering::SeqCst) {
            return Err(ScanError::EventStream("stream closed".into()));
        }
        Ok(queue.pop_front())
    }

    fn acknowledge(&mut self) -> Result<(), ScanError> {
        self.acks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn drain(&mut self) {
        lock(&self.events.queue).clear();
    }
}
