//! Capture buffers and the persistent full-frame snapshot.
//!
//! The full-frame buffer is the diff baseline for the tile scanner and
//! the source for building the consumer's primary display surface. It
//! lives behind one mutex together with the surface descriptor, held
//! only for the duration of a blit or a read — never across a native
//! display round-trip.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, error};

use crate::error::ScanError;
use crate::geom::Rect;
use crate::pipeline::types::{CaptureBuffer, ReleaseHandle, SurfaceDescriptor};
use crate::source::DisplaySource;

/// How many released capture allocations are kept for reuse.
const POOL_LIMIT: usize = 8;

struct FullFrame {
    desc: SurfaceDescriptor,
    data: Vec<u8>,
}

/// Allocates capture buffers, owns the full-frame buffer, and routes
/// releases back to the allocation pool.
pub struct SnapshotStore<S: DisplaySource> {
    source: Arc<S>,
    surface: Mutex<FullFrame>,
    pool: Mutex<Vec<Vec<u8>>>,
    outstanding: AtomicUsize,
}

impl<S: DisplaySource> SnapshotStore<S> {
    /// Allocate the full-frame buffer for the source's current surface.
    /// Fatal when the surface is unusable; the pipeline does not start.
    pub(crate) fn new(source: Arc<S>) -> Result<Self, ScanError> {
        let desc = source.descriptor();
        if desc.width == 0 || desc.height == 0 {
            return Err(ScanError::UnusableSurface {
                width: desc.width,
                height: desc.height,
            });
        }
        let data = vec![0; desc.byte_len()];
        Ok(Self {
            source,
            surface: Mutex::new(FullFrame { desc, data }),
            pool: Mutex::new(Vec::new()),
            outstanding: AtomicUsize::new(0),
        })
    }

    fn surface(&self) -> MutexGuard<'_, FullFrame> {
        self.surface.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current surface dimensions and format.
    pub fn descriptor(&self) -> SurfaceDescriptor {
        self.surface().desc
    }

    /// Capture the pixels of `rect` from the display source into a
    /// (possibly pooled) buffer. Failure is transient: the caller logs,
    /// discards the rectangle, and continues.
    pub(crate) fn capture(&self, rect: Rect) -> Result<CaptureBuffer, ScanError> {
        let format = self.descriptor().format;
        let len = rect.width as usize * rect.height as usize * format.bytes_per_pixel();
        if len == 0 {
            return Err(ScanError::NoCaptureBuffer {
                width: rect.width,
                height: rect.height,
            });
        }

        let mut data = {
            let mut pool = self.pool.lock().unwrap_or_else(PoisonError::into_inner);
            pool.pop().unwrap_or_default()
        };
        data.clear();
        data.resize(len, 0);

        if let Err(e) = self.source.capture(rect, &mut data) {
            self.pool_return(data);
            return Err(e);
        }

        self.outstanding.fetch_add(1, Ordering::SeqCst);
        Ok(CaptureBuffer::new(rect, format, data))
    }

    /// Blit `buf` into the full-frame buffer at `(x, y)`, clipped to
    /// current surface bounds. Returns the rectangle that actually
    /// landed, or `None` when a capture raced a shrink and nothing of
    /// it is on the surface any more.
    pub(crate) fn copy_into_fullframe(
        &self,
        buf: &CaptureBuffer,
        x: u32,
        y: u32,
    ) -> Option<Rect> {
        let mut frame = self.surface();
        let target = Rect::new(x, y, buf.rect().width, buf.rect().height);
        let Some(clip) = target.clipped_to(frame.desc.width, frame.desc.height) else {
            debug!(?target, "stale capture outside surface bounds, discarded");
            return None;
        };

        let bpp = frame.desc.format.bytes_per_pixel();
        let dst_stride = frame.desc.stride();
        let src_stride = buf.stride();
        let run = clip.width as usize * bpp;

        for row in 0..clip.height {
            let src_off = ((clip.y - y + row) as usize) * src_stride
                + ((clip.x - x) as usize) * bpp;
            let dst_off = ((clip.y + row) as usize) * dst_stride + (clip.x as usize) * bpp;
            frame.data[dst_off..dst_off + run]
                .copy_from_slice(&buf.data()[src_off..src_off + run]);
        }
        Some(clip)
    }

    /// Run `f` over one row of the full-frame buffer, or `None` when
    /// the row is outside current bounds. The surface mutex is held
    /// only for the duration of `f`.
    pub(crate) fn with_row<R>(&self, y: u32, f: impl FnOnce(&[u8]) -> R) -> Option<R> {
        let frame = self.surface();
        if y >= frame.desc.height {
            return None;
        }
        let stride = frame.desc.stride();
        let start = y as usize * stride;
        Some(f(&frame.data[start..start + stride]))
    }

    /// Copy out the pixels of `rect` from the full frame, tightly
    /// packed. `None` when `rect` exceeds current bounds.
    pub fn read_rect(&self, rect: Rect) -> Option<Vec<u8>> {
        let frame = self.surface();
        if !frame.desc.bounds().contains(&rect) || rect.is_empty() {
            return None;
        }
        let bpp = frame.desc.format.bytes_per_pixel();
        let stride = frame.desc.stride();
        let run = rect.width as usize * bpp;
        let mut out = Vec::with_capacity(run * rect.height as usize);
        for row in 0..rect.height {
            let off = (rect.y + row) as usize * stride + rect.x as usize * bpp;
            out.extend_from_slice(&frame.data[off..off + run]);
        }
        Some(out)
    }

    /// Copy out the whole full-frame buffer, for building the primary
    /// display surface.
    pub fn full_frame(&self) -> (SurfaceDescriptor, Vec<u8>) {
        let frame = self.surface();
        (frame.desc, frame.data.clone())
    }

    /// Destroy and recreate the full-frame buffer for new dimensions.
    pub(crate) fn resize(&self, width: u32, height: u32) {
        let mut frame = self.surface();
        frame.desc.width = width;
        frame.desc.height = height;
        frame.data = vec![0; frame.desc.byte_len()];
        debug!(width, height, "full-frame buffer rebuilt");
    }

    /// Free a capture buffer. Safe from any thread; the underlying
    /// allocation returns to the pool.
    pub fn release(&self, buffer: CaptureBuffer) {
        let (_, data) = buffer.into_parts();
        let prev = self.outstanding.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
            n.checked_sub(1)
        });
        if prev.is_err() {
            // More releases than captures: a buffer was routed here twice.
            error!("capture buffer released with none outstanding");
        }
        self.pool_return(data);
    }

    /// Route a consumer release handle to the right free path.
    pub fn release_handle(&self, handle: ReleaseHandle) {
        match handle {
            ReleaseHandle::Capture(buffer) => self.release(buffer),
            ReleaseHandle::Heap(block) => drop(block),
        }
    }

    /// Number of capture buffers currently handed out.
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    fn pool_return(&self, data: Vec<u8>) {
        let mut pool = self.pool.lock().unwrap_or_else(PoisonError::into_inner);
        if pool.len() < POOL_LIMIT {
            pool.push(data);
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::PixelFormat;
    use crate::synthetic::SyntheticSource;

    fn store(w: u32, h: u32) -> SnapshotStore<SyntheticSource> {
        let source = Arc::new(SyntheticSource::new(w, h, PixelFormat::Rgba8));
        SnapshotStore::new(source).unwrap()
    }

    #[test]
    fn zero_surface_is_fatal() {
        let source = Arc::new(SyntheticSource::new(0, 10, PixelFormat::Rgba8));
        assert!(matches!(
            SnapshotStore::new(source),
            Err(ScanError::UnusableSurface { .. })
        ));
    }

    #[test]
    fn blit_lands_exact_pattern() {
        let store = store(64, 64);
        let rect = Rect::new(10, 10, 5, 5);
        let buf = CaptureBuffer::new(rect, PixelFormat::Rgba8, vec![0xAB; 5 * 5 * 4]);
        assert_eq!(store.copy_into_fullframe(&buf, 10, 10), Some(rect));
        assert_eq!(store.read_rect(rect).unwrap(), vec![0xAB; 5 * 5 * 4]);

        // Adjacent pixels stay untouched.
        let border = store.read_rect(Rect::new(15, 10, 1, 5)).unwrap();
        assert_eq!(border, vec![0; 5 * 4]);
    }

    #[test]
    fn blit_outside_bounds_is_noop() {
        let store = store(32, 32);
        let rect = Rect::new(0, 0, 4, 4);
        let buf = CaptureBuffer::new(rect, PixelFormat::Rgba8, vec![0xFF; 4 * 4 * 4]);
        assert_eq!(store.copy_into_fullframe(&buf, 100, 100), None);
        let (_, data) = store.full_frame();
        assert!(data.iter().all(|&b| b == 0));
    }

    #[test]
    fn blit_clips_across_edge() {
        let store = store(32, 32);
        let rect = Rect::new(30, 30, 4, 4);
        let buf = CaptureBuffer::new(rect, PixelFormat::Rgba8, vec![0x11; 4 * 4 * 4]);
        // The returned clip reports exactly what landed.
        assert_eq!(
            store.copy_into_fullframe(&buf, 30, 30),
            Some(Rect::new(30, 30, 2, 2))
        );
        // Only the in-bounds 2x2 corner was written.
        assert_eq!(
            store.read_rect(Rect::new(30, 30, 2, 2)).unwrap(),
            vec![0x11; 2 * 2 * 4]
        );
    }

    #[test]
    fn capture_release_recycles_allocation() {
        let store = store(16, 16);
        let buf = store.capture(Rect::new(0, 0, 8, 8)).unwrap();
        assert_eq!(store.outstanding(), 1);
        store.release(buf);
        assert_eq!(store.outstanding(), 0);
        // Pool hands the allocation back out.
        let again = store.capture(Rect::new(0, 0, 8, 8)).unwrap();
        store.release_handle(ReleaseHandle::Capture(again));
        assert_eq!(store.outstanding(), 0);
    }

    #[test]
    fn resize_rebuilds_zeroed() {
        let store = store(16, 16);
        let rect = Rect::new(0, 0, 2, 2);
        let buf = CaptureBuffer::new(rect, PixelFormat::Rgba8, vec![0x42; 2 * 2 * 4]);
        assert_eq!(store.copy_into_fullframe(&buf, 0, 0), Some(rect));
        store.resize(8, 8);
        let (desc, data) = store.full_frame();
        assert_eq!((desc.width, desc.height), (8, 8));
        assert!(data.iter().all(|&b| b == 0));
    }
}
