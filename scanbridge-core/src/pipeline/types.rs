//! Shared types for the capture/streaming pipeline.
//!
//! These are the internal units handed between pipeline stages and to
//! the pull-based consumer; the wire representation a protocol exporter
//! builds from them is out of scope here.

use crate::geom::Rect;

// ── PixelFormat ──────────────────────────────────────────────────

/// Pixel layout of captured frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 4 bytes per pixel: Blue, Green, Red, Alpha.
    Bgra8,
    /// 4 bytes per pixel: Red, Green, Blue, Alpha.
    Rgba8,
}

impl PixelFormat {
    /// Bytes consumed by a single pixel in this format.
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Bgra8 | PixelFormat::Rgba8 => 4,
        }
    }
}

// ── SurfaceDescriptor ────────────────────────────────────────────

/// Dimensions and layout of the tracked surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceDescriptor {
    /// Surface width in pixels.
    pub width: u32,
    /// Surface height in pixels.
    pub height: u32,
    /// Pixel layout.
    pub format: PixelFormat,
}

impl SurfaceDescriptor {
    /// Row pitch of a tightly packed buffer for this surface.
    pub const fn stride(&self) -> usize {
        self.width as usize * self.format.bytes_per_pixel()
    }

    /// Total byte size of a full-frame buffer.
    pub const fn byte_len(&self) -> usize {
        self.stride() * self.height as usize
    }

    /// The whole surface as a rectangle.
    pub const fn bounds(&self) -> Rect {
        Rect::new(0, 0, self.width, self.height)
    }
}

// ── CaptureBuffer ────────────────────────────────────────────────

/// A transient buffer holding freshly captured pixels for one
/// rectangle, tightly packed (`rect.width * bpp` bytes per row).
///
/// Ownership transfers by handoff along the pipeline: snapshot store →
/// scan worker → outbound queue → consumer → release back to the
/// store. No two threads read one buffer concurrently by construction.
#[derive(Debug)]
pub struct CaptureBuffer {
    rect: Rect,
    format: PixelFormat,
    data: Vec<u8>,
}

impl CaptureBuffer {
    pub(crate) fn new(rect: Rect, format: PixelFormat, data: Vec<u8>) -> Self {
        debug_assert_eq!(
            data.len(),
            rect.width as usize * rect.height as usize * format.bytes_per_pixel()
        );
        Self { rect, format, data }
    }

    /// Target rectangle on the surface.
    pub const fn rect(&self) -> Rect {
        self.rect
    }

    /// Pixel layout.
    pub const fn format(&self) -> PixelFormat {
        self.format
    }

    /// Row pitch in bytes.
    pub const fn stride(&self) -> usize {
        self.rect.width as usize * self.format.bytes_per_pixel()
    }

    /// Raw pixel bytes, `rect.height` rows of `stride()` bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// One row of pixels.
    pub fn row(&self, i: u32) -> &[u8] {
        let stride = self.stride();
        let start = i as usize * stride;
        &self.data[start..start + stride]
    }

    pub(crate) fn into_parts(self) -> (Rect, Vec<u8>) {
        (self.rect, self.data)
    }
}

// ── ChangeReport ─────────────────────────────────────────────────

/// How a change report entered the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    /// A native damage notification.
    Damage,
    /// Found by the periodic tile scanner.
    TileScan,
    /// Sentinel that stops the scan worker.
    Shutdown,
}

/// One unit of pending work for the scan worker.
#[derive(Debug, Clone, Copy)]
pub struct ChangeReport {
    pub kind: ReportKind,
    pub rect: Rect,
}

impl ChangeReport {
    pub const fn new(kind: ReportKind, rect: Rect) -> Self {
        Self { kind, rect }
    }

    pub const fn shutdown() -> Self {
        Self {
            kind: ReportKind::Shutdown,
            rect: Rect::new(0, 0, 0, 0),
        }
    }
}

// ── Drawable ─────────────────────────────────────────────────────

/// A ready-to-display update: one capture buffer and its target
/// rectangle. Queued for the external consumer, which releases it via
/// [`ReleaseHandle`] when done displaying — possibly from a different
/// thread than the one that built it.
#[derive(Debug)]
pub struct Drawable {
    buffer: CaptureBuffer,
}

impl Drawable {
    pub(crate) fn new(buffer: CaptureBuffer) -> Self {
        Self { buffer }
    }

    /// Target rectangle on the surface.
    pub fn rect(&self) -> Rect {
        self.buffer.rect()
    }

    /// The captured pixels backing this update.
    pub fn buffer(&self) -> &CaptureBuffer {
        &self.buffer
    }

    /// Convert into the handle the consumer passes back on release.
    pub fn into_release(self) -> ReleaseHandle {
        ReleaseHandle::Capture(self.buffer)
    }
}

// ── CursorUpdate ─────────────────────────────────────────────────

/// A pointer-image update queued beside the drawables.
#[derive(Debug, Clone)]
pub struct CursorUpdate {
    /// Pointer position on the surface.
    pub x: u32,
    pub y: u32,
    /// Hotspot offset within the image.
    pub hot_x: u32,
    pub hot_y: u32,
    /// Image size in pixels.
    pub width: u32,
    pub height: u32,
    /// RGBA image bytes, tightly packed.
    pub data: Vec<u8>,
}

impl CursorUpdate {
    /// Convert into the handle the consumer passes back on release.
    pub fn into_release(self) -> ReleaseHandle {
        ReleaseHandle::Heap(self.data)
    }
}

// ── ReleaseHandle ────────────────────────────────────────────────

/// What a consumer hands back when it is done with a queued item.
///
/// One variant per backing storage; the pipeline routes `Capture`
/// buffers back to the snapshot store's pool and simply drops `Heap`
/// blocks.
#[derive(Debug)]
pub enum ReleaseHandle {
    /// A shared capture buffer that returns to the snapshot store.
    Capture(CaptureBuffer),
    /// A plain heap block (cursor images).
    Heap(Vec<u8>),
}
