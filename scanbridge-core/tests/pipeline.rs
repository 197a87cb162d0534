//! Integration tests — full pipeline lifecycle over a synthetic
//! display: damage in, drawables out, resize handling, cursor flow,
//! and clean shutdown with no capture buffers left outstanding.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use scanbridge_core::{
    CursorUpdate, DisplayEvent, Drawable, Pipeline, PipelineConfig, PixelFormat, Rect,
    SessionHooks, SyntheticSource,
};

// ── Helpers ──────────────────────────────────────────────────────

struct Hooks {
    alive: AtomicBool,
    resizes: AtomicUsize,
}

impl Hooks {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            alive: AtomicBool::new(true),
            resizes: AtomicUsize::new(0),
        })
    }
}

impl SessionHooks for Hooks {
    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }
    fn resized(&self, _width: u32, _height: u32) {
        self.resizes.fetch_add(1, Ordering::SeqCst);
    }
}

fn config() -> PipelineConfig {
    PipelineConfig {
        scan_rows: 8,
        tiles_per_row: 8,
        ..PipelineConfig::default()
    }
}

fn start(
    width: u32,
    height: u32,
) -> (Arc<SyntheticSource>, Arc<Hooks>, Pipeline<SyntheticSource>) {
    let source = Arc::new(SyntheticSource::new(width, height, PixelFormat::Bgra8));
    let hooks = Hooks::new();
    let pipeline = Pipeline::start(
        Arc::clone(&source),
        hooks.clone() as Arc<dyn SessionHooks>,
        config(),
    )
    .expect("pipeline start");
    (source, hooks, pipeline)
}

fn wait_drawable(pipeline: &Pipeline<SyntheticSource>) -> Option<Drawable> {
    let deadline = Instant::now() + Duration::from_secs(3);
    while Instant::now() < deadline {
        if let Some(d) = pipeline.try_pop_drawable() {
            return Some(d);
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    None
}

// ── Lifecycle ────────────────────────────────────────────────────

#[test]
fn damage_produces_a_matching_drawable() {
    let (source, _hooks, pipeline) = start(256, 256);

    let rect = Rect::new(10, 10, 5, 5);
    source.paint(rect, 0xAB);
    source.damage(rect);

    let drawable = wait_drawable(&pipeline).expect("drawable");
    assert_eq!(drawable.rect(), rect);
    assert_eq!(drawable.buffer().data(), &vec![0xAB; 5 * 5 * 4][..]);

    // The published pixels are also integrated into the baseline the
    // consumer would build its primary surface from.
    let (desc, frame) = pipeline.primary_surface();
    let off = 10 * desc.stride() + 10 * 4;
    assert_eq!(&frame[off..off + 4], &[0xAB; 4]);

    pipeline.release(drawable.into_release());
    assert_eq!(pipeline.outstanding_buffers(), 0);
}

#[test]
fn wake_callback_fires_for_new_work() {
    let (source, _hooks, pipeline) = start(128, 128);

    let woken = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&woken);
    pipeline.set_wake_callback(Box::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    }));

    source.paint(Rect::new(0, 0, 16, 16), 0x11);
    source.damage(Rect::new(0, 0, 16, 16));

    let deadline = Instant::now() + Duration::from_secs(3);
    while woken.load(Ordering::SeqCst) == 0 && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(2));
    }
    assert!(woken.load(Ordering::SeqCst) >= 1);

    let drawable = wait_drawable(&pipeline).expect("drawable after wake");
    pipeline.release(drawable.into_release());
}

#[test]
fn periodic_scan_finds_unreported_changes() {
    // Paint without raising any damage event: only the scanline pass
    // can notice this.
    let (source, _hooks, pipeline) = start(256, 256);
    source.paint(Rect::new(40, 40, 20, 20), 0x7F);

    let drawable = wait_drawable(&pipeline).expect("scan pass found the change");
    let r = drawable.rect();
    assert!(
        r.contains(&Rect::new(40, 40, 20, 20)) || r.intersects(&Rect::new(40, 40, 20, 20)),
        "scan result {r:?} misses the painted area"
    );
    pipeline.release(drawable.into_release());
}

#[test]
fn resize_reaches_session_hooks_and_descriptor() {
    let (source, hooks, pipeline) = start(128, 128);

    source.inject(DisplayEvent::Resize {
        width: 200,
        height: 150,
    });

    let deadline = Instant::now() + Duration::from_secs(3);
    while hooks.resizes.load(Ordering::SeqCst) == 0 && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(2));
    }
    assert_eq!(hooks.resizes.load(Ordering::SeqCst), 1);
    let desc = pipeline.descriptor();
    assert_eq!((desc.width, desc.height), (200, 150));
}

#[test]
fn cursor_updates_flow_through() {
    let (source, _hooks, pipeline) = start(64, 64);

    source.inject(DisplayEvent::Cursor(CursorUpdate {
        x: 12,
        y: 34,
        hot_x: 1,
        hot_y: 1,
        width: 4,
        height: 4,
        data: vec![0xFF; 4 * 4 * 4],
    }));

    let deadline = Instant::now() + Duration::from_secs(3);
    loop {
        if let Some(cursor) = pipeline.try_pop_cursor() {
            assert_eq!((cursor.x, cursor.y), (12, 34));
            pipeline.release(cursor.into_release());
            break;
        }
        assert!(Instant::now() < deadline, "cursor never arrived");
        std::thread::sleep(Duration::from_millis(2));
    }
}

#[test]
fn stop_drains_and_leaves_nothing_outstanding() {
    let (source, _hooks, mut pipeline) = start(256, 256);

    // Queue several drawables the consumer never pops.
    for i in 0..4u32 {
        let rect = Rect::new(i * 20, 0, 10, 10);
        source.paint(rect, 0x40 + i as u8);
        source.damage(rect);
    }
    let deadline = Instant::now() + Duration::from_secs(3);
    while !pipeline.has_pending() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(2));
    }

    pipeline.stop();
    assert_eq!(pipeline.outstanding_buffers(), 0, "stop must release queued buffers");
    // Idempotent.
    pipeline.stop();
}

#[test]
fn session_death_stops_the_worker() {
    let (_source, hooks, mut pipeline) = start(64, 64);

    hooks.alive.store(false, Ordering::SeqCst);
    // Both threads notice within their poll intervals; stop() then
    // joins promptly rather than hanging.
    let begin = Instant::now();
    pipeline.stop();
    assert!(begin.elapsed() < Duration::from_secs(5));
}
