//! Demo run loop.
//!
//! Drives the pipeline with a synthetic display: one thread animates a
//! moving block across the surface, raising damage the way a native
//! connection would, while the main thread plays the display consumer,
//! popping drawables and cursor updates and releasing their buffers.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use scanbridge_core::{
    DisplayEvent, Pipeline, PixelFormat, Rect, ScanError, SessionHooks, SyntheticSource,
};

use crate::config::DaemonConfig;

// ── Session hooks ────────────────────────────────────────────────

/// The daemon's session: alive until the stop flag flips.
struct DaemonSession {
    running: Arc<AtomicBool>,
}

impl SessionHooks for DaemonSession {
    fn is_alive(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn resized(&self, width: u32, height: u32) {
        info!(width, height, "display reconfigured");
    }
}

// ── Run loop ─────────────────────────────────────────────────────

/// Run the demo until `running` flips false or `duration` elapses.
pub fn run(
    config: &DaemonConfig,
    running: Arc<AtomicBool>,
    duration: Option<Duration>,
) -> Result<(), ScanError> {
    let source = Arc::new(SyntheticSource::new(
        config.display.width,
        config.display.height,
        PixelFormat::Bgra8,
    ));
    let hooks = Arc::new(DaemonSession {
        running: Arc::clone(&running),
    });

    let mut pipeline = Pipeline::start(
        Arc::clone(&source),
        hooks as Arc<dyn SessionHooks>,
        config.pipeline(),
    )?;

    let animator = spawn_animator(
        Arc::clone(&source),
        Arc::clone(&running),
        config.display.width,
        config.display.height,
    )?;

    let started = Instant::now();
    let mut frames: u64 = 0;
    let mut bytes: u64 = 0;
    let mut last_report = started;

    while running.load(Ordering::SeqCst) {
        if let Some(limit) = duration {
            if started.elapsed() >= limit {
                info!("run duration reached");
                running.store(false, Ordering::SeqCst);
                break;
            }
        }

        let mut idle = true;
        while let Some(drawable) = pipeline.try_pop_drawable() {
            idle = false;
            frames += 1;
            bytes += drawable.buffer().data().len() as u64;
            debug!(rect = ?drawable.rect(), "frame consumed");
            pipeline.release(drawable.into_release());
        }
        while let Some(cursor) = pipeline.try_pop_cursor() {
            idle = false;
            debug!(x = cursor.x, y = cursor.y, "cursor consumed");
            pipeline.release(cursor.into_release());
        }

        if last_report.elapsed() >= Duration::from_secs(5) {
            let secs = last_report.elapsed().as_secs_f64();
            info!(
                frames,
                kib_per_s = (bytes as f64 / 1024.0 / secs).round(),
                outstanding = pipeline.outstanding_buffers(),
                "throughput"
            );
            frames = 0;
            bytes = 0;
            last_report = Instant::now();
        }

        if idle {
            thread::sleep(Duration::from_millis(5));
        }
    }

    running.store(false, Ordering::SeqCst);
    pipeline.stop();
    let _ = animator.join();
    info!("demo finished after {:.1}s", started.elapsed().as_secs_f64());
    Ok(())
}

/// Paint a block bouncing across the surface, raising damage for each
/// step, plus a cursor update trailing it.
fn spawn_animator(
    source: Arc<SyntheticSource>,
    running: Arc<AtomicBool>,
    width: u32,
    height: u32,
) -> std::io::Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name("scanbridge-animator".to_string())
        .spawn(move || {
            const BLOCK: u32 = 48;
            let max_x = width.saturating_sub(BLOCK) as i64;
            let max_y = height.saturating_sub(BLOCK) as i64;
            let (mut x, mut y) = (0i64, 0i64);
            let (mut dx, mut dy) = (8i64, 6i64);
            let mut shade: u8 = 0;

            while running.load(Ordering::SeqCst) {
                let old = Rect::new(x as u32, y as u32, BLOCK, BLOCK);
                source.paint(old, 0);

                (x, dx) = bounce(x, dx, max_x);
                (y, dy) = bounce(y, dy, max_y);
                shade = shade.wrapping_add(7);
                let new = Rect::new(x as u32, y as u32, BLOCK, BLOCK);
                source.paint(new, shade);

                // One batch: the erased area, then the repainted one.
                source.inject(DisplayEvent::Damage {
                    rect: old,
                    more: true,
                });
                source.inject(DisplayEvent::Damage {
                    rect: new,
                    more: false,
                });
                source.inject(DisplayEvent::Cursor(scanbridge_core::CursorUpdate {
                    x: x as u32,
                    y: y as u32,
                    hot_x: 0,
                    hot_y: 0,
                    width: 8,
                    height: 8,
                    data: vec![shade; 8 * 8 * 4],
                }));

                thread::sleep(Duration::from_millis(33));
            }
            source.close_events();
        })
}

fn bounce(pos: i64, step: i64, max: i64) -> (i64, i64) {
    let next = pos + step;
    if next < 0 {
        (0, -step)
    } else if next > max {
        (max, -step)
    } else {
        (next, step)
    }
}
