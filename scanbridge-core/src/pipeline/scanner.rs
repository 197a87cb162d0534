//! Periodic tile scanner.
//!
//! Damage notifications are the fast path, but some surface changes
//! never raise one. The scanner partitions the surface into a
//! `rows × tiles_per_row` grid and, on each invocation, samples one
//! pixel scanline per grid row, byte-comparing it against the
//! full-frame baseline. Changed tiles are grown into neighbors, merged
//! into maximal rectangles, and submitted through the change tracker
//! like any other damage.
//!
//! Scanline offsets within each row band follow a bit-reversal
//! permutation, so a few consecutive passes sample the whole surface
//! instead of sweeping top to bottom.

use std::time::Duration;

use tracing::{debug, trace};

use crate::config::PipelineConfig;
use crate::geom::Rect;
use crate::pipeline::snapshot::SnapshotStore;
use crate::pipeline::tracker::ChangeTracker;
use crate::pipeline::types::ReportKind;
use crate::source::DisplaySource;

// ── Grid geometry ────────────────────────────────────────────────

/// Pixel-space layout of the scan grid for the current surface size.
#[derive(Debug, Clone, Copy)]
struct GridGeometry {
    width: u32,
    height: u32,
    rows: u32,
    cols: u32,
    /// Height of one grid row; the last row absorbs the remainder.
    band_h: u32,
    /// Width of one tile; the last column absorbs the remainder.
    tile_w: u32,
}

impl GridGeometry {
    fn new(width: u32, height: u32, rows: u32, cols: u32) -> Self {
        // A tiny surface collapses to fewer, 1-pixel rows/tiles.
        let rows = rows.min(height).max(1);
        let cols = cols.min(width).max(1);
        Self {
            width,
            height,
            rows,
            cols,
            band_h: height / rows,
            tile_w: width / cols,
        }
    }
}

// ── Row hit bitmasks ─────────────────────────────────────────────

/// Changed-tile bitmask for one grid row; bit `t` is tile `t`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct RowHits(u64);

impl RowHits {
    fn set(&mut self, tile: u32) {
        self.0 |= 1 << tile;
    }

    fn get(&self, tile: u32) -> bool {
        self.0 & (1 << tile) != 0
    }

    fn count(&self) -> u32 {
        self.0.count_ones()
    }

    fn full_mask(cols: u32) -> u64 {
        if cols >= 64 { u64::MAX } else { (1 << cols) - 1 }
    }

    fn is_full(&self, cols: u32) -> bool {
        self.0 == Self::full_mask(cols)
    }

    fn fill(&mut self, cols: u32) {
        self.0 = Self::full_mask(cols);
    }
}

// ── TileScanner ──────────────────────────────────────────────────

/// Scan-schedule state: rotating scanline cursor and the adaptive
/// target scan rate. Owned exclusively by the scan worker.
pub(crate) struct TileScanner {
    rows: u32,
    cols: u32,
    row_threshold: f64,
    min_fps: u32,
    max_fps: u32,
    /// Bit-reversal permutation of `[0, rows)`.
    order: Vec<u32>,
    cursor: usize,
    /// Target full-grid passes per second.
    rate: u32,
}

impl TileScanner {
    pub(crate) fn new(config: &PipelineConfig) -> Self {
        Self {
            rows: config.scan_rows,
            cols: config.tiles_per_row,
            row_threshold: config.row_threshold,
            min_fps: config.min_fps,
            max_fps: config.max_fps,
            order: bit_reversal_order(config.scan_rows),
            cursor: 0,
            rate: config.max_fps,
        }
    }

    /// Interval for the worker's timed queue pop: one full grid pass
    /// nominally takes `1/rate` seconds.
    pub(crate) fn pop_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / (self.rate as f64 * self.rows as f64))
    }

    /// A queued report was processed: incoming load, speed up.
    pub(crate) fn note_processed(&mut self) {
        self.rate = (self.rate + 1).min(self.max_fps);
    }

    /// The queue pop timed out with nothing to do: relax to save CPU.
    pub(crate) fn note_idle(&mut self) {
        self.rate = self.rate.saturating_sub(1).max(self.min_fps);
    }

    #[cfg(test)]
    pub(crate) fn rate(&self) -> u32 {
        self.rate
    }

    /// Run one scan pass: sample a scanline per grid row, diff, grow,
    /// merge, and submit the resulting rectangles.
    pub(crate) fn scan_pass<S: DisplaySource>(
        &mut self,
        store: &SnapshotStore<S>,
        tracker: &ChangeTracker,
    ) {
        let desc = store.descriptor();
        if desc.width == 0 || desc.height == 0 {
            return;
        }
        let geom = GridGeometry::new(desc.width, desc.height, self.rows, self.cols);
        let bpp = desc.format.bytes_per_pixel();

        // Map the permuted cursor into an offset inside one row band.
        let within = (self.order[self.cursor] as u64 * geom.band_h as u64
            / self.rows.max(1) as u64) as u32;
        self.cursor = (self.cursor + 1) % self.order.len();

        let mut hits = vec![RowHits::default(); geom.rows as usize];
        for i in 0..geom.rows {
            let y = i * geom.band_h + within;
            if y >= geom.height {
                continue;
            }
            let line = Rect::new(0, y, geom.width, 1);
            let buf = match store.capture(line) {
                Ok(buf) => buf,
                Err(e) => {
                    debug!(y, error = %e, "scanline capture failed, row skipped");
                    continue;
                }
            };
            let row_hits = store
                .with_row(y, |baseline| {
                    diff_row(buf.data(), baseline, geom, bpp)
                })
                .unwrap_or_default();
            hits[i as usize] = row_hits;
            store.release(buf);
        }

        grow_pass(&mut hits, geom.cols, self.row_threshold);
        let rects = merge_pass(&hits, geom);
        for rect in rects {
            if tracker.try_enqueue(ReportKind::TileScan, rect) {
                trace!(?rect, "tile scan change queued");
            }
        }
    }
}

/// Permutation of `[0, n)` ordered by bit-reversed index, spreading
/// consecutive samples across the whole range.
fn bit_reversal_order(n: u32) -> Vec<u32> {
    let n = n.max(1);
    let span = n.next_power_of_two();
    let bits = span.trailing_zeros();
    (0..span)
        .map(|i| {
            if bits == 0 {
                0
            } else {
                i.reverse_bits() >> (32 - bits)
            }
        })
        .filter(|&v| v < n)
        .collect()
}

/// Byte-compare one captured scanline against the baseline row and
/// return the changed-tile bitmask. Whole-row equality short-circuits.
/// A length mismatch means a resize landed between the capture and the
/// baseline read; the stale row is skipped and the next pass sees the
/// new geometry.
fn diff_row(captured: &[u8], baseline: &[u8], geom: GridGeometry, bpp: usize) -> RowHits {
    let mut hits = RowHits::default();
    if captured.len() != baseline.len() || captured == baseline {
        return hits;
    }
    for t in 0..geom.cols {
        let start = (t * geom.tile_w) as usize * bpp;
        let end = if t == geom.cols - 1 {
            geom.width as usize * bpp
        } else {
            ((t + 1) * geom.tile_w) as usize * bpp
        };
        if captured[start..end] != baseline[start..end] {
            hits.set(t);
        }
    }
    hits
}

/// Promote heavily-hit rows to whole-row updates and fill single-tile
/// gaps: edge tiles grow from one hit neighbor, interior tiles only
/// when both neighbors hit. Threshold is re-checked after growth.
fn grow_pass(rows: &mut [RowHits], cols: u32, threshold: f64) {
    let limit = cols as f64 * threshold;
    for hits in rows.iter_mut() {
        if hits.count() == 0 {
            continue;
        }
        if (hits.count() as f64) > limit {
            hits.fill(cols);
            continue;
        }
        let before = *hits;
        let mut grown = before;
        for t in 0..cols {
            if before.get(t) {
                continue;
            }
            let left = t > 0 && before.get(t - 1);
            let right = t + 1 < cols && before.get(t + 1);
            let grow = if t == 0 {
                right
            } else if t == cols - 1 {
                left
            } else {
                left && right
            };
            if grow {
                grown.set(t);
            }
        }
        *hits = grown;
        if (hits.count() as f64) > limit {
            hits.fill(cols);
        }
    }
}

/// Merge hit bitmasks into maximal pixel rectangles: runs of full rows
/// become one tall full-width rectangle, partial rows become
/// horizontal tile runs. The last row/column absorbs remainder pixels.
fn merge_pass(rows: &[RowHits], geom: GridGeometry) -> Vec<Rect> {
    let mut out = Vec::new();
    let mut i = 0u32;
    let n = rows.len() as u32;
    while i < n {
        if rows[i as usize].is_full(geom.cols) {
            let mut j = i;
            while j < n && rows[j as usize].is_full(geom.cols) {
                j += 1;
            }
            let y0 = i * geom.band_h;
            let y1 = if j == geom.rows { geom.height } else { j * geom.band_h };
            out.push(Rect::new(0, y0, geom.width, y1 - y0));
            i = j;
            continue;
        }

        let y = i * geom.band_h;
        let h = if i == geom.rows - 1 {
            geom.height - y
        } else {
            geom.band_h
        };
        let hits = rows[i as usize];
        let mut t = 0u32;
        while t < geom.cols {
            if !hits.get(t) {
                t += 1;
                continue;
            }
            let mut u = t;
            while u < geom.cols && hits.get(u) {
                u += 1;
            }
            let x0 = t * geom.tile_w;
            let x1 = if u == geom.cols { geom.width } else { u * geom.tile_w };
            out.push(Rect::new(x0, y, x1 - x0, h));
            t = u;
        }
        i += 1;
    }
    out
}

// ── Tests ────────────────────────────────────────────────────────
