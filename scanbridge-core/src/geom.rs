//! Rectangle and region algebra for damage tracking.
//!
//! A [`Region`] is a set of **disjoint** rectangles. The pipeline uses it
//! in two places: the pending-region dedup set (union / subtract /
//! containment) and the damage bridge's per-batch accumulator (union /
//! disjoint decomposition). Disjointness is an invariant of every
//! operation, so `rects()` can always be handed to the change tracker
//! without overlap.

// ── Rect ─────────────────────────────────────────────────────────

/// An axis-aligned rectangle in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rect {
    /// Left edge in pixels.
    pub x: u32,
    /// Top edge in pixels.
    pub y: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Rect {
    /// Create a rectangle from its top-left corner and size.
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// One pixel past the right edge.
    pub const fn right(&self) -> u32 {
        self.x + self.width
    }

    /// One pixel past the bottom edge.
    pub const fn bottom(&self) -> u32 {
        self.y + self.height
    }

    /// Whether this rectangle covers zero pixels.
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Covered area in pixels.
    pub const fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Whether `self` and `other` share at least one pixel.
    pub fn intersects(&self, other: &Rect) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    /// The overlapping rectangle, or `None` when disjoint.
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        if !self.intersects(other) {
            return None;
        }
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        Some(Rect {
            x,
            y,
            width: self.right().min(other.right()) - x,
            height: self.bottom().min(other.bottom()) - y,
        })
    }

    /// Whether `other` lies entirely inside `self`.
    pub fn contains(&self, other: &Rect) -> bool {
        other.is_empty()
            || (other.x >= self.x
                && other.y >= self.y
                && other.right() <= self.right()
                && other.bottom() <= self.bottom())
    }

    /// Clip `self` against a surface of `width × height` pixels anchored
    /// at the origin. Returns `None` when nothing remains.
    pub fn clipped_to(&self, width: u32, height: u32) -> Option<Rect> {
        self.intersection(&Rect::new(0, 0, width, height))
    }

    /// Remove `other` from `self`, yielding the uncovered remainder as
    /// up to four disjoint rectangles (top band, bottom band, left and
    /// right slivers of the middle band).
    pub fn subtract(&self, other: &Rect) -> Vec<Rect> {
        let Some(overlap) = self.intersection(other) else {
            return if self.is_empty() { vec![] } else { vec![*self] };
        };

        let mut out = Vec::with_capacity(4);
        if overlap.y > self.y {
            out.push(Rect::new(self.x, self.y, self.width, overlap.y - self.y));
        }
        if overlap.bottom() < self.bottom() {
            out.push(Rect::new(
                self.x,
                overlap.bottom(),
                self.width,
                self.bottom() - overlap.bottom(),
            ));
        }
        if overlap.x > self.x {
            out.push(Rect::new(
                self.x,
                overlap.y,
                overlap.x - self.x,
                overlap.height,
            ));
        }
        if overlap.right() < self.right() {
            out.push(Rect::new(
                overlap.right(),
                overlap.y,
                self.right() - overlap.right(),
                overlap.height,
            ));
        }
        out
    }
}

// ── Region ───────────────────────────────────────────────────────

/// A set of disjoint rectangles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Region {
    rects: Vec<Rect>,
}

impl Region {
    /// The empty region.
    pub const fn new() -> Self {
        Self { rects: Vec::new() }
    }

    /// Whether the region covers zero pixels.
    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    /// Total covered area in pixels.
    pub fn area(&self) -> u64 {
        self.rects.iter().map(Rect::area).sum()
    }

    /// The disjoint rectangles making up the region.
    pub fn rects(&self) -> &[Rect] {
        &self.rects
    }

    /// Drop all coverage.
    pub fn clear(&mut self) {
        self.rects.clear();
    }

    /// Whether `rect` is fully covered by the region.
    pub fn covers(&self, rect: &Rect) -> bool {
        if rect.is_empty() {
            return true;
        }
        let mut remaining = vec![*rect];
        for r in &self.rects {
            remaining = remaining.iter().flat_map(|p| p.subtract(r)).collect();
            if remaining.is_empty() {
                return true;
            }
        }
        false
    }

    /// Add `rect` to the region. Only the parts not already covered are
    /// stored, so disjointness is preserved.
    pub fn union_rect(&mut self, rect: &Rect) {
        if rect.is_empty() {
            return;
        }
        let mut pieces = vec![*rect];
        for r in &self.rects {
            pieces = pieces.iter().flat_map(|p| p.subtract(r)).collect();
            if pieces.is_empty() {
                return;
            }
        }
        self.rects.extend(pieces);
    }

    /// Remove `rect` from the region.
    pub fn subtract_rect(&mut self, rect: &Rect) {
        if rect.is_empty() {
            return;
        }
        self.rects = self
            .rects
            .iter()
            .flat_map(|r| r.subtract(rect))
            .collect();
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intersection_and_containment() {
        let a = Rect::new(0, 0, 10, 10);
        let b = Rect::new(5, 5, 10, 10);
        assert_eq!(a.intersection(&b), Some(Rect::new(5, 5, 5, 5)));
        assert!(a.contains(&Rect::new(2, 2, 3, 3)));
        assert!(!a.contains(&b));
        assert!(!a.intersects(&Rect::new(10, 0, 5, 5)));
    }

    #[test]
    fn subtract_hole_yields_four_pieces() {
        let outer = Rect::new(0, 0, 10, 10);
        let hole = Rect::new(3, 3, 4, 4);
        let pieces = outer.subtract(&hole);
        assert_eq!(pieces.len(), 4);
        let area: u64 = pieces.iter().map(Rect::area).sum();
        assert_eq!(area, outer.area() - hole.area());
        for p in &pieces {
            assert!(!p.intersects(&hole));
        }
    }

    #[test]
    fn subtract_disjoint_is_identity() {
        let a = Rect::new(0, 0, 4, 4);
        let b = Rect::new(8, 8, 4, 4);
        assert_eq!(a.subtract(&b), vec![a]);
    }

    #[test]
    fn subtract_full_cover_is_empty() {
        let a = Rect::new(2, 2, 4, 4);
        let b = Rect::new(0, 0, 10, 10);
        assert!(a.subtract(&b).is_empty());
    }

    #[test]
    fn clip_to_surface() {
        let r = Rect::new(250, 250, 20, 20);
        assert_eq!(r.clipped_to(256, 256), Some(Rect::new(250, 250, 6, 6)));
        assert_eq!(Rect::new(300, 0, 5, 5).clipped_to(256, 256), None);
    }

    #[test]
    fn region_union_keeps_disjoint() {
        let mut region = Region::new();
        region.union_rect(&Rect::new(0, 0, 10, 10));
        region.union_rect(&Rect::new(5, 5, 10, 10));
        // Overlap is stored once.
        assert_eq!(region.area(), 100 + 100 - 25);
        for (i, a) in region.rects().iter().enumerate() {
            for b in &region.rects()[i + 1..] {
                assert!(!a.intersects(b));
            }
        }
    }

    #[test]
    fn region_covers_across_pieces() {
        let mut region = Region::new();
        region.union_rect(&Rect::new(0, 0, 10, 5));
        region.union_rect(&Rect::new(0, 5, 10, 5));
        // Covered only by the two rects jointly.
        assert!(region.covers(&Rect::new(2, 3, 5, 4)));
        assert!(!region.covers(&Rect::new(2, 3, 5, 10)));
    }

    #[test]
    fn union_then_subtract_round_trips() {
        let mut region = Region::new();
        let r = Rect::new(10, 10, 5, 5);
        region.union_rect(&r);
        assert!(region.covers(&r));
        region.subtract_rect(&r);
        assert!(region.is_empty());
    }

    #[test]
    fn subtract_partial_overlap() {
        let mut region = Region::new();
        region.union_rect(&Rect::new(0, 0, 10, 10));
        region.subtract_rect(&Rect::new(5, 0, 10, 10));
        assert_eq!(region.area(), 50);
        assert!(region.covers(&Rect::new(0, 0, 5, 10)));
        assert!(!region.covers(&Rect::new(5, 0, 1, 1)));
    }
}
