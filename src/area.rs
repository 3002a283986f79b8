use std::sync::Arc;

/// Axis-aligned rectangle in a single coordinate space (world or screen).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn long_side(&self) -> f64 {
        self.width.max(self.height)
    }

    /// Open-interval overlap test: rectangles that only share an edge are disjoint.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    /// Half-open containment, `[x, right) × [y, bottom)`.
    pub fn contains(&self, px: f64, py: f64) -> bool {
        px >= self.x && px < self.right() && py >= self.y && py < self.bottom()
    }

    /// True if `other` lies entirely within `self` (edges may touch).
    pub fn encloses(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }
}

/// A node's rectangle, expressed relative to its parent's top-left corner.
///
/// Absolute (root-relative) coordinates are recomputed from the parent chain
/// on every call. Areas are immutable once built, so the chain a child holds
/// is exactly the one it was laid out against.
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialArea {
    left: f64,
    top: f64,
    width: f64,
    height: f64,
    parent: Option<Arc<SpatialArea>>,
}

impl SpatialArea {
    pub fn new(left: f64, top: f64, width: f64, height: f64, parent: Option<Arc<SpatialArea>>) -> Self {
        Self {
            left,
            top,
            width: width.max(0.0),
            height: height.max(0.0),
            parent,
        }
    }

    /// An area with no parent; its relative and absolute coordinates coincide.
    pub fn root(width: f64, height: f64) -> Self {
        Self::new(0.0, 0.0, width, height, None)
    }

    pub fn left(&self) -> f64 {
        self.left
    }

    pub fn top(&self) -> f64 {
        self.top
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    pub fn parent(&self) -> Option<&Arc<SpatialArea>> {
        self.parent.as_ref()
    }

    pub fn abs_left(&self) -> f64 {
        self.parent.as_ref().map_or(0.0, |p| p.abs_left()) + self.left
    }

    pub fn abs_top(&self) -> f64 {
        self.parent.as_ref().map_or(0.0, |p| p.abs_top()) + self.top
    }

    pub fn abs_right(&self) -> f64 {
        self.abs_left() + self.width
    }

    pub fn abs_bottom(&self) -> f64 {
        self.abs_top() + self.height
    }

    /// Parent-relative rectangle.
    pub fn relative_rect(&self) -> Rect {
        Rect::new(self.left, self.top, self.width, self.height)
    }

    /// World-space rectangle.
    pub fn absolute_rect(&self) -> Rect {
        Rect::new(self.abs_left(), self.abs_top(), self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(offsets: &[(f64, f64)]) -> Arc<SpatialArea> {
        let mut current = Arc::new(SpatialArea::root(10_000.0, 10_000.0));
        for &(left, top) in offsets {
            current = Arc::new(SpatialArea::new(left, top, 100.0, 100.0, Some(current)));
        }
        current
    }

    #[test]
    fn test_absolute_is_sum_of_chain() {
        let deep = chain(&[(10.0, 20.0), (1.5, 2.5), (100.0, 0.0)]);
        assert_eq!(deep.abs_left(), 111.5);
        assert_eq!(deep.abs_top(), 22.5);
        assert_eq!(deep.abs_right(), 211.5);
        assert_eq!(deep.abs_bottom(), 122.5);
    }

    #[test]
    fn test_absolute_equals_parent_absolute_plus_offset() {
        let offsets = [(3.0, 4.0), (7.0, 1.0), (0.25, 0.5), (12.0, 9.0)];
        let mut node = chain(&offsets);
        while let Some(parent) = node.parent().cloned() {
            assert_eq!(node.abs_left(), parent.abs_left() + node.left());
            assert_eq!(node.abs_top(), parent.abs_top() + node.top());
            node = parent;
        }
        assert_eq!(node.abs_left(), 0.0);
    }

    #[test]
    fn test_negative_size_clamped() {
        let area = SpatialArea::new(0.0, 0.0, -5.0, -1.0, None);
        assert_eq!(area.width(), 0.0);
        assert_eq!(area.height(), 0.0);
        assert_eq!(area.right(), area.left());
    }

    #[test]
    fn test_intersection_is_symmetric() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(5.0, 5.0, 10.0, 10.0);
        let c = Rect::new(20.0, 0.0, 5.0, 5.0);
        assert!(a.intersects(&b) && b.intersects(&a));
        assert!(!a.intersects(&c) && !c.intersects(&a));
    }

    #[test]
    fn test_shared_edge_is_disjoint() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let right = Rect::new(10.0, 0.0, 10.0, 10.0);
        let below = Rect::new(0.0, 10.0, 10.0, 10.0);
        let corner = Rect::new(10.0, 10.0, 1.0, 1.0);
        assert!(!a.intersects(&right) && !right.intersects(&a));
        assert!(!a.intersects(&below) && !below.intersects(&a));
        assert!(!a.intersects(&corner));
    }

    #[test]
    fn test_contains_is_half_open() {
        let r = Rect::new(0.0, 0.0, 10.0, 10.0);
        assert!(r.contains(0.0, 0.0));
        assert!(r.contains(9.99, 9.99));
        assert!(!r.contains(10.0, 5.0));
        assert!(!r.contains(5.0, 10.0));
    }
}
