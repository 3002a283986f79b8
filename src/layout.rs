use std::sync::Arc;

use crate::area::SpatialArea;

/// Fraction of the parent's short side used as the gap between cells.
const SPACING_RATIO: f64 = 0.05;

/// Approximate-square grid tiling.
///
/// Every child gets the same square cell; cells are placed row-major in input
/// order. Unlike a treemap the cell size does not depend on child content.
pub struct GridLayout;

/// Grid dimensions chosen for a given child count and parent shape.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridShape {
    pub rows: usize,
    pub cols: usize,
    pub spacing: f64,
    pub cell_size: f64,
}

impl GridLayout {
    /// Pair each child with a cell parented to `parent`.
    pub fn layout<T>(parent: &Arc<SpatialArea>, children: Vec<T>) -> Vec<(T, SpatialArea)> {
        let Some(shape) = Self::shape(parent.width(), parent.height(), children.len()) else {
            return Vec::new();
        };

        children
            .into_iter()
            .enumerate()
            .map(|(index, child)| {
                let row = index / shape.cols;
                let col = index % shape.cols;
                let step = shape.cell_size + shape.spacing;
                let area = SpatialArea::new(
                    shape.spacing + col as f64 * step,
                    shape.spacing + row as f64 * step,
                    shape.cell_size,
                    shape.cell_size,
                    Some(Arc::clone(parent)),
                );
                (child, area)
            })
            .collect()
    }

    /// Compute the grid for `count` children of a `width × height` parent.
    ///
    /// Returns `None` when there is nothing to place.
    pub fn shape(width: f64, height: f64, count: usize) -> Option<GridShape> {
        if count == 0 {
            return None;
        }

        let n = count as f64;
        let aspect_ratio = width / height;
        let spacing = (width.min(height) * SPACING_RATIO).max(0.0);

        // NaN and infinite ratios fall out of the float->int cast as 0 or
        // usize::MAX; both are clamped into [1, count].
        let rows = ((n / aspect_ratio).sqrt().floor() as usize).clamp(1, count);
        let cols = (count / rows).max(1);
        // floor(n / rows) columns can leave a partial extra row.
        let rows = rows.max(count.div_ceil(cols));

        let cell_size = ((width - spacing) / cols as f64 - spacing)
            .min((height - spacing) / rows as f64 - spacing)
            .max(0.0);

        Some(GridShape {
            rows,
            cols,
            spacing,
            cell_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::area::Rect;

    const EPS: f64 = 1e-9;

    fn parent(width: f64, height: f64) -> Arc<SpatialArea> {
        Arc::new(SpatialArea::root(width, height))
    }

    #[test]
    fn test_empty_layout() {
        let out = GridLayout::layout::<u32>(&parent(100.0, 100.0), Vec::new());
        assert!(out.is_empty());
    }

    #[test]
    fn test_four_children_make_two_by_two() {
        let out = GridLayout::layout(&parent(100.0, 100.0), vec!["a", "b", "c", "d"]);
        let names: Vec<_> = out.iter().map(|(name, _)| *name).collect();
        assert_eq!(names, vec!["a", "b", "c", "d"]);

        let (_, a) = &out[0];
        let (_, b) = &out[1];
        let (_, c) = &out[2];
        assert!((a.width() - 42.5).abs() < EPS);
        assert_eq!(a.width(), a.height());
        assert!((a.left() - 5.0).abs() < EPS);
        assert!((a.top() - 5.0).abs() < EPS);
        // same row, next column
        assert!((b.left() - 52.5).abs() < EPS);
        assert!((b.top() - 5.0).abs() < EPS);
        // next row
        assert!((c.left() - 5.0).abs() < EPS);
        assert!((c.top() - 52.5).abs() < EPS);
    }

    #[test]
    fn test_single_child_guarded() {
        // Wide parent: sqrt(1 / 4) floors to zero rows without the guard.
        let out = GridLayout::layout(&parent(400.0, 100.0), vec![()]);
        assert_eq!(out.len(), 1);
        let area = &out[0].1;
        assert!(area.width() > 0.0);
        assert!(area.bottom() <= 100.0 + EPS);
    }

    #[test]
    fn test_degenerate_parent_does_not_panic() {
        for (w, h) in [(0.0, 100.0), (100.0, 0.0), (0.0, 0.0)] {
            let out = GridLayout::layout(&parent(w, h), vec![1, 2, 3]);
            assert_eq!(out.len(), 3);
            for (_, area) in &out {
                assert!(area.width() >= 0.0 && area.width().is_finite());
            }
        }
    }

    #[test]
    fn test_children_are_parented() {
        let p = parent(100.0, 100.0);
        let out = GridLayout::layout(&p, vec![0u8, 1]);
        for (_, area) in &out {
            assert!(Arc::ptr_eq(area.parent().unwrap(), &p));
        }
    }

    #[test]
    fn test_cells_inside_parent_and_disjoint() {
        let shapes = [(100.0, 100.0), (300.0, 80.0), (80.0, 300.0), (1000.0, 999.0), (7.0, 3.0)];
        for &(w, h) in &shapes {
            for n in 1..=60usize {
                let out = GridLayout::layout(&parent(w, h), (0..n).collect());
                assert_eq!(out.len(), n);

                let rects: Vec<Rect> = out.iter().map(|(_, a)| a.relative_rect()).collect();
                for (i, r) in rects.iter().enumerate() {
                    assert_eq!(out[i].0, i);
                    assert!(r.x >= 0.0 && r.y >= 0.0, "{w}x{h} n={n} cell {i} starts outside");
                    assert!(r.right() <= w + EPS, "{w}x{h} n={n} cell {i} overflows right");
                    assert!(r.bottom() <= h + EPS, "{w}x{h} n={n} cell {i} overflows bottom");
                    assert!((r.width - r.height).abs() < EPS);
                    for other in &rects[i + 1..] {
                        assert!(!r.intersects(other), "{w}x{h} n={n} overlap at {i}");
                    }
                }
            }
        }
    }

    #[test]
    fn test_row_major_order() {
        let out = GridLayout::layout(&parent(300.0, 100.0), (0..6).collect::<Vec<_>>());
        let shape = GridLayout::shape(300.0, 100.0, 6).unwrap();
        for (i, (_, area)) in out.iter().enumerate() {
            let row = i / shape.cols;
            let col = i % shape.cols;
            let step = shape.cell_size + shape.spacing;
            assert!((area.left() - (shape.spacing + col as f64 * step)).abs() < EPS);
            assert!((area.top() - (shape.spacing + row as f64 * step)).abs() < EPS);
        }
    }
}
