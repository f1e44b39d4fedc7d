//! Axis-aligned bounding boxes over pixel regions.
//!
//! A box is always built around a region center and clipped to the image
//! bounds in the same step: sources near the frame edge are common, and
//! clipping is the only geometrically sound recovery for a box that runs
//! past the edge. A box that falls entirely outside the image yields `None`.

/// Inclusive pixel bounds of a rectangular image region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Aabb {
    pub min_row: usize,
    pub min_col: usize,
    pub max_row: usize,
    pub max_col: usize,
}

impl Aabb {
    /// Build the box spanning `center ± half_extent` on each axis, clipped to
    /// an image of `shape` = (rows, cols).
    ///
    /// Center and extents are truncated to whole pixels, matching the rest of
    /// the masking pipeline. The upper edge is `center + half_extent - 1`, so
    /// a box of half extent `h` covers `2h` pixels per axis. Returns `None`
    /// when the clipped box is empty.
    pub fn around_center(
        cx: f64,
        cy: f64,
        half_x: f64,
        half_y: f64,
        shape: (usize, usize),
    ) -> Option<Self> {
        let (rows, cols) = shape;
        if rows == 0 || cols == 0 || half_x < 1.0 || half_y < 1.0 {
            return None;
        }
        let cx = cx.trunc() as i64;
        let cy = cy.trunc() as i64;
        let hx = half_x.trunc() as i64;
        let hy = half_y.trunc() as i64;

        let min_col = (cx - hx).max(0);
        let max_col = (cx + hx - 1).min(cols as i64 - 1);
        let min_row = (cy - hy).max(0);
        let max_row = (cy + hy - 1).min(rows as i64 - 1);

        if min_col > max_col || min_row > max_row {
            return None;
        }

        Some(Self {
            min_row: min_row as usize,
            min_col: min_col as usize,
            max_row: max_row as usize,
            max_col: max_col as usize,
        })
    }

    pub fn width(&self) -> usize {
        self.max_col - self.min_col + 1
    }

    pub fn height(&self) -> usize {
        self.max_row - self.min_row + 1
    }

    pub fn area(&self) -> usize {
        self.width() * self.height()
    }

    pub fn contains_point(&self, row: usize, col: usize) -> bool {
        row >= self.min_row && row <= self.max_row && col >= self.min_col && col <= self.max_col
    }

    /// Row indices covered by the box.
    pub fn rows(&self) -> std::ops::RangeInclusive<usize> {
        self.min_row..=self.max_row
    }

    /// Column indices covered by the box.
    pub fn cols(&self) -> std::ops::RangeInclusive<usize> {
        self.min_col..=self.max_col
    }
}
