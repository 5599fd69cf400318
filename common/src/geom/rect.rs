use super::coord::GridPos;
use serde::{Deserialize, Serialize};

/// Inclusive rectangle of grid cells: both `min` and `max` are inside.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridRect {
    pub min: GridPos,
    pub max: GridPos,
}

impl GridRect {
    pub fn new(p: GridPos, q: GridPos) -> Self {
        Self {
            min: GridPos::new(p.col.min(q.col), p.row.min(q.row)),
            max: GridPos::new(p.col.max(q.col), p.row.max(q.row)),
        }
    }

    pub fn from_size(min: GridPos, width: i32, height: i32) -> Self {
        Self::new(min, min.offset(width - 1, height - 1))
    }

    pub fn hull<I: IntoIterator<Item = GridPos>>(points: I) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        Some(iter.fold(Self::new(first, first), |r, p| r.including(p)))
    }

    pub fn width(&self) -> i32 {
        self.max.col - self.min.col + 1
    }
    pub fn height(&self) -> i32 {
        self.max.row - self.min.row + 1
    }
    pub fn area(&self) -> i64 {
        self.width() as i64 * self.height() as i64
    }

    pub fn contains(&self, p: GridPos) -> bool {
        p.col >= self.min.col && p.col <= self.max.col && p.row >= self.min.row && p.row <= self.max.row
    }

    pub fn contains_rect(&self, other: &GridRect) -> bool {
        self.contains(other.min) && self.contains(other.max)
    }

    pub fn overlaps(&self, other: &GridRect) -> bool {
        self.min.col <= other.max.col
            && self.max.col >= other.min.col
            && self.min.row <= other.max.row
            && self.max.row >= other.min.row
    }

    pub fn intersection(&self, other: &GridRect) -> Option<GridRect> {
        if !self.overlaps(other) {
            return None;
        }
        Some(GridRect {
            min: GridPos::new(self.min.col.max(other.min.col), self.min.row.max(other.min.row)),
            max: GridPos::new(self.max.col.min(other.max.col), self.max.row.min(other.max.row)),
        })
    }

    pub fn including(&self, p: GridPos) -> GridRect {
        GridRect {
            min: GridPos::new(self.min.col.min(p.col), self.min.row.min(p.row)),
            max: GridPos::new(self.max.col.max(p.col), self.max.row.max(p.row)),
        }
    }

    pub fn union(&self, other: &GridRect) -> GridRect {
        self.including(other.min).including(other.max)
    }

    pub fn expand(&self, margin: i32) -> GridRect {
        GridRect {
            min: self.min.offset(-margin, -margin),
            max: self.max.offset(margin, margin),
        }
    }

    /// Row-major iteration over every cell.
    pub fn cells(&self) -> impl Iterator<Item = GridPos> + '_ {
        (self.min.row..=self.max.row)
            .flat_map(move |r| (self.min.col..=self.max.col).map(move |c| GridPos::new(c, r)))
    }
}
