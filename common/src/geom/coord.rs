use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};

/// A hole (physical board) or snap point (schematic) on the routing grid.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct GridPos {
    pub col: i32,
    pub row: i32,
}

impl GridPos {
    pub const fn new(col: i32, row: i32) -> Self {
        Self { col, row }
    }

    #[inline]
    pub fn manhattan(self, other: GridPos) -> i32 {
        (self.col - other.col).abs() + (self.row - other.row).abs()
    }

    #[inline]
    pub fn offset(self, dc: i32, dr: i32) -> Self {
        Self::new(self.col + dc, self.row + dr)
    }

    /// East, South, West, North.
    pub fn neighbors(self) -> [GridPos; 4] {
        [
            self.offset(1, 0),
            self.offset(0, 1),
            self.offset(-1, 0),
            self.offset(0, -1),
        ]
    }
}

impl fmt::Display for GridPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.col, self.row)
    }
}

impl Add for GridPos {
    type Output = GridPos;
    fn add(self, rhs: GridPos) -> GridPos {
        GridPos::new(self.col + rhs.col, self.row + rhs.row)
    }
}

impl Sub for GridPos {
    type Output = GridPos;
    fn sub(self, rhs: GridPos) -> GridPos {
        GridPos::new(self.col - rhs.col, self.row - rhs.row)
    }
}

/// Unordered pair of 4-adjacent grid positions, stored with `a < b`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Edge {
    pub a: GridPos,
    pub b: GridPos,
}

impl Edge {
    /// Returns `None` unless the two positions are exactly one step apart.
    pub fn new(p: GridPos, q: GridPos) -> Option<Self> {
        if p.manhattan(q) != 1 {
            return None;
        }
        Some(if p < q { Self { a: p, b: q } } else { Self { a: q, b: p } })
    }

    pub fn touches(&self, p: GridPos) -> bool {
        self.a == p || self.b == p
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.a, self.b)
    }
}
