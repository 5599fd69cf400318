use super::coord::{Edge, GridPos};
use super::rect::GridRect;

/// Axis-aligned run between two grid positions on the same row or column.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Segment {
    pub p1: GridPos,
    pub p2: GridPos,
}

impl Segment {
    pub fn new(p1: GridPos, p2: GridPos) -> Self {
        Self { p1, p2 }
    }

    pub fn len(&self) -> i32 {
        self.p1.manhattan(self.p2)
    }

    pub fn is_empty(&self) -> bool {
        self.p1 == self.p2
    }

    pub fn bounds(&self) -> GridRect {
        GridRect::new(self.p1, self.p2)
    }

    pub fn contains(&self, p: GridPos) -> bool {
        self.bounds().contains(p)
    }

    pub fn is_endpoint(&self, p: GridPos) -> bool {
        self.p1 == p || self.p2 == p
    }

    /// Cells from `p1` to `p2`, both included.
    pub fn cells(&self) -> impl Iterator<Item = GridPos> + use<> {
        let dc = (self.p2.col - self.p1.col).signum();
        let dr = (self.p2.row - self.p1.row).signum();
        let start = self.p1;
        (0..=self.len()).map(move |i| start.offset(dc * i, dr * i))
    }

    pub fn unit_edges(&self) -> impl Iterator<Item = Edge> + use<> {
        let cells: Vec<GridPos> = self.cells().collect();
        (1..cells.len()).filter_map(move |i| Edge::new(cells[i - 1], cells[i]))
    }

    /// Shared cells of two axis-aligned segments. For axis-aligned runs the
    /// bounding-box intersection is exactly the geometric intersection.
    pub fn intersection(&self, other: &Segment) -> Option<GridRect> {
        self.bounds().intersection(&other.bounds())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perpendicular_intersection_is_single_cell() {
        let h = Segment::new(GridPos::new(0, 2), GridPos::new(5, 2));
        let v = Segment::new(GridPos::new(3, 0), GridPos::new(3, 4));
        let x = h.intersection(&v).unwrap();
        assert_eq!(x.min, GridPos::new(3, 2));
        assert_eq!(x.max, GridPos::new(3, 2));
        assert!(h.intersection(&Segment::new(GridPos::new(0, 3), GridPos::new(5, 3))).is_none());
    }

    #[test]
    fn cells_walk_in_direction() {
        let s = Segment::new(GridPos::new(4, 1), GridPos::new(1, 1));
        let cells: Vec<GridPos> = s.cells().collect();
        assert_eq!(cells.first(), Some(&GridPos::new(4, 1)));
        assert_eq!(cells.last(), Some(&GridPos::new(1, 1)));
        assert_eq!(cells.len(), 4);
        assert_eq!(s.unit_edges().count(), 3);
    }
}
