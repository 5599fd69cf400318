use perfgrid_common::geom::coord::GridPos;
use perfgrid_common::geom::point::Point;

/// Maps canvas coordinates (pixels) to grid units and back.
pub struct GridConverter {
    scale_x: f64,
    scale_y: f64,
    offset_x: f64,
    offset_y: f64,
    grid_w: i32,
    grid_h: i32,
}

impl GridConverter {
    /// Square pitch with the origin at pixel (0, 0).
    pub fn new(pitch: f64, grid_w: i32, grid_h: i32) -> Self {
        Self::from_steps(pitch, pitch, 0.0, 0.0, grid_w, grid_h)
    }

    pub fn from_steps(step_x: f64, step_y: f64, off_x: f64, off_y: f64, grid_w: i32, grid_h: i32) -> Self {
        Self {
            scale_x: 1.0 / step_x,
            scale_y: 1.0 / step_y,
            offset_x: off_x,
            offset_y: off_y,
            grid_w: grid_w.max(1),
            grid_h: grid_h.max(1),
        }
    }

    /// Unsnapped position in grid units.
    pub fn to_grid_space(&self, p: Point<f64>) -> Point<f64> {
        Point::new((p.x - self.offset_x) * self.scale_x, (p.y - self.offset_y) * self.scale_y)
    }

    /// Nearest hole, clamped to the board.
    pub fn to_grid(&self, p: Point<f64>) -> GridPos {
        let raw = self.to_grid_space(p);
        let col = raw.x.round().max(0.0).min((self.grid_w - 1) as f64) as i32;
        let row = raw.y.round().max(0.0).min((self.grid_h - 1) as f64) as i32;
        GridPos::new(col, row)
    }

    pub fn to_world(&self, g: GridPos) -> Point<f64> {
        Point::new(
            (g.col as f64 / self.scale_x) + self.offset_x,
            (g.row as f64 / self.scale_y) + self.offset_y,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snaps_and_clamps() {
        let conv = GridConverter::from_steps(10.0, 10.0, 5.0, 5.0, 8, 8);
        assert_eq!(conv.to_grid(Point::new(27.0, 44.0)), GridPos::new(2, 4));
        assert_eq!(conv.to_grid(Point::new(-40.0, 900.0)), GridPos::new(0, 7));
        let w = conv.to_world(GridPos::new(3, 1));
        assert_eq!((w.x, w.y), (35.0, 15.0));
        let raw = conv.to_grid_space(Point::new(26.0, 15.0));
        assert!((raw.x - 2.1).abs() < 1e-9 && (raw.y - 1.0).abs() < 1e-9);
    }
}
