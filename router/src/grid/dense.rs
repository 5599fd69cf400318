use super::RoutingGrid;
use perfgrid_common::geom::coord::GridPos;

/// One flag per board cell, row-major.
#[derive(Clone, Debug)]
pub struct DenseGrid {
    width: i32,
    height: i32,
    obstacles: Vec<bool>,
}

impl DenseGrid {
    pub fn new(width: i32, height: i32) -> Self {
        let width = width.max(0);
        let height = height.max(0);
        let size = (width as usize) * (height as usize);

        if size > 50_000_000 {
            log::warn!("Allocating large DenseGrid: {} cells.", size);
        }

        Self {
            width,
            height,
            obstacles: vec![false; size],
        }
    }

    #[inline(always)]
    fn index(&self, p: GridPos) -> usize {
        (p.row as usize) * (self.width as usize) + (p.col as usize)
    }

    pub fn set_obstacle(&mut self, p: GridPos) {
        if self.in_bounds(p) {
            let idx = self.index(p);
            self.obstacles[idx] = true;
        }
    }

    pub fn num_obstacles(&self) -> usize {
        self.obstacles.iter().filter(|&&b| b).count()
    }
}

impl RoutingGrid for DenseGrid {
    fn width(&self) -> i32 {
        self.width
    }
    fn height(&self) -> i32 {
        self.height
    }

    fn is_obstacle(&self, p: GridPos) -> bool {
        if !self.in_bounds(p) {
            return true;
        }
        self.obstacles[self.index(p)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn off_board_is_blocked() {
        let mut grid = DenseGrid::new(4, 3);
        assert!(!grid.is_obstacle(GridPos::new(3, 2)));
        assert!(grid.is_obstacle(GridPos::new(4, 0)));
        assert!(grid.is_obstacle(GridPos::new(0, -1)));
        grid.set_obstacle(GridPos::new(1, 1));
        assert!(grid.is_obstacle(GridPos::new(1, 1)));
        grid.set_obstacle(GridPos::new(9, 9));
        assert_eq!(grid.num_obstacles(), 1);
    }
}
