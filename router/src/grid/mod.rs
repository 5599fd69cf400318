pub mod dense;
pub mod obstacle;

pub use dense::DenseGrid;
pub use obstacle::{Obstacle, ObstacleMap, blocked_edges};

use perfgrid_common::geom::coord::GridPos;

pub trait RoutingGrid {
    fn width(&self) -> i32;
    fn height(&self) -> i32;

    fn in_bounds(&self, p: GridPos) -> bool {
        p.col >= 0 && p.row >= 0 && p.col < self.width() && p.row < self.height()
    }

    /// Off-board positions are always obstacles.
    fn is_obstacle(&self, p: GridPos) -> bool;
}
