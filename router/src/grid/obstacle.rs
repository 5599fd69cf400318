//! Component silhouettes in routing terms: a blocking box per placed
//! component with the pin approach lanes carved back out.

use super::RoutingGrid;
use super::dense::DenseGrid;
use perfgrid_common::db::core::{BoardDB, Connection, Side};
use perfgrid_common::db::error::DbError;
use perfgrid_common::db::footprint::{Catalog, Footprint, Placement};
use perfgrid_common::db::indices::{ComponentId, ConnectionId};
use perfgrid_common::geom::coord::{Edge, GridPos};
use perfgrid_common::geom::rect::GridRect;
use std::collections::HashSet;

#[derive(Clone, Debug)]
pub struct Obstacle {
    pub component: ComponentId,
    pub bbox: GridRect,
    pub allowed: HashSet<GridPos>,
}

impl Obstacle {
    pub fn new(component: ComponentId, footprint: &Footprint, placement: &Placement) -> Self {
        let bbox = footprint.bbox(placement);
        let mut allowed = HashSet::new();
        for (_, pin) in footprint.pin_positions(placement) {
            allowed.extend(approach_corridor(&bbox, pin));
        }
        Self {
            component,
            bbox,
            allowed,
        }
    }

    #[inline]
    pub fn blocks(&self, p: GridPos) -> bool {
        self.bbox.contains(p) && !self.allowed.contains(&p)
    }

    /// Cells this obstacle blocks.
    pub fn blocked_cells(&self) -> impl Iterator<Item = GridPos> + '_ {
        self.bbox.cells().filter(|c| !self.allowed.contains(c))
    }
}

/// Pin cell plus the straight run to the nearest side of the box. Ties go
/// West, East, North, South.
fn approach_corridor(bbox: &GridRect, pin: GridPos) -> Vec<GridPos> {
    let options = [
        (pin.col - bbox.min.col, -1, 0),
        (bbox.max.col - pin.col, 1, 0),
        (pin.row - bbox.min.row, 0, -1),
        (bbox.max.row - pin.row, 0, 1),
    ];
    let mut best = options[0];
    for opt in &options[1..] {
        if opt.0 < best.0 {
            best = *opt;
        }
    }
    let (len, dc, dr) = best;
    (0..=len.max(0)).map(|i| pin.offset(dc * i, dr * i)).collect()
}

/// Obstacles for one snapshot plus a bitmap of every blocked cell.
pub struct ObstacleMap {
    obstacles: Vec<Obstacle>,
    grid: DenseGrid,
}

impl ObstacleMap {
    pub fn build<C: Catalog + ?Sized>(db: &BoardDB, catalog: &C) -> Result<Self, DbError> {
        let mut obstacles = Vec::new();
        for comp in &db.components {
            let Some(placement) = comp.placement else {
                continue;
            };
            let fp = db.footprint_of(comp.id, catalog)?;
            obstacles.push(Obstacle::new(comp.id, fp, &placement));
        }

        let mut grid = DenseGrid::new(db.width, db.height);
        for obs in &obstacles {
            for cell in obs.blocked_cells() {
                grid.set_obstacle(cell);
            }
        }

        log::debug!(
            "Obstacle map: {} obstacles, {} blocked cells",
            obstacles.len(),
            grid.num_obstacles()
        );
        Ok(Self { obstacles, grid })
    }

    pub fn obstacles(&self) -> &[Obstacle] {
        &self.obstacles
    }

    pub fn obstacle(&self, component: ComponentId) -> Option<&Obstacle> {
        self.obstacles.iter().find(|o| o.component == component)
    }

    pub fn grid(&self) -> &DenseGrid {
        &self.grid
    }
}

impl RoutingGrid for ObstacleMap {
    fn width(&self) -> i32 {
        self.grid.width()
    }
    fn height(&self) -> i32 {
        self.grid.height()
    }
    fn is_obstacle(&self, p: GridPos) -> bool {
        self.grid.is_obstacle(p)
    }
}

/// Edges already occupied by routed connections on `side`, skipping `exclude`.
pub fn blocked_edges(connections: &[Connection], side: Side, exclude: &HashSet<ConnectionId>) -> HashSet<Edge> {
    connections
        .iter()
        .filter(|c| c.side() == side && !exclude.contains(&c.id()))
        .flat_map(|c| c.edges())
        .collect()
}
