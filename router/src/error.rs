use perfgrid_common::db::error::DbError;
use perfgrid_common::geom::coord::GridPos;
use thiserror::Error;

/// Failures the caller is expected to report, not crash on.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("no route from {from} to {to}")]
    NoRouteFound { from: GridPos, to: GridPos },
    #[error("bridge {a} - {b} would cross existing geometry")]
    BridgeRejected { a: GridPos, b: GridPos },
    #[error("{a} and {b} are not one step apart")]
    NotAdjacent { a: GridPos, b: GridPos },
    #[error(transparent)]
    Db(#[from] DbError),
}

impl RouteError {
    pub fn is_placement_blocked(&self) -> bool {
        matches!(self, RouteError::Db(DbError::PlacementBlocked { .. }))
    }
}
