//! Single user-drawn connections: bridge when possible, routed wire otherwise.

use crate::algo::{AStar, Constraints};
use crate::bridge::{bridge_crosses, is_adjacent};
use crate::error::RouteError;
use crate::grid::{ObstacleMap, blocked_edges};
use crate::net_group::{NetGroup, same_net_at};
use perfgrid_common::db::core::{BoardDB, Connection, Mutation, Side};
use perfgrid_common::db::error::DbError;
use perfgrid_common::db::footprint::Catalog;
use perfgrid_common::db::indices::ConnectionId;
use perfgrid_common::geom::coord::{Edge, GridPos};
use perfgrid_common::geom::polyline;
use perfgrid_common::util::config::RoutingConfig;
use std::collections::HashSet;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectMode {
    /// Bridge for adjacent points, wire otherwise.
    #[default]
    Auto,
    Wire,
    Bridge,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Warning {
    /// The bridge would cross existing geometry; a wire was routed instead.
    BridgeRejected { a: GridPos, b: GridPos },
}

#[derive(Clone, Debug)]
pub struct ConnectOutcome {
    pub connection: Connection,
    pub warnings: Vec<Warning>,
}

impl ConnectOutcome {
    pub fn mutation(&self) -> Mutation {
        Mutation::AddConnection(self.connection.clone())
    }
}

/// Positions of every placed pin.
pub fn pin_cells<C: Catalog + ?Sized>(db: &BoardDB, catalog: &C) -> Result<HashSet<GridPos>, DbError> {
    Ok(db.pin_sites(catalog)?.into_iter().map(|s| s.pos).collect())
}

/// Occupancy rules for routing one connection of `group` between `ends`.
/// Connections in `exclude` are being replaced and count for nothing. An
/// edge of the own net stays usable only while no other net also runs on it.
pub fn net_constraints(
    connections: &[Connection],
    side: Side,
    group: &NetGroup,
    exclude: &HashSet<ConnectionId>,
    pins: &HashSet<GridPos>,
    ends: [GridPos; 2],
) -> Constraints {
    let live = move || {
        connections
            .iter()
            .filter(move |c| c.side() == side && !exclude.contains(&c.id()))
    };
    let foreign: HashSet<Edge> = live()
        .filter(|c| !group.contains(c.id()))
        .flat_map(|c| c.edges())
        .collect();
    Constraints {
        blocked_edges: blocked_edges(connections, side, exclude),
        same_net_edges: live()
            .filter(|c| group.contains(c.id()))
            .flat_map(|c| c.edges())
            .filter(|e| !foreign.contains(e))
            .collect(),
        blocked_cells: pins
            .iter()
            .filter(|p| !group.touches(**p) && !ends.contains(p))
            .copied()
            .collect(),
    }
}

pub fn plan_connection<C: Catalog + ?Sized>(
    db: &BoardDB,
    catalog: &C,
    a: GridPos,
    b: GridPos,
    mode: ConnectMode,
    side: Side,
    config: &RoutingConfig,
) -> Result<ConnectOutcome, RouteError> {
    let id = db.next_connection_id();
    let mut warnings = Vec::new();

    let want_bridge = match mode {
        ConnectMode::Bridge => {
            if !is_adjacent(a, b) {
                return Err(RouteError::NotAdjacent { a, b });
            }
            true
        }
        ConnectMode::Auto => config.prefer_bridges && is_adjacent(a, b),
        ConnectMode::Wire => false,
    };

    if want_bridge {
        if !bridge_crosses(a, b, &db.connections, side) {
            return Ok(ConnectOutcome {
                connection: Connection::bridge(id, side, a, b),
                warnings,
            });
        }
        if mode == ConnectMode::Bridge {
            return Err(RouteError::BridgeRejected { a, b });
        }
        log::warn!("Bridge {} - {} crosses existing geometry; routing a wire instead", a, b);
        warnings.push(Warning::BridgeRejected { a, b });
    }

    let obstacles = ObstacleMap::build(db, catalog)?;
    let group = same_net_at(&[a, b], &db.connections, &db.labels);
    let pins = pin_cells(db, catalog)?;
    let constraints = net_constraints(&db.connections, side, &group, &HashSet::new(), &pins, [a, b]);

    let path = AStar::new().search(&obstacles, a, b, &constraints, config)?;
    let points = polyline::with_support_points(&path, config.support_spacing);
    Ok(ConnectOutcome {
        connection: Connection::wire(id, side, points),
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use perfgrid_common::db::footprint::{Library, Placement};
    use perfgrid_common::db::footprint::Rotation;

    fn p(c: i32, r: i32) -> GridPos {
        GridPos::new(c, r)
    }

    /// Two headers whose pins sit at (2,2) and (2,3).
    fn adjacent_pins() -> (BoardDB, Library) {
        let mut db = BoardDB::new(10, 10);
        db.add_component("J1", "HEADER-1x2", Some(Placement::at(p(2, 1))));
        db.add_component("J2", "HEADER-1x2", Some(Placement::at(p(2, 3))));
        (db, Library::standard())
    }

    #[test]
    fn adjacent_pins_prefer_bridge() {
        let (db, lib) = adjacent_pins();
        let cfg = RoutingConfig::default();
        let out = plan_connection(&db, &lib, p(2, 2), p(2, 3), ConnectMode::Auto, Side::Top, &cfg).unwrap();
        assert!(out.connection.is_bridge());
        assert!(out.warnings.is_empty());

        let wire = plan_connection(&db, &lib, p(2, 2), p(2, 3), ConnectMode::Wire, Side::Top, &cfg).unwrap();
        assert_eq!(wire.connection.points(), vec![p(2, 2), p(2, 3)]);
        assert!(!wire.connection.is_bridge());
    }

    #[test]
    fn crossed_bridge_falls_back_to_wire_with_warning() {
        let (mut db, lib) = adjacent_pins();
        // A trace along row 2 passes through (2,2) from the side.
        db.connections.push(Connection::wire(ConnectionId::new(0), Side::Top, vec![p(0, 2), p(2, 2), p(2, 0)]));
        let cfg = RoutingConfig::default();
        let out = plan_connection(&db, &lib, p(2, 2), p(3, 2), ConnectMode::Auto, Side::Top, &cfg);
        // (2,2) is a corner of that trace, which counts as a shared endpoint.
        assert!(out.unwrap().connection.is_bridge());

        db.connections[0] = Connection::wire(ConnectionId::new(0), Side::Top, vec![p(0, 2), p(5, 2)]);
        let out = plan_connection(&db, &lib, p(2, 2), p(2, 3), ConnectMode::Auto, Side::Top, &cfg).unwrap();
        assert!(!out.connection.is_bridge());
        assert_eq!(out.warnings, vec![Warning::BridgeRejected { a: p(2, 2), b: p(2, 3) }]);

        let err = plan_connection(&db, &lib, p(2, 2), p(2, 3), ConnectMode::Bridge, Side::Top, &cfg);
        assert!(matches!(err, Err(RouteError::BridgeRejected { .. })));
    }

    #[test]
    fn explicit_bridge_needs_adjacent_points() {
        let (db, lib) = adjacent_pins();
        let err = plan_connection(&db, &lib, p(2, 2), p(5, 5), ConnectMode::Bridge, Side::Top, &RoutingConfig::default());
        assert!(matches!(err, Err(RouteError::NotAdjacent { .. })));
    }

    #[test]
    fn replaced_and_shared_edges_are_not_own_net() {
        let conns = vec![
            Connection::wire(ConnectionId::new(0), Side::Top, vec![p(0, 3), p(9, 3)]),
            Connection::wire(ConnectionId::new(1), Side::Top, vec![p(2, 3), p(6, 3)]),
            Connection::wire(ConnectionId::new(2), Side::Top, vec![p(6, 3), p(6, 6)]),
        ];
        let mut group = NetGroup::default();
        group.connections.extend([ConnectionId::new(1), ConnectionId::new(2)]);
        let exclude: HashSet<ConnectionId> = [ConnectionId::new(1)].into_iter().collect();

        let c = net_constraints(&conns, Side::Top, &group, &exclude, &HashSet::new(), [p(2, 3), p(6, 3)]);
        let row_edge = Edge::new(p(3, 3), p(4, 3)).unwrap();
        let column_edge = Edge::new(p(6, 4), p(6, 5)).unwrap();
        assert!(c.blocked_edges.contains(&row_edge));
        assert!(!c.same_net_edges.contains(&row_edge));
        assert!(c.same_net_edges.contains(&column_edge));
    }

    #[test]
    fn wire_avoids_component_body_and_foreign_pins() {
        let lib = Library::standard();
        let mut db = BoardDB::new(12, 8);
        // Vertical resistor between the two endpoints.
        db.add_component("R1", "AXIAL-0.4", Some(Placement::at(p(5, 1)).rotated(Rotation::R90)));
        let cfg = RoutingConfig::default();
        let out = plan_connection(&db, &lib, p(2, 2), p(8, 2), ConnectMode::Auto, Side::Top, &cfg).unwrap();
        let cells = out.connection.cells();
        for r in 1..=4 {
            assert!(!cells.contains(&p(5, r)));
        }
        assert!(polyline::is_canonical(&out.connection.points()));
    }
}
