use crate::algo::AStar;
use crate::bridge::{bridge_crosses, is_adjacent};
use crate::connect::{net_constraints, pin_cells};
use crate::error::RouteError;
use crate::grid::ObstacleMap;
use crate::net_group::same_net_at;
use perfgrid_common::db::core::{BoardDB, Connection, Mutation};
use perfgrid_common::db::footprint::Catalog;
use perfgrid_common::db::indices::ConnectionId;
use perfgrid_common::db::netlist::{NetDef, NetList};
use perfgrid_common::geom::coord::GridPos;
use perfgrid_common::geom::polyline;
use perfgrid_common::geom::rect::GridRect;
use perfgrid_common::util::config::{AutorouteConfig, NetOrdering, RoutingConfig};
use perfgrid_common::util::profiler::ScopedTimer;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::collections::HashSet;

#[derive(Clone, Debug, Default)]
pub struct AutorouteResult {
    /// Connections created by this run.
    pub connections: Vec<Connection>,
    pub mutations: Vec<Mutation>,
    pub routed: usize,
    pub failed: usize,
    pub failed_nets: Vec<String>,
}

struct NetJob {
    index: usize,
    name: String,
    pins: Vec<GridPos>,
}

impl NetJob {
    fn span(&self) -> i64 {
        GridRect::hull(self.pins.iter().copied())
            .map(|r| (r.width() + r.height()) as i64)
            .unwrap_or(0)
    }
}

/// Routes every net of `netlist` with two or more pin references. A net
/// gets all of its connections or none.
pub fn route<C: Catalog + ?Sized>(
    db: &BoardDB,
    catalog: &C,
    netlist: &NetList,
    options: &AutorouteConfig,
    routing: &RoutingConfig,
) -> Result<AutorouteResult, RouteError> {
    let _timer = ScopedTimer::new("Autorouting");
    let mut result = AutorouteResult::default();

    let mut working: Vec<Connection> = if options.clear_existing {
        for conn in &db.connections {
            result.mutations.push(Mutation::RemoveConnection(conn.id()));
        }
        Vec::new()
    } else {
        db.connections.clone()
    };

    let obstacles = ObstacleMap::build(db, catalog)?;
    let all_pins = pin_cells(db, catalog)?;

    let mut failed: Vec<(usize, String)> = Vec::new();
    let mut pending: Vec<NetJob> = Vec::new();
    for (index, net) in netlist.routable() {
        match resolve(db, catalog, net) {
            Some(pins) => pending.push(NetJob {
                index,
                name: net.name.clone(),
                pins,
            }),
            None => {
                log::warn!("Net {} has unresolved pins; skipping", net.name);
                failed.push((index, net.name.clone()));
            }
        }
    }
    let total = pending.len() + failed.len();

    match options.ordering {
        NetOrdering::ShortestFirst => pending.sort_by_key(|j| (j.span(), j.index)),
        NetOrdering::FewestPinsFirst => pending.sort_by_key(|j| (j.pins.len(), j.index)),
        NetOrdering::Given => {}
    }

    let mut next_id = db.next_connection_id().index();
    let mut astar = AStar::new();
    let mut rng = StdRng::seed_from_u64(options.seed);
    let passes = options.max_passes.max(1);

    for pass in 0..passes {
        let mut retry = Vec::new();
        for job in pending {
            match route_net(&job, &working, &obstacles, &all_pins, db, options, routing, &mut astar, &mut next_id) {
                Ok(conns) => {
                    log::debug!("Net {} routed with {} connection(s)", job.name, conns.len());
                    for conn in conns {
                        result.mutations.push(Mutation::AddConnection(conn.clone()));
                        result.connections.push(conn.clone());
                        working.push(conn);
                    }
                    result.routed += 1;
                }
                Err(e) => {
                    log::debug!("Net {} failed in pass {}: {}", job.name, pass + 1, e);
                    retry.push(job);
                }
            }
        }
        log::info!(
            "Pass {}/{}: {} routed, {} left",
            pass + 1,
            passes,
            result.routed,
            retry.len()
        );
        pending = retry;
        if pending.is_empty() {
            break;
        }
        pending.shuffle(&mut rng);
    }

    failed.extend(pending.into_iter().map(|j| (j.index, j.name)));
    failed.sort();
    result.failed = failed.len();
    result.failed_nets = failed.into_iter().map(|(_, name)| name).collect();
    debug_assert_eq!(result.routed + result.failed, total);

    log::info!(
        "Autorouter: {} of {} nets routed, {} failed",
        result.routed,
        total,
        result.failed
    );
    Ok(result)
}

/// Distinct pin positions of a net, or `None` when any reference does not
/// resolve to a placed pin.
fn resolve<C: Catalog + ?Sized>(db: &BoardDB, catalog: &C, net: &NetDef) -> Option<Vec<GridPos>> {
    let mut pins = Vec::with_capacity(net.connections.len());
    for pin_ref in &net.connections {
        let pos = db.pin_position(pin_ref.component, &pin_ref.pin, catalog).ok()??;
        if !pins.contains(&pos) {
            pins.push(pos);
        }
    }
    Some(pins)
}

/// Joins the pins one at a time, always taking the unconnected pin closest
/// to what is already connected.
#[allow(clippy::too_many_arguments)]
fn route_net(
    job: &NetJob,
    working: &[Connection],
    obstacles: &ObstacleMap,
    all_pins: &HashSet<GridPos>,
    db: &BoardDB,
    options: &AutorouteConfig,
    routing: &RoutingConfig,
    astar: &mut AStar,
    next_id: &mut usize,
) -> Result<Vec<Connection>, RouteError> {
    let side = options.side;
    let mut local: Vec<Connection> = working.to_vec();
    let mut created = Vec::new();
    let mut id = *next_id;

    let Some(&first) = job.pins.first() else {
        return Ok(created);
    };
    let mut connected: Vec<GridPos> = vec![first];

    loop {
        let group = same_net_at(&connected, &local, &db.labels);
        let remaining: Vec<GridPos> = job.pins.iter().copied().filter(|p| !group.touches(*p)).collect();
        if remaining.is_empty() {
            break;
        }

        // Attach points: connection endpoints and pins already on the net.
        let mut best: Option<(i32, GridPos, GridPos)> = None;
        for &target in &remaining {
            for &source in &group.points {
                let d = source.manhattan(target);
                if best.is_none_or(|(bd, _, _)| d < bd) {
                    best = Some((d, source, target));
                }
            }
        }
        let Some((_, source, target)) = best else {
            break;
        };

        let conn_id = ConnectionId::new(id);
        let conn = if options.use_bridges && is_adjacent(source, target) && !bridge_crosses(source, target, &local, side) {
            Connection::bridge(conn_id, side, source, target)
        } else {
            let constraints = net_constraints(&local, side, &group, &HashSet::new(), all_pins, [source, target]);
            let path = astar.search(obstacles, source, target, &constraints, routing)?;
            Connection::wire(conn_id, side, polyline::with_support_points(&path, routing.support_spacing))
        };
        let conn = conn.with_net(Some(job.name.clone()));

        id += 1;
        local.push(conn.clone());
        created.push(conn);
        connected.push(target);
    }

    *next_id = id;
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use perfgrid_common::db::core::Side;
    use perfgrid_common::db::footprint::{Library, Placement};
    use perfgrid_common::db::netlist::PinRef;

    fn p(c: i32, r: i32) -> GridPos {
        GridPos::new(c, r)
    }

    #[test]
    fn adjacent_pins_become_a_bridge() {
        let lib = Library::standard();
        let mut db = BoardDB::new(10, 10);
        let j1 = db.add_component("J1", "HEADER-1x2", Some(Placement::at(p(2, 1))));
        let j2 = db.add_component("J2", "HEADER-1x2", Some(Placement::at(p(2, 3))));
        let netlist = NetList::new(vec![NetDef {
            name: "N1".to_string(),
            connections: vec![PinRef::new(j1, "2"), PinRef::new(j2, "1")],
        }]);
        let out = route(&db, &lib, &netlist, &AutorouteConfig::default(), &RoutingConfig::default()).unwrap();
        assert_eq!((out.routed, out.failed), (1, 0));
        assert_eq!(out.connections.len(), 1);
        assert!(out.connections[0].is_bridge());
        assert_eq!(out.connections[0].net(), Some("N1"));
    }

    #[test]
    fn multi_pin_net_is_spanned() {
        let lib = Library::standard();
        let mut db = BoardDB::new(20, 12);
        let r1 = db.add_component("R1", "AXIAL-0.4", Some(Placement::at(p(1, 1))));
        let r2 = db.add_component("R2", "AXIAL-0.4", Some(Placement::at(p(1, 5))));
        let r3 = db.add_component("R3", "AXIAL-0.4", Some(Placement::at(p(10, 8))));
        let netlist = NetList::new(vec![NetDef {
            name: "GND".to_string(),
            connections: vec![PinRef::new(r1, "2"), PinRef::new(r2, "2"), PinRef::new(r3, "1")],
        }]);
        let out = route(&db, &lib, &netlist, &AutorouteConfig::default(), &RoutingConfig::default()).unwrap();
        assert_eq!(out.routed, 1);
        assert_eq!(out.connections.len(), 2);

        db.apply(&out.mutations).unwrap();
        let group = same_net_at(&[p(4, 1)], &db.connections, &db.labels);
        assert!(group.touches(p(4, 5)) && group.touches(p(10, 8)));
        assert!(crate::net_group::net_groups(&db.connections, &db.labels).groups.len() == 1);
    }

    #[test]
    fn already_joined_net_counts_as_routed() {
        let lib = Library::standard();
        let mut db = BoardDB::new(20, 10);
        let r1 = db.add_component("R1", "AXIAL-0.4", Some(Placement::at(p(2, 2))));
        let r2 = db.add_component("R2", "AXIAL-0.4", Some(Placement::at(p(5, 2))));
        db.connections.push(Connection::wire(ConnectionId::new(0), Side::Top, vec![p(2, 2), p(2, 6)]));
        let netlist = NetList::new(vec![
            // Pin-on-pin: R1.2 and R2.1 share (5, 2).
            NetDef {
                name: "A".to_string(),
                connections: vec![PinRef::new(r1, "2"), PinRef::new(r2, "1")],
            },
            NetDef {
                name: "SOLO".to_string(),
                connections: vec![PinRef::new(r2, "2")],
            },
        ]);
        let out = route(&db, &lib, &netlist, &AutorouteConfig::default(), &RoutingConfig::default()).unwrap();
        assert_eq!((out.routed, out.failed), (1, 0));
        assert!(out.mutations.is_empty());
    }

    #[test]
    fn clear_existing_removes_old_wiring() {
        let lib = Library::standard();
        let mut db = BoardDB::new(10, 10);
        db.connections.push(Connection::wire(ConnectionId::new(4), Side::Top, vec![p(0, 0), p(0, 6)]));
        let options = AutorouteConfig {
            clear_existing: true,
            ..AutorouteConfig::default()
        };
        let out = route(&db, &lib, &NetList::default(), &options, &RoutingConfig::default()).unwrap();
        assert_eq!(out.mutations, vec![Mutation::RemoveConnection(ConnectionId::new(4))]);
        db.apply(&out.mutations).unwrap();
        assert!(db.connections.is_empty());
    }
}
