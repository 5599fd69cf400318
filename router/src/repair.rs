//! Keeps wiring consistent when components move.
//!
//! Given the board before and after a transform, `repair` works out the
//! connection edits in four ordered passes:
//!
//! 1. paths ending on a moved pin follow it and are re-searched,
//! 2. pins that used to share a hole and no longer do get an explicit link,
//! 3. paths now running through a moved body are rerouted around it,
//! 4. paths of different nets sharing an edge are separated.
//!
//! Implicit pin-on-pin connections are read from the two snapshots and
//! never stored.

use crate::algo::{AStar, l_route};
use crate::bridge::{bridge_crosses, is_adjacent};
use crate::connect::{net_constraints, pin_cells};
use crate::error::RouteError;
use crate::grid::{Obstacle, ObstacleMap};
use crate::net_group::{NetGroup, NetPartition, net_groups, same_net_at};
use perfgrid_common::db::core::{BoardDB, Bridge, Connection, Mutation, NetLabel, Side};
use perfgrid_common::db::footprint::{Catalog, Placement};
use perfgrid_common::db::indices::{ComponentId, ConnectionId};
use perfgrid_common::geom::coord::{Edge, GridPos};
use perfgrid_common::geom::polyline;
use perfgrid_common::util::config::{RepairConfig, RoutingConfig};
use perfgrid_common::util::profiler::ScopedTimer;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MoveRequest {
    pub component: ComponentId,
    pub placement: Placement,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RepairReport {
    pub rerouted: Vec<ConnectionId>,
    /// Paths that fell back to an L-route because no clean route exists.
    pub fallbacks: Vec<ConnectionId>,
    pub synthesized: Vec<ConnectionId>,
    pub removed: Vec<ConnectionId>,
    /// Paths that stay blocked or overlapping; kept as they were.
    pub unresolved: Vec<ConnectionId>,
}

impl RepairReport {
    pub fn is_clean(&self) -> bool {
        self.fallbacks.is_empty() && self.unresolved.is_empty()
    }
}

#[derive(Clone, Debug, Default)]
pub struct RepairPlan {
    pub mutations: Vec<Mutation>,
    pub report: RepairReport,
}

impl RepairPlan {
    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }
}

/// Validates `moves` against the board and plans the placement plus all
/// wiring edits. A blocked move fails the whole request.
pub fn plan_transform<C: Catalog + ?Sized>(
    db: &BoardDB,
    catalog: &C,
    moves: &[MoveRequest],
    routing: &RoutingConfig,
    config: &RepairConfig,
) -> Result<RepairPlan, RouteError> {
    let mut after = db.clone();
    let mut placements = Vec::new();
    for mv in moves {
        let comp = after.component_mut(mv.component)?;
        if comp.placement != Some(mv.placement) {
            placements.push(Mutation::PlaceComponent {
                component: mv.component,
                placement: mv.placement,
            });
        }
        comp.placement = Some(mv.placement);
    }
    for mv in moves {
        after.check_placement(catalog, mv.component, &mv.placement)?;
    }

    let moved: Vec<ComponentId> = moves.iter().map(|m| m.component).collect();
    let mut plan = repair(db, &after, &moved, catalog, routing, config)?;
    placements.append(&mut plan.mutations);
    plan.mutations = placements;
    Ok(plan)
}

/// Connection edits that take `before`'s wiring to a consistent state for
/// `after`'s placements. `after.connections` is expected to still be the
/// pre-move wiring.
pub fn repair<C: Catalog + ?Sized>(
    before: &BoardDB,
    after: &BoardDB,
    moved: &[ComponentId],
    catalog: &C,
    routing: &RoutingConfig,
    config: &RepairConfig,
) -> Result<RepairPlan, RouteError> {
    let mut changed = Vec::new();
    for &id in moved {
        if before.component(id)?.placement != after.component(id)?.placement {
            changed.push(id);
        }
    }
    if changed.is_empty() {
        return Ok(RepairPlan::default());
    }

    let _timer = ScopedTimer::debug("Topology repair");
    let obstacles = ObstacleMap::build(after, catalog)?;
    let pins = pin_cells(after, catalog)?;
    let nets = net_groups(&before.connections, &before.labels);

    let mut pin_map: BTreeMap<GridPos, GridPos> = BTreeMap::new();
    let mut moved_pins: HashSet<GridPos> = HashSet::new();
    for &id in &changed {
        let old = before.pin_positions(id, catalog)?;
        let new = after.pin_positions(id, catalog)?;
        for (pin, new_pos) in &new {
            moved_pins.insert(*new_pos);
            if let Some((_, old_pos)) = old.iter().find(|(n, _)| n == pin) {
                if old_pos != new_pos {
                    pin_map.entry(*old_pos).or_insert(*new_pos);
                }
            }
        }
    }

    let next_id = before
        .next_connection_id()
        .index()
        .max(after.next_connection_id().index());
    let mut repairer = Repairer {
        obstacles: &obstacles,
        pins: &pins,
        labels: &after.labels,
        routing,
        astar: AStar::new(),
        conns: after.connections.clone(),
        touched: BTreeSet::new(),
        report: RepairReport::default(),
        next_id,
    };

    repairer.follow_moved_pins(&pin_map, &nets);
    if config.synthesize_pull_apart {
        repairer.link_pulled_apart(before, after, &changed, catalog)?;
    }
    if config.reroute_blocked {
        let moved_obstacles: Vec<&Obstacle> = changed.iter().filter_map(|id| obstacles.obstacle(*id)).collect();
        repairer.reroute_blocked(&moved_obstacles, &moved_pins, &nets);
    }
    if config.reroute_overlaps {
        repairer.separate_overlaps();
    }

    let Repairer { conns, mut report, .. } = repairer;
    let mutations = diff(&before.connections, &conns, &mut report);

    log::info!(
        "Repair: {} rerouted, {} synthesized, {} removed, {} fallbacks, {} unresolved",
        report.rerouted.len(),
        report.synthesized.len(),
        report.removed.len(),
        report.fallbacks.len(),
        report.unresolved.len()
    );
    Ok(RepairPlan { mutations, report })
}

struct Repairer<'a> {
    obstacles: &'a ObstacleMap,
    pins: &'a HashSet<GridPos>,
    labels: &'a [NetLabel],
    routing: &'a RoutingConfig,
    astar: AStar,
    conns: Vec<Connection>,
    touched: BTreeSet<ConnectionId>,
    report: RepairReport,
    next_id: usize,
}

impl Repairer<'_> {
    fn position(&self, id: ConnectionId) -> Option<usize> {
        self.conns.iter().position(|c| c.id() == id)
    }

    fn search(
        &mut self,
        from: GridPos,
        to: GridPos,
        side: Side,
        group: &NetGroup,
        exclude: &HashSet<ConnectionId>,
        avoid: &HashSet<GridPos>,
    ) -> Result<Vec<GridPos>, RouteError> {
        let mut constraints = net_constraints(&self.conns, side, group, exclude, self.pins, [from, to]);
        constraints.blocked_cells.extend(avoid.iter().copied());
        let path = self
            .astar
            .search(self.obstacles, from, to, &constraints, self.routing)?;
        Ok(polyline::with_support_points(&path, self.routing.support_spacing))
    }

    /// Step 1. Endpoints on an old pin position move with the pin. Paths
    /// repaired here do not block each other.
    fn follow_moved_pins(&mut self, pin_map: &BTreeMap<GridPos, GridPos>, nets: &NetPartition) {
        let candidates: Vec<ConnectionId> = self
            .conns
            .iter()
            .filter(|c| {
                let (a, b) = c.endpoints();
                pin_map.contains_key(&a) || pin_map.contains_key(&b)
            })
            .map(|c| c.id())
            .collect();
        let exclude: HashSet<ConnectionId> = candidates.iter().copied().collect();
        let empty = NetGroup::default();
        let no_cells = HashSet::new();
        let mut removed = HashSet::new();

        for id in candidates {
            let Some(idx) = self.position(id) else {
                continue;
            };
            let conn = self.conns[idx].clone();
            let (s, e) = conn.endpoints();
            let ns = pin_map.get(&s).copied().unwrap_or(s);
            let ne = pin_map.get(&e).copied().unwrap_or(e);
            self.touched.insert(id);

            if ns == ne {
                log::debug!("{:?} collapsed onto {}; removing", id, ns);
                removed.insert(id);
                continue;
            }

            let keep_bridge = conn.is_bridge() && is_adjacent(ns, ne) && {
                let others: Vec<Connection> = self.conns.iter().filter(|c| c.id() != id).cloned().collect();
                !bridge_crosses(ns, ne, &others, conn.side())
            };
            let replacement = match &conn {
                Connection::Bridge(b) if keep_bridge => Connection::Bridge(Bridge {
                    a: ns,
                    b: ne,
                    ..b.clone()
                }),
                _ => {
                    if conn.is_bridge() {
                        log::debug!("{:?} can no longer be a bridge at {} - {}; routing a wire", id, ns, ne);
                    }
                    let group = nets.group(id).unwrap_or(&empty);
                    let points = match self.search(ns, ne, conn.side(), group, &exclude, &no_cells) {
                        Ok(points) => points,
                        Err(_) => {
                            log::warn!("No clean route for {:?} {} -> {}; using an L-route", id, ns, ne);
                            self.report.fallbacks.push(id);
                            l_route(ns, ne)
                        }
                    };
                    Connection::wire(id, conn.side(), points).with_net(conn.net().map(str::to_string))
                }
            };
            self.conns[idx] = replacement;
            self.report.rerouted.push(id);
        }
        self.conns.retain(|c| !removed.contains(&c.id()));
    }

    /// Step 2. Pins that shared a hole before the move and now sit apart
    /// get an explicit bridge or wire, unless they are still on one net.
    fn link_pulled_apart<C: Catalog + ?Sized>(
        &mut self,
        before: &BoardDB,
        after: &BoardDB,
        changed: &[ComponentId],
        catalog: &C,
    ) -> Result<(), RouteError> {
        let mut by_pos: BTreeMap<GridPos, Vec<(ComponentId, String)>> = BTreeMap::new();
        for site in before.pin_sites(catalog)? {
            by_pos.entry(site.pos).or_default().push((site.component, site.pin));
        }

        for sites in by_pos.values() {
            let distinct: HashSet<ComponentId> = sites.iter().map(|(c, _)| *c).collect();
            if distinct.len() < 2 || !sites.iter().any(|(c, _)| changed.contains(c)) {
                continue;
            }
            let mut now = Vec::with_capacity(sites.len());
            for (comp, pin) in sites {
                if let Some(pos) = after.pin_position(*comp, pin, catalog)? {
                    now.push(pos);
                }
            }
            let Some((&anchor, rest)) = now.split_first() else {
                continue;
            };
            for &other in rest {
                if other == anchor || same_net_at(&[anchor], &self.conns, self.labels).touches(other) {
                    continue;
                }
                self.synthesize(anchor, other);
            }
        }
        Ok(())
    }

    fn synthesize(&mut self, a: GridPos, b: GridPos) {
        let side = Side::default();
        let id = ConnectionId::new(self.next_id);
        self.next_id += 1;

        let conn = if is_adjacent(a, b) && !bridge_crosses(a, b, &self.conns, side) {
            Connection::bridge(id, side, a, b)
        } else {
            let group = same_net_at(&[a, b], &self.conns, self.labels);
            let points = match self.search(a, b, side, &group, &HashSet::new(), &HashSet::new()) {
                Ok(points) => points,
                Err(_) => {
                    log::warn!("No clean route to rejoin {} and {}; using an L-route", a, b);
                    self.report.fallbacks.push(id);
                    l_route(a, b)
                }
            };
            Connection::wire(id, side, points)
        };
        log::debug!("Rejoining pulled-apart pins {} and {} with {:?}", a, b, id);
        self.conns.push(conn);
        self.touched.insert(id);
        self.report.synthesized.push(id);
    }

    /// Step 3. Paths not attached to a moved pin that now run anywhere
    /// inside a moved silhouette, pins and approach lanes included, are
    /// re-searched between their own endpoints around it.
    fn reroute_blocked(&mut self, moved: &[&Obstacle], moved_pins: &HashSet<GridPos>, nets: &NetPartition) {
        let covered: HashSet<GridPos> = moved
            .iter()
            .flat_map(|o| o.bbox.cells())
            .chain(moved_pins.iter().copied())
            .collect();
        let blocked: Vec<ConnectionId> = self
            .conns
            .iter()
            .filter(|c| !self.touched.contains(&c.id()))
            .filter(|c| {
                let (a, b) = c.endpoints();
                !moved_pins.contains(&a) && !moved_pins.contains(&b)
            })
            .filter(|c| c.cells().iter().any(|p| covered.contains(p)))
            .map(|c| c.id())
            .collect();

        let empty = NetGroup::default();
        for id in blocked {
            let Some(idx) = self.position(id) else {
                continue;
            };
            let conn = self.conns[idx].clone();
            if conn.is_bridge() {
                log::warn!("Bridge {:?} is covered by a moved component", id);
                self.report.unresolved.push(id);
                continue;
            }
            let (s, e) = conn.endpoints();
            let group = nets.group(id).unwrap_or(&empty);
            let exclude: HashSet<ConnectionId> = [id].into_iter().collect();
            match self.search(s, e, conn.side(), group, &exclude, &covered) {
                Ok(points) => {
                    self.conns[idx] = Connection::wire(id, conn.side(), points).with_net(conn.net().map(str::to_string));
                    self.touched.insert(id);
                    self.report.rerouted.push(id);
                }
                Err(e) => {
                    log::warn!("{:?} stays blocked: {}", id, e);
                    self.report.unresolved.push(id);
                }
            }
        }
    }

    /// Step 4. Where two nets share an edge and at least one of the paths
    /// was touched here, the later wire is moved off.
    fn separate_overlaps(&mut self) {
        let partition = net_groups(&self.conns, self.labels);
        let mut users: BTreeMap<(u8, Edge), Vec<usize>> = BTreeMap::new();
        for (i, conn) in self.conns.iter().enumerate() {
            let side = conn.side() as u8;
            for edge in conn.edges() {
                let list = users.entry((side, edge)).or_default();
                if list.last() != Some(&i) {
                    list.push(i);
                }
            }
        }

        let mut victims: BTreeSet<usize> = BTreeSet::new();
        let mut stuck: BTreeSet<usize> = BTreeSet::new();
        for list in users.values() {
            for (k, &a) in list.iter().enumerate() {
                for &b in &list[k + 1..] {
                    let (ia, ib) = (self.conns[a].id(), self.conns[b].id());
                    if partition.same_net(ia, ib) {
                        continue;
                    }
                    if !self.touched.contains(&ia) && !self.touched.contains(&ib) {
                        continue;
                    }
                    if victims.contains(&a) || victims.contains(&b) {
                        continue;
                    }
                    if !self.conns[b].is_bridge() {
                        victims.insert(b);
                    } else if !self.conns[a].is_bridge() {
                        victims.insert(a);
                    } else {
                        stuck.insert(b);
                    }
                }
            }
        }

        for idx in stuck {
            self.report.unresolved.push(self.conns[idx].id());
        }

        let empty = NetGroup::default();
        let no_cells = HashSet::new();
        for idx in victims {
            let conn = self.conns[idx].clone();
            let id = conn.id();
            let (s, e) = conn.endpoints();
            let group = partition.group(id).unwrap_or(&empty);
            let exclude: HashSet<ConnectionId> = [id].into_iter().collect();
            match self.search(s, e, conn.side(), group, &exclude, &no_cells) {
                Ok(points) => {
                    log::debug!("Separated {:?} from an overlapping net", id);
                    self.conns[idx] = Connection::wire(id, conn.side(), points).with_net(conn.net().map(str::to_string));
                    self.touched.insert(id);
                    self.report.rerouted.push(id);
                }
                Err(_) => {
                    log::warn!("{:?} still overlaps another net", id);
                    self.report.unresolved.push(id);
                }
            }
        }
    }
}

fn diff(before: &[Connection], after: &[Connection], report: &mut RepairReport) -> Vec<Mutation> {
    let old: HashMap<ConnectionId, &Connection> = before.iter().map(|c| (c.id(), c)).collect();
    let new_ids: HashSet<ConnectionId> = after.iter().map(|c| c.id()).collect();

    let mut mutations = Vec::new();
    for conn in before {
        if !new_ids.contains(&conn.id()) {
            report.removed.push(conn.id());
            mutations.push(Mutation::RemoveConnection(conn.id()));
        }
    }
    for conn in after {
        if let Some(prev) = old.get(&conn.id()) {
            if *prev != conn {
                mutations.push(Mutation::ReplaceConnection(conn.clone()));
            }
        }
    }
    for conn in after {
        if !old.contains_key(&conn.id()) {
            mutations.push(Mutation::AddConnection(conn.clone()));
        }
    }
    mutations
}
