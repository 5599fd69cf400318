use perfgrid_common::db::core::BoardDB;
use perfgrid_common::db::error::DbError;
use perfgrid_common::db::footprint::Catalog;
use perfgrid_common::db::indices::ComponentId;
use perfgrid_common::db::netlist::{NetDef, NetList};
use perfgrid_common::geom::coord::GridPos;
use perfgrid_common::geom::rect::GridRect;
use std::collections::{BTreeMap, BTreeSet};

/// Clique model of the net-list: a net touching `k` components adds
/// `1 / (k - 1)` between every pair of them.
#[derive(Clone, Debug, Default)]
pub struct Connectivity {
    edges: BTreeMap<(ComponentId, ComponentId), f64>,
    totals: BTreeMap<ComponentId, f64>,
}

impl Connectivity {
    pub fn from_netlist(netlist: &NetList) -> Self {
        let mut graph = Self::default();
        for net in &netlist.nets {
            let members = components_of(net);
            if members.len() < 2 {
                continue;
            }
            let w = clique_weight(members.len());
            let members: Vec<ComponentId> = members.into_iter().collect();
            for (i, &a) in members.iter().enumerate() {
                for &b in &members[i + 1..] {
                    *graph.edges.entry((a, b)).or_insert(0.0) += w;
                    *graph.totals.entry(a).or_insert(0.0) += w;
                    *graph.totals.entry(b).or_insert(0.0) += w;
                }
            }
        }
        graph
    }

    pub fn weight(&self, a: ComponentId, b: ComponentId) -> f64 {
        let key = if a <= b { (a, b) } else { (b, a) };
        self.edges.get(&key).copied().unwrap_or(0.0)
    }

    /// Sum of the weights of every edge at `id`.
    pub fn total_weight(&self, id: ComponentId) -> f64 {
        self.totals.get(&id).copied().unwrap_or(0.0)
    }
}

pub(crate) fn components_of(net: &NetDef) -> BTreeSet<ComponentId> {
    net.connections.iter().map(|p| p.component).collect()
}

pub(crate) fn clique_weight(members: usize) -> f64 {
    1.0 / (members.max(2) - 1) as f64
}

/// Half-perimeter of the pins' bounding box, in grid steps.
pub fn net_hpwl(pins: &[GridPos]) -> i64 {
    match GridRect::hull(pins.iter().copied()) {
        Some(r) if pins.len() >= 2 => (r.width() - 1 + r.height() - 1) as i64,
        _ => 0,
    }
}

/// HPWL summed over every net, counting only placed pins.
pub fn total_hpwl<C: Catalog + ?Sized>(db: &BoardDB, catalog: &C, netlist: &NetList) -> Result<i64, DbError> {
    let mut total = 0;
    for net in &netlist.nets {
        let mut pins = Vec::with_capacity(net.connections.len());
        for pin_ref in &net.connections {
            if let Some(pos) = db.pin_position(pin_ref.component, &pin_ref.pin, catalog)? {
                pins.push(pos);
            }
        }
        total += net_hpwl(&pins);
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use perfgrid_common::db::footprint::{Library, Placement};
    use perfgrid_common::db::netlist::PinRef;

    fn net(name: &str, pins: &[(usize, &str)]) -> NetDef {
        NetDef {
            name: name.to_string(),
            connections: pins.iter().map(|&(c, p)| PinRef::new(ComponentId::new(c), p)).collect(),
        }
    }

    #[test]
    fn clique_weights_accumulate() {
        let netlist = NetList::new(vec![
            net("A", &[(0, "1"), (1, "1")]),
            net("B", &[(0, "2"), (1, "2"), (2, "1")]),
            // Both pins on one part: no edge.
            net("C", &[(2, "1"), (2, "2")]),
        ]);
        let graph = Connectivity::from_netlist(&netlist);
        let (c0, c1, c2) = (ComponentId::new(0), ComponentId::new(1), ComponentId::new(2));
        assert!((graph.weight(c1, c0) - 1.5).abs() < 1e-9);
        assert!((graph.weight(c0, c2) - 0.5).abs() < 1e-9);
        assert!((graph.total_weight(c0) - 2.0).abs() < 1e-9);
        assert!((graph.total_weight(c2) - 1.0).abs() < 1e-9);
        assert_eq!(graph.total_weight(ComponentId::new(7)), 0.0);
    }

    #[test]
    fn hpwl_ignores_unplaced_pins() {
        let lib = Library::standard();
        let mut db = BoardDB::new(20, 20);
        let r1 = db.add_component("R1", "AXIAL-0.4", Some(Placement::at(GridPos::new(1, 1))));
        let r2 = db.add_component("R2", "AXIAL-0.4", Some(Placement::at(GridPos::new(6, 4))));
        let r3 = db.add_component("R3", "AXIAL-0.4", None);
        let netlist = NetList::new(vec![
            net("N", &[(r1.index(), "2"), (r2.index(), "1"), (r3.index(), "1")]),
        ]);
        // (4,1) to (6,4).
        assert_eq!(total_hpwl(&db, &lib, &netlist).unwrap(), 5);
        assert_eq!(net_hpwl(&[GridPos::new(3, 3)]), 0);
    }
}
