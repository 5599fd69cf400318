use crate::legalize::TetrisLegalizer;
use crate::wirelength::{Connectivity, clique_weight, components_of, net_hpwl};
use perfgrid_common::db::core::{BoardDB, Mutation};
use perfgrid_common::db::error::DbError;
use perfgrid_common::db::footprint::{Catalog, Footprint, Placement, Rotation};
use perfgrid_common::db::indices::ComponentId;
use perfgrid_common::db::netlist::NetList;
use perfgrid_common::geom::coord::GridPos;
use perfgrid_common::geom::point::Point;
use perfgrid_common::geom::rect::GridRect;
use perfgrid_common::geom::rtree::SpatialIndex;
use perfgrid_common::util::config::{PlacementConfig, PlacementMode};
use perfgrid_common::util::profiler::ScopedTimer;
use std::collections::BTreeMap;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LayoutResult {
    pub placements: BTreeMap<ComponentId, Placement>,
    /// Components no slot was found for, ascending.
    pub failed: Vec<ComponentId>,
}

impl LayoutResult {
    pub fn mutations(&self) -> Vec<Mutation> {
        self.placements
            .iter()
            .map(|(&component, &placement)| Mutation::PlaceComponent { component, placement })
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

struct ModeRules {
    spacing: i32,
    rotations: &'static [Rotation],
    row_weight: f64,
}

impl ModeRules {
    fn new(mode: PlacementMode, config: &PlacementConfig) -> Self {
        match mode {
            PlacementMode::Wirelength => Self {
                spacing: config.wirelength_spacing.max(0),
                rotations: &[Rotation::R0, Rotation::R90],
                row_weight: config.row_weight,
            },
            PlacementMode::Solderability => Self {
                spacing: config.solder_spacing.max(0),
                rotations: &[Rotation::R0],
                row_weight: config.row_weight * 2.0,
            },
        }
    }
}

struct Candidate {
    cost: f64,
    placement: Placement,
    hull: GridRect,
}

/// Places every component of `unplaced`, one at a time, most connected
/// first. Components already on the board stay where they are; listed
/// components that were placed are placed again. Hulls keep the mode's
/// spacing from each other, so placed parts never overlap.
pub fn layout<C: Catalog + ?Sized>(
    db: &BoardDB,
    catalog: &C,
    netlist: &NetList,
    unplaced: &[ComponentId],
    mode: PlacementMode,
    config: &PlacementConfig,
) -> Result<LayoutResult, DbError> {
    let _timer = ScopedTimer::new("Placement");
    let rules = ModeRules::new(mode, config);

    let mut order = unplaced.to_vec();
    order.sort_unstable();
    order.dedup();

    let mut trial = db.clone();
    for &id in &order {
        trial.component_mut(id)?.placement = None;
    }

    let mut legalizer = TetrisLegalizer::new(db.width, db.height);
    let mut hulls = SpatialIndex::new();
    for comp in &trial.components {
        if let Some(placement) = comp.placement {
            let hull = trial.footprint_of(comp.id, catalog)?.bbox(&placement);
            legalizer.block(hull.expand(rules.spacing));
            hulls.insert(hull, comp.id.index());
        }
    }

    let graph = Connectivity::from_netlist(netlist);
    order.sort_by(|a, b| {
        graph
            .total_weight(*b)
            .total_cmp(&graph.total_weight(*a))
            .then(a.cmp(b))
    });
    log::info!("Placing {} component(s), mode {:?}, spacing {}", order.len(), mode, rules.spacing);

    let centre = Point::new((db.width - 1) as f64 / 2.0, (db.height - 1) as f64 / 2.0);
    let mut result = LayoutResult::default();

    for id in order {
        let fp = trial.footprint_of(id, catalog)?;
        let target = neighbour_centroid(&trial, catalog, netlist, id)?.unwrap_or(centre);

        let mut candidates = Vec::new();
        for &rotation in rules.rotations {
            let shape = fp.bbox(&Placement::at(GridPos::new(0, 0)).rotated(rotation));
            let (w, h) = (shape.width(), shape.height());
            let want = GridPos::new(
                (target.x - (w - 1) as f64 / 2.0).round() as i32,
                (target.y - (h - 1) as f64 / 2.0).round() as i32,
            );
            for slot in legalizer.candidates(want, w, h, config.search_radius) {
                let placement = Placement::at(slot.min - shape.min).rotated(rotation);
                let displacement = slot.col_dist as f64 + rules.row_weight * slot.row_dist as f64;
                let wirelength = local_hpwl(&trial, catalog, netlist, id, fp, &placement)?;
                candidates.push(Candidate {
                    cost: displacement + config.wirelength_weight * wirelength as f64,
                    placement,
                    hull: fp.bbox(&placement),
                });
            }
        }
        // Stable: equal costs keep row and rotation order.
        candidates.sort_by(|a, b| a.cost.total_cmp(&b.cost));

        let chosen = candidates
            .into_iter()
            .find(|c| accepts(&trial, catalog, &hulls, id, c, rules.spacing));
        match chosen {
            Some(c) => {
                log::debug!(
                    "{} -> {} {:?} (cost {:.1})",
                    trial.component(id)?.name,
                    c.placement.anchor,
                    c.placement.rotation,
                    c.cost
                );
                trial.component_mut(id)?.placement = Some(c.placement);
                legalizer.block(c.hull.expand(rules.spacing));
                hulls.insert(c.hull, id.index());
                result.placements.insert(id, c.placement);
            }
            None => {
                log::warn!("No free slot for component '{}'", trial.component(id)?.name);
                result.failed.push(id);
            }
        }
    }

    result.failed.sort_unstable();
    log::info!(
        "Placement: {} placed, {} failed",
        result.placements.len(),
        result.failed.len()
    );
    Ok(result)
}

/// Clique-weighted mean of the placed pins `id` shares a net with.
fn neighbour_centroid<C: Catalog + ?Sized>(
    db: &BoardDB,
    catalog: &C,
    netlist: &NetList,
    id: ComponentId,
) -> Result<Option<Point<f64>>, DbError> {
    let (mut sx, mut sy, mut sw) = (0.0, 0.0, 0.0);
    for net_idx in netlist.nets_of(id) {
        let net = &netlist.nets[net_idx];
        let members = components_of(net).len();
        if members < 2 {
            continue;
        }
        let w = clique_weight(members);
        for pin_ref in net.connections.iter().filter(|p| p.component != id) {
            if let Some(pos) = db.pin_position(pin_ref.component, &pin_ref.pin, catalog)? {
                sx += w * pos.col as f64;
                sy += w * pos.row as f64;
                sw += w;
            }
        }
    }
    Ok((sw > 0.0).then(|| Point::new(sx / sw, sy / sw)))
}

/// HPWL of the nets of `id` with `id` at `placement`.
fn local_hpwl<C: Catalog + ?Sized>(
    db: &BoardDB,
    catalog: &C,
    netlist: &NetList,
    id: ComponentId,
    fp: &Footprint,
    placement: &Placement,
) -> Result<i64, DbError> {
    let own = fp.pin_positions(placement);
    let mut total = 0;
    for net_idx in netlist.nets_of(id) {
        let mut pins = Vec::new();
        for pin_ref in &netlist.nets[net_idx].connections {
            let pos = if pin_ref.component == id {
                own.iter().find(|(n, _)| *n == pin_ref.pin).map(|(_, p)| *p)
            } else {
                db.pin_position(pin_ref.component, &pin_ref.pin, catalog)?
            };
            pins.extend(pos);
        }
        total += net_hpwl(&pins);
    }
    Ok(total)
}

fn accepts<C: Catalog + ?Sized>(
    db: &BoardDB,
    catalog: &C,
    hulls: &SpatialIndex,
    id: ComponentId,
    candidate: &Candidate,
    spacing: i32,
) -> bool {
    if !hulls.query(candidate.hull.expand(spacing)).is_empty() {
        return false;
    }
    match db.check_placement(catalog, id, &candidate.placement) {
        Ok(()) => true,
        Err(e) => {
            log::debug!("Candidate rejected: {}", e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use perfgrid_common::db::footprint::Library;
    use perfgrid_common::db::netlist::{NetDef, PinRef};
    use perfgrid_common::util::check;

    fn p(c: i32, r: i32) -> GridPos {
        GridPos::new(c, r)
    }

    fn two_pin(name: &str, a: ComponentId, pa: &str, b: ComponentId, pb: &str) -> NetDef {
        NetDef {
            name: name.to_string(),
            connections: vec![PinRef::new(a, pa), PinRef::new(b, pb)],
        }
    }

    fn hulls_of(db: &BoardDB, lib: &Library) -> Vec<GridRect> {
        db.components
            .iter()
            .filter_map(|c| c.placement.map(|pl| lib.footprint(&c.footprint).unwrap().bbox(&pl)))
            .collect()
    }

    #[test]
    fn placed_parts_keep_their_spacing() {
        let lib = Library::standard();
        let mut db = BoardDB::new(24, 18);
        let u1 = db.add_component("U1", "DIP-8", None);
        let r1 = db.add_component("R1", "AXIAL-0.4", None);
        let r2 = db.add_component("R2", "AXIAL-0.4", None);
        let c1 = db.add_component("C1", "RADIAL-0.1", None);
        let q1 = db.add_component("Q1", "TO-92", None);
        let netlist = NetList::new(vec![
            two_pin("A", u1, "1", r1, "1"),
            two_pin("B", u1, "8", r2, "2"),
            two_pin("C", r1, "2", c1, "1"),
            two_pin("D", q1, "2", u1, "4"),
        ]);
        let ids = [u1, r1, r2, c1, q1];
        let config = PlacementConfig::default();

        let out = layout(&db, &lib, &netlist, &ids, PlacementMode::Wirelength, &config).unwrap();
        assert!(out.is_complete());
        assert_eq!(out.placements.len(), 5);
        db.apply(&out.mutations()).unwrap();
        assert!(check::run_placement_check(&db, &lib).is_ok());

        let hulls = hulls_of(&db, &lib);
        for (i, a) in hulls.iter().enumerate() {
            assert!(db.bounds().contains_rect(a));
            for b in &hulls[i + 1..] {
                assert!(!a.expand(config.wirelength_spacing).overlaps(b));
            }
        }
    }

    #[test]
    fn full_board_reports_failures() {
        let lib = Library::standard();
        let mut db = BoardDB::new(4, 5);
        let ids: Vec<ComponentId> = (1..=4)
            .map(|i| db.add_component(&format!("R{i}"), "AXIAL-0.4", None))
            .collect();
        let netlist = NetList::new(vec![
            two_pin("N1", ids[0], "2", ids[1], "1"),
            two_pin("N2", ids[1], "2", ids[2], "1"),
            two_pin("N3", ids[2], "2", ids[3], "1"),
        ]);
        let config = PlacementConfig {
            solder_spacing: 1,
            ..PlacementConfig::default()
        };

        let out = layout(&db, &lib, &netlist, &ids, PlacementMode::Solderability, &config).unwrap();
        // Rows 0, 2 and 4 hold one resistor each; R4 is ordered last.
        assert_eq!(out.placements.len(), 3);
        assert_eq!(out.failed, vec![ids[3]]);
        assert!(out.placements.values().all(|pl| pl.rotation == Rotation::R0));
        let mut rows: Vec<i32> = out.placements.values().map(|pl| pl.anchor.row).collect();
        rows.sort_unstable();
        assert_eq!(rows, vec![0, 2, 4]);
    }

    #[test]
    fn connected_part_lands_near_its_neighbour() {
        let lib = Library::standard();
        let mut db = BoardDB::new(30, 30);
        let r1 = db.add_component("R1", "AXIAL-0.4", Some(Placement::at(p(2, 2))));
        let r2 = db.add_component("R2", "AXIAL-0.4", None);
        let netlist = NetList::new(vec![two_pin("N", r1, "2", r2, "1")]);

        let out = layout(&db, &lib, &netlist, &[r2], PlacementMode::Wirelength, &PlacementConfig::default()).unwrap();
        db.apply(&out.mutations()).unwrap();
        assert_eq!(db.component(r1).unwrap().placement, Some(Placement::at(p(2, 2))));
        assert!(crate::wirelength::total_hpwl(&db, &lib, &netlist).unwrap() <= 3);
    }

    #[test]
    fn lone_part_goes_to_board_centre() {
        let lib = Library::standard();
        let mut db = BoardDB::new(11, 11);
        let j1 = db.add_component("J1", "HEADER-1x2", None);
        let out = layout(&db, &lib, &NetList::default(), &[j1], PlacementMode::Solderability, &PlacementConfig::default()).unwrap();
        // Two rows tall: the hull's top row rounds up from 4.5.
        assert_eq!(out.placements[&j1], Placement::at(p(5, 5)));
    }

    #[test]
    fn unknown_component_is_an_error() {
        let lib = Library::standard();
        let db = BoardDB::new(10, 10);
        let err = layout(&db, &lib, &NetList::default(), &[ComponentId::new(3)], PlacementMode::Wirelength, &PlacementConfig::default());
        assert!(matches!(err, Err(DbError::UnknownComponent(_))));
    }
}
