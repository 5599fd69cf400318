use crate::db::core::BoardDB;
use crate::db::error::DbError;
use crate::db::footprint::{Catalog, Library, Placement};
use crate::db::netlist::{NetDef, NetList, PinRef};
use crate::db::parser::project::{self, Project};
use crate::geom::coord::GridPos;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const PARTS: [&str; 4] = ["AXIAL-0.4", "RADIAL-0.1", "TO-92", "DIP-8"];

/// Builds an unplaced project with `num_components` random parts and a
/// net-list of `num_nets` nets, each joining two or three random pins.
pub fn random_project(num_components: usize, num_nets: usize, target_utilization: f64, seed: u64) -> Project {
    let mut rng = StdRng::seed_from_u64(seed);
    let library = Library::standard();

    let mut db = BoardDB::new(0, 0);
    let mut used_cells = 0i64;
    for i in 0..num_components {
        let fp_name = PARTS[rng.gen_range(0..PARTS.len())];
        if let Some(fp) = library.footprint(fp_name) {
            // Keep a one-hole ring around each part for the estimate.
            let bbox = fp.bbox(&Placement::at(GridPos::new(0, 0))).expand(1);
            used_cells += bbox.area();
        }
        db.add_component(&format!("U{}", i + 1), fp_name, None);
    }

    let util = target_utilization.clamp(0.05, 0.9);
    let side = ((used_cells as f64 / util).sqrt().ceil() as i32).max(8);
    db.width = side;
    db.height = side;

    let mut nets = Vec::with_capacity(num_nets);
    if !db.components.is_empty() {
        for n in 0..num_nets {
            let fanout = rng.gen_range(2..=3);
            let mut connections = Vec::with_capacity(fanout);
            for _ in 0..fanout {
                let comp = &db.components[rng.gen_range(0..db.components.len())];
                let Some(fp) = library.footprint(&comp.footprint) else {
                    continue;
                };
                let pin = &fp.pins[rng.gen_range(0..fp.pins.len())];
                let pin_ref = PinRef::new(comp.id, &pin.number);
                if !connections.contains(&pin_ref) {
                    connections.push(pin_ref);
                }
            }
            nets.push(NetDef {
                name: format!("N{}", n + 1),
                connections,
            });
        }
    }

    log::info!(
        "Generating Benchmark: {} components, {} nets, Board: {}x{} (Target Util: {:.1}%)",
        num_components,
        num_nets,
        db.width,
        db.height,
        util * 100.0
    );

    Project {
        db,
        library,
        netlist: NetList::new(nets),
    }
}

pub fn generate_random_project(
    filename: &str,
    num_components: usize,
    num_nets: usize,
    target_utilization: f64,
    seed: u64,
) -> Result<(), DbError> {
    let project = random_project(num_components, num_nets, target_utilization, seed);
    project::save(&project, filename)
}
