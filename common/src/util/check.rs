use crate::db::core::{BoardDB, Connection};
use crate::db::footprint::Catalog;
use crate::geom::coord::GridPos;
use crate::geom::polyline;
use rayon::prelude::*;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

pub fn run_placement_check<C: Catalog + Sync>(db: &BoardDB, catalog: &C) -> Result<(), String> {
    log::info!("Starting Placement Verification...");
    let valid = AtomicBool::new(true);

    db.components.par_iter().for_each(|comp| {
        let Some(placement) = comp.placement else {
            return;
        };
        if let Err(e) = db.check_placement(catalog, comp.id, &placement) {
            log::error!("FAIL: {}", e);
            valid.store(false, Ordering::Relaxed);
        }
    });

    let unplaced = db.components.iter().filter(|c| c.placement.is_none()).count();
    if unplaced > 0 {
        log::warn!("{} component(s) are not placed.", unplaced);
    }

    if valid.load(Ordering::Relaxed) {
        log::info!("\x1b[32mPASS\x1b[0m: Placement is valid.");
        Ok(())
    } else {
        Err("Placement verification failed.".to_string())
    }
}

/// Shape checks on every connection: rectilinear, on the board, bridges
/// one step long, unique ids, and no bridge doubled by a wire.
pub fn run_connection_check(db: &BoardDB) -> Result<(), String> {
    log::info!("Starting Connection Verification...");
    let bounds = db.bounds();

    let errors: Vec<String> = db
        .connections
        .par_iter()
        .filter_map(|conn| {
            let id = conn.id();
            let points = conn.points();
            if points.iter().any(|p| !bounds.contains(*p)) {
                return Some(format!("{:?} leaves the board", id));
            }
            match conn {
                Connection::Wire(w) => {
                    if w.points.len() < 2 || !polyline::is_rectilinear(&w.points) {
                        return Some(format!("{:?} is not a rectilinear path", id));
                    }
                    if w.points.windows(2).any(|p| p[0] == p[1]) {
                        return Some(format!("{:?} repeats a point", id));
                    }
                }
                Connection::Bridge(b) => {
                    if b.a.manhattan(b.b) != 1 {
                        return Some(format!("{:?} bridges non-adjacent holes", id));
                    }
                }
            }
            None
        })
        .collect();

    let mut seen = HashSet::new();
    let mut dup_errors = Vec::new();
    for conn in &db.connections {
        if !seen.insert(conn.id()) {
            dup_errors.push(format!("{:?} is used twice", conn.id()));
        }
    }

    let bridged: HashSet<(GridPos, GridPos, crate::db::core::Side)> = db
        .connections
        .iter()
        .filter_map(|c| match c {
            Connection::Bridge(b) => Some((b.a.min(b.b), b.a.max(b.b), b.side)),
            Connection::Wire(_) => None,
        })
        .collect();
    for conn in &db.connections {
        if let Connection::Wire(w) = conn {
            let (a, b) = conn.endpoints();
            if bridged.contains(&(a.min(b), a.max(b), w.side)) {
                dup_errors.push(format!("{:?} duplicates a bridge between {} and {}", w.id, a, b));
            }
        }
    }

    let all: Vec<String> = errors.into_iter().chain(dup_errors).collect();
    if all.is_empty() {
        log::info!(
            "\x1b[32mPASS\x1b[0m: {} connection(s) are well formed.",
            db.connections.len()
        );
        Ok(())
    } else {
        for e in &all {
            log::error!("FAIL: {}", e);
        }
        Err(all.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::footprint::{Library, Placement};
    use crate::db::indices::ConnectionId;
    use crate::db::core::Side;

    #[test]
    fn overlapping_components_fail() {
        let lib = Library::standard();
        let mut db = BoardDB::new(10, 10);
        db.add_component("U1", "DIP-8", Some(Placement::at(GridPos::new(0, 0))));
        assert!(run_placement_check(&db, &lib).is_ok());
        db.add_component("U2", "DIP-8", Some(Placement::at(GridPos::new(2, 2))));
        assert!(run_placement_check(&db, &lib).is_err());
    }

    #[test]
    fn wire_doubling_a_bridge_fails() {
        let mut db = BoardDB::new(10, 10);
        let a = GridPos::new(1, 1);
        let b = GridPos::new(2, 1);
        db.connections.push(Connection::bridge(ConnectionId::new(0), Side::Top, a, b));
        assert!(run_connection_check(&db).is_ok());
        db.connections
            .push(Connection::wire(ConnectionId::new(1), Side::Top, vec![b, a]));
        assert!(run_connection_check(&db).is_err());
    }
}
