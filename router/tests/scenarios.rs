use perfgrid_common::db::core::{BoardDB, Connection, Side};
use perfgrid_common::db::footprint::{Library, Placement};
use perfgrid_common::db::indices::{ComponentId, ConnectionId};
use perfgrid_common::db::netlist::{NetDef, NetList, PinRef};
use perfgrid_common::geom::coord::GridPos;
use perfgrid_common::geom::polyline;
use perfgrid_common::util::check;
use perfgrid_common::util::config::{AutorouteConfig, PlacementConfig, PlacementMode, RepairConfig, RoutingConfig};
use perfgrid_common::util::generator;
use perfgrid_placer::layout;
use perfgrid_router::algo::{AStar, Constraints};
use perfgrid_router::bridge::is_adjacent;
use perfgrid_router::connect::{ConnectMode, plan_connection};
use perfgrid_router::grid::ObstacleMap;
use perfgrid_router::repair::{MoveRequest, plan_transform};
use perfgrid_router::route;

fn p(c: i32, r: i32) -> GridPos {
    GridPos::new(c, r)
}

#[test]
fn adjacent_pins_are_bridged() {
    let lib = Library::standard();
    let mut db = BoardDB::new(10, 10);
    db.add_component("J1", "HEADER-1x2", Some(Placement::at(p(2, 1))));
    db.add_component("J2", "HEADER-1x2", Some(Placement::at(p(2, 3))));
    let cfg = RoutingConfig::default();

    let grid = ObstacleMap::build(&db, &lib).unwrap();
    let path = AStar::new()
        .search(&grid, p(2, 2), p(2, 3), &Constraints::default(), &cfg)
        .unwrap();
    assert_eq!(path, vec![p(2, 2), p(2, 3)]);
    assert!(is_adjacent(p(2, 2), p(2, 3)) && is_adjacent(p(2, 3), p(2, 2)));

    let out = plan_connection(&db, &lib, p(2, 2), p(2, 3), ConnectMode::Auto, Side::Top, &cfg).unwrap();
    assert!(out.connection.is_bridge());
    db.apply(&[out.mutation()]).unwrap();
    assert_eq!(db.connections.len(), 1);
}

#[test]
fn moved_component_reroutes_path_through_new_body() {
    let lib = Library::standard();
    let mut db = BoardDB::new(14, 10);
    let u1 = db.add_component("U1", "DIP-8", Some(Placement::at(p(0, 0))));
    db.connections.push(Connection::wire(ConnectionId::new(0), Side::Top, vec![p(0, 6), p(0, 5), p(12, 5)]));
    let routing = RoutingConfig::default();
    let repair = RepairConfig::default();

    let noop = plan_transform(&db, &lib, &[MoveRequest { component: u1, placement: Placement::at(p(0, 0)) }], &routing, &repair).unwrap();
    assert!(noop.is_empty());

    let moved = Placement::at(p(3, 3));
    let plan = plan_transform(&db, &lib, &[MoveRequest { component: u1, placement: moved }], &routing, &repair).unwrap();
    assert_eq!(plan.report.rerouted, vec![ConnectionId::new(0)]);
    db.apply(&plan.mutations).unwrap();

    let body = db.footprint_of(u1, &lib).unwrap().bbox(&moved);
    assert!(body.contains(p(5, 5)));
    let wire = db.connection(ConnectionId::new(0)).unwrap();
    assert_eq!(wire.endpoints(), (p(0, 6), p(12, 5)));
    assert!(wire.cells().iter().all(|c| !body.contains(*c)));
    assert!(polyline::is_canonical(&wire.points()));
    assert!(check::run_connection_check(&db).is_ok());
}

#[test]
fn full_board_fails_exactly_one_net() {
    let lib = Library::standard();
    let mut db = BoardDB::new(4, 5);
    let ids: Vec<ComponentId> = (1..=4)
        .map(|i| db.add_component(&format!("R{i}"), "AXIAL-0.4", None))
        .collect();
    let net = |name: &str, a: usize, b: usize| NetDef {
        name: name.to_string(),
        connections: vec![PinRef::new(ids[a], "2"), PinRef::new(ids[b], "1")],
    };
    let netlist = NetList::new(vec![net("N1", 0, 1), net("N2", 1, 2), net("N3", 2, 3)]);

    let placement = PlacementConfig {
        solder_spacing: 1,
        ..PlacementConfig::default()
    };
    let placed = layout(&db, &lib, &netlist, &ids, PlacementMode::Solderability, &placement).unwrap();
    assert_eq!(placed.failed.len(), 1);
    db.apply(&placed.mutations()).unwrap();

    let out = route(&db, &lib, &netlist, &AutorouteConfig::default(), &RoutingConfig::default()).unwrap();
    assert_eq!(out.failed, 1);
    assert_eq!(out.failed_nets, vec!["N3".to_string()]);
    assert_eq!(out.routed, 2);

    db.apply(&out.mutations).unwrap();
    assert!(check::run_connection_check(&db).is_ok());
}

#[test]
fn every_routable_net_is_counted() {
    for seed in [3u64, 11, 29] {
        let mut project = generator::random_project(10, 9, 0.25, seed);
        let ids: Vec<ComponentId> = project.db.components.iter().map(|c| c.id).collect();
        let placed = layout(
            &project.db,
            &project.library,
            &project.netlist,
            &ids,
            PlacementMode::Wirelength,
            &PlacementConfig::default(),
        )
        .unwrap();
        project.db.apply(&placed.mutations()).unwrap();

        let out = route(
            &project.db,
            &project.library,
            &project.netlist,
            &AutorouteConfig::default(),
            &RoutingConfig::default(),
        )
        .unwrap();
        let expected = project.netlist.routable().count();
        assert_eq!(out.routed + out.failed, expected, "seed {seed}");
        assert_eq!(out.failed_nets.len(), out.failed);

        project.db.apply(&out.mutations).unwrap();
        assert!(check::run_connection_check(&project.db).is_ok(), "seed {seed}");
    }
}
