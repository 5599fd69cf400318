//! Electrical nets recomputed from connection endpoints and labels.
//!
//! Two connections are on the same net when they share an endpoint, or
//! when each ends on a label carrying the same name. Nothing is cached.

use perfgrid_common::db::core::{Connection, NetLabel};
use perfgrid_common::db::indices::ConnectionId;
use perfgrid_common::geom::coord::GridPos;
use perfgrid_common::geom::point::Point;
use std::collections::{BTreeSet, HashMap, VecDeque};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NetGroup {
    pub connections: BTreeSet<ConnectionId>,
    pub points: BTreeSet<GridPos>,
    /// Label names and connection net tags seen in the group.
    pub names: BTreeSet<String>,
}

impl NetGroup {
    pub fn contains(&self, id: ConnectionId) -> bool {
        self.connections.contains(&id)
    }

    pub fn touches(&self, p: GridPos) -> bool {
        self.points.contains(&p)
    }
}

struct EndpointIndex<'a> {
    by_point: HashMap<GridPos, Vec<usize>>,
    labels_at: HashMap<GridPos, Vec<&'a str>>,
    labels_named: HashMap<&'a str, Vec<GridPos>>,
}

impl<'a> EndpointIndex<'a> {
    fn new(connections: &[Connection], labels: &'a [NetLabel]) -> Self {
        let mut by_point: HashMap<GridPos, Vec<usize>> = HashMap::new();
        for (i, conn) in connections.iter().enumerate() {
            let (a, b) = conn.endpoints();
            by_point.entry(a).or_default().push(i);
            if b != a {
                by_point.entry(b).or_default().push(i);
            }
        }
        let mut labels_at: HashMap<GridPos, Vec<&str>> = HashMap::new();
        let mut labels_named: HashMap<&str, Vec<GridPos>> = HashMap::new();
        for label in labels {
            labels_at.entry(label.at).or_default().push(&label.name);
            labels_named.entry(&label.name).or_default().push(label.at);
        }
        Self {
            by_point,
            labels_at,
            labels_named,
        }
    }
}

/// Snaps a real-valued position onto the grid when it lies within
/// `epsilon` of a grid point on both axes.
pub fn snap(p: Point<f64>, epsilon: f64) -> Option<GridPos> {
    let col = p.x.round();
    let row = p.y.round();
    if (p.x - col).abs() <= epsilon && (p.y - row).abs() <= epsilon {
        Some(GridPos::new(col as i32, row as i32))
    } else {
        None
    }
}

/// Every connection reachable from `seeds` through shared endpoints and
/// same-name labels. Seeds that are not within `epsilon` of a grid point
/// match nothing.
pub fn same_net(seeds: &[Point<f64>], connections: &[Connection], labels: &[NetLabel], epsilon: f64) -> NetGroup {
    let snapped: Vec<GridPos> = seeds.iter().filter_map(|&p| snap(p, epsilon)).collect();
    same_net_at(&snapped, connections, labels)
}

pub fn same_net_at(seeds: &[GridPos], connections: &[Connection], labels: &[NetLabel]) -> NetGroup {
    let index = EndpointIndex::new(connections, labels);
    let mut group = NetGroup::default();
    let mut queue: VecDeque<GridPos> = VecDeque::new();

    for &seed in seeds {
        if group.points.insert(seed) {
            queue.push_back(seed);
        }
    }

    while let Some(p) = queue.pop_front() {
        if let Some(conns) = index.by_point.get(&p) {
            for &i in conns {
                let conn = &connections[i];
                if !group.connections.insert(conn.id()) {
                    continue;
                }
                if let Some(tag) = conn.net() {
                    group.names.insert(tag.to_string());
                }
                let (a, b) = conn.endpoints();
                for q in [a, b] {
                    if group.points.insert(q) {
                        queue.push_back(q);
                    }
                }
            }
        }
        if let Some(names) = index.labels_at.get(&p) {
            for &name in names {
                if !group.names.insert(name.to_string()) {
                    continue;
                }
                for &q in index.labels_named.get(name).into_iter().flatten() {
                    if group.points.insert(q) {
                        queue.push_back(q);
                    }
                }
            }
        }
    }
    group
}

struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            rank: vec![0; n],
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return;
        }
        match self.rank[ra].cmp(&self.rank[rb]) {
            std::cmp::Ordering::Less => self.parent[ra] = rb,
            std::cmp::Ordering::Greater => self.parent[rb] = ra,
            std::cmp::Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] += 1;
            }
        }
    }
}

/// Every connection assigned to exactly one net.
#[derive(Clone, Debug, Default)]
pub struct NetPartition {
    pub groups: Vec<NetGroup>,
    index: HashMap<ConnectionId, usize>,
}

impl NetPartition {
    pub fn group_of(&self, id: ConnectionId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    pub fn group(&self, id: ConnectionId) -> Option<&NetGroup> {
        self.group_of(id).map(|g| &self.groups[g])
    }

    pub fn same_net(&self, a: ConnectionId, b: ConnectionId) -> bool {
        match (self.group_of(a), self.group_of(b)) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        }
    }
}

pub fn net_groups(connections: &[Connection], labels: &[NetLabel]) -> NetPartition {
    let index = EndpointIndex::new(connections, labels);
    let mut uf = UnionFind::new(connections.len());

    for conns in index.by_point.values() {
        for w in conns.windows(2) {
            uf.union(w[0], w[1]);
        }
    }

    // Connections ending on any label of one name share a net.
    let mut first_by_name: HashMap<&str, usize> = HashMap::new();
    for (p, names) in &index.labels_at {
        let Some(&conn) = index.by_point.get(p).and_then(|c| c.first()) else {
            continue;
        };
        for &name in names {
            match first_by_name.get(name) {
                Some(&other) => uf.union(conn, other),
                None => {
                    first_by_name.insert(name, conn);
                }
            }
        }
    }

    let mut root_to_group: HashMap<usize, usize> = HashMap::new();
    let mut partition = NetPartition::default();
    for (i, conn) in connections.iter().enumerate() {
        let root = uf.find(i);
        let g = *root_to_group.entry(root).or_insert_with(|| {
            partition.groups.push(NetGroup::default());
            partition.groups.len() - 1
        });
        let group = &mut partition.groups[g];
        group.connections.insert(conn.id());
        let (a, b) = conn.endpoints();
        group.points.insert(a);
        group.points.insert(b);
        if let Some(tag) = conn.net() {
            group.names.insert(tag.to_string());
        }
        partition.index.insert(conn.id(), g);
    }

    for label in labels {
        if let Some(&conn) = index.by_point.get(&label.at).and_then(|c| c.first()) {
            let g = partition.index[&connections[conn].id()];
            partition.groups[g].names.insert(label.name.clone());
        }
    }
    partition
}

#[cfg(test)]
mod tests {
    use super::*;
    use perfgrid_common::db::core::Side;

    fn p(c: i32, r: i32) -> GridPos {
        GridPos::new(c, r)
    }

    fn wire(id: usize, pts: &[GridPos]) -> Connection {
        Connection::wire(ConnectionId::new(id), Side::Top, pts.to_vec())
    }

    fn chain() -> Vec<Connection> {
        vec![
            wire(0, &[p(0, 0), p(3, 0)]),
            wire(1, &[p(3, 0), p(3, 4)]),
            wire(2, &[p(3, 4), p(6, 4), p(6, 6)]),
            wire(3, &[p(9, 9), p(9, 12)]),
        ]
    }

    #[test]
    fn closure_is_reflexive_and_transitive() {
        let conns = chain();
        for seed in [p(0, 0), p(6, 6), p(3, 4)] {
            let g = same_net_at(&[seed], &conns, &[]);
            assert!(g.touches(seed));
            assert_eq!(g.connections.len(), 3);
            assert!(g.contains(ConnectionId::new(0)) && g.contains(ConnectionId::new(2)));
            assert!(!g.contains(ConnectionId::new(3)));
        }
    }

    #[test]
    fn real_valued_seeds_snap_within_epsilon() {
        let conns = chain();
        let g = same_net(&[Point::new(6.1, 5.9)], &conns, &[], 0.25);
        assert_eq!(g.connections.len(), 3);
        let none = same_net(&[Point::new(6.4, 6.0)], &conns, &[], 0.25);
        assert!(none.connections.is_empty());
    }

    #[test]
    fn labels_join_by_name() {
        let conns = chain();
        let labels = vec![
            NetLabel {
                name: "VCC".to_string(),
                at: p(0, 0),
            },
            NetLabel {
                name: "VCC".to_string(),
                at: p(9, 12),
            },
        ];
        let g = same_net_at(&[p(9, 9)], &conns, &labels);
        assert_eq!(g.connections.len(), 4);
        assert!(g.names.contains("VCC"));

        let partition = net_groups(&conns, &labels);
        assert_eq!(partition.groups.len(), 1);
        assert!(partition.same_net(ConnectionId::new(0), ConnectionId::new(3)));
    }

    #[test]
    fn partition_separates_disjoint_nets() {
        let conns = chain();
        let partition = net_groups(&conns, &[]);
        assert_eq!(partition.groups.len(), 2);
        assert!(partition.same_net(ConnectionId::new(0), ConnectionId::new(2)));
        assert!(!partition.same_net(ConnectionId::new(1), ConnectionId::new(3)));
        let g = partition.group(ConnectionId::new(3)).unwrap();
        assert_eq!(g.points, [p(9, 9), p(9, 12)].into_iter().collect());
    }
}
