use perfgrid_common::db::core::{Connection, Side};
use perfgrid_common::geom::coord::GridPos;
use perfgrid_common::geom::segment::Segment;

#[inline]
pub fn is_adjacent(a: GridPos, b: GridPos) -> bool {
    a.manhattan(b) == 1
}

/// True when the unit run `a - b` would meet geometry already on `side`
/// anywhere except a shared endpoint: overlapping an edge, landing inside
/// a trace, or a trace passing through one of `a`, `b`.
pub fn bridge_crosses(a: GridPos, b: GridPos, connections: &[Connection], side: Side) -> bool {
    let candidate = Segment::new(a, b);
    connections
        .iter()
        .filter(|c| c.side() == side)
        .flat_map(|c| c.segments())
        .any(|seg| match candidate.intersection(&seg) {
            None => false,
            Some(x) if x.min == x.max => {
                let p = x.min;
                !(candidate.is_endpoint(p) && seg.is_endpoint(p))
            }
            Some(_) => true,
        })
}
