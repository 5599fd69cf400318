//! Helpers for rectilinear polylines stored as vertex lists.

use super::coord::{Edge, GridPos};
use super::segment::Segment;

fn collinear(a: GridPos, b: GridPos, c: GridPos) -> bool {
    (a.col == b.col && b.col == c.col) || (a.row == b.row && b.row == c.row)
}

/// Drops repeated vertices and every interior vertex that is not a turn.
pub fn canonicalize(points: &[GridPos]) -> Vec<GridPos> {
    let mut out: Vec<GridPos> = Vec::with_capacity(points.len());
    for &p in points {
        if out.last() == Some(&p) {
            continue;
        }
        while out.len() >= 2 && collinear(out[out.len() - 2], out[out.len() - 1], p) {
            // A reversal would fold the run onto itself; keep the vertex.
            let a = out[out.len() - 2];
            let b = out[out.len() - 1];
            let forward = (b.col - a.col).signum() == (p.col - b.col).signum()
                && (b.row - a.row).signum() == (p.row - b.row).signum();
            if !forward {
                break;
            }
            out.pop();
        }
        out.push(p);
    }
    out
}

pub fn is_rectilinear(points: &[GridPos]) -> bool {
    points
        .windows(2)
        .all(|w| w[0].col == w[1].col || w[0].row == w[1].row)
}

pub fn is_canonical(points: &[GridPos]) -> bool {
    points.len() >= 2
        && is_rectilinear(points)
        && points.windows(2).all(|w| w[0] != w[1])
        && points.windows(3).all(|w| !collinear(w[0], w[1], w[2]))
}

pub fn segments(points: &[GridPos]) -> impl Iterator<Item = Segment> + '_ {
    points.windows(2).map(|w| Segment::new(w[0], w[1]))
}

/// Every cell the polyline passes over, in walking order, without
/// repeating shared corner cells.
pub fn cells(points: &[GridPos]) -> Vec<GridPos> {
    let mut out = Vec::new();
    for seg in segments(points) {
        for c in seg.cells() {
            if out.last() != Some(&c) {
                out.push(c);
            }
        }
    }
    if out.is_empty() {
        out.extend(points.first().copied());
    }
    out
}

pub fn unit_edges(points: &[GridPos]) -> Vec<Edge> {
    segments(points).flat_map(|s| s.unit_edges()).collect()
}

pub fn length(points: &[GridPos]) -> i32 {
    segments(points).map(|s| s.len()).sum()
}

pub fn turns(points: &[GridPos]) -> usize {
    let canon = canonicalize(points);
    canon.len().saturating_sub(2)
}

/// Adds a support vertex every `spacing` cells along straight runs so long
/// bare-wire spans get soldered down. `spacing <= 0` returns the input.
pub fn with_support_points(points: &[GridPos], spacing: i32) -> Vec<GridPos> {
    if spacing <= 0 || points.len() < 2 {
        return points.to_vec();
    }
    let mut out = vec![points[0]];
    for seg in segments(points) {
        let dc = (seg.p2.col - seg.p1.col).signum();
        let dr = (seg.p2.row - seg.p1.row).signum();
        let mut step = spacing;
        while step < seg.len() {
            out.push(seg.p1.offset(dc * step, dr * step));
            step += spacing;
        }
        out.push(seg.p2);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(c: i32, r: i32) -> GridPos {
        GridPos::new(c, r)
    }

    #[test]
    fn canonicalize_removes_straight_vertices() {
        let raw = [p(0, 0), p(1, 0), p(2, 0), p(2, 0), p(2, 1), p(2, 2), p(3, 2)];
        let canon = canonicalize(&raw);
        assert_eq!(canon, vec![p(0, 0), p(2, 0), p(2, 2), p(3, 2)]);
        assert!(is_canonical(&canon));
        assert!(!is_canonical(&raw));
    }

    #[test]
    fn cells_and_edges_of_l_shape() {
        let path = [p(0, 0), p(2, 0), p(2, 2)];
        assert_eq!(cells(&path).len(), 5);
        assert_eq!(unit_edges(&path).len(), 4);
        assert_eq!(length(&path), 4);
        assert_eq!(turns(&path), 1);
    }

    #[test]
    fn support_points_round_trip_through_canonicalize() {
        let path = [p(0, 0), p(7, 0), p(7, 3)];
        let supported = with_support_points(&path, 3);
        assert_eq!(supported, vec![p(0, 0), p(3, 0), p(6, 0), p(7, 0), p(7, 3)]);
        assert_eq!(canonicalize(&supported), path.to_vec());
        assert_eq!(with_support_points(&path, 0), path.to_vec());
    }
}
