use crate::error::RouteError;
use crate::grid::RoutingGrid;
use perfgrid_common::geom::coord::{Edge, GridPos};
use perfgrid_common::geom::polyline;
use perfgrid_common::util::config::RoutingConfig;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

/// East, South, West, North. Rows grow downwards, so `d + 1` is a right turn.
const DIRS: [(i32, i32); 4] = [(1, 0), (0, 1), (-1, 0), (0, -1)];
/// Direction slot of the start state, which has no incoming direction.
const NO_DIR: usize = 4;
const SLOTS: usize = 5;

#[derive(Copy, Clone, Eq, PartialEq)]
struct State {
    f_score: i64,
    h_score: i64,
    seq: u64,
    index: u32,
}

impl Ord for State {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .f_score
            .cmp(&self.f_score)
            .then_with(|| other.h_score.cmp(&self.h_score))
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for State {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Per-query occupancy rules layered on top of the obstacle grid.
#[derive(Clone, Debug, Default)]
pub struct Constraints {
    /// Edges taken by other connections.
    pub blocked_edges: HashSet<Edge>,
    /// Edges of the query's own net; these override `blocked_edges`.
    pub same_net_edges: HashSet<Edge>,
    /// Cells only the target may enter: pins of other nets, and bodies that
    /// a repair is clearing.
    pub blocked_cells: HashSet<GridPos>,
}

impl Constraints {
    fn edge_blocked(&self, a: GridPos, b: GridPos) -> bool {
        match Edge::new(a, b) {
            Some(e) => self.blocked_edges.contains(&e) && !self.same_net_edges.contains(&e),
            None => true,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
struct RoutingWindow {
    min_col: i32,
    max_col: i32,
    min_row: i32,
    max_row: i32,
    width: i32,
    height: i32,
}

impl RoutingWindow {
    fn new(from: GridPos, to: GridPos, margin: i32, grid_w: i32, grid_h: i32) -> Self {
        let min_col = (from.col.min(to.col) - margin).max(0);
        let max_col = (from.col.max(to.col) + margin).min(grid_w - 1);
        let min_row = (from.row.min(to.row) - margin).max(0);
        let max_row = (from.row.max(to.row) + margin).min(grid_h - 1);
        Self {
            min_col,
            max_col,
            min_row,
            max_row,
            width: max_col - min_col + 1,
            height: max_row - min_row + 1,
        }
    }

    fn full<G: RoutingGrid + ?Sized>(grid: &G) -> Self {
        Self {
            min_col: 0,
            max_col: grid.width() - 1,
            min_row: 0,
            max_row: grid.height() - 1,
            width: grid.width(),
            height: grid.height(),
        }
    }

    #[inline(always)]
    fn contains(&self, p: GridPos) -> bool {
        p.col >= self.min_col && p.col <= self.max_col && p.row >= self.min_row && p.row <= self.max_row
    }

    fn num_states(&self) -> usize {
        (self.width as usize) * (self.height as usize) * SLOTS
    }

    #[inline(always)]
    fn state_index(&self, p: GridPos, dir: usize) -> usize {
        let local = ((p.row - self.min_row) * self.width + (p.col - self.min_col)) as usize;
        local * SLOTS + dir
    }

    #[inline(always)]
    fn state_of(&self, idx: usize) -> (GridPos, usize) {
        let local = (idx / SLOTS) as i32;
        let dir = idx % SLOTS;
        let p = GridPos::new(local % self.width + self.min_col, local / self.width + self.min_row);
        (p, dir)
    }
}

/// Turn-aware A* with reusable scratch buffers.
#[derive(Clone)]
pub struct AStar {
    parents: Vec<u32>,
    g_score: Vec<i64>,
    visited_tag: Vec<u32>,
    closed_tag: Vec<u32>,
    current_tag: u32,
    capacity: usize,
}

impl Default for AStar {
    fn default() -> Self {
        Self::new()
    }
}

impl AStar {
    pub fn new() -> Self {
        let cap = 4096;
        Self {
            parents: vec![u32::MAX; cap],
            g_score: vec![i64::MAX; cap],
            visited_tag: vec![0; cap],
            closed_tag: vec![0; cap],
            current_tag: 1,
            capacity: cap,
        }
    }

    fn ensure_capacity(&mut self, size: usize) {
        if size > self.capacity {
            self.capacity = size.max(self.capacity * 2);
            self.parents.resize(self.capacity, u32::MAX);
            self.g_score.resize(self.capacity, i64::MAX);
            self.visited_tag.resize(self.capacity, 0);
            self.closed_tag.resize(self.capacity, 0);
        }
    }

    fn reset_window(&mut self) {
        self.current_tag = self.current_tag.wrapping_add(1);
        if self.current_tag == 0 {
            self.visited_tag.fill(0);
            self.closed_tag.fill(0);
            self.current_tag = 1;
        }
    }

    /// Canonical path from `from` to `to`. Tries a window around the two
    /// endpoints first, then the whole board.
    pub fn search<G: RoutingGrid + ?Sized>(
        &mut self,
        grid: &G,
        from: GridPos,
        to: GridPos,
        constraints: &Constraints,
        config: &RoutingConfig,
    ) -> Result<Vec<GridPos>, RouteError> {
        let not_found = RouteError::NoRouteFound { from, to };
        if from == to || !grid.in_bounds(from) || !grid.in_bounds(to) {
            return Err(not_found);
        }

        let window = RoutingWindow::new(from, to, config.window_margin.max(0), grid.width(), grid.height());
        if let Some(cells) = self.search_window(grid, from, to, constraints, config, &window) {
            return Ok(polyline::canonicalize(&cells));
        }

        let full = RoutingWindow::full(grid);
        if full != window {
            log::debug!("Window search {} -> {} failed; retrying on the full board", from, to);
            if let Some(cells) = self.search_window(grid, from, to, constraints, config, &full) {
                return Ok(polyline::canonicalize(&cells));
            }
        }
        Err(not_found)
    }

    fn search_window<G: RoutingGrid + ?Sized>(
        &mut self,
        grid: &G,
        from: GridPos,
        to: GridPos,
        constraints: &Constraints,
        config: &RoutingConfig,
        window: &RoutingWindow,
    ) -> Option<Vec<GridPos>> {
        self.ensure_capacity(window.num_states());
        self.reset_window();

        let step_cost = config.step_cost.max(1) as i64;
        let turn_penalty = config.turn_penalty as i64;
        let heuristic = |p: GridPos| p.manhattan(to) as i64 * step_cost;

        let mut heap = BinaryHeap::new();
        let mut seq = 0u64;

        let start = window.state_index(from, NO_DIR);
        self.g_score[start] = 0;
        self.visited_tag[start] = self.current_tag;
        self.parents[start] = u32::MAX;
        let h = heuristic(from);
        heap.push(State {
            f_score: h,
            h_score: h,
            seq,
            index: start as u32,
        });

        let mut expansions = 0u32;

        while let Some(State { index, .. }) = heap.pop() {
            let curr = index as usize;
            if self.closed_tag[curr] == self.current_tag {
                continue;
            }
            self.closed_tag[curr] = self.current_tag;

            let (position, dir) = window.state_of(curr);
            if position == to {
                return Some(self.reconstruct_path(curr, window));
            }

            expansions += 1;
            if expansions > config.max_expansions {
                log::debug!("A* gave up after {} expansions", expansions);
                return None;
            }

            // Straight, left, right. Reversing never helps.
            let order = if dir == NO_DIR {
                [0, 1, 2, 3]
            } else {
                [dir, (dir + 3) % 4, (dir + 1) % 4, NO_DIR]
            };

            let current_g = self.g_score[curr];
            for &next_dir in order.iter().take_while(|&&d| d != NO_DIR) {
                let (dc, dr) = DIRS[next_dir];
                let neighbor = position.offset(dc, dr);
                if !window.contains(neighbor) {
                    continue;
                }
                if grid.is_obstacle(neighbor) && neighbor != to && neighbor != from {
                    continue;
                }
                if neighbor != to && constraints.blocked_cells.contains(&neighbor) {
                    continue;
                }
                if constraints.edge_blocked(position, neighbor) {
                    continue;
                }

                let turn = if dir != NO_DIR && dir != next_dir {
                    turn_penalty
                } else {
                    0
                };
                let tentative_g = current_g + step_cost + turn;
                let next = window.state_index(neighbor, next_dir);
                if self.closed_tag[next] == self.current_tag {
                    continue;
                }

                if self.visited_tag[next] != self.current_tag || tentative_g < self.g_score[next] {
                    self.parents[next] = curr as u32;
                    self.g_score[next] = tentative_g;
                    self.visited_tag[next] = self.current_tag;
                    let h = heuristic(neighbor);
                    seq += 1;
                    heap.push(State {
                        f_score: tentative_g + h,
                        h_score: h,
                        seq,
                        index: next as u32,
                    });
                }
            }
        }
        None
    }

    fn reconstruct_path(&self, end: usize, window: &RoutingWindow) -> Vec<GridPos> {
        let mut path = Vec::new();
        let mut curr = end;
        loop {
            path.push(window.state_of(curr).0);
            let parent = self.parents[curr];
            if parent == u32::MAX {
                break;
            }
            curr = parent as usize;
        }
        path.reverse();
        path
    }
}

/// Horizontal-then-vertical fallback; ignores every obstacle.
pub fn l_route(from: GridPos, to: GridPos) -> Vec<GridPos> {
    let corner = GridPos::new(to.col, from.row);
    let path = polyline::canonicalize(&[from, corner, to]);
    if path.len() < 2 {
        vec![from, to]
    } else {
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::DenseGrid;

    fn p(c: i32, r: i32) -> GridPos {
        GridPos::new(c, r)
    }

    fn route(grid: &DenseGrid, from: GridPos, to: GridPos, constraints: &Constraints) -> Result<Vec<GridPos>, RouteError> {
        AStar::new().search(grid, from, to, constraints, &RoutingConfig::default())
    }

    #[test]
    fn free_grid_gives_manhattan_length_with_one_turn() {
        let grid = DenseGrid::new(20, 20);
        let mut astar = AStar::new();
        let cfg = RoutingConfig::default();
        for &(a, b) in &[(p(1, 1), p(7, 4)), (p(9, 2), p(3, 15)), (p(0, 0), p(19, 19)), (p(4, 4), p(4, 12))] {
            let path = astar.search(&grid, a, b, &Constraints::default(), &cfg).unwrap();
            assert_eq!(path.first(), Some(&a));
            assert_eq!(path.last(), Some(&b));
            assert_eq!(polyline::length(&path), a.manhattan(b));
            assert!(polyline::is_canonical(&path));
            let aligned = a.col == b.col || a.row == b.row;
            assert_eq!(path.len(), if aligned { 2 } else { 3 });
        }
    }

    #[test]
    fn adjacent_pins_route_directly() {
        let grid = DenseGrid::new(10, 10);
        let path = route(&grid, p(2, 2), p(2, 3), &Constraints::default()).unwrap();
        assert_eq!(path, vec![p(2, 2), p(2, 3)]);
    }

    #[test]
    fn same_point_is_not_found() {
        let grid = DenseGrid::new(10, 10);
        assert!(matches!(
            route(&grid, p(2, 2), p(2, 2), &Constraints::default()),
            Err(RouteError::NoRouteFound { .. })
        ));
    }

    #[test]
    fn detours_around_wall() {
        let mut grid = DenseGrid::new(10, 10);
        for r in 0..8 {
            grid.set_obstacle(p(5, r));
        }
        let path = route(&grid, p(2, 2), p(8, 2), &Constraints::default()).unwrap();
        let cells = polyline::cells(&path);
        assert!(cells.iter().all(|c| !grid.is_obstacle(*c)));
        assert!(cells.contains(&p(5, 8)) || cells.contains(&p(5, 9)));
        assert!(polyline::is_canonical(&path));
    }

    #[test]
    fn sealed_target_is_not_found() {
        let mut grid = DenseGrid::new(10, 10);
        for c in p(4, 4).neighbors() {
            grid.set_obstacle(c);
        }
        assert!(route(&grid, p(0, 0), p(4, 4), &Constraints::default()).is_err());
    }

    #[test]
    fn blocked_edge_is_avoided_unless_same_net() {
        let grid = DenseGrid::new(10, 10);
        let mut constraints = Constraints::default();
        let edge = Edge::new(p(2, 2), p(3, 2)).unwrap();
        constraints.blocked_edges.insert(edge);
        let path = route(&grid, p(2, 2), p(5, 2), &constraints).unwrap();
        assert!(!polyline::unit_edges(&path).contains(&edge));

        constraints.same_net_edges.insert(edge);
        let path = route(&grid, p(2, 2), p(5, 2), &constraints).unwrap();
        assert_eq!(path, vec![p(2, 2), p(5, 2)]);
    }

    #[test]
    fn other_net_pins_are_skipped_but_target_is_reachable() {
        let grid = DenseGrid::new(10, 10);
        let mut constraints = Constraints::default();
        constraints.blocked_cells.insert(p(4, 2));
        constraints.blocked_cells.insert(p(6, 2));
        let path = route(&grid, p(2, 2), p(6, 2), &constraints).unwrap();
        assert!(!polyline::cells(&path).contains(&p(4, 2)));
        assert_eq!(path.last(), Some(&p(6, 2)));
    }

    #[test]
    fn same_query_same_path() {
        let mut grid = DenseGrid::new(15, 15);
        grid.set_obstacle(p(6, 6));
        grid.set_obstacle(p(7, 6));
        let a = route(&grid, p(1, 6), p(12, 9), &Constraints::default()).unwrap();
        let b = route(&grid, p(1, 6), p(12, 9), &Constraints::default()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn falls_back_to_full_board_outside_window() {
        let mut grid = DenseGrid::new(30, 30);
        // Wall with a gap far outside the default window.
        for r in 0..29 {
            grid.set_obstacle(p(10, r));
        }
        let cfg = RoutingConfig {
            window_margin: 2,
            ..RoutingConfig::default()
        };
        let path = AStar::new()
            .search(&grid, p(8, 2), p(12, 2), &Constraints::default(), &cfg)
            .unwrap();
        assert!(polyline::cells(&path).contains(&p(10, 29)));
    }

    #[test]
    fn l_route_goes_horizontal_first() {
        assert_eq!(l_route(p(1, 1), p(4, 5)), vec![p(1, 1), p(4, 1), p(4, 5)]);
        assert_eq!(l_route(p(1, 1), p(1, 5)), vec![p(1, 1), p(1, 5)]);
    }
}
