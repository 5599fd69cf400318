use perfgrid_common::geom::coord::GridPos;
use perfgrid_common::geom::rect::GridRect;

/// Occupied column ranges of one board row, inclusive and merged.
#[derive(Clone, Debug)]
struct RowIntervals {
    blockages: Vec<(i32, i32)>,
    max_col: i32,
}

impl RowIntervals {
    fn new(max_col: i32) -> Self {
        Self {
            blockages: Vec::new(),
            max_col,
        }
    }

    fn add_occupancy(&mut self, start: i32, end: i32) {
        self.blockages.push((start, end));
        self.blockages.sort_unstable();

        let mut merged: Vec<(i32, i32)> = Vec::with_capacity(self.blockages.len());
        for &(next_start, next_end) in &self.blockages {
            match merged.last_mut() {
                Some((_, current_end)) if next_start <= *current_end + 1 => {
                    *current_end = (*current_end).max(next_end);
                }
                _ => merged.push((next_start, next_end)),
            }
        }
        self.blockages = merged;
    }

    fn merge(&mut self, other: &RowIntervals) {
        for &(s, e) in &other.blockages {
            self.add_occupancy(s, e);
        }
    }

    /// Column closest to `target` where `width` free cells start, with its
    /// distance from `target`. Ties go to the left gap.
    fn find_best_slot(&self, target: i32, width: i32) -> Option<(i32, i32)> {
        let mut best: Option<(i32, i32)> = None;
        let mut gap_start = 0;

        let ends = self
            .blockages
            .iter()
            .copied()
            .chain(std::iter::once((self.max_col + 1, self.max_col + 1)));
        for (occupied_start, occupied_end) in ends {
            let gap_end = occupied_start - 1;
            if gap_end - gap_start + 1 >= width {
                let col = target.clamp(gap_start, gap_end - width + 1);
                let dist = (col - target).abs();
                if best.is_none_or(|(_, d)| dist < d) {
                    best = Some((col, dist));
                }
            }
            gap_start = gap_start.max(occupied_end + 1);
        }
        best
    }
}

/// A free slot for a `width` x `height` hull.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Slot {
    pub min: GridPos,
    pub col_dist: i32,
    pub row_dist: i32,
}

/// Row-by-row free-space tracker for the board.
pub struct TetrisLegalizer {
    rows: Vec<RowIntervals>,
}

impl TetrisLegalizer {
    pub fn new(width: i32, height: i32) -> Self {
        Self {
            rows: (0..height.max(0)).map(|_| RowIntervals::new(width - 1)).collect(),
        }
    }

    fn num_rows(&self) -> i32 {
        self.rows.len() as i32
    }

    /// Marks `rect` as occupied; the part outside the board is ignored.
    pub fn block(&mut self, rect: GridRect) {
        let top = rect.min.row.max(0);
        let bottom = rect.max.row.min(self.num_rows() - 1);
        for r in top..=bottom {
            self.rows[r as usize].add_occupancy(rect.min.col, rect.max.col);
        }
    }

    /// Best column for a hull whose top row is `top`.
    fn slot_in_rows(&self, top: i32, height: i32, target_col: i32, width: i32) -> Option<(i32, i32)> {
        if top < 0 || top + height > self.num_rows() {
            return None;
        }
        let mut band = self.rows[top as usize].clone();
        for r in top + 1..top + height {
            band.merge(&self.rows[r as usize]);
        }
        band.find_best_slot(target_col, width)
    }

    /// One slot per row within `radius` rows of `target`, nearest rows
    /// first, below before above.
    pub fn candidates(&self, target: GridPos, width: i32, height: i32, radius: i32) -> Vec<Slot> {
        let mut slots = Vec::new();
        for offset in 0..=radius.max(0) {
            let dirs: &[i32] = if offset == 0 { &[0] } else { &[1, -1] };
            for &dir in dirs {
                let top = target.row + dir * offset;
                if let Some((col, col_dist)) = self.slot_in_rows(top, height, target.col, width) {
                    slots.push(Slot {
                        min: GridPos::new(col, top),
                        col_dist,
                        row_dist: offset,
                    });
                }
            }
        }
        slots
    }
}
