use super::rect::GridRect;
use rstar::{AABB, RTree};

/// R-tree over inclusive grid rectangles; rectangles that share a cell
/// border intersect.
pub struct SpatialIndex {
    tree: RTree<IndexedRect>,
}

struct IndexedRect {
    rect: GridRect,
    id: usize,
}

impl rstar::RTreeObject for IndexedRect {
    type Envelope = AABB<[i32; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(
            [self.rect.min.col, self.rect.min.row],
            [self.rect.max.col, self.rect.max.row],
        )
    }
}

impl Default for SpatialIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl SpatialIndex {
    pub fn new() -> Self {
        Self { tree: RTree::new() }
    }

    pub fn insert(&mut self, rect: GridRect, id: usize) {
        self.tree.insert(IndexedRect { rect, id });
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Ids of every stored rectangle intersecting `rect`, sorted ascending.
    pub fn query(&self, rect: GridRect) -> Vec<usize> {
        let aabb = AABB::from_corners([rect.min.col, rect.min.row], [rect.max.col, rect.max.row]);
        let mut ids: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&aabb)
            .map(|item| item.id)
            .collect();
        ids.sort_unstable();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::coord::GridPos;

    #[test]
    fn query_includes_border_contacts() {
        let mut index = SpatialIndex::new();
        index.insert(GridRect::new(GridPos::new(0, 0), GridPos::new(3, 0)), 7);
        index.insert(GridRect::new(GridPos::new(6, 6), GridPos::new(8, 9)), 2);
        assert_eq!(index.len(), 2);

        let window = GridRect::new(GridPos::new(3, 0), GridPos::new(6, 6));
        assert_eq!(index.query(window), vec![2, 7]);

        let miss = GridRect::new(GridPos::new(4, 1), GridPos::new(5, 5));
        assert!(index.query(miss).is_empty());
    }
}
