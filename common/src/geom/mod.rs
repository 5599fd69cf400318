pub mod coord;
pub mod point;
pub mod polyline;
pub mod rect;
pub mod rtree;
pub mod segment;
