pub mod astar;

pub use astar::{AStar, Constraints, l_route};
