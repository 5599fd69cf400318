pub mod algo;
pub mod autorouter;
pub mod bridge;
pub mod connect;
pub mod error;
pub mod grid;
pub mod net_group;
pub mod repair;
pub mod utils;

pub use autorouter::{AutorouteResult, route};
pub use error::RouteError;
