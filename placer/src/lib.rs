pub mod layout;
pub mod legalize;
pub mod wirelength;

pub use layout::{LayoutResult, layout};
