pub mod core;
pub mod error;
pub mod footprint;
pub mod indices;
pub mod netlist;
pub mod parser;
