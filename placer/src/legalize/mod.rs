pub mod tetris;

pub use tetris::{Slot, TetrisLegalizer};
