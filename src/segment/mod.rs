//! Shared-memory screen segment
//!
//! The externally visible mirror of the captured terminal: a fixed
//! binary layout (header plus flat cell array) that unrelated reader
//! processes parse by offset alone.

pub mod cell;
pub mod layout;
pub mod store;

pub use cell::{CellColor, ScreenCell, CELL_SIZE, COLOR_LEVEL_BRIGHT, COLOR_LEVEL_NORMAL};
pub use store::ScreenSegment;
