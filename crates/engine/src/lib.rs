// GridHub engine - pure data model and derivations, no I/O

pub mod aggregate;
pub mod cell;
pub mod edit;
pub mod filter;
pub mod grid;

pub use cell::CellValue;
pub use grid::{Grid, Row};
