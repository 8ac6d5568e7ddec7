// File I/O operations

pub mod error;
pub mod export;
pub mod import;
