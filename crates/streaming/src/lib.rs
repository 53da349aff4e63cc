pub mod coverage;
pub mod tile;

pub use coverage::*;
pub use tile::*;
