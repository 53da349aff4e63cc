pub mod mercator;
pub mod precision;
pub mod vec;

pub use glam::{DMat3, DMat4, DVec2, DVec3, DVec4};
pub use mercator::*;
pub use precision::*;
pub use vec::*;
