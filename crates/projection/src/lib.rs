//! Projection models: how tiles and points land on screen under the flat
//! map and the globe.

pub mod clipping;
pub mod error_correction;
pub mod flat;
pub mod model;
pub mod spherical;
pub mod transform;

pub use clipping::*;
pub use error_correction::*;
pub use flat::*;
pub use model::*;
pub use spherical::*;
pub use transform::*;
