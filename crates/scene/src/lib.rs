pub mod camera;
pub mod visibility;

pub use camera::*;
pub use visibility::*;
