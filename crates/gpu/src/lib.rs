//! GPU-facing collaborators of the projection engine, expressed as traits and
//! plain data so that hosts can back them with any graphics API.

pub mod mesh;
pub mod readback;

pub use mesh::*;
pub use readback::*;
