pub mod labels;
pub mod placement;
pub mod projector;
pub mod symbol;

pub use labels::*;
pub use placement::*;
pub use projector::*;
pub use symbol::*;
