pub mod frame;
pub mod transition;

pub use frame::*;
pub use transition::*;
