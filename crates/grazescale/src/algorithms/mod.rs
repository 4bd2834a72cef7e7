pub mod enhancement;
pub mod cleanup;
pub mod extraction;
pub mod measurement;

pub use enhancement::*;
pub use cleanup::*;
pub use extraction::*;
pub use measurement::*;
