pub mod pricing;
pub mod usage;

pub use pricing::*;
pub use usage::*;
