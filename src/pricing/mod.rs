pub mod error;
pub mod resolver;
pub mod source;

pub use error::PricingError;
pub use resolver::{PricingLookup, PricingResolver};
pub use source::{PriceList, PriceListSource};
