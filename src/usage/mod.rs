pub mod pricing;
pub mod scanner;
pub mod types;

pub use pricing::{PriceSource, PricingTable, RateCard};
pub use types::{ContextPoint, UsageRecord, UsageSummary};
