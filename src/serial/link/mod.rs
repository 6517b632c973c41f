pub mod driver;
pub mod reader;
pub mod types;

pub use driver::{LinkBuilder, LinkHandle};
pub use types::{DeliveryReceipt, LinkConfig, LinkConnector, LinkIo, LinkMetrics, LinkState};
