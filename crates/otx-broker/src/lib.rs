//! The opaque Broker Gateway interface (C3) and a deterministic in-memory
//! implementation for testing/wiring.

pub mod gateway;
pub mod paper;

pub use gateway::{BrokerGateway, BrokerGatewayError, HistoricalDataRequest, Margins};
pub use paper::PaperBrokerGateway;
