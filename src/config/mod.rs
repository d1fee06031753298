//! Configuration: schema and JSON file store

mod schema;
mod store;

pub use schema::{BridgeConfig, CodecConfig, OutputConfig};
pub use store::ConfigStore;
