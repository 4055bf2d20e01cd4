//! Chain Adapters - On-chain Price Feeds via alloy-rs
//!
//! - RPC provider management with chain id validation
//! - Chainlink aggregator reads implementing the `PriceFeed` port

pub mod chainlink;
pub mod provider;

pub use chainlink::{AggregatorBinding, ChainlinkFeed};
pub use provider::ChainProvider;
