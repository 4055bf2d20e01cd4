//! Price Feed Adapters
//!
//! - `StaticPriceFeed`: configured rounds, updated by replayed price ticks

pub mod static_feed;

pub use static_feed::StaticPriceFeed;
