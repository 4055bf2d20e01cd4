//! Ports Layer - Hexagonal Architecture Boundaries
//!
//! Defines the interfaces (traits) that the usecases layer requires from
//! the outside world. Adapters implement these traits.
//!
//! Port categories:
//! - `PriceFeed`: Per-token USD price rounds
//! - `SwapRouter`: Batched exact-input swaps on custody balances
//! - `TokenBank`: Token and native custody transfers
//! - `AgentAuthority`: Agent role lookups
//! - `Clock`: Wall time for feed freshness

pub mod agent_authority;
pub mod clock;
pub mod price_feed;
pub mod swap_router;
pub mod token_bank;

pub use agent_authority::AgentAuthority;
pub use clock::Clock;
pub use price_feed::{FeedRound, PriceFeed};
pub use swap_router::{SwapOrder, SwapRouter};
pub use token_bank::{TokenBank, Transfer};
