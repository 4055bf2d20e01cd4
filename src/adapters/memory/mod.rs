//! In-Memory Adapters - Off-chain Custody, Swaps, Roles and Time
//!
//! Back the engine when it runs as a standalone service or in tests:
//! - `MemoryBank`: token and native custody balances
//! - `OracleSwapRouter`: swaps settled at oracle prices
//! - `StaticAgentAuthority`: configured agent grants
//! - `SystemClock` / `ManualClock`: wall and replay time

pub mod authority;
pub mod bank;
pub mod clock;
pub mod router;

pub use authority::StaticAgentAuthority;
pub use bank::{CustodyEntry, MemoryBank};
pub use clock::{ManualClock, SystemClock};
pub use router::OracleSwapRouter;
