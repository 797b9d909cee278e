/// 24h change estimation: delta math and the Solana change resolver

pub mod delta;
pub mod resolver;

pub use delta::{holding_delta_usd, pct_from_prices};
pub use resolver::{ChangeResolution, ChangeResolver, ChangeSource};
