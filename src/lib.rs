// Core types, address classification and errors
pub mod core;
pub mod config;

// Upstream access and 24h change estimation
pub mod gateway;
pub mod change;

// Scan orchestration and portfolio view
pub mod scanner;
pub mod aggregate;
pub mod render;

pub mod util;

// Re-export commonly used types for convenience
pub use crate::core::*;
pub use aggregate::{aggregate, Aggregation, PortfolioView};
pub use config::Config;
pub use gateway::{ProviderApi, ProxyClient};
pub use render::{RenderScheduler, RenderSink};
pub use scanner::{ScanStatus, ScanSummary, ScannerContext};
