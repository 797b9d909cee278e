pub mod address;
pub mod errors;
pub mod types;

pub use address::*;
pub use errors::*;
pub use types::*;
