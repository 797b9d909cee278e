pub mod cache;
pub mod display;
pub mod extract;
