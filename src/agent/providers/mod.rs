//! Agent host implementations.

pub mod foundry;

pub use foundry::FoundryHost;
