//! Loads batches of weather observation records into a rate limited document store.

#[macro_use]
extern crate tracing;
#[macro_use]
extern crate async_trait;

pub mod core;
pub mod loader;
pub mod source;
pub mod store;

pub use observations;
