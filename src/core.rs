//! Everything around the load itself: configuration, logging, command line

pub mod args;
pub mod config;
pub mod log;

pub use log::init_logging;
