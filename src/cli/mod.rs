//! CLI module for the concierge command-line interface.
//!
//! Command handlers run queries through a local [`concierge::Dispatcher`]
//! and print results as text or JSON.

mod commands;
mod output;

pub use commands::*;
