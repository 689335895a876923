//! Configuration loading for concierge.

mod settings;

pub use settings::*;
