//! Natural language query handling.
//!
//! This module provides:
//! - Rule-based intent classification with parameter extraction
//! - The file read policy (size limit, text export, previews)
//! - The dispatcher that turns an intent into a single [`QueryResult`]

pub mod classifier;
pub mod content;
pub mod dispatcher;
pub mod types;

pub use classifier::*;
pub use content::*;
pub use dispatcher::*;
pub use types::*;
