//! Shopping Assistant Orchestrator
//!
//! A backend service that lets a client converse with an AI assistant
//! capable of two actions: searching a static product catalog and
//! converting currency amounts using live exchange rates.
//!
//! PIPELINE:
//! QUERY → ORACLE → TOOL CALLS? → EXECUTE → FEED BACK → FINAL ANSWER

pub mod agent;
pub mod api;
pub mod catalog;
pub mod config;
pub mod error;
pub mod models;
pub mod oracle;
pub mod rates;
pub mod tools;

pub use error::Result;

// Re-export common types
pub use models::*;
