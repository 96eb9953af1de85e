//! Shared domain types for the tradewatch alerting engine.
//!
//! Everything that crosses a crate boundary lives here: metric samples,
//! alert rules with their comparison conditions, the alert record and its
//! lifecycle status, and the per-channel notification attempt audit record.

pub mod types;
