//! Common utilities for the extcss workspace.
//!
//! This crate provides shared infrastructure used by all extcss components:
//! - **Warning System** - per-owner de-duplicated diagnostics for runaway-loop guards
//!   and malformed rules, routed through the `log` facade

pub mod warning;
