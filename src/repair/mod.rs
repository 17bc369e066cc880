//! Check, diagnose, rewrite: the per-artifact repair cycle.

pub mod diagnostics;
pub mod engine;
pub mod verdict;
