//! Shared utilities.
//!
//! Currently only the in-memory test doubles used across the crate.

#[cfg(test)]
pub mod testutil;
