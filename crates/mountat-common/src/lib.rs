//! # mountat-common
//!
//! Shared mount request model, error definitions, configuration, and
//! constants used across the entire mountat workspace.
//!
//! This crate is the leaf of the dependency graph: it depends on no other
//! internal crate and provides the primitives the isolation mechanisms and
//! the benchmark driver build upon.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod config;
pub mod constants;
pub mod error;
pub mod types;
