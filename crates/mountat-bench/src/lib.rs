//! # mountat-bench
//!
//! Measures and verifies directory-relative mounting:
//! - **Fixtures**: overlay layouts with N numbered lower layers whose files
//!   identify the layer they came from.
//! - **Verification**: walks a mounted fixture and checks every file.
//! - **Driver**: times the direct baseline and both isolated mechanisms
//!   over repeated mount/unmount cycles.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod driver;
pub mod fixture;
pub mod verify;
