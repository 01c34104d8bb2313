//! Distribute Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types and utilities for the fileset distribution workspace.
//!
//! # Overview
//!
//! - **Error Handling**: [`CommonError`] and the [`Result`] alias
//! - **Logging**: subscriber initialisation driven by [`logging::LogConfig`]
//! - **Naming**: date normalization and wildcard matching for file names
//!
//! # Example
//!
//! ```
//! use distribute_common::naming::normalize;
//!
//! assert_eq!(normalize("out/f_20230101.csv"), "out/f_{DATE}.csv");
//! ```

pub mod error;
pub mod logging;
pub mod naming;

// Re-export commonly used types
pub use error::{CommonError, Result};
