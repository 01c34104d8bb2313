//! Distribute Engine
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Synchronizes filesets from the primary object store to their
//! destinations.
//!
//! # Overview
//!
//! - [`datastore`]: backend capability traits and the S3, FTP and local adapters
//! - [`catalogue`]: client for the export products service
//! - [`distribute`]: source resolution, staging, reconciliation and the engine
//! - [`report`]: warnings, errors and counts of a run
//! - [`request`]: requests, export notifications and responses
//!
//! # Example
//!
//! ```rust,ignore
//! use distribute_engine::{config::Settings, distribute::Distributor};
//!
//! let settings = Settings::load()?;
//! let distributor = Distributor::from_settings(&settings)?;
//! let report = distributor.distribute("gebieden", Some("buurten")).await?;
//! ```

pub mod catalogue;
pub mod config;
pub mod datastore;
pub mod distribute;
pub mod error;
pub mod fileset;
pub mod report;
pub mod request;

pub use error::{DistributeError, Result};
