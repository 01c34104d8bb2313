//! Fileset synchronization
//!
//! [`Distributor::distribute`] runs the pipeline for a catalogue:
//! [`SourceResolver`] → [`staging::fetch`] → [`reconciler::reconcile`] per
//! destination.

pub mod engine;
pub mod reconciler;
pub mod resolver;
pub mod staging;

pub use engine::Distributor;
pub use reconciler::reconcile;
pub use resolver::SourceResolver;
pub use staging::fetch;
