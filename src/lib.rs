//! Droidloc - Batch translation of Android string resources
//!
//! Loads the entries of a `strings.xml` file, translates the translatable
//! ones into several languages at once through a pluggable provider, and
//! merges the results into the matching `values-<lang>/strings.xml` files.

pub mod cli;
pub mod config;
pub mod error;
pub mod job;
pub mod language;
pub mod orchestrator;
pub mod resource;
pub mod session;
pub mod translate;
