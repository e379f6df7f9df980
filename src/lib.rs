//! idveil - identity masking and runtime interception engine
//!
//! This library decides which device, network, advertising and location
//! identifiers an application observes, and hides the interception
//! machinery from introspection inside the hosted process.
//!
//! - [`resolver`] resolves per-app identifier values from profiles, with
//!   correlated derivation for grouped identifiers
//! - [`interception`] registers handlers for a fixed catalog of call-sites
//!   and runs them with fault isolation
//! - [`concealment`] filters stack captures, metadata reads and package
//!   queries
//! - [`engine`] attaches all of it to one process

pub mod cli;
pub mod concealment;
pub mod config;
pub mod correlation;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod generators;
pub mod identifier;
pub mod interception;
pub mod resolver;

pub use engine::MaskingEngine;
pub use error::MaskError;
