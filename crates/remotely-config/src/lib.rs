// crates/remotely-config/src/lib.rs
// ============================================================================
// Module: Remotely Config Library
// Description: Configuration file model, validation, and registry wiring.
// Purpose: Single source of truth for remotely.toml semantics.
// Dependencies: remotely-core, serde, toml
// ============================================================================

//! ## Overview
//! `remotely-config` loads a `remotely.toml` file, validates it fail-closed,
//! and applies it to an [`remotely_core::AppRegistry`] in one atomic step.
//! It also builds the request executor and audit sink the file describes.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;
pub mod examples;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
pub use examples::config_toml_example;

#[cfg(test)]
mod tests;
