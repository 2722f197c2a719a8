//! sqlscope Core - Engine contract and shared types for the sqlscope workspace
//!
//! This crate provides the fundamental types that all other sqlscope crates
//! depend on. It defines:
//!
//! - `AnalysisEngine` - Trait for the opaque scanner/parser/analyzer engine
//! - `BufferHandle` - Single-owner wrapper around engine result buffers
//! - `ScriptKey`, `QualifiedObjectId`, `GraphConnectionId` - Shared identifiers
//! - Structured views over engine results (tokens, analysis, cursor, layout)

mod analysis;
mod buffer;
mod engine;
mod error;
mod ids;

pub use analysis::*;
pub use buffer::*;
pub use engine::*;
pub use error::*;
pub use ids::*;
