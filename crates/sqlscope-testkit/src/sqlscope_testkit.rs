//! sqlscope Testkit - an in-process reference engine
//!
//! Implements the `AnalysisEngine` contract well enough to drive integration
//! tests without the production engine: a hand-rolled SQL tokenizer for the
//! scan stage, `sqlparser` for parse-stage validation, and token-driven name
//! resolution for tables, references and join edges. Not a SQL frontend; the
//! production engine remains an external collaborator.

mod analyze;
mod engine;
mod tokenizer;

pub use engine::*;
