//! entigen-codegen
//!
//! This crate implements:
//!  1) Model building (`build_model`): classification of descriptor services
//!     into typed entity and action definitions, with ordering and uniqueness
//!     invariants,
//!  2) Source generation (`generate`): skeleton, concrete, test, and
//!     registration artifacts, with structure-aware merges into existing
//!     hand-edited files,
//!  3) Error types (`ModelError`, `GenerationError`).

pub mod error;
pub mod names;
pub mod model;
pub mod render;
pub mod merge;
pub mod generator;

pub use generator::generate;
pub use model::build_model;
