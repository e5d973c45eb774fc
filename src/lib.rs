//! Loopgate - guarantee-gated loop execution
//!
//! Loopgate drives multi-phase loop executions through a persisted state
//! machine, gating skill completion and gate approval on declared guarantees
//! validated against the real world (files, proof artifacts, git state).

pub mod collab;
pub mod domain;
pub mod engine;
pub mod error;
pub mod evidence;
pub mod guarantee;
pub mod id;
pub mod registry;

pub use error::{LoopgateError, Result};
