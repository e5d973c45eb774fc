//! Guarantee validation subsystem.
//!
//! Aggregates applicable guarantees for a skill or gate, runs the
//! type-specific validators, and tracks acknowledgments and failures.

pub mod ack;
pub mod context;
pub mod failures;
pub mod result;
pub mod service;
pub mod validators;

pub use ack::{AckStore, Acknowledgment, ResolutionType};
pub use context::ValidationContext;
pub use failures::{FailureLog, GuaranteeFailureRecord};
pub use result::{Evidence, GuaranteeResult, ValidationSummary};
pub use service::GuaranteeService;
