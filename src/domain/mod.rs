//! Domain layer - pure business logic with no external dependencies.
//!
//! This layer contains the core concepts and invariants of publish throttling:
//! - Publish rate caps per window
//! - Window budget accounting and admission decisions
//! - Topic naming
//!
//! All types in this layer are pure and easily testable.

pub mod budget;
pub mod rate;
pub mod topic;
