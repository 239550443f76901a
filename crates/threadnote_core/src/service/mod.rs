//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Enforce every note/mention invariant before any write happens.
//!
//! # Invariants
//! - Validation failures (content, depth, hidden, cycles) abort before the
//!   first storage write.

pub mod note_service;
pub mod thread_service;
