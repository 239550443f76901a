//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts for notes and mentions.
//! - Isolate SQLite query details from service/business orchestration.
//!
//! # Invariants
//! - Multi-row writes (note + mention rows, cascade deletes) are transactional.
//! - Repository APIs return semantic errors (`NotFound`) in addition to DB
//!   transport errors.

pub mod mention_repo;
pub mod note_repo;
