//! Domain model for threaded notes and mentions.
//!
//! # Responsibility
//! - Define the canonical note and mention records used by core logic.
//! - Enforce structural invariants (depth cap, parent/depth consistency).
//!
//! # Invariants
//! - Every note is identified by a stable fixed-length `NoteId`.
//! - `depth` never exceeds `MAX_DEPTH`; root notes have no parent.

pub mod note;
