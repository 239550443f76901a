//! Mention extraction and mention-graph cycle analysis.
//!
//! # Responsibility
//! - Parse `@id` tokens out of raw note text with their character offsets.
//! - Decide whether a proposed set of mention edges closes a cycle.
//!
//! # Invariants
//! - Parsing and cycle analysis are pure: no storage or I/O access.
//! - The persisted mention graph must stay acyclic at all times; every write
//!   path runs the validator before touching storage.

pub mod graph;
pub mod parser;
