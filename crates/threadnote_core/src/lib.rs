//! Core domain logic for the threaded note service.
//! This crate is the single source of truth for note hierarchy and
//! mention-graph invariants.

pub mod db;
pub mod logging;
pub mod mention;
pub mod model;
pub mod repo;
pub mod service;

pub use logging::{default_log_level, init_logging, logging_status};
pub use mention::graph::{build_graph, detect_circular_reference, MentionGraph};
pub use mention::parser::{extract_mentions, mention_positions, MentionHit};
pub use model::note::{
    InvalidNoteId, Mention, NewNote, Note, NoteId, NoteValidationError, MAX_CONTENT_LEN,
    MAX_DEPTH, NOTE_ID_LEN,
};
pub use repo::mention_repo::MentionRepository;
pub use repo::note_repo::{
    CascadeOutcome, NoteRepository, RepoError, RepoResult, RootNoteQuery, SqliteNoteRepository,
};
pub use service::note_service::{
    CreateNoteRequest, NoteService, NoteServiceError, RootNoteItem, RootNotesPage,
};
pub use service::thread_service::{ThreadService, ThreadServiceError};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
