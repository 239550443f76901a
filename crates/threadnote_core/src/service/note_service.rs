//! Note hierarchy use-case service.
//!
//! # Responsibility
//! - Single entry point for note create/update/list/delete.
//! - Enforce depth cap, hidden inheritance, content bounds and mention-graph
//!   acyclicity before touching storage.
//!
//! # Invariants
//! - A reply's depth is `parent.depth + 1` and never exceeds `MAX_DEPTH`.
//! - A reply inherits `is_hidden` from its parent; an explicit `true` from the
//!   caller is rejected, an explicit `false` is overridden silently.
//! - Cycle detection runs before any write; a rejected operation persists
//!   neither note content nor mention rows.
//! - Updates re-check cycles with the note's previous outgoing edges removed
//!   and the new set proposed.

use crate::mention::graph::{build_graph, detect_circular_reference};
use crate::mention::parser::{extract_mentions, mention_positions, MentionHit};
use crate::model::note::{NewNote, Note, NoteId, MAX_CONTENT_LEN, MAX_DEPTH};
use crate::repo::mention_repo::MentionRepository;
use crate::repo::note_repo::{normalize_root_limit, NoteRepository, RepoError, RootNoteQuery};
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Service error for note hierarchy use-cases.
#[derive(Debug)]
pub enum NoteServiceError {
    /// Content is empty after trimming.
    ContentEmpty,
    /// Content exceeds the maximum length.
    ContentTooLong { max: usize, actual: usize },
    /// Referenced parent note does not exist.
    ParentNotFound(NoteId),
    /// Parent already sits at the maximum depth and cannot take replies.
    DepthLimitExceeded { max_depth: u32 },
    /// Caller explicitly requested hidden status on a reply.
    InvalidHiddenReply,
    /// Proposed mention edges would close a cycle.
    CircularReference { from: NoteId, targets: Vec<NoteId> },
    /// Target note does not exist or is not owned by the caller.
    NoteNotFound(NoteId),
    /// Internal consistency mismatch between write and read-back.
    InconsistentState(&'static str),
    /// Persistence-layer failure.
    Repo(RepoError),
}

impl Display for NoteServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ContentEmpty => write!(f, "note content must not be blank"),
            Self::ContentTooLong { max, actual } => {
                write!(f, "note content length {actual} exceeds maximum {max}")
            }
            Self::ParentNotFound(id) => write!(f, "parent note not found: {id}"),
            Self::DepthLimitExceeded { max_depth } => {
                write!(f, "replies are limited to depth {max_depth}")
            }
            Self::InvalidHiddenReply => {
                write!(f, "replies cannot request hidden status; it is inherited")
            }
            Self::CircularReference { from, targets } => {
                let targets = targets
                    .iter()
                    .map(NoteId::as_str)
                    .collect::<Vec<_>>()
                    .join(",");
                write!(f, "mentions from {from} to [{targets}] would form a cycle")
            }
            Self::NoteNotFound(id) => write!(f, "note not found: {id}"),
            Self::InconsistentState(details) => write!(f, "inconsistent note state: {details}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for NoteServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for NoteServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(note_id) => Self::NoteNotFound(note_id),
            other => Self::Repo(other),
        }
    }
}

/// Request model for creating one note.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateNoteRequest {
    /// Owning author.
    pub author_id: String,
    /// Optional channel reference, stored opaquely.
    pub channel_id: Option<String>,
    /// Raw note text.
    pub content: String,
    /// Parent note id when creating a reply.
    pub parent_id: Option<NoteId>,
    /// Caller-requested visibility. Replies may only pass `false` or nothing.
    pub is_hidden: Option<bool>,
}

/// One root note with its reply count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootNoteItem {
    pub note: Note,
    pub reply_count: u64,
}

/// Page envelope for root-note listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootNotesPage {
    /// Root notes, newest-created first.
    pub items: Vec<RootNoteItem>,
    /// Total roots matching the filter, ignoring pagination.
    pub total: u64,
    /// Whether rows remain past this page.
    pub has_more: bool,
    /// Effective normalized limit used by the query.
    pub applied_limit: u32,
}

/// Note hierarchy service facade over repository implementations.
pub struct NoteService<R: NoteRepository + MentionRepository> {
    repo: R,
}

impl<R: NoteRepository + MentionRepository> NoteService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Creates one note, validating hierarchy and mention-graph invariants.
    pub fn create_note(&self, request: CreateNoteRequest) -> Result<Note, NoteServiceError> {
        validate_content(&request.content)?;

        let (parent_id, depth, is_hidden) = match request.parent_id {
            Some(parent_id) => {
                let parent = self
                    .repo
                    .get_note(&parent_id)?
                    .ok_or_else(|| NoteServiceError::ParentNotFound(parent_id.clone()))?;
                if parent.depth >= MAX_DEPTH {
                    return Err(NoteServiceError::DepthLimitExceeded {
                        max_depth: MAX_DEPTH,
                    });
                }
                if request.is_hidden == Some(true) {
                    return Err(NoteServiceError::InvalidHiddenReply);
                }
                (Some(parent_id), parent.depth + 1, parent.is_hidden)
            }
            None => (None, 0, request.is_hidden.unwrap_or(false)),
        };

        let note_id = NoteId::generate();
        let hits = mention_positions(&request.content);
        self.ensure_acyclic(&note_id, &request.content, &hits, false)?;

        let new_note = NewNote {
            note_id: note_id.clone(),
            author_id: request.author_id,
            channel_id: request.channel_id,
            content: request.content,
            parent_id,
            depth,
            is_hidden,
        };
        self.repo.create_note_with_mentions(&new_note, &hits)?;
        info!(
            "event=note_create module=service status=ok note_id={note_id} depth={depth} mentions={}",
            hits.len()
        );

        self.repo
            .get_note(&note_id)?
            .ok_or(NoteServiceError::InconsistentState(
                "created note not found in read-back",
            ))
    }

    /// Replaces one note's content and its outgoing mentions.
    ///
    /// Depth, parent, hidden flag and author are immutable on update.
    pub fn update_note(
        &self,
        note_id: &NoteId,
        author_id: &str,
        content: &str,
    ) -> Result<Note, NoteServiceError> {
        let existing = self
            .repo
            .get_note(note_id)?
            .filter(|note| note.author_id == author_id)
            .ok_or_else(|| NoteServiceError::NoteNotFound(note_id.clone()))?;
        validate_content(content)?;

        let hits = mention_positions(content);
        self.ensure_acyclic(&existing.note_id, content, &hits, true)?;

        self.repo
            .update_note_with_mentions(note_id, content, &hits)?;
        info!(
            "event=note_update module=service status=ok note_id={note_id} mentions={}",
            hits.len()
        );

        self.repo
            .get_note(note_id)?
            .ok_or(NoteServiceError::InconsistentState(
                "updated note not found in read-back",
            ))
    }

    /// Lists one author's root notes with reply counts and paging metadata.
    pub fn get_root_notes(
        &self,
        author_id: &str,
        limit: Option<u32>,
        offset: u32,
        include_hidden: bool,
    ) -> Result<RootNotesPage, NoteServiceError> {
        let query = RootNoteQuery {
            author_id: author_id.to_string(),
            include_hidden,
            limit,
            offset,
        };
        let notes = self.repo.list_root_notes(&query)?;
        let total = self.repo.count_root_notes(author_id, include_hidden)?;

        let mut items = Vec::with_capacity(notes.len());
        for note in notes {
            let reply_count = self.repo.count_replies(&note.note_id)?;
            items.push(RootNoteItem { note, reply_count });
        }

        let has_more = u64::from(query.offset) + (items.len() as u64) < total;
        Ok(RootNotesPage {
            items,
            total,
            has_more,
            applied_limit: normalize_root_limit(limit),
        })
    }

    /// Gets one note by id; absence is not an error for this read.
    pub fn get_note(&self, note_id: &NoteId) -> Result<Option<Note>, NoteServiceError> {
        self.repo.get_note(note_id).map_err(Into::into)
    }

    /// Deletes one note together with its direct replies and every mention
    /// row touching any removed note.
    pub fn delete_note(&self, note_id: &NoteId, author_id: &str) -> Result<(), NoteServiceError> {
        self.repo
            .get_note(note_id)?
            .filter(|note| note.author_id == author_id)
            .ok_or_else(|| NoteServiceError::NoteNotFound(note_id.clone()))?;

        let outcome = self.repo.delete_note_cascade(note_id)?;
        info!(
            "event=note_delete module=service status=ok note_id={note_id} notes={} mentions={}",
            outcome.deleted_notes, outcome.deleted_mentions
        );
        Ok(())
    }

    /// Rejects the operation when the proposed mention set closes a cycle.
    ///
    /// For updates the note's own stored outgoing edges are excluded before
    /// proposing the new set, so stale self-edges cannot cause false cycles.
    fn ensure_acyclic(
        &self,
        from: &NoteId,
        content: &str,
        hits: &[MentionHit],
        is_update: bool,
    ) -> Result<(), NoteServiceError> {
        if hits.is_empty() {
            return Ok(());
        }

        let targets: Vec<NoteId> = extract_mentions(content).into_iter().collect();
        let stored = self.repo.list_all_mentions()?;
        let graph = if is_update {
            build_graph(stored.iter().filter(|m| &m.from_note_id != from))
        } else {
            build_graph(&stored)
        };

        if detect_circular_reference(from, &targets, &graph) {
            return Err(NoteServiceError::CircularReference {
                from: from.clone(),
                targets,
            });
        }
        Ok(())
    }
}

fn validate_content(content: &str) -> Result<(), NoteServiceError> {
    if content.trim().is_empty() {
        return Err(NoteServiceError::ContentEmpty);
    }
    let actual = content.chars().count();
    if actual > MAX_CONTENT_LEN {
        return Err(NoteServiceError::ContentTooLong {
            max: MAX_CONTENT_LEN,
            actual,
        });
    }
    Ok(())
}
