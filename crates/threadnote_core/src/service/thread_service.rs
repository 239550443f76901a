//! Thread assembly use-case service.
//!
//! # Responsibility
//! - Reconstruct a full thread from any note inside it.
//! - List the direct children of one note.
//!
//! # Invariants
//! - The upward walk and downward traversal are written generally: they keep
//!   working if the depth cap is ever raised.
//! - Thread output is sorted by depth, then creation time, then id, so the
//!   result is identical no matter which member the lookup started from.

use crate::model::note::{Note, NoteId};
use crate::repo::note_repo::{NoteRepository, RepoError};
use std::collections::{HashSet, VecDeque};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Service error for thread lookups.
#[derive(Debug)]
pub enum ThreadServiceError {
    /// Target note does not exist.
    NoteNotFound(NoteId),
    /// Persistence-layer failure.
    Repo(RepoError),
}

impl Display for ThreadServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoteNotFound(id) => write!(f, "note not found: {id}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ThreadServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::NoteNotFound(_) => None,
        }
    }
}

impl From<RepoError> for ThreadServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(note_id) => Self::NoteNotFound(note_id),
            other => Self::Repo(other),
        }
    }
}

/// Thread assembly facade over the note repository.
pub struct ThreadService<R: NoteRepository> {
    repo: R,
}

impl<R: NoteRepository> ThreadService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Returns the whole thread containing `note_id`, root first.
    ///
    /// Resolves the root by walking parent references upward, then collects
    /// the thread breadth-first over children edges. Output ordering is
    /// `(depth ASC, created_at ASC, note_id ASC)`.
    pub fn get_thread(&self, note_id: &NoteId) -> Result<Vec<Note>, ThreadServiceError> {
        let start = self
            .repo
            .get_note(note_id)?
            .ok_or_else(|| ThreadServiceError::NoteNotFound(note_id.clone()))?;
        let root = self.resolve_root(start)?;

        let mut thread = Vec::new();
        let mut queue = VecDeque::from([root]);
        while let Some(current) = queue.pop_front() {
            let children = self.repo.list_children(&current.note_id)?;
            thread.push(current);
            queue.extend(children);
        }

        thread.sort_by(|a, b| {
            (a.depth, a.created_at, &a.note_id).cmp(&(b.depth, b.created_at, &b.note_id))
        });
        Ok(thread)
    }

    /// Returns the direct children of `note_id`, oldest-created first.
    pub fn get_children(&self, note_id: &NoteId) -> Result<Vec<Note>, ThreadServiceError> {
        self.repo
            .get_note(note_id)?
            .ok_or_else(|| ThreadServiceError::NoteNotFound(note_id.clone()))?;
        self.repo.list_children(note_id).map_err(Into::into)
    }

    fn resolve_root(&self, start: Note) -> Result<Note, ThreadServiceError> {
        let mut current = start;
        let mut visited: HashSet<NoteId> = HashSet::new();
        visited.insert(current.note_id.clone());

        while let Some(parent_id) = current.parent_id.clone() {
            if !visited.insert(parent_id.clone()) {
                return Err(ThreadServiceError::Repo(RepoError::InvalidData(format!(
                    "parent chain of {} loops back to {parent_id}",
                    current.note_id
                ))));
            }
            current = self
                .repo
                .get_note(&parent_id)?
                .ok_or(ThreadServiceError::NoteNotFound(parent_id))?;
        }
        Ok(current)
    }
}
