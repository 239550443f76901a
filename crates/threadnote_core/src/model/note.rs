//! Note and mention domain records.
//!
//! # Responsibility
//! - Define `NoteId`, the note read/write models and the mention record.
//! - Validate structural invariants before persistence.
//!
//! # Invariants
//! - `NoteId` is exactly `NOTE_ID_LEN` ASCII alphanumeric characters.
//! - `depth == 0` iff `parent_id` is `None`; `depth` is capped at `MAX_DEPTH`.
//! - A reply never chooses its own hidden flag; it inherits the parent's.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

/// Length of a note identifier in characters.
pub const NOTE_ID_LEN: usize = 6;

/// Maximum nesting depth: 0 is a root note, 1 is a direct reply.
pub const MAX_DEPTH: u32 = 1;

/// Maximum note content length in characters.
pub const MAX_CONTENT_LEN: usize = 1000;

const ID_ALPHABET: &[u8; 62] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Stable fixed-length alphanumeric note identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NoteId(String);

/// Error for malformed note identifier input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidNoteId(pub String);

impl Display for InvalidNoteId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid note id `{}`: expected exactly {NOTE_ID_LEN} alphanumeric characters",
            self.0
        )
    }
}

impl Error for InvalidNoteId {}

impl NoteId {
    /// Parses a note id, requiring exactly `NOTE_ID_LEN` ASCII alphanumerics.
    pub fn parse(value: &str) -> Result<Self, InvalidNoteId> {
        if value.len() == NOTE_ID_LEN && value.bytes().all(|b| b.is_ascii_alphanumeric()) {
            Ok(Self(value.to_string()))
        } else {
            Err(InvalidNoteId(value.to_string()))
        }
    }

    /// Generates a fresh random note id.
    ///
    /// Uses UUID v4 entropy folded into the alphanumeric alphabet, so ids stay
    /// URL-safe and uniformly short without a dedicated RNG dependency.
    pub fn generate() -> Self {
        let mut seed = Uuid::new_v4().as_u128();
        let mut chars = Vec::with_capacity(NOTE_ID_LEN);
        for _ in 0..NOTE_ID_LEN {
            let index = (seed % ID_ALPHABET.len() as u128) as usize;
            chars.push(ID_ALPHABET[index]);
            seed /= ID_ALPHABET.len() as u128;
        }
        // The alphabet is ASCII, so the bytes always form a valid string.
        Self(String::from_utf8(chars).unwrap_or_default())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for NoteId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for NoteId {
    type Err = InvalidNoteId;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl TryFrom<String> for NoteId {
    type Error = InvalidNoteId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<NoteId> for String {
    fn from(value: NoteId) -> Self {
        value.0
    }
}

/// Validation failures for note write models.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoteValidationError {
    /// `depth` exceeds `MAX_DEPTH`.
    DepthOutOfRange { depth: u32, max_depth: u32 },
    /// `depth` and `parent_id` presence disagree.
    ParentDepthMismatch { depth: u32, has_parent: bool },
}

impl Display for NoteValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DepthOutOfRange { depth, max_depth } => {
                write!(f, "note depth {depth} exceeds maximum {max_depth}")
            }
            Self::ParentDepthMismatch { depth, has_parent } => write!(
                f,
                "note depth {depth} is inconsistent with parent presence {has_parent}"
            ),
        }
    }
}

impl Error for NoteValidationError {}

/// Write model for a new note; timestamps are assigned by storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewNote {
    /// Stable note id, generated before persistence.
    pub note_id: NoteId,
    /// Owning author reference.
    pub author_id: String,
    /// Optional channel reference; opaque to this core.
    pub channel_id: Option<String>,
    /// Raw note text.
    pub content: String,
    /// Parent note id. `None` means root note.
    pub parent_id: Option<NoteId>,
    /// Nesting level, 0 for roots.
    pub depth: u32,
    /// Visibility flag; replies always carry the parent's value.
    pub is_hidden: bool,
}

impl NewNote {
    /// Checks structural invariants prior to persistence.
    pub fn validate(&self) -> Result<(), NoteValidationError> {
        if self.depth > MAX_DEPTH {
            return Err(NoteValidationError::DepthOutOfRange {
                depth: self.depth,
                max_depth: MAX_DEPTH,
            });
        }
        let has_parent = self.parent_id.is_some();
        if (self.depth == 0) == has_parent {
            return Err(NoteValidationError::ParentDepthMismatch {
                depth: self.depth,
                has_parent,
            });
        }
        Ok(())
    }
}

/// Read model for a stored note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Stable note id.
    pub note_id: NoteId,
    /// Owning author reference.
    pub author_id: String,
    /// Optional channel reference.
    pub channel_id: Option<String>,
    /// Raw note text.
    pub content: String,
    /// Parent note id. `None` means root note.
    pub parent_id: Option<NoteId>,
    /// Nesting level, 0 for roots.
    pub depth: u32,
    /// Visibility flag.
    pub is_hidden: bool,
    /// Creation timestamp in epoch milliseconds.
    pub created_at: i64,
    /// Update timestamp in epoch milliseconds.
    pub updated_at: i64,
}

impl Note {
    /// Returns whether this note is a root note.
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Stored mention edge: `from_note_id`'s content references `to_note_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mention {
    /// Stable mention row id.
    pub mention_id: Uuid,
    /// Note containing the `@id` token.
    pub from_note_id: NoteId,
    /// Referenced note.
    pub to_note_id: NoteId,
    /// Zero-based character offset of the `@` in the source content.
    pub position: usize,
    /// Creation timestamp in epoch milliseconds.
    pub created_at: i64,
}
