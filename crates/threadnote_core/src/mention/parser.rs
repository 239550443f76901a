//! `@id` mention token parser.
//!
//! # Responsibility
//! - Extract referenced note ids and their offsets from raw note content.
//!
//! # Invariants
//! - A token is `@` followed by exactly `NOTE_ID_LEN` alphanumerics, taken as
//!   a maximal alphanumeric run; longer or shorter runs are ignored.
//! - Offsets are zero-based character positions of the `@`, in encounter
//!   order, with duplicate ids kept at their distinct offsets.

use crate::model::note::{NoteId, NOTE_ID_LEN};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

static MENTION_TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"@([A-Za-z0-9]+)").expect("valid mention token regex"));

/// One parsed mention occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MentionHit {
    /// Referenced note id.
    pub note_id: NoteId,
    /// Zero-based character offset of the `@` in the content.
    pub offset: usize,
}

/// Returns the distinct note ids referenced by `content`.
pub fn extract_mentions(content: &str) -> BTreeSet<NoteId> {
    mention_positions(content)
        .into_iter()
        .map(|hit| hit.note_id)
        .collect()
}

/// Returns every mention occurrence in encounter order with char offsets.
///
/// Duplicate ids at different offsets produce one hit each. Runs whose length
/// differs from `NOTE_ID_LEN` are not mentions and are skipped.
pub fn mention_positions(content: &str) -> Vec<MentionHit> {
    let mut hits = Vec::new();
    let mut scanned_bytes = 0usize;
    let mut scanned_chars = 0usize;

    for captures in MENTION_TOKEN_RE.captures_iter(content) {
        // Capture group 1 always exists for a match of this pattern.
        let Some(run) = captures.get(1) else {
            continue;
        };
        if run.as_str().len() != NOTE_ID_LEN {
            continue;
        }
        let Ok(note_id) = NoteId::parse(run.as_str()) else {
            continue;
        };

        // Offsets are char-based while the regex reports byte spans; count
        // chars incrementally so multi-byte content stays O(len) overall.
        let at_byte = run.start() - 1;
        scanned_chars += content[scanned_bytes..at_byte].chars().count();
        scanned_bytes = at_byte;

        hits.push(MentionHit {
            note_id,
            offset: scanned_chars,
        });
    }

    hits
}
