//! Mention repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide read access to stored mention rows for graph rebuilding.
//!
//! # Invariants
//! - Mention writes happen only through the note repository transactions, so
//!   a read here is always consistent with the committed note state.

use crate::model::note::{Mention, NoteId};
use crate::repo::note_repo::{parse_note_id, RepoError, RepoResult, SqliteNoteRepository};
use rusqlite::Row;
use uuid::Uuid;

const MENTION_SELECT_SQL: &str = "SELECT
    mention_id,
    from_note_id,
    to_note_id,
    position,
    created_at
FROM mentions";

/// Repository interface for mention reads.
pub trait MentionRepository {
    /// Lists every stored mention row.
    fn list_all_mentions(&self) -> RepoResult<Vec<Mention>>;
    /// Lists the outgoing mention rows of one note, ordered by position.
    fn list_mentions_from(&self, from_note_id: &NoteId) -> RepoResult<Vec<Mention>>;
}

impl MentionRepository for SqliteNoteRepository<'_> {
    fn list_all_mentions(&self) -> RepoResult<Vec<Mention>> {
        let mut stmt = self.conn.prepare(&format!("{MENTION_SELECT_SQL};"))?;
        let mut rows = stmt.query([])?;
        let mut mentions = Vec::new();
        while let Some(row) = rows.next()? {
            mentions.push(parse_mention_row(row)?);
        }
        Ok(mentions)
    }

    fn list_mentions_from(&self, from_note_id: &NoteId) -> RepoResult<Vec<Mention>> {
        let mut stmt = self.conn.prepare(&format!(
            "{MENTION_SELECT_SQL}
             WHERE from_note_id = ?1
             ORDER BY position ASC;"
        ))?;
        let mut rows = stmt.query([from_note_id.as_str()])?;
        let mut mentions = Vec::new();
        while let Some(row) = rows.next()? {
            mentions.push(parse_mention_row(row)?);
        }
        Ok(mentions)
    }
}

fn parse_mention_row(row: &Row<'_>) -> RepoResult<Mention> {
    let mention_id_text: String = row.get("mention_id")?;
    let mention_id = Uuid::parse_str(&mention_id_text).map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid uuid value `{mention_id_text}` in mentions.mention_id"
        ))
    })?;

    let from_text: String = row.get("from_note_id")?;
    let to_text: String = row.get("to_note_id")?;

    let position_raw: i64 = row.get("position")?;
    let position = usize::try_from(position_raw).map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid position value `{position_raw}` in mentions.position"
        ))
    })?;

    Ok(Mention {
        mention_id,
        from_note_id: parse_note_id(&from_text, "mentions.from_note_id")?,
        to_note_id: parse_note_id(&to_text, "mentions.to_note_id")?,
        position,
        created_at: row.get("created_at")?,
    })
}
