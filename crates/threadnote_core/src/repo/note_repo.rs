//! Note repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide note persistence APIs including transactional mention co-writes.
//! - Own the cascade-deletion transaction (note + direct children + mention
//!   rows touching any of them).
//!
//! # Invariants
//! - Write paths call `NewNote::validate()` before SQL mutations.
//! - `create_note_with_mentions` / `update_note_with_mentions` leave no
//!   partial state behind: note row and mention rows commit together.
//! - Cascade deletion never leaves a mention row referencing a removed note.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::mention::parser::MentionHit;
use crate::model::note::{NewNote, Note, NoteId, NoteValidationError};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row, Transaction, TransactionBehavior};
use uuid::Uuid;

const NOTE_SELECT_SQL: &str = "SELECT
    note_id,
    author_id,
    channel_id,
    content,
    parent_id,
    depth,
    is_hidden,
    created_at,
    updated_at
FROM notes";

const ROOTS_DEFAULT_LIMIT: u32 = 10;
const ROOTS_LIMIT_MAX: u32 = 50;

pub type RepoResult<T> = Result<T, RepoError>;

/// Generic repository error for note and mention persistence.
#[derive(Debug)]
pub enum RepoError {
    Validation(NoteValidationError),
    Db(DbError),
    NotFound(NoteId),
    InvalidData(String),
}

impl std::fmt::Display for RepoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "note not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted note data: {message}"),
        }
    }
}

impl std::error::Error for RepoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::NotFound(_) => None,
            Self::InvalidData(_) => None,
        }
    }
}

impl From<NoteValidationError> for RepoError {
    fn from(value: NoteValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Query options for listing an author's root notes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RootNoteQuery {
    /// Owning author.
    pub author_id: String,
    /// Include hidden roots when true.
    pub include_hidden: bool,
    /// Maximum rows to return. Defaults to 10 and clamps to 50.
    pub limit: Option<u32>,
    /// Number of rows to skip.
    pub offset: u32,
}

/// Row counts removed by one cascade deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CascadeOutcome {
    /// Deleted note rows, target included.
    pub deleted_notes: usize,
    /// Deleted mention rows over all removed notes.
    pub deleted_mentions: usize,
}

/// Repository interface for note persistence.
pub trait NoteRepository {
    /// Inserts one note and its mention rows in a single transaction.
    fn create_note_with_mentions(&self, note: &NewNote, mentions: &[MentionHit])
        -> RepoResult<()>;
    /// Replaces note content and its outgoing mention rows atomically.
    fn update_note_with_mentions(
        &self,
        note_id: &NoteId,
        content: &str,
        mentions: &[MentionHit],
    ) -> RepoResult<()>;
    /// Gets one note by id.
    fn get_note(&self, note_id: &NoteId) -> RepoResult<Option<Note>>;
    /// Lists root notes for one author, newest-created first.
    fn list_root_notes(&self, query: &RootNoteQuery) -> RepoResult<Vec<Note>>;
    /// Counts root notes matching the author/hidden filter.
    fn count_root_notes(&self, author_id: &str, include_hidden: bool) -> RepoResult<u64>;
    /// Counts direct replies of one note.
    fn count_replies(&self, note_id: &NoteId) -> RepoResult<u64>;
    /// Lists direct children of one note, oldest-created first.
    fn list_children(&self, parent_id: &NoteId) -> RepoResult<Vec<Note>>;
    /// Deletes one note, its direct children, and all mention rows touching
    /// any of them, in a single transaction.
    fn delete_note_cascade(&self, note_id: &NoteId) -> RepoResult<CascadeOutcome>;
}

/// SQLite-backed note repository.
pub struct SqliteNoteRepository<'conn> {
    pub(crate) conn: &'conn Connection,
}

impl<'conn> SqliteNoteRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl NoteRepository for SqliteNoteRepository<'_> {
    fn create_note_with_mentions(
        &self,
        note: &NewNote,
        mentions: &[MentionHit],
    ) -> RepoResult<()> {
        note.validate()?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT INTO notes (
                note_id,
                author_id,
                channel_id,
                content,
                parent_id,
                depth,
                is_hidden
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                note.note_id.as_str(),
                note.author_id.as_str(),
                note.channel_id.as_deref(),
                note.content.as_str(),
                note.parent_id.as_ref().map(NoteId::as_str),
                i64::from(note.depth),
                bool_to_int(note.is_hidden),
            ],
        )?;
        insert_mention_rows(&tx, &note.note_id, mentions)?;
        tx.commit()?;
        Ok(())
    }

    fn update_note_with_mentions(
        &self,
        note_id: &NoteId,
        content: &str,
        mentions: &[MentionHit],
    ) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let changed = tx.execute(
            "UPDATE notes
             SET content = ?2,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE note_id = ?1;",
            params![note_id.as_str(), content],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(note_id.clone()));
        }

        tx.execute(
            "DELETE FROM mentions WHERE from_note_id = ?1;",
            [note_id.as_str()],
        )?;
        insert_mention_rows(&tx, note_id, mentions)?;
        tx.commit()?;
        Ok(())
    }

    fn get_note(&self, note_id: &NoteId) -> RepoResult<Option<Note>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{NOTE_SELECT_SQL} WHERE note_id = ?1;"))?;
        let mut rows = stmt.query([note_id.as_str()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_note_row(row)?));
        }
        Ok(None)
    }

    fn list_root_notes(&self, query: &RootNoteQuery) -> RepoResult<Vec<Note>> {
        let mut sql = format!(
            "{NOTE_SELECT_SQL}
             WHERE author_id = ?
               AND parent_id IS NULL"
        );
        let mut bind_values: Vec<Value> = vec![Value::Text(query.author_id.clone())];

        if !query.include_hidden {
            sql.push_str(" AND is_hidden = 0");
        }

        sql.push_str(" ORDER BY created_at DESC, note_id ASC LIMIT ?");
        bind_values.push(Value::Integer(i64::from(normalize_root_limit(query.limit))));
        if query.offset > 0 {
            sql.push_str(" OFFSET ?");
            bind_values.push(Value::Integer(i64::from(query.offset)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut notes = Vec::new();
        while let Some(row) = rows.next()? {
            notes.push(parse_note_row(row)?);
        }
        Ok(notes)
    }

    fn count_root_notes(&self, author_id: &str, include_hidden: bool) -> RepoResult<u64> {
        let sql = if include_hidden {
            "SELECT COUNT(*)
             FROM notes
             WHERE author_id = ?1
               AND parent_id IS NULL;"
        } else {
            "SELECT COUNT(*)
             FROM notes
             WHERE author_id = ?1
               AND parent_id IS NULL
               AND is_hidden = 0;"
        };
        let count: i64 = self.conn.query_row(sql, [author_id], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }

    fn count_replies(&self, note_id: &NoteId) -> RepoResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM notes WHERE parent_id = ?1;",
            [note_id.as_str()],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }

    fn list_children(&self, parent_id: &NoteId) -> RepoResult<Vec<Note>> {
        let mut stmt = self.conn.prepare(&format!(
            "{NOTE_SELECT_SQL}
             WHERE parent_id = ?1
             ORDER BY created_at ASC, note_id ASC;"
        ))?;
        let mut rows = stmt.query([parent_id.as_str()])?;
        let mut notes = Vec::new();
        while let Some(row) = rows.next()? {
            notes.push(parse_note_row(row)?);
        }
        Ok(notes)
    }

    fn delete_note_cascade(&self, note_id: &NoteId) -> RepoResult<CascadeOutcome> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        if !note_exists_in_tx(&tx, note_id)? {
            return Err(RepoError::NotFound(note_id.clone()));
        }

        let mut removed_ids = vec![note_id.clone()];
        removed_ids.extend(child_ids_in_tx(&tx, note_id)?);

        // Mention rows must be gone before the notes they reference; the
        // schema intentionally has no cascading foreign keys for mentions.
        let mut deleted_mentions = 0usize;
        for id in &removed_ids {
            deleted_mentions += tx.execute(
                "DELETE FROM mentions WHERE from_note_id = ?1 OR to_note_id = ?1;",
                [id.as_str()],
            )?;
        }

        let mut deleted_notes = tx.execute(
            "DELETE FROM notes WHERE parent_id = ?1;",
            [note_id.as_str()],
        )?;
        deleted_notes += tx.execute(
            "DELETE FROM notes WHERE note_id = ?1;",
            [note_id.as_str()],
        )?;

        tx.commit()?;
        Ok(CascadeOutcome {
            deleted_notes,
            deleted_mentions,
        })
    }
}

/// Normalizes a root-listing limit according to the listing contract.
pub fn normalize_root_limit(limit: Option<u32>) -> u32 {
    match limit {
        Some(0) => ROOTS_DEFAULT_LIMIT,
        Some(value) if value > ROOTS_LIMIT_MAX => ROOTS_LIMIT_MAX,
        Some(value) => value,
        None => ROOTS_DEFAULT_LIMIT,
    }
}

fn insert_mention_rows(
    tx: &Transaction<'_>,
    from_note_id: &NoteId,
    mentions: &[MentionHit],
) -> RepoResult<()> {
    for hit in mentions {
        tx.execute(
            "INSERT INTO mentions (
                mention_id,
                from_note_id,
                to_note_id,
                position
            ) VALUES (?1, ?2, ?3, ?4);",
            params![
                Uuid::new_v4().to_string(),
                from_note_id.as_str(),
                hit.note_id.as_str(),
                hit.offset as i64,
            ],
        )?;
    }
    Ok(())
}

fn note_exists_in_tx(tx: &Transaction<'_>, note_id: &NoteId) -> RepoResult<bool> {
    let exists: i64 = tx.query_row(
        "SELECT EXISTS(SELECT 1 FROM notes WHERE note_id = ?1);",
        [note_id.as_str()],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn child_ids_in_tx(tx: &Transaction<'_>, parent_id: &NoteId) -> RepoResult<Vec<NoteId>> {
    let mut stmt = tx.prepare(
        "SELECT note_id
         FROM notes
         WHERE parent_id = ?1
         ORDER BY note_id ASC;",
    )?;
    let mut rows = stmt.query([parent_id.as_str()])?;
    let mut ids = Vec::new();
    while let Some(row) = rows.next()? {
        let value: String = row.get(0)?;
        ids.push(parse_note_id(&value, "notes.note_id")?);
    }
    Ok(ids)
}

pub(crate) fn parse_note_row(row: &Row<'_>) -> RepoResult<Note> {
    let note_id_text: String = row.get("note_id")?;
    let note_id = parse_note_id(&note_id_text, "notes.note_id")?;
    let parent_id = row
        .get::<_, Option<String>>("parent_id")?
        .map(|value| parse_note_id(&value, "notes.parent_id"))
        .transpose()?;

    let depth_raw: i64 = row.get("depth")?;
    let depth = u32::try_from(depth_raw).map_err(|_| {
        RepoError::InvalidData(format!("invalid depth value `{depth_raw}` in notes.depth"))
    })?;

    let is_hidden = match row.get::<_, i64>("is_hidden")? {
        0 => false,
        1 => true,
        other => {
            return Err(RepoError::InvalidData(format!(
                "invalid is_hidden value `{other}` in notes.is_hidden"
            )));
        }
    };

    Ok(Note {
        note_id,
        author_id: row.get("author_id")?,
        channel_id: row.get("channel_id")?,
        content: row.get("content")?,
        parent_id,
        depth,
        is_hidden,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

pub(crate) fn parse_note_id(value: &str, column: &'static str) -> RepoResult<NoteId> {
    NoteId::parse(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid note id `{value}` in {column}")))
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

fn ensure_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::InvalidData(format!(
            "note repository requires schema version {expected_version}, got {actual_version}"
        )));
    }

    for table in ["notes", "mentions"] {
        if !table_exists(conn, table)? {
            return Err(RepoError::InvalidData(format!(
                "note repository requires table `{table}`"
            )));
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}
