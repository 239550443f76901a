use rusqlite::Connection;
use threadnote_core::db::open_db_in_memory;
use threadnote_core::{
    CreateNoteRequest, MentionRepository, Note, NoteService, NoteServiceError,
    SqliteNoteRepository,
};

fn service(conn: &Connection) -> NoteService<SqliteNoteRepository<'_>> {
    NoteService::new(SqliteNoteRepository::try_new(conn).unwrap())
}

fn create_root(
    service: &NoteService<SqliteNoteRepository<'_>>,
    author_id: &str,
    content: &str,
) -> Note {
    service
        .create_note(CreateNoteRequest {
            author_id: author_id.to_string(),
            content: content.to_string(),
            ..Default::default()
        })
        .unwrap()
}

fn mention_rows_touching(conn: &Connection, note_id: &str) -> i64 {
    conn.query_row(
        "SELECT COUNT(*) FROM mentions WHERE from_note_id = ?1 OR to_note_id = ?1;",
        [note_id],
        |row| row.get(0),
    )
    .unwrap()
}

#[test]
fn mention_row_is_stored_with_at_sign_position() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let target = create_root(&service, "alice", "the target");

    let source = create_root(
        &service,
        "alice",
        &format!("Hello @{}", target.note_id),
    );

    let repo = SqliteNoteRepository::try_new(&conn).unwrap();
    let mentions = repo.list_mentions_from(&source.note_id).unwrap();
    assert_eq!(mentions.len(), 1);
    assert_eq!(mentions[0].to_note_id, target.note_id);
    assert_eq!(mentions[0].position, 6);
}

#[test]
fn duplicate_mentions_produce_one_row_per_occurrence() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let target = create_root(&service, "alice", "the target");

    let source = create_root(
        &service,
        "alice",
        &format!("@{id} and again @{id}", id = target.note_id),
    );

    let repo = SqliteNoteRepository::try_new(&conn).unwrap();
    let mentions = repo.list_mentions_from(&source.note_id).unwrap();
    assert_eq!(mentions.len(), 2);
    assert_eq!(mentions[0].position, 0);
    assert_eq!(mentions[1].position, 18);
}

#[test]
fn note_without_mentions_writes_no_mention_rows() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    create_root(&service, "alice", "plain text only");

    let total: i64 = conn
        .query_row("SELECT COUNT(*) FROM mentions;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(total, 0);
}

#[test]
fn update_replaces_mention_rows_wholesale() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let target = create_root(&service, "alice", "the target");
    let source = create_root(&service, "alice", &format!("see @{}", target.note_id));

    assert_eq!(mention_rows_touching(&conn, source.note_id.as_str()), 1);

    service
        .update_note(&source.note_id, "alice", "No refs")
        .unwrap();
    assert_eq!(mention_rows_touching(&conn, source.note_id.as_str()), 0);
}

#[test]
fn update_keeping_the_same_mention_is_not_a_false_cycle() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let target = create_root(&service, "alice", "the target");
    let source = create_root(&service, "alice", &format!("see @{}", target.note_id));

    // Remove-then-propose: the note's own stored edge must not trip the check.
    let updated = service
        .update_note(
            &source.note_id,
            "alice",
            &format!("still watching @{}", target.note_id),
        )
        .unwrap();
    assert!(updated.content.starts_with("still"));

    let repo = SqliteNoteRepository::try_new(&conn).unwrap();
    let mentions = repo.list_mentions_from(&source.note_id).unwrap();
    assert_eq!(mentions.len(), 1);
}

#[test]
fn self_mention_is_rejected_as_a_cycle() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let note = create_root(&service, "alice", "no refs yet");

    let err = service
        .update_note(&note.note_id, "alice", &format!("me: @{}", note.note_id))
        .unwrap_err();
    assert!(matches!(err, NoteServiceError::CircularReference { .. }));

    let unchanged = service.get_note(&note.note_id).unwrap().unwrap();
    assert_eq!(unchanged.content, "no refs yet");
}

#[test]
fn closing_a_transitive_cycle_persists_nothing() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);

    // Build A -> B -> C: each note mentions the next one down the chain.
    let c = create_root(&service, "alice", "note c");
    let b = create_root(&service, "alice", &format!("b sees @{}", c.note_id));
    let a = create_root(&service, "alice", &format!("a sees @{}", b.note_id));

    // Updating C to mention A would close A -> B -> C -> A.
    let err = service
        .update_note(&c.note_id, "alice", &format!("c sees @{}", a.note_id))
        .unwrap_err();
    match err {
        NoteServiceError::CircularReference { from, targets } => {
            assert_eq!(from, c.note_id);
            assert_eq!(targets, vec![a.note_id.clone()]);
        }
        other => panic!("unexpected error: {other}"),
    }

    let unchanged = service.get_note(&c.note_id).unwrap().unwrap();
    assert_eq!(unchanged.content, "note c");

    let repo = SqliteNoteRepository::try_new(&conn).unwrap();
    assert!(repo.list_mentions_from(&c.note_id).unwrap().is_empty());
}

#[test]
fn mutual_mentions_between_two_notes_are_rejected() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);

    let a = create_root(&service, "alice", "note a");
    let b = create_root(&service, "alice", &format!("b sees @{}", a.note_id));

    // A may not now point back at B.
    let err = service
        .update_note(&a.note_id, "alice", &format!("a sees @{}", b.note_id))
        .unwrap_err();
    assert!(matches!(err, NoteServiceError::CircularReference { .. }));
}

#[test]
fn mention_of_unknown_id_is_stored_as_a_forward_reference() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);

    let source = create_root(&service, "alice", "pending @zzz999 reference");
    let repo = SqliteNoteRepository::try_new(&conn).unwrap();
    let mentions = repo.list_mentions_from(&source.note_id).unwrap();
    assert_eq!(mentions.len(), 1);
    assert_eq!(mentions[0].to_note_id.as_str(), "zzz999");
}
