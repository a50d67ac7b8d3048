//! [`ConversationService`] over a local SQLite message archive.
//!
//! Schema:
//! ```sql
//! CREATE TABLE chats (
//!     id              TEXT PRIMARY KEY,
//!     name            TEXT,
//!     formatted_title TEXT,
//!     is_group        INTEGER NOT NULL DEFAULT 0
//! );
//! CREATE TABLE messages (
//!     id        TEXT NOT NULL UNIQUE,
//!     chat_id   TEXT NOT NULL REFERENCES chats(id),
//!     timestamp INTEGER NOT NULL,   -- seconds since epoch
//!     author    TEXT,
//!     from_me   INTEGER NOT NULL DEFAULT 0,
//!     body      TEXT NOT NULL DEFAULT ''
//! );
//! ```
//!
//! The archive is opened read-only and copied into a temporary snapshot
//! when the session is established, so a client writing to it concurrently
//! can't shift pages underneath the walk.
use super::{AuthSignal, ConversationService, ServiceError};
use crate::model::{
    Conversation, ConversationId, ConversationKind, MessageId, PageQuery, RawMessage,
};
use crate::utils;
use async_trait::async_trait;
use rusqlite::{Connection, OpenFlags, OptionalExtension, Row, backup::Backup, params};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tempfile::NamedTempFile;
use tracing::debug;

pub const SCHEMA: &str = "
CREATE TABLE chats (
    id              TEXT PRIMARY KEY,
    name            TEXT,
    formatted_title TEXT,
    is_group        INTEGER NOT NULL DEFAULT 0
);
CREATE TABLE messages (
    id        TEXT NOT NULL UNIQUE,
    chat_id   TEXT NOT NULL REFERENCES chats(id),
    timestamp INTEGER NOT NULL,
    author    TEXT,
    from_me   INTEGER NOT NULL DEFAULT 0,
    body      TEXT NOT NULL DEFAULT ''
);
CREATE INDEX messages_chat_order ON messages(chat_id, timestamp);
";

struct Snapshot {
    // Keeps the temp file alive for as long as the connection is open.
    _file: NamedTempFile,
    conn: Connection,
}

pub struct StoreService {
    db_path: PathBuf,
    quiet: bool,
    snapshot: Mutex<Option<Snapshot>>,
}

impl StoreService {
    pub fn new(db_path: impl Into<PathBuf>, quiet: bool) -> Self {
        Self {
            db_path: db_path.into(),
            quiet,
            snapshot: Mutex::new(None),
        }
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, ServiceError>,
    ) -> Result<T, ServiceError> {
        let guard = self
            .snapshot
            .lock()
            .map_err(|_| ServiceError::Protocol("message store lock poisoned".to_string()))?;
        let snapshot = guard.as_ref().ok_or(ServiceError::NotAuthenticated)?;
        f(&snapshot.conn)
    }
}

/// Copy the archive into a temporary file with the online backup API.
fn create_snapshot(db_path: &Path, quiet: bool) -> Result<Snapshot, ServiceError> {
    let spinner = utils::spinner(quiet, "Snapshotting message store...".to_string());

    let src = Connection::open_with_flags(
        db_path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;

    let file = NamedTempFile::new()?;
    let mut conn = Connection::open(file.path())?;

    {
        let backup = Backup::new(&src, &mut conn)?;
        backup.run_to_completion(1000, Duration::from_millis(5), None)?;
    }

    drop(src);
    spinner.finish_and_clear();
    Ok(Snapshot { _file: file, conn })
}

fn check_schema(conn: &Connection) -> Result<(), ServiceError> {
    for table in ["chats", "messages"] {
        let found: Option<String> = conn
            .query_row(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [table],
                |row| row.get(0),
            )
            .optional()?;
        if found.is_none() {
            return Err(ServiceError::Protocol(format!(
                "message store has no `{}` table",
                table
            )));
        }
    }
    Ok(())
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<RawMessage> {
    Ok(RawMessage {
        id: MessageId::new(row.get::<_, String>(0)?),
        timestamp: row.get(1)?,
        author: row.get(2)?,
        from_me: row.get::<_, i64>(3)? != 0,
        body: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
    })
}

#[async_trait]
impl ConversationService for StoreService {
    async fn authenticate(&self) -> Result<AuthSignal, ServiceError> {
        let snapshot = create_snapshot(&self.db_path, self.quiet)?;
        check_schema(&snapshot.conn)?;
        debug!(path = %self.db_path.display(), "Message store snapshot ready");
        *self
            .snapshot
            .lock()
            .map_err(|_| ServiceError::Protocol("message store lock poisoned".to_string()))? =
            Some(snapshot);
        Ok(AuthSignal::Ready)
    }

    async fn await_ready(&self) -> Result<(), ServiceError> {
        self.with_conn(|_| Ok(()))
    }

    async fn list_conversations(&self) -> Result<Vec<Conversation>, ServiceError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, formatted_title, is_group FROM chats ORDER BY rowid",
            )?;
            let chats = stmt
                .query_map([], |row| {
                    Ok(Conversation {
                        id: ConversationId::new(row.get::<_, String>(0)?),
                        name: row.get(1)?,
                        formatted_title: row.get(2)?,
                        kind: if row.get::<_, i64>(3)? != 0 {
                            ConversationKind::Group
                        } else {
                            ConversationKind::Direct
                        },
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(chats)
        })
    }

    async fn fetch_messages(
        &self,
        conversation: &Conversation,
        query: PageQuery,
    ) -> Result<Vec<RawMessage>, ServiceError> {
        let chat_id = conversation.id.as_str();
        let limit = i64::try_from(query.limit).unwrap_or(i64::MAX);

        self.with_conn(|conn| {
            let page = match &query.before {
                None => {
                    let mut stmt = conn.prepare(
                        "SELECT id, timestamp, author, from_me, body FROM messages
                         WHERE chat_id = ?1
                         ORDER BY timestamp DESC, rowid DESC
                         LIMIT ?2",
                    )?;
                    let rows = stmt
                        .query_map(params![chat_id, limit], message_from_row)?
                        .collect::<Result<Vec<_>, _>>()?;
                    rows
                }
                Some(before) => {
                    let (ts, rowid): (i64, i64) = conn
                        .query_row(
                            "SELECT timestamp, rowid FROM messages WHERE id = ?1 AND chat_id = ?2",
                            params![before.as_str(), chat_id],
                            |row| Ok((row.get(0)?, row.get(1)?)),
                        )
                        .optional()?
                        .ok_or_else(|| ServiceError::UnknownCursor(before.clone()))?;

                    let mut stmt = conn.prepare(
                        "SELECT id, timestamp, author, from_me, body FROM messages
                         WHERE chat_id = ?1
                           AND (timestamp < ?2 OR (timestamp = ?2 AND rowid < ?3))
                         ORDER BY timestamp DESC, rowid DESC
                         LIMIT ?4",
                    )?;
                    let rows = stmt
                        .query_map(params![chat_id, ts, rowid, limit], message_from_row)?
                        .collect::<Result<Vec<_>, _>>()?;
                    rows
                }
            };
            Ok(page)
        })
    }
}
