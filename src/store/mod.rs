// Message record store
//
// Durable, key-addressed storage for message records. Every record is
// reachable by its store-assigned id; conversations are grouped by a
// thread id resolved from the peer at insert time. Content changes are
// published on a broadcast channel so that query coordinators can refresh.

use anyhow::{anyhow, Result};
use log::{debug, error};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::sync::Mutex as TokioMutex;

use crate::models::{Direction, MessageRecord, MessageStatus, NewMessage, RecordId};

/// Published on every insert or point update.
#[derive(Debug, Clone)]
pub struct StoreEvent {
    pub record: RecordId,
    pub thread_id: i64,
}

/// Shared handle to the message record store.
///
/// Cloning is cheap; all clones address the same underlying database.
#[derive(Clone)]
pub struct MessageStore {
    conn: Arc<TokioMutex<Connection>>,
    events: broadcast::Sender<StoreEvent>,
}

impl MessageStore {
    /// Open (or create) a store at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;
        Self::from_connection(conn)
    }

    /// Open a store kept entirely in memory. Used by tests and throwaway runs.
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    /// The default on-disk location, under the platform data directory.
    pub fn default_path() -> Result<PathBuf> {
        let mut path = dirs::data_dir().ok_or_else(|| anyhow!("could not determine data directory"))?;
        path.push("courier");
        std::fs::create_dir_all(&path)?;
        path.push("messages.db");
        Ok(path)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        Self::create_tables(&conn)?;
        let (events, _) = broadcast::channel(64);
        Ok(MessageStore {
            conn: Arc::new(TokioMutex::new(conn)),
            events,
        })
    }

    /// Create the tables in the database
    fn create_tables(conn: &Connection) -> Result<()> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS threads (
                thread_id INTEGER PRIMARY KEY AUTOINCREMENT,
                peer TEXT NOT NULL UNIQUE
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                msg_id TEXT NOT NULL,
                remote_msg_id TEXT,
                thread_id INTEGER NOT NULL,
                peer TEXT NOT NULL,
                mime TEXT NOT NULL,
                content TEXT NOT NULL,
                direction INTEGER NOT NULL,
                status INTEGER NOT NULL,
                unread INTEGER NOT NULL,
                timestamp INTEGER NOT NULL,
                FOREIGN KEY (thread_id) REFERENCES threads (thread_id)
            )",
            [],
        )?;

        Ok(())
    }

    /// Subscribe to content-change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    /// Persist a new message record, resolving (or creating) its thread
    /// from the peer. Returns the store-assigned id.
    pub async fn insert(&self, message: NewMessage) -> Result<RecordId> {
        let conn = self.conn.lock().await;

        let thread_id = Self::resolve_thread(&conn, &message.peer)?;
        conn.execute(
            "INSERT INTO messages
                (msg_id, remote_msg_id, thread_id, peer, mime, content, direction, status, unread, timestamp)
             VALUES (?1, NULL, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                message.msg_id,
                thread_id,
                message.peer,
                message.mime,
                message.content,
                message.direction as i64,
                message.status as i64,
                message.unread,
                message.timestamp,
            ],
        )?;
        let record = RecordId(conn.last_insert_rowid());
        drop(conn);

        debug!("stored message {} in thread {}", record, thread_id);
        self.notify(record, thread_id);
        Ok(record)
    }

    /// Point update: record the server-assigned message id and flip the
    /// status to `Sent` in one write. Returns the number of affected rows.
    pub async fn mark_sent(&self, id: RecordId, remote_msg_id: &str) -> Result<usize> {
        let conn = self.conn.lock().await;
        let n = conn.execute(
            "UPDATE messages SET remote_msg_id = ?1, status = ?2 WHERE id = ?3",
            params![remote_msg_id, MessageStatus::Sent as i64, id.0],
        )?;
        let thread_id = Self::thread_of(&conn, id)?;
        drop(conn);

        if let Some(thread_id) = thread_id {
            self.notify(id, thread_id);
        }
        Ok(n)
    }

    /// Point update of the status field alone.
    pub async fn mark_status(&self, id: RecordId, status: MessageStatus) -> Result<usize> {
        let conn = self.conn.lock().await;
        let n = conn.execute(
            "UPDATE messages SET status = ?1 WHERE id = ?2",
            params![status as i64, id.0],
        )?;
        let thread_id = Self::thread_of(&conn, id)?;
        drop(conn);

        if let Some(thread_id) = thread_id {
            self.notify(id, thread_id);
        }
        Ok(n)
    }

    /// Point read of a single record.
    pub async fn message(&self, id: RecordId) -> Result<Option<MessageRecord>> {
        let conn = self.conn.lock().await;
        let row = conn
            .query_row(
                "SELECT id, msg_id, remote_msg_id, thread_id, peer, mime, content, direction, status, unread, timestamp
                 FROM messages WHERE id = ?1",
                params![id.0],
                Self::read_row,
            )
            .optional()?;
        row.map(Self::into_record).transpose()
    }

    /// All records of a thread in conversation order (timestamp ascending).
    pub async fn thread_messages(&self, thread_id: i64) -> Result<Vec<MessageRecord>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, msg_id, remote_msg_id, thread_id, peer, mime, content, direction, status, unread, timestamp
             FROM messages WHERE thread_id = ?1 ORDER BY timestamp ASC, id ASC",
        )?;
        let mut rows = stmt.query(params![thread_id])?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(Self::into_record(Self::read_row(row)?)?);
        }
        Ok(records)
    }

    /// Look up the existing thread for a peer, if any.
    pub async fn thread_for_peer(&self, peer: &str) -> Result<Option<i64>> {
        let conn = self.conn.lock().await;
        let thread_id = conn
            .query_row(
                "SELECT thread_id FROM threads WHERE peer = ?1",
                params![peer],
                |row| row.get(0),
            )
            .optional()?;
        Ok(thread_id)
    }

    fn resolve_thread(conn: &Connection, peer: &str) -> Result<i64> {
        let existing: Option<i64> = conn
            .query_row(
                "SELECT thread_id FROM threads WHERE peer = ?1",
                params![peer],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(thread_id) = existing {
            return Ok(thread_id);
        }
        conn.execute("INSERT INTO threads (peer) VALUES (?1)", params![peer])?;
        Ok(conn.last_insert_rowid())
    }

    fn thread_of(conn: &Connection, id: RecordId) -> Result<Option<i64>> {
        let thread_id = conn
            .query_row(
                "SELECT thread_id FROM messages WHERE id = ?1",
                params![id.0],
                |row| row.get(0),
            )
            .optional()?;
        Ok(thread_id)
    }

    fn notify(&self, record: RecordId, thread_id: i64) {
        // No receivers is fine; nobody is watching yet.
        let _ = self.events.send(StoreEvent { record, thread_id });
    }

    // Raw column tuple, decoded into a MessageRecord by into_record.
    #[allow(clippy::type_complexity)]
    fn read_row(
        row: &Row<'_>,
    ) -> rusqlite::Result<(i64, String, Option<String>, i64, String, String, String, i64, i64, bool, i64)> {
        Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get(5)?,
            row.get(6)?,
            row.get(7)?,
            row.get(8)?,
            row.get(9)?,
            row.get(10)?,
        ))
    }

    #[allow(clippy::type_complexity)]
    fn into_record(
        raw: (i64, String, Option<String>, i64, String, String, String, i64, i64, bool, i64),
    ) -> Result<MessageRecord> {
        let (id, msg_id, remote_msg_id, thread_id, peer, mime, content, direction, status, unread, timestamp) = raw;
        let direction = Direction::from_i64(direction).ok_or_else(|| {
            error!("record {} has unknown direction {}", id, direction);
            anyhow!("unknown direction code {}", direction)
        })?;
        let status = MessageStatus::from_i64(status)
            .ok_or_else(|| anyhow!("unknown status code {}", status))?;
        Ok(MessageRecord {
            id: RecordId(id),
            msg_id,
            remote_msg_id,
            thread_id,
            peer,
            mime,
            content,
            direction,
            status,
            unread,
            timestamp,
        })
    }
}
