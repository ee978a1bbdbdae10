//! History repository: the append-only per-user turn log

use super::DbPool;
use crate::{Error, Result};

/// Who produced a stored turn
///
/// This is the storage vocabulary; the backend-facing vocabulary lives in
/// [`crate::context::BackendRole`] with an explicit mapping between the two.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoredRole {
    User,
    Assistant,
}

impl StoredRole {
    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }

    /// Decode a stored role tag
    ///
    /// # Errors
    ///
    /// Returns `Error::Contract` for any tag outside the enumerated set;
    /// a bad tag means the store was corrupted upstream and context
    /// construction must not guess a mapping.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            other => Err(Error::Contract(format!("unknown stored role: {other}"))),
        }
    }
}

/// One recorded conversational event
#[derive(Debug, Clone)]
pub struct Turn {
    /// Insertion-order sequence number, assigned at write time
    pub seq: i64,
    pub user_id: i64,
    pub role: StoredRole,
    pub content: String,
}

/// History repository
///
/// Turns are immutable once written; there are no update or delete
/// operations. Reads are bounded, writes are not.
#[derive(Clone)]
pub struct HistoryRepo {
    pool: DbPool,
}

impl HistoryRepo {
    /// Create a new history repository
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Append one turn to a user's conversation
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn append(&self, user_id: i64, role: StoredRole, content: &str) -> Result<Turn> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        conn.execute(
            "INSERT INTO history (user_id, role, content) VALUES (?1, ?2, ?3)",
            rusqlite::params![user_id, role.as_str(), content],
        )?;

        let seq = conn.last_insert_rowid();
        tracing::debug!(user_id, seq, role = role.as_str(), "turn appended");

        Ok(Turn {
            seq,
            user_id,
            role,
            content: content.to_string(),
        })
    }

    /// Append a causally-related group of turns in one transaction
    ///
    /// Used for the user-input/backend-reply pair so a concurrent reader
    /// never observes half of an exchange.
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails; on error no turn from the
    /// group is persisted.
    pub fn append_exchange(&self, user_id: i64, turns: &[(StoredRole, &str)]) -> Result<()> {
        let mut conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let tx = conn.transaction()?;
        for (role, content) in turns {
            tx.execute(
                "INSERT INTO history (user_id, role, content) VALUES (?1, ?2, ?3)",
                rusqlite::params![user_id, role.as_str(), content],
            )?;
        }
        tx.commit()?;

        tracing::debug!(user_id, count = turns.len(), "exchange appended");
        Ok(())
    }

    /// Get the most recent `limit` turns for a user, oldest first
    ///
    /// Selects the last `limit` turns by sequence number and reverses the
    /// selection so callers always receive chronological order. A user with
    /// no history gets an empty Vec, not an error.
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails, or `Error::Contract` if a
    /// stored role tag is outside the enumerated set
    pub fn recent_window(&self, user_id: i64, limit: usize) -> Result<Vec<Turn>> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let mut stmt = conn.prepare(
            "SELECT seq, user_id, role, content FROM history
             WHERE user_id = ?1 ORDER BY seq DESC LIMIT ?2",
        )?;

        #[allow(clippy::cast_possible_wrap)]
        let rows = stmt.query_map(rusqlite::params![user_id, limit as i64], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut turns = Vec::new();
        for row in rows {
            let (seq, user_id, role, content) = row?;
            turns.push(Turn {
                seq,
                user_id,
                role: StoredRole::parse(&role)?,
                content,
            });
        }

        // Newest-first from the query; chronological for the caller
        turns.reverse();
        Ok(turns)
    }
}
