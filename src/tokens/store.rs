//! SQLite-backed storage for per-user token records.
//!
//! All writes are whole-record upserts keyed on `user_id` — there is no
//! partial-field update path.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;

use super::{ConnectionStatus, TokenRecord};
use crate::error::StoreError;

/// Token record storage backed by SQLite.
///
/// # Schema
/// ```sql
/// CREATE TABLE user_tokens (
///     user_id TEXT PRIMARY KEY,
///     access_token TEXT NOT NULL,   -- encrypted envelope
///     refresh_token TEXT NOT NULL,  -- encrypted envelope
///     token_expiry TEXT NOT NULL,   -- ISO 8601 timestamp
///     last_refresh TEXT NOT NULL    -- ISO 8601 timestamp
/// );
/// ```
///
/// # Thread Safety
/// - Connection is wrapped in Mutex for safe concurrent access
/// - SQLite itself is thread-safe with serialized mode
pub struct TokenStore {
    conn: Mutex<Connection>,
}

impl TokenStore {
    /// Creates or opens a token store at the given database path.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(db_path)?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS user_tokens (
                user_id TEXT PRIMARY KEY,
                access_token TEXT NOT NULL,
                refresh_token TEXT NOT NULL,
                token_expiry TEXT NOT NULL,
                last_refresh TEXT NOT NULL
            )
            "#,
            [],
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Inserts or fully replaces the record for `user_id`.
    pub fn upsert(&self, user_id: &str, record: &TokenRecord) -> Result<(), StoreError> {
        self.conn.lock().unwrap().execute(
            r#"
            INSERT INTO user_tokens (user_id, access_token, refresh_token, token_expiry, last_refresh)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(user_id) DO UPDATE SET
                access_token = excluded.access_token,
                refresh_token = excluded.refresh_token,
                token_expiry = excluded.token_expiry,
                last_refresh = excluded.last_refresh
            "#,
            params![
                user_id,
                record.access_token,
                record.refresh_token,
                record.token_expiry.to_rfc3339(),
                record.last_refresh.to_rfc3339(),
            ],
        )?;

        Ok(())
    }

    /// Returns the encrypted access token envelope for `user_id`.
    pub fn get_access_token(&self, user_id: &str) -> Result<String, StoreError> {
        self.get_column(user_id, "access_token")
    }

    /// Returns the encrypted refresh token envelope for `user_id`.
    pub fn get_refresh_token(&self, user_id: &str) -> Result<String, StoreError> {
        self.get_column(user_id, "refresh_token")
    }

    /// Returns the stored access token expiry for `user_id`.
    pub fn get_expiry(&self, user_id: &str) -> Result<DateTime<Utc>, StoreError> {
        let raw = self.get_column(user_id, "token_expiry")?;
        parse_timestamp(&raw)
    }

    /// Removes the record for `user_id`. Idempotent: absent records are not
    /// an error.
    pub fn delete(&self, user_id: &str) -> Result<(), StoreError> {
        self.conn.lock().unwrap().execute(
            "DELETE FROM user_tokens WHERE user_id = ?1",
            params![user_id],
        )?;

        Ok(())
    }

    /// Connection status for the account display.
    pub fn status(&self, user_id: &str) -> Result<ConnectionStatus, StoreError> {
        let conn = self.conn.lock().unwrap();
        let last_refresh: Option<String> = conn
            .query_row(
                "SELECT last_refresh FROM user_tokens WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?;

        match last_refresh {
            Some(raw) => Ok(ConnectionStatus {
                connected: true,
                last_refresh: Some(parse_timestamp(&raw)?),
            }),
            None => Ok(ConnectionStatus {
                connected: false,
                last_refresh: None,
            }),
        }
    }

    fn get_column(&self, user_id: &str, column: &str) -> Result<String, StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            &format!("SELECT {column} FROM user_tokens WHERE user_id = ?1"),
            params![user_id],
            |row| row.get(0),
        )
        .optional()?
        .ok_or(StoreError::NotFound)
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| {
            StoreError::Database(rusqlite::Error::InvalidColumnType(
                0,
                "timestamp".to_string(),
                rusqlite::types::Type::Text,
            ))
        })
}
