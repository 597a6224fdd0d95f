//! SQLite persistence for synced accounting data.
//!
//! `chart_of_accounts` is replaced wholesale per user on every sync;
//! `general_ledger` is append-only. Both writes run inside a transaction and
//! roll back on failure, leaving no partial state.

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;

use super::report::LedgerEntry;
use super::Account;

/// Storage for chart-of-accounts and general-ledger rows.
pub struct LedgerStore {
    conn: Mutex<Connection>,
}

impl LedgerStore {
    /// Creates or opens the ledger store at the given database path.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self, rusqlite::Error> {
        let conn = Connection::open(db_path)?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS chart_of_accounts (
                account_id TEXT NOT NULL,
                name TEXT NOT NULL,
                type TEXT NOT NULL,
                subtype TEXT NOT NULL,
                user_id TEXT NOT NULL
            )
            "#,
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_coa_user ON chart_of_accounts(user_id)",
            [],
        )?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS general_ledger (
                tx_date TEXT,
                txn_type TEXT,
                create_date TEXT,
                last_mod_date TEXT,
                cust_name TEXT,
                name TEXT,
                vend_name TEXT,
                memo TEXT,
                account_name TEXT,
                split_acc TEXT,
                subt_nat_amount REAL,
                user_id TEXT NOT NULL
            )
            "#,
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_gl_user ON general_ledger(user_id)",
            [],
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Replaces the full account set for `user_id` in one transaction.
    ///
    /// Rolls back on any failure, leaving the previous set intact.
    pub fn replace_accounts(
        &self,
        user_id: &str,
        accounts: &[Account],
    ) -> Result<usize, rusqlite::Error> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        tx.execute(
            "DELETE FROM chart_of_accounts WHERE user_id = ?1",
            params![user_id],
        )?;

        for account in accounts {
            tx.execute(
                r#"
                INSERT INTO chart_of_accounts (account_id, name, type, subtype, user_id)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
                params![
                    account.account_id,
                    account.name,
                    account.account_type,
                    account.account_subtype,
                    user_id,
                ],
            )?;
        }

        tx.commit()?;
        Ok(accounts.len())
    }

    /// Appends sanitized ledger entries for `user_id` in one transaction.
    pub fn append_entries(
        &self,
        user_id: &str,
        entries: &[LedgerEntry],
    ) -> Result<usize, rusqlite::Error> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        for entry in entries {
            tx.execute(
                r#"
                INSERT INTO general_ledger (
                    tx_date, txn_type, create_date, last_mod_date,
                    cust_name, name, vend_name, memo,
                    account_name, split_acc, subt_nat_amount, user_id
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                "#,
                params![
                    entry.tx_date,
                    entry.txn_type,
                    entry.create_date,
                    entry.last_mod_date,
                    entry.cust_name,
                    entry.name,
                    entry.vend_name,
                    entry.memo,
                    entry.account_name,
                    entry.split_acc,
                    entry.subt_nat_amount,
                    user_id,
                ],
            )?;
        }

        tx.commit()?;
        Ok(entries.len())
    }

    /// Maximum stored `create_date` for `user_id`, if any.
    ///
    /// Drives the incremental sync window.
    pub fn latest_create_date(
        &self,
        user_id: &str,
    ) -> Result<Option<NaiveDate>, rusqlite::Error> {
        let conn = self.conn.lock().unwrap();
        let raw: Option<String> = conn
            .query_row(
                "SELECT MAX(create_date) FROM general_ledger WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?
            .flatten();

        // Values come from the report as YYYY-MM-DD; anything else falls
        // back to the default floor upstream.
        Ok(raw.and_then(|s| {
            NaiveDate::parse_from_str(s.get(..10).unwrap_or(&s), "%Y-%m-%d").ok()
        }))
    }

    /// All stored accounts for `user_id`.
    pub fn accounts_for_user(&self, user_id: &str) -> Result<Vec<Account>, rusqlite::Error> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT account_id, name, type, subtype FROM chart_of_accounts WHERE user_id = ?1 ORDER BY account_id",
        )?;

        let accounts = stmt
            .query_map(params![user_id], |row| {
                Ok(Account {
                    account_id: row.get(0)?,
                    name: row.get(1)?,
                    account_type: row.get(2)?,
                    account_subtype: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<Account>, _>>()?;

        Ok(accounts)
    }

    /// Number of stored ledger entries for `user_id`.
    pub fn entry_count(&self, user_id: &str) -> Result<usize, rusqlite::Error> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM general_ledger WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )?;

        Ok(count as usize)
    }
}
