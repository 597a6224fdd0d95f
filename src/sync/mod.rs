//! Ledger synchronization pipeline.
//!
//! Pulls the chart of accounts and general-ledger rows from the accounting
//! platform into the relational store:
//! 1. Fetch accounts → replace the user's account set transactionally
//! 2. Fetch the general-ledger report for the incremental window
//! 3. Flatten → deduplicate → sanitize → append transactionally
//!
//! Steps are sequential: the ledger window depends on previously stored
//! ledger state. Persistence failures propagate to the caller so a sync is
//! only reported successful when the data actually landed.

pub mod client;
pub mod report;

mod store;

pub use client::AccountingApiClient;
pub use store::LedgerStore;

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::error::SyncError;
use crate::oauth::OAuthFlow;

use self::client::ApiAccount;
use self::report::{columns_param, dedupe, flatten_rows, sanitize, LedgerEntry, LEDGER_COLUMNS};

/// Sentinel subtype for accounts the platform reports without one.
const SUBTYPE_SENTINEL: &str = "N/A";

/// A chart-of-accounts entry, scoped to a user at persistence time.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct Account {
    pub account_id: String,
    pub name: String,
    pub account_type: String,
    pub account_subtype: String,
}

impl From<ApiAccount> for Account {
    fn from(api: ApiAccount) -> Self {
        let account_subtype = api
            .account_subtype
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| SUBTYPE_SENTINEL.to_string());

        Self {
            account_id: api.id,
            name: api.name,
            account_type: api.account_type,
            account_subtype,
        }
    }
}

/// Counts reported back to the caller after a successful sync.
#[derive(Clone, Debug, Serialize)]
pub struct SyncReport {
    pub accounts_stored: usize,
    pub entries_stored: usize,
}

/// Fetches, transforms, and persists a user's accounting data.
pub struct LedgerSyncPipeline {
    oauth: Arc<OAuthFlow>,
    client: AccountingApiClient,
    store: Arc<LedgerStore>,
    floor_date: NaiveDate,
    accounting_method: String,
}

impl LedgerSyncPipeline {
    pub fn new(
        oauth: Arc<OAuthFlow>,
        client: AccountingApiClient,
        store: Arc<LedgerStore>,
        floor_date: NaiveDate,
        accounting_method: String,
    ) -> Self {
        Self {
            oauth,
            client,
            store,
            floor_date,
            accounting_method,
        }
    }

    /// Runs a full sync for `user_id`: accounts first, then the incremental
    /// ledger window.
    pub async fn sync_all(&self, user_id: &str) -> Result<SyncReport, SyncError> {
        info!(user_id = %user_id, "Starting data sync");

        let accounts = self.fetch_accounts(user_id).await?;
        let accounts_stored = self.persist_accounts(user_id, &accounts)?;

        let entries = self.fetch_ledger(user_id).await?;
        let entries_stored = self.persist_ledger(user_id, &entries)?;

        info!(
            user_id = %user_id,
            accounts_stored,
            entries_stored,
            "Data sync complete"
        );

        Ok(SyncReport {
            accounts_stored,
            entries_stored,
        })
    }

    /// Fetches the chart of accounts, applying the subtype sentinel.
    pub async fn fetch_accounts(&self, user_id: &str) -> Result<Vec<Account>, SyncError> {
        let access_token = self.oauth.valid_access_token(user_id).await?;

        debug!(user_id = %user_id, "Querying account list");
        let api_accounts = self
            .client
            .query_accounts(&access_token)
            .await
            .map_err(SyncError::Upstream)?;

        Ok(api_accounts.into_iter().map(Account::from).collect())
    }

    /// Fetches general-ledger rows for the incremental window and runs the
    /// flatten → dedup → sanitize stages.
    pub async fn fetch_ledger(&self, user_id: &str) -> Result<Vec<LedgerEntry>, SyncError> {
        let access_token = self.oauth.valid_access_token(user_id).await?;

        let start_date = self
            .store
            .latest_create_date(user_id)
            .map_err(SyncError::Persistence)?
            .unwrap_or(self.floor_date);
        let end_date = Utc::now().date_naive();

        debug!(
            user_id = %user_id,
            start_date = %start_date,
            end_date = %end_date,
            "Fetching general-ledger report"
        );

        let ledger_report = self
            .client
            .general_ledger(
                &access_token,
                start_date,
                end_date,
                &columns_param(),
                &self.accounting_method,
            )
            .await
            .map_err(SyncError::Upstream)?;

        let flattened = flatten_rows(&ledger_report.rows.row, &LEDGER_COLUMNS);
        let unique = dedupe(flattened);

        Ok(unique.iter().map(sanitize).collect())
    }

    /// Replaces the user's account set. Failures roll back and propagate.
    pub fn persist_accounts(
        &self,
        user_id: &str,
        accounts: &[Account],
    ) -> Result<usize, SyncError> {
        if accounts.is_empty() {
            debug!(user_id = %user_id, "No accounts to persist");
            return Ok(0);
        }

        self.store.replace_accounts(user_id, accounts).map_err(|e| {
            error!(user_id = %user_id, error = %e, "Failed to persist accounts");
            SyncError::Persistence(e)
        })
    }

    /// Appends sanitized ledger entries. Failures roll back and propagate.
    pub fn persist_ledger(
        &self,
        user_id: &str,
        entries: &[LedgerEntry],
    ) -> Result<usize, SyncError> {
        if entries.is_empty() {
            debug!(user_id = %user_id, "No ledger entries to persist");
            return Ok(0);
        }

        self.store.append_entries(user_id, entries).map_err(|e| {
            error!(user_id = %user_id, error = %e, "Failed to persist ledger entries");
            SyncError::Persistence(e)
        })
    }
}
