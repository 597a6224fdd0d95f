//! Accounting platform data API client.
//!
//! Bearer-authenticated GETs against the account query endpoint and the
//! general-ledger report endpoint. The base URL is injectable for tests.

use chrono::NaiveDate;
use serde::Deserialize;

use crate::error::UpstreamError;

/// Raw account item from the account query endpoint.
#[derive(Deserialize, Debug, Clone)]
pub struct ApiAccount {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "AccountType")]
    pub account_type: String,
    #[serde(rename = "AccountSubType")]
    pub account_subtype: Option<String>,
}

#[derive(Deserialize, Debug)]
struct AccountQueryBody {
    #[serde(rename = "QueryResponse", default)]
    query_response: QueryResponse,
}

#[derive(Deserialize, Debug, Default)]
struct QueryResponse {
    #[serde(rename = "Account", default)]
    account: Vec<ApiAccount>,
}

/// General-ledger report body: a recursive row tree.
#[derive(Deserialize, Debug, Default)]
pub struct LedgerReport {
    #[serde(rename = "Rows", default)]
    pub rows: RowGroup,
}

#[derive(Deserialize, Debug, Default)]
pub struct RowGroup {
    #[serde(rename = "Row", default)]
    pub row: Vec<ReportRow>,
}

/// A report row: either a group nesting child rows or a leaf with column
/// values.
#[derive(Deserialize, Debug)]
pub struct ReportRow {
    #[serde(rename = "Rows")]
    pub rows: Option<RowGroup>,
    #[serde(rename = "ColData")]
    pub col_data: Option<Vec<ColData>>,
}

#[derive(Deserialize, Debug)]
pub struct ColData {
    #[serde(default)]
    pub value: Option<String>,
}

/// Data API client scoped to one company file.
pub struct AccountingApiClient {
    http: reqwest::Client,
    base_url: String,
    company_id: String,
    minor_version: u32,
}

impl AccountingApiClient {
    pub fn new(base_url: String, company_id: String, minor_version: u32) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
            company_id,
            minor_version,
        }
    }

    /// Fetches the full chart of accounts via the SQL-like query endpoint.
    pub async fn query_accounts(
        &self,
        access_token: &str,
    ) -> Result<Vec<ApiAccount>, UpstreamError> {
        let url = format!("{}/v3/company/{}/query", self.base_url, self.company_id);

        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .header("Accept", "application/json")
            .query(&[
                ("query", "SELECT * FROM Account".to_string()),
                ("minorversion", self.minor_version.to_string()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read body>".to_string());
            return Err(UpstreamError::Status { status, body });
        }

        let body: AccountQueryBody = response.json().await?;
        Ok(body.query_response.account)
    }

    /// Fetches the general-ledger report for a date window with an explicit
    /// column list.
    pub async fn general_ledger(
        &self,
        access_token: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
        columns: &str,
        accounting_method: &str,
    ) -> Result<LedgerReport, UpstreamError> {
        let url = format!(
            "{}/v3/company/{}/reports/GeneralLedger",
            self.base_url, self.company_id
        );

        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .header("Accept", "application/json")
            .query(&[
                ("start_date", start_date.format("%Y-%m-%d").to_string()),
                ("end_date", end_date.format("%Y-%m-%d").to_string()),
                ("accounting_method", accounting_method.to_string()),
                ("columns", columns.to_string()),
                ("minorversion", self.minor_version.to_string()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read body>".to_string());
            return Err(UpstreamError::Status { status, body });
        }

        Ok(response.json().await?)
    }
}
