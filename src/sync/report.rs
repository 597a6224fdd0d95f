//! General-ledger report flattening, deduplication, and sanitization.
//!
//! The report arrives as a recursive row tree: groups nest child rows, leaves
//! carry positional column values. Flattening walks the tree depth-first,
//! left-to-right, and zips each leaf's values against the requested column
//! headers. "Beginning Balance" leaves are report-generated subtotal
//! artifacts, not transactions, and are dropped.

use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

use super::client::{ReportRow, RowGroup};

/// Columns requested from the general-ledger report, in order.
pub const LEDGER_COLUMNS: [&str; 11] = [
    "tx_date",
    "txn_type",
    "last_mod_date",
    "create_date",
    "name",
    "cust_name",
    "vend_name",
    "memo",
    "account_name",
    "split_acc",
    "subt_nat_amount",
];

/// The requested column list as the comma-separated report parameter.
pub fn columns_param() -> String {
    LEDGER_COLUMNS.join(",")
}

/// A flattened leaf row keyed by column header. BTreeMap keeps key order
/// canonical for deduplication.
pub type FlatRecord = BTreeMap<String, String>;

/// A sanitized general-ledger entry ready for persistence.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct LedgerEntry {
    pub tx_date: Option<String>,
    pub txn_type: Option<String>,
    pub create_date: Option<String>,
    pub last_mod_date: Option<String>,
    pub cust_name: Option<String>,
    pub name: Option<String>,
    pub vend_name: Option<String>,
    pub memo: Option<String>,
    pub account_name: Option<String>,
    pub split_acc: Option<String>,
    pub subt_nat_amount: Option<f64>,
}

/// Flattens a report row tree into one record per leaf row.
///
/// Column values are zipped positionally against `headers`; columns beyond
/// the declared list fall back to `unknown_{index}`. Leaves whose first
/// column is "Beginning Balance" are excluded.
pub fn flatten_rows(rows: &[ReportRow], headers: &[&str]) -> Vec<FlatRecord> {
    let mut records = Vec::new();
    flatten_into(rows, headers, &mut records);
    records
}

fn flatten_into(rows: &[ReportRow], headers: &[&str], records: &mut Vec<FlatRecord>) {
    for row in rows {
        if let Some(RowGroup { row: children }) = &row.rows {
            flatten_into(children, headers, records);
        } else if let Some(cols) = &row.col_data {
            let first = cols
                .first()
                .and_then(|c| c.value.as_deref())
                .unwrap_or_default();
            if first == "Beginning Balance" {
                continue;
            }

            let mut record = FlatRecord::new();
            for (index, col) in cols.iter().enumerate() {
                let header = headers
                    .get(index)
                    .map(|h| h.to_string())
                    .unwrap_or_else(|| format!("unknown_{index}"));
                record.insert(header, col.value.clone().unwrap_or_default());
            }
            records.push(record);
        }
    }
}

/// Removes structurally identical records, keeping first occurrence.
///
/// Guards against the report returning an overlapping row when the date
/// window boundary coincides with an existing transaction timestamp.
pub fn dedupe(records: Vec<FlatRecord>) -> Vec<FlatRecord> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|record| {
            let key = serde_json::to_string(record).unwrap_or_default();
            seen.insert(key)
        })
        .collect()
}

/// Sanitizes a flattened record into a typed ledger entry.
///
/// Absent or empty fields become null; the amount is parsed as a float and
/// becomes null when unparseable.
pub fn sanitize(record: &FlatRecord) -> LedgerEntry {
    LedgerEntry {
        tx_date: text_field(record, "tx_date"),
        txn_type: text_field(record, "txn_type"),
        create_date: text_field(record, "create_date"),
        last_mod_date: text_field(record, "last_mod_date"),
        cust_name: text_field(record, "cust_name"),
        name: text_field(record, "name"),
        vend_name: text_field(record, "vend_name"),
        memo: text_field(record, "memo"),
        account_name: text_field(record, "account_name"),
        split_acc: text_field(record, "split_acc"),
        subt_nat_amount: record
            .get("subt_nat_amount")
            .and_then(|v| v.trim().parse::<f64>().ok()),
    }
}

fn text_field(record: &FlatRecord, key: &str) -> Option<String> {
    record.get(key).filter(|v| !v.is_empty()).cloned()
}
