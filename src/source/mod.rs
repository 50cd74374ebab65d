//! Record store query interface and built-in stores.
//!
//! Ownership model:
//! - `RecordStore` is the pipeline-facing query interface. It serves one page
//!   of projected rows per call and hands back a continuation cursor.
//! - The cursor lives only inside a single enumeration; nothing outside the
//!   pipeline run keeps paging state, so a restarted run starts from scratch.
//! - `StoredOrder` is the backing shape shared by the in-memory and export
//!   stores; `page_stored_orders` owns the filter/project/page logic for both.

use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::data::{CustomerRef, OwnerRef};
use crate::errors::PipelineError;
use crate::types::{RecordId, StoreId};

/// JSON export store backed by a file or a directory of files.
pub mod json_store;
/// Query window helpers.
pub mod window;

pub use json_store::JsonExportStore;
pub use window::QueryWindow;

/// Record kind selector for a query.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// Sales order transactions.
    #[default]
    SalesOrder,
    /// Invoice transactions.
    Invoice,
    /// Cash sale transactions.
    CashSale,
}

/// Projectable result columns.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    /// Internal record id.
    InternalId,
    /// Customer reference (value = id, text = name).
    Entity,
    /// Document number.
    TranId,
    /// Order total.
    Total,
    /// Owning sales representative (value = employee id).
    SalesRep,
    /// Email stored on the order.
    Email,
}

impl Column {
    /// Store-facing column name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Column::InternalId => "internalid",
            Column::Entity => "entity",
            Column::TranId => "tranid",
            Column::Total => "total",
            Column::SalesRep => "salesrep",
            Column::Email => "email",
        }
    }
}

/// Filter predicate applied by the store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QueryFilter {
    /// Creation date inside the window (inclusive).
    CreatedWithin(QueryWindow),
    /// Only top-level (`true`) or only line-level (`false`) rows.
    MainLine(bool),
}

/// Filtered, projected query against a record store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordQuery {
    /// Record kind to select.
    pub kind: RecordKind,
    /// Predicates every returned row satisfies.
    pub filters: Vec<QueryFilter>,
    /// Columns projected into each result row, in order.
    pub columns: Vec<Column>,
}

impl RecordQuery {
    /// Reject queries a store cannot issue.
    pub fn validate(&self, store_id: &str) -> Result<(), PipelineError> {
        let malformed = |reason: String| PipelineError::FatalInput {
            store_id: store_id.to_string(),
            reason,
        };
        if self.columns.is_empty() {
            return Err(malformed("query projects no columns".into()));
        }
        for (idx, column) in self.columns.iter().enumerate() {
            if self.columns[..idx].contains(column) {
                return Err(malformed(format!(
                    "column '{}' is projected twice",
                    column.as_str()
                )));
            }
        }
        let window_filters = self
            .filters
            .iter()
            .filter(|filter| matches!(filter, QueryFilter::CreatedWithin(_)))
            .count();
        if window_filters > 1 {
            return Err(malformed("query carries more than one date window".into()));
        }
        Ok(())
    }
}

/// Raw value plus display text of one projected field.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldValue {
    /// Raw stored value, such as an internal id.
    pub value: Option<String>,
    /// Display text; for references, the referenced record name.
    pub text: Option<String>,
}

impl FieldValue {
    fn plain(value: Option<&str>) -> Self {
        let value = value.map(str::to_string);
        Self {
            text: value.clone(),
            value,
        }
    }
}

/// One result row with named-field accessors.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResultRow {
    fields: IndexMap<Column, FieldValue>,
}

impl ResultRow {
    /// Set a projected field.
    pub fn with_field(mut self, column: Column, field: FieldValue) -> Self {
        self.fields.insert(column, field);
        self
    }

    /// Returns `true` when `column` was projected into this row.
    pub fn has_column(&self, column: Column) -> bool {
        self.fields.contains_key(&column)
    }

    /// Raw value of `column`, if projected and set.
    pub fn value(&self, column: Column) -> Option<&str> {
        self.fields
            .get(&column)
            .and_then(|field| field.value.as_deref())
    }

    /// Display text of `column`, if projected and set.
    pub fn text(&self, column: Column) -> Option<&str> {
        self.fields
            .get(&column)
            .and_then(|field| field.text.as_deref())
    }
}

/// Store-owned paging position within one enumeration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueryCursor {
    /// Number of matching rows already served.
    pub position: u64,
}

/// Result of a single page fetch.
///
/// Pass `next` back into the following fetch; `None` means the result set is exhausted.
#[derive(Clone, Debug)]
pub struct ResultPage {
    /// Projected rows in store order.
    pub rows: Vec<ResultRow>,
    /// Cursor for the following page; `None` on the last page.
    pub next: Option<QueryCursor>,
}

/// Pipeline-facing record store query interface.
///
/// For a fixed backing dataset and query, the sequence of rows served across
/// pages must be identical on every enumeration.
pub trait RecordStore: Send + Sync {
    /// Stable store identifier used in logs and errors.
    fn id(&self) -> &str;

    /// Fetch up to `limit` matching rows starting at `cursor`.
    ///
    /// Errors are fatal to the run: the enumerator does not retry them.
    fn fetch_page(
        &self,
        query: &RecordQuery,
        cursor: Option<&QueryCursor>,
        limit: usize,
    ) -> Result<ResultPage, PipelineError>;
}

/// Backing row shape of the built-in stores.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredOrder {
    /// Internal id of the transaction.
    pub record_id: RecordId,
    /// Transaction kind; defaults to sales order.
    #[serde(default)]
    pub kind: RecordKind,
    /// Creation date matched against the query window.
    pub created_on: NaiveDate,
    /// Top-level transaction line, as opposed to an item line.
    #[serde(default = "default_main_line")]
    pub main_line: bool,
    /// Customer reference (id and name).
    #[serde(default)]
    pub customer: Option<CustomerRef>,
    /// Customer email on the order.
    #[serde(default)]
    pub email: Option<String>,
    /// Document number, such as `SO1204`.
    #[serde(default)]
    pub document_number: Option<String>,
    /// Order total as text.
    #[serde(default)]
    pub total: Option<String>,
    /// Assigned sales representative, if any.
    #[serde(default)]
    pub sales_rep: Option<OwnerRef>,
}

fn default_main_line() -> bool {
    true
}

impl StoredOrder {
    /// Returns `true` when this row satisfies the query's kind and filters.
    pub fn matches(&self, query: &RecordQuery) -> bool {
        if self.kind != query.kind {
            return false;
        }
        query.filters.iter().all(|filter| match filter {
            QueryFilter::CreatedWithin(window) => window.contains(self.created_on),
            QueryFilter::MainLine(main_line) => self.main_line == *main_line,
        })
    }

    /// Project this row onto `columns`.
    pub fn project(&self, columns: &[Column]) -> ResultRow {
        columns.iter().fold(ResultRow::default(), |row, column| {
            let field = match column {
                Column::InternalId => FieldValue::plain(Some(&self.record_id)),
                Column::Entity => FieldValue {
                    value: self.customer.as_ref().map(|customer| customer.id.clone()),
                    text: self.customer.as_ref().map(|customer| customer.name.clone()),
                },
                Column::TranId => FieldValue::plain(self.document_number.as_deref()),
                Column::Total => FieldValue::plain(self.total.as_deref()),
                Column::SalesRep => FieldValue {
                    value: self.sales_rep.as_ref().map(|rep| rep.id.clone()),
                    text: None,
                },
                Column::Email => FieldValue::plain(self.email.as_deref()),
            };
            row.with_field(*column, field)
        })
    }
}

/// Filter, project, and page `rows` in their stored order.
pub fn page_stored_orders(
    store_id: &str,
    rows: &[StoredOrder],
    query: &RecordQuery,
    cursor: Option<&QueryCursor>,
    limit: usize,
) -> Result<ResultPage, PipelineError> {
    query.validate(store_id)?;
    if limit == 0 {
        return Err(PipelineError::FatalInput {
            store_id: store_id.to_string(),
            reason: "page limit must be greater than zero".into(),
        });
    }
    let start = cursor.map(|cursor| cursor.position as usize).unwrap_or(0);
    let mut matching = rows.iter().filter(|row| row.matches(query)).skip(start);
    let page: Vec<ResultRow> = matching
        .by_ref()
        .take(limit)
        .map(|row| row.project(&query.columns))
        .collect();
    let has_more = matching.next().is_some();
    let next = has_more.then(|| QueryCursor {
        position: (start + page.len()) as u64,
    });
    Ok(ResultPage { rows: page, next })
}

/// In-memory record store for tests and small datasets.
pub struct InMemoryRecordStore {
    id: StoreId,
    rows: Arc<Vec<StoredOrder>>,
}

impl InMemoryRecordStore {
    /// Create an in-memory store from prebuilt rows.
    pub fn new(id: impl Into<StoreId>, rows: Vec<StoredOrder>) -> Self {
        Self {
            id: id.into(),
            rows: Arc::new(rows),
        }
    }

    /// Number of stored rows, matching or not.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns `true` when the store holds no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl RecordStore for InMemoryRecordStore {
    fn id(&self) -> &str {
        &self.id
    }

    fn fetch_page(
        &self,
        query: &RecordQuery,
        cursor: Option<&QueryCursor>,
        limit: usize,
    ) -> Result<ResultPage, PipelineError> {
        page_stored_orders(&self.id, &self.rows, query, cursor, limit)
    }
}
