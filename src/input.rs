//! Input stage: the sales-order query and its lazy row stream.

use std::collections::VecDeque;
use std::sync::Arc;

use tracing::debug;

use crate::data::{CustomerRef, OwnerRef, RawRecord};
use crate::errors::PipelineError;
use crate::scheduler::UsageMeter;
use crate::source::{
    Column, QueryCursor, QueryFilter, QueryWindow, RecordKind, RecordQuery, RecordStore, ResultRow,
};

/// Columns projected by the sales-order query.
pub const SALES_ORDER_COLUMNS: [Column; 6] = [
    Column::InternalId,
    Column::Entity,
    Column::TranId,
    Column::Total,
    Column::SalesRep,
    Column::Email,
];

/// Issues the fixed sales-order query and streams its rows as `RawRecord`s.
///
/// The enumerator keeps no paging state of its own: every call to
/// `enumerate` starts a fresh pass from the first page, so a restarted run
/// sees the same rows as long as the store's data is unchanged.
pub struct InputEnumerator {
    store: Arc<dyn RecordStore>,
    window: QueryWindow,
    query: RecordQuery,
    page_size: usize,
    page_cost: u64,
}

impl InputEnumerator {
    /// Enumerate top-level sales orders created inside `window`.
    pub fn new(store: Arc<dyn RecordStore>, window: QueryWindow, page_size: usize) -> Self {
        let query = RecordQuery {
            kind: RecordKind::SalesOrder,
            filters: vec![
                QueryFilter::CreatedWithin(window),
                QueryFilter::MainLine(true),
            ],
            columns: SALES_ORDER_COLUMNS.to_vec(),
        };
        Self {
            store,
            window,
            query,
            page_size,
            page_cost: 0,
        }
    }

    /// Usage units charged per page fetched.
    pub fn with_page_cost(mut self, page_cost: u64) -> Self {
        self.page_cost = page_cost;
        self
    }

    /// Window the query is fixed to.
    pub fn window(&self) -> QueryWindow {
        self.window
    }

    /// Query issued against the store.
    pub fn query(&self) -> &RecordQuery {
        &self.query
    }

    /// Identifier of the backing store.
    pub fn store_id(&self) -> &str {
        self.store.id()
    }

    /// Start a fresh lazy pass over the query results.
    pub fn enumerate<'a>(&'a self, usage: &'a UsageMeter) -> RecordStream<'a> {
        RecordStream {
            enumerator: self,
            usage,
            cursor: None,
            buffered: VecDeque::new(),
            pages: 0,
            state: StreamState::NotStarted,
        }
    }

    /// Drain a full pass, failing on the first error.
    pub fn collect_all(&self, usage: &UsageMeter) -> Result<Vec<RawRecord>, PipelineError> {
        self.enumerate(usage).collect()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum StreamState {
    NotStarted,
    MorePages,
    LastPage,
    Done,
}

/// Lazy iterator over one enumeration pass.
///
/// Yields `Err` at most once; the stream ends after an error.
pub struct RecordStream<'a> {
    enumerator: &'a InputEnumerator,
    usage: &'a UsageMeter,
    cursor: Option<QueryCursor>,
    buffered: VecDeque<ResultRow>,
    pages: usize,
    state: StreamState,
}

impl RecordStream<'_> {
    /// Pages fetched so far in this pass.
    pub fn pages_fetched(&self) -> usize {
        self.pages
    }

    fn fetch_next_page(&mut self) -> Result<(), PipelineError> {
        let enumerator = self.enumerator;
        let page = enumerator.store.fetch_page(
            &enumerator.query,
            self.cursor.as_ref(),
            enumerator.page_size,
        )?;
        self.pages += 1;
        self.usage.charge(enumerator.page_cost);
        debug!(
            store_id = %enumerator.store.id(),
            page = self.pages,
            rows = page.rows.len(),
            "fetched input page"
        );
        self.buffered.extend(page.rows);
        match page.next {
            Some(next) => {
                self.cursor = Some(next);
                self.state = StreamState::MorePages;
            }
            None => self.state = StreamState::LastPage,
        }
        Ok(())
    }
}

impl Iterator for RecordStream<'_> {
    type Item = Result<RawRecord, PipelineError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(row) = self.buffered.pop_front() {
                let record = raw_record_from_row(self.enumerator.store.id(), &row);
                if record.is_err() {
                    self.state = StreamState::Done;
                    self.buffered.clear();
                }
                return Some(record);
            }
            match self.state {
                StreamState::Done | StreamState::LastPage => {
                    self.state = StreamState::Done;
                    return None;
                }
                StreamState::NotStarted | StreamState::MorePages => {
                    if let Err(err) = self.fetch_next_page() {
                        self.state = StreamState::Done;
                        return Some(Err(err));
                    }
                }
            }
        }
    }
}

/// Convert one projected row into a `RawRecord`.
///
/// A row without an internal id means the store ignored the projection, which
/// is a structural (fatal) problem. Every other field is passed through for
/// the map stage to validate.
pub fn raw_record_from_row(store_id: &str, row: &ResultRow) -> Result<RawRecord, PipelineError> {
    let record_id = row
        .value(Column::InternalId)
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| PipelineError::FatalInput {
            store_id: store_id.to_string(),
            reason: "result row is missing 'internalid'".into(),
        })?;
    let customer = row.value(Column::Entity).map(|id| CustomerRef {
        id: id.to_string(),
        name: row.text(Column::Entity).unwrap_or_default().to_string(),
    });
    Ok(RawRecord {
        record_id: record_id.to_string(),
        customer,
        customer_email: row.value(Column::Email).map(str::to_string),
        document_number: row.value(Column::TranId).map(str::to_string),
        amount: row.value(Column::Total).map(str::to_string),
        owner: row
            .value(Column::SalesRep)
            .map(|id| OwnerRef { id: id.to_string() }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{FieldValue, InMemoryRecordStore, ResultPage, StoredOrder};
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn september() -> QueryWindow {
        QueryWindow::previous_month(NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()).unwrap()
    }

    fn order(id: usize, rep: Option<&str>) -> StoredOrder {
        StoredOrder {
            record_id: id.to_string(),
            kind: RecordKind::SalesOrder,
            created_on: NaiveDate::from_ymd_opt(2026, 9, 1 + (id % 28) as u32).unwrap(),
            main_line: true,
            customer: Some(CustomerRef {
                id: format!("c{id}"),
                name: format!("Customer {id}"),
            }),
            email: Some(format!("c{id}@example.com")),
            document_number: Some(format!("SO{id}")),
            total: Some(format!("{id}.00")),
            sales_rep: rep.map(|id| OwnerRef { id: id.into() }),
        }
    }

    /// Store that serves one good page, then fails.
    struct FailingSecondPage {
        calls: AtomicUsize,
    }

    impl RecordStore for FailingSecondPage {
        fn id(&self) -> &str {
            "flaky"
        }

        fn fetch_page(
            &self,
            query: &RecordQuery,
            _cursor: Option<&QueryCursor>,
            _limit: usize,
        ) -> Result<ResultPage, PipelineError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(ResultPage {
                    rows: vec![order(1, None).project(&query.columns)],
                    next: Some(QueryCursor { position: 1 }),
                })
            } else {
                Err(PipelineError::FatalInput {
                    store_id: "flaky".into(),
                    reason: "connection lost".into(),
                })
            }
        }
    }

    #[test]
    fn stream_pages_lazily_and_charges_usage() {
        let rows = (1..=5).map(|id| order(id, Some("rep1"))).collect();
        let store = Arc::new(InMemoryRecordStore::new("memory", rows));
        let enumerator = InputEnumerator::new(store, september(), 2).with_page_cost(10);
        let usage = UsageMeter::new();

        let mut stream = enumerator.enumerate(&usage);
        let first = stream.next().unwrap().unwrap();
        assert_eq!(first.record_id, "1");
        assert_eq!(stream.pages_fetched(), 1);

        let rest: Vec<RawRecord> = stream.map(Result::unwrap).collect();
        assert_eq!(rest.len(), 4);
        assert_eq!(usage.total(), 30);
    }

    #[test]
    fn repeated_passes_are_identical() {
        let rows = (1..=9)
            .map(|id| order(id, if id % 3 == 0 { None } else { Some("rep2") }))
            .collect();
        let store = Arc::new(InMemoryRecordStore::new("memory", rows));
        let enumerator = InputEnumerator::new(store, september(), 4);
        let usage = UsageMeter::new();
        let first = enumerator.collect_all(&usage).unwrap();
        let second = enumerator.collect_all(&usage).unwrap();
        assert_eq!(first.len(), 9);
        assert_eq!(first, second);
    }

    #[test]
    fn store_failure_mid_stream_fails_the_whole_pass() {
        let store = Arc::new(FailingSecondPage {
            calls: AtomicUsize::new(0),
        });
        let enumerator = InputEnumerator::new(store, september(), 1);
        let usage = UsageMeter::new();
        let err = enumerator.collect_all(&usage).unwrap_err();
        assert!(matches!(err, PipelineError::FatalInput { .. }));

        let mut stream = enumerator.enumerate(&usage);
        assert!(stream.next().unwrap().is_err());
        assert!(stream.next().is_none());
    }

    #[test]
    fn rows_without_record_id_are_fatal() {
        let row = ResultRow::default().with_field(Column::Total, FieldValue::default());
        let err = raw_record_from_row("memory", &row).unwrap_err();
        assert!(matches!(err, PipelineError::FatalInput { .. }));
    }

    #[test]
    fn absent_owner_passes_through_as_none() {
        let row = order(4, None).project(&SALES_ORDER_COLUMNS);
        let raw = raw_record_from_row("memory", &row).unwrap();
        assert_eq!(raw.owner, None);
        assert_eq!(
            raw.customer,
            Some(CustomerRef {
                id: "c4".into(),
                name: "Customer 4".into()
            })
        );
        assert_eq!(raw.amount.as_deref(), Some("4.00"));
    }
}
