#![allow(dead_code)]

use std::sync::Arc;

use chrono::NaiveDate;

use sales_digest::config::RetryPolicy;
use sales_digest::source::RecordKind;
use sales_digest::{
    CustomerRef, InMemoryRecordStore, OwnerRef, PipelineConfig, QueryWindow, SchedulerConfig,
    StoredOrder,
};

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

/// Window for a run on 2026-10-01: September 2026.
pub fn september() -> QueryWindow {
    QueryWindow::previous_month(date(2026, 10, 1)).unwrap()
}

pub fn order(id: &str, day: u32, rep: Option<&str>, amount: &str) -> StoredOrder {
    StoredOrder {
        record_id: id.to_string(),
        kind: RecordKind::SalesOrder,
        created_on: date(2026, 9, day),
        main_line: true,
        customer: Some(CustomerRef {
            id: format!("cust-{id}"),
            name: format!("Customer {id}"),
        }),
        email: Some(format!("buyer{id}@example.com")),
        document_number: Some(format!("SO{id}")),
        total: Some(amount.to_string()),
        sales_rep: rep.map(|rep| OwnerRef { id: rep.to_string() }),
    }
}

pub fn store(rows: Vec<StoredOrder>) -> Arc<InMemoryRecordStore> {
    Arc::new(InMemoryRecordStore::new("memory", rows))
}

/// Default config with immediate retries so failing tests stay fast.
pub fn config(max_attempts: u32) -> PipelineConfig {
    PipelineConfig {
        scheduler: SchedulerConfig {
            max_concurrency: 4,
            retry: RetryPolicy::immediate(max_attempts),
        },
        ..PipelineConfig::default()
    }
}
