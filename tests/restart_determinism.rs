use std::sync::Arc;

use tempfile::tempdir;

mod common;

use common::{config, date, order, september, store};
use sales_digest::ledger::CompletionLedger;
use sales_digest::{
    FileLedger, InMemoryLedger, KeyState, Notification, Notifier, PipelineError, QueryWindow,
    RecordingOutbox, SalesDigestJob, Scheduler, StagedJob, StoredOrder,
};

/// Rejects every send addressed to one recipient.
struct BlockedRecipient {
    inner: Arc<RecordingOutbox>,
    recipient: &'static str,
}

impl Notifier for BlockedRecipient {
    fn send(&self, notification: &Notification) -> Result<(), PipelineError> {
        if notification.recipient == self.recipient {
            return Err(PipelineError::Io(std::io::Error::other("mailbox full")));
        }
        self.inner.send(notification)
    }
}

fn rows() -> Vec<StoredOrder> {
    vec![
        order("1", 1, Some("rep1"), "10"),
        order("2", 2, Some("rep2"), "20"),
        order("3", 3, None, "30"),
        order("4", 4, Some("rep1"), "40"),
        order("5", 5, Some("rep2"), "50"),
    ]
}

fn job(
    window: QueryWindow,
    outbox: &Arc<RecordingOutbox>,
    notifier: Arc<dyn Notifier>,
) -> SalesDigestJob {
    SalesDigestJob::new(&config(2), store(rows()), window, outbox.clone(), notifier)
}

#[test]
fn repeated_runs_produce_identical_reports() {
    let first = Arc::new(RecordingOutbox::new());
    let second = Arc::new(RecordingOutbox::new());
    let scheduler = Scheduler::new(config(2).scheduler).unwrap();

    let a = scheduler
        .run(&job(september(), &first, first.clone()))
        .unwrap();
    let b = scheduler
        .run(&job(september(), &second, second.clone()))
        .unwrap();

    assert_eq!(a.run_id, b.run_id);
    assert_eq!(a.input_count, b.input_count);
    let counts = |summary: &sales_digest::ExecutionSummary| -> Vec<(String, usize)> {
        summary
            .per_key_status
            .iter()
            .map(|(key, status)| (key.clone(), status.row_count))
            .collect()
    };
    assert_eq!(counts(&a), counts(&b));
    assert_eq!(first.artifacts(), second.artifacts());
}

#[test]
fn restarted_run_only_dispatches_unfinished_keys() {
    let dir = tempdir().unwrap();
    let ledger_path = FileLedger::default_path_in_dir(dir.path());
    let scheduler = || Scheduler::new(config(2).scheduler).unwrap();

    let first = Arc::new(RecordingOutbox::new());
    let blocked = Arc::new(BlockedRecipient {
        inner: first.clone(),
        recipient: "rep2",
    });
    let summary = scheduler()
        .with_ledger(Arc::new(FileLedger::open(&ledger_path).unwrap()))
        .run(&job(september(), &first, blocked))
        .unwrap();
    assert_eq!(summary.failed_keys(), vec!["rep2"]);
    assert_eq!(first.sent().len(), 2);

    // Restart with a healthy notifier and a reopened ledger.
    let second = Arc::new(RecordingOutbox::new());
    let summary = scheduler()
        .with_ledger(Arc::new(FileLedger::open(&ledger_path).unwrap()))
        .run(&job(september(), &second, second.clone()))
        .unwrap();
    assert_eq!(
        summary.per_key_status["rep1"].state,
        KeyState::AlreadyCompleted
    );
    assert_eq!(
        summary.per_key_status["admin"].state,
        KeyState::AlreadyCompleted
    );
    assert_eq!(summary.per_key_status["rep2"].state, KeyState::Completed);
    assert_eq!(summary.per_key_status["rep1"].row_count, 2);
    let sent = second.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].recipient, "rep2");

    let ledger = FileLedger::open(&ledger_path).unwrap();
    for key in ["rep1", "rep2", "admin"] {
        assert!(ledger.is_complete(&summary.run_id, key).unwrap());
    }
}

#[test]
fn a_different_window_is_a_different_run() {
    let ledger = Arc::new(InMemoryLedger::new());
    let scheduler = Scheduler::new(config(1).scheduler)
        .unwrap()
        .with_ledger(ledger.clone());

    let outbox = Arc::new(RecordingOutbox::new());
    let september_job = job(september(), &outbox, outbox.clone());
    scheduler.run(&september_job).unwrap();
    assert_eq!(
        ledger.completed_keys(&september_job.run_id()),
        vec!["admin", "rep1", "rep2"]
    );

    // October has no rows, so nothing is completed or skipped.
    let october = QueryWindow::previous_month(date(2026, 11, 2)).unwrap();
    let october_job = job(october, &outbox, outbox.clone());
    assert_ne!(october_job.run_id(), september_job.run_id());
    let summary = scheduler.run(&october_job).unwrap();
    assert_eq!(summary.input_count, 0);
    assert!(ledger.completed_keys(&october_job.run_id()).is_empty());
}
