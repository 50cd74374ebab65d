use std::fs;
use std::path::Path;

use tempfile::tempdir;

use sales_digest::app::run_monthly_digest;
use sales_digest::ledger::CompletionLedger;
use sales_digest::{DirectoryOutbox, ExecutionSummary, FileLedger, KeyState};

const EXPORT: &str = r#"[
  {
    "record_id": "9001",
    "created_on": "2026-09-14",
    "customer": { "id": "c-17", "name": "Acme Corp" },
    "email": "ap@acme.test",
    "document_number": "SO-1204",
    "total": "100.00",
    "sales_rep": { "id": "1742" }
  },
  {
    "record_id": "9002",
    "created_on": "2026-09-20",
    "customer": { "id": "c-18", "name": "Smith, Jones & Co" },
    "email": "",
    "document_number": "SO-1205",
    "total": "75.25"
  },
  {
    "record_id": "9003",
    "created_on": "2026-10-02",
    "customer": { "id": "c-19", "name": "Late Order" },
    "document_number": "SO-1300",
    "total": "1.00",
    "sales_rep": { "id": "1742" }
  }
]"#;

fn args(store: &Path, state: &Path, summary: &Path, extra: &[&str]) -> Vec<String> {
    let mut args = vec![
        "--store".to_string(),
        store.display().to_string(),
        "--state-dir".to_string(),
        state.display().to_string(),
        "--summary-out".to_string(),
        summary.display().to_string(),
        "--as-of".to_string(),
        "2026-10-01".to_string(),
        "--no-backoff".to_string(),
    ];
    args.extend(extra.iter().map(|arg| arg.to_string()));
    args
}

fn read_summary(path: &Path) -> ExecutionSummary {
    serde_json::from_slice(&fs::read(path).unwrap()).unwrap()
}

#[test]
fn cli_writes_reports_notifications_and_summary() {
    let dir = tempdir().unwrap();
    let exports = dir.path().join("exports");
    fs::create_dir_all(&exports).unwrap();
    fs::write(exports.join("september.json"), EXPORT).unwrap();
    let state = dir.path().join("state");
    let summary_path = dir.path().join("summary.json");

    run_monthly_digest(args(&exports, &state, &summary_path, &["--quote-fields"]).into_iter())
        .unwrap();

    let summary = read_summary(&summary_path);
    assert_eq!(summary.run_id, "monthly_sales_digest:2026-09-01..2026-09-30");
    assert_eq!(summary.input_count, 2);
    assert_eq!(summary.per_key_status["1742"].state, KeyState::Completed);
    assert_eq!(summary.per_key_status["admin"].row_count, 1);

    let outbox = DirectoryOutbox::open(state.join("outbox")).unwrap();
    let admin_report = fs::read_to_string(outbox.artifact_path("sales_data_admin.csv")).unwrap();
    assert_eq!(
        admin_report,
        "Customer Name,Customer Email,Sales Order Document Number,Sales Amount\n\
         \"Smith, Jones & Co\",,SO-1205,75.25\n"
    );
    let notifications = outbox.read_notifications().unwrap();
    assert_eq!(notifications.len(), 2);
    assert!(notifications.iter().any(|n| n.recipient == "-5"));
    assert!(notifications.iter().all(|n| n.sender == "1667"));
    assert!(state.join("completion_ledger.json").exists());
}

#[test]
fn rerunning_the_same_month_skips_completed_keys() {
    let dir = tempdir().unwrap();
    let export = dir.path().join("export.json");
    fs::write(&export, EXPORT).unwrap();
    let state = dir.path().join("state");
    let summary_path = dir.path().join("summary.json");

    run_monthly_digest(args(&export, &state, &summary_path, &[]).into_iter()).unwrap();
    run_monthly_digest(args(&export, &state, &summary_path, &[]).into_iter()).unwrap();

    let summary = read_summary(&summary_path);
    assert!(
        summary
            .per_key_status
            .values()
            .all(|status| status.state == KeyState::AlreadyCompleted)
    );
    let outbox = DirectoryOutbox::open(state.join("outbox")).unwrap();
    assert_eq!(outbox.read_notifications().unwrap().len(), 2);

    run_monthly_digest(args(&export, &state, &summary_path, &["--no-ledger"]).into_iter())
        .unwrap();
    assert_eq!(outbox.read_notifications().unwrap().len(), 4);
}

#[test]
fn ledger_keeps_only_the_most_recent_runs() {
    let dir = tempdir().unwrap();
    let export = dir.path().join("export.json");
    fs::write(&export, EXPORT).unwrap();
    let state = dir.path().join("state");
    let summary_path = dir.path().join("summary.json");

    run_monthly_digest(args(&export, &state, &summary_path, &[]).into_iter()).unwrap();
    let october = vec![
        "--store".to_string(),
        export.display().to_string(),
        "--state-dir".to_string(),
        state.display().to_string(),
        "--as-of".to_string(),
        "2026-11-01".to_string(),
        "--ledger-retention".to_string(),
        "1".to_string(),
        "--no-backoff".to_string(),
    ];
    run_monthly_digest(october.into_iter()).unwrap();

    let ledger = FileLedger::open(state.join("completion_ledger.json")).unwrap();
    assert_eq!(
        ledger.run_ids().unwrap(),
        vec!["monthly_sales_digest:2026-10-01..2026-10-31".to_string()]
    );
    assert!(
        ledger
            .is_complete("monthly_sales_digest:2026-10-01..2026-10-31", "1742")
            .unwrap()
    );
}

#[test]
fn missing_store_is_an_error() {
    let dir = tempdir().unwrap();
    let result = run_monthly_digest(
        args(
            &dir.path().join("nope.json"),
            &dir.path().join("state"),
            &dir.path().join("summary.json"),
            &[],
        )
        .into_iter(),
    );
    assert!(result.is_err());
}

#[test]
fn help_is_not_an_error() {
    run_monthly_digest(vec!["--help".to_string()].into_iter()).unwrap();
}
