use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Local, NaiveDate};
use clap::{Parser, error::ErrorKind};
use tracing::{info, warn};

use crate::config::{FieldEscaping, PipelineConfig, RetryPolicy};
use crate::constants::storage::{
    DEFAULT_LEDGER_RETENTION_RUNS, DEFAULT_OUTBOX_DIRNAME, DEFAULT_STATE_DIR,
};
use crate::dispatch::DirectoryOutbox;
use crate::job::SalesDigestJob;
use crate::ledger::FileLedger;
use crate::scheduler::Scheduler;
use crate::source::window::parse_as_of_date;
use crate::source::{JsonExportStore, QueryWindow};
use crate::summary::{ExecutionSummary, JsonSummarySink, KeyState};

#[derive(Debug, Parser)]
#[command(
    name = "sales_digest",
    disable_help_subcommand = true,
    about = "Send last month's sales orders to each sales representative",
    long_about = "Query previous-month sales orders from a JSON export, group them by sales representative, and write one CSV report plus one notification per representative (unassigned customers go to the admin mailbox).",
    after_help = "State (outbox, completion ledger) defaults to .sales_digest/ in the working directory. Set RUST_LOG=info for per-stage logs."
)]
/// CLI for `sales_digest`.
///
/// Common usage:
/// - Run for the month before today: `--store exports/`
/// - Re-run a specific month: `--store exports/ --as-of 2026-10-01`
/// - Keep state elsewhere: `--state-dir /tmp/digest`
struct SalesDigestCli {
    #[arg(
        long,
        value_name = "PATH",
        help = "JSON export file or directory of *.json export files"
    )]
    store: PathBuf,
    #[arg(
        long = "as-of",
        value_name = "DATE",
        value_parser = parse_as_of_arg,
        help = "Reference date (YYYY-MM-DD or MM-DD-YYYY); the run covers the previous calendar month [default: today]"
    )]
    as_of: Option<NaiveDate>,
    #[arg(
        long = "state-dir",
        value_name = "DIR",
        default_value = DEFAULT_STATE_DIR,
        help = "Directory for the outbox and completion ledger"
    )]
    state_dir: PathBuf,
    #[arg(
        long,
        value_name = "DIR",
        help = "Outbox directory override (defaults to <state-dir>/outbox)"
    )]
    outbox: Option<PathBuf>,
    #[arg(
        long = "ledger-path",
        value_name = "PATH",
        conflicts_with = "no_ledger",
        help = "Completion ledger override (defaults to <state-dir>/completion_ledger.json)"
    )]
    ledger_path: Option<PathBuf>,
    #[arg(
        long = "no-ledger",
        help = "Dispatch every key even if an earlier attempt of this run completed it"
    )]
    no_ledger: bool,
    #[arg(
        long = "ledger-retention",
        value_name = "RUNS",
        default_value_t = DEFAULT_LEDGER_RETENTION_RUNS,
        value_parser = parse_positive_usize,
        help = "Most recent runs kept in the completion ledger; older entries are pruned"
    )]
    ledger_retention: usize,
    #[arg(
        long = "summary-out",
        value_name = "PATH",
        help = "Also write the execution summary as JSON"
    )]
    summary_out: Option<PathBuf>,
    #[arg(
        long = "max-concurrency",
        value_parser = parse_positive_usize,
        help = "Maximum units running at once"
    )]
    max_concurrency: Option<usize>,
    #[arg(
        long = "max-attempts",
        value_parser = parse_positive_u32,
        help = "Attempts per map or reduce unit, first attempt included"
    )]
    max_attempts: Option<u32>,
    #[arg(
        long = "page-size",
        value_parser = parse_positive_usize,
        help = "Rows requested per store page"
    )]
    page_size: Option<usize>,
    #[arg(
        long = "no-backoff",
        help = "Retry immediately instead of backing off"
    )]
    no_backoff: bool,
    #[arg(long = "admin-mailbox", help = "Recipient for unassigned customers")]
    admin_mailbox: Option<String>,
    #[arg(long, help = "Sender identity for notifications")]
    sender: Option<String>,
    #[arg(
        long = "quote-fields",
        help = "Quote report fields that contain commas, quotes, or line breaks"
    )]
    quote_fields: bool,
}

impl SalesDigestCli {
    fn pipeline_config(&self) -> PipelineConfig {
        let mut config = PipelineConfig::default();
        if let Some(page_size) = self.page_size {
            config.page_size = page_size;
        }
        if let Some(max_concurrency) = self.max_concurrency {
            config.scheduler.max_concurrency = max_concurrency;
        }
        let max_attempts = self
            .max_attempts
            .unwrap_or(config.scheduler.retry.max_attempts);
        config.scheduler.retry = if self.no_backoff {
            RetryPolicy::immediate(max_attempts)
        } else {
            RetryPolicy {
                max_attempts,
                ..RetryPolicy::default()
            }
        };
        if let Some(mailbox) = &self.admin_mailbox {
            config.notification.admin_mailbox = mailbox.clone().into();
        }
        if let Some(sender) = &self.sender {
            config.notification.sender = sender.clone().into();
        }
        if self.quote_fields {
            config.report.escaping = FieldEscaping::Quoted;
        }
        config
    }
}

/// Run one monthly digest from command-line arguments (program name excluded).
///
/// Returns an error when configuration is invalid or the input stage fails;
/// per-key dispatch failures are reported in the printed summary instead.
pub fn run_monthly_digest<I>(args_iter: I) -> Result<(), Box<dyn Error>>
where
    I: Iterator<Item = String>,
{
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let Some(cli) = parse_cli::<SalesDigestCli, _>(
        std::iter::once("sales_digest".to_string()).chain(args_iter),
    )?
    else {
        return Ok(());
    };

    let config = cli.pipeline_config();
    config.validate()?;

    let as_of = cli.as_of.unwrap_or_else(|| Local::now().date_naive());
    let window = QueryWindow::previous_month(as_of)?;

    let store = Arc::new(JsonExportStore::open(&cli.store)?);
    let outbox = Arc::new(DirectoryOutbox::open(
        cli.outbox
            .clone()
            .unwrap_or_else(|| cli.state_dir.join(DEFAULT_OUTBOX_DIRNAME)),
    )?);

    let mut job = SalesDigestJob::new(&config, store, window, outbox.clone(), outbox.clone());
    if let Some(path) = &cli.summary_out {
        job = job.with_summary_sink(Box::new(JsonSummarySink::new(path)));
    }

    let mut scheduler = Scheduler::new(config.scheduler.clone())?;
    let ledger = if cli.no_ledger {
        None
    } else {
        let ledger_path = cli
            .ledger_path
            .clone()
            .unwrap_or_else(|| FileLedger::default_path_in_dir(&cli.state_dir));
        let ledger = Arc::new(FileLedger::open(ledger_path)?);
        scheduler = scheduler.with_ledger(ledger.clone());
        Some(ledger)
    };

    let summary = scheduler.run(&job)?;
    if let Some(ledger) = ledger {
        match ledger.retain_latest_runs(cli.ledger_retention) {
            Ok(0) => {}
            Ok(removed) => info!(
                "[sales_digest:ledger] pruned {} run(s) older than the latest {}",
                removed, cli.ledger_retention
            ),
            Err(err) => warn!("[sales_digest:ledger] pruning failed: {}", err),
        }
    }
    print_summary(&summary, &outbox);
    Ok(())
}

fn print_summary(summary: &ExecutionSummary, outbox: &DirectoryOutbox) {
    println!("=== sales digest ===");
    println!("run: {}", summary.run_id);
    println!("window: {}", summary.window);
    println!("outbox: {}", outbox.root().display());
    println!();
    println!("[KEYS]");
    for (key, status) in &summary.per_key_status {
        let state = match status.state {
            KeyState::Completed => "sent",
            KeyState::Failed => "FAILED",
            KeyState::AlreadyCompleted => "already sent",
        };
        println!(
            "  {:<16} rows={:<6} attempts={} recipient={} {}",
            key,
            status.row_count,
            status.attempts,
            status.recipient.as_deref().unwrap_or("-"),
            state
        );
        if let Some(last) = status.errors.last() {
            println!("    last error: {}", last);
        }
    }
    if !summary.map_failures.is_empty() {
        println!();
        println!("[SKIPPED RECORDS]");
        for failure in &summary.map_failures {
            println!(
                "  {} ({} attempt(s)): {}",
                failure.unit_id,
                failure.attempts,
                failure.errors.last().map(String::as_str).unwrap_or("")
            );
        }
    }
    println!();
    println!("[STATS]");
    println!("  input records: {}", summary.input_count);
    println!("  notifications sent: {}", summary.notifications_sent());
    println!("  usage units: {}", summary.usage_units);
    println!("  peak concurrency: {}", summary.concurrency);
    println!("  retries: {}", summary.retry_count);
    println!("  yields: {}", summary.yield_count);
    println!("  elapsed: {:.2}s", summary.elapsed_seconds);
    if let Some(skew) = summary.partition_skew() {
        println!(
            "  largest partition share: {:.1}%",
            skew.max_share * 100.0
        );
    }
}

fn parse_cli<T, I>(args: I) -> Result<Option<T>, Box<dyn Error>>
where
    T: Parser,
    I: IntoIterator,
    I::Item: Into<std::ffi::OsString> + Clone,
{
    match T::try_parse_from(args) {
        Ok(cli) => Ok(Some(cli)),
        Err(err) => match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                err.print()?;
                Ok(None)
            }
            _ => Err(err.into()),
        },
    }
}

fn parse_as_of_arg(raw: &str) -> Result<NaiveDate, String> {
    parse_as_of_date(raw).ok_or_else(|| {
        format!(
            "Could not parse --as-of value '{}'; expected YYYY-MM-DD or MM-DD-YYYY",
            raw
        )
    })
}

fn parse_positive_usize(raw: &str) -> Result<usize, String> {
    let parsed = raw
        .parse::<usize>()
        .map_err(|_| format!("Could not parse '{}' as a positive integer", raw))?;
    if parsed == 0 {
        return Err("value must be greater than zero".to_string());
    }
    Ok(parsed)
}

fn parse_positive_u32(raw: &str) -> Result<u32, String> {
    let parsed = raw
        .parse::<u32>()
        .map_err(|_| format!("Could not parse '{}' as a positive integer", raw))?;
    if parsed == 0 {
        return Err("value must be greater than zero".to_string());
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> SalesDigestCli {
        SalesDigestCli::try_parse_from(
            std::iter::once("sales_digest").chain(args.iter().copied()),
        )
        .unwrap()
    }

    #[test]
    fn flags_override_pipeline_defaults() {
        let cli = parse(&[
            "--store",
            "exports",
            "--max-concurrency",
            "2",
            "--max-attempts",
            "5",
            "--no-backoff",
            "--admin-mailbox",
            "sales-ops",
            "--quote-fields",
        ]);
        let config = cli.pipeline_config();
        assert_eq!(config.scheduler.max_concurrency, 2);
        assert_eq!(config.scheduler.retry.max_attempts, 5);
        assert!(config.scheduler.retry.initial_backoff.is_zero());
        assert_eq!(config.notification.admin_mailbox, "sales-ops");
        assert_eq!(config.report.escaping, FieldEscaping::Quoted);
        config.validate().unwrap();
    }

    #[test]
    fn as_of_accepts_both_date_orders() {
        let iso = parse(&["--store", "x", "--as-of", "2026-10-16"]);
        let us = parse(&["--store", "x", "--as-of", "10-16-2026"]);
        assert_eq!(iso.as_of, us.as_of);
        assert!(
            SalesDigestCli::try_parse_from(["sales_digest", "--store", "x", "--as-of", "soon"])
                .is_err()
        );
    }

    #[test]
    fn zero_concurrency_is_rejected_at_parse_time() {
        assert!(
            SalesDigestCli::try_parse_from(["sales_digest", "--store", "x", "--max-concurrency", "0"])
                .is_err()
        );
    }

    #[test]
    fn ledger_flags_conflict() {
        assert!(
            SalesDigestCli::try_parse_from([
                "sales_digest",
                "--store",
                "x",
                "--no-ledger",
                "--ledger-path",
                "l.json"
            ])
            .is_err()
        );
    }
}
