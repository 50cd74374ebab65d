/// Constants used by the map stage for key assignment.
pub mod partition {
    /// Partition key used for records with no owning sales representative.
    pub const ADMIN_PARTITION_KEY: &str = "admin";
}

/// Constants used by report artifact construction.
pub mod report {
    /// Fixed header columns of the sales report, in output order.
    pub const REPORT_HEADER: [&str; 4] = [
        "Customer Name",
        "Customer Email",
        "Sales Order Document Number",
        "Sales Amount",
    ];
    /// MIME type of every generated report artifact.
    pub const REPORT_MIME_TYPE: &str = "text/csv";
    /// Prefix of generated report filenames (`sales_data_<key>.csv`).
    pub const REPORT_FILENAME_PREFIX: &str = "sales_data_";
    /// Extension of generated report filenames.
    pub const REPORT_FILENAME_EXTENSION: &str = "csv";
    /// Field separator used in report rows.
    pub const FIELD_SEPARATOR: char = ',';
    /// Line terminator appended to every report line, header included.
    pub const LINE_TERMINATOR: &str = "\n";
}

/// Constants used by recipient resolution and message text.
pub mod notification {
    /// Mailbox id that receives the unassigned-representative report.
    pub const DEFAULT_ADMIN_MAILBOX: &str = "-5";
    /// Identity notifications are sent on behalf of.
    pub const DEFAULT_SENDER: &str = "1667";
    /// Subject used for every partition notification.
    pub const DEFAULT_SUBJECT: &str = "Monthly Sales Data";
    /// Body sent to the admin mailbox for unassigned customers.
    pub const DEFAULT_ADMIN_BODY: &str = "Please find attached the sales data for customers without assigned sales representatives. Please add sales representatives for these customers.";
    /// Body sent to each sales representative.
    pub const DEFAULT_REP_BODY: &str = "Please find attached your sales data for the previous month.";
}

/// Constants used by the scheduler and retry policy.
pub mod scheduler {
    /// Default job name used to derive run ids.
    pub const DEFAULT_JOB_NAME: &str = "monthly_sales_digest";
    /// Default upper bound on parallel map/reduce units.
    pub const DEFAULT_MAX_CONCURRENCY: usize = 4;
    /// Default number of attempts per unit (first attempt included).
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
    /// Default first backoff pause between attempts, in milliseconds.
    pub const DEFAULT_INITIAL_BACKOFF_MS: u64 = 50;
    /// Default ceiling for backoff pauses, in milliseconds.
    pub const DEFAULT_MAX_BACKOFF_MS: u64 = 2_000;
    /// Default number of rows fetched per query page.
    pub const DEFAULT_PAGE_SIZE: usize = 1_000;
}

/// Usage units charged per external interface call.
pub mod usage {
    /// Charged for each query page fetched from the record store.
    pub const QUERY_PAGE_COST: u64 = 10;
    /// Charged for each artifact creation.
    pub const ARTIFACT_CREATE_COST: u64 = 10;
    /// Charged for each notification dispatch.
    pub const NOTIFICATION_COST: u64 = 20;
}

/// Constants used by filesystem-backed stores and outboxes.
pub mod storage {
    /// Default directory for CLI state (outbox, ledger, summaries).
    pub const DEFAULT_STATE_DIR: &str = ".sales_digest";
    /// Default ledger filename inside the state directory.
    pub const DEFAULT_LEDGER_FILENAME: &str = "completion_ledger.json";
    /// Default outbox subdirectory inside the state directory.
    pub const DEFAULT_OUTBOX_DIRNAME: &str = "outbox";
    /// Run ids per job kept in the completion ledger by the CLI.
    pub const DEFAULT_LEDGER_RETENTION_RUNS: usize = 12;
    /// Subdirectory of an outbox that holds artifact files.
    pub const OUTBOX_ARTIFACT_DIR: &str = "artifacts";
    /// Notification log written by the directory outbox (one JSON object per line).
    pub const OUTBOX_NOTIFICATION_LOG: &str = "notifications.jsonl";
    /// File extension recognized when scanning an export directory.
    pub const EXPORT_FILE_EXTENSION: &str = "json";
}
