/// Grouping key for the reduce stage: a sales representative id or `admin`.
/// Examples: `1742`, `admin`
pub type PartitionKey = String;
/// Internal id of a sales-order record in the record store.
/// Example: `8812`
pub type RecordId = String;
/// Identifier of a record store, used in logs and fatal input errors.
/// Examples: `memory`, `export:/var/exports/sales_orders.json`
pub type StoreId = String;
/// Label identifying one retryable map unit (usually the record id).
/// Examples: `8812`, `row#14`
pub type UnitId = String;
/// Identifier a notification is addressed to (employee id or mailbox id).
/// Examples: `1742`, `-5`
pub type RecipientId = String;
/// Identity a notification is sent on behalf of.
/// Example: `1667`
pub type SenderId = String;
/// Stable identity of one pipeline run, derived from job name and window.
/// Example: `monthly_sales_digest:2026-09-01..2026-09-30`
pub type RunId = String;
/// Warning/error message text captured for summaries.
/// Example: `partition 'rep1' dispatch failed: connection reset`
pub type LogMessage = String;
