use serde::{Deserialize, Serialize};

pub use crate::types::{PartitionKey, RecipientId, RecordId};

/// Customer reference as returned by the record store: internal id plus display name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerRef {
    /// Internal customer id.
    pub id: String,
    /// Customer display name.
    pub name: String,
}

/// Owning sales representative reference.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerRef {
    /// Internal employee id of the sales representative.
    pub id: String,
}

/// One sales-order row as projected by the input query.
///
/// Content fields stay optional here; the map stage decides whether a row is
/// usable. Only `record_id` is structural and always present.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    /// Internal id of the sales order.
    pub record_id: RecordId,
    /// Ordering customer.
    pub customer: Option<CustomerRef>,
    /// Email stored on the order.
    pub customer_email: Option<String>,
    /// Sales order document number (`tranid`).
    pub document_number: Option<String>,
    /// Order total as text, exactly as the store reports it.
    pub amount: Option<String>,
    /// Owning sales representative, absent for unassigned customers.
    pub owner: Option<OwnerRef>,
}

/// Store-independent projection of a `RawRecord` grouped in the reduce stage.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionValue {
    /// Customer internal id.
    pub customer_id: String,
    /// Customer display name, whitespace-normalized.
    pub customer_name: String,
    /// Customer email; empty when the record has none.
    pub customer_email: String,
    /// Sales order document number.
    pub document_number: String,
    /// Order total as written by the store.
    pub amount: String,
}

/// Tabular report built once per partition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportArtifact {
    /// Filename, `sales_data_<key>.csv`.
    pub filename: String,
    /// Always `text/csv`.
    pub mime_type: String,
    /// Column names in output order.
    pub header: Vec<String>,
    /// One row per partition value, in emission order.
    pub rows: Vec<Vec<String>>,
}

impl ReportArtifact {
    /// Number of data rows (header excluded).
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// Notification produced by the reduce stage for one partition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRequest {
    /// Admin mailbox for `admin`, otherwise the partition key.
    pub recipient: RecipientId,
    /// Subject line.
    pub subject: String,
    /// Message text.
    pub body: String,
    /// Report attached to the notification.
    pub attachment: ReportArtifact,
}
