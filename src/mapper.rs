//! Map stage: `RawRecord` to `(PartitionKey, PartitionValue)`.
//!
//! Pure and I/O free. A record is never dropped for lacking an owner; it is
//! routed to the admin partition instead.

use crate::constants::partition::ADMIN_PARTITION_KEY;
use crate::data::{OwnerRef, PartitionValue, RawRecord};
use crate::errors::PipelineError;
use crate::types::PartitionKey;
use crate::utils::{non_blank, normalize_inline_whitespace, parse_amount};

/// Returns `true` for the partition that collects unassigned customers.
pub fn is_admin_key(key: &str) -> bool {
    key == ADMIN_PARTITION_KEY
}

/// Partition key for an owner reference; absent or blank owners map to `admin`.
pub fn partition_key_for(owner: Option<&OwnerRef>) -> PartitionKey {
    owner
        .and_then(|owner| non_blank(Some(&owner.id)))
        .unwrap_or_else(|| ADMIN_PARTITION_KEY.to_string())
}

/// Validate and normalize one raw record.
pub fn map_record(raw: &RawRecord) -> Result<(PartitionKey, PartitionValue), PipelineError> {
    let invalid = |reason: &str| PipelineError::UnitTransform {
        unit_id: raw.record_id.clone(),
        reason: reason.to_string(),
    };
    let customer = raw
        .customer
        .as_ref()
        .ok_or_else(|| invalid("missing customer reference"))?;
    let customer_id =
        non_blank(Some(&customer.id)).ok_or_else(|| invalid("customer reference has no id"))?;
    let document_number = non_blank(raw.document_number.as_deref())
        .ok_or_else(|| invalid("missing document number"))?;
    let amount_text = raw
        .amount
        .as_deref()
        .ok_or_else(|| invalid("missing amount"))?;
    let amount = parse_amount(amount_text)
        .ok_or_else(|| invalid(&format!("amount '{amount_text}' is not a decimal number")))?;

    let value = PartitionValue {
        customer_id,
        customer_name: normalize_inline_whitespace(&customer.name),
        customer_email: raw
            .customer_email
            .as_deref()
            .map(str::trim)
            .unwrap_or_default()
            .to_string(),
        document_number,
        amount,
    };
    Ok((partition_key_for(raw.owner.as_ref()), value))
}
