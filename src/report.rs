//! Per-partition CSV report construction.

use std::borrow::Cow;

use crate::config::FieldEscaping;
use crate::constants::report::{
    FIELD_SEPARATOR, LINE_TERMINATOR, REPORT_FILENAME_EXTENSION, REPORT_FILENAME_PREFIX,
    REPORT_HEADER, REPORT_MIME_TYPE,
};
use crate::data::{PartitionValue, ReportArtifact};

/// Filename of the report for `key`.
pub fn report_filename(key: &str) -> String {
    format!("{REPORT_FILENAME_PREFIX}{key}.{REPORT_FILENAME_EXTENSION}")
}

/// Build the report for one partition: fixed header, one row per value in order.
pub fn build_report(key: &str, values: &[PartitionValue]) -> ReportArtifact {
    ReportArtifact {
        filename: report_filename(key),
        mime_type: REPORT_MIME_TYPE.to_string(),
        header: REPORT_HEADER.iter().map(|column| column.to_string()).collect(),
        rows: values
            .iter()
            .map(|value| {
                vec![
                    value.customer_name.clone(),
                    value.customer_email.clone(),
                    value.document_number.clone(),
                    value.amount.clone(),
                ]
            })
            .collect(),
    }
}

/// Render `artifact` as CSV text; every line, header included, ends in `\n`.
pub fn render_report(artifact: &ReportArtifact, escaping: FieldEscaping) -> String {
    let mut out = String::new();
    for line in std::iter::once(&artifact.header).chain(artifact.rows.iter()) {
        for (idx, field) in line.iter().enumerate() {
            if idx > 0 {
                out.push(FIELD_SEPARATOR);
            }
            out.push_str(&escape_field(field, escaping));
        }
        out.push_str(LINE_TERMINATOR);
    }
    out
}

fn escape_field(field: &str, escaping: FieldEscaping) -> Cow<'_, str> {
    match escaping {
        FieldEscaping::Verbatim => Cow::Borrowed(field),
        FieldEscaping::Quoted => {
            let needs_quotes = field
                .chars()
                .any(|ch| ch == FIELD_SEPARATOR || ch == '"' || ch == '\n' || ch == '\r');
            if needs_quotes {
                Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
            } else {
                Cow::Borrowed(field)
            }
        }
    }
}
