//! CSV export of the operations list.
//!
//! The export mirrors what the operations screen shows after filtering:
//! one row per movement, amounts formatted for display (`1,234.50`), dates
//! as ISO `YYYY-MM-DD`. Free-text cells that a spreadsheet would evaluate
//! as a formula are prefixed with `'`.

use serde::Serialize;

use super::amount::format_amount;
use super::operation::OperationRow;

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("export is not valid utf-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

impl crate::frame::ErrorCode for ExportError {
    fn error_code(&self) -> &'static str {
        "E_EXPORT"
    }
}

#[derive(Serialize)]
struct CsvOutRow<'a> {
    date: String,
    kind: &'static str,
    client: String,
    counterparty: Option<String>,
    amount: String,
    status: &'a str,
    notes: Option<String>,
}

/// Neutralize a leading formula character.
pub(crate) fn sanitize_cell(value: &str) -> String {
    match value.chars().next() {
        Some('=' | '+' | '-' | '@' | '\t' | '\r') => format!("'{value}"),
        _ => value.to_owned(),
    }
}

/// Render `ops` as CSV with a header row.
///
/// # Errors
///
/// Returns [`ExportError`] if serialization fails.
pub fn operations_to_csv(ops: &[OperationRow]) -> Result<String, ExportError> {
    let mut buf = Vec::new();
    {
        let mut wrt = csv::WriterBuilder::new().from_writer(&mut buf);
        for op in ops {
            wrt.serialize(CsvOutRow {
                date: op.operation_date.format("%Y-%m-%d").to_string(),
                kind: op.kind.as_str(),
                client: sanitize_cell(&op.client_name),
                counterparty: op.counterparty.as_deref().map(sanitize_cell),
                amount: format_amount(op.amount),
                status: &op.status,
                notes: op.notes.as_deref().map(sanitize_cell),
            })?;
        }
        if ops.is_empty() {
            wrt.write_record(["date", "kind", "client", "counterparty", "amount", "status", "notes"])?;
        }
        wrt.flush()?;
    }
    Ok(String::from_utf8(buf)?)
}

/// Attachment filename for an export taken on `date`.
#[must_use]
pub fn export_filename(date: chrono::NaiveDate) -> String {
    format!("operations-{}.csv", date.format("%Y-%m-%d"))
}

#[cfg(test)]
#[path = "export_test.rs"]
mod tests;
