//! Daily document number allocation

use chrono::NaiveDate;
use shared::{daily_prefix, format_document_number, DocumentKind};

use crate::error::{AppError, AppResult};
use crate::store::Transaction;

/// Next free `PREFIX-YYYYMMDD-NNNN` number for the given date.
///
/// Starts from the count of numbers already issued that day and probes
/// upwards past any taken number. Two transactions racing for the same
/// number are separated by the unique index; the loser fails with
/// `ConcurrentModification` and is retried.
pub async fn next_document_number(
    tx: &mut dyn Transaction,
    kind: DocumentKind,
    date: NaiveDate,
) -> AppResult<String> {
    let prefix = daily_prefix(kind, date);
    let issued = tx.count_document_numbers(kind, &prefix).await?;
    let mut sequence = u32::try_from(issued + 1)
        .map_err(|_| AppError::Internal(format!("{} sequence out of range", kind)))?;

    loop {
        let candidate = format_document_number(kind, date, sequence);
        if !tx.document_number_exists(kind, &candidate).await? {
            return Ok(candidate);
        }
        sequence += 1;
    }
}
