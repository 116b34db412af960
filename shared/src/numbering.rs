//! Document numbering scheme
//!
//! Numbers have the form `PREFIX-YYYYMMDD-NNNN`. The sequence restarts at 1
//! each day for each document kind and is zero-padded to four digits.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Kinds of numbered documents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    PurchaseOrder,
    SalesOrder,
    Shipment,
    Invoice,
    Payment,
}

impl DocumentKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            DocumentKind::PurchaseOrder => "PO",
            DocumentKind::SalesOrder => "SO",
            DocumentKind::Shipment => "SHIP",
            DocumentKind::Invoice => "INV",
            DocumentKind::Payment => "PAY",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::PurchaseOrder => "purchase_order",
            DocumentKind::SalesOrder => "sales_order",
            DocumentKind::Shipment => "shipment",
            DocumentKind::Invoice => "invoice",
            DocumentKind::Payment => "payment",
        }
    }
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Prefix shared by every number of `kind` issued on `date`, e.g. `PO-20240115-`
pub fn daily_prefix(kind: DocumentKind, date: NaiveDate) -> String {
    format!("{}-{}-", kind.prefix(), date.format("%Y%m%d"))
}

/// Format a document number for a 1-based daily sequence
pub fn format_document_number(kind: DocumentKind, date: NaiveDate, sequence: u32) -> String {
    format!("{}{:04}", daily_prefix(kind, date), sequence)
}

/// Parse the sequence out of a number of the given kind, if it is well formed
pub fn parse_sequence(kind: DocumentKind, number: &str) -> Option<(NaiveDate, u32)> {
    let rest = number.strip_prefix(kind.prefix())?.strip_prefix('-')?;
    let (date, seq) = rest.split_once('-')?;
    if date.len() != 8 || seq.len() < 4 {
        return None;
    }
    let date = NaiveDate::parse_from_str(date, "%Y%m%d").ok()?;
    let seq = seq.parse::<u32>().ok()?;
    Some((date, seq))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
    }

    #[test]
    fn test_format_document_number() {
        assert_eq!(
            format_document_number(DocumentKind::PurchaseOrder, date(), 1),
            "PO-20240115-0001"
        );
        assert_eq!(
            format_document_number(DocumentKind::Shipment, date(), 42),
            "SHIP-20240115-0042"
        );
        assert_eq!(
            format_document_number(DocumentKind::Invoice, date(), 12345),
            "INV-20240115-12345"
        );
    }

    #[test]
    fn test_parse_sequence() {
        assert_eq!(
            parse_sequence(DocumentKind::Payment, "PAY-20240115-0007"),
            Some((date(), 7))
        );
        assert_eq!(parse_sequence(DocumentKind::Payment, "PO-20240115-0007"), None);
        assert_eq!(parse_sequence(DocumentKind::SalesOrder, "SO-2024011-0007"), None);
        assert_eq!(parse_sequence(DocumentKind::SalesOrder, "SO-20240115-07"), None);
    }

    #[test]
    fn test_daily_prefix() {
        assert_eq!(daily_prefix(DocumentKind::SalesOrder, date()), "SO-20240115-");
    }
}
