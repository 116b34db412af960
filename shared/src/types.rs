//! Common types used across the domain

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Audit fields embedded in every persisted entity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Auditable {
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Optimistic concurrency version, bumped on every successful update
    pub version: i64,
}

impl Auditable {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    /// Mark the entity as written at `now` and advance the version
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
        self.version += 1;
    }
}

impl Default for Auditable {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

/// Round a monetary amount to cents, half away from zero
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Unit price times quantity rounded to cents, `None` on overflow
pub fn line_total(unit_price: Decimal, quantity: i32) -> Option<Decimal> {
    unit_price.checked_mul(Decimal::from(quantity)).map(round_money)
}

/// Sum of amounts, `None` on overflow
pub fn checked_sum(amounts: impl IntoIterator<Item = Decimal>) -> Option<Decimal> {
    amounts
        .into_iter()
        .try_fold(Decimal::ZERO, |acc, amount| acc.checked_add(amount))
}

/// Separator used for tagged status notes such as `[CANCELLED] reason`
pub const NOTE_LINE: &str = "\n";

/// Separator used for inline notes appended by receipts and refunds
pub const NOTE_INLINE: &str = " | ";

/// Append text to an optional notes field
pub fn append_note(notes: &mut Option<String>, separator: &str, text: &str) {
    match notes {
        Some(existing) if !existing.is_empty() => {
            existing.push_str(separator);
            existing.push_str(text);
        }
        _ => *notes = Some(text.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_round_money() {
        assert_eq!(
            round_money(Decimal::from_str("10.005").unwrap()),
            Decimal::from_str("10.01").unwrap()
        );
        assert_eq!(
            round_money(Decimal::from_str("853.99").unwrap()),
            Decimal::from_str("853.99").unwrap()
        );
    }

    #[test]
    fn test_line_total_and_checked_sum() {
        let price = Decimal::from_str("12.345").unwrap();
        assert_eq!(line_total(price, 2), Some(Decimal::from_str("24.69").unwrap()));
        assert_eq!(line_total(Decimal::MAX, 2), None);

        assert_eq!(
            checked_sum([Decimal::ONE, Decimal::from(2)]),
            Some(Decimal::from(3))
        );
        assert_eq!(checked_sum([Decimal::MAX, Decimal::ONE]), None);
    }

    #[test]
    fn test_append_note() {
        let mut notes = None;
        append_note(&mut notes, NOTE_LINE, "[CANCELLED] customer request");
        assert_eq!(notes.as_deref(), Some("[CANCELLED] customer request"));

        append_note(&mut notes, NOTE_LINE, "second");
        assert_eq!(notes.as_deref(), Some("[CANCELLED] customer request\nsecond"));

        append_note(&mut notes, NOTE_INLINE, "third");
        assert_eq!(
            notes.as_deref(),
            Some("[CANCELLED] customer request\nsecond | third")
        );
    }

    #[test]
    fn test_touch_bumps_version() {
        let now = Utc::now();
        let mut audit = Auditable::new(now);
        audit.touch(now);
        audit.touch(now);
        assert_eq!(audit.version, 2);
    }
}
