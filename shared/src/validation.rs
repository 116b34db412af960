//! Request validation helpers shared by the workflow services
//!
//! Each helper returns a static message so callers can attach the field name.

use chrono::NaiveDate;
use rust_decimal::Decimal;

/// Longest accepted free-text reason
pub const MAX_REASON_LEN: usize = 500;

// ============================================================================
// Quantities and Amounts
// ============================================================================

/// Line quantities are whole units, at least one
pub fn validate_line_quantity(quantity: i32) -> Result<(), &'static str> {
    if quantity < 1 {
        return Err("Quantity must be at least 1");
    }
    Ok(())
}

/// Money amounts that may be zero (tax, discount, shipping)
pub fn validate_non_negative_amount(amount: Decimal) -> Result<(), &'static str> {
    if amount < Decimal::ZERO {
        return Err("Amount cannot be negative");
    }
    if amount.scale() > 2 && amount != amount.round_dp(2) {
        return Err("Amount cannot have more than two decimal places");
    }
    Ok(())
}

/// Money amounts that must be strictly positive (payments, refunds)
pub fn validate_positive_amount(amount: Decimal) -> Result<(), &'static str> {
    if amount <= Decimal::ZERO {
        return Err("Amount must be greater than zero");
    }
    validate_non_negative_amount(amount)
}

/// ISO 4217 style currency code, e.g. "USD"
pub fn validate_currency_code(code: &str) -> Result<(), &'static str> {
    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_uppercase()) {
        return Err("Currency must be a three-letter uppercase code");
    }
    Ok(())
}

// ============================================================================
// Text and Dates
// ============================================================================

/// Reasons for cancellations, rejections, refunds and transfers
pub fn validate_reason(reason: &str) -> Result<(), &'static str> {
    if reason.trim().is_empty() {
        return Err("Reason is required");
    }
    if reason.len() > MAX_REASON_LEN {
        return Err("Reason must be at most 500 characters");
    }
    Ok(())
}

/// Validate email format (basic check)
pub fn validate_email(email: &str) -> Result<(), &'static str> {
    if email.contains('@') && email.contains('.') && email.len() >= 5 {
        Ok(())
    } else {
        Err("Invalid email format")
    }
}

/// A dependent date (delivery, due) may not precede its anchor date
pub fn validate_not_before(anchor: NaiveDate, date: NaiveDate) -> Result<(), &'static str> {
    if date < anchor {
        return Err("Date cannot be before the order date");
    }
    Ok(())
}
