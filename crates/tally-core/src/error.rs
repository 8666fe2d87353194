//! # Error Types
//!
//! Domain-specific error types for tally-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  tally-core errors (this file)                                         │
//! │  └── LedgerError      - Validation and netting failures                │
//! │                                                                         │
//! │  tally-db errors (separate crate)                                      │
//! │  └── DbError          - Store failures + commit conflicts              │
//! │                                                                         │
//! │  Flow: LedgerError → DbError → caller                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (product id, amounts, etc.)
//! 3. Errors are enum variants, never String
//! 4. Every variant is detected before any mutation is attempted

use thiserror::Error;

// =============================================================================
// Ledger Error
// =============================================================================

/// Ledger reconciliation errors.
///
/// All variants are raised by the pure engines before any state is
/// touched, so a failed request leaves the sale untouched.
#[derive(Debug, Error, PartialEq)]
pub enum LedgerError {
    /// Payment amount must be strictly positive.
    #[error("Invalid payment amount: {cents} cents")]
    InvalidAmount { cents: i64 },

    /// Every payment record needs the staff member who took it.
    #[error("Staff ID is required for payment record")]
    MissingStaff,

    /// A cheque payment without a cheque number cannot be traced.
    #[error("Cheque number is required for cheque payments")]
    ChequeNumberRequired,

    /// A bank transfer needs at least a bank name or a reference.
    #[error("Bank name or reference number is required for bank transfers")]
    BankDetailsRequired,

    /// Return credit is produced by the netting engine, never tendered.
    #[error("Return credit cannot be tendered as a payment method")]
    ReturnCreditNotTenderable,

    /// A sale must carry at least one line item.
    #[error("A sale requires at least one line item")]
    EmptySale,

    /// A line item with a non-positive quantity or negative price.
    #[error("Invalid line item for product {product_id}")]
    InvalidLineItem { product_id: String },

    /// A return request with no returned and no exchanged items.
    #[error("Nothing to return or exchange")]
    NothingToReturn,

    /// Requested return quantity exceeds what is still returnable.
    ///
    /// ## When This Occurs
    /// - A previous return already consumed part of the line
    /// - The request asks for more than was sold
    #[error("Cannot return {requested} of {product_id}: only {returnable} returnable")]
    OverReturn {
        product_id: String,
        requested: i64,
        returnable: i64,
    },

    /// The return references a line the sale never had.
    #[error("Sale has no line item for product {product_id}")]
    LineItemNotFound { product_id: String },

    /// Payment collected for an exchange does not cover the amount due.
    #[error("Insufficient payment: {due_cents} cents due, {applied_cents} cents applied")]
    InsufficientPayment { due_cents: i64, applied_cents: i64 },
}

/// Convenience type alias for Results with LedgerError.
pub type LedgerResult<T> = Result<T, LedgerError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = LedgerError::OverReturn {
            product_id: "prod-17".to_string(),
            requested: 5,
            returnable: 3,
        };
        assert_eq!(
            err.to_string(),
            "Cannot return 5 of prod-17: only 3 returnable"
        );

        let err = LedgerError::InsufficientPayment {
            due_cents: 20_000,
            applied_cents: 15_000,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient payment: 20000 cents due, 15000 cents applied"
        );
    }
}
