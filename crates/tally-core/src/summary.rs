//! # Payment Summary Formatter
//!
//! Derives the human-readable settlement description of a sale from its
//! per-method tender totals.
//!
//! ## Formatting Rules
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  One method:     "Cash (600.00)"                                        │
//! │  With identity:  "Cheque (500.00) - #88421"                             │
//! │                  "Bank Transfer (300.00) - Ref: TRX-9"                  │
//! │  Split tender:   "Split (Cash (600.00) + Cheque (400.00))"              │
//! │  No tender:      "Full Credit"            (amount was due)              │
//! │                  "Paid (Zero Value)"      (nothing was due)             │
//! │                                                                         │
//! │  Balance left:   "Partial (<summary>) - Outstanding: 400.00"            │
//! │                  "Full Credit - Outstanding: 1000.00"                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The summary is display-only derived state. It is recomputed in full
//! from the numeric payment history on every mutation and never patched
//! incrementally, so the stored string can never drift from the stored
//! numbers. The formatter is a pure function: identical input always
//! yields the identical string.

use crate::money::Money;
use crate::types::{PaymentMethod, Sale};

// =============================================================================
// Tender Totals
// =============================================================================

/// Per-method applied totals feeding the formatter.
///
/// Amounts here exclude change given back: they are what the shop kept,
/// not what the customer handed over.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TenderTotals {
    pub cash_cents: i64,
    pub cheque_cents: i64,
    pub bank_transfer_cents: i64,
    /// Cheque number shown next to the cheque total, if known.
    pub cheque_number: Option<String>,
    /// Transfer reference shown next to the bank-transfer total, if known.
    pub bank_reference: Option<String>,
}

impl TenderTotals {
    /// Total applied across all methods.
    pub fn total(&self) -> Money {
        Money::from_cents(self.cash_cents + self.cheque_cents + self.bank_transfer_cents)
    }

    /// True when no method carries a positive amount.
    pub fn is_empty(&self) -> bool {
        self.cash_cents <= 0 && self.cheque_cents <= 0 && self.bank_transfer_cents <= 0
    }
}

/// Replays a sale's full tender history into per-method totals.
///
/// The aggregate covers the creation-time tenders plus every entry in
/// the installment log, plus optionally one not-yet-appended payment
/// (the one currently being applied). Return-credit settlement notes
/// are skipped: they are not customer money.
///
/// Full-history replay, not incremental concatenation: the summary must
/// reflect the true aggregate across all historical tenders.
pub fn replay_tender_totals(sale: &Sale, extra: Option<&crate::types::Payment>) -> TenderTotals {
    let mut totals = TenderTotals {
        cash_cents: sale.paid_amount_cash_cents.max(0),
        cheque_cents: sale.paid_amount_cheque_cents.max(0),
        bank_transfer_cents: sale.paid_amount_bank_transfer_cents.max(0),
        cheque_number: sale
            .cheque_detail
            .as_ref()
            .and_then(|c| c.number.clone())
            .filter(|n| !n.trim().is_empty()),
        bank_reference: sale
            .bank_transfer_detail
            .as_ref()
            .and_then(|b| b.reference_number.clone())
            .filter(|r| !r.trim().is_empty()),
    };

    let history = sale.additional_payments.iter().chain(extra);
    for payment in history {
        match payment.method {
            PaymentMethod::Cash => totals.cash_cents += payment.amount_cents,
            PaymentMethod::Cheque => {
                totals.cheque_cents += payment.amount_cents;
                if totals.cheque_number.is_none() {
                    totals.cheque_number = payment
                        .detail
                        .as_ref()
                        .and_then(|d| d.cheque_number().map(str::to_string));
                }
            }
            PaymentMethod::BankTransfer => {
                totals.bank_transfer_cents += payment.amount_cents;
                if totals.bank_reference.is_none() {
                    totals.bank_reference = payment
                        .detail
                        .as_ref()
                        .and_then(|d| d.bank_reference().map(str::to_string));
                }
            }
            // Settlement notes reduce the balance, not the tender totals.
            PaymentMethod::ReturnCredit => {}
        }
    }

    totals
}

// =============================================================================
// Formatting
// =============================================================================

/// Formats the per-method lines, e.g. `["Cash (600.00)", "Cheque (400.00) - #88421"]`.
fn method_lines(totals: &TenderTotals) -> Vec<String> {
    let mut lines = Vec::new();

    if totals.cash_cents > 0 {
        lines.push(format!("Cash ({})", Money::from_cents(totals.cash_cents)));
    }
    if totals.cheque_cents > 0 {
        let mut line = format!("Cheque ({})", Money::from_cents(totals.cheque_cents));
        if let Some(number) = &totals.cheque_number {
            line.push_str(&format!(" - #{}", number.trim()));
        }
        lines.push(line);
    }
    if totals.bank_transfer_cents > 0 {
        let mut line = format!(
            "Bank Transfer ({})",
            Money::from_cents(totals.bank_transfer_cents)
        );
        if let Some(reference) = &totals.bank_reference {
            line.push_str(&format!(" - Ref: {}", reference.trim()));
        }
        lines.push(line);
    }

    lines
}

/// Builds the full settlement summary for a sale.
///
/// ## Arguments
/// * `totals` - per-method applied amounts (change excluded)
/// * `total_due` - the sale's total amount
/// * `total_applied` - everything the customer has contributed so far
/// * `outstanding` - balance remaining after the current mutation
pub fn payment_summary(
    totals: &TenderTotals,
    total_due: Money,
    total_applied: Money,
    outstanding: Money,
) -> String {
    let lines = method_lines(totals);

    let mut summary = match lines.len() {
        0 => {
            if total_due.is_positive() && total_applied.is_zero() {
                "Full Credit".to_string()
            } else if total_due.is_zero() && total_applied.is_zero() {
                "Paid (Zero Value)".to_string()
            } else {
                "N/A".to_string()
            }
        }
        1 => lines.into_iter().next().unwrap_or_default(),
        _ => format!("Split ({})", lines.join(" + ")),
    };

    if outstanding.is_positive() {
        summary = if total_applied.is_zero() {
            format!("Full Credit - Outstanding: {outstanding}")
        } else {
            format!("Partial ({summary}) - Outstanding: {outstanding}")
        };
    }

    summary
}

/// Summary for a payment collected during a return/exchange.
///
/// Returns only describe the tender itself; there is no credit or
/// partial wrapping because the amount due was fully covered by
/// construction (insufficient payment is rejected earlier).
pub fn return_payment_summary(totals: &TenderTotals) -> String {
    method_lines(totals).join(" + ")
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BankTransferDetail, ChequeDetail, Payment, PaymentDetail};
    use chrono::Utc;

    fn cash(cents: i64) -> TenderTotals {
        TenderTotals {
            cash_cents: cents,
            ..TenderTotals::default()
        }
    }

    #[test]
    fn test_single_method_bare() {
        let summary = payment_summary(
            &cash(100_000),
            Money::from_cents(100_000),
            Money::from_cents(100_000),
            Money::zero(),
        );
        assert_eq!(summary, "Cash (1000.00)");
    }

    #[test]
    fn test_partial_payment_wrapped() {
        // Sale of 1000.00 with 600.00 cash paid up front
        let summary = payment_summary(
            &cash(60_000),
            Money::from_cents(100_000),
            Money::from_cents(60_000),
            Money::from_cents(40_000),
        );
        assert_eq!(summary, "Partial (Cash (600.00)) - Outstanding: 400.00");
    }

    #[test]
    fn test_split_with_identifiers() {
        let totals = TenderTotals {
            cash_cents: 60_000,
            cheque_cents: 50_000,
            bank_transfer_cents: 30_000,
            cheque_number: Some("88421".to_string()),
            bank_reference: Some("TRX-9".to_string()),
        };
        let summary = payment_summary(
            &totals,
            Money::from_cents(140_000),
            Money::from_cents(140_000),
            Money::zero(),
        );
        assert_eq!(
            summary,
            "Split (Cash (600.00) + Cheque (500.00) - #88421 + Bank Transfer (300.00) - Ref: TRX-9)"
        );
    }

    #[test]
    fn test_full_credit() {
        let summary = payment_summary(
            &TenderTotals::default(),
            Money::from_cents(100_000),
            Money::zero(),
            Money::from_cents(100_000),
        );
        assert_eq!(summary, "Full Credit - Outstanding: 1000.00");
    }

    #[test]
    fn test_paid_zero_value() {
        let summary = payment_summary(
            &TenderTotals::default(),
            Money::zero(),
            Money::zero(),
            Money::zero(),
        );
        assert_eq!(summary, "Paid (Zero Value)");
    }

    #[test]
    fn test_formatter_is_idempotent() {
        let totals = TenderTotals {
            cash_cents: 12_345,
            cheque_cents: 500,
            ..TenderTotals::default()
        };
        let a = payment_summary(
            &totals,
            Money::from_cents(20_000),
            Money::from_cents(12_845),
            Money::from_cents(7_155),
        );
        let b = payment_summary(
            &totals,
            Money::from_cents(20_000),
            Money::from_cents(12_845),
            Money::from_cents(7_155),
        );
        assert_eq!(a, b);
    }

    #[test]
    fn test_replay_groups_by_method() {
        // Scenario: 600.00 cash at creation, 400.00 cash installment.
        // The replayed summary groups per method: one Cash(1000.00) line.
        let mut sale = sale_fixture();
        sale.paid_amount_cash_cents = 60_000;
        sale.additional_payments.push(payment_fixture(
            PaymentMethod::Cash,
            40_000,
            None,
        ));

        let totals = replay_tender_totals(&sale, None);
        assert_eq!(totals.cash_cents, 100_000);

        let summary = payment_summary(
            &totals,
            Money::from_cents(100_000),
            Money::from_cents(100_000),
            Money::zero(),
        );
        assert_eq!(summary, "Cash (1000.00)");
    }

    #[test]
    fn test_replay_skips_return_credit() {
        let mut sale = sale_fixture();
        sale.paid_amount_cash_cents = 60_000;
        sale.additional_payments.push(payment_fixture(
            PaymentMethod::ReturnCredit,
            10_000,
            None,
        ));

        let totals = replay_tender_totals(&sale, None);
        assert_eq!(totals.total().cents(), 60_000);
    }

    #[test]
    fn test_replay_picks_up_identifiers_from_history() {
        let mut sale = sale_fixture();
        sale.additional_payments.push(payment_fixture(
            PaymentMethod::Cheque,
            50_000,
            Some(PaymentDetail::Cheque(ChequeDetail {
                number: Some("77001".to_string()),
                ..ChequeDetail::default()
            })),
        ));
        sale.additional_payments.push(payment_fixture(
            PaymentMethod::BankTransfer,
            30_000,
            Some(PaymentDetail::BankTransfer(BankTransferDetail {
                reference_number: Some("REF-42".to_string()),
                ..BankTransferDetail::default()
            })),
        ));

        let totals = replay_tender_totals(&sale, None);
        assert_eq!(totals.cheque_number.as_deref(), Some("77001"));
        assert_eq!(totals.bank_reference.as_deref(), Some("REF-42"));
    }

    #[test]
    fn test_return_payment_summary_plain_join() {
        let totals = TenderTotals {
            cash_cents: 20_000,
            cheque_cents: 5_000,
            cheque_number: Some("123".to_string()),
            ..TenderTotals::default()
        };
        assert_eq!(
            return_payment_summary(&totals),
            "Cash (200.00) + Cheque (50.00) - #123"
        );
    }

    // -------------------------------------------------------------------------
    // Fixtures
    // -------------------------------------------------------------------------

    fn sale_fixture() -> Sale {
        Sale {
            id: "sale-1".to_string(),
            customer_id: None,
            customer_name: None,
            total_amount_cents: 100_000,
            total_amount_paid_cents: 0,
            outstanding_balance_cents: 100_000,
            initial_outstanding_balance_cents: 100_000,
            change_given_cents: 0,
            paid_amount_cash_cents: 0,
            paid_amount_cheque_cents: 0,
            paid_amount_bank_transfer_cents: 0,
            cheque_detail: None,
            bank_transfer_detail: None,
            payment_summary: String::new(),
            items: Vec::new(),
            additional_payments: Vec::new(),
            staff_id: "staff-1".to_string(),
            sale_date: Utc::now(),
            updated_at: Utc::now(),
            version: 0,
        }
    }

    fn payment_fixture(
        method: PaymentMethod,
        amount_cents: i64,
        detail: Option<PaymentDetail>,
    ) -> Payment {
        Payment {
            id: "pay-1".to_string(),
            sale_id: "sale-1".to_string(),
            method,
            amount_cents,
            date: Utc::now(),
            staff_id: "staff-1".to_string(),
            notes: None,
            detail,
        }
    }
}
