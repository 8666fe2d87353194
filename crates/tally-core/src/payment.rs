//! # Payment Application Engine
//!
//! Applies one new installment payment to an existing sale's ledger.
//!
//! ## Data Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  PaymentRequest (raw input)                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  validate() ── InvalidAmount / MissingStaff /                           │
//! │       │        ChequeNumberRequired / BankDetailsRequired               │
//! │       ▼                                                                 │
//! │  apply_payment(sale, request)                                          │
//! │       ├── new_total_paid = paid + amount                                │
//! │       ├── new_outstanding = max(0, total - new_total_paid)              │
//! │       ├── replay full tender history + this payment                     │
//! │       └── recompute payment_summary from scratch                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  PaymentApplication (what the coordinator persists atomically)         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! This module is pure: it computes the next ledger state but never
//! touches storage. The transaction coordinator in tally-db owns the
//! atomic read-modify-write.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, LedgerResult};
use crate::summary::{payment_summary, replay_tender_totals};
use crate::types::{Payment, PaymentDetail, PaymentMethod, Sale};

// =============================================================================
// Payment Request
// =============================================================================

/// Raw installment-payment input as collected at the boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    /// Amount in cents; must be strictly positive.
    pub amount_cents: i64,
    /// Tendered method: Cash, Cheque or BankTransfer.
    pub method: PaymentMethod,
    /// Defaults to the commit time when absent.
    pub date: Option<DateTime<Utc>>,
    pub staff_id: String,
    pub notes: Option<String>,
    pub detail: Option<PaymentDetail>,
}

impl PaymentRequest {
    /// Validates the request before any mutation is attempted.
    ///
    /// ## Rules
    /// - amount must be > 0
    /// - staff id must be present
    /// - cheque payments must carry a cheque number
    /// - bank transfers must carry a bank name or a reference
    pub fn validate(&self) -> LedgerResult<()> {
        if self.amount_cents <= 0 {
            return Err(LedgerError::InvalidAmount {
                cents: self.amount_cents,
            });
        }

        if self.staff_id.trim().is_empty() {
            return Err(LedgerError::MissingStaff);
        }

        match self.method {
            PaymentMethod::Cheque => {
                let has_number = self
                    .detail
                    .as_ref()
                    .and_then(PaymentDetail::cheque_number)
                    .is_some();
                if !has_number {
                    return Err(LedgerError::ChequeNumberRequired);
                }
            }
            PaymentMethod::BankTransfer => {
                let has_identity = self.detail.as_ref().is_some_and(|d| {
                    d.bank_name().is_some() || d.bank_reference().is_some()
                });
                if !has_identity {
                    return Err(LedgerError::BankDetailsRequired);
                }
            }
            PaymentMethod::Cash => {}
            PaymentMethod::ReturnCredit => {
                return Err(LedgerError::ReturnCreditNotTenderable);
            }
        }

        Ok(())
    }
}

// =============================================================================
// Payment Application
// =============================================================================

/// The next ledger state computed for one applied payment.
///
/// Everything here is committed in a single atomic unit or not at all.
#[derive(Debug, Clone)]
pub struct PaymentApplication {
    /// The immutable payment record to append to the history.
    pub payment: Payment,
    pub new_total_paid_cents: i64,
    pub new_outstanding_cents: i64,
    /// Fully recomputed settlement description.
    pub payment_summary: String,
}

/// Applies one payment to a sale's ledger, pure computation only.
///
/// ## Arguments
/// * `sale` - current persisted state, including the payment history
/// * `request` - validated here before anything else
/// * `payment_id` - id for the new record (generated by the caller)
/// * `now` - commit timestamp, used when the request has no date
///
/// The summary is recomputed by replaying every historical per-method
/// total (creation tenders plus every installment) together with this
/// payment, grouped by method. Full-history recomputation is required:
/// the summary reflects the true aggregate, never a patched delta.
pub fn apply_payment(
    sale: &Sale,
    request: PaymentRequest,
    payment_id: String,
    now: DateTime<Utc>,
) -> LedgerResult<PaymentApplication> {
    request.validate()?;

    let payment = Payment {
        id: payment_id,
        sale_id: sale.id.clone(),
        method: request.method,
        amount_cents: request.amount_cents,
        // A concrete date value, never a deferred server-side marker.
        date: request.date.unwrap_or(now),
        staff_id: request.staff_id,
        notes: request.notes,
        detail: request.detail,
    };

    let new_total_paid = sale.total_amount_paid() + payment.amount();
    let new_outstanding = sale.total_amount().saturating_sub_floor_zero(new_total_paid);

    let totals = replay_tender_totals(sale, Some(&payment));
    let summary = payment_summary(&totals, sale.total_amount(), new_total_paid, new_outstanding);

    Ok(PaymentApplication {
        payment,
        new_total_paid_cents: new_total_paid.cents(),
        new_outstanding_cents: new_outstanding.cents(),
        payment_summary: summary,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BankTransferDetail, ChequeDetail};

    fn sale_with_cash_paid(total_cents: i64, cash_cents: i64) -> Sale {
        let applied = cash_cents.min(total_cents);
        Sale {
            id: "sale-1".to_string(),
            customer_id: Some("cust-1".to_string()),
            customer_name: Some("Akram Traders".to_string()),
            total_amount_cents: total_cents,
            total_amount_paid_cents: applied,
            outstanding_balance_cents: (total_cents - applied).max(0),
            initial_outstanding_balance_cents: (total_cents - applied).max(0),
            change_given_cents: 0,
            paid_amount_cash_cents: applied,
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

    fn cash_request(amount_cents: i64) -> PaymentRequest {
        PaymentRequest {
            amount_cents,
            method: PaymentMethod::Cash,
            date: None,
            staff_id: "staff-1".to_string(),
            notes: None,
            detail: None,
        }
    }

    #[test]
    fn test_installment_clears_balance_and_groups_summary() {
        // Sale 1000.00, 600.00 cash at creation, then a 400.00 installment.
        let sale = sale_with_cash_paid(100_000, 60_000);

        let applied = apply_payment(&sale, cash_request(40_000), "pay-1".to_string(), Utc::now())
            .expect("valid payment");

        assert_eq!(applied.new_total_paid_cents, 100_000);
        assert_eq!(applied.new_outstanding_cents, 0);
        // Grouped per method across the whole history, not concatenated.
        assert_eq!(applied.payment_summary, "Cash (1000.00)");
    }

    #[test]
    fn test_partial_installment_keeps_partial_summary() {
        let sale = sale_with_cash_paid(100_000, 60_000);

        let applied = apply_payment(&sale, cash_request(10_000), "pay-1".to_string(), Utc::now())
            .expect("valid payment");

        assert_eq!(applied.new_total_paid_cents, 70_000);
        assert_eq!(applied.new_outstanding_cents, 30_000);
        assert_eq!(
            applied.payment_summary,
            "Partial (Cash (700.00)) - Outstanding: 300.00"
        );
    }

    #[test]
    fn test_overpayment_clamps_outstanding_at_zero() {
        let sale = sale_with_cash_paid(100_000, 60_000);

        let applied = apply_payment(&sale, cash_request(50_000), "pay-1".to_string(), Utc::now())
            .expect("valid payment");

        assert_eq!(applied.new_total_paid_cents, 110_000);
        assert_eq!(applied.new_outstanding_cents, 0);
    }

    #[test]
    fn test_zero_amount_rejected() {
        let sale = sale_with_cash_paid(100_000, 60_000);
        let err = apply_payment(&sale, cash_request(0), "pay-1".to_string(), Utc::now())
            .expect_err("zero amount");
        assert_eq!(err, LedgerError::InvalidAmount { cents: 0 });
    }

    #[test]
    fn test_missing_staff_rejected() {
        let sale = sale_with_cash_paid(100_000, 60_000);
        let mut request = cash_request(10_000);
        request.staff_id = "  ".to_string();
        let err = apply_payment(&sale, request, "pay-1".to_string(), Utc::now())
            .expect_err("missing staff");
        assert_eq!(err, LedgerError::MissingStaff);
    }

    #[test]
    fn test_cheque_without_number_rejected() {
        let mut request = cash_request(10_000);
        request.method = PaymentMethod::Cheque;
        request.detail = Some(PaymentDetail::Cheque(ChequeDetail::default()));
        assert_eq!(request.validate(), Err(LedgerError::ChequeNumberRequired));
    }

    #[test]
    fn test_bank_transfer_needs_bank_or_reference() {
        let mut request = cash_request(10_000);
        request.method = PaymentMethod::BankTransfer;
        request.detail = None;
        assert_eq!(request.validate(), Err(LedgerError::BankDetailsRequired));

        request.detail = Some(PaymentDetail::BankTransfer(BankTransferDetail {
            reference_number: Some("TRX-1".to_string()),
            ..BankTransferDetail::default()
        }));
        assert_eq!(request.validate(), Ok(()));
    }

    #[test]
    fn test_return_credit_not_tenderable() {
        let mut request = cash_request(10_000);
        request.method = PaymentMethod::ReturnCredit;
        assert_eq!(
            request.validate(),
            Err(LedgerError::ReturnCreditNotTenderable)
        );
    }

    #[test]
    fn test_request_date_is_preserved() {
        let sale = sale_with_cash_paid(100_000, 60_000);
        let when = "2026-03-14T09:30:00Z".parse::<DateTime<Utc>>().unwrap();
        let mut request = cash_request(10_000);
        request.date = Some(when);

        let applied =
            apply_payment(&sale, request, "pay-1".to_string(), Utc::now()).expect("valid");
        assert_eq!(applied.payment.date, when);
    }

    #[test]
    fn test_aggregate_reconstructible_from_history() {
        // Corruption check: total paid equals creation tenders plus the
        // sum of all counted installments.
        let mut sale = sale_with_cash_paid(100_000, 60_000);

        let first = apply_payment(&sale, cash_request(15_000), "pay-1".to_string(), Utc::now())
            .expect("valid");
        sale.total_amount_paid_cents = first.new_total_paid_cents;
        sale.outstanding_balance_cents = first.new_outstanding_cents;
        sale.additional_payments.push(first.payment);

        let second = apply_payment(&sale, cash_request(25_000), "pay-2".to_string(), Utc::now())
            .expect("valid");
        sale.total_amount_paid_cents = second.new_total_paid_cents;
        sale.outstanding_balance_cents = second.new_outstanding_cents;
        sale.additional_payments.push(second.payment);

        let replayed: i64 = sale.paid_amount_cash_cents
            + sale.paid_amount_cheque_cents
            + sale.paid_amount_bank_transfer_cents
            + sale
                .additional_payments
                .iter()
                .filter(|p| p.counts_as_paid())
                .map(|p| p.amount_cents)
                .sum::<i64>();

        assert_eq!(replayed, sale.total_amount_paid_cents);
        assert_eq!(
            sale.outstanding_balance_cents,
            (sale.total_amount_cents - sale.total_amount_paid_cents).max(0)
        );
    }
}
