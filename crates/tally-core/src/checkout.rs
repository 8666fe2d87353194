//! # Checkout Settlement
//!
//! Change and settlement math for money tendered against an amount due,
//! shared by sale creation and by return/exchange payment collection.
//!
//! ## Change Rule
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Change is computed ONLY from cash.                                     │
//! │                                                                         │
//! │  Cheques and bank transfers are taken at face value; if the customer    │
//! │  overshoots with those, no change is owed. Cash absorbs whatever the    │
//! │  non-cash tenders did not cover, and any cash excess comes back:        │
//! │                                                                         │
//! │    change = max(0, cash - (due - (cheque + bank_transfer)))             │
//! │                                                                         │
//! │  applies only while cash > 0 and total tendered > due.                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::summary::{payment_summary, TenderTotals};
use crate::types::{BankTransferDetail, ChequeDetail};

// =============================================================================
// Tender
// =============================================================================

/// Money offered by a customer, split by method.
///
/// Raw input from the till: `cash_cents` is what was handed over, not
/// what is kept (change has not been deducted yet).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tender {
    pub cash_cents: i64,
    pub cheque_cents: i64,
    pub bank_transfer_cents: i64,
    pub cheque_detail: Option<ChequeDetail>,
    pub bank_transfer_detail: Option<BankTransferDetail>,
}

impl Tender {
    /// Total offered across all methods.
    pub fn total_tendered(&self) -> Money {
        Money::from_cents(self.cash_cents + self.cheque_cents + self.bank_transfer_cents)
    }

    /// Validates that non-cash tenders carry their identifying details.
    ///
    /// ## Rules
    /// - no negative amounts
    /// - a cheque portion requires a cheque number
    /// - a bank transfer portion requires a bank name or a reference
    pub fn validate(&self) -> crate::error::LedgerResult<()> {
        use crate::error::LedgerError;

        for cents in [self.cash_cents, self.cheque_cents, self.bank_transfer_cents] {
            if cents < 0 {
                return Err(LedgerError::InvalidAmount { cents });
            }
        }

        if self.cheque_cents > 0 {
            let has_number = self
                .cheque_detail
                .as_ref()
                .and_then(|c| c.number.as_deref())
                .is_some_and(|n| !n.trim().is_empty());
            if !has_number {
                return Err(LedgerError::ChequeNumberRequired);
            }
        }

        if self.bank_transfer_cents > 0 {
            let has_identity = self.bank_transfer_detail.as_ref().is_some_and(|b| {
                b.bank_name.as_deref().is_some_and(|n| !n.trim().is_empty())
                    || b.reference_number
                        .as_deref()
                        .is_some_and(|r| !r.trim().is_empty())
            });
            if !has_identity {
                return Err(LedgerError::BankDetailsRequired);
            }
        }

        Ok(())
    }

    /// Cash returned to the customer for the given amount due.
    pub fn change_for(&self, amount_due: Money) -> Money {
        if self.cash_cents > 0 && self.total_tendered() > amount_due {
            let non_cash = Money::from_cents(self.cheque_cents + self.bank_transfer_cents);
            let cash_needed = amount_due - non_cash;
            let excess = Money::from_cents(self.cash_cents) - cash_needed;
            if excess.is_positive() {
                return excess;
            }
        }
        Money::zero()
    }

    /// Per-method totals actually retained, with change deducted from cash.
    pub fn applied_totals(&self, change: Money) -> TenderTotals {
        TenderTotals {
            cash_cents: self.cash_cents - change.cents(),
            cheque_cents: self.cheque_cents,
            bank_transfer_cents: self.bank_transfer_cents,
            cheque_number: self
                .cheque_detail
                .as_ref()
                .and_then(|c| c.number.clone())
                .filter(|n| !n.trim().is_empty()),
            bank_reference: self
                .bank_transfer_detail
                .as_ref()
                .and_then(|b| b.reference_number.clone())
                .filter(|r| !r.trim().is_empty()),
        }
    }
}

// =============================================================================
// Checkout Settlement
// =============================================================================

/// Derived financial state of a freshly created sale.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutSettlement {
    pub change_given_cents: i64,
    /// Tendered minus change: what the customer actually contributed.
    pub total_applied_cents: i64,
    pub outstanding_cents: i64,
    pub payment_summary: String,
}

/// Settles the creation-time tenders against the sale total.
///
/// ## Example
/// ```rust
/// use tally_core::checkout::{settle_tenders, Tender};
/// use tally_core::money::Money;
///
/// let tender = Tender { cash_cents: 60_000, ..Tender::default() };
/// let s = settle_tenders(Money::from_cents(100_000), &tender);
/// assert_eq!(s.outstanding_cents, 40_000);
/// assert_eq!(s.payment_summary, "Partial (Cash (600.00)) - Outstanding: 400.00");
/// ```
pub fn settle_tenders(total_due: Money, tender: &Tender) -> CheckoutSettlement {
    let change = tender.change_for(total_due);
    let applied = tender.total_tendered() - change;
    let outstanding = total_due.saturating_sub_floor_zero(applied);
    let totals = tender.applied_totals(change);

    CheckoutSettlement {
        change_given_cents: change.cents(),
        total_applied_cents: applied.cents(),
        outstanding_cents: outstanding.cents(),
        payment_summary: payment_summary(&totals, total_due, applied, outstanding),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_cash_no_change() {
        let tender = Tender {
            cash_cents: 100_000,
            ..Tender::default()
        };
        let s = settle_tenders(Money::from_cents(100_000), &tender);
        assert_eq!(s.change_given_cents, 0);
        assert_eq!(s.outstanding_cents, 0);
        assert_eq!(s.payment_summary, "Cash (1000.00)");
    }

    #[test]
    fn test_cash_overpayment_gives_change() {
        let tender = Tender {
            cash_cents: 25_000,
            ..Tender::default()
        };
        let s = settle_tenders(Money::from_cents(20_000), &tender);
        assert_eq!(s.change_given_cents, 5_000);
        assert_eq!(s.total_applied_cents, 20_000);
        assert_eq!(s.outstanding_cents, 0);
        assert_eq!(s.payment_summary, "Cash (200.00)");
    }

    #[test]
    fn test_change_only_from_cash_portion() {
        // Due 1000.00; cheque 700.00 + cash 500.00 tendered.
        // Cash only needed to cover 300.00, so 200.00 comes back.
        let tender = Tender {
            cash_cents: 50_000,
            cheque_cents: 70_000,
            ..Tender::default()
        };
        let s = settle_tenders(Money::from_cents(100_000), &tender);
        assert_eq!(s.change_given_cents, 20_000);
        assert_eq!(s.total_applied_cents, 100_000);
    }

    #[test]
    fn test_non_cash_overshoot_no_change() {
        // Cheque alone exceeds the due amount: taken at face value.
        let tender = Tender {
            cheque_cents: 120_000,
            ..Tender::default()
        };
        let s = settle_tenders(Money::from_cents(100_000), &tender);
        assert_eq!(s.change_given_cents, 0);
        assert_eq!(s.outstanding_cents, 0);
    }

    #[test]
    fn test_underpayment_leaves_outstanding() {
        let tender = Tender {
            cash_cents: 60_000,
            ..Tender::default()
        };
        let s = settle_tenders(Money::from_cents(100_000), &tender);
        assert_eq!(s.change_given_cents, 0);
        assert_eq!(s.outstanding_cents, 40_000);
        assert_eq!(
            s.payment_summary,
            "Partial (Cash (600.00)) - Outstanding: 400.00"
        );
    }

    #[test]
    fn test_no_tender_is_full_credit() {
        let s = settle_tenders(Money::from_cents(100_000), &Tender::default());
        assert_eq!(s.total_applied_cents, 0);
        assert_eq!(s.outstanding_cents, 100_000);
        assert_eq!(s.payment_summary, "Full Credit - Outstanding: 1000.00");
    }
}
