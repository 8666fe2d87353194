//! # Domain Types
//!
//! Core domain types for the sale ledger.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │      Sale       │   │    Payment      │   │ReturnTransaction│       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  id (business)  │       │
//! │  │  total_amount   │   │  method         │   │  returned_items │       │
//! │  │  total_paid     │   │  amount_cents   │   │  exchanged_items│       │
//! │  │  outstanding    │   │  detail         │   │  settle/refund  │       │
//! │  │  version (CAS)  │   └─────────────────┘   └─────────────────┘       │
//! │  └─────────────────┘                                                   │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    SaleItem     │   │ PaymentMethod   │   │ PaymentDetail   │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  applied_price  │   │  Cash           │   │  Cheque {..}    │       │
//! │  │  quantity       │   │  Cheque         │   │  BankTransfer{} │       │
//! │  │  returned_qty   │   │  BankTransfer   │   └─────────────────┘       │
//! │  └─────────────────┘   │  ReturnCredit   │                             │
//! │                        └─────────────────┘                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Append-Only Ledger Pattern
//! A Sale is an event-sourced-lite aggregate: an immutable payment log
//! (`additional_payments`) plus derived aggregate fields
//! (`total_amount_paid_cents`, `outstanding_balance_cents`,
//! `payment_summary`). The aggregates must always be reconstructible by
//! replaying the creation-time tenders plus the log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;

// =============================================================================
// Payment Method
// =============================================================================

/// How money was tendered towards a sale.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentMethod {
    /// Physical cash payment.
    Cash,
    /// Cheque payment (carries cheque details).
    Cheque,
    /// Bank transfer (carries bank details).
    BankTransfer,
    /// Credit from returned goods settling an outstanding balance.
    /// Never counts towards `total_amount_paid` (see [`Sale`]).
    ReturnCredit,
}

impl PaymentMethod {
    /// Human-readable label used in payment summaries.
    pub fn label(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "Cash",
            PaymentMethod::Cheque => "Cheque",
            PaymentMethod::BankTransfer => "Bank Transfer",
            PaymentMethod::ReturnCredit => "Return Credit",
        }
    }
}

// =============================================================================
// Sale Type
// =============================================================================

/// Pricing tier a line item was sold under.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaleType {
    Retail,
    Wholesale,
}

impl Default for SaleType {
    fn default() -> Self {
        SaleType::Retail
    }
}

// =============================================================================
// Payment Detail
// =============================================================================

/// Identifying fields of a cheque tender.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChequeDetail {
    pub number: Option<String>,
    pub bank: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub amount_cents: Option<i64>,
}

/// Identifying fields of a bank-transfer tender.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankTransferDetail {
    pub bank_name: Option<String>,
    pub reference_number: Option<String>,
    pub amount_cents: Option<i64>,
}

/// Method-specific payment detail, tagged by variant.
///
/// Modeled as a tagged enum keyed by method rather than optional fields
/// on [`Payment`]: each variant carries only its own required structure,
/// and the boundary validation in [`crate::payment`] checks the
/// variant's identifying fields instead of letting nulls pass through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "camelCase")]
pub enum PaymentDetail {
    Cheque(ChequeDetail),
    BankTransfer(BankTransferDetail),
}

impl PaymentDetail {
    /// The cheque number, if this is a cheque detail with one.
    pub fn cheque_number(&self) -> Option<&str> {
        match self {
            PaymentDetail::Cheque(c) => c.number.as_deref().filter(|n| !n.trim().is_empty()),
            _ => None,
        }
    }

    /// The bank-transfer reference, if present.
    pub fn bank_reference(&self) -> Option<&str> {
        match self {
            PaymentDetail::BankTransfer(b) => {
                b.reference_number.as_deref().filter(|r| !r.trim().is_empty())
            }
            _ => None,
        }
    }

    /// The bank name, if this is a bank-transfer detail with one.
    pub fn bank_name(&self) -> Option<&str> {
        match self {
            PaymentDetail::BankTransfer(b) => {
                b.bank_name.as_deref().filter(|n| !n.trim().is_empty())
            }
            _ => None,
        }
    }
}

// =============================================================================
// Payment
// =============================================================================

/// One recorded payment towards a sale.
///
/// Immutable once recorded; the ledger only ever appends to a sale's
/// payment history, never edits or removes an entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: String,
    pub sale_id: String,
    pub method: PaymentMethod,
    /// Amount applied in cents.
    pub amount_cents: i64,
    pub date: DateTime<Utc>,
    pub staff_id: String,
    pub notes: Option<String>,
    pub detail: Option<PaymentDetail>,
}

impl Payment {
    /// Returns the payment amount as Money.
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }

    /// Whether this entry counts towards `total_amount_paid`.
    ///
    /// Return-credit settlement notes reduce the outstanding balance
    /// directly; they are not customer money and are excluded from the
    /// paid total and from the replayed tender totals.
    #[inline]
    pub fn counts_as_paid(&self) -> bool {
        self.method != PaymentMethod::ReturnCredit
    }
}

// =============================================================================
// Sale Item
// =============================================================================

/// A line item in a sale.
/// Uses snapshot pattern to freeze product data at time of sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleItem {
    pub id: String,
    pub sale_id: String,
    pub product_id: String,
    /// Product name at time of sale (frozen).
    pub name_snapshot: String,
    /// SKU at time of sale (frozen).
    pub sku_snapshot: Option<String>,
    /// Per-unit price actually charged, in cents (retail or wholesale).
    pub applied_price_cents: i64,
    /// Quantity sold.
    pub quantity: i64,
    /// Quantity already returned across all return transactions.
    pub returned_quantity: i64,
    pub sale_type: SaleType,
}

impl SaleItem {
    /// Returns the applied unit price as Money.
    #[inline]
    pub fn applied_price(&self) -> Money {
        Money::from_cents(self.applied_price_cents)
    }

    /// Quantity still eligible for return.
    #[inline]
    pub fn remaining_returnable(&self) -> i64 {
        self.quantity - self.returned_quantity
    }

    /// Line total (applied price × quantity).
    #[inline]
    pub fn line_total(&self) -> Money {
        self.applied_price().multiply_quantity(self.quantity)
    }
}

// =============================================================================
// Sale
// =============================================================================

/// The ledger root: one sale with its financial aggregate state,
/// line items and append-only payment history.
///
/// ## Invariants
/// - `outstanding_balance_cents == max(0, total_amount_cents -
///   total_amount_paid_cents)` after every payment mutation. A return's
///   credit settlement is the one separate path that reduces the
///   balance without counting as payment.
/// - `additional_payments` is append-only; entries are never edited.
/// - `payment_summary` is a materialized cache, recomputed in full from
///   the numeric history on every mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sale {
    pub id: String,
    pub customer_id: Option<String>,
    pub customer_name: Option<String>,

    /// Amount due before any payment, in cents.
    pub total_amount_cents: i64,
    /// Sum of all counted payments ever applied, in cents.
    pub total_amount_paid_cents: i64,
    /// Amount still owed, clamped at zero.
    pub outstanding_balance_cents: i64,
    /// Balance immediately after creation, preserved for reporting.
    pub initial_outstanding_balance_cents: i64,
    /// Cash returned at creation when tendered cash exceeded the
    /// cash-attributable portion of the amount due.
    pub change_given_cents: i64,

    /// Creation-time tender split, kept for summary replay.
    pub paid_amount_cash_cents: i64,
    pub paid_amount_cheque_cents: i64,
    pub paid_amount_bank_transfer_cents: i64,
    pub cheque_detail: Option<ChequeDetail>,
    pub bank_transfer_detail: Option<BankTransferDetail>,

    /// Derived settlement description, e.g.
    /// `"Partial (Cash (600.00)) - Outstanding: 400.00"`.
    pub payment_summary: String,

    pub items: Vec<SaleItem>,
    /// Append-only installment payment log.
    pub additional_payments: Vec<Payment>,

    pub staff_id: String,
    pub sale_date: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Optimistic-concurrency token. Every committed mutation
    /// increments it; a commit is guarded by the version it read.
    pub version: i64,
}

impl Sale {
    /// Returns the total amount due as Money.
    #[inline]
    pub fn total_amount(&self) -> Money {
        Money::from_cents(self.total_amount_cents)
    }

    /// Returns the total paid as Money.
    #[inline]
    pub fn total_amount_paid(&self) -> Money {
        Money::from_cents(self.total_amount_paid_cents)
    }

    /// Returns the outstanding balance as Money.
    #[inline]
    pub fn outstanding_balance(&self) -> Money {
        Money::from_cents(self.outstanding_balance_cents)
    }

    /// Finds a returnable line item by product and sale type.
    ///
    /// A product can appear twice on one sale (retail and wholesale
    /// lines), so both keys are needed.
    pub fn find_item(&self, product_id: &str, sale_type: SaleType) -> Option<&SaleItem> {
        self.items
            .iter()
            .find(|i| i.product_id == product_id && i.sale_type == sale_type)
    }
}

// =============================================================================
// Return Transaction
// =============================================================================

/// One line on a return transaction, either returned or exchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnLine {
    pub product_id: String,
    pub name: String,
    pub sku: Option<String>,
    pub quantity: i64,
    pub applied_price_cents: i64,
    pub sale_type: SaleType,
    /// Returned stock goes back on the shelf only when resellable.
    /// Meaningless for exchanged lines (always false there).
    pub is_resellable: bool,
}

impl ReturnLine {
    /// Line value (applied price × quantity).
    #[inline]
    pub fn line_value(&self) -> Money {
        Money::from_cents(self.applied_price_cents).multiply_quantity(self.quantity)
    }
}

/// Permanent record of one return/exchange operation against a sale.
///
/// Created once, never mutated. A second return against the same sale
/// is a new transaction that must respect the then-current
/// remaining-returnable quantities on the sale's items.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnTransaction {
    /// Business id in the form `return-MM.YY-N` (per-month sequence).
    pub id: String,
    pub original_sale_id: String,
    pub return_date: DateTime<Utc>,
    pub staff_id: String,
    pub customer_id: Option<String>,
    pub customer_name: Option<String>,

    pub returned_items: Vec<ReturnLine>,
    pub exchanged_items: Vec<ReturnLine>,

    /// Return credit applied to the sale's outstanding balance.
    pub settle_outstanding_cents: Option<i64>,
    /// Money handed back to the customer.
    pub refund_cents: Option<i64>,

    /// Payment collected when the exchange left an amount due.
    pub amount_paid_cents: Option<i64>,
    pub payment_summary: Option<String>,
    pub cheque_detail: Option<ChequeDetail>,
    pub bank_transfer_detail: Option<BankTransferDetail>,
    pub change_given_cents: Option<i64>,

    pub notes: Option<String>,
}

// =============================================================================
// Unit Tests
// =============================================================================
