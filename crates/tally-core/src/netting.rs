//! # Return/Exchange Netting Engine
//!
//! Computes the net financial outcome of returning previously-sold
//! items, optionally exchanging for new items, optionally settling
//! existing debt with the return credit, and optionally collecting new
//! payment for any residual amount due.
//!
//! ## Netting Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  return_total    = Σ applied_price × return_qty                         │
//! │       │                                                                 │
//! │       ▼  (apply_credit_to_outstanding)                                  │
//! │  settle          = min(return_total, outstanding_balance)               │
//! │  net_credit      = return_total - settle                                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  exchange_total  = Σ applied_price × qty                                │
//! │  final_diff      = exchange_total - net_credit                          │
//! │       │                                                                 │
//! │       ├── > 0 ──► customer owes the shop  (collect payment)             │
//! │       ├── < 0 ──► shop owes the customer  (refund)                      │
//! │       └── = 0 ──► even                                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Settlement can never manufacture credit: it is bounded by both the
//! return value and the existing debt. `final_amount_due` and
//! `refund_to_customer` are never both positive.
//!
//! Order of operations is fixed: settle first, then apply any collected
//! payment against the post-settlement balance. The two orders only
//! agree when no rounding occurs, so exactly one is implemented.
//!
//! Pure computation, independent of persistence; the transaction
//! coordinator in tally-db commits the outcome atomically and performs
//! the inventory side effects afterwards.

use serde::{Deserialize, Serialize};

use crate::checkout::Tender;
use crate::error::{LedgerError, LedgerResult};
use crate::money::Money;
use crate::summary::{payment_summary, replay_tender_totals, return_payment_summary};
use crate::types::{PaymentDetail, PaymentMethod, ReturnLine, Sale, SaleType};

// =============================================================================
// Request Types
// =============================================================================

/// One line the customer is handing back.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnedItemInput {
    pub product_id: String,
    /// Retail and wholesale lines of the same product are distinct.
    pub sale_type: SaleType,
    /// Quantity to return; zero entries are ignored.
    pub quantity: i64,
    /// Goes back on the shelf only when resellable.
    pub is_resellable: bool,
}

/// One new line the customer is taking in exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeItemInput {
    pub product_id: String,
    pub name: String,
    pub sku: Option<String>,
    pub quantity: i64,
    pub applied_price_cents: i64,
    pub sale_type: SaleType,
}

/// A full return/exchange request against one sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnRequest {
    pub staff_id: String,
    pub returned_items: Vec<ReturnedItemInput>,
    pub exchanged_items: Vec<ExchangeItemInput>,
    /// Use the return credit to settle the sale's outstanding balance
    /// before refunding or offsetting exchange cost.
    pub apply_credit_to_outstanding: bool,
    /// Money collected when the exchange leaves an amount due.
    pub payment: Option<Tender>,
    pub notes: Option<String>,
}

// =============================================================================
// Outcome Types
// =============================================================================

/// One tendered portion of a collected return payment, per method.
///
/// A split tender becomes several counted entries on the sale's payment
/// history, one per method, so the replayed per-method totals stay true.
#[derive(Debug, Clone)]
pub struct CollectedTender {
    pub method: PaymentMethod,
    /// Applied amount (change already deducted from the cash portion).
    pub amount_cents: i64,
    pub detail: Option<PaymentDetail>,
}

/// Stock movement the inventory collaborator must perform after the
/// ledger commit. Positive delta restocks, negative removes.
#[derive(Debug, Clone, PartialEq)]
pub struct StockAdjustment {
    pub product_id: String,
    pub delta: i64,
}

/// The sale's next aggregate state after the return is applied.
#[derive(Debug, Clone, PartialEq)]
pub struct SaleLedgerUpdate {
    pub new_total_paid_cents: i64,
    pub new_outstanding_cents: i64,
    pub new_payment_summary: String,
}

/// Everything the netting engine derived from one return request.
#[derive(Debug, Clone)]
pub struct NettingOutcome {
    /// Returned lines resolved against the original sale (snapshot
    /// names and the originally applied prices).
    pub returned_lines: Vec<ReturnLine>,
    pub exchanged_lines: Vec<ReturnLine>,

    pub return_total_cents: i64,
    pub outstanding_to_settle_cents: i64,
    pub net_credit_cents: i64,
    pub exchange_total_cents: i64,
    pub final_amount_due_cents: i64,
    pub refund_to_customer_cents: i64,

    /// Payment actually collected for a positive amount due.
    pub change_given_cents: i64,
    pub total_payment_applied_cents: i64,
    pub payment_summary: Option<String>,
    pub collected_tenders: Vec<CollectedTender>,

    /// Sale aggregates after settle-then-collect.
    pub sale_update: SaleLedgerUpdate,
    /// Stock movements to signal to the inventory collaborator.
    pub stock_adjustments: Vec<StockAdjustment>,
}

// =============================================================================
// Netting
// =============================================================================

/// Computes the full outcome of a return/exchange request.
///
/// ## Failure Modes
/// - `MissingStaff` - no staff id on the request
/// - `NothingToReturn` - no returned quantity and no exchange items
/// - `LineItemNotFound` - returned line the sale never had
/// - `OverReturn` - more than the remaining returnable quantity
/// - `InsufficientPayment` - amount due not covered by the tender
///
/// All failures are detected before any state is touched.
pub fn net_return(sale: &Sale, request: &ReturnRequest) -> LedgerResult<NettingOutcome> {
    if request.staff_id.trim().is_empty() {
        return Err(LedgerError::MissingStaff);
    }

    // Step 1: resolve returned lines against the sale, enforcing the
    // remaining-returnable invariant per line.
    let mut returned_lines = Vec::new();
    for input in request.returned_items.iter().filter(|i| i.quantity > 0) {
        let item = sale
            .find_item(&input.product_id, input.sale_type)
            .ok_or_else(|| LedgerError::LineItemNotFound {
                product_id: input.product_id.clone(),
            })?;

        if input.quantity > item.remaining_returnable() {
            return Err(LedgerError::OverReturn {
                product_id: input.product_id.clone(),
                requested: input.quantity,
                returnable: item.remaining_returnable(),
            });
        }

        returned_lines.push(ReturnLine {
            product_id: item.product_id.clone(),
            name: item.name_snapshot.clone(),
            sku: item.sku_snapshot.clone(),
            quantity: input.quantity,
            applied_price_cents: item.applied_price_cents,
            sale_type: item.sale_type,
            is_resellable: input.is_resellable,
        });
    }

    let exchanged_lines: Vec<ReturnLine> = request
        .exchanged_items
        .iter()
        .filter(|i| i.quantity > 0)
        .map(|i| ReturnLine {
            product_id: i.product_id.clone(),
            name: i.name.clone(),
            sku: i.sku.clone(),
            quantity: i.quantity,
            applied_price_cents: i.applied_price_cents,
            sale_type: i.sale_type,
            is_resellable: false,
        })
        .collect();

    if returned_lines.is_empty() && exchanged_lines.is_empty() {
        return Err(LedgerError::NothingToReturn);
    }

    // Steps 2-5: the netting math itself.
    let return_total: Money = returned_lines.iter().map(ReturnLine::line_value).sum();
    let exchange_total: Money = exchanged_lines.iter().map(ReturnLine::line_value).sum();

    let outstanding = sale.outstanding_balance();
    let settle = if request.apply_credit_to_outstanding && outstanding.is_positive() {
        return_total.min(outstanding)
    } else {
        Money::zero()
    };
    let net_credit = return_total - settle;

    let final_diff = exchange_total - net_credit;
    let final_due = if final_diff.is_positive() {
        final_diff
    } else {
        Money::zero()
    };
    let refund = if final_diff.is_negative() {
        final_diff.abs()
    } else {
        Money::zero()
    };

    // Step 6: collect payment for a positive amount due.
    let mut change = Money::zero();
    let mut applied = Money::zero();
    let mut summary = None;
    let mut collected_tenders = Vec::new();

    if final_due.is_positive() {
        let tender = request.payment.clone().unwrap_or_default();
        change = tender.change_for(final_due);
        applied = tender.total_tendered() - change;

        if applied < final_due {
            return Err(LedgerError::InsufficientPayment {
                due_cents: final_due.cents(),
                applied_cents: applied.cents(),
            });
        }

        let totals = tender.applied_totals(change);
        summary = Some(return_payment_summary(&totals));

        if totals.cash_cents > 0 {
            collected_tenders.push(CollectedTender {
                method: PaymentMethod::Cash,
                amount_cents: totals.cash_cents,
                detail: None,
            });
        }
        if totals.cheque_cents > 0 {
            collected_tenders.push(CollectedTender {
                method: PaymentMethod::Cheque,
                amount_cents: totals.cheque_cents,
                detail: tender.cheque_detail.clone().map(PaymentDetail::Cheque),
            });
        }
        if totals.bank_transfer_cents > 0 {
            collected_tenders.push(CollectedTender {
                method: PaymentMethod::BankTransfer,
                amount_cents: totals.bank_transfer_cents,
                detail: tender
                    .bank_transfer_detail
                    .clone()
                    .map(PaymentDetail::BankTransfer),
            });
        }
    }

    // Step 8: sale aggregates, settle first, then fold the collected
    // payment against the post-settlement balance.
    let outstanding_after_settle = outstanding.saturating_sub_floor_zero(settle);
    let new_total_paid = sale.total_amount_paid() + applied;
    let new_outstanding = outstanding_after_settle.saturating_sub_floor_zero(applied);

    let mut replayed = replay_tender_totals(sale, None);
    for tender in &collected_tenders {
        match tender.method {
            PaymentMethod::Cash => replayed.cash_cents += tender.amount_cents,
            PaymentMethod::Cheque => replayed.cheque_cents += tender.amount_cents,
            PaymentMethod::BankTransfer => replayed.bank_transfer_cents += tender.amount_cents,
            PaymentMethod::ReturnCredit => {}
        }
    }
    let new_sale_summary = payment_summary(
        &replayed,
        sale.total_amount(),
        new_total_paid,
        new_outstanding,
    );

    // Step 10: stock movements for the inventory collaborator.
    let mut stock_adjustments = Vec::new();
    for line in returned_lines.iter().filter(|l| l.is_resellable) {
        stock_adjustments.push(StockAdjustment {
            product_id: line.product_id.clone(),
            delta: line.quantity,
        });
    }
    for line in &exchanged_lines {
        stock_adjustments.push(StockAdjustment {
            product_id: line.product_id.clone(),
            delta: -line.quantity,
        });
    }

    Ok(NettingOutcome {
        returned_lines,
        exchanged_lines,
        return_total_cents: return_total.cents(),
        outstanding_to_settle_cents: settle.cents(),
        net_credit_cents: net_credit.cents(),
        exchange_total_cents: exchange_total.cents(),
        final_amount_due_cents: final_due.cents(),
        refund_to_customer_cents: refund.cents(),
        change_given_cents: change.cents(),
        total_payment_applied_cents: applied.cents(),
        payment_summary: summary,
        collected_tenders,
        sale_update: SaleLedgerUpdate {
            new_total_paid_cents: new_total_paid.cents(),
            new_outstanding_cents: new_outstanding.cents(),
            new_payment_summary: new_sale_summary,
        },
        stock_adjustments,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SaleItem;
    use chrono::Utc;

    /// Sale of 10 units at 25.00 retail, configurable balance state.
    fn sale_fixture(outstanding_cents: i64) -> Sale {
        let total = 25_000;
        Sale {
            id: "sale-1".to_string(),
            customer_id: Some("cust-1".to_string()),
            customer_name: Some("Akram Traders".to_string()),
            total_amount_cents: total,
            total_amount_paid_cents: total - outstanding_cents,
            outstanding_balance_cents: outstanding_cents,
            initial_outstanding_balance_cents: outstanding_cents,
            change_given_cents: 0,
            paid_amount_cash_cents: total - outstanding_cents,
            paid_amount_cheque_cents: 0,
            paid_amount_bank_transfer_cents: 0,
            cheque_detail: None,
            bank_transfer_detail: None,
            payment_summary: String::new(),
            items: vec![SaleItem {
                id: "item-1".to_string(),
                sale_id: "sale-1".to_string(),
                product_id: "prod-1".to_string(),
                name_snapshot: "Engine Oil 1L".to_string(),
                sku_snapshot: Some("OIL-1L".to_string()),
                applied_price_cents: 2_500,
                quantity: 10,
                returned_quantity: 0,
                sale_type: SaleType::Retail,
            }],
            additional_payments: Vec::new(),
            staff_id: "staff-1".to_string(),
            sale_date: Utc::now(),
            updated_at: Utc::now(),
            version: 0,
        }
    }

    fn return_request(quantity: i64, apply_credit: bool) -> ReturnRequest {
        ReturnRequest {
            staff_id: "staff-1".to_string(),
            returned_items: vec![ReturnedItemInput {
                product_id: "prod-1".to_string(),
                sale_type: SaleType::Retail,
                quantity,
                is_resellable: true,
            }],
            exchanged_items: Vec::new(),
            apply_credit_to_outstanding: apply_credit,
            payment: None,
            notes: None,
        }
    }

    #[test]
    fn test_return_settles_debt_then_refunds_remainder() {
        // Return worth 250.00 against outstanding 100.00 with credit applied:
        // settle 100.00, refund the remaining 150.00.
        let sale = sale_fixture(10_000);
        let request = return_request(10, true);

        let outcome = net_return(&sale, &request).expect("valid return");

        assert_eq!(outcome.return_total_cents, 25_000);
        assert_eq!(outcome.outstanding_to_settle_cents, 10_000);
        assert_eq!(outcome.net_credit_cents, 15_000);
        assert_eq!(outcome.final_amount_due_cents, 0);
        assert_eq!(outcome.refund_to_customer_cents, 15_000);
        assert_eq!(outcome.sale_update.new_outstanding_cents, 0);
        // Settlement is not customer money; paid total is unchanged.
        assert_eq!(
            outcome.sale_update.new_total_paid_cents,
            sale.total_amount_paid_cents
        );
    }

    #[test]
    fn test_settle_bounded_by_both_credit_and_debt() {
        // Small return against a large debt: bounded by the credit.
        let sale = sale_fixture(20_000);
        let outcome = net_return(&sale, &return_request(2, true)).expect("valid");
        assert_eq!(outcome.outstanding_to_settle_cents, 5_000);
        assert!(outcome.outstanding_to_settle_cents <= outcome.return_total_cents);
        assert!(outcome.outstanding_to_settle_cents <= sale.outstanding_balance_cents);

        // Large return against a small debt: bounded by the debt.
        let sale = sale_fixture(1_000);
        let outcome = net_return(&sale, &return_request(10, true)).expect("valid");
        assert_eq!(outcome.outstanding_to_settle_cents, 1_000);
    }

    #[test]
    fn test_no_settle_when_credit_not_applied() {
        let sale = sale_fixture(10_000);
        let outcome = net_return(&sale, &return_request(4, false)).expect("valid");
        assert_eq!(outcome.outstanding_to_settle_cents, 0);
        assert_eq!(outcome.refund_to_customer_cents, 10_000);
        // Outstanding untouched without settlement.
        assert_eq!(outcome.sale_update.new_outstanding_cents, 10_000);
    }

    #[test]
    fn test_exchange_with_payment_and_cash_change() {
        // Return worth 100.00, exchange worth 300.00, no settle:
        // amount due 200.00; 250.00 cash tendered gives 50.00 change.
        let sale = sale_fixture(0);
        let request = ReturnRequest {
            staff_id: "staff-1".to_string(),
            returned_items: vec![ReturnedItemInput {
                product_id: "prod-1".to_string(),
                sale_type: SaleType::Retail,
                quantity: 4,
                is_resellable: true,
            }],
            exchanged_items: vec![ExchangeItemInput {
                product_id: "prod-2".to_string(),
                name: "Gear Oil 1L".to_string(),
                sku: Some("GEAR-1L".to_string()),
                quantity: 3,
                applied_price_cents: 10_000,
                sale_type: SaleType::Retail,
            }],
            apply_credit_to_outstanding: false,
            payment: Some(Tender {
                cash_cents: 25_000,
                ..Tender::default()
            }),
            notes: None,
        };

        let outcome = net_return(&sale, &request).expect("valid exchange");

        assert_eq!(outcome.return_total_cents, 10_000);
        assert_eq!(outcome.exchange_total_cents, 30_000);
        assert_eq!(outcome.final_amount_due_cents, 20_000);
        assert_eq!(outcome.change_given_cents, 5_000);
        assert_eq!(outcome.total_payment_applied_cents, 20_000);
        assert_eq!(outcome.payment_summary.as_deref(), Some("Cash (200.00)"));
        assert_eq!(outcome.refund_to_customer_cents, 0);

        // The collected payment is counted on the sale's ledger.
        assert_eq!(outcome.collected_tenders.len(), 1);
        assert_eq!(
            outcome.sale_update.new_total_paid_cents,
            sale.total_amount_paid_cents + 20_000
        );
    }

    #[test]
    fn test_due_and_refund_never_both_positive() {
        for outstanding in [0, 5_000, 20_000] {
            for (ret_qty, exchange_cents) in [(1, 0), (4, 10_000), (10, 40_000), (2, 5_000)] {
                let sale = sale_fixture(outstanding);
                let request = ReturnRequest {
                    staff_id: "staff-1".to_string(),
                    returned_items: vec![ReturnedItemInput {
                        product_id: "prod-1".to_string(),
                        sale_type: SaleType::Retail,
                        quantity: ret_qty,
                        is_resellable: true,
                    }],
                    exchanged_items: if exchange_cents > 0 {
                        vec![ExchangeItemInput {
                            product_id: "prod-2".to_string(),
                            name: "Gear Oil 1L".to_string(),
                            sku: None,
                            quantity: 1,
                            applied_price_cents: exchange_cents,
                            sale_type: SaleType::Retail,
                        }]
                    } else {
                        Vec::new()
                    },
                    apply_credit_to_outstanding: true,
                    payment: Some(Tender {
                        cash_cents: 100_000,
                        ..Tender::default()
                    }),
                    notes: None,
                };

                let outcome = net_return(&sale, &request).expect("valid");
                assert!(
                    outcome.final_amount_due_cents == 0 || outcome.refund_to_customer_cents == 0,
                    "due {} and refund {} both positive",
                    outcome.final_amount_due_cents,
                    outcome.refund_to_customer_cents
                );
            }
        }
    }

    #[test]
    fn test_even_exchange_is_neutral() {
        // Return 4 × 25.00 for an exchange worth exactly 100.00.
        let sale = sale_fixture(0);
        let request = ReturnRequest {
            staff_id: "staff-1".to_string(),
            returned_items: vec![ReturnedItemInput {
                product_id: "prod-1".to_string(),
                sale_type: SaleType::Retail,
                quantity: 4,
                is_resellable: true,
            }],
            exchanged_items: vec![ExchangeItemInput {
                product_id: "prod-2".to_string(),
                name: "Gear Oil 1L".to_string(),
                sku: None,
                quantity: 1,
                applied_price_cents: 10_000,
                sale_type: SaleType::Retail,
            }],
            apply_credit_to_outstanding: false,
            payment: None,
            notes: None,
        };

        let outcome = net_return(&sale, &request).expect("valid");
        assert_eq!(outcome.final_amount_due_cents, 0);
        assert_eq!(outcome.refund_to_customer_cents, 0);
        assert!(outcome.payment_summary.is_none());
    }

    #[test]
    fn test_insufficient_payment_rejected() {
        let sale = sale_fixture(0);
        let mut request = return_request(0, false);
        request.exchanged_items = vec![ExchangeItemInput {
            product_id: "prod-2".to_string(),
            name: "Gear Oil 1L".to_string(),
            sku: None,
            quantity: 1,
            applied_price_cents: 20_000,
            sale_type: SaleType::Retail,
        }];
        request.payment = Some(Tender {
            cash_cents: 15_000,
            ..Tender::default()
        });

        let err = net_return(&sale, &request).expect_err("short payment");
        assert_eq!(
            err,
            LedgerError::InsufficientPayment {
                due_cents: 20_000,
                applied_cents: 15_000,
            }
        );
    }

    #[test]
    fn test_over_return_rejected() {
        let mut sale = sale_fixture(0);
        // A previous return already consumed 8 of the 10 units.
        sale.items[0].returned_quantity = 8;

        let err = net_return(&sale, &return_request(3, false)).expect_err("over-return");
        assert_eq!(
            err,
            LedgerError::OverReturn {
                product_id: "prod-1".to_string(),
                requested: 3,
                returnable: 2,
            }
        );
    }

    #[test]
    fn test_unknown_line_rejected() {
        let sale = sale_fixture(0);
        let mut request = return_request(1, false);
        request.returned_items[0].product_id = "prod-404".to_string();

        let err = net_return(&sale, &request).expect_err("unknown line");
        assert_eq!(
            err,
            LedgerError::LineItemNotFound {
                product_id: "prod-404".to_string(),
            }
        );
    }

    #[test]
    fn test_wholesale_line_is_distinct() {
        // The sale only has a retail line; a wholesale return of the
        // same product must not match it.
        let sale = sale_fixture(0);
        let mut request = return_request(1, false);
        request.returned_items[0].sale_type = SaleType::Wholesale;

        assert!(matches!(
            net_return(&sale, &request),
            Err(LedgerError::LineItemNotFound { .. })
        ));
    }

    #[test]
    fn test_nothing_to_return_rejected() {
        let sale = sale_fixture(0);
        // Zero-quantity entries are filtered before the emptiness check.
        let err = net_return(&sale, &return_request(0, false)).expect_err("empty");
        assert_eq!(err, LedgerError::NothingToReturn);
    }

    #[test]
    fn test_missing_staff_rejected() {
        let sale = sale_fixture(0);
        let mut request = return_request(1, false);
        request.staff_id = String::new();
        assert!(matches!(
            net_return(&sale, &request),
            Err(LedgerError::MissingStaff)
        ));
    }

    #[test]
    fn test_stock_adjustments() {
        let sale = sale_fixture(0);
        let request = ReturnRequest {
            staff_id: "staff-1".to_string(),
            returned_items: vec![
                ReturnedItemInput {
                    product_id: "prod-1".to_string(),
                    sale_type: SaleType::Retail,
                    quantity: 2,
                    is_resellable: true,
                },
            ],
            exchanged_items: vec![ExchangeItemInput {
                product_id: "prod-2".to_string(),
                name: "Gear Oil 1L".to_string(),
                sku: None,
                quantity: 1,
                applied_price_cents: 1_000,
                sale_type: SaleType::Retail,
            }],
            apply_credit_to_outstanding: false,
            payment: None,
            notes: None,
        };

        let outcome = net_return(&sale, &request).expect("valid");
        assert_eq!(
            outcome.stock_adjustments,
            vec![
                StockAdjustment {
                    product_id: "prod-1".to_string(),
                    delta: 2,
                },
                StockAdjustment {
                    product_id: "prod-2".to_string(),
                    delta: -1,
                },
            ]
        );
    }

    #[test]
    fn test_damaged_return_does_not_restock() {
        let sale = sale_fixture(0);
        let mut request = return_request(2, false);
        request.returned_items[0].is_resellable = false;

        let outcome = net_return(&sale, &request).expect("valid");
        assert!(outcome.stock_adjustments.is_empty());
    }
}
