//! # Ledger Transaction Coordinator
//!
//! Orchestrates every ledger mutation: load the sale aggregate, run the
//! pure engines from tally-core, and commit the computed next state
//! atomically under optimistic concurrency.
//!
//! ## Commit Protocol
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                 Optimistic Read-Compute-Commit                          │
//! │                                                                         │
//! │  loop (up to MAX_COMMIT_ATTEMPTS):                                     │
//! │       │                                                                 │
//! │       ├── 1. READ     load the full sale aggregate (version = v)       │
//! │       │                                                                 │
//! │       ├── 2. COMPUTE  pure engine call (apply_payment / net_return)    │
//! │       │               rejections surface here, nothing was written     │
//! │       │                                                                 │
//! │       ├── 3. COMMIT   single SQL transaction:                          │
//! │       │               • append payment / return rows                   │
//! │       │               • UPDATE sales ... WHERE id = ? AND version = v  │
//! │       │                                                                 │
//! │       ├── CAS matched?  ──► commit, done                               │
//! │       └── CAS missed?   ──► rollback, re-read, retry                   │
//! │                                                                         │
//! │  retries exhausted ──► DbError::Conflict                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Inventory Boundary
//! Stock adjustments run AFTER the financial commit and never roll it
//! back. A failed adjustment is logged and reported as a warning on the
//! outcome for manual reconciliation.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use crate::repository::product::ProductRepository;
use crate::repository::return_tx::ReturnRepository;
use crate::repository::sale::{
    generate_payment_id, generate_sale_id, generate_sale_item_id, SaleRepository,
};
use tally_core::checkout::{settle_tenders, Tender};
use tally_core::netting::{net_return, NettingOutcome, ReturnRequest, StockAdjustment};
use tally_core::payment::{apply_payment, PaymentApplication, PaymentRequest};
use tally_core::{
    LedgerError, Payment, PaymentMethod, ReturnTransaction, Sale, SaleItem, SaleType,
};

/// Upper bound on read-compute-commit attempts before giving up.
const MAX_COMMIT_ATTEMPTS: u32 = 3;

// =============================================================================
// Request / Outcome Types
// =============================================================================

/// One line to sell.
#[derive(Debug, Clone)]
pub struct SaleLineInput {
    pub product_id: String,
    pub name: String,
    pub sku: Option<String>,
    /// Per-unit price actually charged, in cents.
    pub applied_price_cents: i64,
    pub quantity: i64,
    pub sale_type: SaleType,
}

/// A new sale to record.
#[derive(Debug, Clone)]
pub struct CreateSaleRequest {
    pub customer_id: Option<String>,
    pub customer_name: Option<String>,
    pub items: Vec<SaleLineInput>,
    /// Money tendered at the till; may be empty (full credit sale).
    pub tender: Tender,
    pub staff_id: String,
    /// Defaults to the commit time when absent (backdating allowed).
    pub sale_date: Option<DateTime<Utc>>,
}

/// A stock adjustment that failed after the financial commit.
///
/// Non-fatal by contract: the ledger commit is the source of truth and
/// is never rolled back over a stock miss. Carries enough to replay
/// the adjustment by hand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryWarning {
    pub product_id: String,
    pub delta: i64,
    pub reason: String,
}

/// A committed sale plus any non-fatal inventory follow-up failures.
#[derive(Debug)]
pub struct CreateSaleOutcome {
    pub sale: Sale,
    pub inventory_warnings: Vec<InventoryWarning>,
}

/// A committed installment plus the sale state after it.
#[derive(Debug)]
pub struct PaymentOutcome {
    /// The sale as committed, payment appended and version bumped.
    pub sale: Sale,
    pub payment: Payment,
}

/// A committed return plus its netting figures.
#[derive(Debug)]
pub struct ReturnOutcome {
    pub transaction: ReturnTransaction,
    /// The sale as committed, settlement and collected tender applied.
    pub sale: Sale,
    pub refund_to_customer_cents: i64,
    pub final_amount_due_cents: i64,
    pub change_given_cents: i64,
    pub total_payment_applied_cents: i64,
    pub inventory_warnings: Vec<InventoryWarning>,
}

// =============================================================================
// Ledger Service
// =============================================================================

/// The transaction coordinator for all ledger mutations.
#[derive(Debug, Clone)]
pub struct LedgerService {
    pool: SqlitePool,
    sales: SaleRepository,
    returns: ReturnRepository,
    products: ProductRepository,
}

impl LedgerService {
    /// Creates a new LedgerService over the given pool.
    pub fn new(pool: SqlitePool) -> Self {
        LedgerService {
            sales: SaleRepository::new(pool.clone()),
            returns: ReturnRepository::new(pool.clone()),
            products: ProductRepository::new(pool.clone()),
            pool,
        }
    }

    // =========================================================================
    // Sale Creation
    // =========================================================================

    /// Records a new sale with its creation-time tender settlement.
    ///
    /// ## What This Does
    /// 1. Validates lines and tender details
    /// 2. Settles the tender: change, applied total, outstanding, summary
    /// 3. Inserts the sale and its items in one transaction
    /// 4. Decrements stock per line after commit (warnings only)
    pub async fn create_sale(&self, request: CreateSaleRequest) -> DbResult<CreateSaleOutcome> {
        if request.staff_id.trim().is_empty() {
            return Err(LedgerError::MissingStaff.into());
        }
        if request.items.is_empty() {
            return Err(LedgerError::EmptySale.into());
        }
        for line in &request.items {
            if line.quantity <= 0 || line.applied_price_cents < 0 {
                return Err(LedgerError::InvalidLineItem {
                    product_id: line.product_id.clone(),
                }
                .into());
            }
        }
        request.tender.validate().map_err(DbError::Ledger)?;

        let now = Utc::now();
        let sale_date = request.sale_date.unwrap_or(now);
        let sale_id = generate_sale_id();

        let items: Vec<SaleItem> = request
            .items
            .iter()
            .map(|line| SaleItem {
                id: generate_sale_item_id(),
                sale_id: sale_id.clone(),
                product_id: line.product_id.clone(),
                name_snapshot: line.name.clone(),
                sku_snapshot: line.sku.clone(),
                applied_price_cents: line.applied_price_cents,
                quantity: line.quantity,
                returned_quantity: 0,
                sale_type: line.sale_type,
            })
            .collect();

        let total_cents: i64 = items.iter().map(|i| i.line_total().cents()).sum();
        let settlement = settle_tenders(tally_core::Money::from_cents(total_cents), &request.tender);

        let sale = Sale {
            id: sale_id,
            customer_id: request.customer_id,
            customer_name: request.customer_name,
            total_amount_cents: total_cents,
            total_amount_paid_cents: settlement.total_applied_cents,
            outstanding_balance_cents: settlement.outstanding_cents,
            initial_outstanding_balance_cents: settlement.outstanding_cents,
            change_given_cents: settlement.change_given_cents,
            // Store the applied cash portion: change never counts.
            paid_amount_cash_cents: request.tender.cash_cents - settlement.change_given_cents,
            paid_amount_cheque_cents: request.tender.cheque_cents,
            paid_amount_bank_transfer_cents: request.tender.bank_transfer_cents,
            cheque_detail: request.tender.cheque_detail.clone(),
            bank_transfer_detail: request.tender.bank_transfer_detail.clone(),
            payment_summary: settlement.payment_summary,
            items,
            additional_payments: Vec::new(),
            staff_id: request.staff_id,
            sale_date,
            updated_at: now,
            version: 0,
        };

        let mut tx = self.pool.begin().await?;
        self.sales.insert_sale(&mut *tx, &sale).await?;
        tx.commit().await?;

        info!(
            id = %sale.id,
            total = sale.total_amount_cents,
            outstanding = sale.outstanding_balance_cents,
            "Sale recorded"
        );

        let adjustments: Vec<StockAdjustment> = sale
            .items
            .iter()
            .map(|i| StockAdjustment {
                product_id: i.product_id.clone(),
                delta: -i.quantity,
            })
            .collect();
        let inventory_warnings = self.apply_stock_adjustments(&adjustments).await;

        Ok(CreateSaleOutcome {
            sale,
            inventory_warnings,
        })
    }

    // =========================================================================
    // Payment Application
    // =========================================================================

    /// Applies one installment payment to a sale.
    ///
    /// The payment row, aggregate balances, summary and version bump
    /// commit atomically; a missed CAS re-reads and recomputes so the
    /// retry nets against the winner's state, never on top of stale
    /// figures.
    pub async fn record_payment(
        &self,
        sale_id: &str,
        request: PaymentRequest,
    ) -> DbResult<PaymentOutcome> {
        for attempt in 1..=MAX_COMMIT_ATTEMPTS {
            let sale = self
                .sales
                .get_by_id(sale_id)
                .await?
                .ok_or_else(|| DbError::not_found("Sale", sale_id))?;

            let now = Utc::now();
            let application = apply_payment(&sale, request.clone(), generate_payment_id(), now)?;

            let mut tx = self.pool.begin().await?;
            self.sales
                .insert_payment(&mut *tx, &application.payment)
                .await?;
            let committed = self
                .sales
                .update_aggregates_guarded(
                    &mut *tx,
                    sale_id,
                    sale.version,
                    application.new_total_paid_cents,
                    application.new_outstanding_cents,
                    &application.payment_summary,
                    now,
                )
                .await?;

            if committed {
                tx.commit().await?;
                info!(
                    sale_id = %sale_id,
                    amount = application.payment.amount_cents,
                    outstanding = application.new_outstanding_cents,
                    "Payment recorded"
                );

                let PaymentApplication {
                    payment,
                    new_total_paid_cents,
                    new_outstanding_cents,
                    payment_summary,
                } = application;

                // Mirror the committed row changes onto the in-memory
                // aggregate so callers get the final state without a
                // re-read.
                let mut sale = sale;
                sale.total_amount_paid_cents = new_total_paid_cents;
                sale.outstanding_balance_cents = new_outstanding_cents;
                sale.payment_summary = payment_summary;
                sale.updated_at = now;
                sale.version += 1;
                sale.additional_payments.push(payment.clone());

                return Ok(PaymentOutcome { sale, payment });
            }

            tx.rollback().await?;
            warn!(
                sale_id = %sale_id,
                attempt,
                "Payment commit lost the version race, retrying"
            );
        }

        Err(DbError::conflict("Sale", sale_id))
    }

    // =========================================================================
    // Return / Exchange Processing
    // =========================================================================

    /// Processes a return/exchange against a sale.
    ///
    /// ## Atomic Unit
    /// One SQL transaction covers:
    /// - returned-quantity increments on the sale's items (guarded)
    /// - the sale's aggregate update (version CAS)
    /// - the settlement note and any collected payment rows
    /// - the immutable return transaction record
    pub async fn process_return(
        &self,
        sale_id: &str,
        request: ReturnRequest,
    ) -> DbResult<ReturnOutcome> {
        if let Some(tender) = &request.payment {
            tender.validate().map_err(DbError::Ledger)?;
        }

        'attempts: for attempt in 1..=MAX_COMMIT_ATTEMPTS {
            let sale = self
                .sales
                .get_by_id(sale_id)
                .await?
                .ok_or_else(|| DbError::not_found("Sale", sale_id))?;

            let outcome = net_return(&sale, &request)?;
            let now = Utc::now();

            let mut tx = self.pool.begin().await?;

            for line in &outcome.returned_lines {
                let ok = self
                    .sales
                    .increment_returned_quantity(
                        &mut *tx,
                        sale_id,
                        &line.product_id,
                        line.sale_type,
                        line.quantity,
                    )
                    .await?;
                if !ok {
                    // A concurrent return consumed the quantity after
                    // our read; the re-read will reject or re-net.
                    tx.rollback().await?;
                    warn!(sale_id = %sale_id, attempt, "Returned-quantity guard failed, retrying");
                    continue 'attempts;
                }
            }

            let committed = self
                .sales
                .update_aggregates_guarded(
                    &mut *tx,
                    sale_id,
                    sale.version,
                    outcome.sale_update.new_total_paid_cents,
                    outcome.sale_update.new_outstanding_cents,
                    &outcome.sale_update.new_payment_summary,
                    now,
                )
                .await?;
            if !committed {
                tx.rollback().await?;
                warn!(sale_id = %sale_id, attempt, "Return commit lost the version race, retrying");
                continue 'attempts;
            }

            let return_id = self.returns.next_return_id(&mut *tx, now).await?;

            // Settlement note first: marks WHY the balance dropped
            // without counting as customer money. Then the collected
            // exchange payment, one counted entry per method so the
            // replayed per-method totals stay true.
            let mut appended_payments = Vec::new();
            if outcome.outstanding_to_settle_cents > 0 {
                appended_payments.push(Payment {
                    id: generate_payment_id(),
                    sale_id: sale_id.to_string(),
                    method: PaymentMethod::ReturnCredit,
                    amount_cents: outcome.outstanding_to_settle_cents,
                    date: now,
                    staff_id: request.staff_id.clone(),
                    notes: Some(format!("Return credit applied from {return_id}")),
                    detail: None,
                });
            }
            for tender in &outcome.collected_tenders {
                appended_payments.push(Payment {
                    id: generate_payment_id(),
                    sale_id: sale_id.to_string(),
                    method: tender.method,
                    amount_cents: tender.amount_cents,
                    date: now,
                    staff_id: request.staff_id.clone(),
                    notes: Some(format!("Collected on {return_id}")),
                    detail: tender.detail.clone(),
                });
            }
            for payment in &appended_payments {
                self.sales.insert_payment(&mut *tx, payment).await?;
            }

            let transaction = build_return_record(return_id, &sale, &request, &outcome, now);
            self.returns.insert_return(&mut *tx, &transaction).await?;

            tx.commit().await?;

            info!(
                id = %transaction.id,
                sale_id = %sale_id,
                refund = outcome.refund_to_customer_cents,
                settled = outcome.outstanding_to_settle_cents,
                "Return recorded"
            );

            let inventory_warnings = self
                .apply_stock_adjustments(&outcome.stock_adjustments)
                .await;

            // Mirror every committed row change onto the in-memory
            // aggregate so callers get the final state without a
            // re-read.
            let mut sale = sale;
            sale.total_amount_paid_cents = outcome.sale_update.new_total_paid_cents;
            sale.outstanding_balance_cents = outcome.sale_update.new_outstanding_cents;
            sale.payment_summary = outcome.sale_update.new_payment_summary.clone();
            sale.updated_at = now;
            sale.version += 1;
            for line in &outcome.returned_lines {
                if let Some(item) = sale
                    .items
                    .iter_mut()
                    .find(|i| i.product_id == line.product_id && i.sale_type == line.sale_type)
                {
                    item.returned_quantity += line.quantity;
                }
            }
            sale.additional_payments.extend(appended_payments);

            return Ok(ReturnOutcome {
                transaction,
                sale,
                refund_to_customer_cents: outcome.refund_to_customer_cents,
                final_amount_due_cents: outcome.final_amount_due_cents,
                change_given_cents: outcome.change_given_cents,
                total_payment_applied_cents: outcome.total_payment_applied_cents,
                inventory_warnings,
            });
        }

        Err(DbError::conflict("Sale", sale_id))
    }

    /// Applies stock deltas after a committed transaction.
    ///
    /// Failures do not undo the financial commit; each one is logged
    /// and reported back for manual reconciliation.
    async fn apply_stock_adjustments(
        &self,
        adjustments: &[StockAdjustment],
    ) -> Vec<InventoryWarning> {
        let mut warnings = Vec::new();
        for adj in adjustments {
            if let Err(e) = self.products.adjust_stock(&adj.product_id, adj.delta).await {
                warn!(
                    product_id = %adj.product_id,
                    delta = adj.delta,
                    error = %e,
                    "Stock adjustment failed after commit"
                );
                warnings.push(InventoryWarning {
                    product_id: adj.product_id.clone(),
                    delta: adj.delta,
                    reason: e.to_string(),
                });
            } else {
                debug!(product_id = %adj.product_id, delta = adj.delta, "Stock adjusted");
            }
        }
        warnings
    }
}

/// Assembles the immutable return record from the netting outcome.
fn build_return_record(
    return_id: String,
    sale: &Sale,
    request: &ReturnRequest,
    outcome: &NettingOutcome,
    now: DateTime<Utc>,
) -> ReturnTransaction {
    let collected = outcome.final_amount_due_cents > 0;
    ReturnTransaction {
        id: return_id,
        original_sale_id: sale.id.clone(),
        return_date: now,
        staff_id: request.staff_id.clone(),
        customer_id: sale.customer_id.clone(),
        customer_name: sale.customer_name.clone(),
        returned_items: outcome.returned_lines.clone(),
        exchanged_items: outcome.exchanged_lines.clone(),
        settle_outstanding_cents: Some(outcome.outstanding_to_settle_cents),
        refund_cents: Some(outcome.refund_to_customer_cents),
        amount_paid_cents: collected.then_some(outcome.total_payment_applied_cents),
        payment_summary: outcome.payment_summary.clone(),
        cheque_detail: request
            .payment
            .as_ref()
            .and_then(|t| t.cheque_detail.clone()),
        bank_transfer_detail: request
            .payment
            .as_ref()
            .and_then(|t| t.bank_transfer_detail.clone()),
        change_given_cents: collected.then_some(outcome.change_given_cents),
        notes: request.notes.clone(),
    }
}

// =============================================================================
// Integration Tests
// =============================================================================
