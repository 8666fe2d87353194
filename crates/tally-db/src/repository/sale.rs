//! # Sale Repository
//!
//! Persistence for the sale aggregate: the sales row, its line items
//! and its append-only payment log.
//!
//! ## Aggregate Assembly
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Loading a Sale                                       │
//! │                                                                         │
//! │  get_by_id("sale-1")                                                   │
//! │       │                                                                 │
//! │       ├── SELECT * FROM sales WHERE id = ?        → SaleRow            │
//! │       ├── SELECT * FROM sale_items WHERE sale_id  → Vec<SaleItemRow>   │
//! │       └── SELECT * FROM sale_payments ...         → Vec<PaymentRow>    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Sale { aggregates, items, additional_payments }                       │
//! │                                                                         │
//! │  The in-memory Sale is always the COMPLETE aggregate. Ledger math      │
//! │  in tally-core never sees a partially loaded sale.                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Write Discipline
//! All writes take `&mut SqliteConnection` so the transaction
//! coordinator can commit a whole mutation (payment row + aggregate
//! update + version bump) atomically. The version-guarded UPDATE is the
//! optimistic-concurrency primitive: it matches zero rows when another
//! writer got there first.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use tally_core::{
    BankTransferDetail, ChequeDetail, Payment, PaymentDetail, PaymentMethod, Sale, SaleItem,
    SaleType,
};

// =============================================================================
// Row Types
// =============================================================================

/// Flat sales row; items and payments are loaded separately.
#[derive(Debug, FromRow)]
struct SaleRow {
    id: String,
    customer_id: Option<String>,
    customer_name: Option<String>,
    total_amount_cents: i64,
    total_amount_paid_cents: i64,
    outstanding_balance_cents: i64,
    initial_outstanding_balance_cents: i64,
    change_given_cents: i64,
    paid_amount_cash_cents: i64,
    paid_amount_cheque_cents: i64,
    paid_amount_bank_transfer_cents: i64,
    cheque_number: Option<String>,
    cheque_bank: Option<String>,
    cheque_date: Option<DateTime<Utc>>,
    bank_name: Option<String>,
    bank_reference: Option<String>,
    payment_summary: String,
    staff_id: String,
    sale_date: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: i64,
}

#[derive(Debug, FromRow)]
struct SaleItemRow {
    id: String,
    sale_id: String,
    product_id: String,
    name_snapshot: String,
    sku_snapshot: Option<String>,
    applied_price_cents: i64,
    quantity: i64,
    returned_quantity: i64,
    sale_type: SaleType,
}

#[derive(Debug, FromRow)]
struct PaymentRow {
    id: String,
    sale_id: String,
    method: PaymentMethod,
    amount_cents: i64,
    paid_at: DateTime<Utc>,
    staff_id: String,
    notes: Option<String>,
    cheque_number: Option<String>,
    cheque_bank: Option<String>,
    cheque_date: Option<DateTime<Utc>>,
    bank_name: Option<String>,
    bank_reference: Option<String>,
}

/// Rebuilds an optional cheque detail from flattened columns.
pub(crate) fn cheque_detail_from_columns(
    number: Option<String>,
    bank: Option<String>,
    date: Option<DateTime<Utc>>,
) -> Option<ChequeDetail> {
    if number.is_none() && bank.is_none() && date.is_none() {
        return None;
    }
    Some(ChequeDetail {
        number,
        bank,
        date,
        amount_cents: None,
    })
}

/// Rebuilds an optional bank-transfer detail from flattened columns.
pub(crate) fn bank_detail_from_columns(
    bank_name: Option<String>,
    reference_number: Option<String>,
) -> Option<BankTransferDetail> {
    if bank_name.is_none() && reference_number.is_none() {
        return None;
    }
    Some(BankTransferDetail {
        bank_name,
        reference_number,
        amount_cents: None,
    })
}

impl From<SaleItemRow> for SaleItem {
    fn from(row: SaleItemRow) -> Self {
        SaleItem {
            id: row.id,
            sale_id: row.sale_id,
            product_id: row.product_id,
            name_snapshot: row.name_snapshot,
            sku_snapshot: row.sku_snapshot,
            applied_price_cents: row.applied_price_cents,
            quantity: row.quantity,
            returned_quantity: row.returned_quantity,
            sale_type: row.sale_type,
        }
    }
}

impl From<PaymentRow> for Payment {
    fn from(row: PaymentRow) -> Self {
        let detail = match row.method {
            PaymentMethod::Cheque => {
                cheque_detail_from_columns(row.cheque_number, row.cheque_bank, row.cheque_date)
                    .map(PaymentDetail::Cheque)
            }
            PaymentMethod::BankTransfer => {
                bank_detail_from_columns(row.bank_name, row.bank_reference)
                    .map(PaymentDetail::BankTransfer)
            }
            _ => None,
        };

        Payment {
            id: row.id,
            sale_id: row.sale_id,
            method: row.method,
            amount_cents: row.amount_cents,
            date: row.paid_at,
            staff_id: row.staff_id,
            notes: row.notes,
            detail,
        }
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for sale database operations.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Loads the complete sale aggregate by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Sale>> {
        let row: Option<SaleRow> = sqlx::query_as(
            r#"
            SELECT
                id, customer_id, customer_name,
                total_amount_cents, total_amount_paid_cents,
                outstanding_balance_cents, initial_outstanding_balance_cents,
                change_given_cents,
                paid_amount_cash_cents, paid_amount_cheque_cents,
                paid_amount_bank_transfer_cents,
                cheque_number, cheque_bank, cheque_date,
                bank_name, bank_reference,
                payment_summary, staff_id, sale_date, updated_at, version
            FROM sales
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let items = self.get_items(id).await?;
        let payments = self.get_payments(id).await?;

        Ok(Some(assemble_sale(row, items, payments)))
    }

    /// Lists sale IDs for a customer, most recent first.
    pub async fn list_ids_for_customer(&self, customer_id: &str) -> DbResult<Vec<String>> {
        let ids: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT id FROM sales
            WHERE customer_id = ?1
            ORDER BY sale_date DESC
            "#,
        )
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    /// Gets all items for a sale.
    pub async fn get_items(&self, sale_id: &str) -> DbResult<Vec<SaleItem>> {
        let rows: Vec<SaleItemRow> = sqlx::query_as(
            r#"
            SELECT
                id, sale_id, product_id,
                name_snapshot, sku_snapshot,
                applied_price_cents, quantity, returned_quantity, sale_type
            FROM sale_items
            WHERE sale_id = ?1
            ORDER BY id
            "#,
        )
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(SaleItem::from).collect())
    }

    /// Gets the payment log for a sale, oldest first.
    pub async fn get_payments(&self, sale_id: &str) -> DbResult<Vec<Payment>> {
        let rows: Vec<PaymentRow> = sqlx::query_as(
            r#"
            SELECT
                id, sale_id, method, amount_cents, paid_at,
                staff_id, notes,
                cheque_number, cheque_bank, cheque_date,
                bank_name, bank_reference
            FROM sale_payments
            WHERE sale_id = ?1
            ORDER BY paid_at, id
            "#,
        )
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Payment::from).collect())
    }

    /// Inserts a complete sale aggregate (sale row plus items).
    ///
    /// ## Snapshot Pattern
    /// Product details (sku, name, applied price) are frozen on the
    /// item rows. Later product edits never rewrite sale history.
    pub async fn insert_sale(&self, conn: &mut SqliteConnection, sale: &Sale) -> DbResult<()> {
        debug!(id = %sale.id, total = sale.total_amount_cents, "Inserting sale");

        let (cheque_number, cheque_bank, cheque_date) = match &sale.cheque_detail {
            Some(c) => (c.number.clone(), c.bank.clone(), c.date),
            None => (None, None, None),
        };
        let (bank_name, bank_reference) = match &sale.bank_transfer_detail {
            Some(b) => (b.bank_name.clone(), b.reference_number.clone()),
            None => (None, None),
        };

        sqlx::query(
            r#"
            INSERT INTO sales (
                id, customer_id, customer_name,
                total_amount_cents, total_amount_paid_cents,
                outstanding_balance_cents, initial_outstanding_balance_cents,
                change_given_cents,
                paid_amount_cash_cents, paid_amount_cheque_cents,
                paid_amount_bank_transfer_cents,
                cheque_number, cheque_bank, cheque_date,
                bank_name, bank_reference,
                payment_summary, staff_id, sale_date, updated_at, version
            ) VALUES (
                ?1, ?2, ?3,
                ?4, ?5,
                ?6, ?7,
                ?8,
                ?9, ?10,
                ?11,
                ?12, ?13, ?14,
                ?15, ?16,
                ?17, ?18, ?19, ?20, ?21
            )
            "#,
        )
        .bind(&sale.id)
        .bind(&sale.customer_id)
        .bind(&sale.customer_name)
        .bind(sale.total_amount_cents)
        .bind(sale.total_amount_paid_cents)
        .bind(sale.outstanding_balance_cents)
        .bind(sale.initial_outstanding_balance_cents)
        .bind(sale.change_given_cents)
        .bind(sale.paid_amount_cash_cents)
        .bind(sale.paid_amount_cheque_cents)
        .bind(sale.paid_amount_bank_transfer_cents)
        .bind(cheque_number)
        .bind(cheque_bank)
        .bind(cheque_date)
        .bind(bank_name)
        .bind(bank_reference)
        .bind(&sale.payment_summary)
        .bind(&sale.staff_id)
        .bind(sale.sale_date)
        .bind(sale.updated_at)
        .bind(sale.version)
        .execute(&mut *conn)
        .await?;

        for item in &sale.items {
            sqlx::query(
                r#"
                INSERT INTO sale_items (
                    id, sale_id, product_id,
                    name_snapshot, sku_snapshot,
                    applied_price_cents, quantity, returned_quantity, sale_type
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
            )
            .bind(&item.id)
            .bind(&item.sale_id)
            .bind(&item.product_id)
            .bind(&item.name_snapshot)
            .bind(&item.sku_snapshot)
            .bind(item.applied_price_cents)
            .bind(item.quantity)
            .bind(item.returned_quantity)
            .bind(item.sale_type)
            .execute(&mut *conn)
            .await?;
        }

        Ok(())
    }

    /// Appends one payment to a sale's payment log.
    pub async fn insert_payment(
        &self,
        conn: &mut SqliteConnection,
        payment: &Payment,
    ) -> DbResult<()> {
        debug!(
            sale_id = %payment.sale_id,
            amount = payment.amount_cents,
            "Recording payment"
        );

        let (cheque_number, cheque_bank, cheque_date) = match &payment.detail {
            Some(PaymentDetail::Cheque(c)) => (c.number.clone(), c.bank.clone(), c.date),
            _ => (None, None, None),
        };
        let (bank_name, bank_reference) = match &payment.detail {
            Some(PaymentDetail::BankTransfer(b)) => {
                (b.bank_name.clone(), b.reference_number.clone())
            }
            _ => (None, None),
        };

        sqlx::query(
            r#"
            INSERT INTO sale_payments (
                id, sale_id, method, amount_cents, paid_at,
                staff_id, notes,
                cheque_number, cheque_bank, cheque_date,
                bank_name, bank_reference
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(&payment.id)
        .bind(&payment.sale_id)
        .bind(payment.method)
        .bind(payment.amount_cents)
        .bind(payment.date)
        .bind(&payment.staff_id)
        .bind(&payment.notes)
        .bind(cheque_number)
        .bind(cheque_bank)
        .bind(cheque_date)
        .bind(bank_name)
        .bind(bank_reference)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Version-guarded update of the sale's aggregate balance fields.
    ///
    /// ## Optimistic Concurrency
    /// The WHERE clause matches only if the row still carries the
    /// version the caller read. Returns `false` (zero rows matched)
    /// when a concurrent writer committed first; the caller re-reads
    /// and retries.
    pub async fn update_aggregates_guarded(
        &self,
        conn: &mut SqliteConnection,
        sale_id: &str,
        expected_version: i64,
        new_total_paid_cents: i64,
        new_outstanding_cents: i64,
        payment_summary: &str,
        now: DateTime<Utc>,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE sales SET
                total_amount_paid_cents = ?3,
                outstanding_balance_cents = ?4,
                payment_summary = ?5,
                updated_at = ?6,
                version = version + 1
            WHERE id = ?1 AND version = ?2
            "#,
        )
        .bind(sale_id)
        .bind(expected_version)
        .bind(new_total_paid_cents)
        .bind(new_outstanding_cents)
        .bind(payment_summary)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Increments a line item's returned quantity, guarded against
    /// exceeding the sold quantity.
    ///
    /// Returns `false` when the guard fails: either the line no longer
    /// exists or a concurrent return consumed the remaining quantity.
    pub async fn increment_returned_quantity(
        &self,
        conn: &mut SqliteConnection,
        sale_id: &str,
        product_id: &str,
        sale_type: SaleType,
        quantity: i64,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE sale_items SET
                returned_quantity = returned_quantity + ?4
            WHERE sale_id = ?1 AND product_id = ?2 AND sale_type = ?3
              AND returned_quantity + ?4 <= quantity
            "#,
        )
        .bind(sale_id)
        .bind(product_id)
        .bind(sale_type)
        .bind(quantity)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// Assembles the domain aggregate from its rows.
fn assemble_sale(row: SaleRow, items: Vec<SaleItem>, payments: Vec<Payment>) -> Sale {
    Sale {
        id: row.id,
        customer_id: row.customer_id,
        customer_name: row.customer_name,
        total_amount_cents: row.total_amount_cents,
        total_amount_paid_cents: row.total_amount_paid_cents,
        outstanding_balance_cents: row.outstanding_balance_cents,
        initial_outstanding_balance_cents: row.initial_outstanding_balance_cents,
        change_given_cents: row.change_given_cents,
        paid_amount_cash_cents: row.paid_amount_cash_cents,
        paid_amount_cheque_cents: row.paid_amount_cheque_cents,
        paid_amount_bank_transfer_cents: row.paid_amount_bank_transfer_cents,
        cheque_detail: cheque_detail_from_columns(
            row.cheque_number,
            row.cheque_bank,
            row.cheque_date,
        ),
        bank_transfer_detail: bank_detail_from_columns(row.bank_name, row.bank_reference),
        payment_summary: row.payment_summary,
        items,
        additional_payments: payments,
        staff_id: row.staff_id,
        sale_date: row.sale_date,
        updated_at: row.updated_at,
        version: row.version,
    }
}

/// Generates a new sale ID.
pub fn generate_sale_id() -> String {
    Uuid::new_v4().to_string()
}

/// Generates a new sale item ID.
pub fn generate_sale_item_id() -> String {
    Uuid::new_v4().to_string()
}

/// Generates a new payment ID.
pub fn generate_payment_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================

/// Fixtures shared with other repository tests.
#[cfg(test)]
pub(crate) mod tests_support {
    use super::*;

    /// A bare paid-in-full sale with one retail line.
    pub(crate) fn minimal_sale(id: &str, now: DateTime<Utc>) -> Sale {
        Sale {
            id: id.to_string(),
            customer_id: None,
            customer_name: None,
            total_amount_cents: 25_000,
            total_amount_paid_cents: 25_000,
            outstanding_balance_cents: 0,
            initial_outstanding_balance_cents: 0,
            change_given_cents: 0,
            paid_amount_cash_cents: 25_000,
            paid_amount_cheque_cents: 0,
            paid_amount_bank_transfer_cents: 0,
            cheque_detail: None,
            bank_transfer_detail: None,
            payment_summary: "Cash (250.00)".to_string(),
            items: vec![SaleItem {
                id: generate_sale_item_id(),
                sale_id: id.to_string(),
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
            sale_date: now,
            updated_at: now,
            version: 0,
        }
    }
}
