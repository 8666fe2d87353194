//! # Return Transaction Repository
//!
//! Persistence for return/exchange transactions.
//!
//! ## Immutability
//! A return transaction is written once inside the coordinator's commit
//! and never updated. Corrections are modeled as new transactions
//! against the same sale, constrained by the sale items'
//! then-current remaining-returnable quantities.
//!
//! ## Business ID
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Return IDs are human-facing, per-month sequences:                      │
//! │                                                                         │
//! │      return-08.26-1      first return in August 2026                    │
//! │      return-08.26-2      second return in August 2026                   │
//! │      return-09.26-1      sequence restarts each month                   │
//! │                                                                         │
//! │  The next number is counted inside the commit transaction so two        │
//! │  concurrent returns cannot claim the same ID.                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Datelike, Utc};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use crate::repository::sale::{bank_detail_from_columns, cheque_detail_from_columns};
use tally_core::{ReturnLine, ReturnTransaction, SaleType};

// =============================================================================
// Row Types
// =============================================================================

#[derive(Debug, FromRow)]
struct ReturnRow {
    id: String,
    original_sale_id: String,
    return_date: DateTime<Utc>,
    staff_id: String,
    customer_id: Option<String>,
    customer_name: Option<String>,
    settle_outstanding_cents: Option<i64>,
    refund_cents: Option<i64>,
    amount_paid_cents: Option<i64>,
    payment_summary: Option<String>,
    change_given_cents: Option<i64>,
    cheque_number: Option<String>,
    cheque_bank: Option<String>,
    cheque_date: Option<DateTime<Utc>>,
    bank_name: Option<String>,
    bank_reference: Option<String>,
    notes: Option<String>,
}

#[derive(Debug, FromRow)]
struct ReturnItemRow {
    direction: String,
    product_id: String,
    name: String,
    sku: Option<String>,
    quantity: i64,
    applied_price_cents: i64,
    sale_type: SaleType,
    is_resellable: bool,
}

impl From<ReturnItemRow> for ReturnLine {
    fn from(row: ReturnItemRow) -> Self {
        ReturnLine {
            product_id: row.product_id,
            name: row.name,
            sku: row.sku,
            quantity: row.quantity,
            applied_price_cents: row.applied_price_cents,
            sale_type: row.sale_type,
            is_resellable: row.is_resellable,
        }
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for return transaction database operations.
#[derive(Debug, Clone)]
pub struct ReturnRepository {
    pool: SqlitePool,
}

impl ReturnRepository {
    /// Creates a new ReturnRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ReturnRepository { pool }
    }

    /// Allocates the next business ID for the month of `now`.
    ///
    /// Counts existing IDs with the month prefix inside the caller's
    /// transaction, so the sequence is race-free under the commit.
    pub async fn next_return_id(
        &self,
        conn: &mut SqliteConnection,
        now: DateTime<Utc>,
    ) -> DbResult<String> {
        let prefix = format!("return-{:02}.{:02}-", now.month(), now.year() % 100);

        let existing: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM return_transactions WHERE id LIKE ?1",
        )
        .bind(format!("{prefix}%"))
        .fetch_one(&mut *conn)
        .await?;

        Ok(format!("{}{}", prefix, existing + 1))
    }

    /// Inserts a complete return transaction (header plus lines).
    pub async fn insert_return(
        &self,
        conn: &mut SqliteConnection,
        ret: &ReturnTransaction,
    ) -> DbResult<()> {
        debug!(id = %ret.id, sale_id = %ret.original_sale_id, "Inserting return transaction");

        let (cheque_number, cheque_bank, cheque_date) = match &ret.cheque_detail {
            Some(c) => (c.number.clone(), c.bank.clone(), c.date),
            None => (None, None, None),
        };
        let (bank_name, bank_reference) = match &ret.bank_transfer_detail {
            Some(b) => (b.bank_name.clone(), b.reference_number.clone()),
            None => (None, None),
        };

        sqlx::query(
            r#"
            INSERT INTO return_transactions (
                id, original_sale_id, return_date, staff_id,
                customer_id, customer_name,
                settle_outstanding_cents, refund_cents,
                amount_paid_cents, payment_summary, change_given_cents,
                cheque_number, cheque_bank, cheque_date,
                bank_name, bank_reference,
                notes
            ) VALUES (
                ?1, ?2, ?3, ?4,
                ?5, ?6,
                ?7, ?8,
                ?9, ?10, ?11,
                ?12, ?13, ?14,
                ?15, ?16,
                ?17
            )
            "#,
        )
        .bind(&ret.id)
        .bind(&ret.original_sale_id)
        .bind(ret.return_date)
        .bind(&ret.staff_id)
        .bind(&ret.customer_id)
        .bind(&ret.customer_name)
        .bind(ret.settle_outstanding_cents)
        .bind(ret.refund_cents)
        .bind(ret.amount_paid_cents)
        .bind(&ret.payment_summary)
        .bind(ret.change_given_cents)
        .bind(cheque_number)
        .bind(cheque_bank)
        .bind(cheque_date)
        .bind(bank_name)
        .bind(bank_reference)
        .bind(&ret.notes)
        .execute(&mut *conn)
        .await?;

        for (direction, lines) in [
            ("returned", &ret.returned_items),
            ("exchanged", &ret.exchanged_items),
        ] {
            for line in lines {
                sqlx::query(
                    r#"
                    INSERT INTO return_transaction_items (
                        id, return_id, direction,
                        product_id, name, sku,
                        quantity, applied_price_cents, sale_type, is_resellable
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                    "#,
                )
                .bind(Uuid::new_v4().to_string())
                .bind(&ret.id)
                .bind(direction)
                .bind(&line.product_id)
                .bind(&line.name)
                .bind(&line.sku)
                .bind(line.quantity)
                .bind(line.applied_price_cents)
                .bind(line.sale_type)
                .bind(line.is_resellable)
                .execute(&mut *conn)
                .await?;
            }
        }

        Ok(())
    }

    /// Loads a return transaction by its business ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<ReturnTransaction>> {
        let row: Option<ReturnRow> = sqlx::query_as(
            r#"
            SELECT
                id, original_sale_id, return_date, staff_id,
                customer_id, customer_name,
                settle_outstanding_cents, refund_cents,
                amount_paid_cents, payment_summary, change_given_cents,
                cheque_number, cheque_bank, cheque_date,
                bank_name, bank_reference,
                notes
            FROM return_transactions
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let items: Vec<ReturnItemRow> = sqlx::query_as(
            r#"
            SELECT
                direction, product_id, name, sku,
                quantity, applied_price_cents, sale_type, is_resellable
            FROM return_transaction_items
            WHERE return_id = ?1
            ORDER BY id
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let (returned, exchanged): (Vec<_>, Vec<_>) = items
            .into_iter()
            .partition(|i| i.direction == "returned");

        Ok(Some(ReturnTransaction {
            id: row.id,
            original_sale_id: row.original_sale_id,
            return_date: row.return_date,
            staff_id: row.staff_id,
            customer_id: row.customer_id,
            customer_name: row.customer_name,
            returned_items: returned.into_iter().map(ReturnLine::from).collect(),
            exchanged_items: exchanged.into_iter().map(ReturnLine::from).collect(),
            settle_outstanding_cents: row.settle_outstanding_cents,
            refund_cents: row.refund_cents,
            amount_paid_cents: row.amount_paid_cents,
            payment_summary: row.payment_summary,
            cheque_detail: cheque_detail_from_columns(
                row.cheque_number,
                row.cheque_bank,
                row.cheque_date,
            ),
            bank_transfer_detail: bank_detail_from_columns(row.bank_name, row.bank_reference),
            change_given_cents: row.change_given_cents,
            notes: row.notes,
        }))
    }

    /// Lists return IDs recorded against one sale, oldest first.
    pub async fn list_ids_for_sale(&self, sale_id: &str) -> DbResult<Vec<String>> {
        let ids: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT id FROM return_transactions
            WHERE original_sale_id = ?1
            ORDER BY return_date
            "#,
        )
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
