//! # Product Repository
//!
//! Database operations for products.
//!
//! ## Ledger Boundary
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                  Inventory vs Ledger                                    │
//! │                                                                         │
//! │  The ledger treats inventory as a collaborator, not a participant:      │
//! │                                                                         │
//! │  1. Commit the financial transaction   (atomic, versioned)             │
//! │  2. THEN adjust stock per line         (best-effort, logged)           │
//! │                                                                         │
//! │  A failed stock adjustment never rolls back money movement. It is      │
//! │  reported as a warning on the outcome for manual reconciliation.       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};

/// A product in the catalog. Stock is advisory for the ledger: sale
/// items snapshot name, SKU and applied price instead of referencing
/// live product data.
#[derive(Debug, Clone, FromRow)]
pub struct Product {
    pub id: String,
    pub sku: String,
    pub name: String,
    pub price_cents: i64,
    pub wholesale_price_cents: Option<i64>,
    pub stock: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Gets a product by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let product: Option<Product> = sqlx::query_as(
            r#"
            SELECT id, sku, name, price_cents, wholesale_price_cents,
                   stock, created_at, updated_at
            FROM products
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Gets a product by its SKU.
    pub async fn get_by_sku(&self, sku: &str) -> DbResult<Option<Product>> {
        let product: Option<Product> = sqlx::query_as(
            r#"
            SELECT id, sku, name, price_cents, wholesale_price_cents,
                   stock, created_at, updated_at
            FROM products
            WHERE sku = ?1
            "#,
        )
        .bind(sku)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Inserts a new product.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - SKU already exists
    pub async fn insert(&self, product: &Product) -> DbResult<()> {
        debug!(sku = %product.sku, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, sku, name, price_cents, wholesale_price_cents,
                stock, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&product.id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(product.price_cents)
        .bind(product.wholesale_price_cents)
        .bind(product.stock)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Adjusts product stock by a delta.
    ///
    /// Delta updates rather than absolute writes: two terminals selling
    /// the same product concurrently both apply their own decrement.
    ///
    /// ## Arguments
    /// * `id` - Product ID
    /// * `delta` - Change in stock (negative for sales and exchanges,
    ///   positive for resellable returns)
    pub async fn adjust_stock(&self, id: &str, delta: i64) -> DbResult<()> {
        debug!(id = %id, delta = delta, "Adjusting stock");

        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE products
            SET stock = stock + ?2,
                updated_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(delta)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Counts total products (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

/// Helper to generate a new product ID.
pub fn generate_product_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================
