//! # tally-db: Database Layer for Tally POS
//!
//! This crate provides persistence and transaction coordination for the
//! Tally POS sale ledger. It uses SQLite for local storage with sqlx
//! for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tally POS Data Flow                              │
//! │                                                                         │
//! │  Caller (record payment / process return)                              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     tally-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │ LedgerService │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │  (ledger.rs)  │───►│  (sale.rs,    │    │  (embedded)  │  │   │
//! │  │   │               │    │   return_tx,  │    │              │  │   │
//! │  │   │ read-compute- │    │   product)    │    │ 001_init.sql │  │   │
//! │  │   │ commit + CAS  │    │               │    │              │  │   │
//! │  │   └───────┬───────┘    └───────────────┘    └──────────────┘  │   │
//! │  │           │  pure ledger math                                  │   │
//! │  │           ▼                                                    │   │
//! │  │   tally-core (apply_payment, net_return, settle_tenders)      │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database (WAL, foreign keys, version CAS)                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations (sale, return, product)
//! - [`ledger`] - The transaction coordinator
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tally_db::{Database, DbConfig};
//! use tally_core::payment::PaymentRequest;
//!
//! let db = Database::new(DbConfig::new("path/to/tally.db")).await?;
//!
//! let outcome = db.ledger().record_payment("sale-id", request).await?;
//! println!("{}", outcome.sale.payment_summary);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod ledger;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use ledger::{
    CreateSaleOutcome, CreateSaleRequest, InventoryWarning, LedgerService, PaymentOutcome,
    ReturnOutcome, SaleLineInput,
};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::product::ProductRepository;
pub use repository::return_tx::ReturnRepository;
pub use repository::sale::SaleRepository;
