//! # Repository Module
//!
//! Database repository implementations for Tally POS.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern Explained                         │
//! │                                                                         │
//! │  The Repository pattern abstracts database access behind a clean API.  │
//! │                                                                         │
//! │  LedgerService (coordinator)                                           │
//! │       │                                                                 │
//! │       │  db.sales().get_by_id("...")                                   │
//! │       │  ↓                                                              │
//! │       ▼                                                                 │
//! │  SaleRepository                                                        │
//! │  ├── get_by_id(&self, id)          ← pool reads                        │
//! │  ├── insert_sale(&mut conn, sale)  ← transaction-scoped writes         │
//! │  └── update_aggregates_guarded(..) ← version-guarded CAS               │
//! │       │                                                                 │
//! │       │  SQL Query                                                      │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! │                                                                         │
//! │  Benefits:                                                              │
//! │  • Clean separation of concerns                                        │
//! │  • SQL is isolated in one place                                        │
//! │  • Aggregate assembly (sale + items + payments) in one spot            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Write methods take `&mut SqliteConnection` so the coordinator can run
//! several of them inside one transaction; read methods use the pool.
//!
//! ## Available Repositories
//!
//! - [`ProductRepository`] - Product CRUD and stock adjustments
//! - [`SaleRepository`] - Sale aggregate persistence
//! - [`ReturnRepository`] - Return transaction persistence

pub mod product;
pub mod return_tx;
pub mod sale;

pub use product::ProductRepository;
pub use return_tx::ReturnRepository;
pub use sale::SaleRepository;
