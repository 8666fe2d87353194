//! # tally-core: Pure Ledger Logic for Tally POS
//!
//! This crate is the **heart** of Tally POS. It contains the entire sale
//! ledger reconciliation engine as pure functions with zero I/O
//! dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tally POS Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                      Callers (API / CLI)                        │   │
//! │  │    create sale ──► record payment ──► process return            │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              tally-db (Transaction Coordinator)                 │   │
//! │  │      optimistic concurrency, SQLite commits, inventory          │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ tally-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   money   │  │  summary  │  │  payment  │  │  netting  │  │   │
//! │  │   │   Money   │  │  replay + │  │   apply   │  │  returns/ │  │   │
//! │  │   │  (cents)  │  │  format   │  │  payment  │  │ exchanges │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO CLOCK • PURE FUNCTIONS              │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Sale, SaleItem, Payment, ReturnTransaction)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`error`] - Domain error types
//! - [`summary`] - Payment summary replay and formatting
//! - [`checkout`] - Tender settlement for new sales
//! - [`payment`] - Payment application against an existing sale
//! - [`netting`] - Return/exchange netting engine
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: Every function is deterministic - same input = same output
//! 2. **No I/O**: Database, network, file system access is FORBIDDEN here
//! 3. **Integer Money**: All monetary values are in cents (i64) to avoid float errors
//! 4. **Explicit Errors**: All errors are typed, never strings or panics
//! 5. **Full Replay**: Payment summaries are always rebuilt from complete
//!    payment history, never patched incrementally
//!
//! ## Example Usage
//!
//! ```rust
//! use tally_core::checkout::{settle_tenders, Tender};
//! use tally_core::money::Money;
//!
//! // Customer owes 1000.00 and hands over 600.00 cash
//! let tender = Tender {
//!     cash_cents: 60_000,
//!     ..Tender::default()
//! };
//! let settlement = settle_tenders(Money::from_cents(100_000), &tender);
//!
//! assert_eq!(settlement.outstanding_cents, 40_000);
//! assert_eq!(
//!     settlement.payment_summary,
//!     "Partial (Cash (600.00)) - Outstanding: 400.00"
//! );
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod checkout;
pub mod error;
pub mod money;
pub mod netting;
pub mod payment;
pub mod summary;
pub mod types;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use tally_core::Money` instead of
// `use tally_core::money::Money`

pub use error::{LedgerError, LedgerResult};
pub use money::Money;
pub use types::*;
