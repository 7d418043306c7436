//! # cedar-core: Pure Transaction Logic for Cedar POS
//!
//! This crate is the **heart** of Cedar POS. It contains the offline-capable
//! transaction core as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Cedar POS Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                       POS Frontend                              │   │
//! │  │    Scan UI ──► Cart UI ──► Tender UI ──► Receipt UI            │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ cedar-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   money   │  │  catalog  │  │   cart    │  │  session  │  │   │
//! │  │   │ USD/LBP   │  │  cache +  │  │  engine + │  │  cash     │  │   │
//! │  │   │ convert   │  │  indexes  │  │  checkout │  │  drawer   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 cedar-sync (Sync Layer)                         │   │
//! │  │    Durable queue, drain loop, connectivity, terminal glue      │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`money`] - Dual-currency money (USD cents / LBP pounds, never floats)
//! - [`types`] - Domain types (ProductSnapshot, Sale, CashMovement, etc.)
//! - [`catalog`] - In-memory product cache with barcode/SKU indexes
//! - [`cart`] - Cart engine with deterministic totals and checkout
//! - [`session`] - Cash-drawer session with expected-cash reconciliation
//! - [`error`] - Domain error types
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: Every total is a fresh fold - same items = same totals
//! 2. **No I/O**: Database, network, file system access is FORBIDDEN here
//! 3. **Integer Money**: Minor units tagged with a currency; floats only at
//!    exchange-rate crossings, rounded half-up once
//! 4. **Offline First**: Nothing in this crate knows whether the network is up
//!
//! ## Example Usage
//!
//! ```rust
//! use cedar_core::money::{Currency, ExchangeRate, Money};
//!
//! // Create money from minor units (never from floats!)
//! let price = Money::usd(1099); // $10.99
//!
//! // Cross the exchange rate exactly once, rounding half-up
//! let rate = ExchangeRate::new(89_500.0).unwrap();
//! let in_lbp = price.convert(Currency::Lbp, rate);
//!
//! assert_eq!(in_lbp.minor(), 983_605); // LL 983,605
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart;
pub mod catalog;
pub mod error;
pub mod money;
pub mod session;
pub mod types;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use cedar_core::Money` instead of
// `use cedar_core::money::Money`

pub use cart::{Cart, CartItem, CartTotals, PaymentInput, StockWarning};
pub use catalog::CatalogCache;
pub use error::{CoreError, CoreResult};
pub use money::{Currency, ExchangeRate, Money, Percent};
pub use session::{Session, SessionStatus};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum distinct lines allowed in a single cart.
///
/// ## Business Reason
/// Prevents runaway carts and keeps receipt printing bounded. A grocery
/// basket tops out well under this; anything larger is a data-entry error.
pub const MAX_CART_LINES: usize = 100;

/// Lebanese VAT in basis points (11%).
///
/// Default tax rate for new carts; overridable per terminal in config.
pub const LEBANESE_VAT_BPS: u32 = 1100;
