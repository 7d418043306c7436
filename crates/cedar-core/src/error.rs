//! # Error Types
//!
//! Domain-specific error types for cedar-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  cedar-core errors (this file)                                         │
//! │  └── CoreError   - Validation and state-machine violations             │
//! │                                                                         │
//! │  cedar-sync errors (separate crate)                                    │
//! │  └── SyncError   - Transport, persistence, and queue failures          │
//! │                                                                         │
//! │  Propagation policy:                                                   │
//! │  • CoreError is rejected synchronously at the call site                │
//! │  • SyncError is captured on the queue item, never thrown back at      │
//! │    the cashier - a checkout must succeed locally regardless of         │
//! │    connectivity                                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (amounts, ids)
//! 3. Errors are enum variants, never String

use thiserror::Error;

use crate::money::Currency;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// These errors represent business rule violations or domain state-machine
/// failures. They should be caught and translated to user-facing messages.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Line quantity must be strictly positive and finite.
    #[error("Invalid quantity: {requested}")]
    InvalidQuantity { requested: f64 },

    /// Exchange rate must be finite and > 0.
    #[error("Invalid exchange rate: {rate} (must be finite and > 0)")]
    InvalidExchangeRate { rate: f64 },

    /// Tendered payment does not match the cart total within the
    /// currency's rounding epsilon (0.01 USD / 1 LBP).
    #[error("Payment mismatch: expected {expected_minor} {currency}, received {received_minor}")]
    PaymentMismatch {
        expected_minor: i64,
        received_minor: i64,
        currency: Currency,
    },

    /// Operation requires an open session.
    ///
    /// ## When This Occurs
    /// - Closing a session that is already closed
    /// - Recording a sale against a closed session
    /// - Completing a checkout before a session was opened
    #[error("No open session for this operation")]
    SessionNotOpen,

    /// A session is already open on this terminal, or the session service
    /// rejected an open request because one exists server-side.
    #[error("A session is already open on terminal {terminal_id}")]
    SessionAlreadyOpen { terminal_id: String },

    /// Checkout of an empty cart.
    #[error("Cart is empty")]
    CartEmpty,

    /// Cart line not found.
    #[error("Cart line not found: {0}")]
    LineNotFound(String),

    /// Product cannot be found in the catalog cache.
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Opening/closing cash amounts must be ≥ 0.
    #[error("{field} must be >= 0, got {amount_minor}")]
    NegativeCashAmount { field: String, amount_minor: i64 },

    /// Cart has exceeded maximum allowed lines.
    #[error("Cart cannot have more than {max} lines")]
    CartTooLarge { max: usize },

    /// Sale is not in a state that allows the requested transition.
    #[error("Sale {local_id} is {current_status}, cannot perform operation")]
    InvalidSaleStatus {
        local_id: String,
        current_status: String,
    },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
