//! # Domain Types
//!
//! Core domain types used throughout Cedar POS.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │ ProductSnapshot │   │      Sale       │   │  SalePayment    │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id             │   │  local_id       │   │  method         │       │
//! │  │  barcode/sku    │   │  server_id?     │   │  tendered USD   │       │
//! │  │  selling_price  │   │  receipt_number │   │  tendered LBP   │       │
//! │  │  current_stock  │   │  items[]        │   │  change USD/LBP │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │   SaleStatus    │   │   SyncStatus    │   │  CashMovement   │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  Completed      │   │  Pending        │   │  Deposit        │       │
//! │  │  Voided         │   │  Synced         │   │  Withdrawal     │       │
//! │  │  Returned       │   │  Failed         │   │                 │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Locally-created entities carry:
//! - `local_id`: UUID v4 generated client-side at creation. This is the
//!   idempotency key - the server treats repeated submissions with the same
//!   `local_id` as a no-op. Stable across sync, never changes.
//! - `server_id`: assigned by the server, populated only once confirmed.
//!
//! The two are never conflated into one field.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::money::{Currency, Money, Percent};

// =============================================================================
// Product Snapshot
// =============================================================================

/// A read-only cached copy of a sellable product.
///
/// Owned by the external catalog service; the POS holds an immutable
/// snapshot for the duration of a session and refreshes it only by
/// reloading the catalog cache.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ProductSnapshot {
    /// Catalog identifier (server-assigned).
    pub id: String,

    /// Barcode (EAN-13, UPC-A, etc.).
    pub barcode: Option<String>,

    /// Stock Keeping Unit - business identifier.
    pub sku: Option<String>,

    /// Display name shown to cashier and on receipt.
    pub name: String,

    /// Arabic display name for the receipt.
    pub name_ar: Option<String>,

    /// Category reference (reporting concern, opaque here).
    pub category_id: Option<String>,

    /// Sale unit ("piece", "kg", ...). Fractional quantities are legal
    /// for weight units.
    pub unit: String,

    /// Selling price in minor units of `selling_currency`.
    pub selling_price_minor: i64,

    /// Currency the product is priced in.
    pub selling_currency: Currency,

    /// Cost price in minor units (margin reporting, optional).
    pub cost_price_minor: Option<i64>,

    /// Stock level as cached at catalog load. Advisory at sale time.
    pub current_stock: f64,

    /// Whether stock is tracked for this product at all.
    pub track_stock: bool,

    /// Product image for the POS grid.
    pub image_url: Option<String>,
}

impl ProductSnapshot {
    /// Returns the selling price as Money.
    #[inline]
    pub fn selling_price(&self) -> Money {
        Money::new(self.selling_price_minor, self.selling_currency)
    }

    /// Checks whether the cached stock covers the requested quantity.
    ///
    /// This is advisory only: the cart warns on oversell but never blocks,
    /// since the cached figure may be stale while offline.
    pub fn covers_quantity(&self, quantity: f64) -> bool {
        !self.track_stock || self.current_stock >= quantity
    }
}

// =============================================================================
// Sale Status
// =============================================================================

/// The status of a finalized sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    /// Sale has been paid and finalized.
    #[default]
    Completed,
    /// Sale was cancelled after completion.
    Voided,
    /// Goods came back; totals count against returns.
    Returned,
}

impl SaleStatus {
    /// Lowercase wire name, matching the serde representation.
    pub const fn as_str(&self) -> &'static str {
        match self {
            SaleStatus::Completed => "completed",
            SaleStatus::Voided => "voided",
            SaleStatus::Returned => "returned",
        }
    }
}

// =============================================================================
// Sync Status
// =============================================================================

/// Synchronization state of a locally-created record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Created locally, not yet confirmed by the server.
    #[default]
    Pending,
    /// Server confirmed and assigned its id.
    Synced,
    /// Last sync attempt failed; retained for retry.
    Failed,
}

// =============================================================================
// Payment
// =============================================================================

/// How the customer paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Physical cash, possibly mixed USD and LBP notes.
    Cash,
    /// Card on an external terminal.
    Card,
}

/// Dual-currency payment attached to a finalized sale.
///
/// Lebanese registers routinely take USD notes and give LBP change (or the
/// reverse), so tendered and change amounts are tracked per currency.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SalePayment {
    pub method: PaymentMethod,
    /// USD cents handed over by the customer.
    pub tendered_usd_minor: i64,
    /// LBP pounds handed over by the customer.
    pub tendered_lbp_minor: i64,
    /// USD cents returned as change.
    pub change_usd_minor: i64,
    /// LBP pounds returned as change.
    pub change_lbp_minor: i64,
}

impl SalePayment {
    /// Net cash received in USD cents (tendered minus change).
    #[inline]
    pub fn net_usd_minor(&self) -> i64 {
        self.tendered_usd_minor - self.change_usd_minor
    }

    /// Net cash received in LBP pounds (tendered minus change).
    #[inline]
    pub fn net_lbp_minor(&self) -> i64 {
        self.tendered_lbp_minor - self.change_lbp_minor
    }
}

// =============================================================================
// Sale
// =============================================================================

/// A line item in a finalized sale.
/// Uses the snapshot pattern to freeze product data at time of sale.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SaleItem {
    pub product_id: String,
    pub barcode: Option<String>,
    /// Product name at time of sale (frozen).
    pub name: String,
    /// Arabic name at time of sale (frozen).
    pub name_ar: Option<String>,
    /// Quantity sold; fractional for weight units.
    pub quantity: f64,
    /// Unit price in minor units at time of sale (frozen).
    pub unit_price_minor: i64,
    /// Line discount in basis points.
    pub discount_bps: u32,
    /// `round(unit_price × quantity × (1 - discount))` in minor units.
    pub line_total_minor: i64,
}

/// A finalized sale.
///
/// ## Immutability
/// Created atomically from cart + session context at checkout. Immutable
/// thereafter except for `status` transitions (`completed → voided` or
/// `→ returned`) and sync bookkeeping. Never deleted.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Sale {
    /// Server-assigned id, populated once confirmed.
    pub server_id: Option<String>,

    /// Client-generated idempotency key.
    pub local_id: String,

    /// Human-readable receipt number ("T01-000042").
    pub receipt_number: String,

    pub terminal_id: String,

    /// Local id of the session this sale belongs to.
    pub session_local_id: String,

    pub items: Vec<SaleItem>,

    pub customer_id: Option<String>,
    pub customer_name: Option<String>,

    pub subtotal_minor: i64,
    pub discount_minor: i64,
    pub tax_minor: i64,
    pub total_minor: i64,

    /// Primary currency of the sale.
    pub currency: Currency,

    /// LBP-per-USD rate frozen at checkout.
    pub exchange_rate: f64,

    /// `total` converted to LBP at the frozen rate.
    pub total_lbp_minor: i64,

    pub payment: SalePayment,

    pub status: SaleStatus,
    pub void_reason: Option<String>,

    pub cashier_id: String,
    pub cashier_name: String,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "Option<String>")]
    pub synced_at: Option<DateTime<Utc>>,

    pub sync_status: SyncStatus,
}

impl Sale {
    /// Returns the grand total as Money.
    #[inline]
    pub fn total(&self) -> Money {
        Money::new(self.total_minor, self.currency)
    }

    /// Marks the sale as confirmed by the server.
    ///
    /// Only sync bookkeeping changes; amounts stay frozen.
    pub fn confirm_synced(&mut self, server_id: String) {
        self.server_id = Some(server_id);
        self.synced_at = Some(Utc::now());
        self.sync_status = SyncStatus::Synced;
    }

    /// Transitions a completed sale to voided.
    pub fn void(&mut self, reason: String) -> CoreResult<()> {
        if self.status != SaleStatus::Completed {
            return Err(CoreError::InvalidSaleStatus {
                local_id: self.local_id.clone(),
                current_status: self.status.as_str().to_string(),
            });
        }
        self.status = SaleStatus::Voided;
        self.void_reason = Some(reason);
        Ok(())
    }

    /// Transitions a completed sale to returned.
    pub fn mark_returned(&mut self) -> CoreResult<()> {
        if self.status != SaleStatus::Completed {
            return Err(CoreError::InvalidSaleStatus {
                local_id: self.local_id.clone(),
                current_status: self.status.as_str().to_string(),
            });
        }
        self.status = SaleStatus::Returned;
        Ok(())
    }
}

// =============================================================================
// Cash Movement
// =============================================================================

/// Direction of a mid-session cash drawer adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum CashMovementKind {
    /// Cash added to the drawer (float top-up, owner deposit).
    Deposit,
    /// Cash taken out (bank drop, supplier payment).
    Withdrawal,
}

/// A cash drawer adjustment recorded during a session.
///
/// Shifts the session's expected cash for the movement's currency so the
/// close-time reconciliation stays honest.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CashMovement {
    /// Client-generated idempotency key.
    pub local_id: String,

    /// Local id of the owning session.
    pub session_local_id: String,

    pub kind: CashMovementKind,

    /// Amount in minor units of `currency`. Always positive; `kind`
    /// carries the direction.
    pub amount_minor: i64,

    pub currency: Currency,

    /// Free-text reason entered by the cashier.
    pub reason: String,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl CashMovement {
    /// Creates a movement with a fresh local id.
    pub fn new(
        session_local_id: String,
        kind: CashMovementKind,
        amount: Money,
        reason: String,
    ) -> CoreResult<Self> {
        if amount.minor() <= 0 {
            return Err(CoreError::NegativeCashAmount {
                field: "cash_movement_amount".to_string(),
                amount_minor: amount.minor(),
            });
        }
        Ok(CashMovement {
            local_id: Uuid::new_v4().to_string(),
            session_local_id,
            kind,
            amount_minor: amount.minor(),
            currency: amount.currency(),
            reason,
            created_at: Utc::now(),
        })
    }

    /// Signed effect on the drawer: positive for deposits, negative for
    /// withdrawals.
    pub fn signed_minor(&self) -> i64 {
        match self.kind {
            CashMovementKind::Deposit => self.amount_minor,
            CashMovementKind::Withdrawal => -self.amount_minor,
        }
    }
}

// =============================================================================
// Line Total Math
// =============================================================================

/// Computes a line total in minor units.
///
/// `round(unit_price × quantity × (1 − discount))`, rounded half-up once
/// at the end - the single rounding step the cart invariant requires.
pub fn line_total_minor(unit_price_minor: i64, quantity: f64, discount: Percent) -> i64 {
    let gross = unit_price_minor as f64 * quantity;
    let factor = 1.0 - discount.bps() as f64 / 10_000.0;
    crate::money::round_half_up(gross * factor)
}

// =============================================================================
// Unit Tests
// =============================================================================
