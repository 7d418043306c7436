//! # Session Engine
//!
//! One cashier's open/close lifecycle at a terminal.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Session State Machine                             │
//! │                                                                         │
//! │   Closed(none) ──── open() ────► Open ──── close() ────► Closed(final) │
//! │                                   │                                     │
//! │                                   │ record_sale()                       │
//! │                                   │ record_cash_movement()              │
//! │                                   ▼                                     │
//! │                          running totals +                              │
//! │                          expected cash per currency                    │
//! │                                                                         │
//! │  Only one Open session may exist per terminal. That rule is enforced  │
//! │  by the external session service - this engine fails gracefully with  │
//! │  SessionAlreadyOpen when the server rejects an open request, and      │
//! │  never assumes the invariant locally.                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Cash Reconciliation
//! `expected_cash = opening_cash + Σ(cash sales) − Σ(cash refunds)` per
//! currency; `difference = closing_cash − expected_cash`, computed only at
//! close. Network failure during open/close never rolls back local state -
//! the session stays `sync_status: pending` and is queued for later
//! reconciliation. A successful sync fills in the server id without
//! touching cashier-entered cash figures.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::money::{Currency, ExchangeRate, Money};
use crate::types::{CashMovement, PaymentMethod, Sale, SaleStatus, SyncStatus};

// =============================================================================
// Session Status
// =============================================================================

/// Lifecycle status of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Open,
    Closed,
}

// =============================================================================
// Session
// =============================================================================

/// One cashier-terminal-shift.
///
/// Carries the dual-key identity pattern: `local_id` is generated at open
/// so callers have a stable reference before the server confirms;
/// `server_id` arrives with the sync ack. Closed sessions are retained for
/// audit, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub server_id: Option<String>,
    pub local_id: String,

    pub terminal_id: String,
    pub terminal_code: String,
    pub cashier_id: String,
    pub cashier_name: String,

    /// Base currency for the running sales totals.
    pub currency: Currency,

    #[ts(as = "String")]
    pub opened_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub closed_at: Option<DateTime<Utc>>,

    pub opening_cash_usd_minor: i64,
    pub opening_cash_lbp_minor: i64,
    pub closing_cash_usd_minor: Option<i64>,
    pub closing_cash_lbp_minor: Option<i64>,
    pub expected_cash_usd_minor: i64,
    pub expected_cash_lbp_minor: i64,
    pub difference_usd_minor: Option<i64>,
    pub difference_lbp_minor: Option<i64>,

    /// Σ completed sale totals, in the session's base currency.
    pub total_sales_minor: i64,
    /// Σ returned sale totals, in the session's base currency.
    pub total_returns_minor: i64,
    pub total_transactions: u32,

    pub status: SessionStatus,
    pub sync_status: SyncStatus,
}

impl Session {
    /// Opens a new session.
    ///
    /// Assigns `local_id` immediately so the caller has a stable reference
    /// even before the server confirms.
    ///
    /// ## Errors
    /// [`CoreError::NegativeCashAmount`] if either opening amount is < 0.
    pub fn open(
        terminal_id: impl Into<String>,
        terminal_code: impl Into<String>,
        cashier_id: impl Into<String>,
        cashier_name: impl Into<String>,
        currency: Currency,
        opening_cash_usd_minor: i64,
        opening_cash_lbp_minor: i64,
    ) -> CoreResult<Self> {
        if opening_cash_usd_minor < 0 {
            return Err(CoreError::NegativeCashAmount {
                field: "opening_cash_usd".to_string(),
                amount_minor: opening_cash_usd_minor,
            });
        }
        if opening_cash_lbp_minor < 0 {
            return Err(CoreError::NegativeCashAmount {
                field: "opening_cash_lbp".to_string(),
                amount_minor: opening_cash_lbp_minor,
            });
        }

        Ok(Session {
            server_id: None,
            local_id: Uuid::new_v4().to_string(),
            terminal_id: terminal_id.into(),
            terminal_code: terminal_code.into(),
            cashier_id: cashier_id.into(),
            cashier_name: cashier_name.into(),
            currency,
            opened_at: Utc::now(),
            closed_at: None,
            opening_cash_usd_minor,
            opening_cash_lbp_minor,
            closing_cash_usd_minor: None,
            closing_cash_lbp_minor: None,
            // The drawer starts at the opening float.
            expected_cash_usd_minor: opening_cash_usd_minor,
            expected_cash_lbp_minor: opening_cash_lbp_minor,
            difference_usd_minor: None,
            difference_lbp_minor: None,
            total_sales_minor: 0,
            total_returns_minor: 0,
            total_transactions: 0,
            status: SessionStatus::Open,
            sync_status: SyncStatus::Pending,
        })
    }

    /// True while the session accepts sales.
    #[inline]
    pub fn is_open(&self) -> bool {
        self.status == SessionStatus::Open
    }

    /// Records a finalized sale into the running totals.
    ///
    /// ## Caller Contract
    /// Must be called exactly once per finalized sale. Callers must not
    /// re-apply on sync retry - idempotency is keyed by `sale.local_id`
    /// at the call site, not here.
    ///
    /// Completed sales increment `total_sales` (converted to the session's
    /// base currency) and `total_transactions`; returned sales increment
    /// `total_returns` instead. Cash payments shift the expected drawer
    /// contents per currency by the net tendered amounts; a returned sale
    /// carries its original payment record, and its cash net leaves the
    /// drawer with the refund.
    pub fn record_sale(&mut self, sale: &Sale, rate: ExchangeRate) -> CoreResult<()> {
        if !self.is_open() {
            return Err(CoreError::SessionNotOpen);
        }

        let converted = sale.total().convert(self.currency, rate);
        let is_return = sale.status == SaleStatus::Returned;
        if is_return {
            self.total_returns_minor += converted.minor().abs();
        } else {
            self.total_sales_minor += converted.minor();
            self.total_transactions += 1;
        }

        if sale.payment.method == PaymentMethod::Cash {
            // Refunds hand the sale's original cash net back out.
            let sign = if is_return { -1 } else { 1 };
            self.expected_cash_usd_minor += sign * sale.payment.net_usd_minor();
            self.expected_cash_lbp_minor += sign * sale.payment.net_lbp_minor();
        }

        Ok(())
    }

    /// Applies a mid-session drawer adjustment to the expected cash.
    pub fn record_cash_movement(&mut self, movement: &CashMovement) -> CoreResult<()> {
        if !self.is_open() {
            return Err(CoreError::SessionNotOpen);
        }

        match movement.currency {
            Currency::Usd => self.expected_cash_usd_minor += movement.signed_minor(),
            Currency::Lbp => self.expected_cash_lbp_minor += movement.signed_minor(),
        }

        Ok(())
    }

    /// Closes the session against the cashier's counted drawer.
    ///
    /// Computes `difference = closing − expected` per currency and marks
    /// the session closed. The close still has to reach the server, so
    /// `sync_status` drops back to pending.
    ///
    /// ## Errors
    /// - [`CoreError::SessionNotOpen`] if already closed
    /// - [`CoreError::NegativeCashAmount`] if a counted amount is < 0
    pub fn close(
        &mut self,
        closing_cash_usd_minor: i64,
        closing_cash_lbp_minor: i64,
    ) -> CoreResult<()> {
        if !self.is_open() {
            return Err(CoreError::SessionNotOpen);
        }
        if closing_cash_usd_minor < 0 {
            return Err(CoreError::NegativeCashAmount {
                field: "closing_cash_usd".to_string(),
                amount_minor: closing_cash_usd_minor,
            });
        }
        if closing_cash_lbp_minor < 0 {
            return Err(CoreError::NegativeCashAmount {
                field: "closing_cash_lbp".to_string(),
                amount_minor: closing_cash_lbp_minor,
            });
        }

        self.closing_cash_usd_minor = Some(closing_cash_usd_minor);
        self.closing_cash_lbp_minor = Some(closing_cash_lbp_minor);
        self.difference_usd_minor = Some(closing_cash_usd_minor - self.expected_cash_usd_minor);
        self.difference_lbp_minor = Some(closing_cash_lbp_minor - self.expected_cash_lbp_minor);
        self.closed_at = Some(Utc::now());
        self.status = SessionStatus::Closed;
        self.sync_status = SyncStatus::Pending;

        Ok(())
    }

    /// Reconciles the server-assigned id after a successful sync.
    ///
    /// Cashier-entered cash figures are never altered here.
    pub fn confirm_synced(&mut self, server_id: String) {
        self.server_id = Some(server_id);
        self.sync_status = SyncStatus::Synced;
    }

    /// Expected drawer contents as Money, per currency.
    pub fn expected_cash(&self) -> (Money, Money) {
        (
            Money::usd(self.expected_cash_usd_minor),
            Money::lbp(self.expected_cash_lbp_minor),
        )
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
