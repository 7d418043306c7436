//! # Money Module
//!
//! Dual-currency money handling for USD and LBP.
//!
//! ## Why Integer Minor Units?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In JavaScript/floating point:                                          │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Minor Units, Tagged With a Currency              │
//! │    USD is stored in cents   (scale 2):  $10.99   = 1099                │
//! │    LBP is stored in pounds  (scale 0):  LL 45000 = 45000               │
//! │                                                                         │
//! │  Floats appear in exactly one place: crossing an exchange rate.        │
//! │  Every crossing rounds half-up to the target scale, once.              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Conversion Contract
//! Converting a currency to itself is the identity. USD→LBP multiplies by
//! the rate (LBP per 1 USD); LBP→USD divides. The rate must be finite and
//! positive or construction fails with [`CoreError::InvalidExchangeRate`].
//!
//! ## Usage
//! ```rust
//! use cedar_core::money::{Currency, ExchangeRate, Money};
//!
//! let price = Money::usd(1099); // $10.99
//! let rate = ExchangeRate::new(89_500.0).unwrap();
//!
//! let in_lbp = price.convert(Currency::Lbp, rate);
//! assert_eq!(in_lbp.minor(), 983_605); // LL 983,605
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};

// =============================================================================
// Currency
// =============================================================================

/// One of the two currencies handled by the POS.
///
/// ## Fixed Scales
/// - `Usd`: 2 fractional digits (stored in cents)
/// - `Lbp`: 0 fractional digits (stored in whole pounds)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Usd,
    Lbp,
}

impl Currency {
    /// Number of fractional digits for this currency.
    #[inline]
    pub const fn scale(&self) -> u32 {
        match self {
            Currency::Usd => 2,
            Currency::Lbp => 0,
        }
    }

    /// The smallest representable difference, in minor units.
    ///
    /// One minor unit is the payment-matching epsilon from the checkout
    /// contract: 0.01 USD or 1 LBP.
    #[inline]
    pub const fn epsilon_minor(&self) -> i64 {
        1
    }

    /// ISO-style code for display and payloads.
    #[inline]
    pub const fn code(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Lbp => "LBP",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

// =============================================================================
// Exchange Rate
// =============================================================================

/// Exchange rate expressed as LBP per 1 USD.
///
/// ## Validation
/// The rate must be finite and strictly positive. A rate of zero or below
/// (or NaN/infinity from a bad upstream payload) can never be used for
/// conversion, so it is rejected at construction time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(try_from = "f64", into = "f64")]
pub struct ExchangeRate(f64);

impl ExchangeRate {
    /// Creates a validated exchange rate.
    ///
    /// ## Errors
    /// Returns [`CoreError::InvalidExchangeRate`] if the rate is not finite
    /// or is ≤ 0.
    pub fn new(lbp_per_usd: f64) -> CoreResult<Self> {
        if !lbp_per_usd.is_finite() || lbp_per_usd <= 0.0 {
            return Err(CoreError::InvalidExchangeRate { rate: lbp_per_usd });
        }
        Ok(ExchangeRate(lbp_per_usd))
    }

    /// Returns the rate as LBP per 1 USD.
    #[inline]
    pub const fn lbp_per_usd(&self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for ExchangeRate {
    type Error = CoreError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        ExchangeRate::new(value)
    }
}

impl From<ExchangeRate> for f64 {
    fn from(rate: ExchangeRate) -> f64 {
        rate.0
    }
}

impl fmt::Display for ExchangeRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} LBP/USD", self.0)
    }
}

// =============================================================================
// Percent
// =============================================================================

/// A percentage in basis points (bps).
///
/// ## Why Basis Points?
/// 1 basis point = 0.01% = 1/10000, so 1100 bps = 11% (the Lebanese VAT
/// rate). Integer bps keep discount and tax math exact until the single
/// rounding step at the end of each fold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Percent(u32);

impl Percent {
    /// Creates a percentage from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        Percent(bps)
    }

    /// Creates a percentage from a display value (`11.0` = 11%).
    pub fn from_percentage(pct: f64) -> Self {
        Percent((pct * 100.0).round() as u32)
    }

    /// Returns the value in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the display value (`1100` bps → `11.0`).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Zero percent.
    #[inline]
    pub const fn zero() -> Self {
        Percent(0)
    }

    /// Checks if the percentage is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

// =============================================================================
// Rounding Helpers
// =============================================================================

/// Rounds a float to the nearest integer, half away from zero.
///
/// Standard half-up rounding as used by the receipt math: 0.5 → 1,
/// -0.5 → -1. This is the ONLY place a float becomes a minor-unit amount.
pub(crate) fn round_half_up(value: f64) -> i64 {
    if value >= 0.0 {
        (value + 0.5).floor() as i64
    } else {
        -((-value + 0.5).floor() as i64)
    }
}

/// Multiplies a minor-unit amount by basis points, rounding half-up.
///
/// Uses i128 intermediate math so large LBP amounts cannot overflow.
pub(crate) fn apply_bps(minor: i64, bps: u32) -> i64 {
    let scaled = minor as i128 * bps as i128;
    let rounded = if scaled >= 0 {
        (scaled + 5_000) / 10_000
    } else {
        -((-scaled + 5_000) / 10_000)
    };
    rounded as i64
}

// =============================================================================
// Money
// =============================================================================

/// A monetary amount: integer minor units tagged with a currency.
///
/// ## Design Decisions
/// - **i64 (signed)**: negative values represent refunds and shortfalls
/// - **Currency tag**: USD cents and LBP pounds can never be mixed silently
/// - **Copy**: two machine words, cheap to pass around
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money {
    minor: i64,
    currency: Currency,
}

impl Money {
    /// Creates an amount from minor units.
    #[inline]
    pub const fn new(minor: i64, currency: Currency) -> Self {
        Money { minor, currency }
    }

    /// Creates a USD amount from cents.
    ///
    /// ```rust
    /// use cedar_core::money::Money;
    /// let price = Money::usd(1099); // $10.99
    /// assert_eq!(price.minor(), 1099);
    /// ```
    #[inline]
    pub const fn usd(cents: i64) -> Self {
        Money::new(cents, Currency::Usd)
    }

    /// Creates an LBP amount from whole pounds.
    #[inline]
    pub const fn lbp(pounds: i64) -> Self {
        Money::new(pounds, Currency::Lbp)
    }

    /// Zero in the given currency.
    #[inline]
    pub const fn zero(currency: Currency) -> Self {
        Money::new(0, currency)
    }

    /// Returns the amount in minor units.
    #[inline]
    pub const fn minor(&self) -> i64 {
        self.minor
    }

    /// Returns the currency tag.
    #[inline]
    pub const fn currency(&self) -> Currency {
        self.currency
    }

    /// Checks if the amount is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.minor == 0
    }

    /// Checks if the amount is negative.
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.minor < 0
    }

    /// Returns the absolute value.
    #[inline]
    pub const fn abs(&self) -> Self {
        Money::new(self.minor.abs(), self.currency)
    }

    /// Converts this amount to another currency at the given rate.
    ///
    /// ## Contract
    /// - Same currency: identity, no rounding
    /// - USD → LBP: multiply by the rate, round half-up to whole pounds
    /// - LBP → USD: divide by the rate, round half-up to cents
    ///
    /// Round-tripping `USD → LBP → USD` is exact within one rounding unit
    /// for any realistic rate.
    pub fn convert(&self, to: Currency, rate: ExchangeRate) -> Money {
        if self.currency == to {
            return *self;
        }

        let minor = match (self.currency, to) {
            // cents → dollars → pounds
            (Currency::Usd, Currency::Lbp) => {
                round_half_up(self.minor as f64 * rate.lbp_per_usd() / 100.0)
            }
            // pounds → dollars → cents
            (Currency::Lbp, Currency::Usd) => {
                round_half_up(self.minor as f64 * 100.0 / rate.lbp_per_usd())
            }
            _ => unreachable!("same-currency case handled above"),
        };

        Money::new(minor, to)
    }

    /// Returns the given percentage of this amount, rounded half-up.
    ///
    /// ```rust
    /// use cedar_core::money::{Money, Percent};
    /// let subtotal = Money::usd(10_000);                 // $100.00
    /// let vat = subtotal.percent_of(Percent::from_bps(1100)); // 11%
    /// assert_eq!(vat.minor(), 1100);                     // $11.00
    /// ```
    pub fn percent_of(&self, percent: Percent) -> Money {
        Money::new(apply_bps(self.minor, percent.bps()), self.currency)
    }
}

/// Display implementation shows money in a human-readable format.
///
/// ## Note
/// This is for receipts in tests and debug logs. Locale-aware display
/// (Arabic numerals, separators) is handled by the frontend.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.currency {
            Currency::Usd => {
                let sign = if self.minor < 0 { "-" } else { "" };
                write!(f, "{}${}.{:02}", sign, self.minor.abs() / 100, self.minor.abs() % 100)
            }
            Currency::Lbp => write!(f, "LL {}", self.minor),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
