//! # Cart Engine
//!
//! Mutable working-set of line items for an in-progress sale.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Cart State Machine                               │
//! │                                                                         │
//! │   Empty ──── add_item() ────► Building ──┬── checkout() ──► CheckedOut │
//! │     ▲                            │       │   (emits Sale,              │
//! │     │                            │       │    cart cleared)            │
//! │     └──────── cancel() ◄─────────┘       └── cancel() ────► Cancelled  │
//! │                                                (cart cleared)          │
//! │                                                                         │
//! │  All other operations (update quantity, remove, discounts, exchange    │
//! │  rate) stay in Building and recompute every total from scratch.        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Deterministic Totals
//! The engine never accumulates floating deltas. Every total is a fresh
//! fold over the current line items, rounded once per currency at the end:
//!
//! ```text
//! line_total = round(unit_price × qty × (1 − line_discount))
//! subtotal   = Σ line_total
//! total      = subtotal − discount_amount + tax_amount
//! total_lbp  = convert(total, LBP, exchange_rate)
//! ```
//!
//! Replaying any recompute over the same item list can never double-count.
//!
//! ## Advisory Stock
//! Adding more than the cached stock of a tracked product *warns* but does
//! not block. Stock is advisory at sale time and reconciled asynchronously;
//! a hard block would stop the register cold whenever the cached figure is
//! stale while offline. Store-level policy, not a bug.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::money::{apply_bps, Currency, ExchangeRate, Money, Percent};
use crate::session::Session;
use crate::types::{
    line_total_minor, PaymentMethod, ProductSnapshot, Sale, SaleItem, SalePayment, SaleStatus,
    SyncStatus,
};
use crate::MAX_CART_LINES;

// =============================================================================
// Cart Item
// =============================================================================

/// A line in the cart.
///
/// ## Price Freezing
/// The unit price is captured (and converted to the cart currency) the
/// moment the product is added. Later catalog or rate changes do not move
/// lines that are already in the cart.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    /// Line identifier, unique within the cart.
    pub line_id: String,

    pub product_id: String,
    pub barcode: Option<String>,
    pub name: String,
    pub name_ar: Option<String>,

    /// Quantity; fractional for weight units.
    pub quantity: f64,

    /// Unit price in minor units of the cart currency (frozen).
    pub unit_price_minor: i64,

    /// Line discount in basis points.
    pub discount_bps: u32,

    /// `round(unit_price × quantity × (1 − discount))`.
    pub line_total_minor: i64,

    #[ts(as = "String")]
    pub added_at: DateTime<Utc>,
}

impl CartItem {
    /// Recomputes the line total from the line's own fields.
    fn recompute(&mut self) {
        self.line_total_minor = line_total_minor(
            self.unit_price_minor,
            self.quantity,
            Percent::from_bps(self.discount_bps),
        );
    }
}

// =============================================================================
// Stock Warning
// =============================================================================

/// Advisory oversell notice returned by [`Cart::add_item`].
///
/// The operation still succeeded; the UI decides whether to surface it.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct StockWarning {
    pub product_id: String,
    pub name: String,
    pub requested: f64,
    pub available: f64,
}

// =============================================================================
// Checkout Input
// =============================================================================

/// Cashier-entered payment for a checkout.
///
/// Tendered and change amounts are per currency; the engine validates that
/// the net received matches the cart total within one minor unit of the
/// cart currency (0.01 USD / 1 LBP).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct PaymentInput {
    pub method: PaymentMethod,
    pub tendered_usd_minor: i64,
    pub tendered_lbp_minor: i64,
    pub change_usd_minor: i64,
    pub change_lbp_minor: i64,
}

impl PaymentInput {
    /// Exact cash payment in the given currency, no change.
    pub fn exact_cash(amount: Money) -> Self {
        let (usd, lbp) = match amount.currency() {
            Currency::Usd => (amount.minor(), 0),
            Currency::Lbp => (0, amount.minor()),
        };
        PaymentInput {
            method: PaymentMethod::Cash,
            tendered_usd_minor: usd,
            tendered_lbp_minor: lbp,
            change_usd_minor: 0,
            change_lbp_minor: 0,
        }
    }
}

/// Snapshot of the cart's computed totals.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CartTotals {
    pub line_count: usize,
    pub total_quantity: f64,
    pub subtotal_minor: i64,
    pub discount_minor: i64,
    pub tax_minor: i64,
    pub total_minor: i64,
    pub currency: Currency,
    pub exchange_rate: f64,
    pub total_lbp_minor: i64,
}

// =============================================================================
// Cart
// =============================================================================

/// The in-progress sale.
///
/// Owned by one UI session; no concurrent-mutation contract. All computed
/// figures are methods, not stored state, so they can never drift from the
/// item list.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub items: Vec<CartItem>,

    pub customer_id: Option<String>,
    pub customer_name: Option<String>,

    /// Cart-level discount in basis points.
    pub discount_bps: u32,

    /// Flat cart-level discount in minor units.
    pub discount_amount_minor: i64,

    /// Tax rate in basis points (1100 = 11% Lebanese VAT).
    pub tax_bps: u32,

    /// Primary currency of this cart.
    pub currency: Currency,

    /// LBP-per-USD rate used for the secondary total.
    pub exchange_rate: ExchangeRate,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Cart {
    /// Creates an empty cart at POS screen entry.
    pub fn new(currency: Currency, exchange_rate: ExchangeRate, tax: Percent) -> Self {
        Cart {
            items: Vec::new(),
            customer_id: None,
            customer_name: None,
            discount_bps: 0,
            discount_amount_minor: 0,
            tax_bps: tax.bps(),
            currency,
            exchange_rate,
            created_at: Utc::now(),
        }
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Adds a product to the cart, merging into an existing line when the
    /// product, frozen price, and discount all match.
    ///
    /// ## Errors
    /// - [`CoreError::InvalidQuantity`] if `quantity` is not finite and > 0
    /// - [`CoreError::CartTooLarge`] past [`MAX_CART_LINES`]
    ///
    /// ## Returns
    /// `Some(StockWarning)` when a tracked product's cached stock does not
    /// cover the total requested quantity. Advisory only - the line was
    /// added either way.
    pub fn add_item(
        &mut self,
        product: &ProductSnapshot,
        quantity: f64,
        discount: Percent,
    ) -> CoreResult<Option<StockWarning>> {
        if !quantity.is_finite() || quantity <= 0.0 {
            return Err(CoreError::InvalidQuantity {
                requested: quantity,
            });
        }

        // Freeze the price in the cart currency at today's rate.
        let unit_price_minor = product
            .selling_price()
            .convert(self.currency, self.exchange_rate)
            .minor();

        let merged = self.items.iter_mut().find(|item| {
            item.product_id == product.id
                && item.unit_price_minor == unit_price_minor
                && item.discount_bps == discount.bps()
        });

        match merged {
            Some(item) => {
                item.quantity += quantity;
                item.recompute();
            }
            None => {
                if self.items.len() >= MAX_CART_LINES {
                    return Err(CoreError::CartTooLarge {
                        max: MAX_CART_LINES,
                    });
                }
                let mut item = CartItem {
                    line_id: Uuid::new_v4().to_string(),
                    product_id: product.id.clone(),
                    barcode: product.barcode.clone(),
                    name: product.name.clone(),
                    name_ar: product.name_ar.clone(),
                    quantity,
                    unit_price_minor,
                    discount_bps: discount.bps(),
                    line_total_minor: 0,
                    added_at: Utc::now(),
                };
                item.recompute();
                self.items.push(item);
            }
        }

        // Advisory oversell check over the whole cart, not just this line.
        if product.track_stock {
            let requested: f64 = self
                .items
                .iter()
                .filter(|i| i.product_id == product.id)
                .map(|i| i.quantity)
                .sum();
            if requested > product.current_stock {
                return Ok(Some(StockWarning {
                    product_id: product.id.clone(),
                    name: product.name.clone(),
                    requested,
                    available: product.current_stock,
                }));
            }
        }

        Ok(None)
    }

    /// Updates a line's quantity. A quantity of exactly zero removes the
    /// line; negative or non-finite values are rejected.
    pub fn update_quantity(&mut self, line_id: &str, quantity: f64) -> CoreResult<()> {
        if quantity == 0.0 {
            return self.remove_item(line_id);
        }
        if !quantity.is_finite() || quantity < 0.0 {
            return Err(CoreError::InvalidQuantity {
                requested: quantity,
            });
        }

        let item = self
            .items
            .iter_mut()
            .find(|i| i.line_id == line_id)
            .ok_or_else(|| CoreError::LineNotFound(line_id.to_string()))?;

        item.quantity = quantity;
        item.recompute();
        Ok(())
    }

    /// Removes a line from the cart.
    pub fn remove_item(&mut self, line_id: &str) -> CoreResult<()> {
        let before = self.items.len();
        self.items.retain(|i| i.line_id != line_id);
        if self.items.len() == before {
            return Err(CoreError::LineNotFound(line_id.to_string()));
        }
        Ok(())
    }

    /// Applies a cart-level percentage discount.
    pub fn apply_discount_percent(&mut self, discount: Percent) {
        self.discount_bps = discount.bps();
    }

    /// Applies a flat cart-level discount in the cart currency.
    pub fn apply_discount_amount(&mut self, amount_minor: i64) -> CoreResult<()> {
        if amount_minor < 0 {
            return Err(CoreError::NegativeCashAmount {
                field: "discount_amount".to_string(),
                amount_minor,
            });
        }
        self.discount_amount_minor = amount_minor;
        Ok(())
    }

    /// Updates the exchange rate used for the LBP total.
    ///
    /// The primary-currency total is untouched; only `total_lbp` moves.
    pub fn set_exchange_rate(&mut self, rate: ExchangeRate) {
        self.exchange_rate = rate;
    }

    /// Attaches a customer reference to the cart.
    pub fn set_customer(&mut self, id: Option<String>, name: Option<String>) {
        self.customer_id = id;
        self.customer_name = name;
    }

    /// Cancels the in-progress sale and empties the cart.
    pub fn cancel(&mut self) {
        self.items.clear();
        self.customer_id = None;
        self.customer_name = None;
        self.discount_bps = 0;
        self.discount_amount_minor = 0;
        self.created_at = Utc::now();
    }

    // =========================================================================
    // Computed Totals (fresh fold every call)
    // =========================================================================

    /// Σ line totals in minor units.
    pub fn subtotal_minor(&self) -> i64 {
        self.items.iter().map(|i| i.line_total_minor).sum()
    }

    /// Cart-level discount: percentage of the subtotal plus the flat amount.
    pub fn discount_total_minor(&self) -> i64 {
        apply_bps(self.subtotal_minor(), self.discount_bps) + self.discount_amount_minor
    }

    /// Tax on the discounted subtotal.
    pub fn tax_minor(&self) -> i64 {
        apply_bps(self.subtotal_minor() - self.discount_total_minor(), self.tax_bps)
    }

    /// Grand total: `subtotal − discount + tax`.
    pub fn total_minor(&self) -> i64 {
        self.subtotal_minor() - self.discount_total_minor() + self.tax_minor()
    }

    /// Grand total converted to LBP at the cart's rate.
    pub fn total_lbp_minor(&self) -> i64 {
        Money::new(self.total_minor(), self.currency)
            .convert(Currency::Lbp, self.exchange_rate)
            .minor()
    }

    /// Checks if the cart has no lines.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Snapshot of all computed figures for the UI.
    pub fn totals(&self) -> CartTotals {
        CartTotals {
            line_count: self.items.len(),
            total_quantity: self.items.iter().map(|i| i.quantity).sum(),
            subtotal_minor: self.subtotal_minor(),
            discount_minor: self.discount_total_minor(),
            tax_minor: self.tax_minor(),
            total_minor: self.total_minor(),
            currency: self.currency,
            exchange_rate: self.exchange_rate.lbp_per_usd(),
            total_lbp_minor: self.total_lbp_minor(),
        }
    }

    // =========================================================================
    // Checkout
    // =========================================================================

    /// Finalizes the cart into an immutable [`Sale`] and empties it.
    ///
    /// ## Validation
    /// - [`CoreError::CartEmpty`] on an empty cart
    /// - [`CoreError::SessionNotOpen`] unless the session is open
    /// - [`CoreError::NegativeCashAmount`] on negative tendered/change
    /// - [`CoreError::PaymentMismatch`] when the net tendered amount,
    ///   converted into the cart currency, differs from the total by more
    ///   than one minor unit
    ///
    /// On success the cart is cleared; the emitted sale carries
    /// `sync_status: pending` and a fresh `local_id` idempotency key.
    /// Checkout is purely local - connectivity never enters into it.
    pub fn checkout(
        &mut self,
        session: &Session,
        receipt_number: impl Into<String>,
        payment: PaymentInput,
    ) -> CoreResult<Sale> {
        if self.items.is_empty() {
            return Err(CoreError::CartEmpty);
        }
        if !session.is_open() {
            return Err(CoreError::SessionNotOpen);
        }
        for (field, amount) in [
            ("tendered_usd", payment.tendered_usd_minor),
            ("tendered_lbp", payment.tendered_lbp_minor),
            ("change_usd", payment.change_usd_minor),
            ("change_lbp", payment.change_lbp_minor),
        ] {
            if amount < 0 {
                return Err(CoreError::NegativeCashAmount {
                    field: field.to_string(),
                    amount_minor: amount,
                });
            }
        }

        let total_minor = self.total_minor();
        let received_minor = self.net_received_minor(&payment);
        let epsilon = self.currency.epsilon_minor();
        if (received_minor - total_minor).abs() > epsilon {
            return Err(CoreError::PaymentMismatch {
                expected_minor: total_minor,
                received_minor,
                currency: self.currency,
            });
        }

        let items = self
            .items
            .iter()
            .map(|i| SaleItem {
                product_id: i.product_id.clone(),
                barcode: i.barcode.clone(),
                name: i.name.clone(),
                name_ar: i.name_ar.clone(),
                quantity: i.quantity,
                unit_price_minor: i.unit_price_minor,
                discount_bps: i.discount_bps,
                line_total_minor: i.line_total_minor,
            })
            .collect();

        let sale = Sale {
            server_id: None,
            local_id: Uuid::new_v4().to_string(),
            receipt_number: receipt_number.into(),
            terminal_id: session.terminal_id.clone(),
            session_local_id: session.local_id.clone(),
            items,
            customer_id: self.customer_id.clone(),
            customer_name: self.customer_name.clone(),
            subtotal_minor: self.subtotal_minor(),
            discount_minor: self.discount_total_minor(),
            tax_minor: self.tax_minor(),
            total_minor,
            currency: self.currency,
            exchange_rate: self.exchange_rate.lbp_per_usd(),
            total_lbp_minor: self.total_lbp_minor(),
            payment: SalePayment {
                method: payment.method,
                tendered_usd_minor: payment.tendered_usd_minor,
                tendered_lbp_minor: payment.tendered_lbp_minor,
                change_usd_minor: payment.change_usd_minor,
                change_lbp_minor: payment.change_lbp_minor,
            },
            status: SaleStatus::Completed,
            void_reason: None,
            cashier_id: session.cashier_id.clone(),
            cashier_name: session.cashier_name.clone(),
            created_at: Utc::now(),
            synced_at: None,
            sync_status: SyncStatus::Pending,
        };

        self.cancel();
        Ok(sale)
    }

    /// Net amount received, converted into the cart currency.
    ///
    /// Each currency leg is converted separately and the two roundings can
    /// drift by at most half a minor unit each - which is exactly why the
    /// payment epsilon is one minor unit.
    fn net_received_minor(&self, payment: &PaymentInput) -> i64 {
        let usd = Money::usd(payment.tendered_usd_minor - payment.change_usd_minor)
            .convert(self.currency, self.exchange_rate)
            .minor();
        let lbp = Money::lbp(payment.tendered_lbp_minor - payment.change_lbp_minor)
            .convert(self.currency, self.exchange_rate)
            .minor();
        usd + lbp
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn rate() -> ExchangeRate {
        ExchangeRate::new(89_500.0).unwrap()
    }

    fn usd_cart() -> Cart {
        Cart::new(Currency::Usd, rate(), Percent::zero())
    }

    fn product(id: &str, price_usd_minor: i64) -> ProductSnapshot {
        ProductSnapshot {
            id: id.to_string(),
            barcode: None,
            sku: None,
            name: format!("Product {id}"),
            name_ar: None,
            category_id: None,
            unit: "piece".to_string(),
            selling_price_minor: price_usd_minor,
            selling_currency: Currency::Usd,
            cost_price_minor: None,
            current_stock: 100.0,
            track_stock: false,
            image_url: None,
        }
    }

    fn session() -> Session {
        Session::open("term-01", "T01", "c1", "Rami", Currency::Usd, 0, 0).unwrap()
    }

    #[test]
    fn test_add_and_merge_lines() {
        let mut cart = usd_cart();
        let coke = product("p1", 150);

        cart.add_item(&coke, 2.0, Percent::zero()).unwrap();
        cart.add_item(&coke, 3.0, Percent::zero()).unwrap();
        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.items[0].quantity, 5.0);
        assert_eq!(cart.subtotal_minor(), 750);

        // Different discount: separate line
        cart.add_item(&coke, 1.0, Percent::from_bps(1000)).unwrap();
        assert_eq!(cart.items.len(), 2);
    }

    #[test]
    fn test_invalid_quantity_rejected() {
        let mut cart = usd_cart();
        let p = product("p1", 100);

        assert!(matches!(
            cart.add_item(&p, 0.0, Percent::zero()),
            Err(CoreError::InvalidQuantity { .. })
        ));
        assert!(cart.add_item(&p, -1.0, Percent::zero()).is_err());
        assert!(cart.add_item(&p, f64::NAN, Percent::zero()).is_err());
        assert!(cart.is_empty());
    }

    #[test]
    fn test_oversell_warns_but_does_not_block() {
        let mut cart = usd_cart();
        let mut scarce = product("p1", 500);
        scarce.track_stock = true;
        scarce.current_stock = 2.0;

        let warning = cart.add_item(&scarce, 5.0, Percent::zero()).unwrap();
        let warning = warning.expect("expected an oversell warning");
        assert_eq!(warning.requested, 5.0);
        assert_eq!(warning.available, 2.0);

        // The line is in the cart regardless
        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.subtotal_minor(), 2500);
    }

    /// Totals are a pure function of the current item list: any sequence
    /// of mutations that ends at the same list yields the same totals.
    #[test]
    fn test_totals_deterministic_over_mutation_order() {
        let a = product("a", 299);
        let b = product("b", 1000);

        let mut cart1 = usd_cart();
        cart1.add_item(&a, 3.0, Percent::zero()).unwrap();
        cart1.add_item(&b, 1.0, Percent::zero()).unwrap();

        let mut cart2 = usd_cart();
        cart2.add_item(&b, 4.0, Percent::zero()).unwrap();
        cart2.add_item(&a, 3.0, Percent::zero()).unwrap();
        let b_line = cart2
            .items
            .iter()
            .find(|i| i.product_id == "b")
            .unwrap()
            .line_id
            .clone();
        cart2.update_quantity(&b_line, 1.0).unwrap();

        assert_eq!(cart1.subtotal_minor(), cart2.subtotal_minor());
        assert_eq!(cart1.total_minor(), cart2.total_minor());
        assert_eq!(
            cart1.subtotal_minor(),
            cart1.items.iter().map(|i| i.line_total_minor).sum::<i64>()
        );

        // Replaying the fold is idempotent
        assert_eq!(cart1.total_minor(), cart1.total_minor());
    }

    #[test]
    fn test_update_quantity_zero_removes() {
        let mut cart = usd_cart();
        cart.add_item(&product("p1", 100), 2.0, Percent::zero()).unwrap();
        let line = cart.items[0].line_id.clone();

        cart.update_quantity(&line, 0.0).unwrap();
        assert!(cart.is_empty());

        assert!(matches!(
            cart.update_quantity("missing", 1.0),
            Err(CoreError::LineNotFound(_))
        ));
    }

    #[test]
    fn test_cart_discount_and_tax() {
        let mut cart = Cart::new(Currency::Usd, rate(), Percent::from_bps(1100)); // 11% VAT
        cart.add_item(&product("p1", 10_000), 1.0, Percent::zero()).unwrap();

        cart.apply_discount_percent(Percent::from_bps(1000)); // 10%
        assert_eq!(cart.subtotal_minor(), 10_000);
        assert_eq!(cart.discount_total_minor(), 1000);
        assert_eq!(cart.tax_minor(), 990); // 11% of $90.00
        assert_eq!(cart.total_minor(), 9990);

        cart.apply_discount_amount(500).unwrap();
        assert_eq!(cart.discount_total_minor(), 1500);
        assert_eq!(cart.total_minor(), 8500 + 935); // 11% of $85.00 = $9.35
    }

    #[test]
    fn test_set_exchange_rate_moves_only_lbp_total() {
        let mut cart = usd_cart();
        cart.add_item(&product("p1", 1000), 1.0, Percent::zero()).unwrap();

        let total_before = cart.total_minor();
        assert_eq!(cart.total_lbp_minor(), 895_000);

        cart.set_exchange_rate(ExchangeRate::new(100_000.0).unwrap());
        assert_eq!(cart.total_minor(), total_before);
        assert_eq!(cart.total_lbp_minor(), 1_000_000);
    }

    #[test]
    fn test_lbp_priced_product_in_usd_cart() {
        let mut cart = usd_cart();
        let mut manoushe = product("p1", 0);
        manoushe.selling_price_minor = 179_000; // LL 179,000
        manoushe.selling_currency = Currency::Lbp;

        cart.add_item(&manoushe, 1.0, Percent::zero()).unwrap();
        // LL 179,000 / 89,500 = $2.00
        assert_eq!(cart.subtotal_minor(), 200);
    }

    #[test]
    fn test_checkout_success_clears_cart() {
        let mut cart = usd_cart();
        cart.add_item(&product("p1", 3000), 1.0, Percent::zero()).unwrap();
        let session = session();

        let sale = cart
            .checkout(&session, "T01-000001", PaymentInput::exact_cash(Money::usd(3000)))
            .unwrap();

        assert_eq!(sale.total_minor, 3000);
        assert_eq!(sale.status, SaleStatus::Completed);
        assert_eq!(sale.sync_status, SyncStatus::Pending);
        assert_eq!(sale.session_local_id, session.local_id);
        assert!(!sale.local_id.is_empty());
        assert!(cart.is_empty());
    }

    #[test]
    fn test_checkout_payment_epsilon() {
        let session = session();

        // Off by one minor unit: allowed
        let mut cart = usd_cart();
        cart.add_item(&product("p1", 3000), 1.0, Percent::zero()).unwrap();
        assert!(cart
            .checkout(&session, "r1", PaymentInput::exact_cash(Money::usd(3001)))
            .is_ok());

        // Off by two minor units: rejected, cart untouched
        let mut cart = usd_cart();
        cart.add_item(&product("p1", 3000), 1.0, Percent::zero()).unwrap();
        let err = cart
            .checkout(&session, "r2", PaymentInput::exact_cash(Money::usd(3002)))
            .unwrap_err();
        assert!(matches!(err, CoreError::PaymentMismatch { .. }));
        assert!(!cart.is_empty());
    }

    #[test]
    fn test_checkout_mixed_currency_tender() {
        let mut cart = usd_cart();
        cart.add_item(&product("p1", 3000), 1.0, Percent::zero()).unwrap();
        let session = session();

        // $20 note + LL 895,000 (= $10.00 at 89,500)
        let payment = PaymentInput {
            method: PaymentMethod::Cash,
            tendered_usd_minor: 2000,
            tendered_lbp_minor: 895_000,
            change_usd_minor: 0,
            change_lbp_minor: 0,
        };
        assert!(cart.checkout(&session, "r1", payment).is_ok());
    }

    #[test]
    fn test_checkout_empty_cart_fails() {
        let mut cart = usd_cart();
        let session = session();
        assert!(matches!(
            cart.checkout(&session, "r1", PaymentInput::exact_cash(Money::usd(0))),
            Err(CoreError::CartEmpty)
        ));
    }

    #[test]
    fn test_checkout_closed_session_fails() {
        let mut cart = usd_cart();
        cart.add_item(&product("p1", 100), 1.0, Percent::zero()).unwrap();

        let mut session = session();
        session.close(0, 0).unwrap();

        assert!(matches!(
            cart.checkout(&session, "r1", PaymentInput::exact_cash(Money::usd(100))),
            Err(CoreError::SessionNotOpen)
        ));
    }

    #[test]
    fn test_cancel_clears_everything() {
        let mut cart = usd_cart();
        cart.add_item(&product("p1", 100), 1.0, Percent::zero()).unwrap();
        cart.set_customer(Some("c9".to_string()), Some("Nour".to_string()));
        cart.apply_discount_percent(Percent::from_bps(500));

        cart.cancel();
        assert!(cart.is_empty());
        assert!(cart.customer_id.is_none());
        assert_eq!(cart.discount_bps, 0);
        assert_eq!(cart.total_minor(), 0);
    }
}
