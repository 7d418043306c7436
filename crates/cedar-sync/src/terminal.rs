//! # Terminal
//!
//! Glue layer binding the pure cedar-core engines to the sync queue and
//! the receipt hardware. One `Terminal` per register.
//!
//! ## Sale Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Complete-Sale Flow                                │
//! │                                                                         │
//! │  scan() ──► cart.add_item ──► complete_sale(payment)                   │
//! │                                   │                                     │
//! │                                   ▼                                     │
//! │                            cart.checkout  ── validation error? reject  │
//! │                                   │                                     │
//! │                                   ▼                                     │
//! │                          queue.enqueue(sale)  ── DURABLE from here     │
//! │                                   │                                     │
//! │                                   ▼                                     │
//! │                          session.record_sale                           │
//! │                                   │                                     │
//! │                                   ▼                                     │
//! │                   hardware print + drawer (failures WARN, never fail   │
//! │                   the sale - the record is already safe in the queue)  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything above is synchronous and local. Connectivity never enters
//! into a sale; the agent ships the queue later.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use cedar_core::{
    Cart, CartTotals, CashMovement, CashMovementKind, CatalogCache, CoreError, ExchangeRate,
    Money, PaymentInput, PaymentMethod, Percent, ProductSnapshot, Sale, Session, StockWarning,
};

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::queue::{EntityKind, QueueAction, SyncQueue};
use crate::transport::SendAck;

// =============================================================================
// Receipt Hardware
// =============================================================================

/// Printer and cash drawer seam.
///
/// Hardware failures are non-fatal by contract: the sale is already
/// durable when these run, so the terminal logs and carries on.
pub trait ReceiptHardware: Send + Sync {
    /// Prints a receipt for the finalized sale.
    fn print_receipt(&self, sale: &Sale) -> SyncResult<()>;

    /// Kicks the cash drawer open.
    fn open_drawer(&self) -> SyncResult<()>;
}

/// No-op hardware for tests and kiosks without a printer.
pub struct NoOpHardware;

impl ReceiptHardware for NoOpHardware {
    fn print_receipt(&self, _sale: &Sale) -> SyncResult<()> {
        Ok(())
    }

    fn open_drawer(&self) -> SyncResult<()> {
        Ok(())
    }
}

// =============================================================================
// Barcode Link
// =============================================================================

/// A cashier-resolved barcode→product association, queued so the catalog
/// service learns what the register already knows.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BarcodeLink {
    /// Client-generated idempotency key.
    pub local_id: String,
    pub product_id: String,
    pub barcode: String,
}

// =============================================================================
// Terminal
// =============================================================================

/// One register: catalog cache, in-progress cart, open session, and the
/// day's sales, wired to the durable sync queue.
pub struct Terminal {
    config: SyncConfig,
    catalog: Option<CatalogCache>,
    cart: Option<Cart>,
    session: Option<Session>,

    /// Sales completed since startup, kept for void/return and for
    /// reconciling server ids from drain acks.
    sales: Vec<Sale>,

    queue: Arc<SyncQueue>,
    hardware: Arc<dyn ReceiptHardware>,

    /// Receipt sequence, reset per process run. The terminal code plus
    /// the sale's `local_id` keep receipts globally unambiguous anyway.
    receipt_seq: u64,
}

impl Terminal {
    pub fn new(
        config: SyncConfig,
        queue: Arc<SyncQueue>,
        hardware: Arc<dyn ReceiptHardware>,
    ) -> Self {
        Terminal {
            config,
            catalog: None,
            cart: None,
            session: None,
            sales: Vec::new(),
            queue,
            hardware,
            receipt_seq: 0,
        }
    }

    // =========================================================================
    // Catalog
    // =========================================================================

    /// Installs a fresh catalog snapshot and exchange rate.
    ///
    /// An in-progress cart keeps its frozen line prices; only its LBP
    /// display total follows the new rate.
    pub fn load_catalog(
        &mut self,
        products: Vec<ProductSnapshot>,
        rate: ExchangeRate,
        rate_as_of: DateTime<Utc>,
    ) {
        info!(products = products.len(), rate = %rate, "Catalog loaded");
        self.catalog = Some(CatalogCache::load(products, rate, rate_as_of));
        if let Some(cart) = &mut self.cart {
            cart.set_exchange_rate(rate);
        }
    }

    /// Updates the exchange rate without reloading products.
    pub fn update_exchange_rate(&mut self, rate: ExchangeRate, as_of: DateTime<Utc>) {
        if let Some(catalog) = &mut self.catalog {
            catalog.set_exchange_rate(rate, as_of);
        }
        if let Some(cart) = &mut self.cart {
            cart.set_exchange_rate(rate);
        }
    }

    pub fn catalog(&self) -> Option<&CatalogCache> {
        self.catalog.as_ref()
    }

    /// Links an unknown barcode to an existing product: scannable locally
    /// at once, queued for the catalog service.
    pub fn link_barcode(
        &mut self,
        product_id: &str,
        barcode: impl Into<String>,
    ) -> SyncResult<()> {
        let barcode = barcode.into();
        let catalog = self
            .catalog
            .as_mut()
            .ok_or_else(|| SyncError::InvalidConfig("No catalog loaded".into()))?;
        catalog.link_barcode(product_id, barcode.clone())?;

        let link = BarcodeLink {
            local_id: Uuid::new_v4().to_string(),
            product_id: product_id.to_string(),
            barcode: barcode.clone(),
        };
        self.queue.enqueue(
            EntityKind::BarcodeLink,
            link.local_id.clone(),
            QueueAction::Create,
            &link,
        )?;

        info!(product_id, barcode = %barcode, "Barcode linked");
        Ok(())
    }

    // =========================================================================
    // Cart
    // =========================================================================

    fn catalog_ref(&self) -> SyncResult<&CatalogCache> {
        self.catalog
            .as_ref()
            .ok_or_else(|| SyncError::InvalidConfig("No catalog loaded".into()))
    }

    fn ensure_cart(&mut self) -> SyncResult<()> {
        if self.cart.is_none() {
            let rate = self.catalog_ref()?.exchange_rate();
            self.cart = Some(Cart::new(
                self.config.terminal.currency,
                rate,
                Percent::from_bps(self.config.terminal.tax_bps),
            ));
        }
        Ok(())
    }

    /// Scanner path: looks up the barcode and adds one unit.
    pub fn scan(&mut self, barcode: &str) -> SyncResult<Option<StockWarning>> {
        let product = self
            .catalog_ref()?
            .by_barcode(barcode)
            .ok_or_else(|| CoreError::ProductNotFound(barcode.to_string()))?
            .clone();
        self.add_product_snapshot(&product, 1.0, Percent::zero())
    }

    /// Grid/search path: adds a product by catalog id.
    pub fn add_product(
        &mut self,
        product_id: &str,
        quantity: f64,
        discount: Percent,
    ) -> SyncResult<Option<StockWarning>> {
        let product = self
            .catalog_ref()?
            .get(product_id)
            .ok_or_else(|| CoreError::ProductNotFound(product_id.to_string()))?
            .clone();
        self.add_product_snapshot(&product, quantity, discount)
    }

    fn add_product_snapshot(
        &mut self,
        product: &ProductSnapshot,
        quantity: f64,
        discount: Percent,
    ) -> SyncResult<Option<StockWarning>> {
        self.ensure_cart()?;
        let cart = self.cart.as_mut().ok_or(CoreError::CartEmpty)?;
        let warning = cart.add_item(product, quantity, discount)?;
        if let Some(w) = &warning {
            warn!(
                product = %w.name,
                requested = w.requested,
                available = w.available,
                "Oversell warning"
            );
        }
        Ok(warning)
    }

    /// Mutable access to the in-progress cart (discounts, quantity edits).
    pub fn cart_mut(&mut self) -> SyncResult<&mut Cart> {
        self.ensure_cart()?;
        self.cart.as_mut().ok_or_else(|| CoreError::CartEmpty.into())
    }

    /// Current cart totals for the display, zeroed when no cart exists.
    pub fn cart_totals(&self) -> Option<CartTotals> {
        self.cart.as_ref().map(|c| c.totals())
    }

    /// Abandons the in-progress sale.
    pub fn cancel_sale(&mut self) {
        if let Some(cart) = &mut self.cart {
            cart.cancel();
        }
    }

    // =========================================================================
    // Session
    // =========================================================================

    /// Opens the day's cash session and queues it for sync.
    pub fn open_session(
        &mut self,
        cashier_id: impl Into<String>,
        cashier_name: impl Into<String>,
        opening_cash_usd_minor: i64,
        opening_cash_lbp_minor: i64,
    ) -> SyncResult<Session> {
        if self.session.as_ref().is_some_and(|s| s.is_open()) {
            return Err(CoreError::SessionAlreadyOpen {
                terminal_id: self.config.terminal.id.clone(),
            }
            .into());
        }

        let session = Session::open(
            self.config.terminal.id.clone(),
            self.config.terminal.code.clone(),
            cashier_id.into(),
            cashier_name.into(),
            self.config.terminal.currency,
            opening_cash_usd_minor,
            opening_cash_lbp_minor,
        )?;

        self.queue.enqueue(
            EntityKind::Session,
            session.local_id.clone(),
            QueueAction::Create,
            &session,
        )?;

        info!(session = %session.local_id, cashier = %session.cashier_name, "Session opened");
        self.session = Some(session.clone());
        Ok(session)
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Closes the session against the counted drawer and queues the
    /// update for sync.
    pub fn close_session(
        &mut self,
        closing_cash_usd_minor: i64,
        closing_cash_lbp_minor: i64,
    ) -> SyncResult<Session> {
        let session = self.session.as_mut().ok_or(CoreError::SessionNotOpen)?;
        session.close(closing_cash_usd_minor, closing_cash_lbp_minor)?;

        self.queue.enqueue(
            EntityKind::Session,
            session.local_id.clone(),
            QueueAction::Update,
            session,
        )?;

        info!(
            session = %session.local_id,
            difference_usd = ?session.difference_usd_minor,
            difference_lbp = ?session.difference_lbp_minor,
            "Session closed"
        );
        Ok(session.clone())
    }

    /// Records a drawer deposit or withdrawal and queues it for sync.
    pub fn record_cash_movement(
        &mut self,
        kind: CashMovementKind,
        amount: Money,
        reason: impl Into<String>,
    ) -> SyncResult<CashMovement> {
        let session = self
            .session
            .as_mut()
            .filter(|s| s.is_open())
            .ok_or(CoreError::SessionNotOpen)?;

        let movement =
            CashMovement::new(session.local_id.clone(), kind, amount, reason.into())?;
        session.record_cash_movement(&movement)?;

        self.queue.enqueue(
            EntityKind::CashMovement,
            movement.local_id.clone(),
            QueueAction::Create,
            &movement,
        )?;

        Ok(movement)
    }

    // =========================================================================
    // Sales
    // =========================================================================

    /// Finalizes the cart into a sale: checkout, session totals, durable
    /// queue, then hardware.
    ///
    /// The sale exists and survives a crash the moment `enqueue` returns;
    /// printer or drawer trouble is logged and swallowed.
    pub fn complete_sale(&mut self, payment: PaymentInput) -> SyncResult<Sale> {
        let session = self
            .session
            .as_mut()
            .filter(|s| s.is_open())
            .ok_or(CoreError::SessionNotOpen)?;
        let cart = self.cart.as_mut().ok_or(CoreError::CartEmpty)?;

        let receipt_number =
            format!("{}-{:06}", self.config.terminal.code, self.receipt_seq + 1);
        let sale = cart.checkout(session, receipt_number, payment)?;

        // The outbox write comes before the session totals: a failed
        // enqueue rejects the whole sale instead of leaving totals for a
        // record that was never queued.
        self.queue.enqueue(
            EntityKind::Sale,
            sale.local_id.clone(),
            QueueAction::Create,
            &sale,
        )?;

        let rate = ExchangeRate::new(sale.exchange_rate)?;
        session.record_sale(&sale, rate)?;
        self.receipt_seq += 1;

        info!(
            receipt = %sale.receipt_number,
            total = %sale.total(),
            "Sale completed"
        );

        if let Err(e) = self.hardware.print_receipt(&sale) {
            warn!(receipt = %sale.receipt_number, error = %e, "Receipt print failed");
        }
        if sale.payment.method == PaymentMethod::Cash {
            if let Err(e) = self.hardware.open_drawer() {
                warn!(error = %e, "Cash drawer failed to open");
            }
        }

        self.sales.push(sale.clone());
        Ok(sale)
    }

    /// Voids a completed sale and queues the status update.
    pub fn void_sale(&mut self, local_id: &str, reason: impl Into<String>) -> SyncResult<()> {
        let sale = self
            .sales
            .iter_mut()
            .find(|s| s.local_id == local_id)
            .ok_or_else(|| CoreError::LineNotFound(local_id.to_string()))?;
        sale.void(reason.into())?;

        self.queue.enqueue(
            EntityKind::Sale,
            sale.local_id.clone(),
            QueueAction::Update,
            sale,
        )?;
        Ok(())
    }

    /// Marks a completed sale as returned and rolls it into the session's
    /// return totals.
    pub fn return_sale(&mut self, local_id: &str) -> SyncResult<Sale> {
        let sale = self
            .sales
            .iter_mut()
            .find(|s| s.local_id == local_id)
            .ok_or_else(|| CoreError::LineNotFound(local_id.to_string()))?;
        sale.mark_returned()?;
        let sale = sale.clone();

        if let Some(session) = self.session.as_mut().filter(|s| s.is_open()) {
            let rate = ExchangeRate::new(sale.exchange_rate)?;
            session.record_sale(&sale, rate)?;
        }

        self.queue.enqueue(
            EntityKind::Sale,
            sale.local_id.clone(),
            QueueAction::Update,
            &sale,
        )?;
        Ok(sale)
    }

    /// The day's completed sales (receipt reprint, void picker).
    pub fn sales(&self) -> &[Sale] {
        &self.sales
    }

    // =========================================================================
    // Ack Reconciliation
    // =========================================================================

    /// Applies server acknowledgements from a drain pass: matches on the
    /// entity's `local_id` and stores the server id.
    pub fn reconcile_acks(&mut self, acks: &[SendAck]) {
        for ack in acks {
            let Some(server_id) = &ack.server_id else {
                continue;
            };

            if let Some(sale) = self.sales.iter_mut().find(|s| s.local_id == ack.entity_id) {
                sale.confirm_synced(server_id.clone());
                continue;
            }
            if let Some(session) = self
                .session
                .as_mut()
                .filter(|s| s.local_id == ack.entity_id)
            {
                session.confirm_synced(server_id.clone());
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use cedar_core::{Currency, SaleStatus, SyncStatus};

    fn product(id: &str, barcode: &str, price_usd_minor: i64) -> ProductSnapshot {
        ProductSnapshot {
            id: id.to_string(),
            barcode: Some(barcode.to_string()),
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

    fn terminal() -> Terminal {
        let mut config = SyncConfig::default();
        config.terminal.code = "T01".to_string();
        config.terminal.tax_bps = 0; // keep test arithmetic readable

        let queue = Arc::new(SyncQueue::load(Arc::new(MemoryStore::new()), &config).unwrap());
        let mut terminal = Terminal::new(config, queue, Arc::new(NoOpHardware));
        terminal.load_catalog(
            vec![
                product("p1", "628000000011", 150),
                product("p2", "628000000028", 1000),
            ],
            ExchangeRate::new(89_500.0).unwrap(),
            Utc::now(),
        );
        terminal
    }

    #[test]
    fn test_scan_unknown_barcode() {
        let mut terminal = terminal();
        let err = terminal.scan("000").unwrap_err();
        assert!(matches!(
            err,
            SyncError::Core(CoreError::ProductNotFound(_))
        ));
    }

    #[test]
    fn test_link_barcode_makes_product_scannable() {
        let mut terminal = terminal();
        assert!(terminal.scan("628000000099").is_err());

        terminal.link_barcode("p2", "628000000099").unwrap();
        terminal.open_session("c1", "Rami", 0, 0).unwrap();
        terminal.scan("628000000099").unwrap();
        assert_eq!(terminal.cart_totals().unwrap().total_minor, 1000);

        // link + session create in the queue
        assert_eq!(terminal.queue.stats().unwrap().pending, 2);
    }

    #[test]
    fn test_full_sale_flow_queues_everything() {
        let mut terminal = terminal();

        terminal.open_session("c1", "Rami", 10_000, 0).unwrap();
        terminal.scan("628000000011").unwrap(); // $1.50
        terminal.scan("628000000011").unwrap(); // merge to qty 2
        assert_eq!(terminal.cart_totals().unwrap().total_minor, 300);

        let sale = terminal
            .complete_sale(PaymentInput::exact_cash(Money::usd(300)))
            .unwrap();
        assert_eq!(sale.receipt_number, "T01-000001");
        assert_eq!(sale.total_minor, 300);

        // Cart resets; session totals moved
        assert!(terminal.cart_totals().unwrap().line_count == 0);
        let session = terminal.session().unwrap();
        assert_eq!(session.total_sales_minor, 300);
        assert_eq!(session.expected_cash_usd_minor, 10_300);

        // Queue holds the session open and the sale
        let stats = terminal.queue.stats().unwrap();
        assert_eq!(stats.pending, 2);
    }

    #[test]
    fn test_receipt_numbers_increment() {
        let mut terminal = terminal();
        terminal.open_session("c1", "Rami", 0, 0).unwrap();

        for expected in ["T01-000001", "T01-000002"] {
            terminal.scan("628000000028").unwrap();
            let sale = terminal
                .complete_sale(PaymentInput::exact_cash(Money::usd(1000)))
                .unwrap();
            assert_eq!(sale.receipt_number, expected);
        }
    }

    #[test]
    fn test_sale_requires_open_session() {
        let mut terminal = terminal();
        terminal.scan("628000000011").unwrap();

        let err = terminal
            .complete_sale(PaymentInput::exact_cash(Money::usd(150)))
            .unwrap_err();
        assert!(matches!(err, SyncError::Core(CoreError::SessionNotOpen)));
    }

    #[test]
    fn test_double_open_rejected() {
        let mut terminal = terminal();
        terminal.open_session("c1", "Rami", 0, 0).unwrap();
        let err = terminal.open_session("c2", "Nour", 0, 0).unwrap_err();
        assert!(matches!(
            err,
            SyncError::Core(CoreError::SessionAlreadyOpen { .. })
        ));

        // Close, then a new open is fine
        terminal.close_session(0, 0).unwrap();
        terminal.open_session("c2", "Nour", 0, 0).unwrap();
    }

    #[test]
    fn test_cash_movement_flows_to_session_and_queue() {
        let mut terminal = terminal();
        terminal.open_session("c1", "Rami", 10_000, 0).unwrap();

        terminal
            .record_cash_movement(
                CashMovementKind::Withdrawal,
                Money::usd(2_000),
                "bank drop",
            )
            .unwrap();

        assert_eq!(terminal.session().unwrap().expected_cash_usd_minor, 8_000);
        // session create + movement
        assert_eq!(terminal.queue.stats().unwrap().pending, 2);
    }

    #[test]
    fn test_return_sale_updates_session() {
        let mut terminal = terminal();
        terminal.open_session("c1", "Rami", 0, 0).unwrap();
        terminal.scan("628000000028").unwrap();
        let sale = terminal
            .complete_sale(PaymentInput::exact_cash(Money::usd(1000)))
            .unwrap();
        assert_eq!(terminal.session().unwrap().expected_cash_usd_minor, 1000);

        let returned = terminal.return_sale(&sale.local_id).unwrap();
        assert_eq!(returned.status, SaleStatus::Returned);
        assert_eq!(terminal.session().unwrap().total_returns_minor, 1000);
        // The refund left the drawer where it started
        assert_eq!(terminal.session().unwrap().expected_cash_usd_minor, 0);

        // Returning twice is a status violation
        assert!(terminal.return_sale(&sale.local_id).is_err());
    }

    #[test]
    fn test_void_sale() {
        let mut terminal = terminal();
        terminal.open_session("c1", "Rami", 0, 0).unwrap();
        terminal.scan("628000000011").unwrap();
        let sale = terminal
            .complete_sale(PaymentInput::exact_cash(Money::usd(150)))
            .unwrap();

        terminal.void_sale(&sale.local_id, "wrong item").unwrap();
        assert_eq!(terminal.sales()[0].status, SaleStatus::Voided);
        assert_eq!(
            terminal.sales()[0].void_reason.as_deref(),
            Some("wrong item")
        );
    }

    #[test]
    fn test_reconcile_acks_sets_server_ids() {
        let mut terminal = terminal();
        let session = terminal.open_session("c1", "Rami", 0, 0).unwrap();
        terminal.scan("628000000011").unwrap();
        let sale = terminal
            .complete_sale(PaymentInput::exact_cash(Money::usd(150)))
            .unwrap();

        terminal.reconcile_acks(&[
            SendAck {
                entity_id: sale.local_id.clone(),
                server_id: Some("srv-sale-9".to_string()),
            },
            SendAck {
                entity_id: session.local_id.clone(),
                server_id: Some("srv-sess-4".to_string()),
            },
        ]);

        assert_eq!(terminal.sales()[0].server_id.as_deref(), Some("srv-sale-9"));
        assert_eq!(terminal.sales()[0].sync_status, SyncStatus::Synced);
        assert_eq!(
            terminal.session().unwrap().server_id.as_deref(),
            Some("srv-sess-4")
        );
    }

    /// Full offline day: sale lands while offline, connectivity returns,
    /// the agent drains, and the terminal reconciles server ids.
    #[tokio::test]
    async fn test_offline_sale_syncs_on_reconnect() {
        use crate::agent::{NoOpEmitter, SyncAgent};
        use crate::connectivity::connectivity_channel;
        use crate::queue::QueueItem;
        use async_trait::async_trait;
        use std::time::Duration;

        struct OkTransport;

        #[async_trait]
        impl crate::transport::SyncTransport for OkTransport {
            async fn send(&self, item: &QueueItem) -> SyncResult<SendAck> {
                Ok(SendAck {
                    entity_id: item.entity_id.clone(),
                    server_id: Some(format!("srv-{}", item.entity_id)),
                })
            }
        }

        let mut terminal = terminal();
        terminal.open_session("c1", "Rami", 0, 0).unwrap();
        terminal.scan("628000000011").unwrap();
        let sale = terminal
            .complete_sale(PaymentInput::exact_cash(Money::usd(150)))
            .unwrap();

        let (conn, watcher) = connectivity_channel(false);
        let handle = SyncAgent::spawn(
            terminal.queue.clone(),
            Arc::new(OkTransport),
            watcher,
            &terminal.config,
            Arc::new(NoOpEmitter),
        );

        assert_eq!(handle.stats().unwrap().pending, 2);
        conn.set_online(true);

        for _ in 0..200 {
            if handle.stats().unwrap().total() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(handle.stats().unwrap().total(), 0);

        // The host feeds the drain acks back; here we feed them directly
        terminal.reconcile_acks(&[SendAck {
            entity_id: sale.local_id.clone(),
            server_id: Some(format!("srv-{}", sale.local_id)),
        }]);
        assert!(terminal.sales()[0].server_id.is_some());

        handle.shutdown().await;
    }

    /// A printer on fire must not lose the sale.
    struct BrokenHardware;

    impl ReceiptHardware for BrokenHardware {
        fn print_receipt(&self, _sale: &Sale) -> SyncResult<()> {
            Err(SyncError::Hardware("printer offline".into()))
        }
        fn open_drawer(&self) -> SyncResult<()> {
            Err(SyncError::Hardware("drawer jammed".into()))
        }
    }

    /// Store that rejects writes once its quota is spent, like a disk
    /// that filled up mid-shift.
    struct QuotaStore {
        inner: MemoryStore,
        writes_left: std::sync::atomic::AtomicUsize,
    }

    impl QuotaStore {
        fn with_writes(writes: usize) -> Self {
            QuotaStore {
                inner: MemoryStore::new(),
                writes_left: std::sync::atomic::AtomicUsize::new(writes),
            }
        }
    }

    impl crate::storage::KeyValueStore for QuotaStore {
        fn get(&self, key: &str) -> SyncResult<Option<String>> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> SyncResult<()> {
            use std::sync::atomic::Ordering;
            if self
                .writes_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_err()
            {
                return Err(SyncError::Persistence("disk full".into()));
            }
            self.inner.set(key, value)
        }

        fn remove(&self, key: &str) -> SyncResult<()> {
            self.inner.remove(key)
        }
    }

    /// If the outbox write fails, the sale is rejected before the session
    /// totals move - no phantom revenue for a record that was never
    /// queued.
    #[test]
    fn test_enqueue_failure_rejects_sale_before_session_totals() {
        let mut config = SyncConfig::default();
        config.terminal.tax_bps = 0;

        // One write covers the session create; the sale's write fails
        let store = Arc::new(QuotaStore::with_writes(1));
        let queue = Arc::new(SyncQueue::load(store, &config).unwrap());
        let mut terminal = Terminal::new(config, queue, Arc::new(NoOpHardware));
        terminal.load_catalog(
            vec![product("p1", "628000000011", 150)],
            ExchangeRate::new(89_500.0).unwrap(),
            Utc::now(),
        );

        terminal.open_session("c1", "Rami", 10_000, 0).unwrap();
        terminal.scan("628000000011").unwrap();

        let err = terminal
            .complete_sale(PaymentInput::exact_cash(Money::usd(150)))
            .unwrap_err();
        assert!(matches!(err, SyncError::Persistence(_)));

        let session = terminal.session().unwrap();
        assert_eq!(session.total_sales_minor, 0);
        assert_eq!(session.total_transactions, 0);
        assert_eq!(session.expected_cash_usd_minor, 10_000);
        assert!(terminal.sales().is_empty());
        // Only the session create remains queued
        assert_eq!(terminal.queue.stats().unwrap().pending, 1);
    }

    #[test]
    fn test_hardware_failure_does_not_fail_sale() {
        let mut config = SyncConfig::default();
        config.terminal.tax_bps = 0;
        let queue = Arc::new(SyncQueue::load(Arc::new(MemoryStore::new()), &config).unwrap());
        let mut terminal = Terminal::new(config, queue, Arc::new(BrokenHardware));
        terminal.load_catalog(
            vec![product("p1", "628000000011", 150)],
            ExchangeRate::new(89_500.0).unwrap(),
            Utc::now(),
        );

        terminal.open_session("c1", "Rami", 0, 0).unwrap();
        terminal.scan("628000000011").unwrap();

        let sale = terminal.complete_sale(PaymentInput::exact_cash(Money::usd(150)));
        assert!(sale.is_ok());
        assert_eq!(terminal.queue.stats().unwrap().pending, 2);
    }
}
