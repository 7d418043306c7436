//! # Catalog Cache
//!
//! In-memory, client-held snapshot of sellable products.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Catalog Cache Lifecycle                            │
//! │                                                                         │
//! │  POS screen entry                                                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  GET products + GET exchange-rate/current   (external catalog service) │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  CatalogCache::load(products, rate, as_of)                             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  get() / by_barcode() / by_sku() lookups for the whole session         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Refreshed ONLY by reloading - snapshots are immutable in between      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The cache does not own the catalog; it holds a read-only copy so the
//! register keeps scanning and selling while the network is down.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::error::{CoreError, CoreResult};
use crate::money::ExchangeRate;
use crate::types::ProductSnapshot;

// =============================================================================
// Catalog Cache
// =============================================================================

/// Client-held snapshot of the product catalog plus the current exchange
/// rate.
#[derive(Debug, Clone)]
pub struct CatalogCache {
    /// Products keyed by catalog id.
    by_id: HashMap<String, ProductSnapshot>,

    /// barcode → product id.
    barcode_index: HashMap<String, String>,

    /// sku → product id.
    sku_index: HashMap<String, String>,

    /// LBP-per-USD rate delivered alongside the catalog.
    rate: ExchangeRate,

    /// When the rate was published.
    rate_as_of: DateTime<Utc>,
}

impl CatalogCache {
    /// Builds a cache from a full catalog load.
    ///
    /// Replaces any previous snapshot wholesale; there is no incremental
    /// merge. Duplicate barcodes/skus keep the last occurrence, matching
    /// the upstream catalog's own dedup behavior.
    pub fn load(
        products: Vec<ProductSnapshot>,
        rate: ExchangeRate,
        rate_as_of: DateTime<Utc>,
    ) -> Self {
        let mut by_id = HashMap::with_capacity(products.len());
        let mut barcode_index = HashMap::new();
        let mut sku_index = HashMap::new();

        for product in products {
            if let Some(barcode) = &product.barcode {
                barcode_index.insert(barcode.clone(), product.id.clone());
            }
            if let Some(sku) = &product.sku {
                sku_index.insert(sku.clone(), product.id.clone());
            }
            by_id.insert(product.id.clone(), product);
        }

        CatalogCache {
            by_id,
            barcode_index,
            sku_index,
            rate,
            rate_as_of,
        }
    }

    /// Looks up a product by catalog id.
    pub fn get(&self, id: &str) -> Option<&ProductSnapshot> {
        self.by_id.get(id)
    }

    /// Looks up a product by barcode (the scanner path).
    pub fn by_barcode(&self, barcode: &str) -> Option<&ProductSnapshot> {
        self.barcode_index.get(barcode).and_then(|id| self.by_id.get(id))
    }

    /// Looks up a product by SKU.
    pub fn by_sku(&self, sku: &str) -> Option<&ProductSnapshot> {
        self.sku_index.get(sku).and_then(|id| self.by_id.get(id))
    }

    /// Iterates over all cached products (POS grid rendering).
    pub fn products(&self) -> impl Iterator<Item = &ProductSnapshot> {
        self.by_id.values()
    }

    /// Number of cached products.
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// True when no catalog has been loaded.
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// The exchange rate delivered with this catalog load.
    pub fn exchange_rate(&self) -> ExchangeRate {
        self.rate
    }

    /// When the exchange rate was published.
    pub fn rate_as_of(&self) -> DateTime<Utc> {
        self.rate_as_of
    }

    /// Replaces the exchange rate without reloading products.
    ///
    /// Used when the rate endpoint refreshes more often than the catalog.
    pub fn set_exchange_rate(&mut self, rate: ExchangeRate, as_of: DateTime<Utc>) {
        self.rate = rate;
        self.rate_as_of = as_of;
    }

    /// Links a barcode to an existing product in the local cache.
    ///
    /// Used when the cashier resolves an unknown barcode at the register.
    /// The link must also reach the catalog service through the sync
    /// queue; this only makes the barcode scannable locally right away.
    pub fn link_barcode(&mut self, product_id: &str, barcode: impl Into<String>) -> CoreResult<()> {
        let barcode = barcode.into();
        let product = self
            .by_id
            .get_mut(product_id)
            .ok_or_else(|| CoreError::ProductNotFound(product_id.to_string()))?;
        if product.barcode.is_none() {
            product.barcode = Some(barcode.clone());
        }
        self.barcode_index.insert(barcode, product_id.to_string());
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Currency;

    fn product(id: &str, barcode: Option<&str>, sku: Option<&str>) -> ProductSnapshot {
        ProductSnapshot {
            id: id.to_string(),
            barcode: barcode.map(String::from),
            sku: sku.map(String::from),
            name: format!("Product {id}"),
            name_ar: None,
            category_id: None,
            unit: "piece".to_string(),
            selling_price_minor: 1000,
            selling_currency: Currency::Usd,
            cost_price_minor: None,
            current_stock: 10.0,
            track_stock: true,
            image_url: None,
        }
    }

    fn cache() -> CatalogCache {
        CatalogCache::load(
            vec![
                product("p1", Some("628000000011"), Some("COKE-330")),
                product("p2", None, Some("BREAD")),
                product("p3", Some("628000000028"), None),
            ],
            ExchangeRate::new(89_500.0).unwrap(),
            Utc::now(),
        )
    }

    #[test]
    fn test_lookup_by_id_barcode_sku() {
        let cache = cache();
        assert_eq!(cache.len(), 3);

        assert_eq!(cache.get("p2").unwrap().id, "p2");
        assert_eq!(cache.by_barcode("628000000011").unwrap().id, "p1");
        assert_eq!(cache.by_sku("BREAD").unwrap().id, "p2");

        assert!(cache.get("missing").is_none());
        assert!(cache.by_barcode("000").is_none());
    }

    #[test]
    fn test_reload_replaces_snapshot() {
        let cache = CatalogCache::load(
            vec![product("p9", None, None)],
            ExchangeRate::new(1507.5).unwrap(),
            Utc::now(),
        );
        assert_eq!(cache.len(), 1);
        assert!(cache.get("p1").is_none());
        assert_eq!(cache.exchange_rate().lbp_per_usd(), 1507.5);
    }

    #[test]
    fn test_link_barcode() {
        let mut cache = cache();

        // p2 has no barcode yet; link one and scan it
        cache.link_barcode("p2", "628000000099").unwrap();
        assert_eq!(cache.by_barcode("628000000099").unwrap().id, "p2");
        assert_eq!(
            cache.get("p2").unwrap().barcode.as_deref(),
            Some("628000000099")
        );

        assert!(matches!(
            cache.link_barcode("missing", "123"),
            Err(CoreError::ProductNotFound(_))
        ));
    }

    #[test]
    fn test_set_exchange_rate_only() {
        let mut cache = cache();
        let as_of = Utc::now();
        cache.set_exchange_rate(ExchangeRate::new(90_000.0).unwrap(), as_of);

        assert_eq!(cache.exchange_rate().lbp_per_usd(), 90_000.0);
        assert_eq!(cache.len(), 3); // products untouched
    }
}
