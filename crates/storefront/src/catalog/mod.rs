//! Product catalog lookup.
//!
//! # Architecture
//!
//! - The headless content store is the source of truth for products; there is
//!   no local copy beyond a short-lived cache
//! - [`ContentClient`] queries the store over HTTPS (GROQ) and caches results
//!   via `moka` for 5 minutes
//! - [`Catalog::fixed`] serves a static product list (tests, offline CLI)
//!
//! The cart container only needs one thing from the catalog: resolving a
//! product id to its current fields at add time.

mod content;

use std::future::Future;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use threadline_core::ProductId;

pub use content::ContentClient;

/// Category label used when the store has none.
pub const UNCATEGORIZED: &str = "Uncategorized";

/// Errors that can occur when querying the catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Content store returned a non-success status.
    #[error("Content store returned {status}: {message}")]
    Api { status: u16, message: String },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Query URL could not be built.
    #[error("Invalid content store URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Which products to list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum CategoryFilter {
    /// Every product.
    #[default]
    All,
    /// Products whose category name matches exactly.
    Category(String),
}

impl CategoryFilter {
    /// Parse a filter from a user-facing label. `"All"` (any case) and the
    /// empty string select every product.
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        let label = label.trim();
        if label.is_empty() || label.eq_ignore_ascii_case("all") {
            Self::All
        } else {
            Self::Category(label.to_string())
        }
    }

    /// Whether a product passes the filter.
    #[must_use]
    pub fn matches(&self, product: &Product) -> bool {
        match self {
            Self::All => true,
            Self::Category(name) => product.category == *name,
        }
    }
}

/// A catalog product, normalized from the content store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(rename = "_id")]
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    #[serde(default)]
    pub image_url: String,
    #[serde(default = "uncategorized")]
    pub category: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub material: String,
    #[serde(default)]
    pub care: String,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub colors: Vec<String>,
    #[serde(default)]
    pub sizes: Vec<String>,
    #[serde(default)]
    pub stock: u32,
    #[serde(default)]
    pub is_new: bool,
}

fn uncategorized() -> String {
    UNCATEGORIZED.to_string()
}

/// Read access to the product catalog.
pub trait CatalogLookup: Send + Sync {
    /// List products matching `filter`.
    fn fetch_products(
        &self,
        filter: &CategoryFilter,
    ) -> impl Future<Output = Result<Vec<Product>, CatalogError>> + Send;

    /// Resolve a product id against the full catalog.
    fn find_product(
        &self,
        id: &ProductId,
    ) -> impl Future<Output = Result<Option<Product>, CatalogError>> + Send {
        async move {
            let products = self.fetch_products(&CategoryFilter::All).await?;
            Ok(products.into_iter().find(|p| p.id == *id))
        }
    }
}

/// The catalog used by the storefront.
#[derive(Clone)]
pub enum Catalog {
    /// Live content store.
    Content(ContentClient),
    /// Static product list.
    Fixed(Arc<Vec<Product>>),
}

impl Catalog {
    /// Catalog backed by the content store.
    #[must_use]
    pub const fn content(client: ContentClient) -> Self {
        Self::Content(client)
    }

    /// Catalog serving a fixed product list.
    #[must_use]
    pub fn fixed(products: Vec<Product>) -> Self {
        Self::Fixed(Arc::new(products))
    }
}

impl CatalogLookup for Catalog {
    async fn fetch_products(&self, filter: &CategoryFilter) -> Result<Vec<Product>, CatalogError> {
        match self {
            Self::Content(client) => client.fetch_products(filter).await,
            Self::Fixed(products) => Ok(products
                .iter()
                .filter(|p| filter.matches(p))
                .cloned()
                .collect()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn product(id: &str, category: &str, price: i64) -> Product {
        Product {
            id: ProductId::new(id),
            name: format!("Product {id}"),
            slug: Some(id.to_string()),
            price: Decimal::new(price, 0),
            image_url: format!("https://cdn.example.com/{id}.png"),
            category: category.to_string(),
            description: String::new(),
            material: String::new(),
            care: String::new(),
            features: Vec::new(),
            colors: vec!["Black".to_string(), "White".to_string()],
            sizes: vec!["S".to_string(), "M".to_string(), "L".to_string()],
            stock: 10,
            is_new: false,
        }
    }

    #[test]
    fn test_filter_from_label() {
        assert_eq!(CategoryFilter::from_label("All"), CategoryFilter::All);
        assert_eq!(CategoryFilter::from_label(" all "), CategoryFilter::All);
        assert_eq!(CategoryFilter::from_label(""), CategoryFilter::All);
        assert_eq!(
            CategoryFilter::from_label("Hoodies"),
            CategoryFilter::Category("Hoodies".to_string())
        );
    }

    #[tokio::test]
    async fn test_fixed_catalog_filters_by_exact_category() {
        let catalog = Catalog::fixed(vec![
            product("p1", "Hoodies", 100),
            product("p2", "T-Shirts", 50),
            product("p3", "Hoodies Limited", 150),
        ]);

        let hoodies = catalog
            .fetch_products(&CategoryFilter::Category("Hoodies".to_string()))
            .await
            .unwrap();
        assert_eq!(hoodies.len(), 1);
        assert_eq!(hoodies[0].id.as_str(), "p1");

        let all = catalog.fetch_products(&CategoryFilter::All).await.unwrap();
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn test_find_product() {
        let catalog = Catalog::fixed(vec![product("p1", "Hoodies", 100)]);
        let found = catalog.find_product(&ProductId::new("p1")).await.unwrap();
        assert_eq!(found.map(|p| p.name), Some("Product p1".to_string()));

        let missing = catalog.find_product(&ProductId::new("nope")).await.unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn test_product_without_category_is_uncategorized() {
        let product: Product =
            serde_json::from_str(r#"{"_id": "p9", "name": "Scarf", "price": 40}"#).unwrap();
        assert_eq!(product.category, UNCATEGORIZED);
        assert!(CategoryFilter::Category(UNCATEGORIZED.to_string()).matches(&product));
    }
}
