//! Headless content store client.
//!
//! Queries products with GROQ over the store's HTTP query API:
//!
//! ```text
//! GET https://<project>.api.sanity.io/v<version>/data/query/<dataset>?query=...&$category="..."
//! ```
//!
//! Responses are normalized (missing arrays become empty, missing category
//! becomes "Uncategorized", missing stock becomes 0) and cached per filter
//! for 5 minutes.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

use threadline_core::ProductId;

use super::{CatalogError, CatalogLookup, CategoryFilter, Product, UNCATEGORIZED};
use crate::config::ContentStoreConfig;

/// Projection shared by both product queries.
const PRODUCT_PROJECTION: &str = r#"{
  _id,
  name,
  "slug": slug.current,
  "imageUrl": image.asset->url,
  price,
  "category": category->name,
  description,
  material,
  care,
  features,
  colors,
  sizes,
  stock,
  isNew
}"#;

/// Cache TTL for product listings.
const CACHE_TTL: Duration = Duration::from_secs(300);

/// Client for the content store's query API.
///
/// Cheaply cloneable; clones share the HTTP client and cache.
#[derive(Clone)]
pub struct ContentClient {
    inner: Arc<ContentClientInner>,
}

struct ContentClientInner {
    client: reqwest::Client,
    endpoint: Url,
    token: Option<String>,
    cache: Cache<CategoryFilter, Arc<Vec<Product>>>,
}

/// Envelope returned by the query API.
#[derive(Debug, Deserialize)]
struct QueryResponse {
    result: Vec<RawProduct>,
}

/// A product as returned by the query; every projected field may be null.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawProduct {
    #[serde(rename = "_id")]
    id: String,
    name: Option<String>,
    slug: Option<String>,
    price: Option<f64>,
    image_url: Option<String>,
    category: Option<String>,
    description: Option<String>,
    material: Option<String>,
    care: Option<String>,
    features: Option<Vec<String>>,
    colors: Option<Vec<String>>,
    sizes: Option<Vec<String>>,
    stock: Option<i64>,
    is_new: Option<bool>,
}

impl From<RawProduct> for Product {
    fn from(raw: RawProduct) -> Self {
        let price = raw
            .price
            .and_then(|p| Decimal::try_from(p).ok())
            .unwrap_or(Decimal::ZERO);

        Self {
            id: ProductId::new(raw.id),
            name: raw.name.unwrap_or_default(),
            slug: raw.slug,
            price,
            image_url: raw.image_url.unwrap_or_default(),
            category: raw
                .category
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| UNCATEGORIZED.to_string()),
            description: raw.description.unwrap_or_default(),
            material: raw.material.unwrap_or_default(),
            care: raw.care.unwrap_or_default(),
            features: raw.features.unwrap_or_default(),
            colors: raw.colors.unwrap_or_default(),
            sizes: raw.sizes.unwrap_or_default(),
            stock: raw
                .stock
                .and_then(|s| u32::try_from(s).ok())
                .unwrap_or(0),
            is_new: raw.is_new.unwrap_or(false),
        }
    }
}

impl ContentClient {
    /// Create a new content store client.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Url` if the configured project, dataset or API
    /// version do not form a valid URL.
    pub fn new(config: &ContentStoreConfig) -> Result<Self, CatalogError> {
        let cache = Cache::builder()
            .max_capacity(100)
            .time_to_live(CACHE_TTL)
            .build();

        let endpoint = Url::parse(&format!(
            "{}/v{}/data/query/{}",
            config.api_host(),
            config.api_version,
            config.dataset
        ))?;

        Ok(Self {
            inner: Arc::new(ContentClientInner {
                client: reqwest::Client::new(),
                endpoint,
                token: config
                    .api_token
                    .as_ref()
                    .map(|t| t.expose_secret().to_string()),
                cache,
            }),
        })
    }

    /// Build the query URL for a filter.
    fn query_url(&self, filter: &CategoryFilter) -> Result<Url, CatalogError> {
        let mut url = self.inner.endpoint.clone();
        match filter {
            CategoryFilter::All => {
                let query = format!(r#"*[_type == "product"]{PRODUCT_PROJECTION}"#);
                url.query_pairs_mut().append_pair("query", &query);
            }
            CategoryFilter::Category(name) => {
                let query = format!(
                    r#"*[_type == "product" && category->name == $category]{PRODUCT_PROJECTION}"#
                );
                // Query parameters are passed JSON-encoded.
                let param = serde_json::to_string(name)?;
                url.query_pairs_mut()
                    .append_pair("query", &query)
                    .append_pair("$category", &param);
            }
        }
        Ok(url)
    }

    /// List products, serving from cache when possible.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if the request or response parsing fails.
    /// Failures are not cached.
    #[instrument(skip(self))]
    pub async fn fetch_products(
        &self,
        filter: &CategoryFilter,
    ) -> Result<Vec<Product>, CatalogError> {
        if let Some(cached) = self.inner.cache.get(filter).await {
            debug!(count = cached.len(), "Catalog cache hit");
            return Ok(cached.as_ref().clone());
        }

        let products = Arc::new(self.query(filter).await?);
        self.inner
            .cache
            .insert(filter.clone(), Arc::clone(&products))
            .await;

        Ok(products.as_ref().clone())
    }

    /// Run the query against the content store.
    async fn query(&self, filter: &CategoryFilter) -> Result<Vec<Product>, CatalogError> {
        let url = self.query_url(filter)?;

        let mut request = self.inner.client.get(url);
        if let Some(token) = &self.inner.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            tracing::error!(
                status = %status,
                body = %body.chars().take(500).collect::<String>(),
                "Content store returned non-success status"
            );
            return Err(CatalogError::Api {
                status: status.as_u16(),
                message: body.chars().take(200).collect(),
            });
        }

        let parsed: QueryResponse = serde_json::from_str(&body).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %body.chars().take(500).collect::<String>(),
                "Failed to parse content store response"
            );
            CatalogError::Parse(e)
        })?;

        let products: Vec<Product> = parsed.result.into_iter().map(Product::from).collect();
        debug!(count = products.len(), "Fetched products from content store");
        Ok(products)
    }
}

impl CatalogLookup for ContentClient {
    async fn fetch_products(&self, filter: &CategoryFilter) -> Result<Vec<Product>, CatalogError> {
        Self::fetch_products(self, filter).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;

    use super::*;

    fn config() -> ContentStoreConfig {
        ContentStoreConfig {
            project_id: "abc123".to_string(),
            dataset: "production".to_string(),
            api_version: "2023-05-03".to_string(),
            api_token: Some(SecretString::from("tok")),
            use_cdn: false,
        }
    }

    #[test]
    fn test_endpoint() {
        let client = ContentClient::new(&config()).unwrap();
        assert_eq!(
            client.inner.endpoint.as_str(),
            "https://abc123.api.sanity.io/v2023-05-03/data/query/production"
        );
    }

    #[test]
    fn test_query_url_for_category_passes_json_param() {
        let client = ContentClient::new(&config()).unwrap();
        let url = client
            .query_url(&CategoryFilter::Category("Hoodies".to_string()))
            .unwrap();

        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs.len(), 2);
        assert!(pairs[0].1.contains("category->name == $category"));
        assert_eq!(pairs[1], ("$category".to_string(), "\"Hoodies\"".to_string()));
    }

    #[test]
    fn test_query_url_for_all_has_no_params() {
        let client = ContentClient::new(&config()).unwrap();
        let url = client.query_url(&CategoryFilter::All).unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs.len(), 1);
        assert!(pairs[0].1.starts_with(r#"*[_type == "product"]{"#));
    }

    #[test]
    fn test_raw_product_normalization() {
        let raw: QueryResponse = serde_json::from_str(
            r#"{"result": [{
                "_id": "p1",
                "name": "Boxy Tee",
                "slug": null,
                "price": 799,
                "imageUrl": "https://cdn.sanity.io/p1.png",
                "category": null,
                "description": null,
                "material": "Cotton",
                "care": null,
                "features": null,
                "colors": ["Black"],
                "sizes": null,
                "stock": null,
                "isNew": null
            }]}"#,
        )
        .unwrap();

        let product = Product::from(raw.result.into_iter().next().unwrap());
        assert_eq!(product.id.as_str(), "p1");
        assert_eq!(product.price, Decimal::new(799, 0));
        assert_eq!(product.category, UNCATEGORIZED);
        assert_eq!(product.colors, vec!["Black".to_string()]);
        assert!(product.sizes.is_empty());
        assert!(product.features.is_empty());
        assert_eq!(product.stock, 0);
        assert!(!product.is_new);
    }
}
