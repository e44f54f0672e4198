//! Integration tests for Threadline.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p threadline-integration-tests
//! ```
//!
//! No external services are needed: the storefront router runs in-process
//! over a `tower_sessions::MemoryStore` and a fixed product catalog.
//!
//! # Test Categories
//!
//! - `cart_container` - Cart container behavior over device storage
//! - `storefront_api` - JSON API flows through the full router

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde_json::Value;
use tower::ServiceExt;
use tower_sessions::MemoryStore;

use threadline_core::ProductId;
use threadline_storefront::catalog::{Catalog, Product};
use threadline_storefront::config::{
    CartConfig, ContentStoreConfig, DEFAULT_AUTH_HEADER, StorefrontConfig,
};
use threadline_storefront::state::AppState;

/// Response body size limit for tests.
const BODY_LIMIT: usize = 1024 * 1024;

/// A catalog product fixture.
#[must_use]
pub fn product(id: &str, name: &str, price: i64, category: &str) -> Product {
    Product {
        id: ProductId::new(id),
        name: name.to_string(),
        slug: Some(id.to_string()),
        price: Decimal::new(price, 0),
        image_url: format!("https://cdn.example.com/{id}.png"),
        category: category.to_string(),
        description: String::new(),
        material: "Cotton".to_string(),
        care: String::new(),
        features: Vec::new(),
        colors: vec!["Black".to_string(), "White".to_string()],
        sizes: vec!["S".to_string(), "M".to_string(), "L".to_string()],
        stock: 10,
        is_new: false,
    }
}

/// The fixed catalog used across tests.
#[must_use]
pub fn catalog() -> Catalog {
    Catalog::fixed(vec![
        product("p1", "Boxy Tee", 100, "T-Shirts"),
        product("p2", "Heavy Hoodie", 250, "Hoodies"),
        product("p3", "Cargo Pants", 180, "Bottoms"),
    ])
}

/// Storefront configuration that touches no external service.
#[must_use]
pub fn test_config(cart: CartConfig) -> StorefrontConfig {
    StorefrontConfig {
        database_url: SecretString::from("postgres://unused"),
        host: std::net::IpAddr::from([127, 0, 0, 1]),
        port: 3000,
        base_url: "http://localhost:3000".to_string(),
        auth_header: DEFAULT_AUTH_HEADER.to_string(),
        content: ContentStoreConfig {
            project_id: "test".to_string(),
            dataset: "test".to_string(),
            api_version: "2023-05-03".to_string(),
            api_token: None,
            use_cdn: false,
        },
        cart,
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 0.0,
        sentry_traces_sample_rate: 0.0,
    }
}

/// A response's status and JSON (or string) body.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

/// One browser talking to an in-process storefront.
///
/// Keeps the session cookie between requests. Clone the router into several
/// clients to simulate several browsers sharing one session store.
pub struct TestClient {
    router: Router,
    cookie: Option<String>,
    user: Option<String>,
}

impl TestClient {
    /// A fresh browser against a fresh storefront with default cart settings.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(CartConfig::default())
    }

    /// A fresh browser against a fresh storefront.
    #[must_use]
    pub fn with_config(cart: CartConfig) -> Self {
        let state = AppState::new(test_config(cart), catalog());
        Self::with_router(threadline_storefront::app(state, MemoryStore::default()))
    }

    /// A fresh browser (no cookie, signed out) against `router`.
    #[must_use]
    pub fn with_router(router: Router) -> Self {
        Self {
            router,
            cookie: None,
            user: None,
        }
    }

    /// Sign in as `user` (sent via the trusted header), or sign out.
    pub fn set_user(&mut self, user: Option<&str>) {
        self.user = user.map(String::from);
    }

    /// Forget the session cookie, as if the browser storage was cleared.
    pub fn clear_cookies(&mut self) {
        self.cookie = None;
    }

    /// Send a request and keep any session cookie the server sets.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be built or the router fails.
    #[allow(clippy::unwrap_used)]
    pub async fn request(&mut self, method: Method, uri: &str, body: Option<Value>) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = &self.cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        if let Some(user) = &self.user {
            builder = builder.header(DEFAULT_AUTH_HEADER, user);
        }

        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();

        if let Some(set_cookie) = response.headers().get(header::SET_COOKIE) {
            let pair = set_cookie.to_str().unwrap().split(';').next().unwrap();
            self.cookie = Some(pair.to_string());
        }

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), BODY_LIMIT)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));

        TestResponse { status, body }
    }

    /// `GET uri`.
    pub async fn get(&mut self, uri: &str) -> TestResponse {
        self.request(Method::GET, uri, None).await
    }

    /// `POST uri` with a JSON body.
    pub async fn post(&mut self, uri: &str, body: Value) -> TestResponse {
        self.request(Method::POST, uri, Some(body)).await
    }
}

impl Default for TestClient {
    fn default() -> Self {
        Self::new()
    }
}
