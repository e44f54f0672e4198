//! Local cart commands.
//!
//! A directory stands in for a browsing device: the anonymous identity and
//! every cart live in it as JSON files, exactly as the web storefront keeps
//! them in the session.
//!
//! # Environment Variables
//!
//! Without `--catalog`, products are looked up in the content store:
//!
//! - `CONTENT_PROJECT_ID`, `CONTENT_DATASET`, `CONTENT_API_VERSION`,
//!   `CONTENT_API_TOKEN` - see the storefront configuration
//! - `SHIPPING_FLAT_RATE`, `STOREFRONT_CURRENCY` - used for totals

use std::path::PathBuf;

use clap::Subcommand;
use serde::Serialize;
use thiserror::Error;

use threadline_core::{IdentityKind, ItemKey, ProductId, UserId};
use threadline_storefront::cart::{
    CartContainer, CartError, CartOptions, CartStorage, FileStorage, LineItem, PersistencePolicy,
    StorageError,
};
use threadline_storefront::catalog::{Catalog, CatalogError, ContentClient, Product};
use threadline_storefront::checkout::{CartTotals, CheckoutError, complete_checkout};
use threadline_storefront::config::{CartConfig, ConfigError, ContentStoreConfig};

/// Device key recording which kind of identity used the device last.
const LAST_IDENTITY_KEY: &str = "lastIdentityKind";

/// Errors that can occur during cart commands.
#[derive(Debug, Error)]
pub enum CartCommandError {
    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Device directory could not be opened.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Catalog file could not be read.
    #[error("Failed to read catalog file: {0}")]
    CatalogFile(#[from] std::io::Error),

    /// Catalog file is not a JSON product list, or output failed to encode.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Content store client could not be built.
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Cart operation failed.
    #[error(transparent)]
    Cart(#[from] CartError),

    /// Checkout failed.
    #[error(transparent)]
    Checkout(#[from] CheckoutError),
}

/// Options shared by every cart command.
#[derive(Debug, Clone)]
pub struct CartArgs {
    pub device: PathBuf,
    pub user: Option<String>,
    pub catalog: Option<PathBuf>,
    pub strict: bool,
}

/// Cart operations.
#[derive(Debug, Clone, Subcommand)]
pub enum CartAction {
    /// Print the current cart
    Show,
    /// Add a new line item
    Add {
        /// Product id
        product_id: String,

        /// Quantity
        #[arg(short, long, default_value_t = 1)]
        quantity: u32,

        /// Color option
        #[arg(long)]
        color: String,

        /// Size option
        #[arg(long)]
        size: String,
    },
    /// Set a line item's quantity (0 or less removes it)
    Update {
        /// Item key
        key: String,

        /// New quantity
        #[arg(allow_negative_numbers = true)]
        quantity: i64,
    },
    /// Remove a line item
    Remove {
        /// Item key
        key: String,
    },
    /// Complete a paid checkout (signed-in users only)
    Checkout {
        /// Payment session id
        session_id: String,
    },
}

/// Cart state printed after every command.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartOutput {
    pub identity: String,
    pub authenticated: bool,
    pub cart_id: Option<String>,
    pub items: Vec<LineItem>,
    pub totals: CartTotals,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Load the catalog from a file, or from the content store.
async fn load_catalog(path: Option<&PathBuf>) -> Result<Catalog, CartCommandError> {
    if let Some(path) = path {
        let raw = tokio::fs::read_to_string(path).await?;
        let products: Vec<Product> = serde_json::from_str(&raw)?;
        tracing::debug!(count = products.len(), path = %path.display(), "Loaded catalog file");
        return Ok(Catalog::fixed(products));
    }

    dotenvy::dotenv().ok();
    let config = ContentStoreConfig::from_env()?;
    Ok(Catalog::content(ContentClient::new(&config)?))
}

/// Run a cart command and return the resulting cart state as JSON.
///
/// # Errors
///
/// Returns `CartCommandError` if setup fails or the operation fails. Storage
/// write failures only surface with `--strict`.
pub async fn run(args: &CartArgs, action: CartAction) -> Result<serde_json::Value, CartCommandError> {
    let storage = FileStorage::open(&args.device).await?;
    let catalog = load_catalog(args.catalog.as_ref()).await?;

    dotenvy::dotenv().ok();
    let mut config = CartConfig::from_env()?;
    if args.strict {
        config.persistence = PersistencePolicy::Strict;
    }
    let options = CartOptions {
        persistence: config.persistence,
    };

    let last_kind = storage
        .get(LAST_IDENTITY_KEY)
        .await?
        .and_then(|raw| serde_json::from_str::<IdentityKind>(&raw).ok());

    // Start anonymous when this device is signing in, so the container
    // migrates the anonymous cart.
    let user = args.user.clone().map(UserId::new);
    let mut cart = match (&user, last_kind) {
        (Some(user), Some(IdentityKind::Anonymous)) => {
            let mut cart = CartContainer::initialize(storage, catalog, None, options).await;
            cart.sign_in(user.clone()).await?;
            cart
        }
        _ => CartContainer::initialize(storage, catalog, user, options).await,
    };

    let kind = serde_json::to_string(&cart.identity().kind())?;
    if let Err(e) = cart.storage().set(LAST_IDENTITY_KEY, kind).await {
        tracing::warn!(error = %e, "Failed to record identity kind");
    }

    match action {
        CartAction::Show => {}
        CartAction::Add {
            product_id,
            quantity,
            color,
            size,
        } => {
            let key = cart
                .add_item(&ProductId::new(product_id), quantity, &color, &size)
                .await?;
            tracing::info!(item_key = %key, "Added item");
        }
        CartAction::Update { key, quantity } => {
            if !cart.update_item(&ItemKey::new(key), quantity).await? {
                tracing::warn!("No item with that key");
            }
        }
        CartAction::Remove { key } => {
            if !cart.remove_item(&ItemKey::new(key)).await? {
                tracing::warn!("No item with that key");
            }
        }
        CartAction::Checkout { session_id } => {
            let order = complete_checkout(&mut cart, &session_id, &config).await?;
            return Ok(serde_json::to_value(order)?);
        }
    }

    let output = CartOutput {
        identity: cart.identity().as_str().to_string(),
        authenticated: cart.identity().is_authenticated(),
        cart_id: cart.cart_id().map(|id| id.as_str().to_string()),
        items: cart.items().to_vec(),
        totals: CartTotals::compute(cart.items(), &config),
        error: cart.error().map(String::from),
    };
    Ok(serde_json::to_value(output)?)
}
