//! Product catalog route handlers.

use axum::{
    Json,
    extract::{Query, State},
};
use serde::Deserialize;
use tracing::instrument;

use crate::catalog::{CatalogLookup, CategoryFilter, Product};
use crate::error::Result;
use crate::state::AppState;

/// Product listing query parameters.
#[derive(Debug, Deserialize)]
pub struct ProductsQuery {
    /// Category name; omitted or `All` lists everything.
    pub category: Option<String>,
}

/// List catalog products, optionally filtered by category.
#[instrument(skip(state))]
pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<ProductsQuery>,
) -> Result<Json<Vec<Product>>> {
    let filter = query
        .category
        .as_deref()
        .map_or(CategoryFilter::All, CategoryFilter::from_label);

    let products = state.catalog().fetch_products(&filter).await?;
    tracing::debug!(count = products.len(), ?filter, "Listed products");
    Ok(Json(products))
}
