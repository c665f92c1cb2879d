mod error_mapper;
mod product_form;
pub(crate) mod product_handler;

use crate::service::product_service::ProductService;
use axum::{Router, extract::DefaultBodyLimit};

/// Routes mounted under `/api`. `body_limit` caps every request body in bytes.
pub(crate) fn api_router(service: ProductService, body_limit: usize) -> Router {
    Router::new()
        .merge(product_handler::router(service))
        .layer(DefaultBodyLimit::max(body_limit))
}
