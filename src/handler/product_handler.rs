use crate::handler::product_form::ProductForm;
use crate::service::error::ServiceError;
use crate::service::product_service::ProductService;
use axum::{
    Router,
    extract::Path,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use common_http_server::ApiResponse;
use serde_json::Value;

/// Non-numeric ids can never match a row, so they are reported as missing.
fn parse_id(raw: &str) -> Result<i32, ServiceError> {
    raw.trim()
        .parse::<i32>()
        .map_err(|_| ServiceError::product_not_found(raw))
}

pub(crate) fn router(service: ProductService) -> Router {
    let index = service.clone();
    let store = service.clone();
    let show = service.clone();
    let update_put = service.clone();
    let update_patch = service.clone();
    let destroy = service;

    Router::new()
        .route(
            "/products",
            get(move || list_products(index.clone()))
                .post(move |form: ProductForm| create_product(store.clone(), form)),
        )
        .route(
            "/products/{id}",
            get(move |Path(id): Path<String>| show_product(show.clone(), id))
                .put(move |Path(id): Path<String>, form: ProductForm| {
                    update_product(update_put.clone(), id, form)
                })
                .patch(move |Path(id): Path<String>, form: ProductForm| {
                    update_product(update_patch.clone(), id, form)
                })
                .delete(move |Path(id): Path<String>| delete_product(destroy.clone(), id)),
        )
}

async fn list_products(service: ProductService) -> Result<Response, ServiceError> {
    let products = service.list().await?;
    Ok(ApiResponse::success("Success", products).into_response())
}

async fn create_product(
    service: ProductService,
    ProductForm(input): ProductForm,
) -> Result<Response, ServiceError> {
    let created = service.create(input).await?;
    let file_part = created.file_path.display().to_string();

    Ok(ApiResponse::success_with_status(
        "Product created successfully",
        created.product,
        StatusCode::CREATED,
    )
    .with_extra("file_part", file_part)
    .into_response())
}

async fn show_product(service: ProductService, id: String) -> Result<Response, ServiceError> {
    let product = service.get(parse_id(&id)?).await?;
    Ok(ApiResponse::success("Success", product).into_response())
}

async fn update_product(
    service: ProductService,
    id: String,
    ProductForm(input): ProductForm,
) -> Result<Response, ServiceError> {
    let updated = service.update(parse_id(&id)?, input).await?;
    Ok(ApiResponse::success("Product updated successfully", updated).into_response())
}

async fn delete_product(service: ProductService, id: String) -> Result<Response, ServiceError> {
    service.delete(parse_id(&id)?).await?;
    Ok(ApiResponse::<Value>::message_only("Product deleted").into_response())
}
