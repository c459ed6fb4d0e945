use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse};
use serde_json::{json, Value};

use super::dto::{OrderResponse, ProductResponse};
use super::error::not_found;
use super::pagination::{content_range, ListQuery};
use super::AppState;
use crate::domain::order::{parse_product_payload, parse_update_payload, OrderError, OrderId};
use crate::domain::product::ProductId;
use crate::store::StoreError;

type ApiResult = Result<HttpResponse, OrderError>;

pub async fn list_orders(state: web::Data<AppState>, query: web::Query<ListQuery>) -> ApiResult {
    let (filter, page) = query.resolve(state.pages)?;
    let found = state.store.list_orders(&filter, page).await?;

    let body: Vec<OrderResponse> = found.orders.iter().map(OrderResponse::from).collect();
    let range = content_range(page, body.len(), found.total);

    Ok(HttpResponse::Ok()
        .insert_header(("Content-Range", range))
        .json(body))
}

pub async fn get_order(state: web::Data<AppState>, path: web::Path<OrderId>) -> ApiResult {
    let order = state.store.get_order(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(OrderResponse::from(&order)))
}

pub async fn create_order(state: web::Data<AppState>, body: web::Json<Value>) -> ApiResult {
    let order = state.composer.create(&body).await?;
    Ok(HttpResponse::Created().json(OrderResponse::from(&order)))
}

pub async fn replace_order(
    state: web::Data<AppState>,
    path: web::Path<OrderId>,
    body: web::Json<Value>,
) -> ApiResult {
    update(state, path.into_inner(), &body, false).await
}

pub async fn patch_order(
    state: web::Data<AppState>,
    path: web::Path<OrderId>,
    body: web::Json<Value>,
) -> ApiResult {
    update(state, path.into_inner(), &body, true).await
}

async fn update(state: web::Data<AppState>, id: OrderId, body: &Value, partial: bool) -> ApiResult {
    let external_id = parse_update_payload(body, partial)?;
    let order = state.commands.update(id, external_id).await?;
    Ok(HttpResponse::Ok().json(OrderResponse::from(&order)))
}

pub async fn delete_order(state: web::Data<AppState>, path: web::Path<OrderId>) -> ApiResult {
    state.commands.delete(path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

pub async fn accept_order(state: web::Data<AppState>, path: web::Path<OrderId>) -> ApiResult {
    let order = state.commands.accept(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(OrderResponse::from(&order)))
}

pub async fn fail_order(state: web::Data<AppState>, path: web::Path<OrderId>) -> ApiResult {
    let order = state.commands.fail(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(OrderResponse::from(&order)))
}

// ============================================================================
// Products
// ============================================================================

pub async fn create_product(state: web::Data<AppState>, body: web::Json<Value>) -> ApiResult {
    let (id, product) = parse_product_payload(&body)?;

    let result = match id {
        Some(id) => state
            .store
            .get_or_create_product(id, &product.name)
            .await
            .map(|stored| (stored, StatusCode::OK)),
        None => state
            .store
            .create_product(product)
            .await
            .map(|stored| (stored, StatusCode::CREATED)),
    };

    match result {
        Ok((product, status)) => {
            tracing::info!(product_id = product.id, name = %product.name, "Product stored");
            Ok(HttpResponse::build(status).json(ProductResponse::from(&product)))
        }
        Err(StoreError::DuplicateProductName(name)) => Err(OrderError::validation(
            "name",
            format!("Product with name \"{name}\" already exists."),
        )),
        Err(err) => Err(err.into()),
    }
}

pub async fn get_product(state: web::Data<AppState>, path: web::Path<ProductId>) -> ApiResult {
    match state.store.get_product(path.into_inner()).await {
        Ok(product) => Ok(HttpResponse::Ok().json(ProductResponse::from(&product))),
        Err(StoreError::ProductNotFound(_)) => Ok(not_found()),
        Err(err) => Err(err.into()),
    }
}

pub async fn delete_product(state: web::Data<AppState>, path: web::Path<ProductId>) -> ApiResult {
    let id = path.into_inner();
    match state.store.delete_product(id).await {
        Ok(()) => {
            tracing::info!(product_id = id, "Product deleted, referencing details keep a null product");
            Ok(HttpResponse::NoContent().finish())
        }
        Err(StoreError::ProductNotFound(_)) => Ok(not_found()),
        Err(err) => Err(err.into()),
    }
}

pub async fn health(state: web::Data<AppState>) -> HttpResponse {
    match state.store.ping().await {
        Ok(()) => HttpResponse::Ok().json(json!({
            "status": "healthy",
            "service": "orders-api"
        })),
        Err(e) => {
            tracing::warn!(error = %e, "Health check failed");
            HttpResponse::ServiceUnavailable().json(json!({
                "status": "unavailable",
                "service": "orders-api"
            }))
        }
    }
}

// ============================================================================
// HTTP Scenario Tests
// ============================================================================
