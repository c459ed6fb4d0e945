// Private module declarations
mod dto;
mod error;
mod handlers;
mod middleware;
mod pagination;

use std::sync::Arc;

use actix_web::middleware::{from_fn, NormalizePath};
use actix_web::{web, App, HttpServer};

use crate::config::PageSettings;
use crate::domain::order::{OrderCommandHandler, OrderComposer};
use crate::metrics::Metrics;
use crate::store::OrderStore;

// ============================================================================
// REST API - Orders
// ============================================================================
//
// GET    /orders              list (filters + limit/offset, Content-Range)
// POST   /orders              create with nested details          → 201
// GET    /orders/{id}         fetch one                           → 200 / 404
// PUT    /orders/{id}         replace external_id (only "new")    → 200 / 405
// PATCH  /orders/{id}         partial update (only "new")         → 200 / 405
// DELETE /orders/{id}         delete unless "accepted"            → 204 / 405
// POST   /orders/{id}/accept  new → accepted                      → 200 / 405
// POST   /orders/{id}/fail    new → failed                        → 200 / 405
// POST   /products            create (201), or get-or-create with an id (200)
// GET    /products/{id}       fetch one                           → 200 / 404
// DELETE /products/{id}       delete, details keep a null product → 204 / 404
// GET    /health              store liveness                      → 200 / 503
//
// ============================================================================

/// Shared state handed to every handler.
pub struct AppState {
    pub store: Arc<dyn OrderStore>,
    pub commands: OrderCommandHandler,
    pub composer: OrderComposer,
    pub metrics: Arc<Metrics>,
    pub pages: PageSettings,
}

impl AppState {
    pub fn new(store: Arc<dyn OrderStore>, metrics: Arc<Metrics>, pages: PageSettings) -> Self {
        Self {
            commands: OrderCommandHandler::new(store.clone(), metrics.clone()),
            composer: OrderComposer::new(store.clone(), metrics.clone()),
            store,
            metrics,
            pages,
        }
    }
}

/// Register routes and extractor settings.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(error::json_error_handler))
        .app_data(web::QueryConfig::default().error_handler(error::query_error_handler))
        .service(
            web::scope("/orders")
                .route("", web::get().to(handlers::list_orders))
                .route("", web::post().to(handlers::create_order))
                .route("/{id}", web::get().to(handlers::get_order))
                .route("/{id}", web::put().to(handlers::replace_order))
                .route("/{id}", web::patch().to(handlers::patch_order))
                .route("/{id}", web::delete().to(handlers::delete_order))
                .route("/{id}/accept", web::post().to(handlers::accept_order))
                .route("/{id}/fail", web::post().to(handlers::fail_order)),
        )
        .service(
            web::scope("/products")
                .route("", web::post().to(handlers::create_product))
                .route("/{id}", web::get().to(handlers::get_product))
                .route("/{id}", web::delete().to(handlers::delete_product)),
        )
        .route("/health", web::get().to(handlers::health));
}

/// Start the API HTTP server
pub async fn start_api_server(state: web::Data<AppState>, bind: String, port: u16) -> std::io::Result<()> {
    tracing::info!("🌐 Starting API server on http://{}:{}", bind, port);

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .configure(configure)
            .wrap(from_fn(middleware::track_request))
            .wrap(NormalizePath::trim())
    })
    .bind((bind.as_str(), port))?
    .run()
    .await
}
