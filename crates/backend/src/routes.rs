use axum::{
    routing::{get, patch, post},
    Router,
};

use crate::handlers;

/// Конфигурация всех роутов приложения
pub fn configure_routes() -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        // Извлечение строк из загруженного документа
        .route("/api/extract", post(handlers::extraction::extract_document))
        // A001 Sales Order handlers
        .route(
            "/api/sales-orders",
            get(handlers::a001_sales_order::list_all).post(handlers::a001_sales_order::create),
        )
        .route(
            "/api/sales-orders/:id",
            get(handlers::a001_sales_order::get_by_id)
                .patch(handlers::a001_sales_order::patch_order),
        )
        .route(
            "/api/sales-orders/:id/match",
            post(handlers::a001_sales_order::match_items),
        )
        .route(
            "/api/sales-orders/:id/match-item",
            get(handlers::a001_sales_order::match_single_item),
        )
        .route(
            "/api/sales-orders/:id/line-items/:index",
            patch(handlers::a001_sales_order::patch_line_item),
        )
        .route(
            "/api/sales-orders/:id/csv",
            get(handlers::a001_sales_order::download_csv),
        )
}
