use axum::{
    extract::{Path, Query},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::domain::a001_sales_order::{
    self,
    service::{MatchItemsError, OrderError},
};
use crate::shared::config::get_config;
use crate::shared::export;
use crate::usecases::u102_match_products::matching_api_client::MatchingApiClient;

#[derive(Debug, Deserialize)]
pub struct MatchParams {
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct SingleMatchParams {
    pub item_name: String,
    pub limit: Option<u32>,
}

fn order_error_status(e: &OrderError) -> StatusCode {
    match e {
        OrderError::NotFound => StatusCode::NOT_FOUND,
        OrderError::InvalidIndex { .. } => StatusCode::BAD_REQUEST,
        OrderError::Validation(_) => StatusCode::BAD_REQUEST,
        OrderError::Conflict(_) => StatusCode::CONFLICT,
        OrderError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn parse_id(id: &str) -> Result<uuid::Uuid, StatusCode> {
    uuid::Uuid::parse_str(id).map_err(|_| StatusCode::BAD_REQUEST)
}

/// POST /api/sales-orders
pub async fn create(
    Json(dto): Json<contracts::domain::a001_sales_order::aggregate::CreateSalesOrderRequest>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    match a001_sales_order::service::create(dto.file_name, &dto.line_items).await {
        Ok(order) => Ok(Json(json!({"id": order.to_string_id()}))),
        Err(e) => {
            tracing::error!("Failed to create sales order: {}", e);
            Err(order_error_status(&e))
        }
    }
}

/// GET /api/sales-orders
pub async fn list_all(
) -> Result<Json<Vec<contracts::domain::a001_sales_order::aggregate::SalesOrder>>, StatusCode> {
    match a001_sales_order::service::list_all().await {
        Ok(v) => Ok(Json(v)),
        Err(e) => {
            tracing::error!("Failed to list sales orders: {}", e);
            Err(order_error_status(&e))
        }
    }
}

/// GET /api/sales-orders/:id
pub async fn get_by_id(
    Path(id): Path<String>,
) -> Result<Json<contracts::domain::a001_sales_order::aggregate::SalesOrder>, StatusCode> {
    let uuid = parse_id(&id)?;
    match a001_sales_order::service::get_by_id(uuid).await {
        Ok(order) => Ok(Json(order)),
        Err(e) => Err(order_error_status(&e)),
    }
}

/// PATCH /api/sales-orders/:id
pub async fn patch_order(
    Path(id): Path<String>,
    Json(patch): Json<contracts::domain::a001_sales_order::aggregate::SalesOrderPatch>,
) -> Result<Json<contracts::domain::a001_sales_order::aggregate::SalesOrder>, StatusCode> {
    let uuid = parse_id(&id)?;
    match a001_sales_order::service::patch_order(uuid, &patch).await {
        Ok(order) => Ok(Json(order)),
        Err(e) => {
            tracing::error!("Failed to patch sales order {}: {}", id, e);
            Err(order_error_status(&e))
        }
    }
}

/// PATCH /api/sales-orders/:id/line-items/:index
pub async fn patch_line_item(
    Path((id, index)): Path<(String, usize)>,
    Json(patch): Json<contracts::domain::a001_sales_order::aggregate::LineItemPatch>,
) -> Result<Json<contracts::domain::a001_sales_order::aggregate::SalesOrder>, StatusCode> {
    let uuid = parse_id(&id)?;
    match a001_sales_order::service::patch_line_item(uuid, index, &patch).await {
        Ok(order) => Ok(Json(order)),
        Err(e) => {
            tracing::error!("Failed to patch line item {} of order {}: {}", index, id, e);
            Err(order_error_status(&e))
        }
    }
}

/// POST /api/sales-orders/:id/match
pub async fn match_items(
    Path(id): Path<String>,
    Query(params): Query<MatchParams>,
) -> Result<Json<contracts::domain::a001_sales_order::aggregate::SalesOrder>, StatusCode> {
    let uuid = parse_id(&id)?;
    let config = get_config();
    let limit = params.limit.unwrap_or(config.matching.default_limit);
    let client = MatchingApiClient::new(&config.matching);

    match a001_sales_order::service::match_order_items(uuid, limit, &client).await {
        Ok(order) => Ok(Json(order)),
        Err(MatchItemsError::Order(e)) => Err(order_error_status(&e)),
        Err(MatchItemsError::Match(e)) => {
            tracing::error!("Matching service failed for order {}: {}", id, e);
            Err(StatusCode::BAD_GATEWAY)
        }
    }
}

/// GET /api/sales-orders/:id/match-item — ранжированные кандидаты для одного
/// текста, без записи в заказ
pub async fn match_single_item(
    Path(id): Path<String>,
    Query(params): Query<SingleMatchParams>,
) -> Result<Json<Vec<contracts::domain::a001_sales_order::aggregate::AlternateMatch>>, StatusCode> {
    let uuid = parse_id(&id)?;
    // Заказ должен существовать, сами строки для single-режима не нужны
    if let Err(e) = a001_sales_order::service::get_by_id(uuid).await {
        return Err(order_error_status(&e));
    }

    let config = get_config();
    let limit = params.limit.unwrap_or(config.matching.default_limit);
    let client = MatchingApiClient::new(&config.matching);

    match crate::usecases::u102_match_products::executor::rank_single(
        &client,
        &params.item_name,
        limit,
    )
    .await
    {
        Ok(candidates) => Ok(Json(candidates)),
        Err(e) => {
            tracing::error!("Matching service failed for item '{}': {}", params.item_name, e);
            Err(StatusCode::BAD_GATEWAY)
        }
    }
}

/// GET /api/sales-orders/:id/csv
pub async fn download_csv(Path(id): Path<String>) -> Result<impl IntoResponse, StatusCode> {
    let uuid = parse_id(&id)?;
    let order = match a001_sales_order::service::get_by_id(uuid).await {
        Ok(order) => order,
        Err(e) => return Err(order_error_status(&e)),
    };

    let csv = match export::sales_order_to_csv(&order) {
        Ok(csv) => csv,
        Err(e) => {
            tracing::error!("Failed to render CSV for order {}: {}", id, e);
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    let headers = [
        (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"sales_order_{}.csv\"", id),
        ),
        (header::CACHE_CONTROL, "no-cache".to_string()),
    ];
    Ok((headers, csv))
}
