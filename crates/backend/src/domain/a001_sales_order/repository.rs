use anyhow::Result;
use chrono::{DateTime, Utc};
use contracts::domain::a001_sales_order::aggregate::{LineItem, SalesOrder, SalesOrderId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use sea_orm::entity::prelude::*;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, Set};

use crate::shared::data::db::get_connection;

/// Модель хранения: заказ вместе со строками — один документ, строки
/// сериализуются в JSON одной колонкой
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "a001_sales_order")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub file_name: String,
    pub order_number: Option<String>,
    pub customer_name: Option<String>,
    pub order_date: Option<String>,
    pub line_items: String,
    pub created_at: String,
    pub updated_at: String,
    pub version: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

fn conn() -> &'static DatabaseConnection {
    get_connection()
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

impl From<Model> for SalesOrder {
    fn from(m: Model) -> Self {
        let uuid = Uuid::parse_str(&m.id).unwrap_or_else(|_| Uuid::new_v4());

        let line_items: Vec<LineItem> = serde_json::from_str(&m.line_items).unwrap_or_else(|e| {
            tracing::warn!("sales order {} has malformed line_items payload: {}", m.id, e);
            Vec::new()
        });

        SalesOrder {
            id: SalesOrderId::new(uuid),
            file_name: m.file_name,
            order_number: m.order_number,
            customer_name: m.customer_name,
            order_date: m.order_date.as_deref().map(parse_timestamp),
            line_items,
            created_at: parse_timestamp(&m.created_at),
            updated_at: parse_timestamp(&m.updated_at),
            version: m.version,
        }
    }
}

fn serialize_line_items(aggregate: &SalesOrder) -> Result<String> {
    Ok(serde_json::to_string(&aggregate.line_items)?)
}

pub async fn insert(aggregate: &SalesOrder) -> Result<Uuid> {
    let uuid = aggregate.id.value();
    let active = ActiveModel {
        id: Set(uuid.to_string()),
        file_name: Set(aggregate.file_name.clone()),
        order_number: Set(aggregate.order_number.clone()),
        customer_name: Set(aggregate.customer_name.clone()),
        order_date: Set(aggregate.order_date.map(|d| d.to_rfc3339())),
        line_items: Set(serialize_line_items(aggregate)?),
        created_at: Set(aggregate.created_at.to_rfc3339()),
        updated_at: Set(aggregate.updated_at.to_rfc3339()),
        version: Set(aggregate.version),
    };
    active.insert(conn()).await?;
    Ok(uuid)
}

pub async fn get_by_id(id: Uuid) -> Result<Option<SalesOrder>> {
    let result = Entity::find_by_id(id.to_string()).one(conn()).await?;
    Ok(result.map(Into::into))
}

pub async fn list_all() -> Result<Vec<SalesOrder>> {
    let mut items: Vec<SalesOrder> = Entity::find()
        .all(conn())
        .await?
        .into_iter()
        .map(Into::into)
        .collect();
    items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(items)
}

/// Записать агрегат целиком, но только если версия в БД всё ещё равна
/// expected_version (compare-and-set). false означает, что успел другой
/// писатель и read-modify-write надо повторить поверх свежей копии.
pub async fn update_with_version(aggregate: &SalesOrder, expected_version: i32) -> Result<bool> {
    let result = Entity::update_many()
        .col_expr(Column::FileName, Expr::value(aggregate.file_name.clone()))
        .col_expr(
            Column::OrderNumber,
            Expr::value(aggregate.order_number.clone()),
        )
        .col_expr(
            Column::CustomerName,
            Expr::value(aggregate.customer_name.clone()),
        )
        .col_expr(
            Column::OrderDate,
            Expr::value(aggregate.order_date.map(|d| d.to_rfc3339())),
        )
        .col_expr(Column::LineItems, Expr::value(serialize_line_items(aggregate)?))
        .col_expr(
            Column::UpdatedAt,
            Expr::value(aggregate.updated_at.to_rfc3339()),
        )
        .col_expr(Column::Version, Expr::value(aggregate.version))
        .filter(Column::Id.eq(aggregate.id.as_string()))
        .filter(Column::Version.eq(expected_version))
        .exec(conn())
        .await?;

    Ok(result.rows_affected == 1)
}
