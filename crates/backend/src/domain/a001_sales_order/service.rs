use contracts::domain::a001_sales_order::aggregate::{
    LineItem, LineItemPatch, RawRow, SalesOrder, SalesOrderPatch,
};
use thiserror::Error;
use uuid::Uuid;

use super::repository;
use crate::shared::normalizer;
use crate::usecases::u102_match_products::executor::merge_batch_results;
use crate::usecases::u102_match_products::matching_api_client::{MatchError, ProductMatchProvider};

/// Сколько раз повторять read-modify-write при проигрыше compare-and-set
const CAS_MAX_RETRIES: usize = 5;

#[derive(Debug, Error)]
pub enum OrderError {
    #[error("sales order not found")]
    NotFound,

    #[error("line item index {index} is out of range (order has {len} items)")]
    InvalidIndex { index: usize, len: usize },

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("concurrent update conflict on sales order {0}")]
    Conflict(String),

    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

/// Пакетное сопоставление может упасть и на стороне заказа, и на стороне
/// matching-сервиса — обработчику нужны оба случая раздельно
#[derive(Debug, Error)]
pub enum MatchItemsError {
    #[error(transparent)]
    Order(#[from] OrderError),

    #[error(transparent)]
    Match(#[from] MatchError),
}

/// Создание заказа из проверенного набора сырых строк. Строки канонизируются
/// детерминированно (AI на этом этапе уже отработал при извлечении).
pub async fn create(file_name: String, raw_items: &[RawRow]) -> Result<SalesOrder, OrderError> {
    let line_items: Vec<LineItem> = raw_items.iter().map(normalizer::canonicalize_row).collect();

    let order = SalesOrder::new_for_insert(file_name, line_items);
    order.validate().map_err(OrderError::Validation)?;

    repository::insert(&order).await?;
    tracing::info!("Created sales order {} ({} line items)", order.to_string_id(), order.line_items.len());
    Ok(order)
}

pub async fn get_by_id(id: Uuid) -> Result<SalesOrder, OrderError> {
    repository::get_by_id(id).await?.ok_or(OrderError::NotFound)
}

pub async fn list_all() -> Result<Vec<SalesOrder>, OrderError> {
    Ok(repository::list_all().await?)
}

/// Частичное обновление полей верхнего уровня; line_items не трогаются
pub async fn patch_order(id: Uuid, patch: &SalesOrderPatch) -> Result<SalesOrder, OrderError> {
    mutate(id, |order| {
        order.apply_patch(patch);
        Ok(())
    })
    .await
}

/// Частичное обновление одной строки по позиционному индексу
pub async fn patch_line_item(
    id: Uuid,
    index: usize,
    patch: &LineItemPatch,
) -> Result<SalesOrder, OrderError> {
    mutate(id, |order| {
        let len = order.line_items.len();
        let item = order
            .line_items
            .get_mut(index)
            .ok_or(OrderError::InvalidIndex { index, len })?;
        item.apply_patch(patch);
        Ok(())
    })
    .await
}

/// Пакетное сопоставление всех строк заказа: один запрос на все тексты,
/// слияние результатов, атомарная запись
pub async fn match_order_items(
    id: Uuid,
    limit: u32,
    provider: &dyn ProductMatchProvider,
) -> Result<SalesOrder, MatchItemsError> {
    let order = repository::get_by_id(id)
        .await
        .map_err(OrderError::from)?
        .ok_or(OrderError::NotFound)?;

    // Один round trip на все уникальные тексты пакета
    let mut queries: Vec<String> = Vec::new();
    for item in &order.line_items {
        if !queries.contains(&item.request_item) {
            queries.push(item.request_item.clone());
        }
    }

    let results = provider.match_batch(&queries, limit).await?;

    let updated = mutate(id, |order| {
        merge_batch_results(&mut order.line_items, &results);
        Ok(())
    })
    .await?;
    Ok(updated)
}

/// Read-modify-write поверх свежей копии агрегата под compare-and-set.
/// Проигрыш CAS означает конкурентного писателя — повторяем с новой версией,
/// чтобы его изменения не потерялись.
async fn mutate<F>(id: Uuid, apply: F) -> Result<SalesOrder, OrderError>
where
    F: Fn(&mut SalesOrder) -> Result<(), OrderError>,
{
    for _ in 0..CAS_MAX_RETRIES {
        let mut order = repository::get_by_id(id).await?.ok_or(OrderError::NotFound)?;
        let expected_version = order.version;

        apply(&mut order)?;
        order.touch_updated();
        order.version = expected_version + 1;

        if repository::update_with_version(&order, expected_version).await? {
            return Ok(order);
        }
        tracing::warn!("CAS conflict on sales order {}, retrying", id);
    }
    Err(OrderError::Conflict(id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::data::db::init_test_database;
    use async_trait::async_trait;
    use contracts::domain::a001_sales_order::aggregate::AlternateMatch;
    use serde_json::json;
    use std::collections::HashMap;

    fn raw_item(name: &str, quantity: f64, unit_price: f64) -> RawRow {
        let mut row = RawRow::new();
        row.insert("Request Item".to_string(), json!(name));
        row.insert("Quantity".to_string(), json!(quantity));
        row.insert("Unit Price".to_string(), json!(unit_price));
        row
    }

    struct StubMatcher {
        results: HashMap<String, Vec<AlternateMatch>>,
    }

    #[async_trait]
    impl ProductMatchProvider for StubMatcher {
        async fn match_batch(
            &self,
            _queries: &[String],
            _limit: u32,
        ) -> Result<HashMap<String, Vec<AlternateMatch>>, MatchError> {
            Ok(self.results.clone())
        }

        async fn match_single(
            &self,
            query: &str,
            _limit: u32,
        ) -> Result<Vec<AlternateMatch>, MatchError> {
            Ok(self.results.get(query).cloned().unwrap_or_default())
        }
    }

    #[tokio::test]
    async fn test_create_and_get_computes_total() {
        init_test_database().await;

        let created = create("order.pdf".to_string(), &[raw_item("Bolt M4", 10.0, 0.5)])
            .await
            .unwrap();
        let fetched = get_by_id(created.id.value()).await.unwrap();

        assert_eq!(fetched.file_name, "order.pdf");
        assert_eq!(fetched.line_items.len(), 1);
        assert_eq!(fetched.line_items[0].total, Some(5.0));
        assert_eq!(fetched.version, 0);
    }

    #[tokio::test]
    async fn test_create_rejects_empty_line_items() {
        init_test_database().await;

        let err = create("order.pdf".to_string(), &[]).await.unwrap_err();
        assert!(matches!(err, OrderError::Validation(_)));
    }

    #[tokio::test]
    async fn test_create_rejects_unresolvable_request_item() {
        init_test_database().await;

        let mut row = RawRow::new();
        row.insert("Quantity".to_string(), json!(3));
        let err = create("order.pdf".to_string(), &[row]).await.unwrap_err();
        assert!(matches!(err, OrderError::Validation(_)));
    }

    #[tokio::test]
    async fn test_get_missing_order_is_not_found() {
        init_test_database().await;

        let err = get_by_id(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, OrderError::NotFound));
    }

    #[tokio::test]
    async fn test_patch_order_merges_fields_and_bumps_version() {
        init_test_database().await;

        let created = create("order.pdf".to_string(), &[raw_item("Bolt M4", 10.0, 0.5)])
            .await
            .unwrap();

        let patched = patch_order(
            created.id.value(),
            &SalesOrderPatch {
                order_number: Some("SO-12345".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(patched.order_number.as_deref(), Some("SO-12345"));
        assert_eq!(patched.file_name, "order.pdf");
        assert_eq!(patched.version, 1);
        assert!(patched.updated_at >= created.updated_at);
    }

    #[tokio::test]
    async fn test_patch_line_item_recompletes_amounts() {
        init_test_database().await;

        let created = create("order.pdf".to_string(), &[raw_item("Bolt M4", 10.0, 0.5)])
            .await
            .unwrap();

        // quantity меняется, total задан явно и не пересчитывается
        let patched = patch_line_item(
            created.id.value(),
            0,
            &LineItemPatch {
                quantity: Some(20.0),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(patched.line_items[0].quantity, Some(20.0));
        assert_eq!(patched.line_items[0].total, Some(5.0));
    }

    #[tokio::test]
    async fn test_patch_line_item_invalid_index_leaves_order_untouched() {
        init_test_database().await;

        let created = create("order.pdf".to_string(), &[raw_item("Bolt M4", 10.0, 0.5)])
            .await
            .unwrap();

        let err = patch_line_item(
            created.id.value(),
            5,
            &LineItemPatch {
                quantity: Some(99.0),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, OrderError::InvalidIndex { index: 5, len: 1 }));

        let after = get_by_id(created.id.value()).await.unwrap();
        assert_eq!(after.updated_at, created.updated_at);
        assert_eq!(after.line_items, created.line_items);
        assert_eq!(after.version, created.version);
    }

    #[tokio::test]
    async fn test_batch_match_end_to_end() {
        init_test_database().await;

        let created = create("order.pdf".to_string(), &[raw_item("Bolt M4", 10.0, 0.5)])
            .await
            .unwrap();

        let matcher = StubMatcher {
            results: HashMap::from([(
                "Bolt M4".to_string(),
                vec![
                    AlternateMatch {
                        match_name: "M4 Hex Bolt".to_string(),
                        score: 92.3,
                    },
                    AlternateMatch {
                        match_name: "M4 Bolt Zinc".to_string(),
                        score: 81.0,
                    },
                ],
            )]),
        };

        let matched = match_order_items(created.id.value(), 5, &matcher).await.unwrap();

        assert_eq!(matched.line_items[0].matched_item.as_deref(), Some("M4 Hex Bolt"));
        assert_eq!(matched.line_items[0].match_score, Some(92.3));
        assert_eq!(matched.line_items[0].alternate_matches.len(), 1);
        assert_eq!(
            matched.line_items[0].alternate_matches[0].match_name,
            "M4 Bolt Zinc"
        );
    }

    #[tokio::test]
    async fn test_batch_match_item_without_candidates_stays_unmatched() {
        init_test_database().await;

        let created = create(
            "order.pdf".to_string(),
            &[raw_item("Bolt M4", 10.0, 0.5), raw_item("Exotic Part", 1.0, 9.0)],
        )
        .await
        .unwrap();

        let matcher = StubMatcher {
            results: HashMap::from([(
                "Bolt M4".to_string(),
                vec![AlternateMatch {
                    match_name: "M4 Hex Bolt".to_string(),
                    score: 92.3,
                }],
            )]),
        };

        let matched = match_order_items(created.id.value(), 5, &matcher).await.unwrap();

        assert_eq!(matched.line_items[0].matched_item.as_deref(), Some("M4 Hex Bolt"));
        assert_eq!(matched.line_items[1].matched_item, None);
    }

    #[tokio::test]
    async fn test_stale_version_write_is_refused() {
        init_test_database().await;

        let created = create("order.pdf".to_string(), &[raw_item("Bolt M4", 10.0, 0.5)])
            .await
            .unwrap();

        // Первый писатель выигрывает
        let mut first = get_by_id(created.id.value()).await.unwrap();
        first.order_number = Some("SO-1".to_string());
        first.version += 1;
        assert!(repository::update_with_version(&first, created.version)
            .await
            .unwrap());

        // Второй принёс устаревшую версию — запись отвергается
        let mut second = created.clone();
        second.order_number = Some("SO-2".to_string());
        second.version += 1;
        assert!(!repository::update_with_version(&second, created.version)
            .await
            .unwrap());

        let after = get_by_id(created.id.value()).await.unwrap();
        assert_eq!(after.order_number.as_deref(), Some("SO-1"));
    }

    #[tokio::test]
    async fn test_concurrent_patches_are_not_lost() {
        init_test_database().await;

        let created = create("order.pdf".to_string(), &[raw_item("Bolt M4", 10.0, 0.5)])
            .await
            .unwrap();
        let id = created.id.value();

        let order_patch = SalesOrderPatch {
            order_number: Some("SO-12345".to_string()),
            ..Default::default()
        };
        let item_patch = LineItemPatch {
            matched_item: Some("M4 Hex Bolt".to_string()),
            match_score: Some(92.3),
            ..Default::default()
        };

        let (a, b) = tokio::join!(
            patch_order(id, &order_patch),
            patch_line_item(id, 0, &item_patch)
        );
        a.unwrap();
        b.unwrap();

        // Оба изменения видны: CAS с повтором не даёт потерять обновление
        let after = get_by_id(id).await.unwrap();
        assert_eq!(after.order_number.as_deref(), Some("SO-12345"));
        assert_eq!(after.line_items[0].matched_item.as_deref(), Some("M4 Hex Bolt"));
        assert_eq!(after.version, 2);
    }
}
