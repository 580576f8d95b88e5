use contracts::domain::a001_sales_order::aggregate::{AlternateMatch, LineItem};
use std::collections::HashMap;

use super::matching_api_client::{MatchError, ProductMatchProvider};

/// Кандидаты для одного текста по убыванию score — без выбора лучшего
/// и без записи в заказ
pub async fn rank_single(
    provider: &dyn ProductMatchProvider,
    query: &str,
    limit: u32,
) -> Result<Vec<AlternateMatch>, MatchError> {
    let mut candidates = provider.match_single(query, limit).await?;
    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    Ok(candidates)
}

/// Слить результаты пакетного сопоставления в строки заказа.
///
/// Поиск — по точному тексту request_item. Лучший по score кандидат становится
/// выбранным, остальные — альтернативами по убыванию score. Пустой (или
/// отсутствующий) результат оставляет строку несопоставленной; соседние
/// строки это не затрагивает. Слияние stateless — предыдущий выбор не
/// учитывается.
pub fn merge_batch_results(
    items: &mut [LineItem],
    results: &HashMap<String, Vec<AlternateMatch>>,
) {
    for item in items.iter_mut() {
        let candidates = results.get(&item.request_item);
        let Some(candidates) = candidates.filter(|c| !c.is_empty()) else {
            item.clear_match();
            continue;
        };

        let mut ranked = candidates.clone();
        ranked.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let best = ranked.remove(0);
        item.matched_item = Some(best.match_name);
        item.match_score = Some(best.score);
        item.alternate_matches = ranked;
    }
}
