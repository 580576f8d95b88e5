use contracts::domain::a001_sales_order::aggregate::{AlternateMatch, LineItem, RawRow};
use serde_json::Value;
use std::time::Duration;

use crate::shared::llm::types::FieldLabeler;

/// Таблицы синонимов: регистронезависимо, первый найденный по списку
/// приоритетов побеждает
const REQUEST_ITEM_ALIASES: &[&str] = &[
    "request item",
    "request_item",
    "item description",
    "description",
    "item",
    "product",
];
const QUANTITY_ALIASES: &[&str] = &["quantity", "qty", "amount"];
const UNIT_PRICE_ALIASES: &[&str] = &["unit price", "unit_price", "unit cost", "price"];
const TOTAL_ALIASES: &[&str] = &["total", "line total", "total price"];

const LABEL_TIMEOUT: Duration = Duration::from_secs(20);

fn find_alias<'a>(row: &'a RawRow, aliases: &[&str]) -> Option<&'a Value> {
    for alias in aliases {
        if let Some((_, value)) = row
            .iter()
            .find(|(key, _)| key.trim().eq_ignore_ascii_case(alias))
        {
            return Some(value);
        }
    }
    None
}

/// Привести значение к числу: валютные символы, пробелы и разделители тысяч
/// допускаются; всё нераспознанное становится None, а не ошибкой
pub fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let cleaned: String = s
                .chars()
                .filter(|c| !matches!(c, '$' | '€' | '£' | ',') && !c.is_whitespace())
                .collect();
            if cleaned.is_empty() {
                return None;
            }
            cleaned.parse::<f64>().ok()
        }
        _ => None,
    }
}

fn coerce_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Канонизировать одну сырую строку. Никогда не падает: нераспознанные поля
/// остаются пустыми, строка без наименования сохраняет позицию с пустым
/// текстом. Поля сопоставления переносятся, если уже присутствуют
/// (строки извлечения их не несут — там они всегда пустые).
pub fn canonicalize_row(row: &RawRow) -> LineItem {
    let mut item = LineItem {
        request_item: find_alias(row, REQUEST_ITEM_ALIASES)
            .and_then(coerce_text)
            .unwrap_or_default(),
        quantity: find_alias(row, QUANTITY_ALIASES).and_then(coerce_number),
        unit_price: find_alias(row, UNIT_PRICE_ALIASES).and_then(coerce_number),
        total: find_alias(row, TOTAL_ALIASES).and_then(coerce_number),
        matched_item: row.get("matched_item").and_then(coerce_text),
        match_score: row.get("match_score").and_then(coerce_number),
        alternate_matches: row
            .get("alternate_matches")
            .and_then(|v| serde_json::from_value::<Vec<AlternateMatch>>(v.clone()).ok())
            .unwrap_or_default(),
    };
    item.complete_amounts();
    item.enforce_match_invariant();
    item
}

/// Нормализация пакета сырых строк: сперва AI-разметка (если разметчик
/// доступен), при любом её сбое — детерминированная таблица синонимов.
/// Выход всегда 1:1 со входом и в исходном порядке.
pub async fn normalize_rows(rows: &[RawRow], labeler: Option<&dyn FieldLabeler>) -> Vec<LineItem> {
    let labeled: Vec<RawRow> = match labeler {
        Some(labeler) if !rows.is_empty() => {
            match tokio::time::timeout(LABEL_TIMEOUT, labeler.label_rows(rows)).await {
                Ok(Ok(out)) if out.len() == rows.len() => out,
                Ok(Ok(out)) => {
                    tracing::warn!(
                        "labeler returned {} rows for {} inputs, falling back to alias table",
                        out.len(),
                        rows.len()
                    );
                    rows.to_vec()
                }
                Ok(Err(e)) => {
                    tracing::warn!("field labeling degraded to alias table: {}", e);
                    rows.to_vec()
                }
                Err(_) => {
                    tracing::warn!(
                        "field labeling timed out after {:?}, falling back to alias table",
                        LABEL_TIMEOUT
                    );
                    rows.to_vec()
                }
            }
        }
        _ => rows.to_vec(),
    };

    labeled.iter().map(canonicalize_row).collect()
}
