use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Сырая строка от сервиса извлечения: произвольные ключи, произвольные значения.
/// Единственное место в системе с нефиксированной схемой — всё ниже по конвейеру
/// строго типизировано.
pub type RawRow = serde_json::Map<String, serde_json::Value>;

// ============================================================================
// ID Type
// ============================================================================

/// Уникальный идентификатор заказа покупателя
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SalesOrderId(pub Uuid);

impl SalesOrderId {
    pub fn new(value: Uuid) -> Self {
        Self(value)
    }

    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn value(&self) -> Uuid {
        self.0
    }

    pub fn as_string(&self) -> String {
        self.0.to_string()
    }

    pub fn from_string(s: &str) -> Result<Self, String> {
        Uuid::parse_str(s)
            .map(SalesOrderId::new)
            .map_err(|e| format!("Invalid UUID: {}", e))
    }
}

// ============================================================================
// Line item
// ============================================================================

/// Кандидат сопоставления с каталогом (форма ответа matching API)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlternateMatch {
    #[serde(rename = "match")]
    pub match_name: String,
    pub score: f64,
}

/// Строка заказа после нормализации
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LineItem {
    pub request_item: String,
    pub quantity: Option<f64>,
    pub unit_price: Option<f64>,
    pub total: Option<f64>,
    pub matched_item: Option<String>,
    pub match_score: Option<f64>,
    #[serde(default)]
    pub alternate_matches: Vec<AlternateMatch>,
}

impl LineItem {
    /// Если известны ровно два из quantity/unit_price/total — вычислить третье.
    /// Явно заданные значения никогда не пересчитываются, в том числе когда все
    /// три присутствуют и противоречат друг другу.
    pub fn complete_amounts(&mut self) {
        match (self.quantity, self.unit_price, self.total) {
            (Some(q), Some(p), None) => self.total = Some(q * p),
            (Some(q), None, Some(t)) if q != 0.0 => self.unit_price = Some(t / q),
            (None, Some(p), Some(t)) if p != 0.0 => self.quantity = Some(t / p),
            _ => {}
        }
    }

    /// match_score имеет смысл только вместе с matched_item
    pub fn enforce_match_invariant(&mut self) {
        if self.matched_item.is_none() {
            self.match_score = None;
        }
    }

    /// Снять сопоставление целиком
    pub fn clear_match(&mut self) {
        self.matched_item = None;
        self.match_score = None;
        self.alternate_matches.clear();
    }

    /// Применить частичное обновление: трогаем только переданные поля.
    /// Если изменилось любое из трёх числовых полей — заново дополняем
    /// недостающее значение.
    pub fn apply_patch(&mut self, patch: &LineItemPatch) {
        if let Some(v) = &patch.request_item {
            self.request_item = v.clone();
        }
        if let Some(v) = patch.quantity {
            self.quantity = Some(v);
        }
        if let Some(v) = patch.unit_price {
            self.unit_price = Some(v);
        }
        if let Some(v) = patch.total {
            self.total = Some(v);
        }
        if let Some(v) = &patch.matched_item {
            self.matched_item = Some(v.clone());
        }
        if let Some(v) = patch.match_score {
            self.match_score = Some(v);
        }
        if let Some(v) = &patch.alternate_matches {
            self.alternate_matches = v.clone();
        }
        if patch.touches_amounts() {
            self.complete_amounts();
        }
        self.enforce_match_invariant();
    }
}

// ============================================================================
// Aggregate Root
// ============================================================================

/// Заказ покупателя вместе со строками — одна единица согласованности.
/// Мутируется только целиком: либо весь список строк записан, либо ничего.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalesOrder {
    pub id: SalesOrderId,
    pub file_name: String,
    pub order_number: Option<String>,
    pub customer_name: Option<String>,
    pub order_date: Option<DateTime<Utc>>,
    pub line_items: Vec<LineItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Токен оптимистичной блокировки для compare-and-set записи
    pub version: i32,
}

impl SalesOrder {
    /// Создать новый заказ для вставки в БД
    pub fn new_for_insert(file_name: String, line_items: Vec<LineItem>) -> Self {
        let now = Utc::now();
        Self {
            id: SalesOrderId::new_v4(),
            file_name,
            order_number: None,
            customer_name: None,
            order_date: None,
            line_items,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.line_items.is_empty() {
            return Err("sales order must contain at least one line item".to_string());
        }
        for (i, item) in self.line_items.iter().enumerate() {
            if item.request_item.trim().is_empty() {
                return Err(format!("line item {} has an empty request_item", i));
            }
        }
        Ok(())
    }

    /// Получить ID как строку
    pub fn to_string_id(&self) -> String {
        self.id.as_string()
    }

    /// Обновить timestamp
    pub fn touch_updated(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Частичное обновление полей верхнего уровня; line_items не трогаем
    pub fn apply_patch(&mut self, patch: &SalesOrderPatch) {
        if let Some(v) = &patch.file_name {
            self.file_name = v.clone();
        }
        if let Some(v) = &patch.order_number {
            self.order_number = Some(v.clone());
        }
        if let Some(v) = &patch.customer_name {
            self.customer_name = Some(v.clone());
        }
        if let Some(v) = patch.order_date {
            self.order_date = Some(v);
        }
    }
}

// ============================================================================
// DTOs
// ============================================================================

/// POST /api/sales-orders — строки приходят в сыром виде и канонизируются
/// на стороне сервиса
#[derive(Debug, Clone, Deserialize)]
pub struct CreateSalesOrderRequest {
    pub file_name: String,
    pub line_items: Vec<RawRow>,
}

/// PATCH /api/sales-orders/:id — отсутствующее поле означает «не менять»
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SalesOrderPatch {
    pub file_name: Option<String>,
    pub order_number: Option<String>,
    pub customer_name: Option<String>,
    pub order_date: Option<DateTime<Utc>>,
}

/// PATCH /api/sales-orders/:id/line-items/:index
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LineItemPatch {
    pub request_item: Option<String>,
    pub quantity: Option<f64>,
    pub unit_price: Option<f64>,
    pub total: Option<f64>,
    pub matched_item: Option<String>,
    pub match_score: Option<f64>,
    pub alternate_matches: Option<Vec<AlternateMatch>>,
}

impl LineItemPatch {
    pub fn touches_amounts(&self) -> bool {
        self.quantity.is_some() || self.unit_price.is_some() || self.total.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(q: Option<f64>, p: Option<f64>, t: Option<f64>) -> LineItem {
        LineItem {
            request_item: "Bolt M4".to_string(),
            quantity: q,
            unit_price: p,
            total: t,
            ..Default::default()
        }
    }

    #[test]
    fn test_complete_amounts_total() {
        let mut li = item(Some(10.0), Some(0.5), None);
        li.complete_amounts();
        assert_eq!(li.total, Some(5.0));
    }

    #[test]
    fn test_complete_amounts_unit_price() {
        let mut li = item(Some(4.0), None, Some(10.0));
        li.complete_amounts();
        assert_eq!(li.unit_price, Some(2.5));
    }

    #[test]
    fn test_complete_amounts_quantity() {
        let mut li = item(None, Some(2.5), Some(10.0));
        li.complete_amounts();
        assert_eq!(li.quantity, Some(4.0));
    }

    #[test]
    fn test_complete_amounts_needs_two_values() {
        let mut li = item(Some(10.0), None, None);
        li.complete_amounts();
        assert_eq!(li.unit_price, None);
        assert_eq!(li.total, None);
    }

    #[test]
    fn test_complete_amounts_zero_divisor() {
        let mut li = item(Some(0.0), None, Some(10.0));
        li.complete_amounts();
        assert_eq!(li.unit_price, None);
    }

    #[test]
    fn test_inconsistent_explicit_values_left_alone() {
        // Все три заданы и противоречат друг другу — ничего не пересчитываем
        let mut li = item(Some(10.0), Some(0.5), Some(999.0));
        li.complete_amounts();
        assert_eq!(li.total, Some(999.0));
    }

    #[test]
    fn test_match_score_requires_matched_item() {
        let mut li = item(None, None, None);
        li.match_score = Some(92.3);
        li.enforce_match_invariant();
        assert_eq!(li.match_score, None);
    }

    #[test]
    fn test_patch_recompletes_amounts() {
        // total отсутствует, патч quantity добавляет второе известное значение
        let mut li = item(None, Some(0.5), None);
        li.apply_patch(&LineItemPatch {
            quantity: Some(10.0),
            ..Default::default()
        });
        assert_eq!(li.total, Some(5.0));
    }

    #[test]
    fn test_patch_does_not_override_explicit_total() {
        let mut li = item(Some(2.0), Some(3.0), Some(6.0));
        li.apply_patch(&LineItemPatch {
            quantity: Some(4.0),
            ..Default::default()
        });
        // total задан явно — остаётся как есть
        assert_eq!(li.total, Some(6.0));
    }

    #[test]
    fn test_validate_rejects_empty_line_items() {
        let order = SalesOrder::new_for_insert("order.pdf".to_string(), vec![]);
        assert!(order.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_blank_request_item() {
        let order = SalesOrder::new_for_insert(
            "order.pdf".to_string(),
            vec![item(Some(1.0), None, None), {
                let mut blank = item(None, None, None);
                blank.request_item = "   ".to_string();
                blank
            }],
        );
        assert!(order.validate().is_err());
    }

    #[test]
    fn test_order_patch_merges_only_supplied_fields() {
        let mut order =
            SalesOrder::new_for_insert("order.pdf".to_string(), vec![item(Some(1.0), None, None)]);
        order.customer_name = Some("ACME Inc.".to_string());
        order.apply_patch(&SalesOrderPatch {
            order_number: Some("SO-12345".to_string()),
            ..Default::default()
        });
        assert_eq!(order.order_number.as_deref(), Some("SO-12345"));
        assert_eq!(order.customer_name.as_deref(), Some("ACME Inc."));
        assert_eq!(order.file_name, "order.pdf");
    }
}
