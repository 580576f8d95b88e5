use anyhow::Result;
use contracts::domain::a001_sales_order::aggregate::SalesOrder;

use crate::shared::format::{format_currency, format_quantity, format_score};

/// Порядок колонок фиксирован; пустые значения — пустые ячейки
const CSV_HEADER: [&str; 6] = [
    "Request Item",
    "Quantity",
    "Unit Price",
    "Total",
    "Matched Item",
    "Match Score",
];

/// Спроецировать заказ в CSV: одна строка на line item, без каких-либо
/// вычислений — проектор только отображает то, что хранится
pub fn sales_order_to_csv(order: &SalesOrder) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record(CSV_HEADER)?;

    for item in &order.line_items {
        let quantity = format_quantity(item.quantity);
        let unit_price = format_currency(item.unit_price);
        let total = format_currency(item.total);
        let score = format_score(item.match_score);
        writer.write_record([
            item.request_item.as_str(),
            quantity.as_str(),
            unit_price.as_str(),
            total.as_str(),
            item.matched_item.as_deref().unwrap_or(""),
            score.as_str(),
        ])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("csv writer flush failed: {}", e))?;
    Ok(String::from_utf8(bytes)?)
}
