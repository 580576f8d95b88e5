/// Денежное поле для экспорта: ровно два знака после запятой, None — пустая ячейка
pub fn format_currency(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.2}", v),
        None => String::new(),
    }
}

/// Количество: целые значения без хвостового ".0"
pub fn format_quantity(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() && v.fract() == 0.0 => format!("{}", v as i64),
        Some(v) => format!("{}", v),
        None => String::new(),
    }
}

/// Оценка сопоставления выводится в той же шкале, в какой её вернул matching API
pub fn format_score(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{}", v),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_currency() {
        assert_eq!(format_currency(Some(0.5)), "0.50");
        assert_eq!(format_currency(Some(5.0)), "5.00");
        assert_eq!(format_currency(Some(1234.567)), "1234.57");
        assert_eq!(format_currency(None), "");
    }

    #[test]
    fn test_format_quantity() {
        assert_eq!(format_quantity(Some(10.0)), "10");
        assert_eq!(format_quantity(Some(2.5)), "2.5");
        assert_eq!(format_quantity(Some(0.0)), "0");
        assert_eq!(format_quantity(None), "");
    }

    #[test]
    fn test_format_score() {
        assert_eq!(format_score(Some(92.3)), "92.3");
        assert_eq!(format_score(Some(100.0)), "100");
        assert_eq!(format_score(None), "");
    }
}
