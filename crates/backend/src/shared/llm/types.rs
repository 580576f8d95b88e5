use async_trait::async_trait;
use contracts::domain::a001_sales_order::aggregate::RawRow;
use thiserror::Error;

/// Ошибки AI-разметки полей
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("API error: {0}")]
    ApiError(String),

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

/// Разметка полей сырых строк: возвращает те же строки (1:1, в том же
/// порядке) с наилучшей догадкой о канонических именах полей.
///
/// Любой сбой не фатален — вызывающая сторона откатывается на
/// детерминированную таблицу синонимов.
#[async_trait]
pub trait FieldLabeler: Send + Sync {
    async fn label_rows(&self, rows: &[RawRow]) -> Result<Vec<RawRow>, LlmError>;
}
