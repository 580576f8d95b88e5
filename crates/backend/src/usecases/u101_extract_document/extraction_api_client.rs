use contracts::domain::a001_sales_order::aggregate::RawRow;
use serde_json::Value;
use thiserror::Error;

use crate::shared::config::ExtractionConfig;

/// Сбои сервиса извлечения не имеют локального отката — они доводятся до
/// вызывающей стороны как есть
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("extraction API request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("extraction API returned status {status}: {body}")]
    Api { status: u16, body: String },

    #[error("extraction API response malformed: {0}")]
    Malformed(String),
}

/// HTTP-клиент сервиса извлечения строк из документа
pub struct ExtractionApiClient {
    client: reqwest::Client,
    api_url: String,
}

impl ExtractionApiClient {
    pub fn new(config: &ExtractionConfig) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .expect("Failed to create HTTP client"),
            api_url: config.api_url.clone(),
        }
    }

    /// Переслать загруженный файл в сервис извлечения и получить сырые строки
    pub async fn extract(
        &self,
        file_name: &str,
        content_type: Option<String>,
        bytes: Vec<u8>,
    ) -> Result<Vec<RawRow>, ExtractionError> {
        let mut part = reqwest::multipart::Part::bytes(bytes).file_name(file_name.to_string());
        if let Some(ct) = content_type {
            part = part.mime_str(&ct)?;
        }
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self.client.post(&self.api_url).multipart(form).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!("Extraction API request failed with status {}: {}", status, body);
            return Err(ExtractionError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let value: Value = response.json().await?;
        rows_from_value(value).ok_or_else(|| {
            ExtractionError::Malformed("expected a JSON array of row objects".to_string())
        })
    }
}

/// Ответ извлечения бывает как голым массивом, так и конвертом {"items": [...]}
fn rows_from_value(value: Value) -> Option<Vec<RawRow>> {
    let array = match value {
        Value::Array(array) => array,
        Value::Object(mut envelope) => match envelope.remove("items") {
            Some(Value::Array(array)) => array,
            _ => return None,
        },
        _ => return None,
    };
    array
        .into_iter()
        .map(|v| match v {
            Value::Object(map) => Some(map),
            _ => None,
        })
        .collect()
}
