use async_trait::async_trait;
use contracts::domain::a001_sales_order::aggregate::AlternateMatch;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::shared::config::MatchingConfig;

/// Сбой самого matching-сервиса доводится до вызывающей стороны как есть —
/// частичный результат не фабрикуется
#[derive(Debug, Error)]
pub enum MatchError {
    #[error("matching API request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("matching API returned status {status}: {body}")]
    Api { status: u16, body: String },

    #[error("matching API response malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Поставщик кандидатов сопоставления с каталогом. Trait нужен, чтобы в
/// тестах подменять HTTP-клиент заглушкой.
#[async_trait]
pub trait ProductMatchProvider: Send + Sync {
    /// Один запрос на весь пакет текстов; ключ результата — точный текст запроса
    async fn match_batch(
        &self,
        queries: &[String],
        limit: u32,
    ) -> Result<HashMap<String, Vec<AlternateMatch>>, MatchError>;

    /// Ранжированные кандидаты для одного текста; выбор остаётся за вызывающим
    async fn match_single(
        &self,
        query: &str,
        limit: u32,
    ) -> Result<Vec<AlternateMatch>, MatchError>;
}

/// HTTP-клиент matching API
pub struct MatchingApiClient {
    client: reqwest::Client,
    batch_api_url: String,
    single_api_url: String,
}

#[derive(Serialize)]
struct BatchMatchRequest<'a> {
    queries: &'a [String],
}

#[derive(Deserialize)]
struct BatchMatchResponse {
    #[serde(default)]
    results: HashMap<String, Vec<AlternateMatch>>,
}

impl MatchingApiClient {
    pub fn new(config: &MatchingConfig) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .expect("Failed to create HTTP client"),
            batch_api_url: config.batch_api_url.clone(),
            single_api_url: config.single_api_url.clone(),
        }
    }
}

#[async_trait]
impl ProductMatchProvider for MatchingApiClient {
    async fn match_batch(
        &self,
        queries: &[String],
        limit: u32,
    ) -> Result<HashMap<String, Vec<AlternateMatch>>, MatchError> {
        let response = self
            .client
            .post(&self.batch_api_url)
            .query(&[("limit", limit.to_string())])
            .json(&BatchMatchRequest { queries })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!("Matching API batch request failed with status {}: {}", status, body);
            return Err(MatchError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        let parsed: BatchMatchResponse = serde_json::from_str(&body)?;
        Ok(parsed.results)
    }

    async fn match_single(
        &self,
        query: &str,
        limit: u32,
    ) -> Result<Vec<AlternateMatch>, MatchError> {
        let response = self
            .client
            .get(&self.single_api_url)
            .query(&[("query", query), ("limit", &limit.to_string())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!("Matching API single request failed with status {}: {}", status, body);
            return Err(MatchError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        let candidates: Vec<AlternateMatch> = serde_json::from_str(&body)?;
        Ok(candidates)
    }
}
