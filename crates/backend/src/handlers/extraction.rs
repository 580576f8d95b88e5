use axum::{extract::Multipart, http::StatusCode, Json};

use crate::shared::config::get_config;
use crate::shared::llm::openai_provider::OpenAiLabeler;
use crate::shared::llm::types::FieldLabeler;
use crate::shared::normalizer;
use crate::usecases::u101_extract_document::extraction_api_client::ExtractionApiClient;

/// POST /api/extract — принять файл заказа, прогнать через сервис извлечения
/// и вернуть канонизированные строки
pub async fn extract_document(
    mut multipart: Multipart,
) -> Result<Json<Vec<contracts::domain::a001_sales_order::aggregate::LineItem>>, StatusCode> {
    let mut upload: Option<(String, Option<String>, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| StatusCode::BAD_REQUEST)?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field
            .file_name()
            .unwrap_or("document.pdf")
            .to_string();
        let content_type = field.content_type().map(|ct| ct.to_string());
        let bytes = field
            .bytes()
            .await
            .map_err(|_| StatusCode::BAD_REQUEST)?
            .to_vec();
        upload = Some((file_name, content_type, bytes));
        break;
    }

    let Some((file_name, content_type, bytes)) = upload else {
        tracing::error!("Extract request without 'file' multipart field");
        return Err(StatusCode::BAD_REQUEST);
    };

    let config = get_config();
    let client = ExtractionApiClient::new(&config.extraction);
    let rows = match client.extract(&file_name, content_type, bytes).await {
        Ok(rows) => rows,
        Err(e) => {
            tracing::error!("Extraction service failed for '{}': {}", file_name, e);
            return Err(StatusCode::BAD_GATEWAY);
        }
    };

    let labeler = OpenAiLabeler::from_env(&config.llm.model);
    let items = normalizer::normalize_rows(
        &rows,
        labeler.as_ref().map(|l| l as &dyn FieldLabeler),
    )
    .await;

    tracing::info!("Extracted {} line items from '{}'", items.len(), file_name);
    Ok(Json(items))
}
