use super::types::{FieldLabeler, LlmError};
use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use contracts::domain::a001_sales_order::aggregate::RawRow;

const SYSTEM_PROMPT: &str = "You are a helpful assistant that processes and normalizes \
extracted sales order data. Your task is to identify Quantity, Unit Price, and Total \
fields and map them to standardized names.";

/// OpenAI-разметчик полей сырых строк
pub struct OpenAiLabeler {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiLabeler {
    pub fn new(api_key: String, model: String) -> Self {
        let config = OpenAIConfig::new().with_api_key(api_key);
        let client = Client::with_config(config);

        Self { client, model }
    }

    /// Собирается только при наличии OPENAI_API_KEY — иначе вызывающая
    /// сторона сразу идёт по детерминированному пути
    pub fn from_env(model: &str) -> Option<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").ok()?;
        if api_key.trim().is_empty() {
            return None;
        }
        Some(Self::new(api_key, model.to_string()))
    }

    fn build_prompt(rows: &[RawRow]) -> Result<String, LlmError> {
        let items_json = serde_json::to_string_pretty(rows)
            .map_err(|e| LlmError::InvalidRequest(e.to_string()))?;

        Ok(format!(
            r#"I have extracted data from a sales order PDF. The data contains items with various field names.
Here's the extracted data:

{items_json}

Please normalize this data to have consistent field names. I need the following fields for each item:
1. "Request Item" - The name/description of the item
2. "Quantity" - The number of items (may be in fields like "Quantity", "Qty", "Amount", etc.)
3. "Unit Price" - The price per unit (may be in fields like "Unit Price", "Price", "Unit Cost", etc.)
4. "Total" - The total cost for the line item (may be in fields like "Total", "Line Total", etc.)

For each item, keep the item description as is, map the other fields to the standardized
names above, and if a field is missing but can be calculated (e.g., Total = Quantity * Unit Price),
calculate it. Keep one output object per input object, in the same order.

Return the normalized data as a JSON array of objects with standardized field names.
The response should be ONLY the JSON array, with no additional text."#
        ))
    }

    /// Вытащить первый JSON-массив из текста ответа модели
    fn extract_json_array(text: &str) -> Result<Vec<RawRow>, LlmError> {
        let start = text
            .find('[')
            .ok_or_else(|| LlmError::MalformedResponse("no JSON array in response".to_string()))?;
        let end = text
            .rfind(']')
            .filter(|&end| end > start)
            .ok_or_else(|| LlmError::MalformedResponse("no JSON array in response".to_string()))?;

        serde_json::from_str(&text[start..=end])
            .map_err(|e| LlmError::MalformedResponse(e.to_string()))
    }
}

#[async_trait]
impl FieldLabeler for OpenAiLabeler {
    async fn label_rows(&self, rows: &[RawRow]) -> Result<Vec<RawRow>, LlmError> {
        let prompt = Self::build_prompt(rows)?;

        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(SYSTEM_PROMPT)
                .build()
                .map_err(|e| LlmError::InvalidRequest(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(prompt)
                .build()
                .map_err(|e| LlmError::InvalidRequest(e.to_string()))?
                .into(),
        ];

        // temperature 0 — разметка должна быть детерминированной
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(0.0)
            .build()
            .map_err(|e| LlmError::InvalidRequest(e.to_string()))?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            let err_str = e.to_string();
            if err_str.contains("401") || err_str.contains("authentication") {
                LlmError::AuthError(err_str)
            } else if err_str.contains("429") || err_str.contains("rate limit") {
                LlmError::RateLimitExceeded
            } else {
                LlmError::ApiError(err_str)
            }
        })?;

        let choice = response
            .choices
            .first()
            .ok_or_else(|| LlmError::ApiError("No response from API".to_string()))?;

        let content = choice.message.content.clone().unwrap_or_default();
        Self::extract_json_array(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_array() {
        let text = r#"Here you go:
[{"Request Item": "Bolt M4", "Quantity": 10}]
"#;
        let rows = OpenAiLabeler::extract_json_array(text).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["Request Item"], "Bolt M4");
    }

    #[test]
    fn test_extract_json_array_no_array() {
        assert!(OpenAiLabeler::extract_json_array("sorry, cannot help").is_err());
    }

    #[test]
    fn test_extract_json_array_broken_json() {
        assert!(OpenAiLabeler::extract_json_array("[{\"a\": }]").is_err());
    }
}
