//! Ollama chat API client used as the extraction oracle

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::oracle::ExtractionOracle;

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

pub struct OllamaOracle {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaOracle {
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.base_url)
    }

    fn request(&self, prompt: &str) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![Message {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            stream: false,
        }
    }
}

impl ExtractionOracle for OllamaOracle {
    async fn generate(&self, prompt: &str) -> AppResult<String> {
        let response = self
            .client
            .post(self.chat_url())
            .json(&self.request(prompt))
            .send()
            .await
            .map_err(|e| AppError::OracleCall(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::OracleCall(format!(
                "API error {}: {}",
                status, error_text
            )));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| AppError::OracleCall(format!("Failed to parse response: {}", e)))?;

        Ok(chat.message.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_url_ignores_trailing_slash() {
        let oracle = OllamaOracle::new("http://localhost:11434/", "phi3:mini");
        assert_eq!(oracle.chat_url(), "http://localhost:11434/api/chat");
    }

    #[test]
    fn request_is_single_non_streaming_user_message() {
        let oracle = OllamaOracle::new("http://localhost:11434", "phi3:mini");
        let body = serde_json::to_value(oracle.request("hello")).unwrap();
        assert_eq!(body["model"], "phi3:mini");
        assert_eq!(body["stream"], false);
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "hello");
    }

    #[test]
    fn response_content_is_read_from_message() {
        let raw = r#"{"model":"phi3:mini","message":{"role":"assistant","content":"{}"},"done":true}"#;
        let parsed: ChatResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.message.content, "{}");
    }
}
