use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::{Config, RequestConfig};
use crate::error::RequestError;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Part {
    pub text: String,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Content {
    pub role: String,
    pub parts: Vec<Part>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct SystemInstruction {
    pub parts: Vec<Part>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
}

/// Body of `POST …:generateContent`
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    pub system_instruction: SystemInstruction,
    pub generation_config: GenerationConfig,
}

impl From<&RequestConfig> for GenerateContentRequest {
    fn from(request: &RequestConfig) -> Self {
        Self {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![Part {
                    text: request.prompt.clone(),
                }],
            }],
            system_instruction: SystemInstruction {
                parts: vec![Part {
                    text: request.system_instruction.clone(),
                }],
            },
            generation_config: GenerationConfig {
                temperature: request.temperature,
                top_k: request.top_k,
                top_p: request.top_p,
            },
        }
    }
}

#[derive(Deserialize, Debug)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Deserialize, Debug)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize, Debug)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize, Debug)]
pub struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

impl GenerateContentResponse {
    /// `candidates[0].content.parts[0].text`, if present and non-empty
    pub fn into_text(self) -> Option<String> {
        self.candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .next()?
            .text
            .filter(|text| !text.is_empty())
    }
}

#[derive(Deserialize, Debug)]
struct ErrorBody {
    message: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ErrorEnvelope {
    error: Option<ErrorBody>,
}

/// Best-effort `error.message` from an error response body
fn parse_error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorEnvelope>(body)
        .ok()?
        .error?
        .message
        .filter(|message| !message.trim().is_empty())
}

#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    url: String,
    api_key: Option<String>,
}

impl GeminiClient {
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::new(),
            url: config.generate_url(),
            api_key: config.resolve_api_key(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Perform one generate call and classify its reply.
    ///
    /// No deadline is applied here; the request lifecycle owns cancellation.
    pub async fn generate(&self, request: &RequestConfig) -> Result<String, RequestError> {
        let body = GenerateContentRequest::from(request);
        let timeout = request.timeout();

        let mut builder = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.query(&[("key", key.as_str())]);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| RequestError::from_transport(e, timeout))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = parse_error_message(&text)
                .unwrap_or_else(|| format!("API request failed with status {}", status.as_u16()));
            return Err(RequestError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| RequestError::from_transport(e, timeout))?;
        let parsed: GenerateContentResponse =
            serde_json::from_slice(&bytes).map_err(|_| RequestError::UnexpectedFormat)?;

        parsed.into_text().ok_or(RequestError::UnexpectedFormat)
    }

    pub fn list_models() -> Vec<String> {
        vec![
            "gemini-1.5-flash".to_string(),
            "gemini-1.5-pro".to_string(),
            "gemini-2.0-flash".to_string(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_body_shape() {
        let request = Config::default().request_for("explain quicksort");
        let body = serde_json::to_value(GenerateContentRequest::from(&request)).unwrap();

        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "explain quicksort");
        assert!(body["systemInstruction"]["parts"][0]["text"]
            .as_str()
            .unwrap()
            .starts_with("You are a Coding Instructor AI"));
        assert_eq!(body["generationConfig"]["topK"], 40);
        assert_eq!(body["generationConfig"]["temperature"], json!(0.5f32));
        assert_eq!(body["generationConfig"]["topP"], json!(0.95f32));
    }

    #[test]
    fn test_into_text_reads_nested_field() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{ "content": { "parts": [{ "text": "hello" }], "role": "model" } }]
        }))
        .unwrap();
        assert_eq!(response.into_text().as_deref(), Some("hello"));
    }

    #[test]
    fn test_into_text_missing_or_empty() {
        let empty: GenerateContentResponse = serde_json::from_value(json!({})).unwrap();
        assert!(empty.into_text().is_none());

        let no_parts: GenerateContentResponse =
            serde_json::from_value(json!({ "candidates": [{ "content": {} }] })).unwrap();
        assert!(no_parts.into_text().is_none());

        let blank: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{ "content": { "parts": [{ "text": "" }] } }]
        }))
        .unwrap();
        assert!(blank.into_text().is_none());
    }

    #[test]
    fn test_parse_error_message() {
        assert_eq!(
            parse_error_message(r#"{"error":{"code":400,"message":"API key not valid"}}"#).as_deref(),
            Some("API key not valid")
        );
        assert!(parse_error_message("<html>oops</html>").is_none());
        assert!(parse_error_message("").is_none());
        assert!(parse_error_message(r#"{"error":{}}"#).is_none());
    }

    #[test]
    fn test_client_from_config() {
        let config = Config {
            endpoint: "http://localhost:9000/v1beta".to_string(),
            model: "gemini-2.0-flash".to_string(),
            api_key: Some("stored-key".to_string()),
            ..Config::default()
        };
        let client = GeminiClient::new(&config);

        assert_eq!(
            client.url(),
            "http://localhost:9000/v1beta/models/gemini-2.0-flash:generateContent"
        );
        assert!(client.has_api_key());
        assert!(GeminiClient::list_models().contains(&config.model));
    }
}
