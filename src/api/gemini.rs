use super::types::{ApiErrorEnvelope, GenerateContentRequest, GenerateContentResponse};
use super::GenerativeModel;
use crate::config::Config;
use crate::credentials::ApiKeyStore;
use crate::error::{Result, StoryboardError};
use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};

/// HTTP client for the hosted `generateContent` REST API.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: Client,
    base_url: String,
    keys: ApiKeyStore,
}

impl GeminiClient {
    pub fn new(config: &Config, keys: ApiKeyStore) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout()).build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            keys,
        })
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, model)
    }
}

#[async_trait]
impl GenerativeModel for GeminiClient {
    async fn generate_content(
        &self,
        model: &str,
        request: GenerateContentRequest,
    ) -> Result<GenerateContentResponse> {
        let api_key = self.keys.get().await.ok_or_else(|| {
            StoryboardError::api(401, "UNAUTHENTICATED", "no API key has been selected")
        })?;

        let url = self.endpoint(model);
        debug!("POST {} ({} prompt chars)", url, request.prompt_text().len());

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            warn!("Model API returned HTTP {} for {}", status, model);
            return Err(parse_api_error(status.as_u16(), &body));
        }

        Ok(serde_json::from_str(&body)?)
    }
}

/// Decode the service error envelope; fall back to the raw body when it is not one.
pub(crate) fn parse_api_error(http_status: u16, body: &str) -> StoryboardError {
    match serde_json::from_str::<ApiErrorEnvelope>(body) {
        Ok(envelope) => {
            let code = if envelope.error.code == 0 {
                http_status
            } else {
                envelope.error.code
            };
            StoryboardError::api(code, envelope.error.status, envelope.error.message)
        }
        Err(_) => StoryboardError::api(http_status, "UNKNOWN", body.trim()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_error_envelope() {
        let body = r#"{"error":{"code":404,"message":"Requested entity was not found.","status":"NOT_FOUND"}}"#;
        match parse_api_error(404, body) {
            StoryboardError::ApiError {
                code,
                status,
                message,
            } => {
                assert_eq!(code, 404);
                assert_eq!(status, "NOT_FOUND");
                assert_eq!(message, "Requested entity was not found.");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn keeps_raw_body_when_not_an_envelope() {
        let err = parse_api_error(502, "Bad Gateway\n");
        assert!(matches!(
            err,
            StoryboardError::ApiError { code: 502, ref message, .. } if message == "Bad Gateway"
        ));
        assert!(!err.indicates_invalid_credential());
    }

    #[test]
    fn endpoint_strips_trailing_slash() {
        let config = Config {
            base_url: "http://localhost:8080/".into(),
            ..Config::default()
        };
        let client = GeminiClient::new(&config, ApiKeyStore::default()).unwrap();
        assert_eq!(
            client.endpoint("gemini-3-pro-preview"),
            "http://localhost:8080/v1beta/models/gemini-3-pro-preview:generateContent"
        );
    }

    #[tokio::test]
    async fn missing_key_fails_before_any_request() {
        let client = GeminiClient::new(&Config::default(), ApiKeyStore::default()).unwrap();
        let err = client
            .generate_content("m", GenerateContentRequest::user_text("hi"))
            .await
            .unwrap_err();
        assert!(err.indicates_invalid_credential());
    }
}
