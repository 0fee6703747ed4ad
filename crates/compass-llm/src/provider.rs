use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use tracing::instrument;

use compass_core::analysis::{AnalysisProvider, AnalysisRequest, WeeklyAnalysis};
use compass_core::errors::GenerationError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const TEMPERATURE: f64 = 0.2;

/// Configuration for the AI-proxy provider.
pub struct ProxyConfig {
    pub url: String,
    pub model: String,
    pub api_key: Option<SecretString>,
    pub system_prompt: String,
}

/// Submits analysis requests to an OpenAI-compatible proxy and parses the
/// JSON document the model is instructed to return.
pub struct ProxyProvider {
    client: Client,
    config: ProxyConfig,
}

impl ProxyProvider {
    pub fn new(config: ProxyConfig) -> Result<Self, GenerationError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| GenerationError::InvalidRequest(format!("http client: {e}")))?;

        Ok(Self { client, config })
    }
}

/// The proxy speaks the chat-completions shape: a system prompt carrying the
/// analysis instructions and the structured request as the user message.
pub fn build_request_body(
    config: &ProxyConfig,
    request: &AnalysisRequest,
) -> Result<serde_json::Value, GenerationError> {
    let user_content = serde_json::to_string(request)
        .map_err(|e| GenerationError::InvalidRequest(format!("request payload: {e}")))?;

    Ok(serde_json::json!({
        "model": config.model,
        "messages": [
            {"role": "system", "content": config.system_prompt},
            {"role": "user", "content": user_content},
        ],
        "temperature": TEMPERATURE,
        "response_format": {"type": "json_object"},
    }))
}

/// Extract and parse the analysis document from the proxy response body.
pub fn parse_analysis(body: &serde_json::Value) -> Result<WeeklyAnalysis, GenerationError> {
    let content = body
        .get("content")
        .and_then(|c| c.as_str())
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| GenerationError::InvalidResponse("empty content".to_string()))?;

    serde_json::from_str(content)
        .map_err(|e| GenerationError::InvalidResponse(format!("analysis document: {e}")))
}

#[async_trait]
impl AnalysisProvider for ProxyProvider {
    fn name(&self) -> &str {
        "ai-proxy"
    }

    #[instrument(skip(self, request), fields(mode = %request.mode))]
    async fn analyze(&self, request: &AnalysisRequest) -> Result<WeeklyAnalysis, GenerationError> {
        let body = build_request_body(&self.config, request)?;

        let mut req = self.client.post(&self.config.url).json(&body);
        if let Some(key) = &self.config.api_key {
            req = req.bearer_auth(key.expose_secret());
        }

        let response = req
            .send()
            .await
            .map_err(|e| GenerationError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(GenerationError::from_status(status.as_u16(), text));
        }

        let data: serde_json::Value = response
            .json()
            .await
            .map_err(|e| GenerationError::InvalidResponse(e.to_string()))?;

        parse_analysis(&data)
    }
}
