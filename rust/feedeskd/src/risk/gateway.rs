use serde_json::Value;
use tracing::{debug, error, info};

use super::{completion_body, parse_tool_call, render_prompt, RiskAnalysis, RiskError, RiskRequest};
use crate::config::Config;

/// Client for the hosted chat-completion gateway.
///
/// One call per assessment: no retry, no caching, no rate limiting.
#[derive(Debug, Clone)]
pub struct GatewayClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl GatewayClient {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.gateway_url.clone(),
            config.gateway_model.clone(),
            config.api_key.clone(),
        )
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }

    pub async fn assess(&self, req: &RiskRequest) -> Result<RiskAnalysis, RiskError> {
        let api_key = self.api_key.as_deref().ok_or(RiskError::MissingCredential)?;

        let body = completion_body(&self.model, &render_prompt(req));
        info!(model = %self.model, "requesting risk analysis");
        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), body = %text, "AI gateway error");
            return Err(RiskError::Gateway(status.as_u16()));
        }

        let data: Value = response.json().await?;
        debug!(response = %data, "AI gateway response");
        parse_tool_call(&data)
    }
}
