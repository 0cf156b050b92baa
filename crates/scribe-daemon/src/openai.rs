use async_trait::async_trait;
use scribe_core::config::GeneratorConfig;
use scribe_core::{Result, ScribeError};
use scribe_pipeline::{ContentGenerator, GenerateRequest};
use serde::Deserialize;
use tracing::{debug, warn};

/// Generator backed by any OpenAI-compatible `/v1/chat/completions` endpoint.
pub struct OpenAiGenerator {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    default_model: String,
    max_tokens: u32,
}

impl OpenAiGenerator {
    pub fn new(config: &GeneratorConfig, api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            default_model: config.model.clone(),
            max_tokens: config.max_tokens,
        }
    }

    fn model_for<'a>(&'a self, req: &'a GenerateRequest) -> &'a str {
        if req.model.trim().is_empty() {
            &self.default_model
        } else {
            &req.model
        }
    }
}

#[async_trait]
impl ContentGenerator for OpenAiGenerator {
    fn name(&self) -> &str {
        "openai"
    }

    async fn generate(&self, req: &GenerateRequest) -> Result<String> {
        let model = self.model_for(req);
        let body = build_request_body(req, model, self.max_tokens);
        let url = format!("{}/v1/chat/completions", self.base_url);

        debug!(%model, provider = %req.provider, "sending generation request");

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ScribeError::Generation(format!("request failed: {e}")))?;

        let status = resp.status().as_u16();
        if status == 429 {
            let retry = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("unknown")
                .to_string();
            return Err(ScribeError::Generation(format!(
                "rate limited, retry after {retry}s"
            )));
        }

        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(status, body = %text, "generation API error");
            return Err(ScribeError::Generation(format!("API error ({status}): {text}")));
        }

        let api_resp: ApiResponse = resp
            .json()
            .await
            .map_err(|e| ScribeError::Generation(format!("unreadable response: {e}")))?;

        Ok(parse_response(api_resp))
    }
}

fn build_request_body(req: &GenerateRequest, model: &str, max_tokens: u32) -> serde_json::Value {
    serde_json::json!({
        "model": model,
        "messages": [
            { "role": "system", "content": req.system },
            { "role": "user", "content": req.user },
        ],
        "max_tokens": max_tokens,
        "stream": false,
    })
}

fn parse_response(resp: ApiResponse) -> String {
    if let Some(usage) = &resp.usage {
        debug!(
            model = %resp.model,
            tokens_in = usage.prompt_tokens,
            tokens_out = usage.completion_tokens,
            "generation finished"
        );
    }
    resp.choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .unwrap_or_default()
}

#[derive(Deserialize)]
struct ApiResponse {
    #[serde(default)]
    model: String,
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(model: &str) -> GenerateRequest {
        GenerateRequest {
            provider: "openai".into(),
            model: model.into(),
            system: "You write for Rust Weekly.".into(),
            user: "Write about lifetimes.".into(),
        }
    }

    #[test]
    fn body_carries_both_prompts() {
        let body = build_request_body(&request("gpt-4o"), "gpt-4o", 1024);
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "Write about lifetimes.");
        assert_eq!(body["max_tokens"], 1024);
    }

    #[test]
    fn job_without_model_uses_configured_default() {
        let generator = OpenAiGenerator::new(&GeneratorConfig::default(), "key".into());
        let req = request("");
        assert_eq!(generator.model_for(&req), "gpt-4o-mini");
        let req = request("custom");
        assert_eq!(generator.model_for(&req), "custom");
    }

    #[test]
    fn first_choice_content_is_returned() {
        let resp: ApiResponse = serde_json::from_str(
            r#"{"model":"m","choices":[{"message":{"content":"Hello"}}],
                "usage":{"prompt_tokens":3,"completion_tokens":1}}"#,
        )
        .unwrap();
        assert_eq!(parse_response(resp), "Hello");

        let empty: ApiResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert_eq!(parse_response(empty), "");
    }
}
