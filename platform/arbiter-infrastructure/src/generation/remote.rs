use arbiter_domain::repositories::generation::{Generation, SamplingParams, TextGenerator};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::{Duration, Instant};

pub const API_KEY_ENV: &str = "ARBITER_API_KEY";

#[derive(Debug, Clone)]
pub struct RemoteGeneratorConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout_ms: u64,
    pub system_prompt: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f64,
    pub top_p: f64,
    pub max_tokens: u32,
    pub n: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
    pub usage: Option<ChatUsage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoice {
    pub message: ChatChoiceMessage,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatUsage {
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
    pub total_tokens: Option<u64>,
}

/// OpenAI-compatible chat-completions backend. One attempt per call; the caller decides
/// what to do on failure.
pub struct RemoteGenerator {
    config: RemoteGeneratorConfig,
    client: Client,
}

impl RemoteGenerator {
    pub fn new(mut config: RemoteGeneratorConfig) -> Result<Self, String> {
        if config.base_url.trim().is_empty() {
            return Err("remote generator url must not be empty".to_string());
        }
        if config.api_key.is_none() {
            config.api_key = std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty());
        }
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|err| format!("failed to build http client: {err}"))?;
        Ok(Self { config, client })
    }

    pub fn endpoint(&self) -> String {
        format!(
            "{}/v1/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }

    pub fn build_request(&self, prompt: &str, params: &SamplingParams) -> ChatCompletionRequest {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = self.config.system_prompt.as_ref() {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: system.clone(),
            });
        }
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: prompt.to_string(),
        });
        ChatCompletionRequest {
            model: self.config.model.clone(),
            messages,
            temperature: if params.do_sample { params.temperature } else { 0.0 },
            top_p: params.top_p,
            max_tokens: params.token_budget(),
            n: 1,
        }
    }

    fn call(&self, prompt: &str, params: &SamplingParams) -> Result<Generation, String> {
        let endpoint = self.endpoint();
        let request = self.build_request(prompt, params);
        let mut builder = self.client.post(&endpoint).json(&request);
        if let Some(key) = self.config.api_key.as_ref() {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .map_err(|err| format!("generation request to {endpoint} failed: {err}"))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            let preview: String = body.chars().take(200).collect();
            return Err(format!("generation endpoint returned {status}: {preview}"));
        }
        let parsed: ChatCompletionResponse = response
            .json()
            .map_err(|err| format!("failed to parse generation response: {err}"))?;
        into_generation(parsed, &self.config.model)
    }
}

pub fn into_generation(response: ChatCompletionResponse, model: &str) -> Result<Generation, String> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| "generation response has no choices".to_string())?;
    let text = choice
        .message
        .content
        .filter(|text| !text.trim().is_empty())
        .ok_or_else(|| "generation response has empty content".to_string())?;
    Ok(Generation {
        text,
        status: "ok".to_string(),
        confidence: None,
        metadata: json!({
            "backend": "remote",
            "model": model,
            "finish_reason": choice.finish_reason,
            "usage": response.usage,
        }),
    })
}

impl TextGenerator for RemoteGenerator {
    fn backend(&self) -> &str {
        "remote"
    }

    fn generate(&mut self, prompt: &str, params: &SamplingParams) -> Result<Generation, String> {
        let span = tracing::info_span!(
            "infra.generation.remote",
            base_url = %self.config.base_url,
            model = %self.config.model,
            timeout_ms = self.config.timeout_ms
        );
        let _enter = span.enter();

        metrics::counter!("arbiter.infra.generation.requests_total", "backend" => "remote")
            .increment(1);
        let start = Instant::now();
        let result = self.call(prompt, params);
        let result_label = if result.is_ok() { "ok" } else { "err" };
        metrics::histogram!(
            "arbiter.infra.generation.call_ms",
            "backend" => "remote",
            "result" => result_label
        )
        .record(start.elapsed().as_millis() as f64);

        if let Err(err) = &result {
            metrics::counter!("arbiter.infra.generation.errors_total", "backend" => "remote")
                .increment(1);
            tracing::warn!(error = %err, "remote generation failed");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generator() -> RemoteGenerator {
        RemoteGenerator::new(RemoteGeneratorConfig {
            base_url: "http://127.0.0.1:9/".to_string(),
            model: "test-model".to_string(),
            api_key: Some("secret".to_string()),
            timeout_ms: 200,
            system_prompt: Some("You are a trading decision expert.".to_string()),
        })
        .expect("client builds")
    }

    #[test]
    fn endpoint_trims_trailing_slash() {
        assert_eq!(
            generator().endpoint(),
            "http://127.0.0.1:9/v1/chat/completions"
        );
    }

    #[test]
    fn request_uses_merged_sampling_params() {
        let params = SamplingParams {
            max_new_tokens: Some(128),
            do_sample: false,
            ..SamplingParams::default()
        };
        let request = generator().build_request("prompt", &params);
        assert_eq!(request.max_tokens, 128);
        assert_eq!(request.temperature, 0.0);
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[1].content, "prompt");
    }

    #[test]
    fn empty_url_is_rejected() {
        let err = RemoteGenerator::new(RemoteGeneratorConfig {
            base_url: " ".to_string(),
            model: "m".to_string(),
            api_key: None,
            timeout_ms: 100,
            system_prompt: None,
        })
        .err()
        .expect("empty url");
        assert!(err.contains("url"));
    }

    #[test]
    fn response_without_choices_is_an_error() {
        let response: ChatCompletionResponse =
            serde_json::from_str(r#"{"choices": []}"#).expect("valid json");
        assert!(into_generation(response, "m").is_err());

        let response: ChatCompletionResponse = serde_json::from_str(
            r#"{"choices": [{"message": {"content": "BUY AAPL 10"}, "finish_reason": "stop"}],
                "usage": {"prompt_tokens": 5, "completion_tokens": 3, "total_tokens": 8}}"#,
        )
        .expect("valid json");
        let generation = into_generation(response, "m").expect("one choice");
        assert_eq!(generation.text, "BUY AAPL 10");
        assert_eq!(generation.metadata["usage"]["total_tokens"], 8);
    }

    #[test]
    fn unreachable_endpoint_fails_without_panicking() {
        let mut remote = generator();
        let result = remote.generate("prompt", &SamplingParams::default());
        assert!(result.is_err());
    }
}
