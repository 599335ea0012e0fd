use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Fully merged sampling parameters handed to a backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams {
    pub temperature: f64,
    pub max_length: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_new_tokens: Option<u32>,
    pub do_sample: bool,
    pub top_p: f64,
    pub top_k: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pad_token_id: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_category: Option<String>,
}

impl SamplingParams {
    /// Token budget for the completion: `max_new_tokens` when set, else `max_length`.
    pub fn token_budget(&self) -> u32 {
        self.max_new_tokens.unwrap_or(self.max_length)
    }
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_length: 512,
            max_new_tokens: None,
            do_sample: true,
            top_p: 0.9,
            top_k: 50,
            pad_token_id: None,
            reasoning_category: None,
        }
    }
}

/// Per-call overrides; anything set here wins over role and backend defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationOverrides {
    pub temperature: Option<f64>,
    pub max_new_tokens: Option<u32>,
    pub do_sample: Option<bool>,
    pub top_p: Option<f64>,
    pub top_k: Option<u32>,
    pub pad_token_id: Option<u32>,
}

impl GenerationOverrides {
    pub fn apply(&self, params: &mut SamplingParams) {
        if let Some(value) = self.temperature {
            params.temperature = value;
        }
        if let Some(value) = self.max_new_tokens {
            params.max_new_tokens = Some(value);
        }
        if let Some(value) = self.do_sample {
            params.do_sample = value;
        }
        if let Some(value) = self.top_p {
            params.top_p = value;
        }
        if let Some(value) = self.top_k {
            params.top_k = value;
        }
        if let Some(value) = self.pad_token_id {
            params.pad_token_id = Some(value);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Generation {
    pub text: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    pub metadata: serde_json::Value,
}

/// Gradient-style signal pushed to the shared backend after a policy step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterUpdate {
    pub gradients: BTreeMap<String, f64>,
    pub learning_rate: f64,
}

pub trait TextGenerator: Send {
    fn backend(&self) -> &str;

    fn generate(&mut self, prompt: &str, params: &SamplingParams) -> Result<Generation, String>;

    /// Backends without tunable state accept updates and ignore them.
    fn update_parameters(&mut self, _update: &ParameterUpdate) -> Result<(), String> {
        Ok(())
    }
}
