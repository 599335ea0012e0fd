use arbiter_domain::repositories::generation::{Generation, SamplingParams, TextGenerator};
use serde_json::json;

/// Replays a fixed list of responses, wrapping around at the end.
#[derive(Debug, Clone)]
pub struct ScriptedGenerator {
    responses: Vec<String>,
    cursor: usize,
}

impl ScriptedGenerator {
    pub fn new(responses: Vec<String>) -> Self {
        Self {
            responses,
            cursor: 0,
        }
    }
}

impl TextGenerator for ScriptedGenerator {
    fn backend(&self) -> &str {
        "scripted"
    }

    fn generate(&mut self, _prompt: &str, _params: &SamplingParams) -> Result<Generation, String> {
        if self.responses.is_empty() {
            return Err("scripted generator has no responses".to_string());
        }
        let index = self.cursor % self.responses.len();
        self.cursor += 1;
        Ok(Generation {
            text: self.responses[index].clone(),
            status: "ok".to_string(),
            confidence: None,
            metadata: json!({ "backend": "scripted", "index": index }),
        })
    }
}
