use arbiter_domain::repositories::generation::{
    Generation, ParameterUpdate, SamplingParams, TextGenerator,
};
use serde_json::json;

const MAX_CONFIDENCE: f64 = 0.95;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PromptCategory {
    Mathematical,
    Strategic,
    Creative,
    Logical,
}

impl PromptCategory {
    fn classify(prompt: &str) -> Self {
        let lower = prompt.to_lowercase();
        let has = |words: &[&str]| words.iter().any(|w| lower.contains(w));
        if has(&["calculate", "math", "equation"]) {
            PromptCategory::Mathematical
        } else if has(&["strategy", "strategic", "plan", "choose", "decision"]) {
            PromptCategory::Strategic
        } else if has(&["creative", "innovate", "invent"]) {
            PromptCategory::Creative
        } else {
            PromptCategory::Logical
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            PromptCategory::Mathematical => "mathematical",
            PromptCategory::Strategic => "strategic",
            PromptCategory::Creative => "creative",
            PromptCategory::Logical => "logical",
        }
    }
}

/// Offline backend that answers with category templates.
///
/// The templates never name an action or a symbol, so decisions made from mock output come
/// from the indicator and momentum steps of the parser.
#[derive(Debug, Clone, Default)]
pub struct MockGenerator {
    model: String,
    generation_count: u64,
    update_count: u64,
}

impl MockGenerator {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            generation_count: 0,
            update_count: 0,
        }
    }

    pub fn generation_count(&self) -> u64 {
        self.generation_count
    }
}

impl TextGenerator for MockGenerator {
    fn backend(&self) -> &str {
        "mock"
    }

    fn generate(&mut self, prompt: &str, params: &SamplingParams) -> Result<Generation, String> {
        self.generation_count += 1;
        let updates = self.update_count as f64;
        let category = PromptCategory::classify(prompt);
        let (text, confidence) = match category {
            PromptCategory::Mathematical => (
                format!(
                    "Working through the numbers step by step, the conclusion follows. Temperature: {}",
                    params.temperature
                ),
                0.8 + updates * 0.01,
            ),
            PromptCategory::Strategic => (
                format!(
                    "After weighing the options and their risks, the optimal plan is clear. Parameter updates: {}",
                    self.update_count
                ),
                0.7 + updates * 0.015,
            ),
            PromptCategory::Creative => (
                "Exploring alternatives produced a new approach worth trying.".to_string(),
                0.6 + updates * 0.02,
            ),
            PromptCategory::Logical => (
                format!(
                    "Applying the premises in order leads to a consistent conclusion. Generations: {}",
                    self.generation_count
                ),
                0.75 + updates * 0.012,
            ),
        };

        Ok(Generation {
            text,
            status: "ok".to_string(),
            confidence: Some(confidence.min(MAX_CONFIDENCE)),
            metadata: json!({
                "backend": "mock",
                "model": self.model,
                "category": category.as_str(),
                "generation_count": self.generation_count,
                "update_count": self.update_count,
                "temperature": params.temperature,
                "max_length": params.max_length,
                "prompt_length": prompt.len(),
            }),
        })
    }

    /// Counts the update; later confidences grow with the count.
    fn update_parameters(&mut self, update: &ParameterUpdate) -> Result<(), String> {
        self.update_count += 1;
        tracing::debug!(
            model = %self.model,
            update_count = self.update_count,
            gradients = update.gradients.len(),
            "mock parameters updated"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbiter_domain::services::generation::GenerationHub;
    use std::collections::BTreeMap;

    fn update() -> ParameterUpdate {
        ParameterUpdate {
            gradients: BTreeMap::from([("policy_loss".to_string(), 0.2)]),
            learning_rate: 3e-4,
        }
    }

    #[test]
    fn decision_prompts_get_strategic_template_without_actions() {
        let mut mock = MockGenerator::new("mock-7b");
        let out = mock
            .generate("Please make a trading decision", &SamplingParams::default())
            .expect("mock never fails");
        assert_eq!(out.metadata["category"], "strategic");
        let upper = out.text.to_uppercase();
        assert!(!upper.contains("BUY") && !upper.contains("SELL"));
        assert_eq!(out.confidence, Some(0.7));
    }

    #[test]
    fn confidence_grows_with_updates_and_is_capped() {
        let mut mock = MockGenerator::new("mock");
        for _ in 0..100 {
            mock.update_parameters(&update()).expect("mock accepts updates");
        }
        let out = mock
            .generate("hello", &SamplingParams::default())
            .expect("mock never fails");
        assert_eq!(out.confidence, Some(MAX_CONFIDENCE));
        assert_eq!(mock.generation_count(), 1);
    }

    #[test]
    fn hub_updates_raise_mock_confidence() {
        let hub = GenerationHub::new(Box::new(MockGenerator::new("mock")));
        hub.register_role(
            "trader",
            arbiter_domain::services::generation::RoleConfig {
                label: "Trader".to_string(),
                reasoning_category: "strategic".to_string(),
                temperature: None,
                max_length: None,
            },
        );
        let prompt = "Please make a trading decision";
        let overrides = Default::default();
        let before = hub
            .generate_for_role("trader", prompt, &overrides)
            .expect("mock never fails");
        for _ in 0..2 {
            hub.update_shared_parameters(&update()).expect("mock accepts updates");
        }
        let after = hub
            .generate_for_role("trader", prompt, &overrides)
            .expect("mock never fails");

        assert_eq!(before.confidence, Some(0.7));
        let raised = after.confidence.expect("mock reports confidence");
        assert!((raised - 0.73).abs() < 1e-9);
        assert_eq!(after.metadata["update_count"], 2);
        assert_eq!(hub.global_stats().total_updates, 2);
    }
}
