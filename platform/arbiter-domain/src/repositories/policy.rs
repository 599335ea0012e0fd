use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StateFeatures {
    pub market_volatility: f64,
    pub portfolio_value: f64,
    pub cash_ratio: f64,
    pub position_count: f64,
    pub decision_type: f64,
}

impl StateFeatures {
    pub const DIM: usize = 5;

    pub fn as_vec(&self) -> [f64; Self::DIM] {
        [
            self.market_volatility,
            self.portfolio_value,
            self.cash_ratio,
            self.position_count,
            self.decision_type,
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experience {
    pub features: StateFeatures,
    /// JSON-serialized decision.
    pub action: String,
    pub reward: f64,
    pub done: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateStatus {
    Updated,
    Buffering,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyUpdate {
    pub status: UpdateStatus,
    pub training_step: u64,
    pub buffer_len: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_loss: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_loss: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entropy: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean_reward: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingStats {
    pub training_step: u64,
    pub algorithm: String,
    pub buffered: usize,
    pub total_experiences: u64,
    pub mean_reward: f64,
}

pub trait PolicyUpdater {
    fn add_experience(&mut self, experience: Experience);

    fn update_policy(&mut self) -> PolicyUpdate;

    fn training_stats(&self) -> TrainingStats;
}
