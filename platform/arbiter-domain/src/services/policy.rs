use crate::repositories::policy::{
    Experience, PolicyUpdate, PolicyUpdater, StateFeatures, TrainingStats, UpdateStatus,
};
use crate::value_objects::action_type::ActionType;
use crate::value_objects::trade_decision::TradeDecision;
use serde::{Deserialize, Serialize};

const DIM: usize = StateFeatures::DIM;
const ACTIONS: usize = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PpoConfig {
    pub learning_rate: f64,
    pub gamma: f64,
    pub gae_lambda: f64,
    pub clip_ratio: f64,
    pub value_loss_coef: f64,
    pub entropy_coef: f64,
    pub max_grad_norm: f64,
    pub batch_size: usize,
    pub mini_batch_size: usize,
    pub ppo_epochs: usize,
    pub target_kl: f64,
}

impl Default for PpoConfig {
    fn default() -> Self {
        Self {
            learning_rate: 3e-4,
            gamma: 0.99,
            gae_lambda: 0.95,
            clip_ratio: 0.2,
            value_loss_coef: 0.5,
            entropy_coef: 0.01,
            max_grad_norm: 0.5,
            batch_size: 32,
            mini_batch_size: 8,
            ppo_epochs: 4,
            target_kl: 0.01,
        }
    }
}

/// Feature squashing so that portfolio values and ratios share a scale.
fn encode(features: &StateFeatures) -> [f64; DIM] {
    features
        .as_vec()
        .map(|x| if x.is_finite() { x.signum() * x.abs().ln_1p() } else { 0.0 })
}

fn action_index(experience: &Experience) -> usize {
    let fallback = if experience.features.decision_type >= 1.5 {
        ActionType::Sell
    } else {
        ActionType::Buy
    };
    let action = serde_json::from_str::<TradeDecision>(&experience.action)
        .map(|decision| decision.action)
        .unwrap_or(fallback);
    match action {
        ActionType::Buy => 0,
        ActionType::Sell => 1,
    }
}

fn softmax(logits: [f64; ACTIONS]) -> [f64; ACTIONS] {
    let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exp = logits.map(|z| (z - max).exp());
    let sum: f64 = exp.iter().sum();
    exp.map(|e| e / sum)
}

fn entropy(probs: &[f64; ACTIONS]) -> f64 {
    -probs
        .iter()
        .map(|p| if *p > 0.0 { p * p.ln() } else { 0.0 })
        .sum::<f64>()
}

#[derive(Default)]
struct Gradients {
    actor_w: [[f64; DIM]; ACTIONS],
    actor_b: [f64; ACTIONS],
    critic_w: [f64; DIM],
    critic_b: f64,
}

impl Gradients {
    fn norm(&self) -> f64 {
        let actor: f64 = self.actor_w.iter().flatten().map(|g| g * g).sum();
        let bias: f64 = self.actor_b.iter().map(|g| g * g).sum();
        let critic: f64 = self.critic_w.iter().map(|g| g * g).sum();
        (actor + bias + critic + self.critic_b * self.critic_b).sqrt()
    }
}

/// Clipped-surrogate PPO over a linear softmax actor (BUY/SELL) and a linear critic.
pub struct PpoTrainer {
    config: PpoConfig,
    actor_w: [[f64; DIM]; ACTIONS],
    actor_b: [f64; ACTIONS],
    critic_w: [f64; DIM],
    critic_b: f64,
    buffer: Vec<Experience>,
    training_step: u64,
    total_experiences: u64,
    reward_sum: f64,
}

impl PpoTrainer {
    pub const ALGORITHM: &'static str = "PPO";

    pub fn new(config: PpoConfig) -> Self {
        Self {
            config,
            actor_w: [[0.0; DIM]; ACTIONS],
            actor_b: [0.0; ACTIONS],
            critic_w: [0.0; DIM],
            critic_b: 0.0,
            buffer: Vec::new(),
            training_step: 0,
            total_experiences: 0,
            reward_sum: 0.0,
        }
    }

    fn probs(&self, x: &[f64; DIM]) -> [f64; ACTIONS] {
        let mut logits = self.actor_b;
        for (k, logit) in logits.iter_mut().enumerate() {
            *logit += self.actor_w[k].iter().zip(x).map(|(w, v)| w * v).sum::<f64>();
        }
        softmax(logits)
    }

    fn value(&self, x: &[f64; DIM]) -> f64 {
        self.critic_b + self.critic_w.iter().zip(x).map(|(w, v)| w * v).sum::<f64>()
    }

    /// Current `[P(BUY), P(SELL)]` for a state.
    pub fn action_probabilities(&self, features: &StateFeatures) -> [f64; ACTIONS] {
        self.probs(&encode(features))
    }

    fn advantages(&self, batch: &[Experience], values: &[f64]) -> (Vec<f64>, Vec<f64>) {
        let n = batch.len();
        let mut advantages = vec![0.0; n];
        let mut running = 0.0;
        for t in (0..n).rev() {
            let not_done = if batch[t].done { 0.0 } else { 1.0 };
            let next_value = if t + 1 < n { values[t + 1] } else { 0.0 };
            let delta = batch[t].reward + self.config.gamma * next_value * not_done - values[t];
            running = delta + self.config.gamma * self.config.gae_lambda * not_done * running;
            advantages[t] = running;
        }
        let returns = advantages.iter().zip(values).map(|(a, v)| a + v).collect();

        let mean = advantages.iter().sum::<f64>() / n as f64;
        let var = advantages.iter().map(|a| (a - mean).powi(2)).sum::<f64>() / n as f64;
        let std = var.sqrt() + 1e-8;
        for adv in advantages.iter_mut() {
            *adv = (*adv - mean) / std;
        }
        (advantages, returns)
    }

    fn apply(&mut self, mut grads: Gradients) {
        let norm = grads.norm();
        if norm > self.config.max_grad_norm && norm > 0.0 {
            let scale = self.config.max_grad_norm / norm;
            grads.actor_w.iter_mut().flatten().for_each(|g| *g *= scale);
            grads.actor_b.iter_mut().for_each(|g| *g *= scale);
            grads.critic_w.iter_mut().for_each(|g| *g *= scale);
            grads.critic_b *= scale;
        }
        let lr = self.config.learning_rate;
        for k in 0..ACTIONS {
            for j in 0..DIM {
                self.actor_w[k][j] -= lr * grads.actor_w[k][j];
            }
            self.actor_b[k] -= lr * grads.actor_b[k];
        }
        for j in 0..DIM {
            self.critic_w[j] -= lr * grads.critic_w[j];
        }
        self.critic_b -= lr * grads.critic_b;
    }

    fn train(&mut self, batch: Vec<Experience>) -> PolicyUpdate {
        let n = batch.len();
        let states: Vec<[f64; DIM]> = batch.iter().map(|e| encode(&e.features)).collect();
        let actions: Vec<usize> = batch.iter().map(action_index).collect();
        let values: Vec<f64> = states.iter().map(|s| self.value(s)).collect();
        let (advantages, returns) = self.advantages(&batch, &values);
        let old_log_probs: Vec<f64> = states
            .iter()
            .zip(&actions)
            .map(|(s, a)| self.probs(s)[*a].max(1e-12).ln())
            .collect();

        let clip = self.config.clip_ratio;
        let mini = self.config.mini_batch_size.max(1);
        let mut policy_loss = 0.0;
        let mut value_loss = 0.0;
        let mut entropy_sum = 0.0;
        let mut samples = 0usize;

        for epoch in 0..self.config.ppo_epochs.max(1) {
            for chunk in (0..n).collect::<Vec<_>>().chunks(mini) {
                let m = chunk.len() as f64;
                let mut grads = Gradients::default();
                for &i in chunk {
                    let s = &states[i];
                    let a = actions[i];
                    let adv = advantages[i];
                    let probs = self.probs(s);
                    let ratio = (probs[a].max(1e-12).ln() - old_log_probs[i]).exp();
                    let clipped = ratio.clamp(1.0 - clip, 1.0 + clip);
                    let unclipped_active = ratio * adv <= clipped * adv;
                    let h = entropy(&probs);
                    policy_loss -= (ratio * adv).min(clipped * adv);
                    entropy_sum += h;

                    for k in 0..ACTIONS {
                        let onehot = if k == a { 1.0 } else { 0.0 };
                        let mut g = 0.0;
                        if unclipped_active {
                            g -= adv * ratio * (onehot - probs[k]);
                        }
                        g += self.config.entropy_coef * probs[k] * (probs[k].max(1e-12).ln() + h);
                        grads.actor_b[k] += g / m;
                        for j in 0..DIM {
                            grads.actor_w[k][j] += g * s[j] / m;
                        }
                    }

                    let err = self.value(s) - returns[i];
                    value_loss += err * err;
                    let gv = 2.0 * self.config.value_loss_coef * err / m;
                    grads.critic_b += gv;
                    for j in 0..DIM {
                        grads.critic_w[j] += gv * s[j];
                    }
                    samples += 1;
                }
                self.apply(grads);
            }

            let approx_kl = states
                .iter()
                .zip(&actions)
                .zip(&old_log_probs)
                .map(|((s, a), old)| old - self.probs(s)[*a].max(1e-12).ln())
                .sum::<f64>()
                / n as f64;
            if approx_kl > 1.5 * self.config.target_kl {
                tracing::debug!(epoch, approx_kl, "ppo early stop on kl");
                break;
            }
        }

        self.training_step += 1;
        let denom = samples.max(1) as f64;
        let update = PolicyUpdate {
            status: UpdateStatus::Updated,
            training_step: self.training_step,
            buffer_len: 0,
            policy_loss: Some(policy_loss / denom),
            value_loss: Some(value_loss / denom),
            entropy: Some(entropy_sum / denom),
            mean_reward: Some(batch.iter().map(|e| e.reward).sum::<f64>() / n as f64),
        };
        tracing::info!(
            training_step = update.training_step,
            batch = n,
            policy_loss = update.policy_loss,
            value_loss = update.value_loss,
            "policy updated"
        );
        metrics::counter!("arbiter.policy.updates_total").increment(1);
        update
    }
}

impl PolicyUpdater for PpoTrainer {
    fn add_experience(&mut self, experience: Experience) {
        self.total_experiences += 1;
        self.reward_sum += experience.reward;
        self.buffer.push(experience);
    }

    fn update_policy(&mut self) -> PolicyUpdate {
        if self.buffer.is_empty() || self.buffer.len() < self.config.batch_size {
            return PolicyUpdate {
                status: UpdateStatus::Buffering,
                training_step: self.training_step,
                buffer_len: self.buffer.len(),
                policy_loss: None,
                value_loss: None,
                entropy: None,
                mean_reward: None,
            };
        }
        let batch = std::mem::take(&mut self.buffer);
        self.train(batch)
    }

    fn training_stats(&self) -> TrainingStats {
        TrainingStats {
            training_step: self.training_step,
            algorithm: Self::ALGORITHM.to_string(),
            buffered: self.buffer.len(),
            total_experiences: self.total_experiences,
            mean_reward: if self.total_experiences == 0 {
                0.0
            } else {
                self.reward_sum / self.total_experiences as f64
            },
        }
    }
}
