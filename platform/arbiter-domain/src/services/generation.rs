use crate::repositories::generation::{
    Generation, GenerationOverrides, ParameterUpdate, SamplingParams, TextGenerator,
};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoleConfig {
    pub label: String,
    pub reasoning_category: String,
    pub temperature: Option<f64>,
    pub max_length: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RoleUsage {
    pub generation_count: u64,
    pub error_count: u64,
    pub total_tokens: u64,
    pub last_used: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoleStats {
    pub role: String,
    pub config: RoleConfig,
    pub usage: RoleUsage,
    pub registered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GlobalStats {
    pub backend: String,
    pub registered_roles: usize,
    pub total_generations: u64,
    pub total_errors: u64,
    pub total_updates: u64,
}

/// Result of a shared update: the hub-wide update count and the roles that see it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateReceipt {
    pub update_count: u64,
    pub affected_roles: Vec<String>,
    pub learning_rate: f64,
}

struct RoleEntry {
    config: RoleConfig,
    usage: RoleUsage,
    registered_at: DateTime<Utc>,
}

struct HubState {
    backend: Box<dyn TextGenerator>,
    defaults: SamplingParams,
    roles: BTreeMap<String, RoleEntry>,
    total_updates: u64,
}

/// One generation backend shared by every registered role.
///
/// Cloning the hub shares the backend. A single lock guards the backend and the usage
/// table, and is held for the duration of a generation or update call.
#[derive(Clone)]
pub struct GenerationHub {
    inner: Arc<Mutex<HubState>>,
}

impl GenerationHub {
    pub fn new(backend: Box<dyn TextGenerator>) -> Self {
        Self::with_defaults(backend, SamplingParams::default())
    }

    pub fn with_defaults(backend: Box<dyn TextGenerator>, defaults: SamplingParams) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HubState {
                backend,
                defaults,
                roles: BTreeMap::new(),
                total_updates: 0,
            })),
        }
    }

    /// Registers `role`. Registering again replaces the config and keeps the usage counters.
    pub fn register_role(&self, role: &str, config: RoleConfig) {
        let mut state = self.inner.lock();
        match state.roles.get_mut(role) {
            Some(entry) => entry.config = config,
            None => {
                state.roles.insert(
                    role.to_string(),
                    RoleEntry {
                        config,
                        usage: RoleUsage::default(),
                        registered_at: Utc::now(),
                    },
                );
            }
        }
        tracing::debug!(role, "generation role registered");
    }

    pub fn generate_for_role(
        &self,
        role: &str,
        prompt: &str,
        overrides: &GenerationOverrides,
    ) -> Result<Generation, String> {
        let mut guard = self.inner.lock();
        let state = &mut *guard;
        let entry = state
            .roles
            .get_mut(role)
            .ok_or_else(|| format!("generation role not registered: {role}"))?;

        let mut params = state.defaults.clone();
        if let Some(temperature) = entry.config.temperature {
            params.temperature = temperature;
        }
        if let Some(max_length) = entry.config.max_length {
            params.max_length = max_length;
        }
        params.reasoning_category = Some(entry.config.reasoning_category.clone());
        overrides.apply(&mut params);

        let span = tracing::debug_span!(
            "generation.generate",
            role,
            backend = %state.backend.backend(),
            temperature = params.temperature,
            max_new_tokens = params.token_budget()
        );
        let _enter = span.enter();

        let start = Instant::now();
        let result = state.backend.generate(prompt, &params);
        let elapsed_ms = start.elapsed().as_millis() as f64;
        entry.usage.last_used = Some(Utc::now());

        match result {
            Ok(mut generation) => {
                entry.usage.generation_count += 1;
                entry.usage.total_tokens += generation.text.split_whitespace().count() as u64;
                if let serde_json::Value::Object(map) = &mut generation.metadata {
                    map.insert("role".to_string(), serde_json::json!(role));
                } else {
                    generation.metadata = serde_json::json!({ "role": role });
                }
                metrics::counter!("arbiter.generation.calls_total", "result" => "ok")
                    .increment(1);
                metrics::histogram!("arbiter.generation.call_ms", "result" => "ok")
                    .record(elapsed_ms);
                Ok(generation)
            }
            Err(err) => {
                entry.usage.error_count += 1;
                metrics::counter!("arbiter.generation.calls_total", "result" => "error")
                    .increment(1);
                metrics::histogram!("arbiter.generation.call_ms", "result" => "error")
                    .record(elapsed_ms);
                tracing::debug!(error = %err, "generation backend failed");
                Err(err)
            }
        }
    }

    /// Applies `update` to the shared backend. Every registered role sees the new
    /// parameters on its next generation. A rejected update leaves the count unchanged.
    pub fn update_shared_parameters(
        &self,
        update: &ParameterUpdate,
    ) -> Result<UpdateReceipt, String> {
        let mut state = self.inner.lock();
        if let Err(err) = state.backend.update_parameters(update) {
            metrics::counter!("arbiter.generation.updates_total", "result" => "error")
                .increment(1);
            return Err(format!(
                "failed to update {} parameters: {err}",
                state.backend.backend()
            ));
        }
        state.total_updates += 1;
        metrics::counter!("arbiter.generation.updates_total", "result" => "ok").increment(1);
        tracing::debug!(
            backend = %state.backend.backend(),
            update_count = state.total_updates,
            learning_rate = update.learning_rate,
            "shared parameters updated"
        );
        Ok(UpdateReceipt {
            update_count: state.total_updates,
            affected_roles: state.roles.keys().cloned().collect(),
            learning_rate: update.learning_rate,
        })
    }

    pub fn role_stats(&self, role: &str) -> Option<RoleStats> {
        let state = self.inner.lock();
        state.roles.get(role).map(|entry| RoleStats {
            role: role.to_string(),
            config: entry.config.clone(),
            usage: entry.usage.clone(),
            registered_at: entry.registered_at,
        })
    }

    pub fn global_stats(&self) -> GlobalStats {
        let state = self.inner.lock();
        GlobalStats {
            backend: state.backend.backend().to_string(),
            registered_roles: state.roles.len(),
            total_generations: state
                .roles
                .values()
                .map(|entry| entry.usage.generation_count)
                .sum(),
            total_errors: state.roles.values().map(|entry| entry.usage.error_count).sum(),
            total_updates: state.total_updates,
        }
    }
}
