use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub run_id: String,
    pub step: u64,
    pub timestamp: i64,
    pub stage: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub details: serde_json::Value,
}

impl AuditEvent {
    pub fn new(run_id: &str, step: u64, stage: &str, action: &str) -> Self {
        Self {
            run_id: run_id.to_string(),
            step,
            timestamp: chrono::Utc::now().timestamp_millis(),
            stage: stage.to_string(),
            symbol: None,
            action: action.to_string(),
            error: None,
            details: serde_json::Value::Null,
        }
    }

    pub fn with_symbol(mut self, symbol: &str) -> Self {
        self.symbol = Some(symbol.to_string());
        self
    }

    pub fn with_error(mut self, error: &str) -> Self {
        self.error = Some(error.to_string());
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }
}
