use crate::trading_loop::LoopSummary;
use arbiter_domain::repositories::artifacts::ArtifactWriter;
use std::path::{Path, PathBuf};

/// Writes `iterations.jsonl`, `audit.jsonl`, `summary.json` and `config.toml` under
/// `<out_dir>/<run_id>/` and returns that directory.
pub fn write_run_artifacts(
    summary: &LoopSummary,
    config_toml: &str,
    out_dir: &Path,
    artifacts: &dyn ArtifactWriter,
) -> Result<PathBuf, String> {
    let _span = tracing::info_span!("write_run_artifacts", run_id = %summary.run_id).entered();
    let run_dir = out_dir.join(&summary.run_id);
    artifacts.ensure_dir(&run_dir)?;

    let rows = summary
        .iterations
        .iter()
        .map(|iteration| {
            serde_json::to_value(iteration)
                .map_err(|err| format!("failed to serialize iteration {}: {}", iteration.step, err))
        })
        .collect::<Result<Vec<_>, String>>()?;
    artifacts.write_jsonl(&run_dir.join("iterations.jsonl"), &rows)?;
    artifacts.write_audit_jsonl(&run_dir.join("audit.jsonl"), &summary.audit_events)?;

    let summary_json = summary_json(summary)?;
    artifacts.write_summary_json(&run_dir.join("summary.json"), &summary_json)?;
    artifacts.write_config_snapshot_toml(&run_dir.join("config.toml"), config_toml)?;

    tracing::info!(run_dir = %run_dir.display(), "run artifacts written");
    Ok(run_dir)
}

/// Summary without the per-iteration detail.
pub fn summary_json(summary: &LoopSummary) -> Result<serde_json::Value, String> {
    let mut value = serde_json::to_value(summary)
        .map_err(|err| format!("failed to serialize summary: {err}"))?;
    if let serde_json::Value::Object(map) = &mut value {
        map.remove("iterations");
        map.remove("audit_events");
    }
    Ok(value)
}
