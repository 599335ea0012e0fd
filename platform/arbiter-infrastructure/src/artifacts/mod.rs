use arbiter_domain::repositories::artifacts::ArtifactWriter;
use arbiter_domain::services::audit::AuditEvent;
use serde::Serialize;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Instant;

#[derive(Debug, Default, Clone, Copy)]
pub struct FilesystemArtifactWriter;

impl FilesystemArtifactWriter {
    pub fn new() -> Self {
        Self
    }
}

fn record_write_metrics(kind: &'static str, start: Instant, result: &Result<(), String>) {
    let result_label = if result.is_ok() { "ok" } else { "err" };
    metrics::counter!(
        "arbiter.infra.artifacts.write.calls_total",
        "kind" => kind,
        "result" => result_label
    )
    .increment(1);
    metrics::histogram!("arbiter.infra.artifacts.write_ms", "kind" => kind, "result" => result_label)
        .record(start.elapsed().as_millis() as f64);
}

fn write_lines<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), String> {
    let file = fs::File::create(path)
        .map_err(|err| format!("failed to create {}: {}", path.display(), err))?;
    let mut writer = BufWriter::new(file);
    for row in rows {
        let line = serde_json::to_string(row)
            .map_err(|err| format!("failed to serialize row for {}: {}", path.display(), err))?;
        writer
            .write_all(line.as_bytes())
            .and_then(|_| writer.write_all(b"\n"))
            .map_err(|err| format!("failed to write {}: {}", path.display(), err))?;
    }
    writer
        .flush()
        .map_err(|err| format!("failed to flush {}: {}", path.display(), err))
}

impl ArtifactWriter for FilesystemArtifactWriter {
    fn ensure_dir(&self, path: &Path) -> Result<(), String> {
        let start = Instant::now();
        let result = fs::create_dir_all(path)
            .map_err(|err| format!("failed to create dir {}: {}", path.display(), err));
        record_write_metrics("ensure_dir", start, &result);
        result
    }

    fn write_jsonl(&self, path: &Path, rows: &[serde_json::Value]) -> Result<(), String> {
        let start = Instant::now();
        let result = write_lines(path, rows);
        record_write_metrics("jsonl", start, &result);
        result
    }

    fn write_audit_jsonl(&self, path: &Path, events: &[AuditEvent]) -> Result<(), String> {
        let start = Instant::now();
        let result = write_lines(path, events);
        record_write_metrics("audit_jsonl", start, &result);
        result
    }

    fn write_summary_json(&self, path: &Path, summary: &serde_json::Value) -> Result<(), String> {
        let start = Instant::now();
        let result = serde_json::to_string_pretty(summary)
            .map_err(|err| format!("failed to serialize summary: {err}"))
            .and_then(|body| {
                fs::write(path, body)
                    .map_err(|err| format!("failed to write summary {}: {}", path.display(), err))
            });
        record_write_metrics("summary_json", start, &result);
        result
    }

    fn write_config_snapshot_toml(&self, path: &Path, contents: &str) -> Result<(), String> {
        let start = Instant::now();
        let result = fs::write(path, contents).map_err(|err| {
            format!(
                "failed to write config snapshot {}: {}",
                path.display(),
                err
            )
        });
        record_write_metrics("config_toml", start, &result);
        result
    }
}
