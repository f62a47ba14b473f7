use crate::domain::model::{ProbeResult, ResultSet};
use crate::utils::error::{DigError, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::fmt::Write as _;

/// A finished scan, ready to print.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub email: String,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<String>,
    pub results: ResultSet,
}

fn verdict(result: &ProbeResult) -> &'static str {
    match result.found() {
        Some(true) => "found",
        Some(false) => "not found",
        None => "unknown",
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl ScanReport {
    pub fn render_table(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "═══ Results for {} ═══", self.email);

        for (name, result) in self.results.iter() {
            let mark = match result.found() {
                Some(true) => "✓",
                Some(false) => "✗",
                None => "?",
            };
            let _ = writeln!(out, "{} {}: {}", mark, name, verdict(result));

            if let Some(data) = result.data() {
                for (key, value) in data {
                    if value.is_null() {
                        continue;
                    }
                    let _ = writeln!(out, "  • {}: {}", key, display_value(value));
                }
            }
            if let Some(error) = result.error() {
                let _ = writeln!(out, "  Error: {}", error);
            }
        }

        for name in &self.skipped {
            let _ = writeln!(out, "- {}: skipped (unknown probe)", name);
        }

        let unknown = self
            .results
            .iter()
            .filter(|(_, r)| r.found().is_none())
            .count();
        let _ = writeln!(
            out,
            "Summary: {} found, {} not found, {} unknown ({} probes, {} ms)",
            self.results.found_count(),
            self.results.len() - self.results.found_count() - unknown,
            unknown,
            self.results.len(),
            self.duration_ms
        );
        out
    }

    pub fn render_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// One row per probe: probe, found, evidence, error.
    pub fn render_csv(&self) -> Result<String> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(["probe", "found", "evidence", "error"])?;

        for (name, result) in self.results.iter() {
            let found = match result.found() {
                Some(true) => "true",
                Some(false) => "false",
                None => "unknown",
            };
            writer.write_record([
                name,
                found,
                result.evidence().unwrap_or(""),
                result.error().unwrap_or(""),
            ])?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| DigError::IoError(e.into_error()))?;
        csv_text(bytes)
    }
}

fn csv_text(bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes).map_err(|e| DigError::OutputEncodingError {
        message: format!("CSV output is not UTF-8: {}", e),
    })
}
