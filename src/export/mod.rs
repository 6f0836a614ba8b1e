// Author: kelexine (https://github.com/kelexine)
// export/mod.rs — Export dispatcher

pub mod json;

use std::path::Path;
use anyhow::Result;
use lockscan::deadlock::Report;

pub enum ExportFormat {
    Json,
    Jsonl,
}

impl ExportFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "json"  => Some(Self::Json),
            "jsonl" => Some(Self::Jsonl),
            _ => None,
        }
    }
}

pub fn export(reports: &[Report], path: &Path) -> Result<()> {
    match ExportFormat::from_path(path) {
        Some(ExportFormat::Json)  => json::export_json(reports, path),
        Some(ExportFormat::Jsonl) => json::export_jsonl(reports, path),
        None => anyhow::bail!(
            "Unsupported export format '{}'. Use .json or .jsonl",
            path.extension().and_then(|e| e.to_str()).unwrap_or("?")
        ),
    }
}
