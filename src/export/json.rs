// Author: kelexine (https://github.com/kelexine)
// export/json.rs — JSON and JSONL report export

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use anyhow::{Context, Result};
use chrono::Utc;
use serde_json::json;
use lockscan::deadlock::Report;

/// The document printed by `--json` and written by `--export *.json`.
pub fn report_document(reports: &[Report]) -> Result<serde_json::Value> {
    let records = reports
        .iter()
        .map(report_to_value)
        .collect::<Result<Vec<_>>>()?;
    Ok(json!({
        "metadata": {
            "timestamp": Utc::now().to_rfc3339(),
            "processes": reports.len(),
            "deadlocks": reports.iter().filter(|r| r.has_cycle()).count(),
            "generator": concat!("lockscan v", env!("CARGO_PKG_VERSION")),
        },
        "reports": records,
    }))
}

pub fn report_to_value(report: &Report) -> Result<serde_json::Value> {
    let mut obj = serde_json::to_value(report)
        .with_context(|| format!("Failed to serialize report for process {:#x}", report.pid))?;
    if let Some(cycle) = &report.cycle {
        obj["deadlocked_threads"] = json!(cycle.threads());
    }
    Ok(obj)
}

pub fn export_json(reports: &[Report], path: &Path) -> Result<()> {
    let f = File::create(path).with_context(|| format!("Cannot create {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(f), &report_document(reports)?)
        .with_context(|| "Failed to serialize JSON")?;

    eprintln!("[SUCCESS] Exported JSON → {}", path.display());
    Ok(())
}

pub fn export_jsonl(reports: &[Report], path: &Path) -> Result<()> {
    let f = File::create(path).with_context(|| format!("Cannot create {}", path.display()))?;
    let mut writer = BufWriter::new(f);

    for report in reports {
        let line = serde_json::to_string(&report_to_value(report)?)
            .with_context(|| "Failed to serialize JSONL record")?;
        writeln!(writer, "{}", line)?;
    }
    writer.flush()?;

    eprintln!("[SUCCESS] Exported JSONL → {}", path.display());
    Ok(())
}
