// Author: kelexine (https://github.com/kelexine)
// deadlock/dump.rs — File-backed snapshot source for captured target state
//
// Dump layout:
//
//   { "processes": [
//       { "pid": "0x1010200", "name": "game.self",
//         "primitives": [
//           { "id": 1, "name": "render_mutex", "owner": 257, "waiters": [258] },
//           { "id": 2, "error": "target busy" } ] } ] }
//
// Ids are JSON integers or strings in `parse_integer` syntax (hex allowed).

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::{self, Deserializer};
use serde::Deserialize;
use thiserror::Error;

use super::collect::{PrimitiveInfo, SnapshotSource, SourceError};
use super::{PrimitiveId, ProcessId, ThreadId};
use crate::args::FromToken;

#[derive(Debug, Error)]
pub enum DumpError {
    #[error("cannot read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed dump: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Deserialize)]
pub struct PrimitiveRecord {
    #[serde(deserialize_with = "de_id")]
    pub id: PrimitiveId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "de_opt_id")]
    pub owner: Option<ThreadId>,
    #[serde(default, deserialize_with = "de_ids")]
    pub waiters: Vec<ThreadId>,
    /// Detail query failure recorded at capture time.
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProcessRecord {
    #[serde(deserialize_with = "de_id")]
    pub pid: ProcessId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub primitives: Vec<PrimitiveRecord>,
}

/// A captured dump of one or more processes.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DumpSource {
    #[serde(default)]
    processes: Vec<ProcessRecord>,
}

impl DumpSource {
    pub fn from_path(path: &Path) -> Result<Self, DumpError> {
        let text = fs::read_to_string(path).map_err(|source| DumpError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, DumpError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn processes(&self) -> &[ProcessRecord] {
        &self.processes
    }

    pub fn process(&self, pid: ProcessId) -> Option<&ProcessRecord> {
        self.processes.iter().find(|p| p.pid == pid)
    }
}

impl SnapshotSource for DumpSource {
    fn list_sync_primitives(&mut self, pid: ProcessId) -> Result<Vec<PrimitiveId>, SourceError> {
        let process = self.process(pid).ok_or(SourceError::UnknownProcess(pid))?;
        Ok(process.primitives.iter().map(|p| p.id).collect())
    }

    fn primitive_info(
        &mut self,
        pid: ProcessId,
        primitive: PrimitiveId,
    ) -> Result<PrimitiveInfo, SourceError> {
        let process = self.process(pid).ok_or(SourceError::UnknownProcess(pid))?;
        let record = process
            .primitives
            .iter()
            .find(|p| p.id == primitive)
            .ok_or(SourceError::UnknownPrimitive(primitive))?;
        if let Some(error) = &record.error {
            return Err(SourceError::Query(error.clone()));
        }
        Ok(PrimitiveInfo {
            name: record.name.clone(),
            owner: record.owner,
            waiters: record.waiters.clone(),
        })
    }

    fn process_name(&mut self, pid: ProcessId) -> Option<String> {
        self.process(pid).and_then(|p| p.name.clone())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Id deserialization
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Number(u64),
    Text(String),
}

impl RawId {
    fn resolve<E: de::Error>(self) -> Result<u64, E> {
        match self {
            RawId::Number(n) => Ok(n),
            RawId::Text(text) => {
                u64::from_token(&text).ok_or_else(|| E::custom(format!("invalid id '{text}'")))
            }
        }
    }
}

fn de_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    RawId::deserialize(deserializer)?.resolve()
}

fn de_opt_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    Option::<RawId>::deserialize(deserializer)?
        .map(RawId::resolve)
        .transpose()
}

fn de_ids<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u64>, D::Error> {
    Vec::<RawId>::deserialize(deserializer)?
        .into_iter()
        .map(RawId::resolve)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deadlock::Detector;

    const DUMP: &str = r#"{
        "processes": [
            { "pid": "0x1010200", "name": "game.self", "primitives": [
                { "id": 1, "name": "render_mutex", "owner": "0x101", "waiters": ["0x102"] },
                { "id": 2, "name": "audio_mutex", "owner": 258, "waiters": [257] },
                { "id": 3, "error": "target busy" }
            ] },
            { "pid": 2 }
        ]
    }"#;

    #[test]
    fn test_parse_mixed_id_forms() {
        let dump = DumpSource::from_json(DUMP).unwrap();
        assert_eq!(dump.processes().len(), 2);
        let game = dump.process(0x1010200).unwrap();
        assert_eq!(game.primitives[0].owner, Some(0x101));
        assert_eq!(game.primitives[0].waiters, vec![0x102]);
        assert!(dump.process(2).unwrap().primitives.is_empty());
    }

    #[test]
    fn test_invalid_id_is_rejected() {
        let err = DumpSource::from_json(r#"{ "processes": [ { "pid": "zz" } ] }"#).unwrap_err();
        assert!(matches!(err, DumpError::Parse(_)));
    }

    #[test]
    fn test_recorded_error_fails_detail_query() {
        let mut dump = DumpSource::from_json(DUMP).unwrap();
        assert_eq!(
            dump.primitive_info(0x1010200, 3),
            Err(SourceError::Query("target busy".into()))
        );
        assert_eq!(
            dump.list_sync_primitives(5),
            Err(SourceError::UnknownProcess(5))
        );
    }

    #[test]
    fn test_dump_drives_detector() {
        let mut dump = DumpSource::from_json(DUMP).unwrap();
        let report = Detector::default().run(&mut dump, 0x1010200).unwrap();
        assert_eq!(report.process_name.as_deref(), Some("game.self"));
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.label(1), Some("render_mutex"));
        let cycle = report.cycle.expect("cycle");
        let mut threads = cycle.threads();
        threads.sort_unstable();
        assert_eq!(threads, vec![0x101, 0x102]);
    }
}
