// Author: kelexine (https://github.com/kelexine)
// deadlock/collect.rs — Snapshot collection from a target-state source

use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::{
    detect_cycle, Cycle, DetectError, LockId, NodeKind, OwnerNode, PrimitiveId, ProcessId,
    ThreadId, WaiterNode,
};

/// Records allowed per node array unless configured otherwise.
pub const DEFAULT_NODE_CAPACITY: usize = 1024;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SourceError {
    #[error("process {0:#x} is not known to the source")]
    UnknownProcess(ProcessId),
    #[error("primitive {0:#x} is not known to the source")]
    UnknownPrimitive(PrimitiveId),
    #[error("query failed: {0}")]
    Query(String),
}

/// Ownership details of one synchronization primitive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrimitiveInfo {
    pub name: Option<String>,
    /// `None` when nobody holds the primitive.
    pub owner: Option<ThreadId>,
    pub waiters: Vec<ThreadId>,
}

/// Live-system (or captured) view of a process's synchronization state.
pub trait SnapshotSource {
    fn list_sync_primitives(&mut self, pid: ProcessId) -> Result<Vec<PrimitiveId>, SourceError>;

    fn primitive_info(
        &mut self,
        pid: ProcessId,
        primitive: PrimitiveId,
    ) -> Result<PrimitiveInfo, SourceError>;

    fn process_name(&mut self, _pid: ProcessId) -> Option<String> {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedPrimitive {
    pub id: PrimitiveId,
    pub reason: String,
}

/// Owner and waiter records of one process, rebuilt on every run.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub owners: Vec<OwnerNode>,
    pub waiters: Vec<WaiterNode>,
    pub labels: BTreeMap<LockId, String>,
    pub skipped: Vec<SkippedPrimitive>,
}

/// Enumerate the primitives of `pid` and turn each into owner/waiter records.
///
/// A failing enumeration aborts the run. A failing detail query skips that
/// primitive. Exceeding `capacity` in either array discards the whole run.
pub fn collect_snapshot<S: SnapshotSource + ?Sized>(
    source: &mut S,
    pid: ProcessId,
    capacity: usize,
) -> Result<Snapshot, DetectError> {
    let primitives = source
        .list_sync_primitives(pid)
        .map_err(|source| DetectError::Source { pid, source })?;
    debug!(pid, primitives = primitives.len(), "enumerated primitives");

    let mut snapshot = Snapshot::default();
    for id in primitives {
        let info = match source.primitive_info(pid, id) {
            Ok(info) => info,
            Err(e) => {
                warn!(pid, primitive = id, error = %e, "skipping primitive");
                snapshot.skipped.push(SkippedPrimitive {
                    id,
                    reason: e.to_string(),
                });
                continue;
            }
        };

        if let Some(thread) = info.owner {
            ensure_room(snapshot.owners.len() + 1, NodeKind::Owner, capacity)?;
            snapshot.owners.push(OwnerNode { thread, lock: id });
        }
        ensure_room(
            snapshot.waiters.len() + info.waiters.len(),
            NodeKind::Waiter,
            capacity,
        )?;
        snapshot
            .waiters
            .extend(info.waiters.iter().map(|&thread| WaiterNode { thread, lock: id }));
        if let Some(name) = info.name {
            snapshot.labels.insert(id, name);
        }
    }

    Ok(snapshot)
}

fn ensure_room(needed: usize, kind: NodeKind, capacity: usize) -> Result<(), DetectError> {
    if needed > capacity {
        warn!(%kind, capacity, "snapshot exceeds node capacity");
        return Err(DetectError::Capacity { kind, capacity });
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Detector
// ─────────────────────────────────────────────────────────────────────────────

/// Outcome of one detection run.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub pid: ProcessId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub process_name: Option<String>,
    pub owners: Vec<OwnerNode>,
    pub waiters: Vec<WaiterNode>,
    pub labels: BTreeMap<LockId, String>,
    pub skipped: Vec<SkippedPrimitive>,
    pub cycle: Option<Cycle>,
}

impl Report {
    pub fn has_cycle(&self) -> bool {
        self.cycle.is_some()
    }

    pub fn label(&self, lock: LockId) -> Option<&str> {
        self.labels.get(&lock).map(String::as_str)
    }
}

/// Collect-then-detect driver with a fixed node capacity.
#[derive(Debug, Clone, Copy)]
pub struct Detector {
    capacity: usize,
}

impl Default for Detector {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_NODE_CAPACITY,
        }
    }
}

impl Detector {
    pub fn new(capacity: usize) -> Self {
        Self { capacity }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn run<S: SnapshotSource + ?Sized>(
        &self,
        source: &mut S,
        pid: ProcessId,
    ) -> Result<Report, DetectError> {
        let snapshot = collect_snapshot(source, pid, self.capacity)?;
        let cycle = detect_cycle(&snapshot.owners, &snapshot.waiters);
        info!(
            pid,
            owners = snapshot.owners.len(),
            waiters = snapshot.waiters.len(),
            skipped = snapshot.skipped.len(),
            deadlock = cycle.is_some(),
            "detection finished"
        );

        Ok(Report {
            pid,
            process_name: source.process_name(pid),
            owners: snapshot.owners,
            waiters: snapshot.waiters,
            labels: snapshot.labels,
            skipped: snapshot.skipped,
            cycle,
        })
    }
}
