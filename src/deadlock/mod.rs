// Author: kelexine (https://github.com/kelexine)
// deadlock/mod.rs — Wait-for graph cycle detection over lock owner/waiter records

pub mod collect;
pub mod dump;

pub use collect::{
    collect_snapshot, Detector, PrimitiveInfo, Report, SkippedPrimitive, Snapshot,
    SnapshotSource, SourceError, DEFAULT_NODE_CAPACITY,
};
pub use dump::DumpSource;

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace};

pub type ThreadId = u64;
pub type LockId = u64;
pub type ProcessId = u64;
pub type PrimitiveId = u64;

/// "Thread `thread` holds lock `lock`."
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerNode {
    pub thread: ThreadId,
    pub lock: LockId,
}

/// "Thread `thread` is blocked acquiring lock `lock`."
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WaiterNode {
    pub thread: ThreadId,
    pub lock: LockId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Owner,
    Waiter,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Owner => write!(f, "owner"),
            NodeKind::Waiter => write!(f, "waiter"),
        }
    }
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DetectError {
    #[error("snapshot holds more than {capacity} {kind} records")]
    Capacity { kind: NodeKind, capacity: usize },
    #[error("cannot enumerate synchronization primitives of process {pid:#x}")]
    Source {
        pid: ProcessId,
        #[source]
        source: SourceError,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// Cycle report
// ─────────────────────────────────────────────────────────────────────────────

/// One node on the traversal path, referring back into the input arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Step {
    Owner { index: usize, node: OwnerNode },
    Waiter { index: usize, node: WaiterNode },
}

impl Step {
    pub fn thread(&self) -> ThreadId {
        match self {
            Step::Owner { node, .. } => node.thread,
            Step::Waiter { node, .. } => node.thread,
        }
    }

    pub fn lock(&self) -> LockId {
        match self {
            Step::Owner { node, .. } => node.lock,
            Step::Waiter { node, .. } => node.lock,
        }
    }
}

/// A closed wait-for loop.
///
/// `steps` is the DFS path at the moment the back edge was found (every
/// node flagged on-path, root first). The back edge lands on
/// `steps[closes_at]`, so `loop_steps()` is the loop itself and anything
/// before it is the lead-in from the traversal root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cycle {
    pub steps: Vec<Step>,
    pub closes_at: usize,
}

impl Cycle {
    pub fn loop_steps(&self) -> &[Step] {
        &self.steps[self.closes_at..]
    }

    /// On-path owner nodes, in snapshot insertion order.
    pub fn owners(&self) -> Vec<OwnerNode> {
        let mut owners: Vec<(usize, OwnerNode)> = self
            .steps
            .iter()
            .filter_map(|step| match step {
                Step::Owner { index, node } => Some((*index, *node)),
                Step::Waiter { .. } => None,
            })
            .collect();
        owners.sort_by_key(|(index, _)| *index);
        owners.into_iter().map(|(_, node)| node).collect()
    }

    /// On-path waiter nodes, in snapshot insertion order.
    pub fn waiters(&self) -> Vec<WaiterNode> {
        let mut waiters: Vec<(usize, WaiterNode)> = self
            .steps
            .iter()
            .filter_map(|step| match step {
                Step::Waiter { index, node } => Some((*index, *node)),
                Step::Owner { .. } => None,
            })
            .collect();
        waiters.sort_by_key(|(index, _)| *index);
        waiters.into_iter().map(|(_, node)| node).collect()
    }

    /// Threads taking part in the loop, in loop order without repeats.
    pub fn threads(&self) -> Vec<ThreadId> {
        let mut threads: Vec<ThreadId> = Vec::new();
        for step in self.loop_steps() {
            if !threads.contains(&step.thread()) {
                threads.push(step.thread());
            }
        }
        threads
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Traversal
// ─────────────────────────────────────────────────────────────────────────────

/// Per-run traversal flags, kept apart from the immutable node data.
struct VisitState {
    owner_visited: Vec<bool>,
    owner_on_path: Vec<bool>,
    waiter_visited: Vec<bool>,
    waiter_on_path: Vec<bool>,
}

impl VisitState {
    fn new(owners: usize, waiters: usize) -> Self {
        Self {
            owner_visited: vec![false; owners],
            owner_on_path: vec![false; owners],
            waiter_visited: vec![false; waiters],
            waiter_on_path: vec![false; waiters],
        }
    }
}

/// A pending recursion level: the node that opened it and a cursor into
/// its candidate list.
enum Frame {
    /// Walk owner records of the thread behind the waiter `via`.
    Owners { via: usize, cursor: usize },
    /// Walk waiter records of the lock behind the owner `via`.
    Waiters { via: usize, cursor: usize },
}

/// Look for a wait-for cycle.
///
/// Depth-first search alternating between waiter and owner records: from a
/// waiter, visit every owner record of the same thread; from an owner,
/// visit every waiter record of the same lock. Reaching a record that is
/// still on the current path closes a loop. Every unvisited waiter starts a
/// fresh root so disconnected components are all explored. Traversal order
/// follows insertion order and stops at the first loop found.
pub fn detect_cycle(owners: &[OwnerNode], waiters: &[WaiterNode]) -> Option<Cycle> {
    let mut owners_by_thread: HashMap<ThreadId, Vec<usize>> = HashMap::new();
    for (index, owner) in owners.iter().enumerate() {
        owners_by_thread.entry(owner.thread).or_default().push(index);
    }
    let mut waiters_by_lock: HashMap<LockId, Vec<usize>> = HashMap::new();
    for (index, waiter) in waiters.iter().enumerate() {
        waiters_by_lock.entry(waiter.lock).or_default().push(index);
    }

    let mut state = VisitState::new(owners.len(), waiters.len());
    let mut stack: Vec<Frame> = Vec::new();
    let none: Vec<usize> = Vec::new();

    for root in 0..waiters.len() {
        if state.waiter_visited[root] {
            continue;
        }
        trace!(thread = waiters[root].thread, lock = waiters[root].lock, "new root");
        state.waiter_visited[root] = true;
        state.waiter_on_path[root] = true;
        stack.push(Frame::Owners {
            via: root,
            cursor: 0,
        });

        while let Some(frame) = stack.last_mut() {
            match frame {
                Frame::Owners { via, cursor } => {
                    let thread = waiters[*via].thread;
                    let candidates = owners_by_thread.get(&thread).unwrap_or(&none);
                    let Some(&next) = candidates.get(*cursor) else {
                        state.waiter_on_path[*via] = false;
                        stack.pop();
                        continue;
                    };
                    *cursor += 1;

                    if state.owner_on_path[next] {
                        return Some(close_cycle(&stack, owners, waiters, Step::Owner {
                            index: next,
                            node: owners[next],
                        }));
                    }
                    if state.owner_visited[next] {
                        continue;
                    }
                    state.owner_visited[next] = true;
                    state.owner_on_path[next] = true;
                    stack.push(Frame::Waiters {
                        via: next,
                        cursor: 0,
                    });
                }
                Frame::Waiters { via, cursor } => {
                    let lock = owners[*via].lock;
                    let candidates = waiters_by_lock.get(&lock).unwrap_or(&none);
                    let Some(&next) = candidates.get(*cursor) else {
                        state.owner_on_path[*via] = false;
                        stack.pop();
                        continue;
                    };
                    *cursor += 1;

                    if state.waiter_on_path[next] {
                        return Some(close_cycle(&stack, owners, waiters, Step::Waiter {
                            index: next,
                            node: waiters[next],
                        }));
                    }
                    if state.waiter_visited[next] {
                        continue;
                    }
                    state.waiter_visited[next] = true;
                    state.waiter_on_path[next] = true;
                    stack.push(Frame::Owners {
                        via: next,
                        cursor: 0,
                    });
                }
            }
        }
    }

    debug!(owners = owners.len(), waiters = waiters.len(), "no cycle");
    None
}

fn close_cycle(
    stack: &[Frame],
    owners: &[OwnerNode],
    waiters: &[WaiterNode],
    target: Step,
) -> Cycle {
    let steps: Vec<Step> = stack
        .iter()
        .map(|frame| match *frame {
            Frame::Owners { via, .. } => Step::Waiter {
                index: via,
                node: waiters[via],
            },
            Frame::Waiters { via, .. } => Step::Owner {
                index: via,
                node: owners[via],
            },
        })
        .collect();
    // The target is on-path, so it is always somewhere on the stack
    let closes_at = steps.iter().position(|step| *step == target).unwrap_or(0);
    debug!(path = steps.len(), closes_at, "cycle found");
    Cycle { steps, closes_at }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner(thread: ThreadId, lock: LockId) -> OwnerNode {
        OwnerNode { thread, lock }
    }

    fn waiter(thread: ThreadId, lock: LockId) -> WaiterNode {
        WaiterNode { thread, lock }
    }

    #[test]
    fn test_source_error_message_leaves_cause_to_chain() {
        let err = DetectError::Source {
            pid: 0x2a,
            source: SourceError::UnknownProcess(0x2a),
        };
        assert_eq!(
            err.to_string(),
            "cannot enumerate synchronization primitives of process 0x2a"
        );
        let cause = std::error::Error::source(&err).map(|c| c.to_string());
        assert_eq!(cause.as_deref(), Some("process 0x2a is not known to the source"));
    }

    #[test]
    fn test_two_thread_deadlock_reports_all_four_nodes() {
        // T1 holds L1 and waits on L2; T2 holds L2 and waits on L1
        let owners = [owner(1, 1), owner(2, 2)];
        let waiters = [waiter(2, 1), waiter(1, 2)];

        let cycle = detect_cycle(&owners, &waiters).expect("cycle");
        assert_eq!(cycle.owners(), owners.to_vec());
        assert_eq!(cycle.waiters(), waiters.to_vec());
        assert_eq!(cycle.closes_at, 0);
        assert_eq!(cycle.loop_steps().len(), 4);
        assert_eq!(cycle.threads(), vec![2, 1]);
    }

    #[test]
    fn test_simple_wait_is_not_a_cycle() {
        let owners = [owner(1, 1)];
        let waiters = [waiter(2, 1)];
        assert!(detect_cycle(&owners, &waiters).is_none());
    }

    #[test]
    fn test_empty_snapshot() {
        assert!(detect_cycle(&[], &[]).is_none());
    }

    #[test]
    fn test_self_deadlock_on_non_recursive_lock() {
        let owners = [owner(7, 3)];
        let waiters = [waiter(7, 3)];
        let cycle = detect_cycle(&owners, &waiters).expect("cycle");
        assert_eq!(cycle.threads(), vec![7]);
        assert_eq!(cycle.steps.len(), 2);
    }

    #[test]
    fn test_disconnected_chain_and_cycle_in_either_order() {
        // Chain: T10 waits on L10 held by T11, T11 waits on nothing
        let chain_owners = [owner(11, 10)];
        let chain_waiters = [waiter(10, 10)];
        // Cycle among T1, T2, T3
        let cycle_owners = [owner(1, 1), owner(2, 2), owner(3, 3)];
        let cycle_waiters = [waiter(1, 2), waiter(2, 3), waiter(3, 1)];

        let owners_a: Vec<_> = chain_owners.iter().chain(&cycle_owners).copied().collect();
        let waiters_a: Vec<_> = chain_waiters.iter().chain(&cycle_waiters).copied().collect();
        let owners_b: Vec<_> = cycle_owners.iter().chain(&chain_owners).copied().collect();
        let waiters_b: Vec<_> = cycle_waiters.iter().chain(&chain_waiters).copied().collect();

        for (owners, waiters) in [(owners_a, waiters_a), (owners_b, waiters_b)] {
            let cycle = detect_cycle(&owners, &waiters).expect("cycle");
            let mut threads = cycle.threads();
            threads.sort_unstable();
            assert_eq!(threads, vec![1, 2, 3]);
            assert_eq!(cycle.owners(), cycle_owners.to_vec());
            assert_eq!(cycle.waiters().len(), 3);
        }
    }

    #[test]
    fn test_long_chain_does_not_recurse() {
        // T(i) holds L(i-1) and waits on L(i); rooted at the far end the
        // traversal path is 100k records deep
        let depth = 50_000u64;
        let owners: Vec<_> = (1..depth).map(|i| owner(i, i - 1)).collect();
        let waiters: Vec<_> = (0..depth).rev().map(|i| waiter(i, i)).collect();
        assert!(detect_cycle(&owners, &waiters).is_none());
    }

    #[test]
    fn test_long_cycle_is_found() {
        let n = 1_000u64;
        let owners: Vec<_> = (0..n).map(|i| owner(i, i)).collect();
        let waiters: Vec<_> = (0..n).map(|i| waiter(i, (i + 1) % n)).collect();
        let cycle = detect_cycle(&owners, &waiters).expect("cycle");
        assert_eq!(cycle.threads().len(), n as usize);
    }
}
