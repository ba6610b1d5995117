//! Traffic counters and read-only snapshots for external renderers.
//!
//! The core never depends on anything consuming these; JSON/figure
//! export is the host application's job.

use serde::Serialize;

use crate::node::{Memory, NodeId, NodeKind, Status};
use crate::topology::Point;

/// Message traffic counters maintained by the communicate phase.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SimMetrics {
    /// Messages popped from the staging outbox.
    pub messages_sent: u64,
    /// Inbox insertions (broadcasts count one per neighbor copy).
    pub messages_delivered: u64,
    /// Messages dropped under the lenient delivery policy.
    pub messages_dropped: u64,
}

/// One node's externally visible state.
#[derive(Debug, Clone, Serialize)]
pub struct NodeSnapshot {
    pub id: NodeId,
    pub kind: NodeKind,
    pub status: Status,
    pub position: Point,
    pub comm_range: f64,
    pub memory: Memory,
}

/// Progress summary of the queued algorithm list.
#[derive(Debug, Clone, Serialize)]
pub struct AlgorithmStateSnapshot {
    pub name: Option<String>,
    pub index: usize,
    pub step: u64,
    pub finished: bool,
}

/// Full read-only view of a network at one instant.
#[derive(Debug, Clone, Serialize)]
pub struct NetworkSnapshot {
    pub name: String,
    pub nodes: Vec<NodeSnapshot>,
    pub edges: Vec<(NodeId, NodeId)>,
    pub algorithm: AlgorithmStateSnapshot,
}

impl NetworkSnapshot {
    /// Nodes currently holding the given status.
    pub fn nodes_with_status(&self, status: Status) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|n| n.status == status)
            .map(|n| n.id)
            .collect()
    }
}
