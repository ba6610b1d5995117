//! Simulated sensor nodes: identity, status, memory and message queues.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;

use serde::Serialize;

use crate::message::{Message, Value};
use crate::topology::Point;

/// Unique node identifier, assigned monotonically by the network.
///
/// Numeric order is the deterministic iteration order for the whole
/// simulation: outbox collection, step dispatch and neighbor lists all
/// follow it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct NodeId(u32);

impl NodeId {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Topological role of a node. Distinct from [`Status`], which is the
/// algorithm-defined dispatch tag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum NodeKind {
    Base,
    ClusterHead,
    Normal,
    #[default]
    Generic,
}

/// Algorithm-defined node state tag driving handler dispatch.
///
/// Statuses are declared as constants by algorithm implementations,
/// e.g. `const IDLE: Status = Status::new("IDLE");`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Status(&'static str);

impl Status {
    /// The reset value: no algorithm has claimed the node yet.
    pub const NONE: Status = Status("");

    pub const fn new(tag: &'static str) -> Self {
        Self(tag)
    }

    pub const fn tag(self) -> &'static str {
        self.0
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Persistent local state of a node, keyed by algorithm-chosen names.
pub type Memory = BTreeMap<String, Value>;

/// Description of a node to insert into a network.
///
/// The network assigns the id and fills any unset placement attributes
/// (random free position, random orientation, default comm range).
#[derive(Debug, Default)]
pub struct NodeSpec {
    pub(crate) kind: NodeKind,
    pub(crate) position: Option<Point>,
    pub(crate) orientation: Option<f64>,
    pub(crate) comm_range: Option<f64>,
    pub(crate) memory: Memory,
    pub(crate) status: Status,
}

impl NodeSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kind(mut self, kind: NodeKind) -> Self {
        self.kind = kind;
        self
    }

    /// Place the node at an explicit position instead of a random free one.
    pub fn at(mut self, position: Point) -> Self {
        self.position = Some(position);
        self
    }

    pub fn orientation(mut self, orientation: f64) -> Self {
        self.orientation = Some(orientation);
        self
    }

    pub fn comm_range(mut self, comm_range: f64) -> Self {
        self.comm_range = Some(comm_range);
        self
    }

    /// Seed a memory entry before the first algorithm runs.
    pub fn with_memory(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.memory.insert(key.into(), value.into());
        self
    }

    pub fn status(mut self, status: Status) -> Self {
        self.status = status;
        self
    }
}

/// A single simulated device.
///
/// Owned by the [`Network`](crate::network::Network); constructed only
/// through [`Network::add_node`](crate::network::Network::add_node).
#[derive(Debug)]
pub struct Node {
    id: NodeId,
    pub kind: NodeKind,
    pub status: Status,
    pub memory: Memory,
    inbox: VecDeque<Message>,
    outbox: VecDeque<Message>,
    position: Point,
    comm_range: f64,
    orientation: f64,
}

impl Node {
    pub(crate) fn from_spec(id: NodeId, spec: NodeSpec, position: Point, orientation: f64, comm_range: f64) -> Self {
        Self {
            id,
            kind: spec.kind,
            status: spec.status,
            memory: spec.memory,
            inbox: VecDeque::new(),
            outbox: VecDeque::new(),
            position,
            comm_range,
            orientation,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn position(&self) -> Point {
        self.position
    }

    pub fn comm_range(&self) -> f64 {
        self.comm_range
    }

    pub fn orientation(&self) -> f64 {
        self.orientation
    }

    /// Enqueue an outbound message, to be picked up by the next
    /// communicate phase. Stamps this node as the source when unset.
    pub fn send(&mut self, mut message: Message) {
        if message.source.is_none() {
            message.source = Some(self.id);
        }
        self.outbox.push_back(message);
    }

    /// Pop the oldest inbox message, if any.
    pub fn receive(&mut self) -> Option<Message> {
        self.inbox.pop_front()
    }

    pub(crate) fn push_to_inbox(&mut self, message: Message) {
        self.inbox.push_back(message);
    }

    pub(crate) fn drain_outbox(&mut self) -> impl Iterator<Item = Message> + '_ {
        self.outbox.drain(..)
    }

    pub fn inbox_len(&self) -> usize {
        self.inbox.len()
    }

    pub fn outbox_len(&self) -> usize {
        self.outbox.len()
    }

    pub(crate) fn set_position(&mut self, position: Point) {
        self.position = position;
    }

    pub(crate) fn set_comm_range(&mut self, comm_range: f64) {
        self.comm_range = comm_range;
    }

    /// Reset status, memory and queues to their initial values.
    /// Identity and placement are kept.
    pub fn reset(&mut self) {
        self.status = Status::NONE;
        self.memory.clear();
        self.inbox.clear();
        self.outbox.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_node(id: u32) -> Node {
        Node::from_spec(
            NodeId::new(id),
            NodeSpec::new(),
            Point::new(0.0, 0.0),
            0.0,
            100.0,
        )
    }

    #[test]
    fn test_send_stamps_source() {
        let mut node = test_node(7);
        node.send(Message::new("Flood"));
        let msg = node.drain_outbox().next().unwrap();
        assert_eq!(msg.source, Some(NodeId::new(7)));
    }

    #[test]
    fn test_send_keeps_existing_source() {
        // Forwarded copies must preserve the original sender.
        let mut node = test_node(7);
        node.send(Message::new("Flood").from(NodeId::new(1)));
        let msg = node.drain_outbox().next().unwrap();
        assert_eq!(msg.source, Some(NodeId::new(1)));
    }

    #[test]
    fn test_inbox_fifo() {
        let mut node = test_node(1);
        node.push_to_inbox(Message::new("a"));
        node.push_to_inbox(Message::new("b"));
        assert_eq!(node.receive().unwrap().header, "a");
        assert_eq!(node.receive().unwrap().header, "b");
        assert!(node.receive().is_none());
    }

    #[test]
    fn test_reset_keeps_placement() {
        let mut node = test_node(1);
        node.status = Status::new("IDLE");
        node.memory.insert("k".into(), Value::Int(1));
        node.push_to_inbox(Message::new("a"));
        node.reset();
        assert_eq!(node.status, Status::NONE);
        assert!(node.memory.is_empty());
        assert_eq!(node.inbox_len(), 0);
        assert_eq!(node.comm_range(), 100.0);
    }
}
