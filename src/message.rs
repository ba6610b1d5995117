//! Messages exchanged between simulated nodes.

use std::fmt;

use serde::Serialize;

use crate::node::NodeId;
use crate::topology::Point;

/// Payload carried by messages and stored in node memory.
///
/// A closed enumeration rather than open-ended dynamic typing: every
/// value an algorithm passes around is one of these shapes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Node(NodeId),
    Nodes(Vec<NodeId>),
    List(Vec<Value>),
    Point(Point),
}

impl Value {
    /// Text content, if this is a `Text` value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Integer content, if this is an `Int` value.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Float content; `Int` values coerce.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Node id content, if this is a `Node` value.
    pub fn as_node(&self) -> Option<NodeId> {
        match self {
            Value::Node(id) => Some(*id),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<NodeId> for Value {
    fn from(v: NodeId) -> Self {
        Value::Node(v)
    }
}

/// A message in flight between nodes.
///
/// Addressing is resolved during the communicate phase:
/// - `nexthop` set: delivered straight to that node's inbox, bypassing
///   neighbor resolution (manual multi-hop relay).
/// - `destination` unset and `nexthop` unset: broadcast to all current
///   neighbors of `source`, one copy per neighbor.
/// - `destination` set: direct delivery to a neighbor, or network-level
///   routing when enabled.
///
/// Messages are cloned per inbox during broadcast since `destination`
/// is stamped per copy.
#[derive(Debug, Clone)]
pub struct Message {
    /// Tag identifying the message kind. [`crate::algorithm::INI`] is
    /// reserved for the algorithm initialization event.
    pub header: String,
    /// Arbitrary payload.
    pub data: Value,
    /// Sending node; stamped by [`Node::send`](crate::node::Node::send)
    /// when unset.
    pub source: Option<NodeId>,
    /// Final destination; `None` means broadcast.
    pub destination: Option<NodeId>,
    /// Intermediate relay target, if any.
    pub nexthop: Option<NodeId>,
}

impl Message {
    /// Create a message with the given header and an empty payload.
    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            data: Value::List(Vec::new()),
            source: None,
            destination: None,
            nexthop: None,
        }
    }

    /// Attach a payload.
    pub fn with_data(mut self, data: impl Into<Value>) -> Self {
        self.data = data.into();
        self
    }

    /// Address the message to a single node.
    pub fn to(mut self, destination: NodeId) -> Self {
        self.destination = Some(destination);
        self
    }

    /// Route the message through an intermediate relay node.
    pub fn via(mut self, nexthop: NodeId) -> Self {
        self.nexthop = Some(nexthop);
        self
    }

    /// Set the sending node explicitly.
    pub fn from(mut self, source: NodeId) -> Self {
        self.source = Some(source);
        self
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:?}->{:?}",
            self.header, self.source, self.destination
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_accessors() {
        assert_eq!(Value::from(5i64).as_int(), Some(5));
        assert_eq!(Value::from(5i64).as_float(), Some(5.0));
        assert_eq!(Value::from("hi").as_text(), Some("hi"));
        assert_eq!(Value::Bool(true).as_int(), None);
    }

    #[test]
    fn test_message_builder() {
        let dst = NodeId::new(3);
        let msg = Message::new("Information").with_data("payload").to(dst);
        assert_eq!(msg.header, "Information");
        assert_eq!(msg.destination, Some(dst));
        assert_eq!(msg.nexthop, None);
        assert_eq!(msg.data.as_text(), Some("payload"));
    }
}
