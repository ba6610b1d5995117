//! The algorithm contract: parameter validation and status dispatch.
//!
//! Concrete distributed algorithms (LEACH clustering, minimum-cost
//! forwarding, trilateration, ...) are clients of the core. Each one
//! supplies a status table of handlers, an initializer and optional
//! termination hooks, and the engine drives it purely through the
//! [`Algorithm`] trait.

use std::collections::BTreeMap;

use crate::error::SimError;
use crate::message::{Message, Value};
use crate::network::Network;
use crate::node::{Node, Status};

/// Reserved message header for the algorithm initialization event.
pub const INI: &str = "INI";

/// Keyword arguments supplied when queueing an algorithm.
pub type Params = BTreeMap<String, Value>;

/// Declared parameter contract of an algorithm: names that must be
/// present and defaults for optional ones.
///
/// Validation happens at construction, before any node is touched.
#[derive(Debug, Default)]
pub struct ParamSpec {
    required: Vec<&'static str>,
    defaults: Vec<(&'static str, Value)>,
}

impl ParamSpec {
    pub fn new(required: &[&'static str]) -> Self {
        Self {
            required: required.to_vec(),
            defaults: Vec::new(),
        }
    }

    pub fn with_default(mut self, key: &'static str, value: impl Into<Value>) -> Self {
        self.defaults.push((key, value.into()));
        self
    }

    /// Check required names and fill absent optional ones.
    pub fn resolve(&self, mut supplied: Params) -> Result<Params, SimError> {
        for name in &self.required {
            if !supplied.contains_key(*name) {
                return Err(SimError::MissingParameter((*name).to_owned()));
            }
        }
        for (key, value) in &self.defaults {
            supplied
                .entry((*key).to_owned())
                .or_insert_with(|| value.clone());
        }
        Ok(supplied)
    }
}

/// Fetch a text-valued parameter, failing on a wrong-typed value.
pub fn text_param(params: &Params, key: &str) -> Result<String, SimError> {
    match params.get(key) {
        Some(Value::Text(s)) => Ok(s.clone()),
        Some(other) => Err(SimError::InvalidAlgorithmSpec(format!(
            "parameter `{key}` must be text, got {other:?}"
        ))),
        None => Err(SimError::MissingParameter(key.to_owned())),
    }
}

/// Whether an algorithm runs per node in rounds or once over the whole
/// network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlgorithmKind {
    PerNode,
    WholeNetwork,
}

/// Outcome of stepping one node for one round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepResult {
    /// No message was available; nothing happened this round.
    Idle,
    /// A message was consumed or forwarded.
    Handled,
    /// The algorithm signals global termination.
    Terminate,
}

/// A distributed algorithm driven by the simulation engine.
///
/// Per-instance accumulators (completion counters and the like) belong
/// on the implementing struct; they persist for one queued execution
/// and are rebuilt with the instance.
pub trait Algorithm {
    fn name(&self) -> &str;

    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::PerNode
    }

    /// Runs exactly once per activation, in the round where the
    /// algorithm-state step counter is 1. Typically assigns initial
    /// statuses and injects `INI` messages for initiator nodes.
    fn initializer(&mut self, _network: &mut Network) -> Result<(), SimError> {
        Ok(())
    }

    /// Step one node for one round. Most implementations delegate to
    /// [`dispatch`] with their status table; algorithms with internal
    /// timers (backoff states) override this to make progress without
    /// a message.
    fn step(&mut self, node: &mut Node) -> Result<StepResult, SimError>;

    /// Single entry point for [`AlgorithmKind::WholeNetwork`]
    /// algorithms; counts as one simulation step.
    fn run(&mut self, _network: &mut Network) -> Result<(), SimError> {
        Ok(())
    }

    /// Whether the given status represents internal work still pending
    /// (e.g. a listening backoff timer). Such nodes keep the algorithm
    /// alive even when every queue is empty.
    fn is_working_status(&self, _status: &Status) -> bool {
        false
    }

    /// Optional early termination check, evaluated before the message
    /// drain condition each round (e.g. a coordinator node reaching a
    /// terminal status).
    fn early_exit(&self, _network: &Network) -> bool {
        false
    }
}

/// A status handler: pure application logic over the node's memory,
/// status and one inbound message.
pub type Handler<A> = fn(&mut A, &mut Node, &Message) -> Result<(), SimError>;

/// Generic per-node step: pop at most one message and dispatch it by
/// the node's current status.
///
/// Forwarding rule, mirrored from the network-level resolution: a
/// message addressed to this node (or broadcast) is dispatched; a
/// message relayed through this node (`nexthop` == this node) is
/// re-enqueued toward its destination for the next communicate phase;
/// anything else is discarded.
pub fn dispatch<A: Algorithm>(
    alg: &mut A,
    table: &[(Status, Handler<A>)],
    node: &mut Node,
) -> Result<StepResult, SimError> {
    let Some(message) = node.receive() else {
        return Ok(StepResult::Idle);
    };

    if message.destination.is_none() || message.destination == Some(node.id()) {
        let status = node.status;
        let Some((_, handler)) = table.iter().find(|(s, _)| *s == status) else {
            return Err(SimError::UnknownStatus {
                algorithm: alg.name().to_owned(),
                status: status.tag().to_owned(),
            });
        };
        handler(alg, node, &message)?;
        Ok(StepResult::Handled)
    } else if message.nexthop == Some(node.id()) {
        // Continue the relay: hand the copy back to the communicate
        // phase, which resolves it by destination next round.
        let mut forwarded = message;
        forwarded.nexthop = None;
        node.send(forwarded);
        Ok(StepResult::Handled)
    } else {
        log::debug!(
            "{} dropping stray message {} (not addressee or relay)",
            node.id(),
            message
        );
        Ok(StepResult::Idle)
    }
}
