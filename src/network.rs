//! The network: node set, derived edges and the message routing layer.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::algorithm::Algorithm;
use crate::error::SimError;
use crate::message::Message;
use crate::metrics::{AlgorithmStateSnapshot, NetworkSnapshot, NodeSnapshot, SimMetrics};
use crate::node::{Node, NodeId, NodeSpec};
use crate::topology::{ChannelModel, Environment, OpenSpace, Point, UnitDiscModel};

/// Random placement retry budget for [`Network::add_node`].
const PLACEMENT_RETRIES: u32 = 100;

/// What to do when a message cannot be delivered.
///
/// `Strict` aborts the communicate phase with the error, matching the
/// correctness expectations of a research simulator. `Lenient` logs
/// and drops, which changes termination semantics for transiently
/// disconnected topologies; the drop is counted in the metrics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeliveryPolicy {
    #[default]
    Strict,
    Lenient,
}

/// Progress of the queued algorithm list.
///
/// `step == 1` means the current algorithm has not yet run its
/// initializer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlgorithmState {
    pub index: usize,
    pub step: u64,
    pub finished: bool,
}

impl Default for AlgorithmState {
    fn default() -> Self {
        Self {
            index: 0,
            step: 1,
            finished: false,
        }
    }
}

/// A wireless sensor network: graph vertices, derived edges, the
/// staging outbox used during the communicate phase, and the queued
/// algorithm list.
///
/// Edges are a pure function of node positions, ranges and the channel
/// model. They are never mutated directly; only
/// [`recalculate_edges`](Network::recalculate_edges) touches them, and
/// the position/range setters call it automatically.
pub struct Network {
    name: String,
    nodes: BTreeMap<NodeId, Node>,
    edges: BTreeSet<(NodeId, NodeId)>,
    channel: Box<dyn ChannelModel>,
    environment: Box<dyn Environment>,
    outbox: VecDeque<Message>,
    algorithms: Vec<Option<Box<dyn Algorithm>>>,
    pub(crate) state: AlgorithmState,
    network_routing: bool,
    policy: DeliveryPolicy,
    default_comm_range: f64,
    next_id: u32,
    rng: StdRng,
    metrics: SimMetrics,
}

impl Default for Network {
    fn default() -> Self {
        Self::new()
    }
}

impl Network {
    pub fn new() -> Self {
        Self {
            name: "wsn".to_owned(),
            nodes: BTreeMap::new(),
            edges: BTreeSet::new(),
            channel: Box::new(UnitDiscModel),
            environment: Box::<OpenSpace>::default(),
            outbox: VecDeque::new(),
            algorithms: Vec::new(),
            state: AlgorithmState::default(),
            network_routing: true,
            policy: DeliveryPolicy::default(),
            default_comm_range: 100.0,
            next_id: 1,
            rng: StdRng::seed_from_u64(42),
            metrics: SimMetrics::default(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Seed the RNG used for random placement and orientations.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn with_channel_model(mut self, channel: impl ChannelModel + 'static) -> Self {
        self.channel = Box::new(channel);
        self
    }

    pub fn with_environment(mut self, environment: impl Environment + 'static) -> Self {
        self.environment = Box::new(environment);
        self
    }

    /// Enable or disable network-level multi-hop routing for addressed
    /// messages whose destination is not a direct neighbor.
    pub fn with_routing(mut self, enabled: bool) -> Self {
        self.network_routing = enabled;
        self
    }

    pub fn with_delivery_policy(mut self, policy: DeliveryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Default comm range for nodes that do not specify one.
    pub fn with_comm_range(mut self, comm_range: f64) -> Self {
        self.default_comm_range = comm_range;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    /// All node ids in ascending order. This ordering is load-bearing:
    /// outbox collection and step dispatch follow it for
    /// reproducibility.
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes.keys().copied().collect()
    }

    /// Iterate nodes in id order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn is_member(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Current derived edge set, as canonically ordered id pairs.
    pub fn edges(&self) -> Vec<(NodeId, NodeId)> {
        self.edges.iter().copied().collect()
    }

    pub fn has_edge(&self, a: NodeId, b: NodeId) -> bool {
        self.edges.contains(&canonical_pair(a, b))
    }

    pub fn metrics(&self) -> &SimMetrics {
        &self.metrics
    }

    pub fn algorithm_state(&self) -> &AlgorithmState {
        &self.state
    }

    /// Add a node described by `spec`. Without an explicit position a
    /// random free one is drawn, up to a bounded number of retries
    /// against the environment; exhaustion (or an occupied explicit
    /// position) is reported as [`SimError::NoFreeSpace`] and leaves
    /// the network untouched.
    pub fn add_node(&mut self, spec: NodeSpec) -> Result<NodeId, SimError> {
        let position = match spec.position {
            Some(pos) => {
                if !self.environment.is_free(pos) {
                    log::error!("given position ({}, {}) is not free space", pos.x, pos.y);
                    return Err(SimError::NoFreeSpace);
                }
                pos
            }
            None => self.find_random_position(PLACEMENT_RETRIES)?,
        };
        let orientation = spec
            .orientation
            .unwrap_or_else(|| self.rng.gen::<f64>() * std::f64::consts::TAU)
            .rem_euclid(std::f64::consts::TAU);
        let comm_range = spec.comm_range.unwrap_or(self.default_comm_range);

        let id = NodeId::new(self.next_id);
        self.next_id += 1;
        let node = Node::from_spec(id, spec, position, orientation, comm_range);
        self.nodes.insert(id, node);
        log::debug!(
            "node {} placed at ({:.1}, {:.1}), range {}",
            id,
            position.x,
            position.y,
            comm_range
        );
        self.recalculate_edges(&[id]);
        Ok(id)
    }

    /// Remove a node and every derived edge touching it. Absence is
    /// reported, not fatal.
    pub fn remove_node(&mut self, id: NodeId) -> bool {
        if self.nodes.remove(&id).is_none() {
            log::error!("node {id} not in network");
            return false;
        }
        self.edges.retain(|&(a, b)| a != id && b != id);
        log::info!("node {id} removed");
        true
    }

    /// Move a node and recompute its incident edges.
    pub fn set_position(&mut self, id: NodeId, position: Point) -> bool {
        let Some(node) = self.nodes.get_mut(&id) else {
            log::error!("node {id} not in network");
            return false;
        };
        node.set_position(position);
        self.recalculate_edges(&[id]);
        true
    }

    /// Change a node's comm range and recompute its incident edges.
    pub fn set_comm_range(&mut self, id: NodeId, comm_range: f64) -> bool {
        let Some(node) = self.nodes.get_mut(&id) else {
            log::error!("node {id} not in network");
            return false;
        };
        node.set_comm_range(comm_range);
        self.recalculate_edges(&[id]);
        true
    }

    fn find_random_position(&mut self, retries: u32) -> Result<Point, SimError> {
        let (width, height) = self.environment.bounds();
        for _ in 0..retries {
            let pos = Point::new(self.rng.gen::<f64>() * width, self.rng.gen::<f64>() * height);
            if self.environment.is_free(pos) {
                return Ok(pos);
            }
        }
        log::error!("placement retry budget exhausted after {retries} attempts");
        Err(SimError::NoFreeSpace)
    }

    fn linked(&self, a: NodeId, b: NodeId) -> bool {
        match (self.nodes.get(&a), self.nodes.get(&b)) {
            (Some(na), Some(nb)) => {
                self.channel.in_range(na, nb) && self.channel.in_range(nb, na)
            }
            _ => false,
        }
    }

    /// Recompute the derived edges for the given nodes (all nodes when
    /// the slice is empty). An edge exists iff the channel model
    /// reports both directions in range; stale edges are removed. This
    /// is the only sanctioned edge mutator.
    pub fn recalculate_edges(&mut self, subset: &[NodeId]) {
        let subject: Vec<NodeId> = if subset.is_empty() {
            self.node_ids()
        } else {
            subset.to_vec()
        };
        let all = self.node_ids();
        for &a in &subject {
            for &b in &all {
                if a == b {
                    continue;
                }
                let pair = canonical_pair(a, b);
                if self.linked(a, b) {
                    self.edges.insert(pair);
                } else {
                    self.edges.remove(&pair);
                }
            }
        }
    }

    /// All nodes currently in symmetric range of `id`, recomputed fresh
    /// on every call so live position/range changes are honored.
    pub fn neighbors(&self, id: NodeId) -> Vec<NodeId> {
        self.nodes
            .keys()
            .copied()
            .filter(|&other| other != id && self.linked(id, other))
            .collect()
    }

    /// Push a message at the front of the staging outbox, making it the
    /// first delivery of the next communicate phase. Used by algorithm
    /// initializers to seed `INI` events.
    pub fn inject(&mut self, message: Message) {
        self.outbox.push_front(message);
    }

    /// Number of messages currently staged for delivery.
    pub fn staged_len(&self) -> usize {
        self.outbox.len()
    }

    /// Whether any message exists anywhere: staging outbox, node
    /// outboxes or node inboxes.
    pub fn has_messages_in_flight(&self) -> bool {
        !self.outbox.is_empty()
            || self
                .nodes
                .values()
                .any(|n| n.outbox_len() > 0 || n.inbox_len() > 0)
    }

    /// The communicate phase: drain every node outbox (in id order)
    /// into the staging outbox, then resolve deliveries until it is
    /// empty. Deliveries only push into inboxes; messages enqueued as a
    /// byproduct (forwarded copies) wait for the next round.
    pub fn communicate(&mut self) -> Result<(), SimError> {
        let ids = self.node_ids();
        for id in ids {
            if let Some(node) = self.nodes.get_mut(&id) {
                let staged: Vec<Message> = node.drain_outbox().collect();
                self.outbox.extend(staged);
            }
        }
        while let Some(message) = self.outbox.pop_front() {
            self.metrics.messages_sent += 1;
            match self.resolve_delivery(message) {
                Ok(()) => {}
                Err(err) => match self.policy {
                    DeliveryPolicy::Strict => return Err(err),
                    DeliveryPolicy::Lenient => {
                        log::warn!("dropping message: {err}");
                        self.metrics.messages_dropped += 1;
                    }
                },
            }
        }
        Ok(())
    }

    fn resolve_delivery(&mut self, message: Message) -> Result<(), SimError> {
        if let Some(hop) = message.nexthop {
            // Manual relay: straight to the nexthop inbox, bypassing
            // neighbor resolution.
            return self.deliver(hop, message);
        }
        match message.destination {
            None => self.broadcast(message),
            Some(destination) => {
                let direct = message
                    .source
                    .is_some_and(|src| self.is_member(src) && self.neighbors(src).contains(&destination));
                if direct || self.network_routing {
                    self.deliver(destination, message)
                } else {
                    Err(SimError::UndeliverableMessage {
                        header: message.header,
                        reason: format!("{destination} is not reachable"),
                    })
                }
            }
        }
    }

    /// Deliver one copy per current neighbor of the source, stamping
    /// each copy's destination.
    fn broadcast(&mut self, message: Message) -> Result<(), SimError> {
        let Some(source) = message.source.filter(|&s| self.is_member(s)) else {
            return Err(SimError::UndeliverableMessage {
                header: message.header,
                reason: "broadcast source is not a network member".into(),
            });
        };
        for neighbor in self.neighbors(source) {
            let copy = message.clone().to(neighbor);
            self.deliver(neighbor, copy)?;
        }
        Ok(())
    }

    fn deliver(&mut self, destination: NodeId, message: Message) -> Result<(), SimError> {
        let Some(node) = self.nodes.get_mut(&destination) else {
            return Err(SimError::UndeliverableMessage {
                header: message.header,
                reason: format!("{destination} is not a network member"),
            });
        };
        log::debug!("delivering {message} to {destination}");
        node.push_to_inbox(message);
        self.metrics.messages_delivered += 1;
        Ok(())
    }

    /// Queue the algorithms to execute, in order. Resets the algorithm
    /// state.
    pub fn set_algorithms(
        &mut self,
        algorithms: Vec<Box<dyn Algorithm>>,
    ) -> Result<(), SimError> {
        if algorithms.is_empty() {
            log::warn!("no algorithm defined in network");
        }
        for alg in &algorithms {
            if alg.name().is_empty() {
                return Err(SimError::InvalidAlgorithmSpec(
                    "algorithm name must not be empty".into(),
                ));
            }
        }
        self.state = AlgorithmState::default();
        self.algorithms = algorithms.into_iter().map(Some).collect();
        Ok(())
    }

    /// Index of the active algorithm, advancing past finished ones.
    /// `None` when the queue is exhausted (or empty).
    pub(crate) fn current_algorithm_index(&mut self) -> Option<usize> {
        if self.algorithms.is_empty() {
            log::warn!("no algorithm defined in network");
            return None;
        }
        if self.state.finished {
            if self.algorithms.len() > self.state.index + 1 {
                self.state.index += 1;
                self.state.step = 1;
                self.state.finished = false;
            } else {
                return None;
            }
        }
        Some(self.state.index)
    }

    pub(crate) fn take_algorithm(&mut self, index: usize) -> Option<Box<dyn Algorithm>> {
        self.algorithms.get_mut(index).and_then(Option::take)
    }

    pub(crate) fn restore_algorithm(&mut self, index: usize, algorithm: Box<dyn Algorithm>) {
        if let Some(slot) = self.algorithms.get_mut(index) {
            *slot = Some(algorithm);
        }
    }

    /// Name of the algorithm at the current index, if any.
    pub fn current_algorithm_name(&self) -> Option<String> {
        self.algorithms
            .get(self.state.index)
            .and_then(|slot| slot.as_ref())
            .map(|alg| alg.name().to_owned())
    }

    /// Reset algorithm state, all nodes and the staging outbox.
    pub fn reset(&mut self) {
        log::info!("resetting network");
        self.state = AlgorithmState::default();
        self.outbox.clear();
        for node in self.nodes.values_mut() {
            node.reset();
        }
    }

    /// Read-only snapshot of the whole network for external renderers
    /// and exporters.
    pub fn snapshot(&self) -> NetworkSnapshot {
        NetworkSnapshot {
            name: self.name.clone(),
            nodes: self
                .nodes
                .values()
                .map(|n| NodeSnapshot {
                    id: n.id(),
                    kind: n.kind,
                    status: n.status,
                    position: n.position(),
                    comm_range: n.comm_range(),
                    memory: n.memory.clone(),
                })
                .collect(),
            edges: self.edges(),
            algorithm: AlgorithmStateSnapshot {
                name: self.current_algorithm_name(),
                index: self.state.index,
                step: self.state.step,
                finished: self.state.finished,
            },
        }
    }
}

fn canonical_pair(a: NodeId, b: NodeId) -> (NodeId, NodeId) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}
