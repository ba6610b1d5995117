//! motesim - Round-based simulator for distributed algorithms on
//! wireless sensor networks.
//!
//! This crate provides a deterministic, round-synchronous simulator:
//! algorithms are written as per-node message handlers and the engine
//! drives rounds of communicate-then-step until the network quiesces.
//!
//! # Features
//!
//! - **Round-based execution**: One communicate phase plus one step per
//!   node, in ascending id order, per round
//! - **Derived topology**: Edges are a pure function of positions,
//!   ranges and a pluggable channel model
//! - **Status dispatch**: Algorithms declare a table mapping node
//!   statuses to handlers
//! - **Addressing modes**: Neighbor broadcast, direct delivery,
//!   network-level routing, manual nexthop relay
//! - **Pause and resume**: Run a bounded number of rounds, inspect the
//!   network, continue
//! - **Metrics and snapshots**: Traffic counters and serializable
//!   network state for external renderers
//!
//! # Example
//!
//! ```
//! use motesim::{Message, Network, NodeSpec, Point};
//!
//! let mut net = Network::new();
//! let a = net
//!     .add_node(NodeSpec::new().at(Point::new(0.0, 0.0)))
//!     .unwrap();
//! let b = net
//!     .add_node(NodeSpec::new().at(Point::new(50.0, 0.0)))
//!     .unwrap();
//!
//! // No destination means broadcast to all current neighbors.
//! net.node_mut(a).unwrap().send(Message::new("Hello"));
//! net.communicate().unwrap();
//! assert_eq!(net.node(b).unwrap().inbox_len(), 1);
//! ```
//!
//! # Architecture
//!
//! A round is the unit of atomicity. The engine loop:
//! 1. Check the halting predicate (early exit, messages in flight,
//!    working statuses)
//! 2. Communicate: drain node outboxes into the staging outbox, resolve
//!    every delivery into inboxes
//! 3. Step every node in id order (each pops at most one message)
//! 4. Advance the step counter, fire the round hook
//!
//! Messages enqueued during a round wait for the next round's
//! communicate phase, so delivery order is reproducible regardless of
//! handler side effects.

pub mod algorithm;
pub mod error;
pub mod flooding;
pub mod message;
pub mod metrics;
pub mod network;
pub mod node;
pub mod sim;
pub mod topology;

// Re-export main types
pub use algorithm::{dispatch, Algorithm, AlgorithmKind, Handler, ParamSpec, Params, StepResult, INI};
pub use error::SimError;
pub use flooding::{FloodingEngine, FLOOD};
pub use message::{Message, Value};
pub use metrics::{NetworkSnapshot, NodeSnapshot, SimMetrics};
pub use network::{AlgorithmState, DeliveryPolicy, Network};
pub use node::{Memory, Node, NodeId, NodeKind, NodeSpec, Status};
pub use sim::Simulation;
pub use topology::{ChannelModel, Environment, OpenSpace, Point, UnitDiscModel};
