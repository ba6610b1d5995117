//! Generic flooding template: broadcast once, then re-broadcast only
//! while locally gathered state keeps changing.
//!
//! Composition instead of subclassing: the three variation points of
//! the classic flooding-update family are injected as closures.
//! Trilateration, hop-count propagation and similar algorithms differ
//! only in what they inject.

use crate::algorithm::{self, dispatch, Algorithm, Handler, ParamSpec, Params, StepResult};
use crate::error::SimError;
use crate::message::{Message, Value};
use crate::network::Network;
use crate::node::{Node, Status};

/// Header used for flood payload messages.
pub const FLOOD: &str = "Flood";

/// Decides which nodes seed the flood.
pub type InitiatorCondition = Box<dyn Fn(&Node) -> bool>;
/// Produces the payload an initiator floods.
pub type InitiatorData = Box<dyn Fn(&Node) -> Value>;
/// Consumes one flood message; `Some(updated)` re-floods the updated
/// payload, `None` stops the flood at this node.
pub type FloodHandler = Box<dyn FnMut(&mut Node, &Message) -> Option<Value>>;

/// Flooding algorithm built from injected variation points.
pub struct FloodingEngine {
    params: Params,
    initiator_condition: InitiatorCondition,
    initiator_data: InitiatorData,
    handle_flood: FloodHandler,
}

impl std::fmt::Debug for FloodingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FloodingEngine")
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl FloodingEngine {
    pub const FLOODING: Status = Status::new("FLOODING");

    const TABLE: &'static [(Status, Handler<Self>)] = &[(Self::FLOODING, Self::flooding)];

    /// Requires the `dataKey` parameter: the memory key under which the
    /// flooded data is being gathered.
    pub fn new(
        params: Params,
        initiator_condition: InitiatorCondition,
        initiator_data: InitiatorData,
        handle_flood: FloodHandler,
    ) -> Result<Self, SimError> {
        let params = ParamSpec::new(&["dataKey"]).resolve(params)?;
        algorithm::text_param(&params, "dataKey")?;
        Ok(Self {
            params,
            initiator_condition,
            initiator_data,
            handle_flood,
        })
    }

    /// The memory key the flood updates.
    pub fn data_key(&self) -> &str {
        match self.params.get("dataKey") {
            Some(Value::Text(s)) => s,
            _ => unreachable!("validated at construction"),
        }
    }

    fn flooding(alg: &mut Self, node: &mut Node, message: &Message) -> Result<(), SimError> {
        if message.header == algorithm::INI {
            let data = (alg.initiator_data)(node);
            node.send(Message::new(FLOOD).with_data(data));
        }
        if message.header == FLOOD {
            if let Some(updated) = (alg.handle_flood)(node, message) {
                node.send(Message::new(FLOOD).with_data(updated));
            }
        }
        Ok(())
    }
}

impl Algorithm for FloodingEngine {
    fn name(&self) -> &str {
        "flooding-update"
    }

    /// Marks every node FLOODING and injects a front-of-queue INI for
    /// each node satisfying the initiator condition.
    fn initializer(&mut self, network: &mut Network) -> Result<(), SimError> {
        let mut initiators = Vec::new();
        for id in network.node_ids() {
            if let Some(node) = network.node_mut(id) {
                node.status = Self::FLOODING;
                if (self.initiator_condition)(node) {
                    initiators.push(id);
                }
            }
        }
        for id in initiators {
            network.inject(Message::new(algorithm::INI).to(id));
        }
        Ok(())
    }

    fn step(&mut self, node: &mut Node) -> Result<StepResult, SimError> {
        dispatch(self, Self::TABLE, node)
    }
}
