//! The round-based simulation engine.
//!
//! Single-threaded and round-synchronous: one round is one
//! communicate phase followed by one `step` per node in id order, and
//! it is the unit of atomicity the outside world observes. There is no
//! mid-round cancellation; pausing happens on round boundaries and
//! resuming picks up the preserved algorithm state.

use crate::algorithm::{Algorithm, AlgorithmKind, StepResult};
use crate::error::SimError;
use crate::network::Network;

/// Callback fired after every completed round, with the network in its
/// post-round state. Replaces the GUI redraw signal of interactive
/// frontends; hosts subscribe if they want live rendering.
pub type RoundHook = Box<dyn FnMut(&Network)>;

/// Drives the queued algorithms of a network to completion, round by
/// round.
pub struct Simulation {
    network: Network,
    steps_left: i64,
    round_hook: Option<RoundHook>,
}

impl Simulation {
    pub fn new(network: Network) -> Self {
        Self {
            network,
            steps_left: 0,
            round_hook: None,
        }
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn network_mut(&mut self) -> &mut Network {
        &mut self.network
    }

    pub fn into_network(self) -> Network {
        self.network
    }

    /// Subscribe to round-completed events.
    pub fn on_round(&mut self, hook: impl FnMut(&Network) + 'static) {
        self.round_hook = Some(Box::new(hook));
    }

    /// Reset the network and run from the beginning.
    ///
    /// Note that resetting clears node memory, so scenario seeding done
    /// before construction is lost; drivers that seed memory call
    /// [`run`](Simulation::run) directly.
    pub fn run_all(&mut self) -> Result<(), SimError> {
        self.reset();
        log::info!("simulation starts running");
        let result = self.run(0);
        log::info!("simulation end");
        result
    }

    /// Run from the current state.
    ///
    /// `steps == 0` runs until every queued algorithm is finished.
    /// `steps > 0` runs at most that many rounds, across algorithm
    /// boundaries if needed, then pauses with the algorithm state
    /// preserved so a later call resumes.
    pub fn run(&mut self, steps: u64) -> Result<(), SimError> {
        let stepping = steps > 0;
        self.steps_left = steps as i64;
        loop {
            let Some(index) = self.network.current_algorithm_index() else {
                log::info!("algorithm queue exhausted");
                break;
            };
            let Some(mut algorithm) = self.network.take_algorithm(index) else {
                break;
            };
            let result = self.run_algorithm(algorithm.as_mut());
            self.network.restore_algorithm(index, algorithm);
            result?;
            if stepping && self.steps_left <= 0 {
                break;
            }
        }
        Ok(())
    }

    /// Run a single round.
    pub fn run_step(&mut self) -> Result<(), SimError> {
        self.run(1)
    }

    pub fn reset(&mut self) {
        log::info!("resetting simulation");
        self.network.reset();
    }

    /// Run one algorithm until it halts, the budget runs out, or a node
    /// signals termination. Marks the algorithm finished unless it was
    /// paused by the budget.
    fn run_algorithm(&mut self, algorithm: &mut dyn Algorithm) -> Result<(), SimError> {
        match algorithm.kind() {
            AlgorithmKind::WholeNetwork => {
                self.steps_left -= 1;
                algorithm.run(&mut self.network)?;
            }
            AlgorithmKind::PerNode => {
                if self.network.state.step == 1 {
                    log::info!("initializing algorithm `{}`", algorithm.name());
                    algorithm.initializer(&mut self.network)?;
                }
                while !self.is_halted(algorithm) {
                    self.steps_left -= 1;
                    self.network.communicate()?;
                    let mut terminated = false;
                    for id in self.network.node_ids() {
                        let Some(node) = self.network.node_mut(id) else {
                            continue;
                        };
                        if algorithm.step(node)? == StepResult::Terminate {
                            terminated = true;
                        }
                    }
                    self.network.state.step += 1;
                    if let Some(hook) = &mut self.round_hook {
                        hook(&self.network);
                    }
                    if terminated {
                        break;
                    }
                    if self.steps_left == 0 {
                        return Ok(()); // paused, not finished
                    }
                }
            }
        }
        log::info!("algorithm `{}` finished", algorithm.name());
        self.network.state.finished = true;
        Ok(())
    }

    /// Termination detection, evaluated once per round: the algorithm's
    /// early-exit check first, otherwise halted iff no message exists
    /// anywhere (staging outbox, node outboxes, node inboxes) and no
    /// node sits in a working-sentinel status.
    fn is_halted(&self, algorithm: &dyn Algorithm) -> bool {
        if algorithm.early_exit(&self.network) {
            return true;
        }
        !self.network.has_messages_in_flight()
            && !self
                .network
                .nodes()
                .any(|node| algorithm.is_working_status(&node.status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::{dispatch, Handler, StepResult};
    use crate::message::{Message, Value};
    use crate::network::Network;
    use crate::node::{Node, NodeId, NodeSpec, Status};
    use crate::topology::Point;

    const LISTENING: Status = Status::new("LISTENING");
    const DONE: Status = Status::new("DONE");

    /// Backoff-style algorithm: nodes count an internal timer down and
    /// finish without exchanging a single message. Exercises the
    /// working-status sentinel of the halting predicate.
    struct Backoff;

    impl Algorithm for Backoff {
        fn name(&self) -> &str {
            "backoff"
        }

        fn initializer(&mut self, network: &mut Network) -> Result<(), SimError> {
            for id in network.node_ids() {
                if let Some(node) = network.node_mut(id) {
                    node.status = LISTENING;
                    node.memory.insert("Timer".into(), Value::Int(3));
                }
            }
            Ok(())
        }

        fn step(&mut self, node: &mut Node) -> Result<StepResult, SimError> {
            if node.status == LISTENING {
                let timer = node.memory["Timer"].as_int().unwrap_or(0) - 1;
                node.memory.insert("Timer".into(), Value::Int(timer));
                if timer <= 0 {
                    node.status = DONE;
                }
                return Ok(StepResult::Handled);
            }
            Ok(StepResult::Idle)
        }

        fn is_working_status(&self, status: &Status) -> bool {
            *status == LISTENING
        }
    }

    /// One-shot whole-network algorithm: stamps every node DONE.
    struct StampAll;

    impl Algorithm for StampAll {
        fn name(&self) -> &str {
            "stamp-all"
        }

        fn kind(&self) -> AlgorithmKind {
            AlgorithmKind::WholeNetwork
        }

        fn step(&mut self, _node: &mut Node) -> Result<StepResult, SimError> {
            Ok(StepResult::Idle)
        }

        fn run(&mut self, network: &mut Network) -> Result<(), SimError> {
            for id in network.node_ids() {
                if let Some(node) = network.node_mut(id) {
                    node.status = DONE;
                }
            }
            Ok(())
        }
    }

    /// Ping-pong relay used for pause/resume tests: the initiator sends
    /// `remaining` hops along a pair of nodes.
    struct Relay;

    const RELAYING: Status = Status::new("RELAYING");

    fn on_relaying(_alg: &mut Relay, node: &mut Node, message: &Message) -> Result<(), SimError> {
        let remaining = message.data.as_int().unwrap_or(0);
        if remaining > 0 {
            let peer = node.memory["peer"].as_node();
            if let Some(peer) = peer {
                node.send(Message::new("hop").with_data(remaining - 1).to(peer));
            }
        }
        let hops = node.memory.get("hops").and_then(|v| v.as_int()).unwrap_or(0);
        node.memory.insert("hops".into(), Value::Int(hops + 1));
        Ok(())
    }

    impl Algorithm for Relay {
        fn name(&self) -> &str {
            "relay"
        }

        fn initializer(&mut self, network: &mut Network) -> Result<(), SimError> {
            let ids = network.node_ids();
            for &id in &ids {
                if let Some(node) = network.node_mut(id) {
                    node.status = RELAYING;
                }
            }
            network.inject(Message::new("hop").with_data(6i64).to(ids[0]));
            Ok(())
        }

        fn step(&mut self, node: &mut Node) -> Result<StepResult, SimError> {
            dispatch(self, &[(RELAYING, on_relaying as Handler<Self>)], node)
        }
    }

    fn two_node_network() -> (Network, NodeId, NodeId) {
        let mut net = Network::new();
        let a = net
            .add_node(NodeSpec::new().at(Point::new(0.0, 0.0)).comm_range(100.0))
            .unwrap();
        let b = net
            .add_node(NodeSpec::new().at(Point::new(50.0, 0.0)).comm_range(100.0))
            .unwrap();
        net.node_mut(a)
            .unwrap()
            .memory
            .insert("peer".into(), Value::Node(b));
        net.node_mut(b)
            .unwrap()
            .memory
            .insert("peer".into(), Value::Node(a));
        (net, a, b)
    }

    #[test]
    fn test_working_status_keeps_algorithm_alive() {
        let (mut net, a, b) = two_node_network();
        net.set_algorithms(vec![Box::new(Backoff)]).unwrap();
        let mut sim = Simulation::new(net);
        sim.run(0).unwrap();
        let net = sim.network();
        assert!(net.algorithm_state().finished);
        assert_eq!(net.node(a).unwrap().status, DONE);
        assert_eq!(net.node(b).unwrap().status, DONE);
        // Three timer rounds plus the final round that observes the
        // drained state.
        assert!(net.algorithm_state().step >= 4);
    }

    #[test]
    fn test_status_stable_without_input() {
        // Once DONE with no further messages addressed to it, a node's
        // status never changes again.
        let (mut net, a, _) = two_node_network();
        net.set_algorithms(vec![Box::new(Backoff)]).unwrap();
        let mut sim = Simulation::new(net);
        sim.run(0).unwrap();
        let status_after = sim.network().node(a).unwrap().status;
        sim.run(0).unwrap();
        assert_eq!(sim.network().node(a).unwrap().status, status_after);
    }

    #[test]
    fn test_whole_network_algorithm_counts_one_step() {
        let (mut net, a, _) = two_node_network();
        net.set_algorithms(vec![Box::new(StampAll)]).unwrap();
        let mut sim = Simulation::new(net);
        sim.run(1).unwrap();
        assert!(sim.network().algorithm_state().finished);
        assert_eq!(sim.network().node(a).unwrap().status, DONE);
    }

    #[test]
    fn test_pause_and_resume() {
        let (mut net, a, b) = two_node_network();
        net.set_algorithms(vec![Box::new(Relay)]).unwrap();
        let mut sim = Simulation::new(net);
        sim.run(2).unwrap();
        assert!(!sim.network().algorithm_state().finished, "paused, not finished");
        let paused_step = sim.network().algorithm_state().step;
        assert_eq!(paused_step, 3, "two rounds ran");
        sim.run(0).unwrap();
        assert!(sim.network().algorithm_state().finished);
        let total_hops = sim.network().node(a).unwrap().memory["hops"]
            .as_int()
            .unwrap()
            + sim.network().node(b).unwrap().memory["hops"].as_int().unwrap();
        assert_eq!(total_hops, 7, "all seven hops happened exactly once");
    }

    #[test]
    fn test_queue_advances_across_algorithms() {
        let (mut net, a, _) = two_node_network();
        net.set_algorithms(vec![Box::new(Backoff), Box::new(StampAll)])
            .unwrap();
        let mut sim = Simulation::new(net);
        sim.run(0).unwrap();
        assert_eq!(sim.network().algorithm_state().index, 1);
        assert!(sim.network().algorithm_state().finished);
        assert_eq!(sim.network().node(a).unwrap().status, DONE);
    }

    #[test]
    fn test_round_hook_fires_per_round() {
        use std::cell::Cell;
        use std::rc::Rc;

        let (mut net, _, _) = two_node_network();
        net.set_algorithms(vec![Box::new(Backoff)]).unwrap();
        let mut sim = Simulation::new(net);
        let rounds = Rc::new(Cell::new(0u64));
        let counter = Rc::clone(&rounds);
        sim.on_round(move |_| counter.set(counter.get() + 1));
        sim.run(0).unwrap();
        let steps = sim.network().algorithm_state().step;
        assert_eq!(rounds.get(), steps - 1);
    }

    #[test]
    fn test_halting_blocked_by_pending_inbox() {
        let (mut net, a, _) = two_node_network();
        net.node_mut(a).unwrap().push_to_inbox(Message::new("x"));
        let sim = Simulation::new(net);
        // No node is LISTENING, but the pending inbox keeps the
        // algorithm alive.
        let alg = Backoff;
        assert!(!sim.is_halted(&alg));
    }

    /// Bounces one message to itself forever; only a Terminate result
    /// can end it.
    struct Chatter {
        rounds: u64,
    }

    impl Algorithm for Chatter {
        fn name(&self) -> &str {
            "chatter"
        }

        fn initializer(&mut self, network: &mut Network) -> Result<(), SimError> {
            let first = network.node_ids()[0];
            network.inject(Message::new("tick").to(first));
            Ok(())
        }

        fn step(&mut self, node: &mut Node) -> Result<StepResult, SimError> {
            let Some(message) = node.receive() else {
                return Ok(StepResult::Idle);
            };
            self.rounds += 1;
            let own = node.id();
            node.send(message.to(own));
            if self.rounds >= 3 {
                return Ok(StepResult::Terminate);
            }
            Ok(StepResult::Handled)
        }
    }

    #[test]
    fn test_terminate_overrides_pending_messages() {
        let (mut net, _, _) = two_node_network();
        net.set_algorithms(vec![Box::new(Chatter { rounds: 0 })])
            .unwrap();
        let mut sim = Simulation::new(net);
        sim.run(0).unwrap();
        assert!(sim.network().algorithm_state().finished);
        // The final bounce is still queued; Terminate ended the loop
        // anyway.
        assert!(sim.network().has_messages_in_flight());
    }

    #[test]
    fn test_empty_queue_runs_to_noop() {
        let (net, _, _) = two_node_network();
        let mut sim = Simulation::new(net);
        sim.run(0).unwrap();
        assert!(!sim.network().algorithm_state().finished);
    }
}
