//! Packet-switched network of machines.
//!
//! Every node runs the same program and is primed with its own address.
//! A node sends a packet by emitting three values: destination, X and Y.
//! A node that asks for input while it has no packet queued is given -1
//! and counts as idle. Packets sent to the NAT address are kept by the NAT;
//! when the whole network is idle, the NAT re-sends the last one it got to
//! node 0.

use crate::machine::{Machine, Word};
use crate::orchestrate::scheduler::OrchestrateError;
use serde::{Serialize, Deserialize};
use std::collections::{HashSet, VecDeque};
use tracing::{debug, trace};

/// Address of the NAT.
pub const NAT_ADDRESS: Word = 255;

/// Value handed to a node that reads with nothing queued.
pub const NO_PACKET: Word = -1;

/// A packet payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Packet {
    pub x: Word,
    pub y: Word,
}

/// Something the NAT did during a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NatEvent {
    /// A node sent a packet to the NAT.
    Received(Packet),
    /// The network was idle and the NAT woke node 0.
    Delivered(Packet),
}

#[derive(Debug, Clone)]
struct Node {
    machine: Machine,
    queue: VecDeque<Packet>,
    /// Output words of a packet still being written.
    partial: Vec<Word>,
    idle: bool,
}

/// A network of machines with a NAT.
#[derive(Debug, Clone)]
pub struct Network {
    nodes: Vec<Node>,
    nat: Option<Packet>,
    rounds: u64,
}

impl Network {
    /// Boot `size` nodes running `program`.
    pub fn new(program: &[Word], size: usize) -> Self {
        let nodes = (0..size)
            .map(|address| {
                let mut machine = Machine::new(program);
                machine.push_input(address as Word);
                Node {
                    machine,
                    queue: VecDeque::new(),
                    partial: Vec::with_capacity(3),
                    idle: false,
                }
            })
            .collect();

        Self {
            nodes,
            nat: None,
            rounds: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Packet currently held by the NAT.
    pub fn nat_packet(&self) -> Option<Packet> {
        self.nat
    }

    pub fn rounds(&self) -> u64 {
        self.rounds
    }

    /// Node `address`'s machine.
    pub fn machine(&self, address: usize) -> Option<&Machine> {
        self.nodes.get(address).map(|node| &node.machine)
    }

    /// Inject a packet into node `address`'s queue.
    pub fn send(&mut self, address: usize, packet: Packet) -> Result<(), OrchestrateError> {
        let count = self.nodes.len();
        let node = self
            .nodes
            .get_mut(address)
            .ok_or(OrchestrateError::UnknownMachine { index: address, count })?;
        node.queue.push_back(packet);
        Ok(())
    }

    /// True when every node is idle and no packet is in flight.
    pub fn is_idle(&self) -> bool {
        self.nodes.iter().all(|node| node.idle && node.queue.is_empty())
    }

    /// Step every node once, route what they sent, then let the NAT act.
    pub fn step_round(&mut self) -> Result<Vec<NatEvent>, OrchestrateError> {
        if self.nodes.is_empty() {
            return Err(OrchestrateError::EmptyTopology);
        }

        let mut events = Vec::new();

        for index in 0..self.nodes.len() {
            let node = &mut self.nodes[index];
            node.machine
                .step()
                .map_err(|source| OrchestrateError::Machine { index, source })?;

            while let Some(value) = node.machine.try_pop_output() {
                node.partial.push(value);
            }

            let mut sent = Vec::new();
            while node.partial.len() >= 3 {
                let words: Vec<Word> = node.partial.drain(..3).collect();
                sent.push((words[0], Packet { x: words[1], y: words[2] }));
            }

            if node.machine.is_waiting() && node.machine.input().is_empty() {
                match node.queue.pop_front() {
                    Some(packet) => {
                        trace!(node = index, ?packet, "receive");
                        node.machine.push_inputs([packet.x, packet.y]);
                        node.idle = false;
                    }
                    None => {
                        node.machine.push_input(NO_PACKET);
                        node.idle = true;
                    }
                }
            }

            for (dest, packet) in sent {
                if let Some(event) = self.route(index, dest, packet)? {
                    events.push(event);
                }
            }
        }

        if self.is_idle() {
            if let Some(packet) = self.nat {
                debug!(?packet, round = self.rounds, "network idle, NAT wakes node 0");
                self.nodes[0].queue.push_back(packet);
                events.push(NatEvent::Delivered(packet));
            }
        }

        self.rounds += 1;
        Ok(events)
    }

    fn route(&mut self, from: usize, dest: Word, packet: Packet) -> Result<Option<NatEvent>, OrchestrateError> {
        if dest == NAT_ADDRESS {
            debug!(from, ?packet, "packet to NAT");
            self.nat = Some(packet);
            return Ok(Some(NatEvent::Received(packet)));
        }

        let target = usize::try_from(dest)
            .ok()
            .and_then(|d| self.nodes.get_mut(d))
            .ok_or(OrchestrateError::UnroutablePacket { from, dest })?;
        trace!(from, dest, ?packet, "send");
        target.queue.push_back(packet);
        Ok(None)
    }

    /// Drive rounds until `pick` returns a packet.
    fn run_until<F>(&mut self, max_rounds: u64, mut pick: F) -> Result<Packet, OrchestrateError>
    where
        F: FnMut(NatEvent) -> Option<Packet>,
    {
        let start = self.rounds;
        while self.rounds - start < max_rounds {
            for event in self.step_round()? {
                if let Some(packet) = pick(event) {
                    return Ok(packet);
                }
            }
            if self.nodes.iter().all(|node| node.machine.is_halted()) {
                return Err(OrchestrateError::AllHalted { round: self.rounds });
            }
        }
        Err(OrchestrateError::RoundLimit { rounds: max_rounds })
    }

    /// Run until some node sends a packet to the NAT.
    pub fn first_nat_packet(&mut self, max_rounds: u64) -> Result<Packet, OrchestrateError> {
        self.run_until(max_rounds, |event| match event {
            NatEvent::Received(packet) => Some(packet),
            NatEvent::Delivered(_) => None,
        })
    }

    /// Run until the NAT delivers a packet whose Y it has delivered before.
    pub fn first_repeated_nat_delivery(&mut self, max_rounds: u64) -> Result<Packet, OrchestrateError> {
        let mut seen = HashSet::new();
        self.run_until(max_rounds, |event| match event {
            NatEvent::Delivered(packet) if !seen.insert(packet.y) => Some(packet),
            _ => None,
        })
    }
}
