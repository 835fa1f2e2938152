// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The simulation driver.
//!
//! The driver owns all per-connection wire state and one simulation object
//! per topology component. Each cycle it repeatedly offers every component a
//! chance to make forward and reverse progress until all of them report
//! completion for the cycle: an asynchronous fixed point over the implicit
//! dependency graph, needing no topological sort. A component whose upstream
//! values are not yet stamped for the cycle simply declines and is retried
//! on a later tick.

use log::{debug, trace};
use petgraph::prelude::*;
use std::collections::HashMap;

mod link;
mod pipeline;
mod router;
mod sink;
mod source;

pub use link::PipelinedLink;
pub use router::InputQueuedRouter;
pub use sink::SinkInterface;
pub use source::SourceInterface;

use crate::error::Error;
use crate::params::Parameters;
use crate::phit::ConnectionState;
use crate::routing::RoutingTable;
use crate::topology::{ComponentKind, Topology};
use crate::Cycle;

/// Shared per-cycle state: the connection table, the growable store backing
/// variable-length connection index lists, and the routing table.
///
/// Every connection slot has exactly one writer per propagation phase per
/// cycle, established by construction, so components may freely take
/// mutable references into the table while ticking single-threaded.
#[derive(Debug)]
pub struct SimContext {
    pub(crate) cycle: Cycle,
    pub(crate) connections: Vec<ConnectionState>,
    pub(crate) index_store: Vec<usize>,
    pub(crate) routing: RoutingTable,
}

impl SimContext {
    pub fn cycle(&self) -> Cycle {
        self.cycle
    }

    /// Append `indices` to the shared store and return the range that now
    /// holds them. Ranges are allocated once at build time and never move.
    pub(crate) fn alloc_index_range(&mut self, indices: &[usize]) -> IndexRange {
        let start = self.index_store.len();
        self.index_store.extend_from_slice(indices);
        IndexRange {
            start,
            count: indices.len(),
        }
    }
}

/// A span of connection indices inside [`SimContext::index_store`].
#[derive(Clone, Copy, Debug)]
pub(crate) struct IndexRange {
    pub(crate) start: usize,
    pub(crate) count: usize,
}

impl IndexRange {
    pub(crate) fn as_range(&self) -> std::ops::Range<usize> {
        self.start..self.start + self.count
    }
}

/// Last cycle for which each propagation direction completed.
#[derive(Clone, Copy, Debug)]
pub struct PropagationState {
    pub forward: Cycle,
    pub reverse: Cycle,
}

impl PropagationState {
    pub fn new(cycle: Cycle) -> Self {
        Self {
            forward: cycle,
            reverse: cycle,
        }
    }
}

/// The propagation-convergence contract shared by all component kinds.
///
/// `try_forward`/`try_reverse` report whether the direction completed for
/// the current cycle; declining is normal backpressure, never an error. The
/// provided `tick` retries only directions that have not completed yet, so
/// a component is asked again only while it still has work outstanding.
pub trait SimComponent {
    fn propagation(&mut self) -> &mut PropagationState;

    fn try_forward(&mut self, ctx: &mut SimContext) -> Result<bool, Error>;

    fn try_reverse(&mut self, ctx: &mut SimContext) -> Result<bool, Error>;

    fn tick(&mut self, ctx: &mut SimContext) -> Result<bool, Error> {
        let cycle = ctx.cycle;
        let mut converged = true;

        if self.propagation().forward != cycle {
            if self.try_forward(ctx)? {
                self.propagation().forward = cycle;
            } else {
                converged = false;
            }
        }
        if self.propagation().reverse != cycle {
            if self.try_reverse(ctx)? {
                self.propagation().reverse = cycle;
            } else {
                converged = false;
            }
        }
        Ok(converged)
    }
}

/// Cycle-accurate simulation of one fabric.
#[derive(Debug)]
pub struct NocSimulation {
    ctx: SimContext,
    sources: Vec<SourceInterface>,
    links: Vec<PipelinedLink>,
    routers: Vec<InputQueuedRouter>,
    sinks: Vec<SinkInterface>,
    connection_index: HashMap<EdgeIndex, usize>,
    source_index: HashMap<NodeIndex, usize>,
    sink_index: HashMap<NodeIndex, usize>,
    router_index: HashMap<NodeIndex, usize>,
}

impl NocSimulation {
    /// Build simulation state for a topology: one connection record per
    /// edge, one typed simulation object per component. Structural problems
    /// (wrong connection arity, missing or mismatched parameters, sparse
    /// router port numbering) are reported here, before any cycle runs.
    pub fn new(
        topology: &Topology,
        params: &Parameters,
        routing: RoutingTable,
    ) -> Result<Self, Error> {
        let mut sim = Self {
            ctx: SimContext {
                cycle: -1,
                connections: Vec::new(),
                index_store: Vec::new(),
                routing,
            },
            sources: Vec::new(),
            links: Vec::new(),
            routers: Vec::new(),
            sinks: Vec::new(),
            connection_index: HashMap::new(),
            source_index: HashMap::new(),
            sink_index: HashMap::new(),
            router_index: HashMap::new(),
        };

        for edge in topology.connections() {
            let vc_count = connection_vc_count(topology, params, edge)?;
            let index = sim.ctx.connections.len();
            sim.ctx
                .connections
                .push(ConnectionState::new(edge, vc_count, sim.ctx.cycle));
            sim.connection_index.insert(edge, index);
        }

        for node in topology.nodes() {
            match topology.component(node).kind {
                ComponentKind::Source => {
                    let object = SourceInterface::new(
                        node,
                        topology,
                        params,
                        &sim.connection_index,
                        sim.ctx.cycle,
                    )?;
                    sim.source_index.insert(node, sim.sources.len());
                    sim.sources.push(object);
                }
                ComponentKind::Sink => {
                    let object = SinkInterface::new(
                        node,
                        topology,
                        params,
                        &sim.connection_index,
                        sim.ctx.cycle,
                    )?;
                    sim.sink_index.insert(node, sim.sinks.len());
                    sim.sinks.push(object);
                }
                ComponentKind::Link => {
                    let object = PipelinedLink::new(
                        node,
                        topology,
                        params,
                        &sim.connection_index,
                        &sim.ctx.connections,
                        sim.ctx.cycle,
                    )?;
                    sim.links.push(object);
                }
                ComponentKind::Router => {
                    let object = InputQueuedRouter::new(
                        node,
                        topology,
                        params,
                        &sim.connection_index,
                        &mut sim.ctx,
                    )?;
                    sim.router_index.insert(node, sim.routers.len());
                    sim.routers.push(object);
                }
            }
        }

        Ok(sim)
    }

    pub fn current_cycle(&self) -> Cycle {
        self.ctx.cycle
    }

    pub fn connections(&self) -> &[ConnectionState] {
        &self.ctx.connections
    }

    pub fn source_mut(&mut self, node: NodeIndex) -> Result<&mut SourceInterface, Error> {
        let index = *self
            .source_index
            .get(&node)
            .ok_or(Error::UnknownComponent(node))?;
        Ok(&mut self.sources[index])
    }

    pub fn sink(&self, node: NodeIndex) -> Result<&SinkInterface, Error> {
        let index = *self
            .sink_index
            .get(&node)
            .ok_or(Error::UnknownComponent(node))?;
        Ok(&self.sinks[index])
    }

    pub fn router(&self, node: NodeIndex) -> Result<&InputQueuedRouter, Error> {
        let index = *self
            .router_index
            .get(&node)
            .ok_or(Error::UnknownComponent(node))?;
        Ok(&self.routers[index])
    }

    /// Advance exactly one simulated cycle, ticking until every component
    /// converges. Exhausting `max_ticks` is fatal to the run: it signals a
    /// combinational cycle in the fabric or an inadequate budget, and the
    /// cycle cannot be partially rolled back.
    pub fn run_cycle(&mut self, max_ticks: u64) -> Result<(), Error> {
        self.ctx.cycle += 1;
        debug!("*** cycle {}", self.ctx.cycle);

        let mut ticks = 0;
        loop {
            debug!("tick {}", ticks);
            let converged = self.tick()?;
            ticks += 1;
            if converged {
                break;
            }
            if ticks >= max_ticks {
                return Err(Error::NotConverged {
                    cycle: self.ctx.cycle,
                    ticks,
                });
            }
        }

        for (index, connection) in self.ctx.connections.iter().enumerate() {
            trace!(
                "connection {} ({}): fwd cycle {} data {:#x} vc {} dest {} valid {}",
                index,
                connection.id.index(),
                connection.forward.cycle,
                connection.forward.phit.data,
                connection.forward.phit.vc,
                connection.forward.phit.destination,
                connection.forward.phit.valid
            );
            for (vc, slot) in connection.reverse.iter().enumerate() {
                trace!(
                    "  rev vc {}: cycle {} credits {} valid {}",
                    vc,
                    slot.cycle,
                    slot.phit.data,
                    slot.phit.valid
                );
            }
        }

        Ok(())
    }

    /// One pass offering every component a chance to progress. Sources can
    /// always produce, so they go first; sinks close the credit loop last.
    /// The order is a scheduling heuristic only, not a correctness
    /// requirement.
    fn tick(&mut self) -> Result<bool, Error> {
        let mut converged = true;
        for component in self.sources.iter_mut() {
            converged &= component.tick(&mut self.ctx)?;
        }
        for component in self.links.iter_mut() {
            converged &= component.tick(&mut self.ctx)?;
        }
        for component in self.routers.iter_mut() {
            converged &= component.tick(&mut self.ctx)?;
        }
        for component in self.sinks.iter_mut() {
            converged &= component.tick(&mut self.ctx)?;
        }
        Ok(converged)
    }

    /// Render simulation state through the logger. Diagnostic only.
    pub fn dump(&self) {
        log::info!(
            "simulation at cycle {}: {} connections, {} components",
            self.ctx.cycle,
            self.ctx.connections.len(),
            self.sources.len() + self.links.len() + self.routers.len() + self.sinks.len()
        );
        for source in &self.sources {
            source.dump();
        }
        for link in &self.links {
            link.dump();
        }
        for router in &self.routers {
            router.dump();
        }
        for sink in &self.sinks {
            sink.dump();
        }
    }
}

/// Virtual channels carried by a connection, taken from the parameters of
/// the port that writes its forward slot.
fn connection_vc_count(
    topology: &Topology,
    params: &Parameters,
    edge: EdgeIndex,
) -> Result<usize, Error> {
    let (src_node, _) = topology.endpoints(edge);
    let count = match topology.component(src_node).kind {
        ComponentKind::Source => params.source(src_node)?.vc_count(),
        ComponentKind::Link => params.link(src_node)?.vcs,
        ComponentKind::Router => {
            let param = params.router(src_node)?;
            let port = topology.connection(edge).src_port.0;
            param
                .outputs
                .get(port)
                .ok_or(Error::InvalidPort {
                    node: src_node,
                    port,
                })?
                .vc_count()
        }
        // Sinks never drive a connection.
        ComponentKind::Sink => return Err(Error::InvalidInterface(src_node)),
    };
    Ok(count.max(1))
}
