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

use itertools::iproduct;
use log::trace;
use petgraph::prelude::*;
use std::collections::HashMap;

use super::{IndexRange, PropagationState, SimComponent, SimContext};
use crate::error::Error;
use crate::params::Parameters;
use crate::phit::{CreditState, Phit, TimedPhit, VcBuffer};
use crate::topology::Topology;
use crate::Cycle;

/// Input-buffered virtual-channel router.
///
/// Arriving phits are buffered per (input port, vc); each cycle a
/// fixed-priority arbiter walks (vc, input port) in ascending order and
/// moves at most one phit to each output connection. There is no output
/// buffering: the first winner owns an output for the cycle, so high-index
/// ports and vcs can be starved under sustained contention.
#[derive(Debug)]
pub struct InputQueuedRouter {
    node: NodeIndex,
    name: String,
    prop: PropagationState,
    /// Guard so pending output credits fold in once per cycle even though
    /// forward propagation may be attempted several times.
    internal_cycle: Cycle,
    inputs: IndexRange,
    outputs: IndexRange,
    /// Buffered phits, indexed by [input port][vc].
    input_buffers: Vec<Vec<VcBuffer>>,
    /// Credits owed upstream for phits forwarded this cycle, [input][vc].
    credit_return: Vec<Vec<u64>>,
    /// Credit balance for downstream space, [output port][vc].
    credit: Vec<Vec<i64>>,
    credit_update: Vec<Vec<CreditState>>,
    max_vc: usize,
}

impl InputQueuedRouter {
    pub(crate) fn new(
        node: NodeIndex,
        topology: &Topology,
        params: &Parameters,
        connection_index: &HashMap<EdgeIndex, usize>,
        ctx: &mut SimContext,
    ) -> Result<Self, Error> {
        let in_edges = topology.input_connections(node);
        let out_edges = topology.output_connections(node);
        let param = params.router(node)?;
        if param.inputs.len() != in_edges.len() || param.outputs.len() != out_edges.len() {
            return Err(Error::ParameterMismatch(node));
        }

        // Port numbering must be dense so connection order, parameter order
        // and routing-table indices all agree.
        for (index, edge) in in_edges.iter().enumerate() {
            let port = topology.connection(*edge).dst_port;
            if port.0 != index {
                return Err(Error::InvalidPort { node, port: port.0 });
            }
        }
        for (index, edge) in out_edges.iter().enumerate() {
            let port = topology.connection(*edge).src_port;
            if port.0 != index {
                return Err(Error::InvalidPort { node, port: port.0 });
            }
        }

        let input_indices: Vec<usize> = in_edges.iter().map(|e| connection_index[e]).collect();
        let output_indices: Vec<usize> = out_edges.iter().map(|e| connection_index[e]).collect();

        let input_buffers: Vec<Vec<VcBuffer>> = param
            .inputs
            .iter()
            .map(|port| port.vcs.iter().map(|vc| VcBuffer::new(vc.depth)).collect())
            .collect();
        let credit_return = param
            .inputs
            .iter()
            .map(|port| vec![0; port.vc_count()])
            .collect();
        let credit = param
            .outputs
            .iter()
            .map(|port| vec![0; port.vc_count()])
            .collect();
        let credit_update = param
            .outputs
            .iter()
            .map(|port| vec![CreditState::new(ctx.cycle); port.vc_count()])
            .collect();
        let max_vc = param
            .inputs
            .iter()
            .map(|port| port.vc_count())
            .max()
            .unwrap_or(0);

        Ok(Self {
            node,
            name: topology.component(node).name.clone(),
            prop: PropagationState::new(ctx.cycle),
            internal_cycle: ctx.cycle,
            inputs: ctx.alloc_index_range(&input_indices),
            outputs: ctx.alloc_index_range(&output_indices),
            input_buffers,
            credit_return,
            credit,
            credit_update,
            max_vc,
        })
    }

    pub fn node(&self) -> NodeIndex {
        self.node
    }

    /// Buffered phit count for one (input port, vc), for inspection.
    pub fn occupancy(&self, port: usize, vc: usize) -> usize {
        self.input_buffers[port][vc].occupancy()
    }

    pub(crate) fn dump(&self) {
        log::info!(
            "router {} ({}): output credits {:?} input occupancy {:?}",
            self.name,
            self.node.index(),
            self.credit,
            self.input_buffers
                .iter()
                .map(|port| port.iter().map(VcBuffer::occupancy).collect::<Vec<_>>())
                .collect::<Vec<_>>()
        );
    }
}

impl SimComponent for InputQueuedRouter {
    fn propagation(&mut self) -> &mut PropagationState {
        &mut self.prop
    }

    fn try_forward(&mut self, ctx: &mut SimContext) -> Result<bool, Error> {
        let cycle = ctx.cycle;

        // Fold in last cycle's output credit updates (once).
        if self.internal_cycle != cycle {
            for (port, updates) in self.credit_update.iter().enumerate() {
                for (vc, update) in updates.iter().enumerate() {
                    if update.credit > 0 {
                        self.credit[port][vc] += update.credit as i64;
                        trace!(
                            "router {} output port {} vc {} added {} credits, now {}",
                            self.name,
                            port,
                            vc,
                            update.credit,
                            self.credit[port][vc]
                        );
                    }
                }
            }
            self.internal_cycle = cycle;
        }

        // Every input must carry this cycle's value before the switch can
        // allocate outputs.
        let input_conns = &ctx.index_store[self.inputs.as_range()];
        if input_conns
            .iter()
            .any(|&c| ctx.connections[c].forward.cycle != cycle)
        {
            return Ok(false);
        }

        // Accept arrivals. A phit accepted here may also win arbitration
        // below, so a cycle can carry it straight through to an output.
        for (port, &conn) in input_conns.iter().enumerate() {
            let input = &ctx.connections[conn];
            if input.forward.phit.valid {
                let phit = input.forward.phit;
                trace!(
                    "router {} received data {:#x} port {} vc {} from connection {}",
                    self.name,
                    phit.data,
                    port,
                    phit.vc,
                    input.id.index()
                );
                self.input_buffers[port][phit.vc].push(phit);
            }
        }

        for counters in self.credit_return.iter_mut() {
            counters.iter_mut().for_each(|c| *c = 0);
        }

        // Fixed-priority switch allocation: lowest vc first, then lowest
        // input port.
        for (vc, port) in iproduct!(0..self.max_vc, 0..self.input_buffers.len()) {
            if vc >= self.input_buffers[port].len() {
                continue;
            }
            let phit = match self.input_buffers[port][vc].front() {
                Some(phit) => *phit,
                None => continue,
            };

            let out = ctx.routing.route(self.node, port, vc, phit.destination)?;
            if self.credit[out.port][out.vc] <= 0 {
                trace!(
                    "router {} cannot send data {:#x} vc {} to output port {}, no credit",
                    self.name,
                    phit.data,
                    vc,
                    out.port
                );
                continue;
            }

            // No output speedup: one winner per output connection per cycle.
            let out_conn = ctx.index_store[self.outputs.start + out.port];
            let output = &mut ctx.connections[out_conn];
            if output.forward.cycle == cycle {
                continue;
            }

            output.forward.phit = Phit {
                vc: out.vc,
                valid: true,
                ..phit
            };
            output.forward.cycle = cycle;
            self.credit[out.port][out.vc] -= 1;
            self.credit_return[port][vc] += 1;
            self.input_buffers[port][vc].pop();
            trace!(
                "router {} sending data {:#x} input port {} vc {} to output port {} vc {}, \
                 credit now {}",
                self.name,
                phit.data,
                port,
                vc,
                out.port,
                out.vc,
                self.credit[out.port][out.vc]
            );
        }

        // Downstream always observes a defined value.
        for slot in self.outputs.as_range() {
            let conn = ctx.index_store[slot];
            let output = &mut ctx.connections[conn];
            if output.forward.cycle != cycle {
                output.forward.phit = Phit::bubble();
                output.forward.cycle = cycle;
            }
        }

        Ok(true)
    }

    fn try_reverse(&mut self, ctx: &mut SimContext) -> Result<bool, Error> {
        let cycle = ctx.cycle;
        if self.prop.forward != cycle {
            return Ok(false);
        }

        // Credits owed upstream are unconditional: the full buffer at cycle
        // 0, afterwards whatever was forwarded this cycle (possibly 0).
        for (port, counters) in self.credit_return.iter().enumerate() {
            let conn = ctx.index_store[self.inputs.start + port];
            let input = &mut ctx.connections[conn];
            for vc in 0..input.reverse.len() {
                let amount = if cycle == 0 {
                    self.input_buffers[port][vc].depth() as u64
                } else {
                    counters[vc]
                };
                input.reverse[vc] = TimedPhit::new(
                    cycle,
                    Phit {
                        data: amount,
                        valid: true,
                        ..Default::default()
                    },
                );
                trace!(
                    "router {} returning {} credits input port {} vc {} on connection {}",
                    self.name,
                    amount,
                    port,
                    vc,
                    input.id.index()
                );
            }
        }

        // Latch credits arriving from downstream.
        let mut stamped = 0;
        let mut expected = 0;
        for (port, updates) in self.credit_update.iter_mut().enumerate() {
            let conn = ctx.index_store[self.outputs.start + port];
            let output = &ctx.connections[conn];
            for (vc, update) in updates.iter_mut().enumerate() {
                expected += 1;
                let slot = output.reverse[vc];
                if slot.cycle == cycle {
                    if update.cycle != cycle {
                        update.cycle = cycle;
                        update.credit = if slot.phit.valid { slot.phit.data } else { 0 };
                        trace!(
                            "router {} received {} credits output port {} vc {} via connection {}",
                            self.name,
                            update.credit,
                            port,
                            vc,
                            output.id.index()
                        );
                    }
                    stamped += 1;
                } else {
                    trace!(
                        "router {} waiting for credits output port {} vc {}",
                        self.name,
                        port,
                        vc
                    );
                }
            }
        }

        Ok(stamped == expected)
    }
}
