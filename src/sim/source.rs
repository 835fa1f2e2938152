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

use log::trace;
use petgraph::prelude::*;
use std::collections::HashMap;
use std::collections::VecDeque;

use super::{PropagationState, SimComponent, SimContext};
use crate::error::Error;
use crate::params::Parameters;
use crate::phit::{CreditState, Phit, TimedPhit};
use crate::topology::Topology;
use crate::Cycle;

/// Traffic injection endpoint: one outbound queue and one credit ledger per
/// virtual channel, driving a single outgoing connection.
#[derive(Debug)]
pub struct SourceInterface {
    node: NodeIndex,
    name: String,
    prop: PropagationState,
    /// Phits waiting to be sent, per vc, ordered by injection.
    queues: Vec<VecDeque<TimedPhit>>,
    credit: Vec<i64>,
    credit_update: Vec<CreditState>,
    sink_connection: usize,
}

impl SourceInterface {
    pub(crate) fn new(
        node: NodeIndex,
        topology: &Topology,
        params: &Parameters,
        connection_index: &HashMap<EdgeIndex, usize>,
        cycle: Cycle,
    ) -> Result<Self, Error> {
        let outputs = topology.output_connections(node);
        if outputs.len() != 1 || !topology.input_connections(node).is_empty() {
            return Err(Error::InvalidInterface(node));
        }
        let vc_count = params.source(node)?.vc_count().max(1);

        Ok(Self {
            node,
            name: topology.component(node).name.clone(),
            prop: PropagationState::new(cycle),
            queues: vec![VecDeque::new(); vc_count],
            credit: vec![0; vc_count],
            credit_update: vec![CreditState::new(cycle); vc_count],
            sink_connection: connection_index[&outputs[0]],
        })
    }

    pub fn node(&self) -> NodeIndex {
        self.node
    }

    /// Queue a phit for injection at (or after) the cycle it is stamped
    /// with. The phit's vc selects the queue.
    pub fn inject(&mut self, phit: TimedPhit) -> Result<(), Error> {
        let vc = phit.phit.vc;
        if vc >= self.queues.len() {
            return Err(Error::VcOutOfRange {
                vc,
                max: self.queues.len(),
            });
        }
        self.queues[vc].push_back(phit);
        Ok(())
    }

    /// Current credit balance for a vc, for inspection.
    pub fn credit(&self, vc: usize) -> i64 {
        self.credit[vc]
    }

    pub(crate) fn dump(&self) {
        log::info!(
            "source {} ({}): credits {:?} queued {:?}",
            self.name,
            self.node.index(),
            self.credit,
            self.queues.iter().map(|q| q.len()).collect::<Vec<_>>()
        );
    }
}

impl SimComponent for SourceInterface {
    fn propagation(&mut self) -> &mut PropagationState {
        &mut self.prop
    }

    // Always succeeds in a single attempt. The order of operations per
    // cycle is: fold in the credit update latched last cycle, then send at
    // most one phit, then (in reverse propagation) latch the next update.
    fn try_forward(&mut self, ctx: &mut SimContext) -> Result<bool, Error> {
        let cycle = ctx.cycle;

        for (vc, update) in self.credit_update.iter().enumerate() {
            if update.credit > 0 {
                self.credit[vc] += update.credit as i64;
                trace!(
                    "source {} vc {} added {} credits, now {}",
                    self.name,
                    vc,
                    update.credit,
                    self.credit[vc]
                );
            }
        }

        let sink = &mut ctx.connections[self.sink_connection];
        let mut sent = false;
        for (vc, queue) in self.queues.iter_mut().enumerate() {
            let arrived = queue
                .front()
                .map(|head| head.cycle <= cycle)
                .unwrap_or(false);
            if !arrived {
                continue;
            }
            if self.credit[vc] <= 0 {
                trace!("source {} vc {} blocked, no credit", self.name, vc);
                continue;
            }

            let head = queue.pop_front().unwrap_or_default();
            sink.forward.phit = Phit {
                vc,
                valid: true,
                ..head.phit
            };
            sink.forward.cycle = cycle;
            self.credit[vc] -= 1;
            sent = true;
            trace!(
                "source {} sending data {:#x} vc {} credit now {}",
                self.name,
                sink.forward.phit.data,
                vc,
                self.credit[vc]
            );
            // One forward slot, one phit per cycle.
            break;
        }

        if !sent {
            sink.forward.phit = Phit::bubble();
            sink.forward.cycle = cycle;
        }

        Ok(true)
    }

    fn try_reverse(&mut self, ctx: &mut SimContext) -> Result<bool, Error> {
        let cycle = ctx.cycle;
        let sink = &ctx.connections[self.sink_connection];

        let mut stamped = 0;
        for (vc, update) in self.credit_update.iter_mut().enumerate() {
            let slot = sink.reverse[vc];
            if slot.cycle != cycle {
                continue;
            }
            if update.cycle != cycle {
                update.cycle = cycle;
                update.credit = if slot.phit.valid { slot.phit.data } else { 0 };
                trace!(
                    "source {} received {} credits vc {} via connection {}",
                    self.name,
                    update.credit,
                    vc,
                    sink.id.index()
                );
            }
            stamped += 1;
        }

        Ok(stamped == self.credit_update.len())
    }
}
