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

use super::{PropagationState, SimComponent, SimContext};
use crate::error::Error;
use crate::params::Parameters;
use crate::phit::{Phit, TimedPhit};
use crate::topology::Topology;
use crate::Cycle;

/// Traffic consumption endpoint. Received phits are recorded in arrival
/// order; every received phit returns one credit upstream on its vc, and at
/// cycle 0 each vc grants its full buffer depth to bootstrap the protocol.
#[derive(Debug)]
pub struct SinkInterface {
    node: NodeIndex,
    name: String,
    prop: PropagationState,
    /// Per-vc buffer depth, advertised upstream at cycle 0.
    depths: Vec<usize>,
    received: Vec<TimedPhit>,
    src_connection: usize,
}

impl SinkInterface {
    pub(crate) fn new(
        node: NodeIndex,
        topology: &Topology,
        params: &Parameters,
        connection_index: &HashMap<EdgeIndex, usize>,
        cycle: Cycle,
    ) -> Result<Self, Error> {
        let inputs = topology.input_connections(node);
        if inputs.len() != 1 || !topology.output_connections(node).is_empty() {
            return Err(Error::InvalidInterface(node));
        }
        let mut depths: Vec<usize> = params
            .sink(node)?
            .vcs
            .iter()
            .map(|vc| vc.depth)
            .collect();
        if depths.is_empty() {
            depths.push(0);
        }

        Ok(Self {
            node,
            name: topology.component(node).name.clone(),
            prop: PropagationState::new(cycle),
            depths,
            received: Vec::new(),
            src_connection: connection_index[&inputs[0]],
        })
    }

    pub fn node(&self) -> NodeIndex {
        self.node
    }

    /// All phits observed so far, in arrival order. Each entry is stamped
    /// with the cycle it arrived.
    pub fn received(&self) -> &[TimedPhit] {
        &self.received
    }

    pub(crate) fn dump(&self) {
        log::info!(
            "sink {} ({}): {} phits received",
            self.name,
            self.node.index(),
            self.received.len()
        );
    }
}

impl SimComponent for SinkInterface {
    fn propagation(&mut self) -> &mut PropagationState {
        &mut self.prop
    }

    fn try_forward(&mut self, ctx: &mut SimContext) -> Result<bool, Error> {
        let cycle = ctx.cycle;
        let src = &mut ctx.connections[self.src_connection];

        if src.forward.cycle != cycle {
            return Ok(false);
        }

        if src.forward.phit.valid {
            let vc = src.forward.phit.vc;
            self.received.push(TimedPhit::new(cycle, src.forward.phit));

            // Space freed; return one credit on the phit's vc.
            src.reverse[vc] = TimedPhit::new(
                cycle,
                Phit {
                    data: 1,
                    valid: true,
                    ..Default::default()
                },
            );
            trace!(
                "sink {} received data {:#x} vc {} cycle {}, returning 1 credit",
                self.name,
                src.forward.phit.data,
                vc,
                cycle
            );
        }

        if cycle == 0 {
            // Reset grant: advertise the entire buffer on every vc.
            for (vc, slot) in src.reverse.iter_mut().enumerate() {
                *slot = TimedPhit::new(
                    cycle,
                    Phit {
                        data: self.depths[vc] as u64,
                        valid: true,
                        ..Default::default()
                    },
                );
                trace!(
                    "sink {} granting {} credits vc {}",
                    self.name,
                    self.depths[vc],
                    vc
                );
            }
        } else {
            // Idle vcs still get a defined (invalid) credit phit.
            for slot in src.reverse.iter_mut() {
                if slot.cycle != cycle {
                    *slot = TimedPhit::new(cycle, Phit::bubble());
                }
            }
        }

        Ok(true)
    }

    // All reverse writing happens during forward propagation.
    fn try_reverse(&mut self, ctx: &mut SimContext) -> Result<bool, Error> {
        Ok(self.prop.forward == ctx.cycle)
    }
}
