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

use super::pipeline::Pipeline;
use super::{PropagationState, SimComponent, SimContext};
use crate::error::Error;
use crate::params::Parameters;
use crate::phit::ConnectionState;
use crate::topology::Topology;
use crate::Cycle;

/// A point-to-point link: one pipelined data path and, per virtual channel,
/// one pipelined credit path back upstream.
#[derive(Debug)]
pub struct PipelinedLink {
    node: NodeIndex,
    name: String,
    prop: PropagationState,
    forward: Pipeline,
    reverse: Vec<Pipeline>,
    phit_width: usize,
    /// Connection feeding the link (upstream side).
    src_connection: usize,
    /// Connection driven by the link (downstream side).
    sink_connection: usize,
}

impl PipelinedLink {
    pub(crate) fn new(
        node: NodeIndex,
        topology: &Topology,
        params: &Parameters,
        connection_index: &HashMap<EdgeIndex, usize>,
        connections: &[ConnectionState],
        cycle: Cycle,
    ) -> Result<Self, Error> {
        let inputs = topology.input_connections(node);
        let outputs = topology.output_connections(node);
        if inputs.len() != 1 || outputs.len() != 1 {
            return Err(Error::InvalidLink(node));
        }
        let param = params.link(node)?;
        let src_connection = connection_index[&inputs[0]];
        let sink_connection = connection_index[&outputs[0]];

        // One reverse pipeline per vc carried by the downstream connection.
        let reverse = (0..connections[sink_connection].vc_count())
            .map(|_| Pipeline::new(param.reverse_stages))
            .collect();

        Ok(Self {
            node,
            name: topology.component(node).name.clone(),
            prop: PropagationState::new(cycle),
            forward: Pipeline::new(param.forward_stages),
            reverse,
            phit_width: param.phit_width,
            src_connection,
            sink_connection,
        })
    }

    pub fn node(&self) -> NodeIndex {
        self.node
    }

    pub(crate) fn dump(&self) {
        log::info!(
            "link {} ({}): {} forward stages, {} reverse stages, {} bits/phit",
            self.name,
            self.node.index(),
            self.forward.stages(),
            self.reverse.first().map(Pipeline::stages).unwrap_or(0),
            self.phit_width
        );
    }
}

impl SimComponent for PipelinedLink {
    fn propagation(&mut self) -> &mut PropagationState {
        &mut self.prop
    }

    fn try_forward(&mut self, ctx: &mut SimContext) -> Result<bool, Error> {
        let from = ctx.connections[self.src_connection].forward;
        let to = &mut ctx.connections[self.sink_connection].forward;

        let done = self.forward.try_propagation(from, to, ctx.cycle);
        if done {
            trace!(
                "link {} forward propagated, connection {} to {}",
                self.name,
                self.src_connection,
                self.sink_connection
            );
        }
        Ok(done)
    }

    fn try_reverse(&mut self, ctx: &mut SimContext) -> Result<bool, Error> {
        let cycle = ctx.cycle;
        let mut propagated = 0;
        let vc_count = self.reverse.len();

        for (vc, pipe) in self.reverse.iter_mut().enumerate() {
            let from = ctx.connections[self.sink_connection].reverse[vc];
            let to = &mut ctx.connections[self.src_connection].reverse[vc];
            if pipe.try_propagation(from, to, cycle) {
                propagated += 1;
            }
        }

        if propagated == vc_count {
            trace!("link {} reverse propagated on {} vcs", self.name, vc_count);
        }
        Ok(propagated == vc_count)
    }
}
