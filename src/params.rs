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

//! Static per-component parameters: virtual-channel counts, buffer depths,
//! pipeline stage counts, and phit widths.
//!
//! Constructed programmatically or from a config file; the simulator only
//! reads these during construction.

use petgraph::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::Error;

#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct VirtualChannelParam {
    /// Buffer depth (in phits) at the receiving side of this channel.
    pub depth: usize,
}

/// Parameters for one port: one entry per virtual channel.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct PortParam {
    pub vcs: Vec<VirtualChannelParam>,
}

impl PortParam {
    /// A port with `count` channels of equal `depth`.
    pub fn uniform(count: usize, depth: usize) -> Self {
        Self {
            vcs: vec![VirtualChannelParam { depth }; count],
        }
    }

    pub fn vc_count(&self) -> usize {
        self.vcs.len()
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct LinkParam {
    /// Pipeline depth in the data direction.
    pub forward_stages: usize,
    /// Pipeline depth in the credit direction.
    pub reverse_stages: usize,
    pub phit_width: usize,
    /// Number of virtual channels multiplexed on the link.
    pub vcs: usize,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct RouterParam {
    /// One entry per input port, in dense port order.
    pub inputs: Vec<PortParam>,
    /// One entry per output port, in dense port order. Output-side depths
    /// are not used; space is accounted for by the downstream receiver's
    /// credit grants.
    pub outputs: Vec<PortParam>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentParam {
    Source(PortParam),
    Sink(PortParam),
    Link(LinkParam),
    Router(RouterParam),
}

/// Parameter store keyed by topology node.
///
/// A lookup map on the instance, never ambient state.
#[derive(Clone, Debug, Default)]
pub struct Parameters {
    entries: HashMap<NodeIndex, ComponentParam>,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, node: NodeIndex, param: ComponentParam) {
        self.entries.insert(node, param);
    }

    fn entry(&self, node: NodeIndex) -> Result<&ComponentParam, Error> {
        self.entries.get(&node).ok_or(Error::MissingParameter(node))
    }

    pub fn source(&self, node: NodeIndex) -> Result<&PortParam, Error> {
        match self.entry(node)? {
            ComponentParam::Source(p) => Ok(p),
            _ => Err(Error::ParameterMismatch(node)),
        }
    }

    pub fn sink(&self, node: NodeIndex) -> Result<&PortParam, Error> {
        match self.entry(node)? {
            ComponentParam::Sink(p) => Ok(p),
            _ => Err(Error::ParameterMismatch(node)),
        }
    }

    pub fn link(&self, node: NodeIndex) -> Result<&LinkParam, Error> {
        match self.entry(node)? {
            ComponentParam::Link(p) => Ok(p),
            _ => Err(Error::ParameterMismatch(node)),
        }
    }

    pub fn router(&self, node: NodeIndex) -> Result<&RouterParam, Error> {
        match self.entry(node)? {
            ComponentParam::Router(p) => Ok(p),
            _ => Err(Error::ParameterMismatch(node)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_lookup() {
        let mut params = Parameters::new();
        let node = NodeIndex::new(0);
        params.insert(node, ComponentParam::Sink(PortParam::uniform(2, 4)));

        let port = params.sink(node).unwrap();
        assert_eq!(port.vc_count(), 2);
        assert_eq!(port.vcs[1].depth, 4);

        assert_eq!(
            params.link(node).unwrap_err(),
            Error::ParameterMismatch(node)
        );
        assert_eq!(
            params.sink(NodeIndex::new(1)).unwrap_err(),
            Error::MissingParameter(NodeIndex::new(1))
        );
    }
}
