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

//! Whole-fabric descriptions, constructed programmatically or read from a
//! YAML config file, and lowered into the topology/parameter/routing inputs
//! the simulator consumes.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use petgraph::prelude::*;

use crate::error::Error;
use crate::params::{ComponentParam, LinkParam, Parameters, PortParam, VirtualChannelParam};
use crate::routing::{PortVc, RoutingTable};
use crate::topology::{ComponentKind, Port, Topology};

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ComponentConfig {
    Source {
        name: String,
        vcs: usize,
    },
    Sink {
        name: String,
        /// Buffer depth per vc; the length is the vc count.
        vc_depths: Vec<usize>,
    },
    Link {
        name: String,
        forward_stages: usize,
        reverse_stages: usize,
        phit_width: usize,
        vcs: usize,
    },
    Router {
        name: String,
        /// Buffer depths per input port, per vc.
        input_vc_depths: Vec<Vec<usize>>,
        /// Number of vcs per output port.
        output_vcs: Vec<usize>,
    },
}

impl ComponentConfig {
    fn name(&self) -> &str {
        match self {
            Self::Source { name, .. }
            | Self::Sink { name, .. }
            | Self::Link { name, .. }
            | Self::Router { name, .. } => name,
        }
    }

    fn kind(&self) -> ComponentKind {
        match self {
            Self::Source { .. } => ComponentKind::Source,
            Self::Sink { .. } => ComponentKind::Sink,
            Self::Link { .. } => ComponentKind::Link,
            Self::Router { .. } => ComponentKind::Router,
        }
    }

    fn param(&self) -> ComponentParam {
        match self {
            Self::Source { vcs, .. } => ComponentParam::Source(PortParam::uniform(*vcs, 0)),
            Self::Sink { vc_depths, .. } => ComponentParam::Sink(PortParam {
                vcs: vc_depths
                    .iter()
                    .map(|&depth| VirtualChannelParam { depth })
                    .collect(),
            }),
            Self::Link {
                forward_stages,
                reverse_stages,
                phit_width,
                vcs,
                ..
            } => ComponentParam::Link(LinkParam {
                forward_stages: *forward_stages,
                reverse_stages: *reverse_stages,
                phit_width: *phit_width,
                vcs: *vcs,
            }),
            Self::Router {
                input_vc_depths,
                output_vcs,
                ..
            } => ComponentParam::Router(crate::params::RouterParam {
                inputs: input_vc_depths
                    .iter()
                    .map(|depths| PortParam {
                        vcs: depths
                            .iter()
                            .map(|&depth| VirtualChannelParam { depth })
                            .collect(),
                    })
                    .collect(),
                outputs: output_vcs
                    .iter()
                    .map(|&vcs| PortParam::uniform(vcs, 0))
                    .collect(),
            }),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ConnectionConfig {
    pub src: String,
    pub src_port: usize,
    pub dst: String,
    pub dst_port: usize,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct RouteConfig {
    pub router: String,
    pub input_port: usize,
    pub vc: usize,
    pub destination: usize,
    pub output_port: usize,
    pub output_vc: usize,
}

/// A lowered fabric, ready to simulate.
#[derive(Clone, Debug)]
pub struct Fabric {
    pub topology: Topology,
    pub params: Parameters,
    pub routing: RoutingTable,
    /// Component name to topology node, for driving and inspection.
    pub nodes: HashMap<String, NodeIndex>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct FabricConfig {
    pub components: Vec<ComponentConfig>,
    pub connections: Vec<ConnectionConfig>,
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
}

impl FabricConfig {
    pub fn from_str(config: &str) -> anyhow::Result<Self> {
        serde_yaml::from_str(config).context("failed to parse fabric config")
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("failed to open fabric config {}", path.display()))?;
        serde_yaml::from_reader(BufReader::new(file))
            .with_context(|| format!("failed to parse fabric config {}", path.display()))
    }

    /// Lower the description into simulator inputs. Name collisions, dangling
    /// references, and duplicate routes are structural errors.
    pub fn build(&self) -> Result<Fabric, Error> {
        let mut topology = Topology::new();
        let mut params = Parameters::new();
        let mut nodes: HashMap<String, NodeIndex> = HashMap::new();

        for component in &self.components {
            if nodes.contains_key(component.name()) {
                return Err(Error::DuplicateName(component.name().to_string()));
            }
            let node = topology.add_component(component.name(), component.kind());
            params.insert(node, component.param());
            nodes.insert(component.name().to_string(), node);
        }

        let lookup = |name: &str| -> Result<NodeIndex, Error> {
            nodes
                .get(name)
                .copied()
                .ok_or_else(|| Error::UnknownName(name.to_string()))
        };

        for connection in &self.connections {
            let src = lookup(&connection.src)?;
            let dst = lookup(&connection.dst)?;
            topology.connect(
                src,
                Port(connection.src_port),
                dst,
                Port(connection.dst_port),
            );
        }

        let mut routing = RoutingTable::new();
        for route in &self.routes {
            let router = lookup(&route.router)?;
            routing.add_route(
                router,
                route.input_port,
                route.vc,
                route.destination,
                PortVc {
                    port: route.output_port,
                    vc: route.output_vc,
                },
            )?;
        }

        Ok(Fabric {
            topology,
            params,
            routing,
            nodes,
        })
    }
}
