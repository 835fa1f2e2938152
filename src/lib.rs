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

mod config;
mod error;
mod params;
mod phit;
mod routing;
mod sim;
mod topology;
mod vcd;

// Public types
// type to use for cycles; the simulator is built at cycle -1 and the first
// run_cycle advances to cycle 0.
pub type Cycle = i64;

pub use crate::config::{
    ComponentConfig, ConnectionConfig, Fabric, FabricConfig, RouteConfig,
};
pub use crate::error::Error;
pub use crate::params::{
    ComponentParam, LinkParam, Parameters, PortParam, RouterParam, VirtualChannelParam,
};
pub use crate::phit::{ConnectionState, CreditState, Phit, TimedPhit, VcBuffer};
pub use crate::routing::{PortVc, RoutingTable};
pub use crate::sim::{
    InputQueuedRouter, NocSimulation, PipelinedLink, PropagationState, SimComponent, SimContext,
    SinkInterface, SourceInterface,
};
pub use crate::topology::{Component, ComponentKind, Connection, Port, Topology};
pub use crate::vcd::VcdTracer;
pub use petgraph::graph::{EdgeIndex, NodeIndex};
pub use petgraph::Direction;
