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

//! Static description of a fabric: typed components joined by directed
//! connections, stored as a petgraph graph.
//!
//! A connection joins exactly one output port to one input port. Port
//! numbers are local to their component and direction; the dense input and
//! output port indices a router sees are defined by sorting its connections
//! by local port number.

use petgraph::prelude::*;
use serde::{Deserialize, Serialize};

/// A numbered port on a component, local to one direction.
#[derive(
    Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
pub struct Port(pub usize);

impl std::fmt::Display for Port {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        self.0.fmt(f)
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    Source,
    Sink,
    Link,
    Router,
}

#[derive(Clone, Debug)]
pub struct Component {
    pub name: String,
    pub kind: ComponentKind,
}

/// A directed wire from `src_port` on the source component to `dst_port` on
/// the target component.
#[derive(Clone, Copy, Debug)]
pub struct Connection {
    pub src_port: Port,
    pub dst_port: Port,
}

#[derive(Clone, Debug, Default)]
pub struct Topology {
    graph: Graph<Component, Connection>,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_component(&mut self, name: &str, kind: ComponentKind) -> NodeIndex {
        self.graph.add_node(Component {
            name: name.to_string(),
            kind,
        })
    }

    pub fn connect(
        &mut self,
        src: NodeIndex,
        src_port: Port,
        dst: NodeIndex,
        dst_port: Port,
    ) -> EdgeIndex {
        self.graph.add_edge(src, dst, Connection { src_port, dst_port })
    }

    pub fn component(&self, node: NodeIndex) -> &Component {
        &self.graph[node]
    }

    pub fn connection(&self, edge: EdgeIndex) -> &Connection {
        &self.graph[edge]
    }

    pub fn endpoints(&self, edge: EdgeIndex) -> (NodeIndex, NodeIndex) {
        self.graph
            .edge_endpoints(edge)
            .expect("connection is part of this topology")
    }

    pub fn node_by_name(&self, name: &str) -> Option<NodeIndex> {
        self.graph
            .node_indices()
            .find(|&n| self.graph[n].name == name)
    }

    pub fn nodes(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.node_indices()
    }

    pub fn connections(&self) -> impl Iterator<Item = EdgeIndex> + '_ {
        self.graph.edge_indices()
    }

    pub fn component_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn connection_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Connections arriving at `node`, sorted by local input port number.
    /// The position in the returned list is the node's dense input port
    /// index.
    pub fn input_connections(&self, node: NodeIndex) -> Vec<EdgeIndex> {
        let mut edges: Vec<(Port, EdgeIndex)> = self
            .graph
            .edges_directed(node, Direction::Incoming)
            .map(|e| (e.weight().dst_port, e.id()))
            .collect();
        edges.sort_by_key(|(port, _)| *port);
        edges.into_iter().map(|(_, id)| id).collect()
    }

    /// Connections leaving `node`, sorted by local output port number.
    pub fn output_connections(&self, node: NodeIndex) -> Vec<EdgeIndex> {
        let mut edges: Vec<(Port, EdgeIndex)> = self
            .graph
            .edges_directed(node, Direction::Outgoing)
            .map(|e| (e.weight().src_port, e.id()))
            .collect();
        edges.sort_by_key(|(port, _)| *port);
        edges.into_iter().map(|(_, id)| id).collect()
    }
}
