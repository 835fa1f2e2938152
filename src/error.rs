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

use petgraph::prelude::*;
use std::fmt;

use crate::Cycle;

#[derive(Debug, Eq, PartialEq)]
pub enum Error {
    /// A link component without exactly one incoming and one outgoing
    /// connection.
    InvalidLink(NodeIndex),
    /// A source without exactly one outgoing connection, or a sink without
    /// exactly one incoming connection.
    InvalidInterface(NodeIndex),
    /// Router connections must use dense port numbering starting at 0.
    InvalidPort { node: NodeIndex, port: usize },
    MissingParameter(NodeIndex),
    /// A parameter entry exists but is of the wrong kind for the component.
    ParameterMismatch(NodeIndex),
    /// Lookup of a simulation object that does not exist (or is of another
    /// component kind).
    UnknownComponent(NodeIndex),
    UnknownName(String),
    DuplicateName(String),
    VcOutOfRange { vc: usize, max: usize },
    MissingRoute {
        node: NodeIndex,
        port: usize,
        vc: usize,
        destination: usize,
    },
    DuplicateRoute {
        node: NodeIndex,
        port: usize,
        vc: usize,
        destination: usize,
    },
    /// The simulator failed to reach a fixed point within the tick budget.
    NotConverged { cycle: Cycle, ticks: u64 },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::InvalidLink(n) => {
                write!(f, "ERROR: Invalid connection count for link {}", n.index())
            }
            Self::InvalidInterface(n) => {
                write!(
                    f,
                    "ERROR: Invalid connection count for interface {}",
                    n.index()
                )
            }
            Self::InvalidPort { node, port } => {
                write!(f, "ERROR: Invalid port {} for node {}", port, node.index())
            }
            Self::MissingParameter(n) => {
                write!(f, "ERROR: No parameters for node {}", n.index())
            }
            Self::ParameterMismatch(n) => {
                write!(f, "ERROR: Wrong parameter kind for node {}", n.index())
            }
            Self::UnknownComponent(n) => {
                write!(f, "ERROR: No simulation object for node {}", n.index())
            }
            Self::UnknownName(name) => write!(f, "ERROR: Unknown component name {:?}", name),
            Self::DuplicateName(name) => write!(f, "ERROR: Duplicate component name {:?}", name),
            Self::VcOutOfRange { vc, max } => {
                write!(f, "ERROR: Unable to use vc index {}, max {}", vc, max)
            }
            Self::MissingRoute {
                node,
                port,
                vc,
                destination,
            } => {
                write!(
                    f,
                    "ERROR: No route at router {} input port {} vc {} for destination {}",
                    node.index(),
                    port,
                    vc,
                    destination
                )
            }
            Self::DuplicateRoute {
                node,
                port,
                vc,
                destination,
            } => {
                write!(
                    f,
                    "ERROR: Duplicate route at router {} input port {} vc {} for destination {}",
                    node.index(),
                    port,
                    vc,
                    destination
                )
            }
            Self::NotConverged { cycle, ticks } => {
                write!(
                    f,
                    "ERROR: Simulator unable to converge after {} ticks for cycle {}",
                    ticks, cycle
                )
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}
