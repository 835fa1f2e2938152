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

//! Precomputed routing: (router, input port, vc, destination) to an output
//! port and vc on that router.

use petgraph::prelude::*;
use std::collections::HashMap;

use crate::error::Error;

/// A dense (port index, vc index) pair local to one router.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PortVc {
    pub port: usize,
    pub vc: usize,
}

#[derive(Clone, Debug, Default)]
pub struct RoutingTable {
    routes: HashMap<(NodeIndex, usize, usize, usize), PortVc>,
}

impl RoutingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_route(
        &mut self,
        node: NodeIndex,
        port: usize,
        vc: usize,
        destination: usize,
        out: PortVc,
    ) -> Result<(), Error> {
        match self.routes.insert((node, port, vc, destination), out) {
            None => Ok(()),
            Some(_) => Err(Error::DuplicateRoute {
                node,
                port,
                vc,
                destination,
            }),
        }
    }

    pub fn route(
        &self,
        node: NodeIndex,
        port: usize,
        vc: usize,
        destination: usize,
    ) -> Result<PortVc, Error> {
        self.routes
            .get(&(node, port, vc, destination))
            .copied()
            .ok_or(Error::MissingRoute {
                node,
                port,
                vc,
                destination,
            })
    }
}
