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

//! Per-cycle wire values and the receiving-side buffer/ledger records.

use petgraph::prelude::*;
use std::collections::VecDeque;

use crate::Cycle;

/// The smallest unit transferred over a connection in one cycle.
///
/// A data phit carries message payload in `data`; a credit phit reuses the
/// same shape with `data` holding a credit count (and `destination` unused).
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Phit {
    pub data: u64,
    pub valid: bool,
    pub destination: usize,
    pub vc: usize,
}

impl Phit {
    /// An explicit "no data this cycle" value.
    pub fn bubble() -> Self {
        Self::default()
    }
}

/// A phit stamped with the cycle at which it was last written.
///
/// The value is present only while the stamp equals the simulator's current
/// cycle; a stale stamp reads as absent.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct TimedPhit {
    pub cycle: Cycle,
    pub phit: Phit,
}

impl TimedPhit {
    pub fn new(cycle: Cycle, phit: Phit) -> Self {
        Self { cycle, phit }
    }
}

/// Wire state for one directed connection: a single forward (data) slot and
/// one reverse (credit) slot per virtual channel.
#[derive(Clone, Debug)]
pub struct ConnectionState {
    pub id: EdgeIndex,
    pub forward: TimedPhit,
    pub reverse: Vec<TimedPhit>,
}

impl ConnectionState {
    pub fn new(id: EdgeIndex, vc_count: usize, cycle: Cycle) -> Self {
        let stale = TimedPhit::new(cycle, Phit::bubble());
        Self {
            id,
            forward: stale,
            reverse: vec![stale; vc_count.max(1)],
        }
    }

    pub fn vc_count(&self) -> usize {
        self.reverse.len()
    }
}

/// A cycle-stamped pending credit update, latched during reverse propagation
/// and folded into the balance exactly once on the following cycle.
#[derive(Clone, Copy, Debug, Default)]
pub struct CreditState {
    pub cycle: Cycle,
    pub credit: u64,
}

impl CreditState {
    pub fn new(cycle: Cycle) -> Self {
        Self { cycle, credit: 0 }
    }
}

/// Bounded FIFO holding buffered phits for one (port, vc).
///
/// Occupancy is bounded by the credit protocol rather than by this type; the
/// debug assertion catches configurations that grant more credit than space.
#[derive(Clone, Debug, Default)]
pub struct VcBuffer {
    depth: usize,
    queue: VecDeque<Phit>,
}

impl VcBuffer {
    pub fn new(depth: usize) -> Self {
        Self {
            depth,
            queue: VecDeque::new(),
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn occupancy(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn push(&mut self, phit: Phit) {
        self.queue.push_back(phit);
        debug_assert!(
            self.queue.len() <= self.depth,
            "vc buffer overflow: {} phits in a buffer of depth {}",
            self.queue.len(),
            self.depth
        );
    }

    pub fn front(&self) -> Option<&Phit> {
        self.queue.front()
    }

    pub fn pop(&mut self) -> Option<Phit> {
        self.queue.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_slot_reads_as_absent() {
        let state = ConnectionState::new(EdgeIndex::new(0), 2, -1);
        assert_eq!(state.forward.cycle, -1);
        assert!(!state.forward.phit.valid);
        assert_eq!(state.vc_count(), 2);
    }

    #[test]
    fn zero_vcs_normalized_to_one() {
        let state = ConnectionState::new(EdgeIndex::new(0), 0, -1);
        assert_eq!(state.vc_count(), 1);
    }

    #[test]
    fn vc_buffer_is_fifo() {
        let mut buffer = VcBuffer::new(2);
        buffer.push(Phit {
            data: 1,
            valid: true,
            ..Default::default()
        });
        buffer.push(Phit {
            data: 2,
            valid: true,
            ..Default::default()
        });
        assert_eq!(buffer.occupancy(), 2);
        assert_eq!(buffer.pop().unwrap().data, 1);
        assert_eq!(buffer.pop().unwrap().data, 2);
        assert!(buffer.is_empty());
    }
}
