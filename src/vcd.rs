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

//! Waveform dumps of per-connection forward-channel activity.
//!
//! Tracing is an observation layer: the tracer reads simulation state after
//! each cycle and never feeds back into it.

use std::io;

use crate::sim::NocSimulation;

const VCD_HEADER: &str = "nocsim trace";
const TOP_MODULE: &str = "fabric";

struct ConnectionVars {
    valid: vcd::IdCode,
    data: vcd::IdCode,
    vc: vcd::IdCode,
}

/// Writes one VCD scope per connection with `forward_valid`,
/// `forward_data`, and `forward_vc` variables; one timestep per simulated
/// cycle.
pub struct VcdTracer<W: io::Write> {
    writer: vcd::Writer<W>,
    vars: Vec<ConnectionVars>,
    data_width: usize,
}

impl<W: io::Write> VcdTracer<W> {
    /// Declare the variable hierarchy for `sim`'s connections. Call once,
    /// before the first cycle.
    pub fn new(out: W, sim: &NocSimulation, data_width: usize) -> io::Result<Self> {
        let mut writer = vcd::Writer::new(out);
        writer.comment(VCD_HEADER)?;
        writer.date(chrono::Utc::now().to_string().as_str())?;
        writer.timescale(1, vcd::TimescaleUnit::NS)?;

        writer.add_module(TOP_MODULE)?;
        let mut vars = Vec::with_capacity(sim.connections().len());
        for (index, _) in sim.connections().iter().enumerate() {
            writer.add_module(&format!("connection_{}", index))?;
            vars.push(ConnectionVars {
                valid: writer.add_var(vcd::VarType::Wire, 1, "forward_valid", None)?,
                data: writer.add_var(vcd::VarType::Wire, data_width as u32, "forward_data", None)?,
                vc: writer.add_var(vcd::VarType::Wire, 8, "forward_vc", None)?,
            });
            writer.upscope()?;
        }
        writer.upscope()?;
        writer.enddefinitions()?;

        Ok(Self {
            writer,
            vars,
            data_width,
        })
    }

    /// Record the current forward-channel values as one timestep. Call after
    /// each `run_cycle`.
    pub fn sample(&mut self, sim: &NocSimulation) -> io::Result<()> {
        self.writer.timestamp(sim.current_cycle().max(0) as u64)?;
        for (vars, connection) in self.vars.iter().zip(sim.connections()) {
            let phit = connection.forward.phit;
            self.writer
                .change_vector(vars.valid, &to_bits(phit.valid as u64, 1))?;
            self.writer
                .change_vector(vars.data, &to_bits(phit.data, self.data_width))?;
            self.writer
                .change_vector(vars.vc, &to_bits(phit.vc as u64, 8))?;
        }
        Ok(())
    }
}

/// Most-significant bit first, as VCD vector values are written.
fn to_bits(value: u64, width: usize) -> Vec<vcd::Value> {
    (0..width)
        .rev()
        .map(|bit| (value >> bit & 1 == 1).into())
        .collect()
}
