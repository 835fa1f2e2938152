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

//! Arbitration, credit accounting, and conservation at a 2x2 router.

use rand::Rng;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256StarStar;

use nocsim::{
    ComponentKind, ComponentParam, Error, NocSimulation, NodeIndex, Parameters, Phit, Port,
    PortParam, PortVc, RouterParam, RoutingTable, TimedPhit, Topology,
};

const MAX_TICKS: u64 = 16;
const BUFFER_DEPTH: usize = 4;

struct Crossing {
    sim: NocSimulation,
    sources: [NodeIndex; 2],
    router: NodeIndex,
    sinks: [NodeIndex; 2],
}

/// Two sources feeding a 2-input/2-output router; destination d exits on
/// output port d. Single vc everywhere, connections are direct (no links).
fn build_crossing() -> Crossing {
    let mut topo = Topology::new();
    let src0 = topo.add_component("src0", ComponentKind::Source);
    let src1 = topo.add_component("src1", ComponentKind::Source);
    let router = topo.add_component("router0", ComponentKind::Router);
    let sink0 = topo.add_component("sink0", ComponentKind::Sink);
    let sink1 = topo.add_component("sink1", ComponentKind::Sink);

    topo.connect(src0, Port(0), router, Port(0));
    topo.connect(src1, Port(0), router, Port(1));
    topo.connect(router, Port(0), sink0, Port(0));
    topo.connect(router, Port(1), sink1, Port(0));

    let mut params = Parameters::new();
    for src in [src0, src1] {
        params.insert(src, ComponentParam::Source(PortParam::uniform(1, 0)));
    }
    params.insert(
        router,
        ComponentParam::Router(RouterParam {
            inputs: vec![
                PortParam::uniform(1, BUFFER_DEPTH),
                PortParam::uniform(1, BUFFER_DEPTH),
            ],
            outputs: vec![PortParam::uniform(1, 0), PortParam::uniform(1, 0)],
        }),
    );
    for sink in [sink0, sink1] {
        params.insert(sink, ComponentParam::Sink(PortParam::uniform(1, BUFFER_DEPTH)));
    }

    let mut routing = RoutingTable::new();
    for input_port in 0..2 {
        for destination in 0..2 {
            routing
                .add_route(
                    router,
                    input_port,
                    0,
                    destination,
                    PortVc {
                        port: destination,
                        vc: 0,
                    },
                )
                .unwrap();
        }
    }

    let sim = NocSimulation::new(&topo, &params, routing).unwrap();
    Crossing {
        sim,
        sources: [src0, src1],
        router,
        sinks: [sink0, sink1],
    }
}

fn tagged_phit(source: usize, seq: u64, destination: usize, cycle: i64) -> TimedPhit {
    TimedPhit::new(
        cycle,
        Phit {
            data: ((source as u64) << 16) | seq,
            valid: true,
            destination,
            vc: 0,
        },
    )
}

#[test]
fn lower_input_port_wins_under_contention() {
    let _logger = env_logger::builder().is_test(true).try_init();
    let mut crossing = build_crossing();

    // Both sources demand output 0 for every cycle.
    for seq in 0..6 {
        for source in 0..2 {
            let node = crossing.sources[source];
            crossing
                .sim
                .source_mut(node)
                .unwrap()
                .inject(tagged_phit(source, seq, 0, 0))
                .unwrap();
        }
    }

    for _ in 0..13 {
        crossing.sim.run_cycle(MAX_TICKS).unwrap();
    }

    let received = crossing.sim.sink(crossing.sinks[0]).unwrap().received();
    assert_eq!(received.len(), 12);
    let data: Vec<u64> = received.iter().map(|p| p.phit.data).collect();

    // Port 0 is drained completely before port 1 forwards anything: the
    // fixed-priority arbiter starves the higher port for as long as the
    // lower one has traffic.
    let expected: Vec<u64> = (0..6).chain((0..6).map(|seq| (1 << 16) | seq)).collect();
    assert_eq!(data, expected);

    // Port 0 delivered one per cycle from cycle 1; port 1 only afterwards.
    assert_eq!(
        received.iter().map(|p| p.cycle).collect::<Vec<_>>(),
        (1..=12).collect::<Vec<_>>()
    );

    // Nothing leaked to the other sink.
    assert!(crossing.sim.sink(crossing.sinks[1]).unwrap().received().is_empty());
}

#[test]
fn lower_vc_beats_lower_port() {
    let _logger = env_logger::builder().is_test(true).try_init();

    // Two sources share one output; port 0 offers a vc-1 phit while port 1
    // offers a vc-0 phit in the same cycle. The arbiter walks vcs before
    // ports, so the higher-numbered port wins.
    let mut topo = Topology::new();
    let src0 = topo.add_component("src0", ComponentKind::Source);
    let src1 = topo.add_component("src1", ComponentKind::Source);
    let router = topo.add_component("router0", ComponentKind::Router);
    let sink = topo.add_component("sink0", ComponentKind::Sink);
    topo.connect(src0, Port(0), router, Port(0));
    topo.connect(src1, Port(0), router, Port(1));
    topo.connect(router, Port(0), sink, Port(0));

    let mut params = Parameters::new();
    for src in [src0, src1] {
        params.insert(src, ComponentParam::Source(PortParam::uniform(2, 0)));
    }
    params.insert(
        router,
        ComponentParam::Router(RouterParam {
            inputs: vec![PortParam::uniform(2, 2), PortParam::uniform(2, 2)],
            outputs: vec![PortParam::uniform(2, 0)],
        }),
    );
    params.insert(sink, ComponentParam::Sink(PortParam::uniform(2, 2)));

    let mut routing = RoutingTable::new();
    for input_port in 0..2 {
        for vc in 0..2 {
            routing
                .add_route(router, input_port, vc, 0, PortVc { port: 0, vc })
                .unwrap();
        }
    }

    let mut sim = NocSimulation::new(&topo, &params, routing).unwrap();
    sim.source_mut(src0)
        .unwrap()
        .inject(TimedPhit::new(
            0,
            Phit {
                data: 0xa0,
                valid: true,
                destination: 0,
                vc: 1,
            },
        ))
        .unwrap();
    sim.source_mut(src1)
        .unwrap()
        .inject(TimedPhit::new(
            0,
            Phit {
                data: 0xb1,
                valid: true,
                destination: 0,
                vc: 0,
            },
        ))
        .unwrap();

    for _ in 0..4 {
        sim.run_cycle(MAX_TICKS).unwrap();
    }

    let received = sim.sink(sink).unwrap().received();
    assert_eq!(received.len(), 2);
    assert_eq!(received[0].phit.data, 0xb1);
    assert_eq!(received[0].phit.vc, 0);
    assert_eq!(received[0].cycle, 1);
    assert_eq!(received[1].phit.data, 0xa0);
    assert_eq!(received[1].phit.vc, 1);
    assert_eq!(received[1].cycle, 2);
}

#[test]
fn disjoint_destinations_do_not_interfere() {
    let _logger = env_logger::builder().is_test(true).try_init();
    let mut crossing = build_crossing();

    for seq in 0..5 {
        for source in 0..2 {
            let node = crossing.sources[source];
            // Source i sends only to sink i.
            crossing
                .sim
                .source_mut(node)
                .unwrap()
                .inject(tagged_phit(source, seq, source, 0))
                .unwrap();
        }
    }

    for _ in 0..6 {
        crossing.sim.run_cycle(MAX_TICKS).unwrap();
    }

    for (index, sink) in crossing.sinks.iter().enumerate() {
        let received = crossing.sim.sink(*sink).unwrap().received();
        assert_eq!(received.len(), 5, "sink {} starved", index);
        // Full rate: one delivery per cycle starting at cycle 1.
        assert_eq!(
            received.iter().map(|p| p.cycle).collect::<Vec<_>>(),
            (1..=5).collect::<Vec<_>>()
        );
    }
}

#[test]
fn random_traffic_is_conserved() {
    let _logger = env_logger::builder().is_test(true).try_init();
    let mut crossing = build_crossing();
    let mut rng = Xoshiro256StarStar::seed_from_u64(0x5eed);

    const PER_SOURCE: u64 = 25;
    for source in 0..2 {
        for seq in 0..PER_SOURCE {
            let destination = rng.gen_range(0..2);
            let cycle = rng.gen_range(0..30);
            let node = crossing.sources[source];
            crossing
                .sim
                .source_mut(node)
                .unwrap()
                .inject(tagged_phit(source, seq, destination, cycle))
                .unwrap();
        }
    }

    for _ in 0..120 {
        crossing.sim.run_cycle(MAX_TICKS).unwrap();

        // Credit/space bound: the upstream credit balance never promises
        // more than the free space left in the router's input buffer.
        for (port, source) in crossing.sources.into_iter().enumerate() {
            let occupancy = crossing.sim.router(crossing.router).unwrap().occupancy(port, 0);
            assert!(occupancy <= BUFFER_DEPTH);
            let credit = crossing.sim.source_mut(source).unwrap().credit(0);
            assert!(credit >= 0);
            assert!(
                credit as usize + occupancy <= BUFFER_DEPTH,
                "credit {} + occupancy {} exceeds depth",
                credit,
                occupancy
            );
        }
    }

    let mut total = 0;
    for sink in crossing.sinks {
        let received = crossing.sim.sink(sink).unwrap().received().to_vec();
        total += received.len();

        // Each source's stream stays in injection order wherever it lands.
        for source in 0..2u64 {
            let seqs: Vec<u64> = received
                .iter()
                .map(|p| p.phit.data)
                .filter(|data| data >> 16 == source)
                .map(|data| data & 0xffff)
                .collect();
            assert!(seqs.windows(2).all(|w| w[0] < w[1]));
        }
    }
    // Nothing dropped, nothing duplicated.
    assert_eq!(total as u64, 2 * PER_SOURCE);
}

#[test]
fn unrouted_destination_fails_the_cycle() {
    let _logger = env_logger::builder().is_test(true).try_init();
    let mut crossing = build_crossing();

    let node = crossing.sources[0];
    crossing
        .sim
        .source_mut(node)
        .unwrap()
        .inject(tagged_phit(0, 0, 9, 0))
        .unwrap();

    // Cycle 0 only moves the bootstrap credits.
    crossing.sim.run_cycle(MAX_TICKS).unwrap();
    // Cycle 1 delivers the phit to the router, which cannot route it.
    let err = crossing.sim.run_cycle(MAX_TICKS).unwrap_err();
    assert_eq!(
        err,
        Error::MissingRoute {
            node: crossing.router,
            port: 0,
            vc: 0,
            destination: 9
        }
    );
}
