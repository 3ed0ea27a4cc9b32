// ─────────────────────────────────────────────────────────────────────
// SCPN Accel Core — Tracking Benchmarks
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────

use accel_core::orbit::{find_orbit4, OrbitConfig};
use accel_core::tracking::ring_pass;
use accel_types::accelerator::Accelerator;
use accel_types::element::Element;
use accel_types::pos::Pos;
use criterion::{criterion_group, criterion_main, Criterion};
use std::f64::consts::PI;
use std::hint::black_box;

/// FODO ring with sector bends; `nr_steps` is kept at the production
/// value so the benchmark measures the real per-element cost.
fn bench_ring() -> Accelerator {
    let mut acc = Accelerator::new(3e9, 2);
    acc.lattice.push(Element::corrector("ch", 0.0, 1e-6, 0.0));
    for cell in 0..4 {
        acc.lattice
            .push(Element::thin_quadrupole(&format!("qf{cell}"), 0.8));
        acc.lattice.push(Element::drift("d1", 0.5));
        acc.lattice.push(Element::rbend(
            &format!("b{cell}a"),
            1.0,
            PI / 4.0,
            0.0,
            0.0,
            0.0,
            0.0,
            0.0,
            &[],
            &[],
            0.0,
            0.0,
            20,
        ));
        acc.lattice.push(Element::drift("d2", 0.5));
        acc.lattice
            .push(Element::thin_quadrupole(&format!("qd{cell}"), -0.8));
        acc.lattice.push(Element::drift("d3", 0.5));
        acc.lattice.push(Element::rbend(
            &format!("b{cell}b"),
            1.0,
            PI / 4.0,
            0.0,
            0.0,
            0.0,
            0.0,
            0.0,
            &[],
            &[],
            0.0,
            0.0,
            20,
        ));
        acc.lattice.push(Element::drift("d4", 0.5));
    }
    acc
}

fn bench_ring_pass(c: &mut Criterion) {
    let acc = bench_ring();
    c.bench_function("ring_pass_100_turns", |b| {
        b.iter(|| {
            let mut pos = black_box(Pos::new(1e-4, 0.0, 1e-4, 0.0, 1e-4, 0.0));
            let mut out = Vec::with_capacity(1);
            let (mut lost_turn, mut offset) = (0, 0);
            ring_pass(
                &acc,
                &mut pos,
                &mut out,
                100,
                &mut lost_turn,
                &mut offset,
                false,
            )
            .expect("benchmark particle must survive");
            black_box(pos)
        })
    });
}

fn bench_find_orbit4(c: &mut Criterion) {
    let acc = bench_ring();
    let config = OrbitConfig::default();
    c.bench_function("find_orbit4_fodo", |b| {
        b.iter(|| {
            let orbit = find_orbit4(&acc, &black_box(Pos::zero()), &config)
                .expect("closed orbit must exist for the benchmark ring");
            black_box(orbit)
        })
    });
}

criterion_group!(benches, bench_ring_pass, bench_find_orbit4);
criterion_main!(benches);
