//! # Navigation Control Benchmark

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use nalgebra::{UnitQuaternion, Vector3};
use rov_lib::{
    nav_ctrl::{NavCtrl, Params},
    waypoint::{CycleMode, Waypoint, WaypointSequence, WaypointStatus},
};

fn nav_ctrl_benchmark(c: &mut Criterion) {
    // ---- Build a looping square of waypoints ----

    let t = util::time::local_now_s();
    let sequence: WaypointSequence = [
        [0.0, 0.0, 0.0],
        [10.0, 0.0, 0.0],
        [10.0, 0.0, 10.0],
        [0.0, 0.0, 10.0],
    ]
    .iter()
    .map(|p| Waypoint::record(Vector3::new(p[0], p[1], p[2]), WaypointStatus::Success, t))
    .collect();

    let mut nav_ctrl = NavCtrl::new(Params {
        arrival_pause_s: 0.0,
        ..Default::default()
    });
    nav_ctrl.start(sequence, CycleMode::Loop).unwrap();

    let mut position_m = Vector3::zeros();
    let mut attitude_q = UnitQuaternion::identity();

    // Bench a single tick, feeding the output back in
    c.bench_function("NavCtrl::tick", |b| {
        b.iter(|| {
            let (p, q, _) = nav_ctrl
                .tick(black_box(0.01), position_m, attitude_q)
                .unwrap();
            position_m = p;
            attitude_q = q;
        })
    });
}

criterion_group!(benches, nav_ctrl_benchmark);
criterion_main!(benches);
