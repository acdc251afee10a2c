// crates/dt_drainage/tests/scenarios.rs

//! 端到端场景：单三角形注水、共享溢出口的双盆地、凸包溢出、零坡度策略、上溯追踪

use dt_drainage::prelude::*;
use dt_drainage::{FeatureKind, PointKind, PondKind};
use dt_tin::{Inverted, TinAccess, TinSurface};
use glam::DVec3;

const EPS: f64 = 1e-6;

fn single_triangle() -> TinSurface {
    TinSurface::new(
        vec![
            DVec3::new(0.0, 0.0, 10.0),
            DVec3::new(1.0, 0.0, 10.0),
            DVec3::new(0.5, 1.0, 0.0),
        ],
        vec![[0, 1, 2]],
    )
    .unwrap()
}

/// 7x3 网格：中间一行 [10, 3, 1, 5, 2, 3, 10]，其余 10
///
/// 点 9 (z=1) 与点 11 (z=2) 为两个低点，点 10 (z=5) 是两者之间的鞍点。
fn twin_basins() -> TinSurface {
    const MID: [f64; 7] = [10.0, 3.0, 1.0, 5.0, 2.0, 3.0, 10.0];
    TinSurface::from_grid(7, 3, 1.0, 1.0, |i, j| if j == 1 { MID[i] } else { 10.0 }).unwrap()
}

const LOW_P: u32 = 9;
const SADDLE: u32 = 10;
const LOW_Q: u32 = 11;

fn pond_capacity(wa: &WaterAnalysis<'_, TinSurface>, low: u32) -> f64 {
    let id = wa.find_pond_low_point(low).unwrap();
    wa.feature(id).unwrap().as_pond().unwrap().capacity().unwrap()
}

fn retained(wa: &WaterAnalysis<'_, TinSurface>, low: u32) -> f64 {
    let id = wa.find_pond_low_point(low).unwrap();
    wa.feature(id).unwrap().retained_volume()
}

#[test]
fn test_single_triangle_fills_unbounded_pond() {
    let tin = single_triangle();
    let mut wa = WaterAnalysis::new(&tin);
    wa.add_water_volume(0.5, 0.0, 5.0).unwrap();

    let result = wa.get_result();
    let kinds: Vec<&str> = result
        .items()
        .iter()
        .filter_map(|item| match item {
            ResultItem::Stream { .. } => Some("stream"),
            ResultItem::Pond { .. } => Some("pond"),
            ResultItem::Point { .. } => None,
        })
        .collect();
    assert_eq!(kinds, vec!["stream", "pond"]);

    let Some(ResultItem::Pond {
        boundaries,
        is_full,
        volume,
        depth,
        ..
    }) = result.ponds().next()
    else {
        panic!("no pond reported");
    };
    assert!((volume - 5.0).abs() < EPS);
    assert!(!is_full);
    // 整个三角形被淹没：V = A * (h - 平均高程)，A = 0.5
    let expected_level = 10.0 + 20.0 / 3.0;
    assert!((depth - expected_level).abs() < 0.05, "depth {depth}");
    assert_eq!(boundaries.len(), 1);
    assert_eq!(boundaries[0].len(), 4);

    let pond_id = wa.find_pond_low_point(2).unwrap();
    let pond = wa.feature(pond_id).unwrap();
    assert_eq!(pond.termination(), Some(Termination::DeadPond));
    assert!(pond.as_pond().unwrap().is_enclosed());
    assert_eq!(result.points(PointKind::Low).count(), 1);
}

#[test]
fn test_single_triangle_trace_reaches_pit() {
    let tin = single_triangle();
    let mut wa = WaterAnalysis::new(&tin);
    wa.do_trace(0.5, 0.0).unwrap();
    assert!(wa.find_existing_on_point(2).is_some());
    assert!(wa.find_pond_low_point(2).is_some());
    assert!(wa.features().all(|(_, f)| f.is_finished()));
}

#[test]
fn test_overflow_fills_neighbour_through_shared_exit() {
    let tin = twin_basins();
    let mut wa = WaterAnalysis::new(&tin);
    let (x, y) = (2.0, 1.0);

    wa.add_water_volume(x, y, 0.1).unwrap();
    let cap_p = pond_capacity(&wa, LOW_P);
    assert!(cap_p > 0.1);
    assert!((retained(&wa, LOW_P) - 0.1).abs() < EPS);
    assert!(wa.find_pond_low_point(LOW_Q).is_none());

    // 溢出鞍点后流入第二个水塘
    let extra = cap_p;
    wa.add_water_volume(x, y, extra).unwrap();
    let exit_id = wa.find_pond_exit(SADDLE).unwrap();
    let exit = wa.feature(exit_id).unwrap().as_pond_exit().unwrap();
    assert_eq!(exit.ponds().len(), 2);
    assert!((retained(&wa, LOW_P) - cap_p).abs() < EPS);
    let q_before = retained(&wa, LOW_Q);
    assert!((q_before - 0.1).abs() < 1e-3, "q {q_before}");

    wa.add_water_volume(x, y, 0.5).unwrap();
    let q_after = retained(&wa, LOW_Q);
    assert!(q_after > q_before);

    let balance = wa.water_balance();
    assert!(balance.residual().abs() < EPS);
    assert!(balance.exited.abs() < EPS);
    assert!(balance.unrouted.abs() < EPS);
}

#[test]
fn test_full_complex_spills_into_merged_pond() {
    let tin = twin_basins();
    let mut wa = WaterAnalysis::new(&tin);
    wa.add_water_volume(2.0, 1.0, 1.0).unwrap();
    let cap_p = pond_capacity(&wa, LOW_P);
    wa.add_water_volume(2.0, 1.0, cap_p).unwrap();
    let cap_q = pond_capacity(&wa, LOW_Q);
    assert!((retained(&wa, LOW_Q) - 1.0).abs() < 1e-3);

    // 补满第二个水塘后多出 2.0，进入合并水塘
    wa.add_water_volume(2.0, 1.0, cap_q + 1.0).unwrap();

    let exit_id = wa.find_pond_exit(SADDLE).unwrap();
    let exit = wa.feature(exit_id).unwrap().as_pond_exit().unwrap();
    let merged = exit.merged().expect("complex should be merged");
    assert!(exit.is_dead());

    let merged_feature = wa.feature(merged).unwrap();
    let merged_pond = merged_feature.as_pond().unwrap();
    assert_eq!(merged_pond.kind(), PondKind::FromPondExit);
    assert!(merged_pond.capacity().unwrap() > 2.0);
    assert!((merged_feature.retained_volume() - 2.0).abs() < 1e-3);

    for low in [LOW_P, LOW_Q] {
        let id = wa.find_pond_low_point(low).unwrap();
        let pond = wa.feature(id).unwrap();
        assert!(pond.as_pond().unwrap().is_full());
        assert!(pond.is_hidden());
        assert_eq!(pond.as_pond().unwrap().top_level(), Some(merged));
    }

    let balance = wa.water_balance();
    assert!((balance.injected - (2.0 + cap_p + cap_q)).abs() < EPS);
    assert!(balance.residual().abs() < EPS);
    assert!(balance.exited.abs() < EPS);
}

#[test]
fn test_full_complex_spills_off_mesh_edge() {
    let tin = twin_basins();
    let mut wa = WaterAnalysis::new(&tin);
    wa.add_water_volume(2.0, 1.0, 200.0).unwrap();

    let exit_id = wa.find_pond_exit(SADDLE).unwrap();
    let merged = wa
        .feature(exit_id)
        .unwrap()
        .as_pond_exit()
        .unwrap()
        .merged()
        .unwrap();
    let merged_pond = wa.feature(merged).unwrap().as_pond().unwrap();
    assert!(merged_pond.is_full());
    assert!(merged_pond
        .exits()
        .iter()
        .all(|&e| tin.is_hull_point(wa.feature(e).unwrap().as_pond_exit().unwrap().point())));

    let balance = wa.water_balance();
    let stored = pond_capacity(&wa, LOW_P) + pond_capacity(&wa, LOW_Q) + merged_pond.capacity().unwrap();
    assert!((balance.stored - stored).abs() < 1e-3, "stored {}", balance.stored);
    assert!((balance.exited - (200.0 - stored)).abs() < 1e-3);
    assert!(balance.unrouted.abs() < EPS);
    assert!(balance.residual().abs() < EPS);
}

#[test]
fn test_bowl_on_hull_overflows_at_rim() {
    // 碗沿四个边中点高 4，位于凸包上
    let tin = TinSurface::from_grid(5, 5, 1.0, 1.0, |i, j| {
        let (dx, dy) = (i as f64 - 2.0, j as f64 - 2.0);
        dx * dx + dy * dy
    })
    .unwrap();
    let mut wa = WaterAnalysis::new(&tin);
    wa.add_water_volume(0.5, 0.5, 100.0).unwrap();

    let pond_id = wa.find_pond_low_point(12).unwrap();
    let pond = wa.feature(pond_id).unwrap();
    let capacity = pond.as_pond().unwrap().capacity().unwrap();
    assert!(capacity > 20.0 && capacity < 28.0, "capacity {capacity}");
    assert_eq!(pond.termination(), Some(Termination::Continued));
    assert!(pond.as_pond().unwrap().is_full());

    let balance = wa.water_balance();
    assert!((balance.stored - capacity).abs() < EPS);
    assert!((balance.exited - (100.0 - capacity)).abs() < EPS);
    assert_eq!(wa.get_result().points(PointKind::Exit).count(), 8);
}

/// 5x3 网格：x = 1..2 为高程 2 的平台，西侧 x = 0 为 0，东侧高程等于 x
fn flat_band() -> TinSurface {
    TinSurface::from_grid(5, 3, 1.0, 1.0, |i, _| match i {
        0 => 0.0,
        1 | 2 => 2.0,
        i => i as f64,
    })
    .unwrap()
}

#[test]
fn test_zero_slope_trace_last_angle_crosses_flat() {
    let tin = flat_band();
    let mut wa = WaterAnalysis::new(&tin);
    wa.do_trace(3.5, 0.7).unwrap();

    assert!(wa.features().all(|(_, f)| f.feature_type() != FeatureType::Pond));
    let exits: Vec<_> = wa
        .get_result()
        .points(PointKind::Exit)
        .map(|item| match item {
            ResultItem::Point { location, .. } => *location,
            _ => unreachable!(),
        })
        .collect();
    assert_eq!(exits.len(), 1);
    assert!(exits[0].x.abs() < 1e-9);
    assert!((exits[0].y - 0.7).abs() < 1e-9);
}

#[test]
fn test_zero_slope_pond_option_stops_on_flat() {
    let tin = flat_band();
    let config = DrainageConfig {
        zero_slope: ZeroSlopeOption::Pond,
        ..Default::default()
    };
    let mut wa = WaterAnalysis::with_config(&tin, config).unwrap();
    wa.do_trace(3.5, 0.7).unwrap();

    let kinds: Vec<PondKind> = wa
        .features()
        .filter_map(|(_, f)| f.as_pond().map(|p| p.kind()))
        .collect();
    assert_eq!(kinds, vec![PondKind::Triangle]);
}

#[test]
fn test_trace_from_both_pits_merges_complex() {
    let tin = twin_basins();
    let mut wa = WaterAnalysis::new(&tin);
    wa.do_trace(2.0, 1.0).unwrap();

    let exit_id = wa.find_pond_exit(SADDLE).unwrap();
    let exit = wa.feature(exit_id).unwrap();
    // 水塘深于最小深度，追踪在溢出口暂停
    assert_eq!(exit.termination(), Some(Termination::Stopped));
    assert_eq!(wa.get_result().ponds().count(), 1);

    wa.do_trace(4.0, 1.0).unwrap();
    let exit = wa.feature(exit_id).unwrap();
    assert_eq!(exit.termination(), Some(Termination::Continued));
    let merged = exit.as_pond_exit().unwrap().merged().unwrap();

    let result = wa.get_result();
    let ponds: Vec<_> = result.ponds().map(ResultItem::feature).collect();
    assert_eq!(ponds, vec![merged]);
    wa.validate_graph().unwrap();
}

#[test]
fn test_shallow_pond_is_traced_through() {
    let tin = twin_basins();
    let config = DrainageConfig {
        minimum_depth: 10.0,
        ..Default::default()
    };
    let mut wa = WaterAnalysis::with_config(&tin, config).unwrap();
    wa.do_trace(2.0, 1.0).unwrap();

    // 鞍点溢出口被继续追踪，找到另一侧的水塘
    let exit_id = wa.find_pond_exit(SADDLE).unwrap();
    assert_eq!(
        wa.feature(exit_id).unwrap().termination(),
        Some(Termination::Continued)
    );
    assert!(wa.find_pond_low_point(LOW_Q).is_some());
    let on_q = wa.find_existing_on_point(LOW_Q).unwrap();
    assert!(matches!(
        wa.feature(on_q).unwrap().kind(),
        FeatureKind::OnPoint(_)
    ));
    assert!(tin.elevation(SADDLE) > tin.elevation(LOW_Q));
}

/// 5x5 穹顶：中心 (2, 2) 高 8，z = 8 - dx² - dy²
fn dome() -> TinSurface {
    TinSurface::from_grid(5, 5, 1.0, 1.0, |i, j| {
        let (dx, dy) = (i as f64 - 2.0, j as f64 - 2.0);
        8.0 - dx * dx - dy * dy
    })
    .unwrap()
}

#[test]
fn test_ascent_trace_climbs_to_summit() {
    let tin = dome();
    let up = Inverted::new(&tin);
    let mut wa = WaterAnalysis::new(&up);
    wa.do_trace(0.5, 0.5).unwrap();
    assert!(wa.find_pond_low_point(12).is_some());

    let result = wa.get_result();
    let summits: Vec<DVec3> = result
        .points(PointKind::Low)
        .filter_map(|item| match item {
            ResultItem::Point { location, .. } => Some(*location),
            _ => None,
        })
        .collect();
    assert_eq!(summits, vec![DVec3::new(2.0, 2.0, 8.0)]);

    let mut streams = 0;
    for item in result.streams() {
        let ResultItem::Stream { points, .. } = item else {
            continue;
        };
        for pair in points.windows(2) {
            assert!(pair[1].z >= pair[0].z - 1e-9, "stream descends: {pair:?}");
        }
        assert!(points.iter().all(|p| (0.0..=8.0).contains(&p.z)));
        streams += 1;
    }
    assert!(streams >= 1);

    let mut types = Vec::new();
    let mut sink = |ty: DtmFeatureType, _: i64, _: u64, _: &[DVec3]| -> DrainageResult<()> {
        types.push(ty);
        Ok(())
    };
    wa.do_trace_callback(&mut sink, 0).unwrap();
    assert!(types.contains(&DtmFeatureType::AscentTrace));
    assert!(types.contains(&DtmFeatureType::HighPoint));
    assert!(!types.contains(&DtmFeatureType::DescentTrace));
    assert!(!types.contains(&DtmFeatureType::LowPoint));
}
