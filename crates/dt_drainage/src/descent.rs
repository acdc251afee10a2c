// crates/dt_drainage/src/descent.rs

//! 最速下降几何
//!
//! 三角形平面梯度、顶点处的最速下降方向扫描，以及在三角形内沿
//! 给定方向投射射线求出口边 / 出口顶点。所有角度均为平面方位角
//! （弧度，`atan2(dy, dx)`）。

use dt_foundation::TraceTolerance;
use dt_tin::{PointIndex, TinAccess, TriangleIndex};
use glam::{DVec2, DVec3};

/// 三角形内的下降方向
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Descent {
    /// 单位方向
    pub direction: DVec2,
    /// 坡度（梯度模）
    pub slope: f64,
}

impl Descent {
    /// 方位角
    #[inline]
    pub fn angle(&self) -> f64 {
        angle_of(self.direction)
    }
}

/// 平面方位角
#[inline]
pub(crate) fn angle_of(direction: DVec2) -> f64 {
    direction.y.atan2(direction.x)
}

/// 方位角对应的单位向量
#[inline]
pub(crate) fn direction_of(angle: f64) -> DVec2 {
    DVec2::new(angle.cos(), angle.sin())
}

/// 三角形平面梯度 `(dz/dx, dz/dy)`，投影退化时返回 `None`
pub(crate) fn plane_gradient(p: [DVec3; 3]) -> Option<DVec2> {
    let n = (p[1] - p[0]).cross(p[2] - p[0]);
    if n.z.abs() <= f64::MIN_POSITIVE {
        return None;
    }
    Some(DVec2::new(-n.x / n.z, -n.y / n.z))
}

/// 三角形是否水平
pub(crate) fn is_flat_triangle(p: [DVec3; 3], tol: &TraceTolerance) -> bool {
    tol.same_elevation(p[0].z, p[1].z) && tol.same_elevation(p[1].z, p[2].z)
}

/// 三角形内的最速下降方向，平坦时返回 `None`
pub(crate) fn triangle_descent(p: [DVec3; 3], tol: &TraceTolerance) -> Option<Descent> {
    if is_flat_triangle(p, tol) {
        return None;
    }
    let grad = plane_gradient(p)?;
    let slope = grad.length();
    if tol.is_flat(slope) {
        return None;
    }
    Some(Descent {
        direction: -grad / slope,
        slope,
    })
}

/// 从边 `a -> b` 上出发沿 `direction` 是否进入 `c` 所在一侧
pub(crate) fn points_into(a: DVec2, b: DVec2, c: DVec2, direction: DVec2, tol: &TraceTolerance) -> bool {
    let edge = b - a;
    let side_c = edge.perp_dot(c - a);
    let side_d = edge.perp_dot(direction);
    side_c * side_d > 0.0 && !tol.is_parallel(side_d / edge.length().max(f64::MIN_POSITIVE))
}

/// 射线 `o + t·d` 与线段 `a + u·(b - a)` 的交点参数 `(t, u)`
pub(crate) fn ray_segment(
    o: DVec2,
    d: DVec2,
    a: DVec2,
    b: DVec2,
    tol: &TraceTolerance,
) -> Option<(f64, f64)> {
    let e = b - a;
    let denom = d.perp_dot(e);
    if tol.is_parallel(denom / e.length().max(f64::MIN_POSITIVE)) {
        return None;
    }
    let w = a - o;
    Some((w.perp_dot(e) / denom, w.perp_dot(d) / denom))
}

/// 射线离开三角形的位置
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum RayHit {
    /// 穿过顶点
    Vertex(PointIndex),
    /// 穿过边 `a-b` 的内部
    Edge {
        /// 边起点
        a: PointIndex,
        /// 边终点
        b: PointIndex,
        /// 交点（高程按边线性插值）
        position: DVec3,
    },
}

/// 在三角形 `t` 内从 `origin` 沿 `direction` 投射射线
///
/// `skip` 中列出的顶点所张成的边不参与求交（入口边，或起点顶点的两条邻边）。
pub(crate) fn cast_ray<T: TinAccess>(
    tin: &T,
    t: TriangleIndex,
    origin: DVec2,
    direction: DVec2,
    skip: &[PointIndex],
    tol: &TraceTolerance,
) -> Option<RayHit> {
    let v = tin.triangle(t);
    let mut best: Option<(f64, PointIndex, PointIndex, f64)> = None;
    for i in 0..3 {
        let (a, b) = (v[i], v[(i + 1) % 3]);
        let skipped = match skip {
            [p] => a == *p || b == *p,
            _ => skip.contains(&a) && skip.contains(&b),
        };
        if skipped {
            continue;
        }
        let Some((s, u)) = ray_segment(origin, direction, tin.xy(a), tin.xy(b), tol) else {
            continue;
        };
        if s <= 0.0 || u < -tol.snap || u > 1.0 + tol.snap {
            continue;
        }
        if best.map_or(true, |(bs, ..)| s > bs) {
            best = Some((s, a, b, u));
        }
    }
    let (_, a, b, u) = best?;
    if tol.snaps_to_start(u) {
        return Some(RayHit::Vertex(a));
    }
    if tol.snaps_to_end(u) {
        return Some(RayHit::Vertex(b));
    }
    let (pa, pb) = (tin.point(a), tin.point(b));
    Some(RayHit::Edge {
        a,
        b,
        position: pa + (pb - pa) * u,
    })
}

/// 顶点处的最速下降
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum VertexDescent {
    /// 沿边流向邻点
    Edge {
        /// 目标邻点
        to: PointIndex,
        /// 方位角
        angle: f64,
    },
    /// 流过三角形 `(p, a, b)` 的面
    Face {
        /// 三角形
        triangle: TriangleIndex,
        /// 对边起点
        a: PointIndex,
        /// 对边终点
        b: PointIndex,
        /// 方位角
        angle: f64,
    },
}

/// 扫描顶点 `p` 周围的所有边和面，返回坡度最大的下降方向
///
/// `allow` 过滤可以流向的邻点，面要求两个对边顶点都被允许。
pub(crate) fn steepest_descent<T, F>(
    tin: &T,
    p: PointIndex,
    allow: F,
    tol: &TraceTolerance,
) -> Option<VertexDescent>
where
    T: TinAccess,
    F: Fn(PointIndex) -> bool,
{
    let o = tin.point(p);
    let ring = tin.neighbors(p);
    let mut best: Option<(f64, VertexDescent)> = None;

    for &n in ring {
        if !allow(n) {
            continue;
        }
        let q = tin.point(n);
        let run = (q - o).truncate();
        let dist = run.length();
        if dist <= 0.0 || !tol.is_below(q.z, o.z) {
            continue;
        }
        let slope = (o.z - q.z) / dist;
        if best.map_or(true, |(s, _)| slope > s) {
            best = Some((
                slope,
                VertexDescent::Edge {
                    to: n,
                    angle: angle_of(run),
                },
            ));
        }
    }

    for (a, b) in fan_pairs(tin, p) {
        if !allow(a) || !allow(b) {
            continue;
        }
        let Some(t) = tin.triangle_with_edge(p, a) else {
            continue;
        };
        let Some(d) = triangle_descent(tin.triangle_points(t), tol) else {
            continue;
        };
        if !inside_wedge(o.truncate(), tin.xy(a), tin.xy(b), d.direction) {
            continue;
        }
        // 坡度相同时优先沿边
        if best.map_or(true, |(s, _)| d.slope > s * (1.0 + 1e-12) + tol.flat_slope) {
            best = Some((
                d.slope,
                VertexDescent::Face {
                    triangle: t,
                    a,
                    b,
                    angle: d.angle(),
                },
            ));
        }
    }

    best.map(|(_, descent)| descent)
}

/// 顶点扇形中相邻的邻点对 `(a, b)`，三角形 `(p, a, b)` 逆时针
pub(crate) fn fan_pairs<T: TinAccess>(tin: &T, p: PointIndex) -> Vec<(PointIndex, PointIndex)> {
    let ring = tin.neighbors(p);
    let n = ring.len();
    if n < 2 {
        return Vec::new();
    }
    let closed = !tin.is_hull_point(p);
    let count = if closed { n } else { n - 1 };
    (0..count).map(|i| (ring[i], ring[(i + 1) % n])).collect()
}

/// 方向 `d` 是否严格位于从 `a - o` 逆时针到 `b - o` 的楔形内
pub(crate) fn inside_wedge(o: DVec2, a: DVec2, b: DVec2, d: DVec2) -> bool {
    let ea = a - o;
    let eb = b - o;
    let eps = 1e-12;
    ea.perp_dot(d) > eps * ea.length() && d.perp_dot(eb) > eps * eb.length()
}

/// 包含方向 `d` 的扇形三角形（含楔形边界）
pub(crate) fn wedge_containing<T: TinAccess>(
    tin: &T,
    p: PointIndex,
    d: DVec2,
) -> Option<(TriangleIndex, PointIndex, PointIndex)> {
    let o = tin.xy(p);
    fan_pairs(tin, p).into_iter().find_map(|(a, b)| {
        let ea = tin.xy(a) - o;
        let eb = tin.xy(b) - o;
        if ea.perp_dot(d) >= 0.0 && d.perp_dot(eb) >= 0.0 {
            tin.triangle_with_edge(p, a).map(|t| (t, a, b))
        } else {
            None
        }
    })
}

/// 凸包顶点处是否有面的下降方向指向三角网外（凸包缺口）
pub(crate) fn descends_off_hull<T: TinAccess>(tin: &T, p: PointIndex, tol: &TraceTolerance) -> bool {
    if !tin.is_hull_point(p) {
        return false;
    }
    tin.incident_triangles(p).into_iter().any(|t| {
        triangle_descent(tin.triangle_points(t), tol)
            .is_some_and(|d| wedge_containing(tin, p, d.direction).is_none())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use dt_tin::TinSurface;

    fn tilted() -> TinSurface {
        // z = x，向 -x 方向下降
        TinSurface::from_grid(3, 3, 1.0, 1.0, |i, _| i as f64).unwrap()
    }

    #[test]
    fn test_plane_gradient() {
        let g = plane_gradient([
            DVec3::new(0.0, 0.0, 0.0),
            DVec3::new(1.0, 0.0, 2.0),
            DVec3::new(0.0, 1.0, 3.0),
        ])
        .unwrap();
        assert!((g.x - 2.0).abs() < 1e-12);
        assert!((g.y - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_triangle_descent_flat() {
        let tol = TraceTolerance::default();
        let flat = [DVec3::ZERO, DVec3::new(1.0, 0.0, 0.0), DVec3::new(0.0, 1.0, 0.0)];
        assert!(triangle_descent(flat, &tol).is_none());
        let tilted = [DVec3::ZERO, DVec3::new(1.0, 0.0, 1.0), DVec3::new(0.0, 1.0, 0.0)];
        let d = triangle_descent(tilted, &tol).unwrap();
        assert!((d.direction - DVec2::new(-1.0, 0.0)).length() < 1e-12);
        assert!((d.slope - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_ray_segment() {
        let tol = TraceTolerance::default();
        let (t, u) = ray_segment(
            DVec2::ZERO,
            DVec2::new(1.0, 0.0),
            DVec2::new(2.0, -1.0),
            DVec2::new(2.0, 1.0),
            &tol,
        )
        .unwrap();
        assert!((t - 2.0).abs() < 1e-12);
        assert!((u - 0.5).abs() < 1e-12);
        assert!(ray_segment(
            DVec2::ZERO,
            DVec2::new(1.0, 0.0),
            DVec2::new(0.0, 1.0),
            DVec2::new(1.0, 1.0),
            &tol
        )
        .is_none());
    }

    #[test]
    fn test_cast_ray_through_vertex() {
        let tin = tilted();
        let tol = TraceTolerance::default();
        // 三角形 [1, 2, 5] 内，从 (1.5, 0.25) 沿 -x 到边 1-5
        let t = tin.triangle_with_edge(1, 2).unwrap();
        let hit = cast_ray(&tin, t, DVec2::new(1.75, 0.25), DVec2::new(-1.0, 0.0), &[], &tol).unwrap();
        match hit {
            RayHit::Edge { a, b, position } => {
                assert!([a, b].contains(&1) && [a, b].contains(&5));
                assert!((position.x - 1.25).abs() < 1e-12);
                assert!((position.z - 1.25).abs() < 1e-12);
            }
            other => panic!("unexpected hit {other:?}"),
        }
        // 从顶点 5 沿 -x 穿过三角形 [1, 5, 4]，正好到达顶点 4
        let t = tin.triangle_with_edge(5, 4).unwrap();
        let hit = cast_ray(&tin, t, tin.xy(5), DVec2::new(-1.0, 0.0), &[5], &tol);
        assert_eq!(hit, Some(RayHit::Vertex(4)));
    }

    #[test]
    fn test_steepest_descent_prefers_edge_on_ties() {
        let tin = tilted();
        let tol = TraceTolerance::default();
        let d = steepest_descent(&tin, 4, |_| true, &tol).unwrap();
        assert_eq!(d, VertexDescent::Edge { to: 3, angle: std::f64::consts::PI });
    }

    #[test]
    fn test_steepest_descent_none_at_minimum() {
        let tin = TinSurface::from_grid(3, 3, 1.0, 1.0, |i, j| if (i, j) == (1, 1) { 0.0 } else { 5.0 })
            .unwrap();
        let tol = TraceTolerance::default();
        assert!(steepest_descent(&tin, 4, |_| true, &tol).is_none());
        assert!(steepest_descent(&tin, 0, |_| true, &tol).is_some());
    }

    #[test]
    fn test_fan_pairs_and_wedge() {
        let tin = tilted();
        assert_eq!(fan_pairs(&tin, 4).len(), 6);
        assert_eq!(fan_pairs(&tin, 0).len(), 2);
        let (t, a, b) = wedge_containing(&tin, 4, DVec2::new(1.0, 0.2)).unwrap();
        assert_eq!((a, b), (5, 8));
        assert_eq!(tin.triangle(t), [4, 5, 8]);
        assert!(wedge_containing(&tin, 0, DVec2::new(-1.0, 0.0)).is_none());
    }

    #[test]
    fn test_descends_off_hull() {
        let tin = tilted();
        let tol = TraceTolerance::default();
        assert!(descends_off_hull(&tin, 3, &tol));
        assert!(!descends_off_hull(&tin, 5, &tol));
        assert!(!descends_off_hull(&tin, 4, &tol));
    }
}
