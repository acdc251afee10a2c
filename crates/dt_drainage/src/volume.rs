// crates/dt_drainage/src/volume.rs

//! 三角形蓄水体积与水面面积
//!
//! 把三角形裁剪到水位以下的部分（至多四边形），再按扇形三角化，
//! 每个子三角形的体积为面积乘三个顶点水深的平均值。

use glam::{DVec2, DVec3};

/// 裁剪后的顶点：平面位置与水深
type WetVertex = (DVec2, f64);

/// 三角形位于水位 `level` 以下部分的顶点（水深 ≥ 0）
fn clip_below(xy: [DVec2; 3], z: [f64; 3], level: f64) -> Vec<WetVertex> {
    let mut out = Vec::with_capacity(4);
    for i in 0..3 {
        let j = (i + 1) % 3;
        let di = level - z[i];
        let dj = level - z[j];
        if di >= 0.0 {
            out.push((xy[i], di));
        }
        if (di >= 0.0) != (dj >= 0.0) {
            let t = di / (di - dj);
            out.push((xy[i] + (xy[j] - xy[i]) * t, 0.0));
        }
    }
    out
}

fn fan<F: Fn(f64, &[WetVertex; 3]) -> f64>(poly: &[WetVertex], f: F) -> f64 {
    if poly.len() < 3 {
        return 0.0;
    }
    let o = poly[0];
    poly.windows(2)
        .skip(1)
        .map(|w| {
            let area = 0.5 * (w[0].0 - o.0).perp_dot(w[1].0 - o.0).abs();
            f(area, &[o, w[0], w[1]])
        })
        .sum()
}

/// 水位 `level` 下三角形的蓄水体积
pub(crate) fn fill_volume(xy: [DVec2; 3], z: [f64; 3], level: f64) -> f64 {
    let poly = clip_below(xy, z, level);
    fan(&poly, |area, tri| area * (tri[0].1 + tri[1].1 + tri[2].1) / 3.0)
}

/// 水位 `level` 下三角形的水面面积
pub(crate) fn wet_area(xy: [DVec2; 3], z: [f64; 3], level: f64) -> f64 {
    let poly = clip_below(xy, z, level);
    fan(&poly, |area, _| area)
}

/// 闭合或未闭合多边形的有向面积（逆时针为正）
pub fn polygon_area(points: &[DVec3]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let twice: f64 = (0..n)
        .map(|i| {
            let a = points[i];
            let b = points[(i + 1) % n];
            a.x * b.y - b.x * a.y
        })
        .sum();
    0.5 * twice
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit() -> [DVec2; 3] {
        [DVec2::new(0.0, 0.0), DVec2::new(1.0, 0.0), DVec2::new(0.0, 1.0)]
    }

    #[test]
    fn test_fully_submerged() {
        // 平底三角形，水深 2，面积 0.5
        let v = fill_volume(unit(), [0.0; 3], 2.0);
        assert!((v - 1.0).abs() < 1e-12);
        assert!((wet_area(unit(), [0.0; 3], 2.0) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_dry() {
        assert_eq!(fill_volume(unit(), [1.0, 2.0, 3.0], 0.5), 0.0);
        assert_eq!(wet_area(unit(), [1.0, 2.0, 3.0], 0.5), 0.0);
    }

    #[test]
    fn test_partial_is_cone() {
        // 单个顶点在水下：体积为四面体 A·h/3
        let z = [0.0, 1.0, 1.0];
        let v = fill_volume(unit(), z, 0.5);
        // 水面为 (0.5, 0) (0, 0.5) 的三角形，面积 0.125，深 0.5
        assert!((v - 0.125 * 0.5 / 3.0).abs() < 1e-12);
        assert!((wet_area(unit(), z, 0.5) - 0.125).abs() < 1e-12);
    }

    #[test]
    fn test_sloped_triangle_volume() {
        // 两个顶点在水下的斜面：与解析值比较
        let xy = [DVec2::new(0.0, 0.0), DVec2::new(1.0, 0.0), DVec2::new(0.5, 1.0)];
        let z = [10.0, 10.0, 0.0];
        // 水位 10 时为倒四面体：面积 0.5，平均水深 10/3
        let v = fill_volume(xy, z, 10.0);
        assert!((v - 0.5 * 10.0 / 3.0).abs() < 1e-9);
        // 水位 20：额外一层 0.5 × 10
        let v = fill_volume(xy, z, 20.0);
        assert!((v - (0.5 * 10.0 / 3.0 + 5.0)).abs() < 1e-9);
    }

    #[test]
    fn test_monotonic_in_level() {
        let z = [0.3, 1.7, 0.9];
        let mut last = 0.0;
        for k in 0..40 {
            let level = k as f64 * 0.05;
            let v = fill_volume(unit(), z, level);
            assert!(v >= last - 1e-15);
            last = v;
        }
    }

    #[test]
    fn test_polygon_area() {
        let square = [
            DVec3::new(0.0, 0.0, 0.0),
            DVec3::new(2.0, 0.0, 0.0),
            DVec3::new(2.0, 2.0, 0.0),
            DVec3::new(0.0, 2.0, 0.0),
        ];
        assert!((polygon_area(&square) - 4.0).abs() < 1e-12);
        let mut cw = square;
        cw.reverse();
        assert!((polygon_area(&cw) + 4.0).abs() < 1e-12);
    }
}
