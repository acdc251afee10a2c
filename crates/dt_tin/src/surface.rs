// crates/dt_tin/src/surface.rs

//! 内存三角网
//!
//! [`TinSurface`] 保存点坐标与三角形，构建时完成：
//!
//! - 三角形统一定向为逆时针
//! - 有向边到三角形的映射与三角形邻接表
//! - 每个顶点的逆时针邻点扇形与凸包标记
//! - 三角形 R-Tree 索引（drape 查询）
//!
//! # 示例
//!
//! ```
//! use dt_tin::{TinAccess, TinSurface};
//! use glam::DVec3;
//!
//! let tin = TinSurface::new(
//!     vec![
//!         DVec3::new(0.0, 0.0, 10.0),
//!         DVec3::new(1.0, 0.0, 10.0),
//!         DVec3::new(0.5, 1.0, 0.0),
//!     ],
//!     vec![[0, 2, 1]],
//! )
//! .unwrap();
//! // 顺时针输入被重新定向
//! assert_eq!(tin.triangle(0), [0, 1, 2]);
//! assert!(tin.is_hull_point(2));
//! ```

use std::collections::HashMap;

use dt_foundation::{DtError, TraceTolerance};
use glam::{DVec2, DVec3};
use tracing::debug;

use crate::error::{TinError, TinResult};
use crate::spatial_index::{SpatialBounds, TriangleSpatialIndex};
use crate::traits::{DrapeLocation, DrapedPoint, PointIndex, TinAccess, TriangleIndex};

/// 内存三角网
#[derive(Debug, Clone)]
pub struct TinSurface {
    points: Vec<DVec3>,
    triangles: Vec<[PointIndex; 3]>,
    adjacency: Vec<[Option<TriangleIndex>; 3]>,
    edges: HashMap<(PointIndex, PointIndex), TriangleIndex>,
    fans: Vec<Vec<PointIndex>>,
    hull: Vec<bool>,
    index: TriangleSpatialIndex,
    tolerance: TraceTolerance,
}

impl TinSurface {
    /// 由点和三角形构建三角网
    ///
    /// # 错误
    ///
    /// - 点或三角形为空
    /// - 非有限坐标、越界索引
    /// - 退化三角形、重叠三角形、非流形顶点
    pub fn new(points: Vec<DVec3>, triangles: Vec<[PointIndex; 3]>) -> TinResult<Self> {
        Self::with_tolerance(points, triangles, TraceTolerance::default())
    }

    /// 使用指定容差构建三角网
    pub fn with_tolerance(
        points: Vec<DVec3>,
        triangles: Vec<[PointIndex; 3]>,
        tolerance: TraceTolerance,
    ) -> TinResult<Self> {
        if points.len() < 3 || triangles.is_empty() {
            return Err(TinError::Empty {
                points: points.len(),
                triangles: triangles.len(),
            });
        }
        for p in &points {
            DtError::check_finite("x", p.x)?;
            DtError::check_finite("y", p.y)?;
            DtError::check_finite("z", p.z)?;
        }

        let n_points = points.len();
        let mut oriented = Vec::with_capacity(triangles.len());
        for (t, tri) in triangles.iter().enumerate() {
            for &v in tri {
                DtError::check_index("point", v as usize, n_points)?;
            }
            let [a, b, c] = tri.map(|v| points[v as usize].truncate());
            let area2 = (b - a).perp_dot(c - a);
            if tri[0] == tri[1]
                || tri[1] == tri[2]
                || tri[0] == tri[2]
                || tolerance.is_degenerate_area(0.5 * area2)
            {
                return Err(TinError::DegenerateTriangle {
                    triangle: t,
                    area: 0.5 * area2,
                });
            }
            oriented.push(if area2 > 0.0 {
                *tri
            } else {
                [tri[0], tri[2], tri[1]]
            });
        }

        let mut edges = HashMap::with_capacity(oriented.len() * 3);
        for (t, tri) in oriented.iter().enumerate() {
            for i in 0..3 {
                let key = (tri[i], tri[(i + 1) % 3]);
                if edges.insert(key, t as TriangleIndex).is_some() {
                    return Err(TinError::DuplicateEdge {
                        from: key.0,
                        to: key.1,
                    });
                }
            }
        }

        let adjacency = oriented
            .iter()
            .map(|tri| [0, 1, 2].map(|i| edges.get(&(tri[(i + 1) % 3], tri[i])).copied()))
            .collect();

        let (fans, hull) = build_fans(n_points, &oriented)?;

        let index = TriangleSpatialIndex::build(
            oriented
                .iter()
                .enumerate()
                .map(|(t, tri)| (t as u32, tri.map(|v| points[v as usize].truncate()))),
        );

        debug!(
            "三角网构建完成: {} 个点, {} 个三角形, {} 个凸包点",
            n_points,
            oriented.len(),
            hull.iter().filter(|&&h| h).count()
        );

        Ok(Self {
            points,
            triangles: oriented,
            adjacency,
            edges,
            fans,
            hull,
            index,
            tolerance,
        })
    }

    /// 规则格网三角剖分
    ///
    /// `nx`、`ny` 为两个方向的点数，点索引为 `j * nx + i`，
    /// 每个格子沿 `(i, j) - (i+1, j+1)` 对角线剖分。
    pub fn from_grid(
        nx: usize,
        ny: usize,
        dx: f64,
        dy: f64,
        z: impl Fn(usize, usize) -> f64,
    ) -> TinResult<Self> {
        if nx < 2 || ny < 2 {
            return Err(TinError::Empty {
                points: nx * ny,
                triangles: 0,
            });
        }
        let mut points = Vec::with_capacity(nx * ny);
        for j in 0..ny {
            for i in 0..nx {
                points.push(DVec3::new(i as f64 * dx, j as f64 * dy, z(i, j)));
            }
        }
        let mut triangles = Vec::with_capacity(2 * (nx - 1) * (ny - 1));
        for j in 0..ny - 1 {
            for i in 0..nx - 1 {
                let n0 = (j * nx + i) as PointIndex;
                let n1 = n0 + 1;
                let n2 = n1 + nx as PointIndex;
                let n3 = n0 + nx as PointIndex;
                triangles.push([n0, n1, n2]);
                triangles.push([n0, n2, n3]);
            }
        }
        Self::new(points, triangles)
    }

    /// 全部点坐标
    pub fn points(&self) -> &[DVec3] {
        &self.points
    }

    /// 全部三角形（逆时针）
    pub fn triangles(&self) -> &[[PointIndex; 3]] {
        &self.triangles
    }

    /// 凸包点数
    pub fn n_hull_points(&self) -> usize {
        self.hull
            .iter()
            .zip(&self.fans)
            .filter(|(&h, fan)| h && !fan.is_empty())
            .count()
    }

    /// 高程范围 `(min, max)`
    pub fn elevation_range(&self) -> (f64, f64) {
        self.points
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
                (lo.min(p.z), hi.max(p.z))
            })
    }

    /// 平面范围
    pub fn bounds(&self) -> Option<SpatialBounds> {
        self.index.bounds()
    }

    /// 几何容差
    pub fn tolerance(&self) -> &TraceTolerance {
        &self.tolerance
    }
}

/// 构建每个顶点的逆时针邻点扇形
fn build_fans(
    n_points: usize,
    triangles: &[[PointIndex; 3]],
) -> TinResult<(Vec<Vec<PointIndex>>, Vec<bool>)> {
    let mut around: Vec<Vec<(PointIndex, PointIndex)>> = vec![Vec::new(); n_points];
    for tri in triangles {
        for i in 0..3 {
            around[tri[i] as usize].push((tri[(i + 1) % 3], tri[(i + 2) % 3]));
        }
    }

    let mut fans = Vec::with_capacity(n_points);
    let mut hull = Vec::with_capacity(n_points);
    for (center, pairs) in around.iter().enumerate() {
        if pairs.is_empty() {
            // 孤立点不参与三角网
            fans.push(Vec::new());
            hull.push(true);
            continue;
        }
        let next: HashMap<PointIndex, PointIndex> = pairs.iter().copied().collect();
        let heads: Vec<PointIndex> = pairs
            .iter()
            .map(|&(a, _)| a)
            .filter(|a| !pairs.iter().any(|&(_, b)| b == *a))
            .collect();
        let (start, open) = match heads.as_slice() {
            [] => (
                pairs.iter().map(|&(a, _)| a).min().unwrap_or(pairs[0].0),
                false,
            ),
            [head] => (*head, true),
            _ => {
                return Err(TinError::NonManifold {
                    point: center as PointIndex,
                })
            }
        };

        let mut fan = vec![start];
        let mut current = start;
        while let Some(&n) = next.get(&current) {
            if n == start || fan.len() > pairs.len() {
                break;
            }
            fan.push(n);
            current = n;
        }

        let expected = if open { pairs.len() + 1 } else { pairs.len() };
        if fan.len() != expected || next.len() != pairs.len() {
            return Err(TinError::NonManifold {
                point: center as PointIndex,
            });
        }
        fans.push(fan);
        hull.push(open);
    }
    Ok((fans, hull))
}

/// 重心坐标
fn barycentric(a: DVec2, b: DVec2, c: DVec2, p: DVec2) -> [f64; 3] {
    let area2 = (b - a).perp_dot(c - a);
    let l0 = (b - p).perp_dot(c - p) / area2;
    let l1 = (c - p).perp_dot(a - p) / area2;
    [l0, l1, 1.0 - l0 - l1]
}

impl TinAccess for TinSurface {
    #[inline]
    fn n_points(&self) -> usize {
        self.points.len()
    }

    #[inline]
    fn n_triangles(&self) -> usize {
        self.triangles.len()
    }

    #[inline]
    fn point(&self, p: PointIndex) -> DVec3 {
        self.points[p as usize]
    }

    #[inline]
    fn triangle(&self, t: TriangleIndex) -> [PointIndex; 3] {
        self.triangles[t as usize]
    }

    #[inline]
    fn triangle_neighbors(&self, t: TriangleIndex) -> [Option<TriangleIndex>; 3] {
        self.adjacency[t as usize]
    }

    #[inline]
    fn neighbors(&self, p: PointIndex) -> &[PointIndex] {
        &self.fans[p as usize]
    }

    #[inline]
    fn is_hull_point(&self, p: PointIndex) -> bool {
        self.hull[p as usize]
    }

    #[inline]
    fn triangle_with_edge(&self, a: PointIndex, b: PointIndex) -> Option<TriangleIndex> {
        self.edges.get(&(a, b)).copied()
    }

    fn drape(&self, x: f64, y: f64) -> Option<DrapedPoint> {
        let q = DVec2::new(x, y);
        let tol = self.tolerance.snap;
        for t in self.index.candidates(x, y) {
            let tri = self.triangles[t as usize];
            let [a, b, c] = tri.map(|v| self.points[v as usize]);
            let w = barycentric(a.truncate(), b.truncate(), c.truncate(), q);
            if w.iter().any(|&l| l < -tol) {
                continue;
            }
            let location = if let Some(i) = (0..3).find(|&i| w[i] >= 1.0 - tol) {
                DrapeLocation::Vertex(tri[i])
            } else if let Some(k) = (0..3).find(|&k| w[k] <= tol) {
                DrapeLocation::Edge(tri[(k + 1) % 3], tri[(k + 2) % 3])
            } else {
                DrapeLocation::Triangle(t)
            };
            let position = match location {
                DrapeLocation::Vertex(p) => self.points[p as usize],
                _ => DVec3::new(x, y, w[0] * a.z + w[1] * b.z + w[2] * c.z),
            };
            return Some(DrapedPoint { position, location });
        }
        None
    }
}
