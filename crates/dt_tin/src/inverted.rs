// crates/dt_tin/src/inverted.rs

//! 高程取反视图
//!
//! [`Inverted`] 把底层三角网的高程取反，拓扑不变。在它上面做最速下降，
//! 就是在原地形上做最速上升（上溯追踪）；低洼对应原地形的山顶。

use glam::DVec3;

use crate::traits::{DrapedPoint, PointIndex, TinAccess, TriangleIndex};

/// 高程取反的三角网视图
#[derive(Debug, Clone, Copy)]
pub struct Inverted<'a, T> {
    tin: &'a T,
}

impl<'a, T: TinAccess> Inverted<'a, T> {
    /// 包装三角网
    pub fn new(tin: &'a T) -> Self {
        Self { tin }
    }

    /// 底层三角网
    pub fn inner(&self) -> &'a T {
        self.tin
    }
}

#[inline]
fn flip(p: DVec3) -> DVec3 {
    DVec3::new(p.x, p.y, -p.z)
}

impl<T: TinAccess> TinAccess for Inverted<'_, T> {
    #[inline]
    fn n_points(&self) -> usize {
        self.tin.n_points()
    }

    #[inline]
    fn n_triangles(&self) -> usize {
        self.tin.n_triangles()
    }

    #[inline]
    fn point(&self, p: PointIndex) -> DVec3 {
        flip(self.tin.point(p))
    }

    #[inline]
    fn triangle(&self, t: TriangleIndex) -> [PointIndex; 3] {
        self.tin.triangle(t)
    }

    #[inline]
    fn triangle_neighbors(&self, t: TriangleIndex) -> [Option<TriangleIndex>; 3] {
        self.tin.triangle_neighbors(t)
    }

    #[inline]
    fn neighbors(&self, p: PointIndex) -> &[PointIndex] {
        self.tin.neighbors(p)
    }

    #[inline]
    fn is_hull_point(&self, p: PointIndex) -> bool {
        self.tin.is_hull_point(p)
    }

    #[inline]
    fn triangle_with_edge(&self, a: PointIndex, b: PointIndex) -> Option<TriangleIndex> {
        self.tin.triangle_with_edge(a, b)
    }

    fn drape(&self, x: f64, y: f64) -> Option<DrapedPoint> {
        self.tin.drape(x, y).map(|d| DrapedPoint {
            position: flip(d.position),
            location: d.location,
        })
    }

    fn is_inverted(&self) -> bool {
        !self.tin.is_inverted()
    }
}
