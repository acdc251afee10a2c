// crates/dt_tin/src/traits.rs

//! 三角网只读访问接口
//!
//! 径流追踪对地形的全部需求都在 [`TinAccess`] 中：
//!
//! - 点坐标查询
//! - 三角形顶点与邻接三角形
//! - 绕顶点的顺时针 / 逆时针遍历（跨越凸包缺口时返回 `None`）
//! - 平面坐标投影到地表（drape）
//!
//! 三角形顶点总是逆时针排列，顶点的邻点也按逆时针排列。
//! 对凸包上的顶点，邻点序列从缺口之后的第一个点开始，到缺口之前的点结束。

use glam::{DVec2, DVec3};

/// 点索引
pub type PointIndex = u32;

/// 三角形索引
pub type TriangleIndex = u32;

/// 投影点在三角网中的位置类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrapeLocation {
    /// 落在顶点上
    Vertex(PointIndex),
    /// 落在边上（两端点）
    Edge(PointIndex, PointIndex),
    /// 落在三角形内部
    Triangle(TriangleIndex),
}

/// 投影结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrapedPoint {
    /// 地表上的三维位置
    pub position: DVec3,
    /// 位置类别
    pub location: DrapeLocation,
}

/// 三角网只读访问 trait
pub trait TinAccess {
    // =========================================================================
    // 基本数量
    // =========================================================================

    /// 点数
    fn n_points(&self) -> usize;

    /// 三角形数
    fn n_triangles(&self) -> usize;

    // =========================================================================
    // 几何与拓扑
    // =========================================================================

    /// 点坐标
    fn point(&self, p: PointIndex) -> DVec3;

    /// 三角形顶点（逆时针）
    fn triangle(&self, t: TriangleIndex) -> [PointIndex; 3];

    /// 邻接三角形，第 i 项为跨越边 `v[i] -> v[i+1]` 的三角形
    fn triangle_neighbors(&self, t: TriangleIndex) -> [Option<TriangleIndex>; 3];

    /// 顶点的邻点（逆时针）
    fn neighbors(&self, p: PointIndex) -> &[PointIndex];

    /// 是否为凸包顶点
    fn is_hull_point(&self, p: PointIndex) -> bool;

    /// 包含有向边 `a -> b` 的三角形
    fn triangle_with_edge(&self, a: PointIndex, b: PointIndex) -> Option<TriangleIndex>;

    /// 把平面坐标投影到地表，不在三角网内时返回 `None`
    fn drape(&self, x: f64, y: f64) -> Option<DrapedPoint>;

    // =========================================================================
    // 派生查询
    // =========================================================================

    /// 点高程
    #[inline]
    fn elevation(&self, p: PointIndex) -> f64 {
        self.point(p).z
    }

    /// 点的平面坐标
    #[inline]
    fn xy(&self, p: PointIndex) -> DVec2 {
        self.point(p).truncate()
    }

    /// 三角形三个顶点坐标
    fn triangle_points(&self, t: TriangleIndex) -> [DVec3; 3] {
        self.triangle(t).map(|p| self.point(p))
    }

    /// 绕 `center` 从 `from` 逆时针的下一个邻点
    fn next_anticlockwise(&self, center: PointIndex, from: PointIndex) -> Option<PointIndex> {
        let ring = self.neighbors(center);
        let i = ring.iter().position(|&n| n == from)?;
        if i + 1 < ring.len() {
            Some(ring[i + 1])
        } else if self.is_hull_point(center) {
            None
        } else {
            ring.first().copied()
        }
    }

    /// 绕 `center` 从 `from` 顺时针的下一个邻点
    fn next_clockwise(&self, center: PointIndex, from: PointIndex) -> Option<PointIndex> {
        let ring = self.neighbors(center);
        let i = ring.iter().position(|&n| n == from)?;
        if i > 0 {
            Some(ring[i - 1])
        } else if self.is_hull_point(center) {
            None
        } else {
            ring.last().copied()
        }
    }

    /// `a`、`b` 是否由一条三角网边相连
    fn has_edge(&self, a: PointIndex, b: PointIndex) -> bool {
        self.triangle_with_edge(a, b).is_some() || self.triangle_with_edge(b, a).is_some()
    }

    /// 是否为凸包边（只有一侧有三角形）
    fn is_hull_edge(&self, a: PointIndex, b: PointIndex) -> bool {
        self.triangle_with_edge(a, b).is_none() || self.triangle_with_edge(b, a).is_none()
    }

    /// 三角形 `t` 跨越边 `a-b` 的另一侧三角形
    fn adjacent_triangle(
        &self,
        t: TriangleIndex,
        a: PointIndex,
        b: PointIndex,
    ) -> Option<TriangleIndex> {
        let v = self.triangle(t);
        let forward = (0..3).any(|i| v[i] == a && v[(i + 1) % 3] == b);
        if forward {
            self.triangle_with_edge(b, a)
        } else {
            self.triangle_with_edge(a, b)
        }
    }

    /// 三角形中除 `a`、`b` 外的第三个顶点
    fn third_point(&self, t: TriangleIndex, a: PointIndex, b: PointIndex) -> Option<PointIndex> {
        self.triangle(t).into_iter().find(|&p| p != a && p != b)
    }

    /// 高程是否为取反视图（上溯追踪）
    fn is_inverted(&self) -> bool {
        false
    }

    /// 是否存在不在凸包上的点（全部点都在凸包上时凸包不能作为出水口）
    fn has_interior_points(&self) -> bool {
        (0..self.n_points() as PointIndex).any(|p| !self.is_hull_point(p))
    }

    /// 顶点周围的三角形（逆时针）
    fn incident_triangles(&self, p: PointIndex) -> Vec<TriangleIndex> {
        self.neighbors(p)
            .iter()
            .filter_map(|&n| self.triangle_with_edge(p, n))
            .collect()
    }
}
