// crates/dt_tin/src/spatial_index.rs

//! 三角形空间索引
//!
//! 基于 R-Tree 的三角形包围盒索引，用于 drape 查询时快速筛选候选三角形。
//! 包围盒命中后仍需精确的重心坐标测试。

use glam::DVec2;
use rstar::{PointDistance, RTree, RTreeObject, AABB};
use serde::{Deserialize, Serialize};

/// 三角形包围盒
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriangleEnvelope {
    /// 三角形索引
    pub triangle: u32,
    /// 最小 x 坐标
    pub min_x: f64,
    /// 最小 y 坐标
    pub min_y: f64,
    /// 最大 x 坐标
    pub max_x: f64,
    /// 最大 y 坐标
    pub max_y: f64,
}

impl TriangleEnvelope {
    /// 由三角形顶点创建包围盒
    pub fn new(triangle: u32, vertices: [DVec2; 3]) -> Self {
        let min = vertices[0].min(vertices[1]).min(vertices[2]);
        let max = vertices[0].max(vertices[1]).max(vertices[2]);
        Self {
            triangle,
            min_x: min.x,
            min_y: min.y,
            max_x: max.x,
            max_y: max.y,
        }
    }

    /// 检查点是否在包围盒内（闭区间）
    #[inline]
    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }
}

impl RTreeObject for TriangleEnvelope {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners([self.min_x, self.min_y], [self.max_x, self.max_y])
    }
}

impl PointDistance for TriangleEnvelope {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = (self.min_x - point[0]).max(0.0).max(point[0] - self.max_x);
        let dy = (self.min_y - point[1]).max(0.0).max(point[1] - self.max_y);
        dx * dx + dy * dy
    }

    fn contains_point(&self, point: &[f64; 2]) -> bool {
        TriangleEnvelope::contains_point(self, point[0], point[1])
    }
}

/// 空间边界
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpatialBounds {
    /// 最小 X 坐标
    pub min_x: f64,
    /// 最小 Y 坐标
    pub min_y: f64,
    /// 最大 X 坐标
    pub max_x: f64,
    /// 最大 Y 坐标
    pub max_y: f64,
}

impl SpatialBounds {
    /// 边界面积
    #[inline]
    pub fn area(&self) -> f64 {
        (self.max_x - self.min_x) * (self.max_y - self.min_y)
    }

    /// 检查点是否在边界内
    #[inline]
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }
}

/// 三角形 R-Tree 索引
#[derive(Clone)]
pub struct TriangleSpatialIndex {
    tree: RTree<TriangleEnvelope>,
}

impl std::fmt::Debug for TriangleSpatialIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TriangleSpatialIndex")
            .field("triangles", &self.tree.size())
            .finish()
    }
}

impl TriangleSpatialIndex {
    /// 由三角形顶点批量构建
    pub fn build<I>(triangles: I) -> Self
    where
        I: IntoIterator<Item = (u32, [DVec2; 3])>,
    {
        let envelopes: Vec<TriangleEnvelope> = triangles
            .into_iter()
            .map(|(t, v)| TriangleEnvelope::new(t, v))
            .collect();
        Self {
            tree: RTree::bulk_load(envelopes),
        }
    }

    /// 索引中的三角形数
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// 包围盒包含该点的候选三角形（按索引升序）
    pub fn candidates(&self, x: f64, y: f64) -> Vec<u32> {
        let mut hits: Vec<u32> = self
            .tree
            .locate_all_at_point(&[x, y])
            .map(|env| env.triangle)
            .collect();
        hits.sort_unstable();
        hits
    }

    /// 全部三角形的总包围盒
    pub fn bounds(&self) -> Option<SpatialBounds> {
        let mut iter = self.tree.iter();
        let first = iter.next()?;
        let mut b = SpatialBounds {
            min_x: first.min_x,
            min_y: first.min_y,
            max_x: first.max_x,
            max_y: first.max_y,
        };
        for env in iter {
            b.min_x = b.min_x.min(env.min_x);
            b.min_y = b.min_y.min(env.min_y);
            b.max_x = b.max_x.max(env.max_x);
            b.max_y = b.max_y.max(env.max_y);
        }
        Some(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_pair() -> TriangleSpatialIndex {
        TriangleSpatialIndex::build(vec![
            (0, [DVec2::new(0.0, 0.0), DVec2::new(1.0, 0.0), DVec2::new(1.0, 1.0)]),
            (1, [DVec2::new(0.0, 0.0), DVec2::new(1.0, 1.0), DVec2::new(0.0, 1.0)]),
            (2, [DVec2::new(5.0, 5.0), DVec2::new(6.0, 5.0), DVec2::new(6.0, 6.0)]),
        ])
    }

    #[test]
    fn test_candidates() {
        let index = unit_pair();
        assert_eq!(index.len(), 3);
        assert_eq!(index.candidates(0.5, 0.5), vec![0, 1]);
        assert_eq!(index.candidates(5.5, 5.2), vec![2]);
        assert!(index.candidates(3.0, 3.0).is_empty());
    }

    #[test]
    fn test_bounds() {
        let b = unit_pair().bounds().unwrap();
        assert_eq!(b.min_x, 0.0);
        assert_eq!(b.max_y, 6.0);
        assert!(b.contains(3.0, 3.0));
        assert_eq!(b.area(), 36.0);
    }

    #[test]
    fn test_envelope_distance() {
        let env = TriangleEnvelope::new(
            0,
            [DVec2::new(0.0, 0.0), DVec2::new(2.0, 0.0), DVec2::new(0.0, 2.0)],
        );
        assert_eq!(env.distance_2(&[3.0, 1.0]), 1.0);
        assert_eq!(env.distance_2(&[1.0, 1.0]), 0.0);
    }
}
