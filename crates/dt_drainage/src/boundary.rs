// crates/dt_drainage/src/boundary.rs

//! 水塘边界环
//!
//! 淹没区域的边界由湿三角形集合的有向边界边拼接而成。
//! 若区域在某个顶点处"捏合"，拼出的环会重复经过该点，需要拆分；
//! 反之，共享顶点的两个外环可以合并为一条轮廓。
//!
//! 所有同时存在的 [`BoundaryList`] 共享一个 [`PointUsage`] 计数表，
//! 用来快速发现在环上出现多次的点。计数表通过 [`BoundaryScope`]
//! 借用，作用域结束时自动清零。
//!
//! 淹没扩展本身在 [`crate::pond_analysis`] 的最小堆上进行，不依赖边界环；
//! 这里的环在每次需要输出水面轮廓时由当前湿三角形重新推出。

use std::collections::{BTreeMap, BTreeSet, HashMap};

use dt_tin::{PointIndex, TinAccess, TriangleIndex};
use glam::DVec3;

use crate::error::{DrainageError, DrainageResult};

// ============================================================================
// Location
// ============================================================================

/// 边界环的位置类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Location {
    /// 尚未分类
    #[default]
    Unknown,
    /// 外边界（逆时针）
    Outer,
    /// 内部岛屿边界（顺时针）
    Inner,
}

// ============================================================================
// PointUsage
// ============================================================================

/// 点在当前所有边界环上出现的次数
#[derive(Debug, Clone, Default)]
pub struct PointUsage {
    counts: HashMap<PointIndex, u32>,
}

impl PointUsage {
    /// 创建空计数表
    pub fn new() -> Self {
        Self::default()
    }

    /// 点的出现次数
    pub fn count(&self, p: PointIndex) -> u32 {
        self.counts.get(&p).copied().unwrap_or(0)
    }

    /// 是否全部清零
    pub fn is_clear(&self) -> bool {
        self.counts.is_empty()
    }

    /// 打开一个边界作用域
    pub fn scope(&mut self) -> BoundaryScope<'_> {
        BoundaryScope {
            usage: self,
            lists: Vec::new(),
        }
    }

    fn acquire(&mut self, p: PointIndex) {
        *self.counts.entry(p).or_insert(0) += 1;
    }

    fn release(&mut self, p: PointIndex) {
        if let Some(c) = self.counts.get_mut(&p) {
            *c -= 1;
            if *c == 0 {
                self.counts.remove(&p);
            }
        }
    }
}

// ============================================================================
// BoundaryList
// ============================================================================

/// 一条闭合边界环（首点不重复存储）
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BoundaryList {
    points: Vec<PointIndex>,
    location: Location,
}

impl BoundaryList {
    /// 由点序列创建
    pub fn new(points: Vec<PointIndex>) -> Self {
        Self {
            points,
            location: Location::Unknown,
        }
    }

    /// 点序列
    pub fn points(&self) -> &[PointIndex] {
        &self.points
    }

    /// 点数
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// 位置类别
    pub fn location(&self) -> Location {
        self.location
    }

    /// 设置位置类别
    pub fn set_location(&mut self, location: Location) {
        self.location = location;
    }

    /// 是否包含点
    pub fn contains(&self, p: PointIndex) -> bool {
        self.points.contains(&p)
    }

    /// 需要拆分的点：计数大于 1 且在本环上出现两次
    pub fn needs_split(&self, usage: &PointUsage) -> Option<PointIndex> {
        let mut seen = BTreeSet::new();
        self.points
            .iter()
            .copied()
            .filter(|&p| usage.count(p) > 1)
            .find(|&p| !seen.insert(p))
    }

    /// 在重复点 `at` 处拆出一个子环
    ///
    /// 子环为两次出现之间的部分（含 `at`），本环保留其余部分。
    pub fn split(&mut self, at: PointIndex) -> Option<BoundaryList> {
        let first = self.points.iter().position(|&p| p == at)?;
        let second = first + 1 + self.points[first + 1..].iter().position(|&p| p == at)?;
        let inner: Vec<_> = self.points.drain(first..second).collect();
        Some(BoundaryList::new(inner))
    }

    /// 把共享点 `at` 的另一条环拼接到本环，得到在 `at` 处捏合的单一环
    pub fn merge(&mut self, other: BoundaryList, at: PointIndex) -> Result<(), BoundaryList> {
        let (Some(i), Some(j)) = (
            self.points.iter().position(|&p| p == at),
            other.points.iter().position(|&p| p == at),
        ) else {
            return Err(other);
        };
        let rotated = other.points[j..].iter().chain(&other.points[..j]).copied();
        let tail = self.points.split_off(i);
        self.points.extend(rotated);
        self.points.extend(tail);
        Ok(())
    }

    /// 平面有向面积（逆时针为正）
    pub fn signed_area<T: TinAccess>(&self, tin: &T) -> f64 {
        let pts: Vec<DVec3> = self.points.iter().map(|&p| tin.point(p)).collect();
        crate::volume::polygon_area(&pts)
    }

    /// 环上的前一点和后一点
    fn around(&self, i: usize) -> (PointIndex, PointIndex) {
        let n = self.points.len();
        (self.points[(i + n - 1) % n], self.points[(i + 1) % n])
    }
}

// ============================================================================
// BoundaryScope
// ============================================================================

/// 持有计数表的边界作用域，析构时释放所有环上的点
pub struct BoundaryScope<'u> {
    usage: &'u mut PointUsage,
    lists: Vec<BoundaryList>,
}

impl BoundaryScope<'_> {
    /// 加入一条环
    pub fn add(&mut self, list: BoundaryList) -> usize {
        for &p in list.points() {
            self.usage.acquire(p);
        }
        self.lists.push(list);
        self.lists.len() - 1
    }

    /// 当前所有环
    pub fn lists(&self) -> &[BoundaryList] {
        &self.lists
    }

    /// 计数表
    pub fn usage(&self) -> &PointUsage {
        self.usage
    }

    /// 反复拆分自接触的环，返回拆分次数
    pub fn split_self_touching(&mut self) -> usize {
        let mut splits = 0;
        let mut i = 0;
        while i < self.lists.len() {
            match self.lists[i].needs_split(self.usage) {
                Some(at) => {
                    if let Some(part) = self.lists[i].split(at) {
                        // 拆分前后每个点的出现总次数不变
                        self.lists.push(part);
                        splits += 1;
                    } else {
                        i += 1;
                    }
                }
                None => i += 1,
            }
        }
        splits
    }

    /// 按有向面积分类：面积最大的正向环以及其它正向环为外边界，负向环为岛屿
    pub fn classify<T: TinAccess>(&mut self, tin: &T) {
        for list in &mut self.lists {
            let location = if list.signed_area(tin) > 0.0 {
                Location::Outer
            } else {
                Location::Inner
            };
            list.set_location(location);
        }
    }

    /// 合并共享顶点的外边界，返回合并次数
    pub fn merge_outer(&mut self) -> usize {
        let mut merges = 0;
        'outer: loop {
            for i in 0..self.lists.len() {
                for j in i + 1..self.lists.len() {
                    if self.lists[i].location() != Location::Outer
                        || self.lists[j].location() != Location::Outer
                    {
                        continue;
                    }
                    let shared = self.lists[j]
                        .points()
                        .iter()
                        .copied()
                        .find(|&p| self.lists[i].contains(p));
                    if let Some(at) = shared {
                        let other = self.lists.remove(j);
                        if let Err(other) = self.lists[i].merge(other, at) {
                            self.lists.insert(j, other);
                            continue;
                        }
                        merges += 1;
                        continue 'outer;
                    }
                }
            }
            return merges;
        }
    }

    /// 取出所有环（计数仍在作用域结束时释放）
    pub fn to_lists(&self) -> Vec<BoundaryList> {
        self.lists.clone()
    }
}

impl Drop for BoundaryScope<'_> {
    fn drop(&mut self) {
        for list in &self.lists {
            for &p in list.points() {
                self.usage.release(p);
            }
        }
    }
}

// ============================================================================
// 环的提取与水面多边形
// ============================================================================

/// 由湿三角形集合提取有向边界环（区域在左侧）
pub fn trace_rings<T: TinAccess>(
    tin: &T,
    wet: &BTreeSet<TriangleIndex>,
) -> DrainageResult<Vec<BoundaryList>> {
    let mut out: BTreeMap<PointIndex, Vec<PointIndex>> = BTreeMap::new();
    let mut n_edges = 0usize;
    for &t in wet {
        let v = tin.triangle(t);
        for i in 0..3 {
            let (a, b) = (v[i], v[(i + 1) % 3]);
            let across = tin.triangle_with_edge(b, a);
            if across.map_or(true, |o| !wet.contains(&o)) {
                out.entry(a).or_default().push(b);
                n_edges += 1;
            }
        }
    }

    let mut rings = Vec::new();
    let mut walked = 0usize;
    loop {
        let Some(start) = out.iter().find(|(_, v)| !v.is_empty()).map(|(&k, _)| k) else {
            break;
        };
        let mut ring = vec![start];
        let mut cur = pop_edge(&mut out, start)?;
        walked += 1;
        while cur != start {
            ring.push(cur);
            cur = pop_edge(&mut out, cur)?;
            walked += 1;
            if walked > n_edges {
                return Err(DrainageError::degenerate("边界环无法闭合"));
            }
        }
        rings.push(BoundaryList::new(ring));
    }
    Ok(rings)
}

fn pop_edge(
    out: &mut BTreeMap<PointIndex, Vec<PointIndex>>,
    from: PointIndex,
) -> DrainageResult<PointIndex> {
    out.get_mut(&from)
        .and_then(Vec::pop)
        .ok_or_else(|| DrainageError::degenerate(format!("边界在点 {from} 处断开")))
}

/// 水位 `level` 下一条边界环对应的水面多边形（闭合，z 为水位）
///
/// `owned` 判断点是否已淹没。环上未淹没的点沿区域一侧（顺时针从前一点到后一点）
/// 向淹没邻点插值出水线；环上已淹没的点（凸包处）直接输出。
pub fn ring_polygon<T, F>(
    tin: &T,
    ring: &BoundaryList,
    level: f64,
    owned: F,
) -> DrainageResult<Vec<DVec3>>
where
    T: TinAccess,
    F: Fn(PointIndex) -> bool,
{
    let mut poly: Vec<DVec3> = Vec::new();
    let mut push = |q: DVec3| {
        if poly.last().map_or(true, |l: &DVec3| l.distance_squared(q) > 1e-24) {
            poly.push(q);
        }
    };

    for (i, &o) in ring.points().iter().enumerate() {
        let po = tin.point(o);
        if owned(o) {
            push(DVec3::new(po.x, po.y, level));
            continue;
        }
        let (prev, next) = ring.around(i);
        let guard = tin.neighbors(o).len() + 1;
        let mut n = prev;
        let mut steps = 0;
        loop {
            let at_end = n == next;
            let include = if n == prev || at_end { owned(n) && ring.len() > 1 } else { owned(n) };
            if include {
                push(waterline(po, tin.point(n), level));
            }
            if at_end {
                break;
            }
            n = tin
                .next_clockwise(o, n)
                .ok_or_else(|| DrainageError::degenerate(format!("点 {o} 的扇形在凸包处断开")))?;
            steps += 1;
            if steps > guard {
                return Err(DrainageError::degenerate(format!("点 {o} 的扇形遍历未结束")));
            }
        }
    }

    if poly.len() > 1 && poly[0].distance_squared(poly[poly.len() - 1]) <= 1e-24 {
        poly.pop();
    }
    if let Some(&first) = poly.first() {
        poly.push(first);
    }
    Ok(poly)
}

/// 从干点 `dry` 到湿点 `wet` 的边上水位为 `level` 的位置
fn waterline(dry: DVec3, wet: DVec3, level: f64) -> DVec3 {
    let drop = dry.z - wet.z;
    let t = if drop > 0.0 {
        ((dry.z - level) / drop).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let q = dry + (wet - dry) * t;
    DVec3::new(q.x, q.y, level)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dt_tin::TinSurface;

    #[test]
    fn test_split_and_usage() {
        let mut usage = PointUsage::new();
        {
            let mut scope = usage.scope();
            // 8 字形：在点 5 处捏合
            scope.add(BoundaryList::new(vec![1, 2, 5, 3, 4, 5, 6]));
            assert_eq!(scope.usage().count(5), 2);
            assert_eq!(scope.lists()[0].needs_split(scope.usage()), Some(5));
            assert_eq!(scope.split_self_touching(), 1);
            let lists = scope.to_lists();
            assert_eq!(lists.len(), 2);
            assert_eq!(lists[0].points(), &[1, 2, 5, 6]);
            assert_eq!(lists[1].points(), &[5, 3, 4]);
            assert!(lists.iter().all(|l| l.needs_split(scope.usage()).is_none()));
        }
        assert!(usage.is_clear());
    }

    #[test]
    fn test_shared_point_is_not_split() {
        let mut usage = PointUsage::new();
        let mut scope = usage.scope();
        scope.add(BoundaryList::new(vec![1, 2, 3]));
        scope.add(BoundaryList::new(vec![3, 4, 5]));
        assert_eq!(scope.usage().count(3), 2);
        assert_eq!(scope.split_self_touching(), 0);
    }

    #[test]
    fn test_merge_is_inverse_of_split() {
        let mut a = BoundaryList::new(vec![1, 2, 5, 6]);
        let b = BoundaryList::new(vec![3, 4, 5]);
        a.merge(b, 5).unwrap();
        assert_eq!(a.points(), &[1, 2, 5, 3, 4, 5, 6]);
        let part = a.split(5).unwrap();
        assert_eq!(a.points(), &[1, 2, 5, 6]);
        assert_eq!(part.points(), &[5, 3, 4]);
        assert!(a.merge(BoundaryList::new(vec![7, 8]), 5).is_err());
    }

    #[test]
    fn test_trace_rings_single_triangle() {
        let tin = TinSurface::from_grid(2, 2, 1.0, 1.0, |_, _| 0.0).unwrap();
        let wet: BTreeSet<_> = [0].into_iter().collect();
        let rings = trace_rings(&tin, &wet).unwrap();
        assert_eq!(rings.len(), 1);
        assert_eq!(rings[0].len(), 3);
        assert!(rings[0].signed_area(&tin) > 0.0);
    }

    #[test]
    fn test_trace_rings_with_island() {
        // 5x5 网格，去掉中心点周围的三角形后形成带岛的环带
        let tin = TinSurface::from_grid(5, 5, 1.0, 1.0, |_, _| 0.0).unwrap();
        let center = 12;
        let inner: BTreeSet<_> = tin.incident_triangles(center).into_iter().collect();
        let wet: BTreeSet<_> = (0..tin.n_triangles() as u32)
            .filter(|t| !inner.contains(t))
            .collect();
        let rings = trace_rings(&tin, &wet).unwrap();
        assert_eq!(rings.len(), 2);
        let mut usage = PointUsage::new();
        let mut scope = usage.scope();
        for r in rings {
            scope.add(r);
        }
        scope.classify(&tin);
        let outer = scope.lists().iter().filter(|l| l.location() == Location::Outer).count();
        let inner = scope.lists().iter().filter(|l| l.location() == Location::Inner).count();
        assert_eq!((outer, inner), (1, 1));
    }

    #[test]
    fn test_ring_polygon_interpolates_waterline() {
        // 中心凹陷 z=0，周围 z=2；水位 1 时水线在每条边中点
        let tin = TinSurface::from_grid(3, 3, 1.0, 1.0, |i, j| if (i, j) == (1, 1) { 0.0 } else { 2.0 })
            .unwrap();
        let wet: BTreeSet<_> = tin.incident_triangles(4).into_iter().collect();
        let rings = trace_rings(&tin, &wet).unwrap();
        assert_eq!(rings.len(), 1);
        let poly = ring_polygon(&tin, &rings[0], 1.0, |p| p == 4).unwrap();
        assert_eq!(poly.first(), poly.last());
        // 6 个邻点各一个水线点
        assert_eq!(poly.len(), 7);
        for q in &poly {
            assert!((q.z - 1.0).abs() < 1e-12);
            let d = (q.truncate() - glam::DVec2::new(1.0, 1.0)).length();
            assert!(d > 0.4 && d < 0.8);
        }
        assert!(crate::volume::polygon_area(&poly[..6]) > 0.0);
    }
}
