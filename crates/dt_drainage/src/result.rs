// crates/dt_drainage/src/result.rs

//! 分析结果
//!
//! [`WaterAnalysisResult`] 是追踪图的扁平快照：起点、低点、溢出点、
//! 水流折线和水塘边界，各项带有所属节点与水量。
//!
//! 在 [`dt_tin::Inverted`] 视图上分析时（上溯追踪），几何在输出前恢复为原地形高程，
//! `Low` 点对应山顶。

use glam::DVec3;

use crate::features::FeatureId;

/// 点的含义
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointKind {
    /// 起点
    Start,
    /// 水塘最低点（上溯追踪时为最高点）
    Low,
    /// 溢出点或离开三角网的位置
    Exit,
}

/// 结果项
#[derive(Debug, Clone, PartialEq)]
pub enum ResultItem {
    /// 特征点
    Point {
        /// 所属节点
        feature: FeatureId,
        /// 位置
        location: DVec3,
        /// 含义
        kind: PointKind,
        /// 水量
        volume: f64,
    },
    /// 水流折线
    Stream {
        /// 所属节点
        feature: FeatureId,
        /// 折线顶点
        points: Vec<DVec3>,
        /// 流过的水量
        volume: f64,
    },
    /// 水塘
    Pond {
        /// 所属节点
        feature: FeatureId,
        /// 边界环（首尾相同）
        boundaries: Vec<Vec<DVec3>>,
        /// 是否已蓄满
        is_full: bool,
        /// 蓄水体积
        volume: f64,
        /// 水深
        depth: f64,
    },
}

impl ResultItem {
    /// 所属节点
    pub fn feature(&self) -> FeatureId {
        match self {
            ResultItem::Point { feature, .. }
            | ResultItem::Stream { feature, .. }
            | ResultItem::Pond { feature, .. } => *feature,
        }
    }

    /// 水量
    pub fn volume(&self) -> f64 {
        match self {
            ResultItem::Point { volume, .. }
            | ResultItem::Stream { volume, .. }
            | ResultItem::Pond { volume, .. } => *volume,
        }
    }

    /// 折线至少两个点时输出
    pub(crate) fn push_stream(out: &mut Vec<ResultItem>, feature: FeatureId, points: &[DVec3], volume: f64) {
        if points.len() >= 2 {
            out.push(ResultItem::Stream {
                feature,
                points: points.to_vec(),
                volume,
            });
        }
    }

    /// 高程取反，把取反视图上的几何恢复为原地形
    pub(crate) fn flip_elevation(&mut self) {
        let flip = |p: &mut DVec3| p.z = -p.z;
        match self {
            ResultItem::Point { location, .. } => flip(location),
            ResultItem::Stream { points, .. } => points.iter_mut().for_each(flip),
            ResultItem::Pond { boundaries, .. } => boundaries.iter_mut().flatten().for_each(flip),
        }
    }

    pub(crate) fn push_exit(out: &mut Vec<ResultItem>, feature: FeatureId, exit: Option<DVec3>, volume: f64) {
        if let Some(location) = exit {
            out.push(ResultItem::Point {
                feature,
                location,
                kind: PointKind::Exit,
                volume,
            });
        }
    }
}

/// 水量收支
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WaterBalance {
    /// 累计注入
    pub injected: f64,
    /// 蓄在水塘中
    pub stored: f64,
    /// 流出三角网
    pub exited: f64,
    /// 因出错或中断而未能继续分配
    pub unrouted: f64,
}

impl WaterBalance {
    /// 注入与去向之差，守恒时接近零
    pub fn residual(&self) -> f64 {
        self.injected - self.stored - self.exited - self.unrouted
    }
}

/// 分析结果快照
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WaterAnalysisResult {
    items: Vec<ResultItem>,
    balance: Option<WaterBalance>,
}

impl WaterAnalysisResult {
    pub(crate) fn new(items: Vec<ResultItem>, balance: Option<WaterBalance>) -> Self {
        Self { items, balance }
    }

    /// 全部结果项
    pub fn items(&self) -> &[ResultItem] {
        &self.items
    }

    /// 结果项数
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// 水量收支（`water_volume_result` 开启时）
    pub fn balance(&self) -> Option<&WaterBalance> {
        self.balance.as_ref()
    }

    /// 指定含义的点
    pub fn points(&self, kind: PointKind) -> impl Iterator<Item = &ResultItem> + '_ {
        self.items
            .iter()
            .filter(move |item| matches!(item, ResultItem::Point { kind: k, .. } if *k == kind))
    }

    /// 水流折线
    pub fn streams(&self) -> impl Iterator<Item = &ResultItem> + '_ {
        self.items
            .iter()
            .filter(|item| matches!(item, ResultItem::Stream { .. }))
    }

    /// 水塘
    pub fn ponds(&self) -> impl Iterator<Item = &ResultItem> + '_ {
        self.items
            .iter()
            .filter(|item| matches!(item, ResultItem::Pond { .. }))
    }

    /// 水塘蓄水总量
    pub fn total_pond_volume(&self) -> f64 {
        self.ponds().map(ResultItem::volume).sum()
    }

    /// 取出结果项
    pub fn into_items(self) -> Vec<ResultItem> {
        self.items
    }
}

impl<'r> IntoIterator for &'r WaterAnalysisResult {
    type Item = &'r ResultItem;
    type IntoIter = std::slice::Iter<'r, ResultItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
