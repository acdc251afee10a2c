// crates/dt_drainage/src/analysis.rs

//! 径流分析编排器
//!
//! [`WaterAnalysis`] 持有追踪图与三个去重表（顶点节点、水塘低点、溢出口），
//! 负责：
//!
//! - 从起点播种并驱动待处理节点直到全部结束
//! - 把注入的水量沿追踪图逐级分配（广度优先工作队列）
//! - 汇总可见节点生成 [`WaterAnalysisResult`]
//!
//! 节点处理出错时错误记录在该节点上，分支结束，其余分支继续；
//! 公共操作在整张图处理完成后返回本次调用遇到的第一个错误。

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;

use dt_config::DrainageConfig;
use dt_foundation::{Arena, TraceTolerance};
use dt_tin::{PointIndex, TinAccess};

use crate::error::{DrainageError, DrainageResult};
use crate::features::{
    FeatureId, FeatureKind, FeatureStatus, FeatureTag, FeatureType, OnPoint, PondKind,
    StartPoint, Termination, TraceFeature, TracePond, TracePondExit,
};
use crate::pond_analysis::{PondAnalysis, PondSeed};
use crate::result::{ResultItem, WaterAnalysisResult, WaterBalance};

/// 水量分配中视为零的阈值
const VOLUME_EPSILON: f64 = 1e-12;

/// 地表径流分析
pub struct WaterAnalysis<'a, T: TinAccess> {
    tin: &'a T,
    config: DrainageConfig,
    tol: TraceTolerance,
    features: Arena<TraceFeature, FeatureTag>,
    roots: Vec<FeatureId>,
    on_points: HashMap<PointIndex, FeatureId>,
    pond_low_points: HashMap<PointIndex, FeatureId>,
    pond_exits: HashMap<PointIndex, FeatureId>,
    pending: Vec<FeatureId>,
    feature_limit: usize,
    hull_exits: bool,
    for_water: bool,
    injected: f64,
    call_error: Option<DrainageError>,
}

impl<T: TinAccess> Clone for WaterAnalysis<'_, T> {
    fn clone(&self) -> Self {
        Self {
            tin: self.tin,
            config: self.config.clone(),
            tol: self.tol,
            features: self.features.clone(),
            roots: self.roots.clone(),
            on_points: self.on_points.clone(),
            pond_low_points: self.pond_low_points.clone(),
            pond_exits: self.pond_exits.clone(),
            pending: self.pending.clone(),
            feature_limit: self.feature_limit,
            hull_exits: self.hull_exits,
            for_water: self.for_water,
            injected: self.injected,
            call_error: self.call_error.clone(),
        }
    }
}

impl<T: TinAccess> fmt::Debug for WaterAnalysis<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WaterAnalysis")
            .field("features", &self.features.len())
            .field("roots", &self.roots)
            .field("for_water", &self.for_water)
            .field("injected", &self.injected)
            .finish_non_exhaustive()
    }
}

impl<'a, T: TinAccess> WaterAnalysis<'a, T> {
    // =========================================================================
    // 构造
    // =========================================================================

    /// 使用默认配置创建
    pub fn new(tin: &'a T) -> Self {
        Self::build(tin, DrainageConfig::default())
    }

    /// 使用指定配置创建
    pub fn with_config(tin: &'a T, config: DrainageConfig) -> DrainageResult<Self> {
        config.validate()?;
        Ok(Self::build(tin, config))
    }

    /// 替换几何容差
    pub fn with_tolerance(mut self, tol: TraceTolerance) -> Self {
        self.tol = tol;
        self
    }

    fn build(tin: &'a T, config: DrainageConfig) -> Self {
        let feature_limit = config.feature_limit(tin.n_points());
        Self {
            tin,
            config,
            tol: TraceTolerance::default(),
            features: Arena::new(),
            roots: Vec::new(),
            on_points: HashMap::new(),
            pond_low_points: HashMap::new(),
            pond_exits: HashMap::new(),
            pending: Vec::new(),
            feature_limit,
            hull_exits: tin.has_interior_points(),
            for_water: false,
            injected: 0.0,
            call_error: None,
        }
    }

    // =========================================================================
    // 访问器
    // =========================================================================

    /// 三角网
    pub fn tin(&self) -> &'a T {
        self.tin
    }

    /// 配置
    pub fn config(&self) -> &DrainageConfig {
        &self.config
    }

    /// 几何容差
    pub fn tolerance(&self) -> &TraceTolerance {
        &self.tol
    }

    /// 节点
    pub fn feature(&self, id: FeatureId) -> Option<&TraceFeature> {
        self.features.get(id)
    }

    /// 全部节点（按创建顺序）
    pub fn features(&self) -> impl ExactSizeIterator<Item = (FeatureId, &TraceFeature)> + '_ {
        self.features.iter()
    }

    /// 节点数
    pub fn n_features(&self) -> usize {
        self.features.len()
    }

    /// 各次调用创建的起点
    pub fn roots(&self) -> &[FeatureId] {
        &self.roots
    }

    /// 是否已注入过水量
    pub fn is_water_mode(&self) -> bool {
        self.for_water
    }

    /// 累计注入水量
    pub fn injected_volume(&self) -> f64 {
        self.injected
    }

    /// 所有记录了错误的节点
    pub fn errors(&self) -> Vec<(FeatureId, &DrainageError)> {
        self.features
            .iter()
            .filter_map(|(id, f)| f.error().map(|e| (id, e)))
            .collect()
    }

    // =========================================================================
    // 去重表
    // =========================================================================

    /// 顶点上已有的追踪节点
    pub fn find_existing_on_point(&self, p: PointIndex) -> Option<FeatureId> {
        self.on_points.get(&p).copied()
    }

    /// 以该点为低点的水塘
    pub fn find_pond_low_point(&self, p: PointIndex) -> Option<FeatureId> {
        self.pond_low_points.get(&p).copied()
    }

    /// 该点上的溢出口
    pub fn find_pond_exit(&self, p: PointIndex) -> Option<FeatureId> {
        self.pond_exits.get(&p).copied()
    }

    pub(crate) fn register_low_point(&mut self, p: PointIndex, pond: FeatureId) {
        self.pond_low_points.entry(p).or_insert(pond);
    }

    pub(crate) fn register_exit(&mut self, p: PointIndex, exit: FeatureId) {
        self.pond_exits.insert(p, exit);
    }

    // =========================================================================
    // 公共操作
    // =========================================================================

    /// 从 `(x, y)` 追踪水流，直到所有分支结束
    pub fn do_trace(&mut self, x: f64, y: f64) -> DrainageResult<()> {
        self.call_error = None;
        let root = self.seed(x, y)?;
        self.run_pending();
        tracing::debug!(
            "追踪完成: 起点 {} ({}, {}), 共 {} 个节点",
            root,
            x,
            y,
            self.features.len()
        );
        self.finish_call()
    }

    /// 在 `(x, y)` 注入 `volume` 水量并分配到下游
    pub fn add_water_volume(&mut self, x: f64, y: f64, volume: f64) -> DrainageResult<()> {
        if !volume.is_finite() || volume < 0.0 {
            return Err(DrainageError::InvalidVolume { volume });
        }
        self.call_error = None;
        self.for_water = true;
        let root = self.seed(x, y)?;
        self.run_pending();

        let seeded = self.features[root].termination() != Some(Termination::Error);
        if seeded && volume > 0.0 {
            self.injected += volume;
            if let Err(err) = self.route_volume(root, volume) {
                self.note_error(err);
            }
        }
        tracing::debug!(
            "注水完成: ({}, {}) 体积 {:.4}, 共 {} 个节点",
            x,
            y,
            volume,
            self.features.len()
        );
        self.finish_call()
    }

    /// 汇总可见节点的结果
    ///
    /// 追踪模式下不含被合并水塘隐藏的节点；注水后包含全部节点。
    pub fn get_result(&self) -> WaterAnalysisResult {
        let mut items = Vec::new();
        for (id, feature) in self.features.iter() {
            if self.is_visible(feature) {
                feature.add_result(id, self.for_water, &mut items);
            }
        }
        if self.tin.is_inverted() {
            items.iter_mut().for_each(ResultItem::flip_elevation);
        }
        let balance = self
            .config
            .water_volume_result
            .then(|| self.water_balance());
        WaterAnalysisResult::new(items, balance)
    }

    pub(crate) fn is_visible(&self, feature: &TraceFeature) -> bool {
        feature.is_finished() && (self.for_water || !feature.is_hidden())
    }

    /// 水量收支
    pub fn water_balance(&self) -> WaterBalance {
        let mut balance = WaterBalance {
            injected: self.injected,
            ..Default::default()
        };
        for (_, f) in self.features.iter() {
            let retained = f.retained_volume();
            if retained <= 0.0 {
                continue;
            }
            match (f.feature_type(), f.termination()) {
                (FeatureType::Pond, _) => balance.stored += retained,
                (_, Some(Termination::Exit)) => balance.exited += retained,
                _ => balance.unrouted += retained,
            }
        }
        balance
    }

    /// 检查所有交叉引用都指向存在的节点
    pub fn validate_graph(&self) -> DrainageResult<()> {
        for (id, f) in self.features.iter() {
            if let Some(bad) = f.references().into_iter().find(|r| !self.features.contains(*r)) {
                return Err(DrainageError::degenerate(format!(
                    "节点 {id} 引用了不存在的节点 {bad}"
                )));
            }
        }
        Ok(())
    }

    // =========================================================================
    // 驱动
    // =========================================================================

    fn seed(&mut self, x: f64, y: f64) -> DrainageResult<FeatureId> {
        let id = self.push_feature(None, FeatureKind::StartPoint(StartPoint::new(x, y)))?;
        self.roots.push(id);
        Ok(id)
    }

    fn finish_call(&mut self) -> DrainageResult<()> {
        match self.call_error.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// 处理待处理栈直到为空
    pub(crate) fn run_pending(&mut self) {
        while let Some(id) = self.pending.pop() {
            if self.features[id].is_finished() {
                continue;
            }
            if let Err(err) = self.process(id) {
                self.set_error(id, err);
                continue;
            }
            if !self.features[id].is_finished() {
                self.pending.push(id);
            }
        }
    }

    fn process(&mut self, id: FeatureId) -> DrainageResult<()> {
        let ty = self.features[id].feature_type();
        match ty {
            FeatureType::StartPoint => self.process_start_point(id),
            FeatureType::InTriangle => self.process_in_triangle(id),
            FeatureType::OnEdge => self.process_on_edge(id),
            FeatureType::OnPoint => self.process_on_point(id),
            FeatureType::Pond => self.process_pond(id),
            FeatureType::PondExit => self.process_pond_exit(id, false),
        }
    }

    fn push_feature(
        &mut self,
        parent: Option<FeatureId>,
        kind: FeatureKind,
    ) -> DrainageResult<FeatureId> {
        if self.features.len() >= self.feature_limit {
            return Err(DrainageError::degenerate(format!(
                "追踪节点数超过上限 {}",
                self.feature_limit
            )));
        }
        let id = self.features.push(TraceFeature::new(parent, kind));
        self.pending.push(id);
        Ok(id)
    }

    /// 创建子节点并放入待处理栈
    pub(crate) fn add_child(
        &mut self,
        parent: FeatureId,
        kind: FeatureKind,
    ) -> DrainageResult<FeatureId> {
        let id = self.push_feature(Some(parent), kind)?;
        self.features[parent].state.children.push(id);
        Ok(id)
    }

    /// 把已有节点挂到 `parent` 下，拒绝形成环路的连接
    pub(crate) fn link_child(&mut self, parent: FeatureId, child: FeatureId) -> DrainageResult<()> {
        if parent == child || self.reaches(child, parent) {
            return Err(DrainageError::degenerate(format!(
                "连接 {parent} -> {child} 会形成环路"
            )));
        }
        let children = &mut self.features[parent].state.children;
        if !children.contains(&child) {
            children.push(child);
        }
        Ok(())
    }

    /// 沿子节点，`from` 是否能到达 `to`
    pub(crate) fn reaches(&self, from: FeatureId, to: FeatureId) -> bool {
        let mut stack = vec![from];
        let mut seen = HashSet::new();
        while let Some(f) = stack.pop() {
            if f == to {
                return true;
            }
            if !seen.insert(f) {
                continue;
            }
            stack.extend_from_slice(self.features[f].children());
        }
        false
    }

    pub(crate) fn finish(&mut self, id: FeatureId, termination: Termination) {
        self.features[id].state.status = FeatureStatus::Finished(termination);
    }

    /// 记录错误并结束节点
    pub(crate) fn set_error(&mut self, id: FeatureId, err: DrainageError) {
        tracing::warn!("追踪节点 {} ({}) 出错: {}", id, self.features[id].label(), err);
        self.finish(id, Termination::Error);
        self.record_error(id, err);
    }

    /// 记录错误但不改变节点状态
    pub(crate) fn record_error(&mut self, id: FeatureId, err: DrainageError) {
        self.features[id].state.error = Some(err.clone());
        self.note_error(err);
    }

    fn note_error(&mut self, err: DrainageError) {
        if self.call_error.is_none() {
            self.call_error = Some(err);
        }
    }

    // =========================================================================
    // 节点工厂
    // =========================================================================

    /// 顶点上的追踪节点，已存在时直接连接
    pub(crate) fn get_or_create_on_point(
        &mut self,
        parent: FeatureId,
        p: PointIndex,
        last_angle: Option<f64>,
    ) -> DrainageResult<FeatureId> {
        if let Some(existing) = self.find_existing_on_point(p) {
            self.link_child(parent, existing)?;
            return Ok(existing);
        }
        let kind = FeatureKind::OnPoint(OnPoint::new(p, self.tin.point(p), last_angle));
        let id = self.add_child(parent, kind)?;
        self.on_points.insert(p, id);
        Ok(id)
    }

    /// 以 `seed` 为种子的水塘，任一种子点已属于某个水塘时直接连接
    pub(crate) fn get_or_create_pond(
        &mut self,
        parent: FeatureId,
        seed: PondSeed,
        kind: PondKind,
    ) -> DrainageResult<FeatureId> {
        let points = seed.points();
        if let Some(existing) = points.iter().find_map(|&p| self.find_pond_low_point(p)) {
            self.link_child(parent, existing)?;
            return Ok(existing);
        }
        let analysis = self.new_pond_analysis(seed);
        let id = self.add_child(parent, FeatureKind::Pond(TracePond::new(kind, analysis)))?;
        for p in points {
            self.register_low_point(p, id);
        }
        Ok(id)
    }

    pub(crate) fn pond(&self, id: FeatureId) -> DrainageResult<&TracePond> {
        self.features
            .get(id)
            .and_then(TraceFeature::as_pond)
            .ok_or_else(|| DrainageError::degenerate(format!("节点 {id} 不是水塘")))
    }

    pub(crate) fn pond_mut(&mut self, id: FeatureId) -> DrainageResult<&mut TracePond> {
        self.features
            .get_mut(id)
            .and_then(TraceFeature::as_pond_mut)
            .ok_or_else(|| DrainageError::degenerate(format!("节点 {id} 不是水塘")))
    }

    pub(crate) fn pond_exit(&self, id: FeatureId) -> DrainageResult<&TracePondExit> {
        self.features
            .get(id)
            .and_then(TraceFeature::as_pond_exit)
            .ok_or_else(|| DrainageError::degenerate(format!("节点 {id} 不是溢出口")))
    }

    pub(crate) fn pond_exit_mut(&mut self, id: FeatureId) -> DrainageResult<&mut TracePondExit> {
        self.features
            .get_mut(id)
            .and_then(TraceFeature::as_pond_exit_mut)
            .ok_or_else(|| DrainageError::degenerate(format!("节点 {id} 不是溢出口")))
    }

    pub(crate) fn feature_mut(&mut self, id: FeatureId) -> &mut TraceFeature {
        &mut self.features[id]
    }

    pub(crate) fn tol(&self) -> TraceTolerance {
        self.tol
    }

    /// 凸包是否为出水口（三角网至少有一个内部点）
    pub(crate) fn hull_exits(&self) -> bool {
        self.hull_exits
    }

    pub(crate) fn new_pond_analysis(&self, seed: PondSeed) -> PondAnalysis {
        PondAnalysis::new(seed, &self.config, self.tol).with_hull_exits(self.hull_exits)
    }

    /// 从 `start` 向下游（不穿过水塘）能到达的水塘；第二项表示是否有分支离开三角网或未结束
    pub(crate) fn downstream_ponds(&self, start: &[FeatureId]) -> (Vec<FeatureId>, bool) {
        let mut ponds = Vec::new();
        let mut open = false;
        let mut stack = start.to_vec();
        let mut seen = HashSet::new();
        while let Some(f) = stack.pop() {
            if !seen.insert(f) {
                continue;
            }
            let feature = &self.features[f];
            match feature.feature_type() {
                FeatureType::Pond => {
                    if !ponds.contains(&f) {
                        ponds.push(f);
                    }
                }
                FeatureType::PondExit => open = true,
                _ => {
                    match feature.termination() {
                        Some(Termination::Continued) => {}
                        _ => open = true,
                    }
                    stack.extend_from_slice(feature.children());
                }
            }
        }
        (ponds, open)
    }

    // =========================================================================
    // 水量分配
    // =========================================================================

    fn route_volume(&mut self, start: FeatureId, volume: f64) -> DrainageResult<()> {
        let limit = self.feature_limit.saturating_mul(16).max(1024);
        let mut queue = VecDeque::from([(start, volume)]);
        let mut work = 0usize;
        while let Some((id, v)) = queue.pop_front() {
            work += 1;
            if work > limit {
                // 剩余水量留在当前节点，计入未分配
                self.features[id].state.received_volume += v;
                for (rest, rv) in queue.drain(..) {
                    self.features[rest].state.received_volume += rv;
                }
                return Err(DrainageError::degenerate("水量分配未在上限内结束"));
            }
            let out = self.process_water_volume(id, v);
            queue.extend(out.into_iter().filter(|&(_, x)| x > 0.0));
        }
        Ok(())
    }

    /// 节点接收水量，返回转交给下游的部分
    fn process_water_volume(&mut self, id: FeatureId, v: f64) -> Vec<(FeatureId, f64)> {
        self.features[id].state.received_volume += v;
        let ty = self.features[id].feature_type();
        let routed = match ty {
            FeatureType::Pond => self.pond_water_volume(id, v),
            FeatureType::PondExit => self.exit_water_volume(id, v),
            _ => Ok(self.default_water_volume(id, v)),
        };
        let out = match routed {
            Ok(out) => out,
            Err(err) => {
                self.record_error(id, err);
                Vec::new()
            }
        };
        let sent: f64 = out.iter().map(|&(_, x)| x).sum();
        self.features[id].state.forwarded_volume += sent;
        out
    }

    fn default_water_volume(&self, id: FeatureId, v: f64) -> Vec<(FeatureId, f64)> {
        let feature = &self.features[id];
        match feature.termination() {
            Some(Termination::Continued) => split_evenly(feature.children(), v),
            _ => Vec::new(),
        }
    }
}

/// 把水量平均分给各目标，末项吸收舍入误差
pub(crate) fn split_evenly(targets: &[FeatureId], v: f64) -> Vec<(FeatureId, f64)> {
    if targets.is_empty() || v <= VOLUME_EPSILON {
        return Vec::new();
    }
    let n = targets.len();
    let share = v / n as f64;
    targets
        .iter()
        .enumerate()
        .map(|(i, &t)| {
            let amount = if i + 1 == n {
                v - share * (n - 1) as f64
            } else {
                share
            };
            (t, amount)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use dt_foundation::Idx;
    use dt_tin::TinSurface;

    fn plane() -> TinSurface {
        TinSurface::from_grid(4, 4, 1.0, 1.0, |i, _| i as f64).unwrap()
    }

    fn bowl() -> TinSurface {
        TinSurface::from_grid(5, 5, 1.0, 1.0, |i, j| {
            let (dx, dy) = (i as f64 - 2.0, j as f64 - 2.0);
            dx * dx + dy * dy
        })
        .unwrap()
    }

    #[test]
    fn test_split_evenly_conserves() {
        let targets: Vec<FeatureId> = (0..3).map(Idx::new).collect();
        let out = split_evenly(&targets, 1.0);
        let total: f64 = out.iter().map(|(_, v)| v).sum();
        assert_eq!(total, 1.0);
        assert!(split_evenly(&[], 1.0).is_empty());
    }

    #[test]
    fn test_invalid_seed_is_reported() {
        let tin = plane();
        let mut wa = WaterAnalysis::new(&tin);
        let err = wa.do_trace(-5.0, 1.0).unwrap_err();
        assert_eq!(err, DrainageError::InvalidSeed { x: -5.0, y: 1.0 });
        assert_eq!(wa.roots().len(), 1);
        let root = wa.feature(wa.roots()[0]).unwrap();
        assert_eq!(root.termination(), Some(Termination::Error));
    }

    #[test]
    fn test_negative_volume_rejected() {
        let tin = plane();
        let mut wa = WaterAnalysis::new(&tin);
        assert!(matches!(
            wa.add_water_volume(1.5, 1.5, -1.0),
            Err(DrainageError::InvalidVolume { .. })
        ));
        assert_eq!(wa.n_features(), 0);
    }

    #[test]
    fn test_feature_limit_stops_trace() {
        // 起点、(1,1)、中心低点、水塘，至少需要四个节点
        let tin = bowl();
        let config = DrainageConfig {
            max_features: 3,
            ..Default::default()
        };
        let mut wa = WaterAnalysis::with_config(&tin, config).unwrap();
        let err = wa.do_trace(1.0, 1.0).unwrap_err();
        assert!(matches!(err, DrainageError::GeometryDegenerate { .. }));
        assert!(wa.n_features() <= 3);
        assert!(wa.find_pond_low_point(12).is_none());
        assert!(wa.features().all(|(_, f)| f.is_finished()));
    }

    #[test]
    fn test_result_carries_balance_when_requested() {
        let tin = bowl();
        let mut wa = WaterAnalysis::new(&tin);
        wa.add_water_volume(0.5, 0.5, 1.0).unwrap();
        assert!(wa.get_result().balance().is_none());

        let config = DrainageConfig {
            water_volume_result: true,
            ..Default::default()
        };
        let mut wa = WaterAnalysis::with_config(&tin, config).unwrap();
        wa.add_water_volume(0.5, 0.5, 1.0).unwrap();
        let result = wa.get_result();
        let balance = result.balance().copied().unwrap();
        assert_eq!(balance, wa.water_balance());
        assert!((balance.injected - 1.0).abs() < 1e-9);
        assert!((balance.stored - 1.0).abs() < 1e-6);
        assert!(balance.residual().abs() < 1e-9);
    }

    #[test]
    fn test_hull_point_is_exit() {
        // 沿 y = 0 边缘下降的谷底，最低点在凸包上
        let tin = TinSurface::from_grid(5, 5, 1.0, 1.0, |i, j| 2.0 * (i as f64 - 2.0).abs() + j as f64)
            .unwrap();
        let mut wa = WaterAnalysis::new(&tin);
        wa.add_water_volume(2.2, 3.5, 100.0).unwrap();

        let on_floor = wa.find_existing_on_point(2).unwrap();
        assert_eq!(wa.feature(on_floor).unwrap().termination(), Some(Termination::Exit));
        assert!(wa.features().all(|(_, f)| f.feature_type() != FeatureType::Pond));
        let balance = wa.water_balance();
        assert!((balance.exited - 100.0).abs() < 1e-9);
        assert_eq!(balance.stored, 0.0);
    }

    #[test]
    fn test_plane_trace_leaves_surface() {
        let tin = plane();
        let mut wa = WaterAnalysis::new(&tin);
        wa.do_trace(2.5, 1.25).unwrap();
        let exits = wa
            .features()
            .filter(|(_, f)| f.termination() == Some(Termination::Exit))
            .count();
        assert_eq!(exits, 1);
        wa.validate_graph().unwrap();
    }
}
