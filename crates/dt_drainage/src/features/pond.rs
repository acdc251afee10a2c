// crates/dt_drainage/src/features/pond.rs

//! 水塘节点
//!
//! 处理时用 [`PondAnalysis`] 求出溢出高程与溢出口，为每个溢出口创建
//! （或复用）[`TracePondExit`]。若所有溢出口都已存在，则检查这些溢出口
//! 是否只流回同一组水塘：是则这组水塘构成死复合体，在溢出口处生成
//! 合并水塘并隐藏各成员。
//!
//! 注水时水塘先蓄到容量，超出部分平均分给各溢出口。

use std::collections::{HashSet, VecDeque};

use dt_tin::TinAccess;
use glam::DVec3;

use crate::analysis::{split_evenly, WaterAnalysis};
use crate::error::DrainageResult;
use crate::pond_analysis::{PondAnalysis, PondExtent, PondSeed};
use crate::result::{PointKind, ResultItem};

use super::{FeatureId, FeatureKind, Termination, TraceFeature, TracePondExit};

/// 水塘种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PondKind {
    /// 局部最低点
    LowPoint,
    /// 水平边
    Edge,
    /// 水平三角形
    Triangle,
    /// 由死溢出口合并的多个水塘
    FromPondExit,
}

impl PondKind {
    /// 名称
    pub fn label(&self) -> &'static str {
        match self {
            PondKind::LowPoint => "PondLowPoint",
            PondKind::Edge => "PondEdge",
            PondKind::Triangle => "PondTriangle",
            PondKind::FromPondExit => "PondFromPondExit",
        }
    }
}

/// 水塘
#[derive(Debug, Clone)]
pub struct TracePond {
    kind: PondKind,
    pub(crate) analysis: PondAnalysis,
    extent: Option<PondExtent>,
    exits: Vec<FeatureId>,
    pub(crate) top_level: Option<FeatureId>,
    pub(crate) is_full: bool,
    water_level: Option<f64>,
    water_boundaries: Vec<Vec<DVec3>>,
    low_point: Option<DVec3>,
}

impl TracePond {
    pub(crate) fn new(kind: PondKind, analysis: PondAnalysis) -> Self {
        Self {
            kind,
            analysis,
            extent: None,
            exits: Vec::new(),
            top_level: None,
            is_full: false,
            water_level: None,
            water_boundaries: Vec::new(),
            low_point: None,
        }
    }

    /// 种类
    pub fn kind(&self) -> PondKind {
        self.kind
    }

    /// 水塘分析
    pub fn analysis(&self) -> &PondAnalysis {
        &self.analysis
    }

    /// 溢出范围，处理前为 `None`
    pub fn extent(&self) -> Option<&PondExtent> {
        self.extent.as_ref()
    }

    /// 溢出口节点
    pub fn exits(&self) -> &[FeatureId] {
        &self.exits
    }

    /// 合并后所属的顶层水塘
    pub fn top_level(&self) -> Option<FeatureId> {
        self.top_level
    }

    /// 溢出前可蓄的体积，封闭水塘为 `None`
    pub fn capacity(&self) -> Option<f64> {
        self.extent.as_ref().and_then(|e| e.capacity)
    }

    /// 是否封闭
    pub fn is_enclosed(&self) -> bool {
        self.extent.as_ref().map_or(false, PondExtent::is_enclosed)
    }

    /// 溢出深度
    pub fn depth(&self) -> f64 {
        self.extent.as_ref().map_or(0.0, PondExtent::depth)
    }

    /// 是否已蓄满
    pub fn is_full(&self) -> bool {
        self.is_full
    }

    /// 当前水位（注水后）
    pub fn water_level(&self) -> Option<f64> {
        self.water_level
    }

    /// 当前水面边界（注水后）
    pub fn water_boundaries(&self) -> &[Vec<DVec3>] {
        &self.water_boundaries
    }

    /// 最低点位置
    pub fn low_point(&self) -> Option<DVec3> {
        self.low_point
    }

    pub(crate) fn add_result(
        &self,
        id: FeatureId,
        feature: &TraceFeature,
        for_water: bool,
        out: &mut Vec<ResultItem>,
    ) {
        let volume = feature.retained_volume();
        if let Some(location) = self.low_point {
            out.push(ResultItem::Point {
                feature: id,
                location,
                kind: PointKind::Low,
                volume,
            });
        }
        let Some(extent) = &self.extent else {
            return;
        };
        let (boundaries, depth) = if for_water {
            match self.water_level {
                Some(level) => (self.water_boundaries.clone(), level - extent.low_z),
                None => (Vec::new(), 0.0),
            }
        } else {
            (extent.boundaries.clone(), extent.depth())
        };
        out.push(ResultItem::Pond {
            feature: id,
            boundaries,
            is_full: self.is_full,
            volume,
            depth,
        });
    }
}

impl<T: TinAccess> WaterAnalysis<'_, T> {
    pub(crate) fn process_pond(&mut self, id: FeatureId) -> DrainageResult<()> {
        let tin = self.tin();
        let (kind, extent) = {
            let pond = self.pond_mut(id)?;
            let extent = pond.analysis.find_pond(tin)?;
            pond.low_point = extent.low_points.first().map(|&p| tin.point(p));
            pond.extent = Some(extent.clone());
            (pond.kind, extent)
        };

        if kind != PondKind::FromPondExit {
            for &p in &extent.low_points {
                self.register_low_point(p, id);
            }
        }

        if extent.is_enclosed() {
            tracing::debug!(
                "封闭水塘 {} ({}): 低点 {:.3}, 水位 {:.3}",
                id,
                kind.label(),
                extent.low_z,
                extent.level
            );
            self.finish(id, Termination::DeadPond);
            return Ok(());
        }

        let mut existing = Vec::new();
        let mut created = false;
        for &x in &extent.exits {
            let exit = match self.find_pond_exit(x) {
                Some(e) => {
                    self.pond_exit_mut(e)?.add_pond(id);
                    existing.push(e);
                    e
                }
                None => {
                    let position = tin.point(x);
                    let kind = FeatureKind::PondExit(TracePondExit::new(x, position, id));
                    let e = self.add_child(id, kind)?;
                    self.register_exit(x, e);
                    created = true;
                    e
                }
            };
            self.pond_mut(id)?.exits.push(exit);
        }
        tracing::debug!(
            "水塘 {} ({}): 低点 {:.3}, 溢出高程 {:.3}, {} 个溢出口",
            id,
            kind.label(),
            extent.low_z,
            extent.level,
            extent.exits.len()
        );
        self.finish(id, Termination::Continued);

        if !created && !existing.is_empty() {
            self.resolve_shared_exits(&existing)?;
        }
        Ok(())
    }

    /// 所有溢出口都已存在：计算尚未计算的溢出口，判断是否构成死复合体
    fn resolve_shared_exits(&mut self, existing: &[FeatureId]) -> DrainageResult<()> {
        let mut queue: VecDeque<FeatureId> = existing.iter().copied().collect();
        let mut seen = HashSet::new();
        while let Some(e) = queue.pop_front() {
            if !seen.insert(e) {
                continue;
            }
            if !self.pond_exit(e)?.is_calculated() {
                if let Err(err) = self.process_pond_exit(e, true) {
                    self.set_error(e, err);
                    return Ok(());
                }
                self.run_pending();
            }
            if !self.is_dead_exit(e)? {
                return Ok(());
            }
            self.pond_exit_mut(e)?.dead = true;
            let ponds = self.pond_exit(e)?.ponds().to_vec();
            for p in ponds {
                for &x in self.pond(p)?.exits() {
                    if !seen.contains(&x) {
                        queue.push_back(x);
                    }
                }
            }
        }
        match existing.first() {
            Some(&exit) => self.process_dead_pond(exit),
            None => Ok(()),
        }
    }

    /// 在死溢出口处生成合并水塘
    pub(crate) fn process_dead_pond(&mut self, exit: FeatureId) -> DrainageResult<()> {
        let ex = self.pond_exit(exit)?;
        if ex.merged().is_some() {
            return Ok(());
        }
        let point = ex.point();

        let mut members: Vec<FeatureId> = Vec::new();
        let mut queue: VecDeque<FeatureId> = ex.ponds().iter().copied().collect();
        while let Some(p) = queue.pop_front() {
            if members.contains(&p) {
                continue;
            }
            members.push(p);
            for &x in self.pond(p)?.exits() {
                let other = self.pond_exit(x)?;
                if x == exit || other.is_dead() {
                    queue.extend(other.ponds().iter().copied().filter(|q| !members.contains(q)));
                }
            }
        }

        let mut basins = Vec::new();
        for &p in &members {
            let pond = self.pond(p)?;
            // 已合并的成员由其顶层水塘代表
            if pond.top_level.map_or(false, |top| members.contains(&top)) {
                continue;
            }
            basins.extend(pond.analysis.seed().basins());
        }
        let seed = PondSeed::Exit { exit: point, basins };
        let analysis = self.new_pond_analysis(seed);
        let merged = self.add_child(
            exit,
            FeatureKind::Pond(TracePond::new(PondKind::FromPondExit, analysis)),
        )?;
        {
            let ex = self.pond_exit_mut(exit)?;
            ex.merged = Some(merged);
            ex.dead = true;
        }
        for &p in &members {
            let feature = self.feature_mut(p);
            feature.state.hidden = true;
            if let Some(pond) = feature.as_pond_mut() {
                pond.top_level = Some(merged);
            }
        }
        tracing::info!(
            "溢出口 {} 处合并 {} 个水塘为 {}",
            point,
            members.len(),
            merged
        );
        Ok(())
    }

    /// 水塘接收水量：蓄到容量，超出部分平均分给各溢出口
    pub(crate) fn pond_water_volume(
        &mut self,
        id: FeatureId,
        v: f64,
    ) -> DrainageResult<Vec<(FeatureId, f64)>> {
        let feature = self.feature_mut(id);
        let before = feature.received_volume() - v - feature.forwarded_volume();
        let failed = feature.termination() == Some(Termination::Error);
        let pond = self.pond(id)?;
        let capacity = if failed { None } else { pond.capacity() };
        let exits = pond.exits.clone();

        let (keep, overflow) = match capacity {
            Some(cap) if !exits.is_empty() => {
                let room = (cap - before).max(0.0);
                let keep = v.min(room);
                (keep, v - keep)
            }
            _ => (v, 0.0),
        };
        let stored = before + keep;
        if let Some(cap) = capacity {
            if overflow > 0.0 || stored >= cap {
                self.pond_mut(id)?.is_full = true;
            }
        }
        if !failed && stored > 0.0 {
            self.update_pond_water(id, stored);
        }
        Ok(split_evenly(&exits, overflow))
    }

    /// 按蓄水量更新水位与水面边界；几何失败只记录错误
    fn update_pond_water(&mut self, id: FeatureId, stored: f64) {
        let tin = self.tin();
        let outcome = self.pond_mut(id).and_then(|pond| {
            let fit = pond.analysis.find_boundary_for_volume(tin, stored)?;
            let boundaries = pond.analysis.get_boundary(tin)?;
            pond.water_level = Some(fit.level());
            pond.water_boundaries = boundaries;
            Ok(())
        });
        if let Err(err) = outcome {
            self.record_error(id, err);
        }
    }
}
