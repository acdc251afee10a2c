// crates/dt_drainage/src/features/pond_exit.rs

//! 水塘溢出口
//!
//! 溢出口按点去重，可被多个水塘共享。计算时从溢出点沿最速下降离开
//! 所属水塘的溢出范围，生成下游追踪节点；凸包上的溢出口直接离开三角网。追踪模式下，若所属水塘已
//! 深于最小深度，溢出口暂停（`Stopped`），注水时再恢复计算。
//!
//! 注水时的分配：
//!
//! - 水流离开三角网：水量留在溢出口，计为流出
//! - 死溢出口或已合并：优先分给尚未蓄满的成员水塘（若下游正好流入
//!   这些水塘，则沿下游分配，保留流路上的水量记录）；成员全满后交给合并水塘
//! - 其他：平均分给下游节点

use dt_tin::{PointIndex, TinAccess};
use glam::DVec3;

use crate::analysis::{split_evenly, WaterAnalysis};
use crate::descent::{cast_ray, direction_of, steepest_descent, RayHit, VertexDescent};
use crate::error::{DrainageError, DrainageResult};
use crate::result::{PointKind, ResultItem};

use super::{FeatureId, FeatureKind, OnEdge, Termination, TraceFeature};

/// 水塘溢出口
#[derive(Debug, Clone, PartialEq)]
pub struct TracePondExit {
    point: PointIndex,
    position: DVec3,
    ponds: Vec<FeatureId>,
    flows: Vec<FeatureId>,
    descent: Vec<DVec3>,
    pub(crate) merged: Option<FeatureId>,
    calculated: bool,
    pub(crate) dead: bool,
    pub(crate) exit: Option<DVec3>,
}

impl TracePondExit {
    pub(crate) fn new(point: PointIndex, position: DVec3, pond: FeatureId) -> Self {
        Self {
            point,
            position,
            ponds: vec![pond],
            flows: Vec::new(),
            descent: Vec::new(),
            merged: None,
            calculated: false,
            dead: false,
            exit: None,
        }
    }

    pub(crate) fn add_pond(&mut self, pond: FeatureId) {
        if !self.ponds.contains(&pond) {
            self.ponds.push(pond);
        }
    }

    /// 溢出点
    pub fn point(&self) -> PointIndex {
        self.point
    }

    /// 溢出点位置
    pub fn position(&self) -> DVec3 {
        self.position
    }

    /// 共享此溢出口的水塘
    pub fn ponds(&self) -> &[FeatureId] {
        &self.ponds
    }

    /// 下游追踪节点
    pub fn flows(&self) -> &[FeatureId] {
        &self.flows
    }

    /// 离开水塘的第一段下降
    pub fn descent(&self) -> &[DVec3] {
        &self.descent
    }

    /// 在此处生成的合并水塘
    pub fn merged(&self) -> Option<FeatureId> {
        self.merged
    }

    /// 是否已计算下游
    pub fn is_calculated(&self) -> bool {
        self.calculated
    }

    /// 是否为死溢出口（下游只流回共享它的水塘）
    pub fn is_dead(&self) -> bool {
        self.dead
    }

    pub(crate) fn add_result(&self, id: FeatureId, feature: &TraceFeature, out: &mut Vec<ResultItem>) {
        out.push(ResultItem::Point {
            feature: id,
            location: self.position,
            kind: PointKind::Exit,
            volume: feature.received_volume(),
        });
        ResultItem::push_stream(out, id, &self.descent, feature.received_volume());
        ResultItem::push_exit(out, id, self.exit, feature.retained_volume());
    }
}

impl<T: TinAccess> WaterAnalysis<'_, T> {
    /// 计算溢出口下游；`force` 为假时所属水塘够深则暂停
    pub(crate) fn process_pond_exit(&mut self, id: FeatureId, force: bool) -> DrainageResult<()> {
        let ex = self.pond_exit(id)?.clone();
        if ex.calculated {
            let termination = if ex.exit.is_some() {
                Termination::Exit
            } else {
                Termination::Continued
            };
            self.finish(id, termination);
            return Ok(());
        }
        if !force {
            let min_depth = self.config().minimum_depth;
            let mut deep = false;
            for &p in &ex.ponds {
                if self.pond(p)?.depth() > min_depth {
                    deep = true;
                    break;
                }
            }
            if deep {
                tracing::debug!("溢出口 {} 所在水塘深于 {}，暂停", ex.point, min_depth);
                self.finish(id, Termination::Stopped);
                return Ok(());
            }
        }

        let tin = self.tin();
        let tol = self.tol();
        let p = ex.point;
        let origin = tin.point(p);
        if self.hull_exits() && tin.is_hull_point(p) {
            let ex = self.pond_exit_mut(id)?;
            ex.descent = vec![origin];
            ex.exit = Some(origin);
            ex.calculated = true;
            self.finish(id, Termination::Exit);
            return Ok(());
        }
        // 先离开所有共享水塘；没有出路时只离开创建它的水塘（流入相邻水塘）
        let descent = {
            let mut regions = Vec::with_capacity(ex.ponds.len());
            for &q in &ex.ponds {
                regions.push(&self.pond(q)?.analysis);
            }
            steepest_descent(
                tin,
                p,
                |n| !regions.iter().any(|a| a.contains_at_overflow(n)),
                &tol,
            )
            .or_else(|| {
                let first = regions.first()?;
                steepest_descent(tin, p, |n| !first.contains_at_overflow(n), &tol)
            })
        };

        let mut segment = vec![origin];
        let mut flow = None;
        let mut off_surface = None;
        match descent {
            Some(VertexDescent::Edge { to, angle }) => {
                segment.push(tin.point(to));
                flow = Some(self.get_or_create_on_point(id, to, Some(angle))?);
            }
            Some(VertexDescent::Face { triangle, angle, .. }) => {
                let hit = cast_ray(tin, triangle, origin.truncate(), direction_of(angle), &[p], &tol)
                    .ok_or_else(|| DrainageError::degenerate(format!("溢出口 {p} 的下降射线没有出口")))?;
                match hit {
                    RayHit::Vertex(v) => {
                        segment.push(tin.point(v));
                        flow = Some(self.get_or_create_on_point(id, v, Some(angle))?);
                    }
                    RayHit::Edge { a, b, position } => {
                        segment.push(position);
                        match tin.adjacent_triangle(triangle, a, b) {
                            Some(next) => {
                                let kind = FeatureKind::OnEdge(OnEdge::new(
                                    (a, b),
                                    Some(next),
                                    position,
                                    Some(angle),
                                ));
                                flow = Some(self.add_child(id, kind)?);
                            }
                            None => off_surface = Some(position),
                        }
                    }
                }
            }
            None if tin.is_hull_point(p) => off_surface = Some(origin),
            None => {
                return Err(DrainageError::degenerate(format!(
                    "溢出口 {p} 没有离开水塘的下降方向"
                )));
            }
        }

        let ex = self.pond_exit_mut(id)?;
        ex.descent = segment;
        ex.flows.extend(flow);
        ex.exit = off_surface;
        ex.calculated = true;
        let termination = if off_surface.is_some() {
            Termination::Exit
        } else {
            Termination::Continued
        };
        self.finish(id, termination);
        Ok(())
    }

    /// 下游只流回共享此溢出口的水塘
    pub(crate) fn is_dead_exit(&self, id: FeatureId) -> DrainageResult<bool> {
        let ex = self.pond_exit(id)?;
        if ex.dead {
            return Ok(true);
        }
        if !ex.calculated || ex.flows.is_empty() || ex.exit.is_some() {
            return Ok(false);
        }
        let (down, open) = self.downstream_ponds(&ex.flows);
        Ok(!open && !down.is_empty() && down.iter().all(|p| ex.ponds.contains(p)))
    }

    /// 溢出口接收水量
    pub(crate) fn exit_water_volume(
        &mut self,
        id: FeatureId,
        v: f64,
    ) -> DrainageResult<Vec<(FeatureId, f64)>> {
        if !self.pond_exit(id)?.calculated {
            if let Err(err) = self.process_pond_exit(id, true) {
                self.set_error(id, err);
                return Ok(Vec::new());
            }
            self.run_pending();
        }
        let ex = self.pond_exit(id)?;
        if ex.exit.is_some() {
            return Ok(Vec::new());
        }

        if ex.dead || ex.merged.is_some() {
            let open: Vec<FeatureId> = ex
                .ponds
                .iter()
                .copied()
                .filter(|&p| {
                    self.pond(p)
                        .map_or(false, |pond| !pond.is_full && pond.capacity().is_some())
                })
                .collect();
            if !open.is_empty() {
                let (down, _) = self.downstream_ponds(&ex.flows);
                if !ex.flows.is_empty() && open.iter().all(|p| down.contains(p)) {
                    return Ok(split_evenly(&ex.flows, v));
                }
                return Ok(split_evenly(&open, v));
            }
            if let Some(merged) = ex.merged {
                return Ok(vec![(merged, v)]);
            }
        }
        Ok(split_evenly(&ex.flows, v))
    }
}
