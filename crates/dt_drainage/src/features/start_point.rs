// crates/dt_drainage/src/features/start_point.rs

//! 起点：投影到地表，按落点位置派生第一个追踪节点

use dt_tin::{DrapeLocation, DrapedPoint, PointIndex, TinAccess};
use glam::DVec3;

use crate::analysis::WaterAnalysis;
use crate::descent::{is_flat_triangle, points_into, triangle_descent};
use crate::error::{DrainageError, DrainageResult};
use crate::pond_analysis::PondSeed;
use crate::result::{PointKind, ResultItem};

use super::{FeatureId, FeatureKind, InTriangle, OnEdge, PondKind, Termination, TraceFeature};

/// 起点
#[derive(Debug, Clone, PartialEq)]
pub struct StartPoint {
    x: f64,
    y: f64,
    draped: Option<DrapedPoint>,
}

impl StartPoint {
    pub(crate) fn new(x: f64, y: f64) -> Self {
        Self { x, y, draped: None }
    }

    /// 请求的平面坐标
    pub fn xy(&self) -> (f64, f64) {
        (self.x, self.y)
    }

    /// 投影结果
    pub fn draped(&self) -> Option<&DrapedPoint> {
        self.draped.as_ref()
    }

    /// 地表位置，未投影时 z 为 NaN
    pub fn position(&self) -> DVec3 {
        self.draped
            .map(|d| d.position)
            .unwrap_or(DVec3::new(self.x, self.y, f64::NAN))
    }

    pub(crate) fn add_result(&self, id: FeatureId, feature: &TraceFeature, out: &mut Vec<ResultItem>) {
        if self.draped.is_some() {
            out.push(ResultItem::Point {
                feature: id,
                location: self.position(),
                kind: PointKind::Start,
                volume: feature.received_volume(),
            });
        }
    }
}

impl<T: TinAccess> WaterAnalysis<'_, T> {
    pub(crate) fn process_start_point(&mut self, id: FeatureId) -> DrainageResult<()> {
        let (x, y) = match &self.feature_mut(id).kind {
            FeatureKind::StartPoint(s) => s.xy(),
            _ => return Err(DrainageError::degenerate(format!("节点 {id} 不是起点"))),
        };
        let tin = self.tin();
        let draped = tin.drape(x, y).ok_or(DrainageError::InvalidSeed { x, y })?;
        if let FeatureKind::StartPoint(s) = &mut self.feature_mut(id).kind {
            s.draped = Some(draped);
        }

        match draped.location {
            DrapeLocation::Vertex(p) => {
                self.get_or_create_on_point(id, p, None)?;
            }
            DrapeLocation::Triangle(t) => {
                if is_flat_triangle(tin.triangle_points(t), &self.tol()) {
                    let seed = PondSeed::Triangle(tin.triangle(t));
                    self.get_or_create_pond(id, seed, PondKind::Triangle)?;
                } else {
                    let kind = FeatureKind::InTriangle(InTriangle::new(t, draped.position));
                    self.add_child(id, kind)?;
                }
            }
            DrapeLocation::Edge(a, b) => self.start_on_edge(id, a, b, draped.position)?,
        }
        self.finish(id, Termination::Continued);
        Ok(())
    }

    /// 起点落在边上：向每个下降方向指向其内部的相邻三角形各派生一支
    fn start_on_edge(
        &mut self,
        id: FeatureId,
        a: PointIndex,
        b: PointIndex,
        position: DVec3,
    ) -> DrainageResult<()> {
        let tin = self.tin();
        let tol = self.tol();
        let sides: Vec<_> = [tin.triangle_with_edge(a, b), tin.triangle_with_edge(b, a)]
            .into_iter()
            .flatten()
            .collect();
        let mut started = false;
        for &t in &sides {
            let Some(c) = tin.third_point(t, a, b) else {
                continue;
            };
            let Some(d) = triangle_descent(tin.triangle_points(t), &tol) else {
                continue;
            };
            if points_into(tin.xy(a), tin.xy(b), tin.xy(c), d.direction, &tol) {
                self.add_child(id, FeatureKind::OnEdge(OnEdge::new((a, b), Some(t), position, None)))?;
                started = true;
            }
        }
        if !started {
            // 两侧都不接受水流：沿边或在边上积水，交给边追踪判断
            let t = sides
                .first()
                .copied()
                .ok_or_else(|| DrainageError::degenerate(format!("边 {a}-{b} 没有相邻三角形")))?;
            self.add_child(id, FeatureKind::OnEdge(OnEdge::new((a, b), Some(t), position, None)))?;
        }
        Ok(())
    }
}
