// crates/dt_drainage/src/features/on_point.rs

//! 从顶点出发的最速下降
//!
//! 扫描顶点周围所有边和面的坡度，取最陡者：沿边则直接到达邻点，
//! 过面则投射射线到对边。没有下降方向时：
//!
//! - 位于凸包上（三角网有内部点时）：水流离开三角网
//! - 所有邻点都更高：局部最低点，生成水塘
//! - 有等高邻点且位于凸包上、面的下降方向指向三角网外：水流离开
//! - 按上一段方位角穿过水平三角形（`TraceLastAngle`）
//! - 否则在与等高邻点构成的水平边上积水

use dt_config::ZeroSlopeOption;
use dt_tin::{PointIndex, TinAccess, TriangleIndex};
use glam::DVec3;

use crate::analysis::WaterAnalysis;
use crate::descent::{
    cast_ray, descends_off_hull, direction_of, is_flat_triangle, steepest_descent,
    wedge_containing, RayHit, VertexDescent,
};
use crate::error::{DrainageError, DrainageResult};
use crate::pond_analysis::PondSeed;
use crate::result::ResultItem;

use super::{FeatureId, FeatureKind, OnEdge, PondKind, Termination, TraceFeature};

/// 顶点上的下降，每个顶点至多一个
#[derive(Debug, Clone, PartialEq)]
pub struct OnPoint {
    point: PointIndex,
    last_angle: Option<f64>,
    points: Vec<DVec3>,
    pub(crate) exit: Option<DVec3>,
}

impl OnPoint {
    pub(crate) fn new(point: PointIndex, position: DVec3, last_angle: Option<f64>) -> Self {
        Self {
            point,
            last_angle,
            points: vec![position],
            exit: None,
        }
    }

    /// 顶点
    pub fn point(&self) -> PointIndex {
        self.point
    }

    /// 到达时的方位角
    pub fn last_angle(&self) -> Option<f64> {
        self.last_angle
    }

    /// 折线
    pub fn points(&self) -> &[DVec3] {
        &self.points
    }

    pub(crate) fn add_result(&self, id: FeatureId, feature: &TraceFeature, out: &mut Vec<ResultItem>) {
        ResultItem::push_stream(out, id, &self.points, feature.received_volume());
        ResultItem::push_exit(out, id, self.exit, feature.retained_volume());
    }
}

impl<T: TinAccess> WaterAnalysis<'_, T> {
    pub(crate) fn process_on_point(&mut self, id: FeatureId) -> DrainageResult<()> {
        let (p, last_angle) = match &self.feature_mut(id).kind {
            FeatureKind::OnPoint(f) => (f.point, f.last_angle),
            _ => return Err(DrainageError::degenerate(format!("节点 {id} 不是顶点追踪"))),
        };
        let tin = self.tin();
        let tol = self.tol();

        let termination = match steepest_descent(tin, p, |_| true, &tol) {
            Some(VertexDescent::Edge { to, angle }) => {
                let position = tin.point(to);
                self.update_on_point(id, |f| f.points.push(position));
                self.get_or_create_on_point(id, to, Some(angle))?;
                Termination::Continued
            }
            Some(VertexDescent::Face { triangle, angle, .. }) => {
                self.cross_face(id, p, triangle, angle)?
            }
            None => self.settle_on_point(id, p, last_angle)?,
        };
        self.finish(id, termination);
        Ok(())
    }

    fn update_on_point(&mut self, id: FeatureId, update: impl FnOnce(&mut OnPoint)) {
        if let FeatureKind::OnPoint(f) = &mut self.feature_mut(id).kind {
            update(f);
        }
    }

    /// 从顶点 `p` 沿 `angle` 穿过三角形
    fn cross_face(
        &mut self,
        id: FeatureId,
        p: PointIndex,
        triangle: TriangleIndex,
        angle: f64,
    ) -> DrainageResult<Termination> {
        let tin = self.tin();
        let tol = self.tol();
        let hit = cast_ray(tin, triangle, tin.xy(p), direction_of(angle), &[p], &tol)
            .ok_or_else(|| DrainageError::degenerate(format!("点 {p} 的下降射线没有出口")))?;
        match hit {
            RayHit::Vertex(v) => {
                let position = tin.point(v);
                self.update_on_point(id, |f| f.points.push(position));
                self.get_or_create_on_point(id, v, Some(angle))?;
                Ok(Termination::Continued)
            }
            RayHit::Edge { a, b, position } => {
                self.update_on_point(id, |f| f.points.push(position));
                match tin.adjacent_triangle(triangle, a, b) {
                    Some(next) => {
                        let kind = FeatureKind::OnEdge(OnEdge::new((a, b), Some(next), position, Some(angle)));
                        self.add_child(id, kind)?;
                        Ok(Termination::Continued)
                    }
                    None => {
                        self.update_on_point(id, |f| f.exit = Some(position));
                        Ok(Termination::Exit)
                    }
                }
            }
        }
    }

    /// 顶点处没有下降方向
    fn settle_on_point(
        &mut self,
        id: FeatureId,
        p: PointIndex,
        last_angle: Option<f64>,
    ) -> DrainageResult<Termination> {
        let tin = self.tin();
        let tol = self.tol();
        if self.hull_exits() && tin.is_hull_point(p) {
            let position = tin.point(p);
            self.update_on_point(id, |f| f.exit = Some(position));
            return Ok(Termination::Exit);
        }

        let z = tin.elevation(p);
        let equal: Vec<PointIndex> = tin
            .neighbors(p)
            .iter()
            .copied()
            .filter(|&n| tol.same_elevation(tin.elevation(n), z))
            .collect();

        let Some(&flat_neighbour) = equal.first() else {
            self.get_or_create_pond(id, PondSeed::Point(p), PondKind::LowPoint)?;
            return Ok(Termination::Continued);
        };

        if descends_off_hull(tin, p, &tol) {
            let position = tin.point(p);
            self.update_on_point(id, |f| f.exit = Some(position));
            return Ok(Termination::Exit);
        }

        if let (ZeroSlopeOption::TraceLastAngle, Some(angle)) = (self.config().zero_slope, last_angle) {
            if let Some((t, _, _)) = wedge_containing(tin, p, direction_of(angle)) {
                if is_flat_triangle(tin.triangle_points(t), &tol) {
                    return self.cross_face(id, p, t, angle);
                }
            }
        }

        self.get_or_create_pond(id, PondSeed::Edge(p, flat_neighbour), PondKind::Edge)?;
        Ok(Termination::Continued)
    }
}
