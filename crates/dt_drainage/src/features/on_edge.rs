// crates/dt_drainage/src/features/on_edge.rs

//! 从边上出发的最速下降
//!
//! 每次处理只穿过一个三角形：在前方三角形内沿下降方向投射射线，
//! 到达对边后更新所在边与前方三角形，节点保持待处理状态继续推进。
//! 若下降方向不指向前方三角形，说明所在边是一条谷线，水流沿边流向较低端点。

use dt_config::ZeroSlopeOption;
use dt_tin::{PointIndex, TinAccess, TriangleIndex};
use glam::DVec3;

use crate::analysis::WaterAnalysis;
use crate::descent::{angle_of, cast_ray, direction_of, points_into, triangle_descent, RayHit};
use crate::error::{DrainageError, DrainageResult};
use crate::pond_analysis::PondSeed;
use crate::result::ResultItem;

use super::{FeatureId, FeatureKind, PondKind, Termination, TraceFeature};

/// 边上的下降
#[derive(Debug, Clone, PartialEq)]
pub struct OnEdge {
    edge: (PointIndex, PointIndex),
    triangle: Option<TriangleIndex>,
    position: DVec3,
    last_angle: Option<f64>,
    points: Vec<DVec3>,
    steps: usize,
    pub(crate) exit: Option<DVec3>,
}

impl OnEdge {
    pub(crate) fn new(
        edge: (PointIndex, PointIndex),
        triangle: Option<TriangleIndex>,
        position: DVec3,
        last_angle: Option<f64>,
    ) -> Self {
        Self {
            edge,
            triangle,
            position,
            last_angle,
            points: vec![position],
            steps: 0,
            exit: None,
        }
    }

    /// 当前所在边
    pub fn edge(&self) -> (PointIndex, PointIndex) {
        self.edge
    }

    /// 前方三角形，`None` 表示边在凸包上
    pub fn triangle(&self) -> Option<TriangleIndex> {
        self.triangle
    }

    /// 当前位置
    pub fn position(&self) -> DVec3 {
        self.position
    }

    /// 上一段的方位角
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
    pub(crate) fn process_on_edge(&mut self, id: FeatureId) -> DrainageResult<()> {
        let mut state = match &self.feature_mut(id).kind {
            FeatureKind::OnEdge(f) => f.clone(),
            _ => return Err(DrainageError::degenerate(format!("节点 {id} 不是边上追踪"))),
        };
        state.steps += 1;
        if state.steps > self.tin().n_triangles() + 1 {
            return Err(DrainageError::degenerate(format!(
                "沿边追踪 {} 步仍未结束",
                state.steps
            )));
        }

        let outcome = self.step_on_edge(id, &mut state);
        if let FeatureKind::OnEdge(f) = &mut self.feature_mut(id).kind {
            *f = state;
        }
        if let Some(termination) = outcome? {
            self.finish(id, termination);
        }
        Ok(())
    }

    /// 穿过前方三角形；返回 `None` 表示到达下一条边、继续推进
    fn step_on_edge(
        &mut self,
        id: FeatureId,
        state: &mut OnEdge,
    ) -> DrainageResult<Option<Termination>> {
        let tin = self.tin();
        let tol = self.tol();
        let (a, b) = state.edge;
        let Some(t) = state.triangle else {
            state.exit = Some(state.position);
            return Ok(Some(Termination::Exit));
        };
        let c = tin
            .third_point(t, a, b)
            .ok_or_else(|| DrainageError::degenerate(format!("三角形 {t} 不含边 {a}-{b}")))?;

        let descent = triangle_descent(tin.triangle_points(t), &tol);
        let direction = match (descent, self.config().zero_slope, state.last_angle) {
            (Some(d), _, _) => d.direction,
            (None, ZeroSlopeOption::TraceLastAngle, Some(angle)) => direction_of(angle),
            (None, _, _) => {
                self.get_or_create_pond(id, PondSeed::Triangle(tin.triangle(t)), PondKind::Triangle)?;
                return Ok(Some(Termination::Continued));
            }
        };

        if !points_into(tin.xy(a), tin.xy(b), tin.xy(c), direction, &tol) {
            if descent.is_none() {
                self.get_or_create_pond(id, PondSeed::Triangle(tin.triangle(t)), PondKind::Triangle)?;
                return Ok(Some(Termination::Continued));
            }
            return self.flow_along_edge(id, state, a, b).map(Some);
        }

        let angle = angle_of(direction);
        let hit = cast_ray(tin, t, state.position.truncate(), direction, &[a, b], &tol)
            .ok_or_else(|| DrainageError::degenerate(format!("三角形 {t} 内的下降射线没有出口")))?;
        match hit {
            RayHit::Vertex(v) => {
                state.points.push(tin.point(v));
                self.get_or_create_on_point(id, v, Some(angle))?;
                Ok(Some(Termination::Continued))
            }
            RayHit::Edge { a, b, position } => {
                state.points.push(position);
                state.position = position;
                state.edge = (a, b);
                state.last_angle = Some(angle);
                state.triangle = tin.adjacent_triangle(t, a, b);
                if state.triangle.is_none() {
                    state.exit = Some(position);
                    return Ok(Some(Termination::Exit));
                }
                Ok(None)
            }
        }
    }

    /// 谷线：水平边上积水，否则流向较低端点
    fn flow_along_edge(
        &mut self,
        id: FeatureId,
        state: &mut OnEdge,
        a: PointIndex,
        b: PointIndex,
    ) -> DrainageResult<Termination> {
        let tin = self.tin();
        let (za, zb) = (tin.elevation(a), tin.elevation(b));
        if self.tol().same_elevation(za, zb) {
            self.get_or_create_pond(id, PondSeed::Edge(a, b), PondKind::Edge)?;
            return Ok(Termination::Continued);
        }
        let (low, high) = if za < zb { (a, b) } else { (b, a) };
        state.points.push(tin.point(low));
        let angle = angle_of(tin.xy(low) - tin.xy(high));
        self.get_or_create_on_point(id, low, Some(angle))?;
        Ok(Termination::Continued)
    }
}
