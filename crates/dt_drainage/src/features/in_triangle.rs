// crates/dt_drainage/src/features/in_triangle.rs

//! 三角形内部的最速下降

use dt_tin::{TinAccess, TriangleIndex};
use glam::DVec3;

use crate::analysis::WaterAnalysis;
use crate::descent::{cast_ray, triangle_descent, RayHit};
use crate::error::{DrainageError, DrainageResult};
use crate::pond_analysis::PondSeed;
use crate::result::ResultItem;

use super::{FeatureId, FeatureKind, OnEdge, PondKind, Termination, TraceFeature};

/// 从三角形内部一点出发的下降
#[derive(Debug, Clone, PartialEq)]
pub struct InTriangle {
    triangle: TriangleIndex,
    points: Vec<DVec3>,
    pub(crate) exit: Option<DVec3>,
}

impl InTriangle {
    pub(crate) fn new(triangle: TriangleIndex, start: DVec3) -> Self {
        Self {
            triangle,
            points: vec![start],
            exit: None,
        }
    }

    /// 所在三角形
    pub fn triangle(&self) -> TriangleIndex {
        self.triangle
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
    pub(crate) fn process_in_triangle(&mut self, id: FeatureId) -> DrainageResult<()> {
        let tin = self.tin();
        let tol = self.tol();
        let (t, start) = match &self.feature_mut(id).kind {
            FeatureKind::InTriangle(f) => (f.triangle, f.points[0]),
            _ => return Err(DrainageError::degenerate(format!("节点 {id} 不是三角形内追踪"))),
        };

        let Some(d) = triangle_descent(tin.triangle_points(t), &tol) else {
            self.get_or_create_pond(id, PondSeed::Triangle(tin.triangle(t)), PondKind::Triangle)?;
            self.finish(id, Termination::Continued);
            return Ok(());
        };
        let angle = d.angle();
        let hit = cast_ray(tin, t, start.truncate(), d.direction, &[], &tol)
            .ok_or_else(|| DrainageError::degenerate(format!("三角形 {t} 内的下降射线没有出口")))?;

        let mut termination = Termination::Continued;
        match hit {
            RayHit::Vertex(v) => {
                self.push_in_triangle_point(id, tin.point(v));
                self.get_or_create_on_point(id, v, Some(angle))?;
            }
            RayHit::Edge { a, b, position } => {
                self.push_in_triangle_point(id, position);
                match tin.adjacent_triangle(t, a, b) {
                    Some(next) => {
                        let kind = FeatureKind::OnEdge(OnEdge::new((a, b), Some(next), position, Some(angle)));
                        self.add_child(id, kind)?;
                    }
                    None => {
                        if let FeatureKind::InTriangle(f) = &mut self.feature_mut(id).kind {
                            f.exit = Some(position);
                        }
                        termination = Termination::Exit;
                    }
                }
            }
        }
        self.finish(id, termination);
        Ok(())
    }

    fn push_in_triangle_point(&mut self, id: FeatureId, q: DVec3) {
        if let FeatureKind::InTriangle(f) = &mut self.feature_mut(id).kind {
            f.points.push(q);
        }
    }
}
