// crates/dt_drainage/src/features/mod.rs

//! 追踪节点
//!
//! 径流追踪图由六类节点组成，全部存放在只追加的 Arena 中：
//!
//! | 节点 | 含义 |
//! |------|------|
//! | [`StartPoint`] | 起点，投影到地表后按位置派生后续节点 |
//! | [`InTriangle`] | 三角形内部的最速下降 |
//! | [`OnEdge`] | 从边上出发、逐个三角形推进的最速下降 |
//! | [`OnPoint`] | 从顶点出发的最速下降，每个点至多一个 |
//! | [`TracePond`] | 水塘（低点、水平边、水平三角形或由溢出口合并） |
//! | [`TracePondExit`] | 水塘溢出口，可被多个水塘共享 |
//!
//! 节点之间以 [`FeatureId`] 相互引用，克隆整张图只需复制 Arena。

mod in_triangle;
mod on_edge;
mod on_point;
mod pond;
mod pond_exit;
mod start_point;

pub use in_triangle::InTriangle;
pub use on_edge::OnEdge;
pub use on_point::OnPoint;
pub use pond::{PondKind, TracePond};
pub use pond_exit::TracePondExit;
pub use start_point::StartPoint;

use dt_foundation::{ArenaTag, Idx};
use glam::DVec3;

use crate::error::DrainageError;
use crate::result::ResultItem;

/// 追踪节点标记
#[derive(Debug, Clone, Copy)]
pub struct FeatureTag;

impl ArenaTag for FeatureTag {}

/// 追踪节点句柄
pub type FeatureId = Idx<FeatureTag>;

// ============================================================================
// 状态
// ============================================================================

/// 节点结束原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// 已把水流交给子节点
    Continued,
    /// 水流离开三角网
    Exit,
    /// 封闭水塘，水流到此为止
    DeadPond,
    /// 溢出口暂停：所在水塘足够深，追踪时不再继续，注水时恢复
    Stopped,
    /// 出错
    Error,
}

/// 节点状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeatureStatus {
    /// 待处理
    #[default]
    Active,
    /// 已结束
    Finished(Termination),
}

/// 各类节点共有的状态
#[derive(Debug, Clone, Default)]
pub struct FeatureState {
    pub(crate) parent: Option<FeatureId>,
    pub(crate) children: Vec<FeatureId>,
    pub(crate) status: FeatureStatus,
    pub(crate) hidden: bool,
    pub(crate) received_volume: f64,
    pub(crate) forwarded_volume: f64,
    pub(crate) error: Option<DrainageError>,
}

/// 节点类别（不含数据）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureType {
    /// 起点
    StartPoint,
    /// 三角形内部
    InTriangle,
    /// 边上
    OnEdge,
    /// 顶点上
    OnPoint,
    /// 水塘
    Pond,
    /// 水塘溢出口
    PondExit,
}

/// 节点种类
#[derive(Debug, Clone)]
pub enum FeatureKind {
    /// 起点
    StartPoint(StartPoint),
    /// 三角形内部
    InTriangle(InTriangle),
    /// 边上
    OnEdge(OnEdge),
    /// 顶点上
    OnPoint(OnPoint),
    /// 水塘
    Pond(TracePond),
    /// 水塘溢出口
    PondExit(TracePondExit),
}

/// 追踪图节点
#[derive(Debug, Clone)]
pub struct TraceFeature {
    pub(crate) state: FeatureState,
    pub(crate) kind: FeatureKind,
}

impl TraceFeature {
    pub(crate) fn new(parent: Option<FeatureId>, kind: FeatureKind) -> Self {
        Self {
            state: FeatureState {
                parent,
                ..Default::default()
            },
            kind,
        }
    }

    /// 节点种类
    pub fn kind(&self) -> &FeatureKind {
        &self.kind
    }

    /// 节点类别
    pub fn feature_type(&self) -> FeatureType {
        match self.kind {
            FeatureKind::StartPoint(_) => FeatureType::StartPoint,
            FeatureKind::InTriangle(_) => FeatureType::InTriangle,
            FeatureKind::OnEdge(_) => FeatureType::OnEdge,
            FeatureKind::OnPoint(_) => FeatureType::OnPoint,
            FeatureKind::Pond(_) => FeatureType::Pond,
            FeatureKind::PondExit(_) => FeatureType::PondExit,
        }
    }

    /// 种类名称
    pub fn label(&self) -> &'static str {
        match self.kind {
            FeatureKind::StartPoint(_) => "StartPoint",
            FeatureKind::InTriangle(_) => "InTriangle",
            FeatureKind::OnEdge(_) => "OnEdge",
            FeatureKind::OnPoint(_) => "OnPoint",
            FeatureKind::Pond(ref p) => p.kind().label(),
            FeatureKind::PondExit(_) => "PondExit",
        }
    }

    /// 父节点
    pub fn parent(&self) -> Option<FeatureId> {
        self.state.parent
    }

    /// 子节点
    pub fn children(&self) -> &[FeatureId] {
        &self.state.children
    }

    /// 状态
    pub fn status(&self) -> FeatureStatus {
        self.state.status
    }

    /// 是否已结束
    pub fn is_finished(&self) -> bool {
        matches!(self.state.status, FeatureStatus::Finished(_))
    }

    /// 结束原因
    pub fn termination(&self) -> Option<Termination> {
        match self.state.status {
            FeatureStatus::Finished(t) => Some(t),
            FeatureStatus::Active => None,
        }
    }

    /// 是否被合并水塘隐藏
    pub fn is_hidden(&self) -> bool {
        self.state.hidden
    }

    /// 记录的错误
    pub fn error(&self) -> Option<&DrainageError> {
        self.state.error.as_ref()
    }

    /// 累计收到的水量
    pub fn received_volume(&self) -> f64 {
        self.state.received_volume
    }

    /// 累计转交的水量
    pub fn forwarded_volume(&self) -> f64 {
        self.state.forwarded_volume
    }

    /// 留在本节点的水量
    pub fn retained_volume(&self) -> f64 {
        self.state.received_volume - self.state.forwarded_volume
    }

    /// 水流离开三角网的位置
    pub fn exit_position(&self) -> Option<DVec3> {
        match &self.kind {
            FeatureKind::InTriangle(f) => f.exit,
            FeatureKind::OnEdge(f) => f.exit,
            FeatureKind::OnPoint(f) => f.exit,
            FeatureKind::PondExit(f) => f.exit,
            FeatureKind::StartPoint(_) | FeatureKind::Pond(_) => None,
        }
    }

    /// 水流折线
    pub fn polyline(&self) -> Option<&[DVec3]> {
        match &self.kind {
            FeatureKind::InTriangle(f) => Some(f.points()),
            FeatureKind::OnEdge(f) => Some(f.points()),
            FeatureKind::OnPoint(f) => Some(f.points()),
            FeatureKind::PondExit(f) => Some(f.descent()),
            FeatureKind::StartPoint(_) | FeatureKind::Pond(_) => None,
        }
    }

    /// 水塘
    pub fn as_pond(&self) -> Option<&TracePond> {
        match &self.kind {
            FeatureKind::Pond(p) => Some(p),
            _ => None,
        }
    }

    /// 溢出口
    pub fn as_pond_exit(&self) -> Option<&TracePondExit> {
        match &self.kind {
            FeatureKind::PondExit(e) => Some(e),
            _ => None,
        }
    }

    pub(crate) fn as_pond_mut(&mut self) -> Option<&mut TracePond> {
        match &mut self.kind {
            FeatureKind::Pond(p) => Some(p),
            _ => None,
        }
    }

    pub(crate) fn as_pond_exit_mut(&mut self) -> Option<&mut TracePondExit> {
        match &mut self.kind {
            FeatureKind::PondExit(e) => Some(e),
            _ => None,
        }
    }

    /// 追加本节点的结果项
    pub(crate) fn add_result(&self, id: FeatureId, for_water: bool, out: &mut Vec<ResultItem>) {
        match &self.kind {
            FeatureKind::StartPoint(f) => f.add_result(id, self, out),
            FeatureKind::InTriangle(f) => f.add_result(id, self, out),
            FeatureKind::OnEdge(f) => f.add_result(id, self, out),
            FeatureKind::OnPoint(f) => f.add_result(id, self, out),
            FeatureKind::Pond(p) => p.add_result(id, self, for_water, out),
            FeatureKind::PondExit(e) => e.add_result(id, self, out),
        }
    }

    /// 本节点引用的全部节点（父、子及种类相关的交叉引用）
    pub fn references(&self) -> Vec<FeatureId> {
        let mut refs: Vec<FeatureId> = self.state.parent.into_iter().collect();
        refs.extend_from_slice(&self.state.children);
        match &self.kind {
            FeatureKind::Pond(p) => {
                refs.extend_from_slice(p.exits());
                refs.extend(p.top_level());
            }
            FeatureKind::PondExit(e) => {
                refs.extend_from_slice(e.ponds());
                refs.extend_from_slice(e.flows());
                refs.extend(e.merged());
            }
            _ => {}
        }
        refs
    }
}
