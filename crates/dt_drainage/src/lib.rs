// crates/dt_drainage/src/lib.rs

//! DrainTrace Drainage Layer
//!
//! 三角网地表径流追踪与水塘分析。
//!
//! 从任意起点出发，水流沿最速下降方向穿过三角形、沿边或经过顶点，
//! 直到离开三角网或到达局部低洼。低洼处用淹没扫描求出水塘的溢出高程、
//! 溢出口与边界；从溢出口继续追踪，必要时把互相溢流的水塘合并。
//! 注入水量后，水量沿追踪图逐级分配：水塘蓄满后从溢出口溢出。
//!
//! # 模块概览
//!
//! - [`analysis`]: 编排器 `WaterAnalysis`（追踪、注水、结果、克隆）
//! - [`features`]: 追踪图节点
//! - [`pond_analysis`]: 淹没扫描与按体积/高程求水位
//! - [`boundary`]: 淹没区域边界环的追踪、拆分与合并
//! - [`result`]: 结果快照与水量收支
//! - [`callback`]: 推送式输出与流线拼接
//! - [`volume`]: 三角形蓄水体积与多边形面积
//! - [`error`]: 错误类型
//!
//! # 示例
//!
//! ```
//! use dt_drainage::prelude::*;
//! use dt_tin::TinSurface;
//!
//! // 中心凹陷的 5x5 网格
//! let tin = TinSurface::from_grid(5, 5, 1.0, 1.0, |i, j| {
//!     let (dx, dy) = (i as f64 - 2.0, j as f64 - 2.0);
//!     dx * dx + dy * dy
//! })
//! .unwrap();
//!
//! let mut analysis = WaterAnalysis::new(&tin);
//! analysis.add_water_volume(0.5, 0.5, 1.0).unwrap();
//! let result = analysis.get_result();
//! assert!(result.ponds().count() >= 1);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod analysis;
pub mod boundary;
pub mod callback;
mod descent;
pub mod error;
pub mod features;
pub mod pond_analysis;
pub mod result;
pub mod volume;

pub use analysis::WaterAnalysis;
pub use boundary::{BoundaryList, BoundaryScope, Location, PointUsage};
pub use callback::{DtmFeatureType, FeatureJoiner, FeatureSink};
pub use error::{DrainageError, DrainageResult};
pub use features::{
    FeatureId, FeatureKind, FeatureStatus, FeatureType, PondKind, Termination, TraceFeature,
    TracePond, TracePondExit,
};
pub use pond_analysis::{PondAnalysis, PondExtent, PondSeed, VolumeFit};
pub use result::{PointKind, ResultItem, WaterAnalysisResult, WaterBalance};

/// 预导入模块
pub mod prelude {
    pub use crate::analysis::WaterAnalysis;
    pub use crate::callback::{DtmFeatureType, FeatureJoiner, FeatureSink};
    pub use crate::error::{DrainageError, DrainageResult};
    pub use crate::features::{FeatureId, FeatureType, Termination};
    pub use crate::result::{PointKind, ResultItem, WaterAnalysisResult, WaterBalance};
    pub use dt_config::{DrainageConfig, ZeroSlopeOption};
}
