// crates/dt_tin/src/lib.rs

//! DrainTrace TIN Layer
//!
//! 三角不规则网（TIN）地形访问层。径流分析只通过 [`TinAccess`]
//! 这一窄接口读取地形：点坐标、三角形及其邻接关系、绕顶点旋转遍历，
//! 以及把平面坐标投影（drape）到地表。
//!
//! # 模块概览
//!
//! - [`traits`]: `TinAccess` 只读访问接口
//! - [`surface`]: 内存三角网实现 `TinSurface`
//! - [`inverted`]: 高程取反视图 `Inverted`（上溯追踪）
//! - [`spatial_index`]: 基于 R-Tree 的三角形索引
//! - [`io`]: JSON 交换格式 `TinData`
//! - [`error`]: 地形错误类型
//!
//! # 示例
//!
//! ```
//! use dt_tin::{TinAccess, TinSurface};
//!
//! let tin = TinSurface::from_grid(3, 3, 1.0, 1.0, |i, j| (i + j) as f64).unwrap();
//! assert_eq!(tin.n_points(), 9);
//! let draped = tin.drape(0.5, 0.5).unwrap();
//! assert!((draped.position.z - 1.0).abs() < 1e-12);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod inverted;
pub mod io;
pub mod spatial_index;
pub mod surface;
pub mod traits;

pub use error::{TinError, TinResult};
pub use inverted::Inverted;
pub use io::TinData;
pub use spatial_index::{SpatialBounds, TriangleSpatialIndex};
pub use surface::TinSurface;
pub use traits::{DrapeLocation, DrapedPoint, PointIndex, TinAccess, TriangleIndex};
