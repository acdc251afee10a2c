// crates/dt_foundation/src/lib.rs

//! DrainTrace Foundation Layer
//!
//! 基础层，为地表径流追踪提供最底层的抽象。
//!
//! # 模块概览
//!
//! - [`arena`]: 只追加的 Arena 与类型安全索引 `Idx<Tag>`
//! - [`error`]: 基础错误类型
//! - [`tolerance`]: 追踪几何判断使用的数值容差
//!
//! # 示例
//!
//! ```
//! use dt_foundation::arena::{Arena, ArenaTag};
//!
//! #[derive(Debug, Clone, Copy)]
//! struct NodeTag;
//! impl ArenaTag for NodeTag {}
//!
//! let mut arena: Arena<&str, NodeTag> = Arena::new();
//! let a = arena.push("start");
//! assert_eq!(arena[a], "start");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod arena;
pub mod error;
pub mod tolerance;

// 重导出常用类型
pub use arena::{Arena, ArenaTag, Idx};
pub use error::{DtError, DtResult};
pub use tolerance::TraceTolerance;

/// Prelude 模块，包含常用类型
pub mod prelude {
    pub use crate::arena::{Arena, ArenaTag, Idx};
    pub use crate::error::{DtError, DtResult};
    pub use crate::tolerance::TraceTolerance;
}
