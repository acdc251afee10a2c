// crates/dt_tin/src/error.rs

//! 三角网错误类型

use dt_foundation::DtError;
use thiserror::Error;

/// 三角网操作结果类型
pub type TinResult<T> = Result<T, TinError>;

/// 三角网错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TinError {
    /// 基础层错误
    #[error(transparent)]
    Foundation(#[from] DtError),

    /// 空三角网
    #[error("三角网为空: {points} 个点, {triangles} 个三角形")]
    Empty {
        /// 点数
        points: usize,
        /// 三角形数
        triangles: usize,
    },

    /// 退化三角形
    #[error("三角形 {triangle} 退化, 面积 {area}")]
    DegenerateTriangle {
        /// 三角形索引
        triangle: usize,
        /// 有向面积
        area: f64,
    },

    /// 有向边被多个三角形使用（重叠或方向不一致）
    #[error("有向边 {from}->{to} 被多个三角形共享")]
    DuplicateEdge {
        /// 起点
        from: u32,
        /// 终点
        to: u32,
    },

    /// 非流形顶点
    #[error("顶点 {point} 周围的三角形不构成单一扇形")]
    NonManifold {
        /// 顶点索引
        point: u32,
    },

    /// IO 错误
    #[error("IO错误: {0}")]
    Io(String),

    /// 解析错误
    #[error("解析错误: {0}")]
    Parse(String),
}

impl From<std::io::Error> for TinError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
