// crates/dt_drainage/src/error.rs

//! 径流分析错误类型
//!
//! 错误记录在发现它的追踪节点上，该分支随即结束；
//! 编排器在整张图处理完毕后返回本次调用遇到的第一个错误。

use dt_config::ConfigError;
use dt_tin::TinError;
use thiserror::Error;

/// 径流分析结果类型
pub type DrainageResult<T> = Result<T, DrainageError>;

/// 径流分析错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DrainageError {
    /// 几何退化（边界无法闭合、缺少三角网数据、追踪无法前进等）
    #[error("几何退化: {context}")]
    GeometryDegenerate {
        /// 出错位置描述
        context: String,
    },

    /// 体积细化未收敛
    #[error("体积细化未收敛: 目标 {target}, 实际 {achieved}, 迭代 {iterations} 次")]
    VolumeRefinementFailed {
        /// 目标体积
        target: f64,
        /// 最后一次计算的体积
        achieved: f64,
        /// 已迭代次数
        iterations: usize,
    },

    /// 起点无法投影到地表
    #[error("起点 ({x}, {y}) 不在三角网范围内")]
    InvalidSeed {
        /// X 坐标
        x: f64,
        /// Y 坐标
        y: f64,
    },

    /// 注入体积无效
    #[error("注入体积无效: {volume}")]
    InvalidVolume {
        /// 体积
        volume: f64,
    },

    /// 三角网错误
    #[error(transparent)]
    Tin(#[from] TinError),

    /// 配置错误
    #[error("配置错误: {0}")]
    Config(String),
}

impl DrainageError {
    /// 创建几何退化错误
    pub fn degenerate(context: impl Into<String>) -> Self {
        Self::GeometryDegenerate {
            context: context.into(),
        }
    }
}

impl From<ConfigError> for DrainageError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}
