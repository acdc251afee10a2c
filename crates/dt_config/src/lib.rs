// crates/dt_config/src/lib.rs

//! DrainTrace Config Layer
//!
//! 径流分析配置：池塘细化容差、最小追踪深度、零坡度策略和结果选项。
//!
//! # 模块概览
//!
//! - [`drainage_config`]: `DrainageConfig` 与 `ZeroSlopeOption`
//! - [`error`]: 配置错误类型

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod drainage_config;
pub mod error;

pub use drainage_config::{DrainageConfig, ZeroSlopeOption};
pub use error::ConfigError;
