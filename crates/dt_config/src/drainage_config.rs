// crates/dt_config/src/drainage_config.rs

//! DrainageConfig - 径流分析配置
//!
//! 所有字段都可省略，缺省值与历史行为一致：
//! 高程容差 0.01，体积容差 0.3，零坡度沿上一段方向继续追踪。

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;

/// 零坡度（平坦区域）处理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZeroSlopeOption {
    /// 沿上一段水流方向穿过平坦三角形
    #[default]
    TraceLastAngle,
    /// 平坦区域直接作为池塘处理
    Pond,
}

/// 径流分析配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrainageConfig {
    /// 池塘高程细化容差 [m]
    #[serde(default = "default_pond_elevation_tolerance")]
    pub pond_elevation_tolerance: f64,

    /// 池塘体积细化容差（绝对值）[m³]
    #[serde(default = "default_pond_volume_tolerance")]
    pub pond_volume_tolerance: f64,

    /// 最小追踪深度 [m]，不深于此值的池塘在追踪时被穿越
    #[serde(default)]
    pub minimum_depth: f64,

    /// 零坡度策略
    #[serde(default)]
    pub zero_slope: ZeroSlopeOption,

    /// 结果中是否包含水量平衡
    #[serde(default)]
    pub water_volume_result: bool,

    /// 体积细化最大迭代次数
    #[serde(default = "default_max_refine_iterations")]
    pub max_refine_iterations: usize,

    /// 追踪图节点上限，0 表示按点数自动确定
    #[serde(default)]
    pub max_features: usize,
}

fn default_pond_elevation_tolerance() -> f64 { 0.01 }
fn default_pond_volume_tolerance() -> f64 { 0.3 }
fn default_max_refine_iterations() -> usize { 100 }

impl Default for DrainageConfig {
    fn default() -> Self {
        Self {
            pond_elevation_tolerance: default_pond_elevation_tolerance(),
            pond_volume_tolerance: default_pond_volume_tolerance(),
            minimum_depth: 0.0,
            zero_slope: ZeroSlopeOption::default(),
            water_volume_result: false,
            max_refine_iterations: default_max_refine_iterations(),
            max_features: 0,
        }
    }
}

impl DrainageConfig {
    /// 从文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::Io)?;
        Self::from_json(&content)
    }

    /// 从 JSON 字符串解析并验证
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: DrainageConfig =
            serde_json::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.pond_elevation_tolerance > 0.0) || !self.pond_elevation_tolerance.is_finite() {
            return Err(ConfigError::invalid_value(
                "pond_elevation_tolerance",
                self.pond_elevation_tolerance,
                "高程容差必须为正的有限值",
            ));
        }

        if !(self.pond_volume_tolerance > 0.0) || !self.pond_volume_tolerance.is_finite() {
            return Err(ConfigError::invalid_value(
                "pond_volume_tolerance",
                self.pond_volume_tolerance,
                "体积容差必须为正的有限值",
            ));
        }

        if !(self.minimum_depth >= 0.0) || !self.minimum_depth.is_finite() {
            return Err(ConfigError::invalid_value(
                "minimum_depth",
                self.minimum_depth,
                "最小深度不能为负",
            ));
        }

        if self.max_refine_iterations == 0 {
            return Err(ConfigError::invalid_value(
                "max_refine_iterations",
                self.max_refine_iterations,
                "至少需要一次迭代",
            ));
        }

        Ok(())
    }

    /// 保存配置到文件
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content =
            serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))?;
        std::fs::write(path, content).map_err(ConfigError::Io)?;
        Ok(())
    }

    /// 给定点数时的追踪图节点上限
    pub fn feature_limit(&self, n_points: usize) -> usize {
        if self.max_features > 0 {
            self.max_features
        } else {
            8 * n_points + 64
        }
    }
}
