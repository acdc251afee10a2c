// apps/dt_cli/src/commands/mod.rs

//! 子命令

pub mod info;
pub mod trace;
pub mod volume;

use std::path::Path;

use anyhow::{Context, Result};
use dt_config::DrainageConfig;
use dt_drainage::{PointKind, ResultItem, WaterAnalysisResult};
use dt_tin::{TinData, TinSurface};

/// 读取三角网 JSON
pub fn load_tin(path: &Path) -> Result<TinSurface> {
    let data = TinData::from_file(path)
        .with_context(|| format!("读取三角网失败: {}", path.display()))?;
    data.into_surface()
        .with_context(|| format!("三角网无效: {}", path.display()))
}

/// 读取配置，未指定时使用默认值
pub fn load_config(path: Option<&Path>) -> Result<DrainageConfig> {
    match path {
        Some(p) => DrainageConfig::from_file(p)
            .with_context(|| format!("读取配置失败: {}", p.display())),
        None => Ok(DrainageConfig::default()),
    }
}

/// 打印结果项
pub fn print_result(result: &WaterAnalysisResult) {
    println!("=== 结果 ({} 项) ===", result.len());
    for item in result {
        match item {
            ResultItem::Point {
                feature,
                location,
                kind,
                volume,
            } => {
                let label = match kind {
                    PointKind::Start => "起点",
                    PointKind::Low => "低点",
                    PointKind::Exit => "出口",
                };
                println!(
                    "{feature} {label}: ({:.3}, {:.3}, {:.3}) 水量 {volume:.4}",
                    location.x, location.y, location.z
                );
            }
            ResultItem::Stream {
                feature,
                points,
                volume,
            } => {
                println!("{feature} 流线: {} 个点, 水量 {volume:.4}", points.len());
            }
            ResultItem::Pond {
                feature,
                boundaries,
                is_full,
                volume,
                depth,
            } => {
                let full = if *is_full { ", 已满" } else { "" };
                println!(
                    "{feature} 水塘: {} 条边界, 深度 {depth:.3}, 水量 {volume:.4}{full}",
                    boundaries.len()
                );
            }
        }
    }
    if let Some(b) = result.balance() {
        println!(
            "水量收支: 注入 {:.4}, 蓄水 {:.4}, 流出 {:.4}, 未分配 {:.4}, 残差 {:.2e}",
            b.injected,
            b.stored,
            b.exited,
            b.unrouted,
            b.residual()
        );
    }
}
