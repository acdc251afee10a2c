// crates/dt_tin/src/io.rs

//! 三角网 JSON 交换格式
//!
//! ```json
//! { "points": [[0.0, 0.0, 10.0], [1.0, 0.0, 10.0], [0.5, 1.0, 0.0]],
//!   "triangles": [[0, 1, 2]] }
//! ```

use std::path::Path;

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::error::{TinError, TinResult};
use crate::surface::TinSurface;
use crate::traits::PointIndex;

/// 三角网交换数据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TinData {
    /// 点坐标 `[x, y, z]`
    pub points: Vec<[f64; 3]>,
    /// 三角形顶点索引
    pub triangles: Vec<[PointIndex; 3]>,
}

impl TinData {
    /// 从 JSON 文件读取
    pub fn from_file<P: AsRef<Path>>(path: P) -> TinResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&content)
    }

    /// 从 JSON 字符串解析
    pub fn from_json(content: &str) -> TinResult<Self> {
        serde_json::from_str(content).map_err(|e| TinError::Parse(e.to_string()))
    }

    /// 保存为 JSON 文件
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> TinResult<()> {
        let content =
            serde_json::to_string_pretty(self).map_err(|e| TinError::Parse(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// 构建三角网
    pub fn into_surface(self) -> TinResult<TinSurface> {
        let points = self
            .points
            .into_iter()
            .map(|[x, y, z]| DVec3::new(x, y, z))
            .collect();
        TinSurface::new(points, self.triangles)
    }
}

impl From<&TinSurface> for TinData {
    fn from(surface: &TinSurface) -> Self {
        Self {
            points: surface.points().iter().map(|p| p.to_array()).collect(),
            triangles: surface.triangles().to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::TinAccess;

    #[test]
    fn test_parse_and_build() {
        let data = TinData::from_json(
            r#"{"points": [[0,0,10],[1,0,10],[0.5,1,0]], "triangles": [[0,1,2]]}"#,
        )
        .unwrap();
        let tin = data.into_surface().unwrap();
        assert_eq!(tin.n_triangles(), 1);
        assert_eq!(tin.elevation(2), 0.0);
    }

    #[test]
    fn test_parse_error() {
        let err = TinData::from_json("{\"points\": 3}").unwrap_err();
        assert!(matches!(err, TinError::Parse(_)));
    }

    #[test]
    fn test_file_round_trip() {
        let tin = TinSurface::from_grid(3, 2, 1.0, 1.0, |i, _| i as f64).unwrap();
        let path = std::env::temp_dir().join("dt_tin_io_round_trip.json");
        TinData::from(&tin).save_to_file(&path).unwrap();
        let loaded = TinData::from_file(&path).unwrap().into_surface().unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded.n_points(), 6);
        assert_eq!(loaded.triangles(), tin.triangles());
    }

    #[test]
    fn test_missing_file() {
        let err = TinData::from_file("/nonexistent/dt_tin.json").unwrap_err();
        assert!(matches!(err, TinError::Io(_)));
    }
}
