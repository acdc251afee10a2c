// crates/dt_foundation/src/tolerance.rs

//! 追踪几何容差
//!
//! 最速下降追踪和洪水填充中的所有浮点比较都通过 [`TraceTolerance`]
//! 进行，以参数注入方式传递，不使用全局状态。

/// 追踪几何容差配置
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TraceTolerance {
    /// 边参数吸附容差：沿边参数距端点小于此值时视为落在顶点上
    pub snap: f64,
    /// 坡度阈值：梯度模小于此值视为平坦
    pub flat_slope: f64,
    /// 平行判断容差（二维叉积）
    pub parallel: f64,
    /// 高程相等容差 [m]
    pub elevation: f64,
    /// 面积下限 [m²]
    pub min_area: f64,
}

impl Default for TraceTolerance {
    fn default() -> Self {
        Self {
            snap: 1e-9,
            flat_slope: 1e-12,
            parallel: 1e-14,
            elevation: 1e-9,
            min_area: 1e-14,
        }
    }
}

impl TraceTolerance {
    /// 宽松配置，适用于坐标量级很大的地形
    pub fn relaxed() -> Self {
        Self {
            snap: 1e-7,
            flat_slope: 1e-9,
            parallel: 1e-12,
            elevation: 1e-6,
            min_area: 1e-10,
        }
    }

    /// 坡度是否为零
    #[inline]
    pub fn is_flat(&self, slope: f64) -> bool {
        slope.abs() < self.flat_slope
    }

    /// 两个高程是否相等
    #[inline]
    pub fn same_elevation(&self, a: f64, b: f64) -> bool {
        (a - b).abs() <= self.elevation
    }

    /// `a` 是否严格低于 `b`
    #[inline]
    pub fn is_below(&self, a: f64, b: f64) -> bool {
        a < b - self.elevation
    }

    /// 叉积是否视为平行
    #[inline]
    pub fn is_parallel(&self, cross: f64) -> bool {
        cross.abs() < self.parallel
    }

    /// 沿边参数是否吸附到起点
    #[inline]
    pub fn snaps_to_start(&self, u: f64) -> bool {
        u <= self.snap
    }

    /// 沿边参数是否吸附到终点
    #[inline]
    pub fn snaps_to_end(&self, u: f64) -> bool {
        u >= 1.0 - self.snap
    }

    /// 面积是否退化
    #[inline]
    pub fn is_degenerate_area(&self, area: f64) -> bool {
        area.abs() < self.min_area
    }
}
