// crates/dt_foundation/src/error.rs

//! 基础错误类型
//!
//! 提供 `DtError` 枚举和 `DtResult` 类型别名。领域相关的错误
//! （地形、配置、径流分析）在各自的 crate 中定义，并可由本类型转换而来。
//!
//! # 示例
//!
//! ```
//! use dt_foundation::error::{DtError, DtResult};
//!
//! fn check(len: usize) -> DtResult<()> {
//!     if len == 0 {
//!         return Err(DtError::invalid_input("空输入"));
//!     }
//!     Ok(())
//! }
//! assert!(check(0).is_err());
//! ```

use thiserror::Error;

/// 统一结果类型
pub type DtResult<T> = Result<T, DtError>;

/// DrainTrace 基础错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DtError {
    /// 无效输入
    #[error("无效的输入数据: {message}")]
    InvalidInput {
        /// 说明无效原因
        message: String,
    },

    /// 索引越界
    #[error("索引越界: {index_type} 索引 {index} 超出范围 0..{len}")]
    IndexOutOfBounds {
        /// 索引类别描述
        index_type: &'static str,
        /// 访问的索引
        index: usize,
        /// 上界（长度）
        len: usize,
    },

    /// 数值不是有限值
    #[error("非有限数值: {field}={value}")]
    NonFinite {
        /// 字段名
        field: &'static str,
        /// 实际值
        value: f64,
    },

    /// 内部错误
    #[error("内部错误: {message}")]
    Internal {
        /// 内部错误描述
        message: String,
    },
}

impl DtError {
    /// 创建无效输入错误
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// 创建索引越界错误
    pub fn index_out_of_bounds(index_type: &'static str, index: usize, len: usize) -> Self {
        Self::IndexOutOfBounds {
            index_type,
            index,
            len,
        }
    }

    /// 创建内部错误
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// 检查索引范围
    #[inline]
    pub fn check_index(index_type: &'static str, index: usize, len: usize) -> DtResult<()> {
        if index < len {
            Ok(())
        } else {
            Err(Self::index_out_of_bounds(index_type, index, len))
        }
    }

    /// 检查数值是否有限
    #[inline]
    pub fn check_finite(field: &'static str, value: f64) -> DtResult<()> {
        if value.is_finite() {
            Ok(())
        } else {
            Err(Self::NonFinite { field, value })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DtError::index_out_of_bounds("point", 5, 3);
        assert!(err.to_string().contains("point"));
        assert!(err.to_string().contains('5'));
    }

    #[test]
    fn test_check_index() {
        assert!(DtError::check_index("triangle", 2, 3).is_ok());
        assert!(DtError::check_index("triangle", 3, 3).is_err());
    }

    #[test]
    fn test_check_finite() {
        assert!(DtError::check_finite("z", 1.0).is_ok());
        assert!(matches!(
            DtError::check_finite("z", f64::NAN),
            Err(DtError::NonFinite { field: "z", .. })
        ));
    }
}
