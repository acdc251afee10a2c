// crates/dt_foundation/src/arena.rs

//! 只追加的 Arena
//!
//! 追踪图中的节点一经创建便不会单独删除，因此 Arena 只支持追加。
//! 索引在整个生命周期内保持稳定，克隆 Arena 即复制整张图，
//! 无需重新映射任何交叉引用。
//!
//! # 示例
//!
//! ```
//! use dt_foundation::arena::{Arena, ArenaTag};
//!
//! #[derive(Debug, Clone, Copy)]
//! struct FeatureTag;
//! impl ArenaTag for FeatureTag {}
//!
//! let mut arena: Arena<i32, FeatureTag> = Arena::new();
//! let idx = arena.push(42);
//!
//! let copy = arena.clone();
//! arena[idx] = 7;
//! assert_eq!(copy[idx], 42);
//! ```

use std::marker::PhantomData;

use crate::error::{DtError, DtResult};

// ============================================================================
// 标记类型
// ============================================================================

/// Arena 标记 trait，用于区分不同用途的索引
pub trait ArenaTag: 'static + Copy + Send + Sync {}

// ============================================================================
// 索引类型
// ============================================================================

/// 轻量级类型安全索引（4字节）
///
/// 与 `u32` 内存布局相同。比较、哈希等 trait 手动实现，
/// 使标记类型本身无需实现它们。
#[repr(transparent)]
pub struct Idx<Tag> {
    index: u32,
    _marker: PhantomData<fn() -> Tag>,
}

impl<Tag> Copy for Idx<Tag> {}

impl<Tag> PartialEq for Idx<Tag> {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl<Tag> Eq for Idx<Tag> {}

impl<Tag> PartialOrd for Idx<Tag> {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<Tag> Ord for Idx<Tag> {
    #[inline]
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.index.cmp(&other.index)
    }
}

impl<Tag> std::hash::Hash for Idx<Tag> {
    #[inline]
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.index.hash(state);
    }
}

impl<Tag> std::fmt::Debug for Idx<Tag> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Idx({})", self.index)
    }
}

impl<Tag> Clone for Idx<Tag> {
    #[inline]
    fn clone(&self) -> Self {
        *self
    }
}

impl<Tag> Idx<Tag> {
    /// 由原始值创建索引
    #[inline]
    pub const fn new(index: u32) -> Self {
        Self {
            index,
            _marker: PhantomData,
        }
    }

    /// 原始索引值
    #[inline]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// 转换为 `usize`
    #[inline]
    pub const fn as_usize(self) -> usize {
        self.index as usize
    }
}

impl<Tag> std::fmt::Display for Idx<Tag> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.index)
    }
}

// ============================================================================
// Arena 实现
// ============================================================================

/// 只追加的同类型对象池
#[derive(Debug)]
pub struct Arena<T, Tag: ArenaTag> {
    items: Vec<T>,
    _marker: PhantomData<Tag>,
}

impl<T: Clone, Tag: ArenaTag> Clone for Arena<T, Tag> {
    fn clone(&self) -> Self {
        Self {
            items: self.items.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T, Tag: ArenaTag> Default for Arena<T, Tag> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, Tag: ArenaTag> Arena<T, Tag> {
    /// 创建空 Arena
    #[inline]
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            _marker: PhantomData,
        }
    }

    /// 元素数量
    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// 是否为空
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// 追加元素并返回其索引
    pub fn push(&mut self, value: T) -> Idx<Tag> {
        let idx = Idx::new(self.items.len() as u32);
        self.items.push(value);
        idx
    }

    /// 下一次 `push` 将返回的索引
    #[inline]
    pub fn next_index(&self) -> Idx<Tag> {
        Idx::new(self.items.len() as u32)
    }

    /// 获取元素
    #[inline]
    pub fn get(&self, idx: Idx<Tag>) -> Option<&T> {
        self.items.get(idx.as_usize())
    }

    /// 获取可变元素
    #[inline]
    pub fn get_mut(&mut self, idx: Idx<Tag>) -> Option<&mut T> {
        self.items.get_mut(idx.as_usize())
    }

    /// 获取元素，越界时返回错误
    pub fn try_get(&self, idx: Idx<Tag>) -> DtResult<&T> {
        let len = self.items.len();
        self.items
            .get(idx.as_usize())
            .ok_or_else(|| DtError::index_out_of_bounds("arena", idx.as_usize(), len))
    }

    /// 索引是否有效
    #[inline]
    pub fn contains(&self, idx: Idx<Tag>) -> bool {
        idx.as_usize() < self.items.len()
    }

    /// 按插入顺序遍历
    pub fn iter(&self) -> impl ExactSizeIterator<Item = (Idx<Tag>, &T)> + '_ {
        self.items
            .iter()
            .enumerate()
            .map(|(i, v)| (Idx::new(i as u32), v))
    }

    /// 按插入顺序遍历索引
    pub fn indices(&self) -> impl ExactSizeIterator<Item = Idx<Tag>> {
        (0..self.items.len() as u32).map(Idx::new)
    }
}

impl<T, Tag: ArenaTag> std::ops::Index<Idx<Tag>> for Arena<T, Tag> {
    type Output = T;

    fn index(&self, idx: Idx<Tag>) -> &Self::Output {
        &self.items[idx.as_usize()]
    }
}

impl<T, Tag: ArenaTag> std::ops::IndexMut<Idx<Tag>> for Arena<T, Tag> {
    fn index_mut(&mut self, idx: Idx<Tag>) -> &mut Self::Output {
        &mut self.items[idx.as_usize()]
    }
}

// ============================================================================
// 测试
// ============================================================================
