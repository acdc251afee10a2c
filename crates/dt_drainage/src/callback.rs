// crates/dt_drainage/src/callback.rs

//! 推送式结果输出
//!
//! [`WaterAnalysis::do_trace_callback`] 按节点创建顺序把几何逐条推给
//! [`FeatureSink`]，可见性规则与 [`WaterAnalysis::get_result`] 相同。
//! 任一调用返回错误时立即停止。在高程取反视图上分析时，流线以
//! [`DtmFeatureType::AscentTrace`] 推送，水塘最低点以 [`DtmFeatureType::HighPoint`] 推送。

use dt_tin::TinAccess;
use glam::DVec3;

use crate::analysis::WaterAnalysis;
use crate::error::DrainageResult;
use crate::features::FeatureType;
use crate::result::{PointKind, ResultItem};

/// 推送的要素类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DtmFeatureType {
    /// 下降流线
    DescentTrace,
    /// 上溯流线
    AscentTrace,
    /// 水塘最低点
    LowPoint,
    /// 上溯终点（山顶）
    HighPoint,
    /// 水塘边界环
    Pond,
    /// 水塘溢出点
    PondExit,
    /// 起点
    StartPoint,
    /// 水流离开三角网的位置
    ExitPoint,
}

/// 要素接收端
pub trait FeatureSink {
    /// 接收一条要素
    fn load(
        &mut self,
        feature_type: DtmFeatureType,
        user_tag: i64,
        feature_id: u64,
        points: &[DVec3],
    ) -> DrainageResult<()>;

    /// 全部要素推送完毕
    fn finish(&mut self) -> DrainageResult<()> {
        Ok(())
    }
}

impl<F> FeatureSink for F
where
    F: FnMut(DtmFeatureType, i64, u64, &[DVec3]) -> DrainageResult<()>,
{
    fn load(
        &mut self,
        feature_type: DtmFeatureType,
        user_tag: i64,
        feature_id: u64,
        points: &[DVec3],
    ) -> DrainageResult<()> {
        self(feature_type, user_tag, feature_id, points)
    }
}

impl DtmFeatureType {
    /// 是否为流线
    pub fn is_trace(self) -> bool {
        matches!(self, DtmFeatureType::DescentTrace | DtmFeatureType::AscentTrace)
    }
}

/// 把首尾相接的连续流线拼成一条再转发
#[derive(Debug)]
pub struct FeatureJoiner<S> {
    sink: S,
    pending: Option<(DtmFeatureType, i64, u64, Vec<DVec3>)>,
}

impl<S: FeatureSink> FeatureJoiner<S> {
    /// 包装接收端
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            pending: None,
        }
    }

    /// 取回接收端（未刷新的流线会丢失，先调用 `finish`）
    pub fn into_inner(self) -> S {
        self.sink
    }

    fn flush(&mut self) -> DrainageResult<()> {
        match self.pending.take() {
            Some((ty, tag, id, points)) => self.sink.load(ty, tag, id, &points),
            None => Ok(()),
        }
    }
}

impl<S: FeatureSink> FeatureSink for FeatureJoiner<S> {
    fn load(
        &mut self,
        feature_type: DtmFeatureType,
        user_tag: i64,
        feature_id: u64,
        points: &[DVec3],
    ) -> DrainageResult<()> {
        if !feature_type.is_trace() {
            self.flush()?;
            return self.sink.load(feature_type, user_tag, feature_id, points);
        }
        if let Some((ty, tag, _, joined)) = &mut self.pending {
            if *ty == feature_type
                && *tag == user_tag
                && !points.is_empty()
                && joined.last() == points.first()
            {
                joined.extend_from_slice(&points[1..]);
                return Ok(());
            }
        }
        self.flush()?;
        self.pending = Some((feature_type, user_tag, feature_id, points.to_vec()));
        Ok(())
    }

    fn finish(&mut self) -> DrainageResult<()> {
        self.flush()?;
        self.sink.finish()
    }
}

impl<T: TinAccess> WaterAnalysis<'_, T> {
    /// 把可见节点的几何推给 `sink`，返回推送条数
    pub fn do_trace_callback<S: FeatureSink>(
        &self,
        sink: &mut S,
        user_tag: i64,
    ) -> DrainageResult<usize> {
        let inverted = self.tin().is_inverted();
        let (trace_type, low_type) = if inverted {
            (DtmFeatureType::AscentTrace, DtmFeatureType::HighPoint)
        } else {
            (DtmFeatureType::DescentTrace, DtmFeatureType::LowPoint)
        };
        let mut count = 0;
        let mut items = Vec::new();
        for (id, feature) in self.features() {
            if !self.is_visible(feature) {
                continue;
            }
            items.clear();
            feature.add_result(id, self.is_water_mode(), &mut items);
            if inverted {
                items.iter_mut().for_each(ResultItem::flip_elevation);
            }
            let mut exit_marker = feature.feature_type() == FeatureType::PondExit;
            let feature_id = u64::from(id.index());
            for item in &items {
                match item {
                    ResultItem::Point { location, kind, .. } => {
                        let ty = match kind {
                            PointKind::Start => DtmFeatureType::StartPoint,
                            PointKind::Low => low_type,
                            // 溢出口的第一个点是溢出点，其后是离开三角网的位置
                            PointKind::Exit if exit_marker => {
                                exit_marker = false;
                                DtmFeatureType::PondExit
                            }
                            PointKind::Exit => DtmFeatureType::ExitPoint,
                        };
                        sink.load(ty, user_tag, feature_id, std::slice::from_ref(location))?;
                        count += 1;
                    }
                    ResultItem::Stream { points, .. } => {
                        sink.load(trace_type, user_tag, feature_id, points)?;
                        count += 1;
                    }
                    ResultItem::Pond { boundaries, .. } => {
                        for ring in boundaries {
                            sink.load(DtmFeatureType::Pond, user_tag, feature_id, ring)?;
                            count += 1;
                        }
                    }
                }
            }
        }
        sink.finish()?;
        tracing::debug!("推送 {} 条要素", count);
        Ok(count)
    }
}
