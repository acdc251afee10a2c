// crates/dt_drainage/src/pond_analysis.rs

//! 水塘淹没分析
//!
//! 从一个或多个种子盆地出发，按高程由低到高逐级淹没相邻的点：
//!
//! - 候选点按高程放入最小堆，每一级弹出同一高程上的全部候选点
//! - 候选点若有更低且未淹没的邻点，则为溢出口（不淹没），否则淹没并压入其邻点
//! - 凸包上的候选点总是溢出口（水从三角网边缘流出）；全部点都在凸包上的
//!   三角网除外，此时没有出水口，水塘只能无限抬升
//! - 两个区域在同一点相遇时合并（并查集），溢出口列表随之转移
//! - 任一区域出现溢出口时，整个淹没在该高程停止
//!
//! 水位与体积的关系 `V(h)` 单调不减，按体积求水位时先逐级扫描找到
//! 包含目标体积的区间，再用弦截法与二分交替细化。

use std::cmp::Ordering;
use std::collections::{BTreeSet, BinaryHeap, HashMap};

use dt_config::DrainageConfig;
use dt_foundation::TraceTolerance;
use dt_tin::{PointIndex, TinAccess, TriangleIndex};
use glam::DVec3;

use crate::boundary::{ring_polygon, trace_rings, BoundaryList, Location, PointUsage};
use crate::error::{DrainageError, DrainageResult};
use crate::volume::{fill_volume, polygon_area, wet_area};

// ============================================================================
// 种子与结果类型
// ============================================================================

/// 淹没的起始盆地
#[derive(Debug, Clone, PartialEq)]
pub enum PondSeed {
    /// 单个局部最低点
    Point(PointIndex),
    /// 水平边的两个端点
    Edge(PointIndex, PointIndex),
    /// 水平三角形的三个顶点
    Triangle([PointIndex; 3]),
    /// 由溢出口合并的多个盆地，体积从溢出口高程起算
    Exit {
        /// 合并处的溢出口（不会再被视为溢出口）
        exit: PointIndex,
        /// 各子盆地的种子点
        basins: Vec<Vec<PointIndex>>,
    },
}

impl PondSeed {
    /// 各盆地的种子点
    pub fn basins(&self) -> Vec<Vec<PointIndex>> {
        match self {
            PondSeed::Point(p) => vec![vec![*p]],
            PondSeed::Edge(a, b) => vec![vec![*a, *b]],
            PondSeed::Triangle(v) => vec![v.to_vec()],
            PondSeed::Exit { basins, .. } => basins.clone(),
        }
    }

    /// 全部种子点
    pub fn points(&self) -> Vec<PointIndex> {
        self.basins().into_iter().flatten().collect()
    }

    /// 合并溢出口
    pub fn base_exit(&self) -> Option<PointIndex> {
        match self {
            PondSeed::Exit { exit, .. } => Some(*exit),
            _ => None,
        }
    }
}

/// 水塘在溢出高程（或封闭时的最终高程）下的范围
#[derive(Debug, Clone, PartialEq)]
pub struct PondExtent {
    /// 最低点高程
    pub low_z: f64,
    /// 溢出高程；封闭水塘为淹没到的最高高程
    pub level: f64,
    /// 溢出口
    pub exits: Vec<PointIndex>,
    /// 容量；封闭水塘为 `None`
    pub capacity: Option<f64>,
    /// 水面面积
    pub area: f64,
    /// 与最低点同高程的淹没点
    pub low_points: Vec<PointIndex>,
    /// 水面多边形（外边界在前）
    pub boundaries: Vec<Vec<DVec3>>,
}

impl PondExtent {
    /// 是否封闭（没有溢出口）
    pub fn is_enclosed(&self) -> bool {
        self.exits.is_empty()
    }

    /// 水深
    pub fn depth(&self) -> f64 {
        self.level - self.low_z
    }
}

/// 按体积或高程求水位的结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VolumeFit {
    /// 在溢出前达到目标
    Reached {
        /// 水位
        level: f64,
        /// 该水位下的体积
        volume: f64,
    },
    /// 目标超出容量，停在溢出高程
    Overflow {
        /// 溢出高程
        level: f64,
        /// 容量
        volume: f64,
    },
}

impl VolumeFit {
    /// 水位
    pub fn level(&self) -> f64 {
        match *self {
            VolumeFit::Reached { level, .. } | VolumeFit::Overflow { level, .. } => level,
        }
    }

    /// 体积
    pub fn volume(&self) -> f64 {
        match *self {
            VolumeFit::Reached { volume, .. } | VolumeFit::Overflow { volume, .. } => volume,
        }
    }

    /// 是否溢出
    pub fn is_overflow(&self) -> bool {
        matches!(self, VolumeFit::Overflow { .. })
    }
}

/// 最近一次细化的区间
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RefineBracket {
    /// 区间下界高程
    pub min_z: f64,
    /// 区间上界高程
    pub max_z: f64,
    /// 下界体积
    pub min_volume: f64,
    /// 上界体积
    pub max_volume: f64,
}

// ============================================================================
// 扫描状态
// ============================================================================

#[derive(Debug, Clone, Copy)]
struct Candidate {
    z: f64,
    point: PointIndex,
    pond: usize,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    // BinaryHeap 为最大堆，反转后最低的候选点在堆顶
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .z
            .total_cmp(&self.z)
            .then_with(|| other.point.cmp(&self.point))
            .then_with(|| other.pond.cmp(&self.pond))
    }
}

/// 正在扩展的淹没区域
#[derive(Debug, Clone, Default)]
pub struct ExpandingPond {
    merged_into: Option<usize>,
    low_z: f64,
    n_points: usize,
    exits: Vec<PointIndex>,
}

impl ExpandingPond {
    fn new(low_z: f64) -> Self {
        Self {
            low_z,
            ..Default::default()
        }
    }

    /// 把另一区域的溢出口移入本区域
    fn swap_exits(&mut self, other: &mut ExpandingPond) {
        for e in other.exits.drain(..) {
            if !self.exits.contains(&e) {
                self.exits.push(e);
            }
        }
    }

    /// 区域最低高程
    pub fn low_z(&self) -> f64 {
        self.low_z
    }

    /// 区域点数
    pub fn n_points(&self) -> usize {
        self.n_points
    }
}

#[derive(Debug, Clone, Default)]
struct Sweep {
    level: f64,
    regions: Vec<ExpandingPond>,
    owner: HashMap<PointIndex, usize>,
    heap: BinaryHeap<Candidate>,
    wet: BTreeSet<TriangleIndex>,
    exits: Vec<PointIndex>,
    exit_level: Option<f64>,
    hull_exits: bool,
}

impl Sweep {
    fn start<T: TinAccess>(tin: &T, basins: &[Vec<PointIndex>], hull_exits: bool) -> Self {
        let level = basins
            .iter()
            .flatten()
            .map(|&p| tin.elevation(p))
            .fold(f64::INFINITY, f64::min);
        let mut sweep = Sweep {
            level,
            hull_exits,
            ..Default::default()
        };
        for basin in basins {
            let low = basin
                .iter()
                .map(|&p| tin.elevation(p))
                .fold(f64::INFINITY, f64::min);
            let r = sweep.regions.len();
            sweep.regions.push(ExpandingPond::new(low));
            for &p in basin {
                sweep.claim(tin, p, r);
            }
        }
        sweep
    }

    fn find(&self, mut r: usize) -> usize {
        while let Some(next) = self.regions[r].merged_into {
            r = next;
        }
        r
    }

    fn owner_of(&self, p: PointIndex) -> Option<usize> {
        self.owner.get(&p).map(|&r| self.find(r))
    }

    fn is_owned(&self, p: PointIndex) -> bool {
        self.owner.contains_key(&p)
    }

    fn claim<T: TinAccess>(&mut self, tin: &T, p: PointIndex, r: usize) {
        let r = self.find(r);
        match self.owner_of(p) {
            Some(o) if o == r => return,
            Some(o) => {
                self.merge(r, o);
                return;
            }
            None => {}
        }
        self.owner.insert(p, r);
        self.regions[r].n_points += 1;
        self.wet.extend(tin.incident_triangles(p));
        for &n in tin.neighbors(p) {
            if self.owner_of(n) != Some(r) {
                self.heap.push(Candidate {
                    z: tin.elevation(n).max(self.level),
                    point: n,
                    pond: r,
                });
            }
        }
    }

    fn merge(&mut self, a: usize, b: usize) -> usize {
        let (a, b) = (self.find(a), self.find(b));
        if a == b {
            return a;
        }
        let (keep, gone) = (a.min(b), a.max(b));
        let mut absorbed = std::mem::take(&mut self.regions[gone]);
        absorbed.merged_into = Some(keep);
        let region = &mut self.regions[keep];
        region.swap_exits(&mut absorbed);
        region.n_points += absorbed.n_points;
        region.low_z = region.low_z.min(absorbed.low_z);
        absorbed.n_points = 0;
        self.regions[gone] = absorbed;
        tracing::trace!("淹没区域 {} 并入 {}, 水位 {:.3}", gone, keep, self.level);
        keep
    }

    /// 下一个待处理候选点的高程，`None` 表示区域已无法扩展
    fn peek_level(&mut self) -> Option<f64> {
        while let Some(top) = self.heap.peek().copied() {
            let r = self.find(top.pond);
            if self.owner_of(top.point) == Some(r) {
                self.heap.pop();
                continue;
            }
            return Some(top.z);
        }
        None
    }

    /// 淹没到高程 `h`，处理该高程上的全部候选点
    fn expand<T: TinAccess>(
        &mut self,
        tin: &T,
        h: f64,
        tol: &TraceTolerance,
        base: Option<PointIndex>,
    ) {
        self.level = self.level.max(h);
        let mut found = false;
        while let Some(top) = self.heap.peek().copied() {
            if top.z > h + tol.elevation {
                break;
            }
            self.heap.pop();
            let r = self.find(top.pond);
            match self.owner_of(top.point) {
                Some(o) if o == r => continue,
                Some(o) => {
                    self.merge(r, o);
                    continue;
                }
                None => {}
            }
            if Some(top.point) != base && self.spills(tin, top.point, tol) {
                let exits = &mut self.regions[r].exits;
                if !exits.contains(&top.point) {
                    exits.push(top.point);
                }
                found = true;
            } else {
                self.claim(tin, top.point, r);
            }
        }
        if found {
            self.collect_exits(h);
        }
    }

    /// 点是否有更低且未淹没的邻点，或位于凸包上
    fn spills<T: TinAccess>(&self, tin: &T, p: PointIndex, tol: &TraceTolerance) -> bool {
        if self.hull_exits && tin.is_hull_point(p) {
            return true;
        }
        let z = tin.elevation(p);
        tin.neighbors(p)
            .iter()
            .any(|&n| tol.is_below(tin.elevation(n), z) && !self.is_owned(n))
    }

    fn collect_exits(&mut self, h: f64) {
        let mut exits = Vec::new();
        for (i, region) in self.regions.iter().enumerate() {
            if region.merged_into.is_none() && self.find(i) == i {
                for &e in &region.exits {
                    if !exits.contains(&e) {
                        exits.push(e);
                    }
                }
            }
        }
        self.exits = exits;
        self.exit_level = Some(h);
    }
}

// ============================================================================
// PondAnalysis
// ============================================================================

/// 水塘淹没分析器
#[derive(Debug, Clone)]
pub struct PondAnalysis {
    seed: PondSeed,
    tol: TraceTolerance,
    elevation_tolerance: f64,
    volume_tolerance: f64,
    max_iterations: usize,
    hull_exits: bool,
    low_z: f64,
    base_level: Option<f64>,
    sweep: Sweep,
    usage: PointUsage,
    overflow_region: Vec<PointIndex>,
    low_points: Vec<PointIndex>,
    bracket: RefineBracket,
}

impl PondAnalysis {
    /// 创建分析器
    pub fn new(seed: PondSeed, config: &DrainageConfig, tol: TraceTolerance) -> Self {
        Self {
            seed,
            tol,
            elevation_tolerance: config.pond_elevation_tolerance,
            volume_tolerance: config.pond_volume_tolerance,
            max_iterations: config.max_refine_iterations,
            hull_exits: true,
            low_z: f64::NAN,
            base_level: None,
            sweep: Sweep::default(),
            usage: PointUsage::new(),
            overflow_region: Vec::new(),
            low_points: Vec::new(),
            bracket: RefineBracket::default(),
        }
    }

    /// 凸包点是否作为溢出口（默认是）
    pub fn with_hull_exits(mut self, hull_exits: bool) -> Self {
        self.hull_exits = hull_exits;
        self
    }

    /// 种子
    pub fn seed(&self) -> &PondSeed {
        &self.seed
    }

    /// 最低点高程（首次分析前为 NaN）
    pub fn low_z(&self) -> f64 {
        self.low_z
    }

    /// 当前水位
    pub fn level(&self) -> f64 {
        self.sweep.level
    }

    /// 溢出高程
    pub fn exit_level(&self) -> Option<f64> {
        self.sweep.exit_level
    }

    /// 当前扫描找到的溢出口
    pub fn get_outer_exits(&self) -> &[PointIndex] {
        &self.sweep.exits
    }

    /// 当前水位下点是否被淹没
    pub fn contains(&self, p: PointIndex) -> bool {
        self.sweep.is_owned(p)
    }

    /// 溢出高程下点是否被淹没
    pub fn contains_at_overflow(&self, p: PointIndex) -> bool {
        self.overflow_region.binary_search(&p).is_ok()
    }

    /// 溢出高程下的淹没点（有序）
    pub fn overflow_region(&self) -> &[PointIndex] {
        &self.overflow_region
    }

    /// 与最低点同高程的淹没点
    pub fn low_points(&self) -> &[PointIndex] {
        &self.low_points
    }

    /// 淹没区域（含已合并的）
    pub fn regions(&self) -> &[ExpandingPond] {
        &self.sweep.regions
    }

    /// 最近一次细化的区间
    pub fn bracket(&self) -> RefineBracket {
        self.bracket
    }

    fn restart<T: TinAccess>(&mut self, tin: &T) -> DrainageResult<()> {
        let basins = self.seed.basins();
        let n = tin.n_points();
        if basins.iter().all(Vec::is_empty) {
            return Err(DrainageError::degenerate("水塘没有种子点"));
        }
        if let Some(&bad) = basins.iter().flatten().find(|&&p| p as usize >= n) {
            return Err(DrainageError::degenerate(format!("水塘种子点 {bad} 超出范围")));
        }
        self.sweep = Sweep::start(tin, &basins, self.hull_exits);
        self.low_z = self.sweep.level;
        self.base_level = self.seed.base_exit().map(|e| tin.elevation(e));

        // 种子本身有更低的去处：零深度水塘，溢出口即种子点
        let base = self.seed.base_exit();
        let mut owned: Vec<PointIndex> = self.sweep.owner.keys().copied().collect();
        owned.sort_unstable();
        let spilling: Vec<PointIndex> = owned
            .into_iter()
            .filter(|&p| Some(p) != base && self.sweep.spills(tin, p, &self.tol))
            .collect();
        if !spilling.is_empty() {
            for &p in &spilling {
                if let Some(r) = self.sweep.owner_of(p) {
                    self.sweep.regions[r].exits.push(p);
                }
            }
            let level = self.sweep.level;
            self.sweep.collect_exits(level);
        }
        Ok(())
    }

    fn step_guard<T: TinAccess>(&self, tin: &T) -> usize {
        2 * tin.n_points() + self.sweep.regions.len() + 8
    }

    /// 未淹没的顶点不低于水位（溢出口外侧的低点不参与蓄水）
    fn effective_z(&self, ids: [PointIndex; 3], pts: [DVec3; 3], level: f64) -> [f64; 3] {
        std::array::from_fn(|k| {
            if self.sweep.is_owned(ids[k]) {
                pts[k].z
            } else {
                pts[k].z.max(level)
            }
        })
    }

    /// 水位 `h` 下的蓄水体积（合并水塘扣除合并溢出口以下的部分）
    pub fn volume_at<T: TinAccess>(&self, tin: &T, h: f64) -> f64 {
        let mut v = 0.0;
        for &t in &self.sweep.wet {
            let ids = tin.triangle(t);
            let pts = tin.triangle_points(t);
            let xy = pts.map(|p| p.truncate());
            let effective = |lvl: f64| self.effective_z(ids, pts, lvl);
            v += fill_volume(xy, effective(h), h);
            if let Some(b) = self.base_level {
                v -= fill_volume(xy, effective(b), b);
            }
        }
        v.max(0.0)
    }

    /// 水位 `h` 下的水面面积
    pub fn area_at<T: TinAccess>(&self, tin: &T, h: f64) -> f64 {
        self.sweep
            .wet
            .iter()
            .map(|&t| {
                let ids = tin.triangle(t);
                let pts = tin.triangle_points(t);
                wet_area(pts.map(|p| p.truncate()), self.effective_z(ids, pts, h), h)
            })
            .sum()
    }

    /// 当前水位下的体积
    pub fn get_current_volume<T: TinAccess>(&self, tin: &T) -> f64 {
        self.volume_at(tin, self.sweep.level)
    }

    /// 淹没到第一个溢出口，或在无法扩展时停止（封闭水塘）
    pub fn find_pond<T: TinAccess>(&mut self, tin: &T) -> DrainageResult<PondExtent> {
        self.restart(tin)?;
        let guard = self.step_guard(tin);
        let mut steps = 0;
        while self.sweep.exit_level.is_none() {
            let Some(h) = self.sweep.peek_level() else {
                break;
            };
            self.sweep.expand(tin, h, &self.tol, self.seed.base_exit());
            steps += 1;
            if steps > guard {
                return Err(DrainageError::degenerate("淹没扫描未结束"));
            }
        }

        let level = self.sweep.exit_level.unwrap_or(self.sweep.level);
        self.sweep.level = level;
        let capacity = self.sweep.exit_level.map(|h| self.volume_at(tin, h));

        let mut region: Vec<PointIndex> = self.sweep.owner.keys().copied().collect();
        region.sort_unstable();
        self.low_points = region
            .iter()
            .copied()
            .filter(|&p| self.tol.same_elevation(tin.elevation(p), self.low_z))
            .collect();
        self.overflow_region = region;

        let boundaries = self.get_boundary(tin)?;
        let extent = PondExtent {
            low_z: self.low_z,
            level,
            exits: self.sweep.exits.clone(),
            capacity,
            area: self.area_at(tin, level),
            low_points: self.low_points.clone(),
            boundaries,
        };
        tracing::trace!(
            "水塘淹没完成: 低点 {:.3}, 水位 {:.3}, {} 个溢出口, {} 个点",
            extent.low_z,
            extent.level,
            extent.exits.len(),
            self.overflow_region.len()
        );
        Ok(extent)
    }

    /// 求蓄水体积为 `target` 时的水位，超出容量时停在溢出高程
    pub fn find_boundary_for_volume<T: TinAccess>(
        &mut self,
        tin: &T,
        target: f64,
    ) -> DrainageResult<VolumeFit> {
        self.restart(tin)?;
        if let Some(h) = self.sweep.exit_level {
            return Ok(VolumeFit::Overflow {
                level: h,
                volume: 0.0,
            });
        }
        if target <= 0.0 {
            let level = self.sweep.level;
            return Ok(self.settle(tin, level));
        }

        let guard = self.step_guard(tin);
        let mut lo = self.sweep.level;
        let mut lo_vol = self.volume_at(tin, lo);
        for _ in 0..guard {
            match self.sweep.peek_level() {
                Some(h) => {
                    let v = self.volume_at(tin, h);
                    if v >= target {
                        let level = self.refine(tin, target, (lo, lo_vol), (h, v))?;
                        return Ok(self.settle(tin, level));
                    }
                    self.sweep.expand(tin, h, &self.tol, self.seed.base_exit());
                    if let Some(x) = self.sweep.exit_level {
                        self.sweep.level = x;
                        return Ok(VolumeFit::Overflow {
                            level: x,
                            volume: self.volume_at(tin, x),
                        });
                    }
                    lo = h;
                    lo_vol = v;
                }
                None => {
                    // 已淹没整个连通区域，水位只能继续向上抬升
                    let mut step = (lo - self.low_z).abs().max(1.0);
                    let mut hi = lo + step;
                    let mut hi_vol = self.volume_at(tin, hi);
                    let mut doublings = 0;
                    while hi_vol < target {
                        lo = hi;
                        lo_vol = hi_vol;
                        step *= 2.0;
                        hi = lo + step;
                        hi_vol = self.volume_at(tin, hi);
                        doublings += 1;
                        if doublings > self.max_iterations || !hi_vol.is_finite() {
                            return Err(DrainageError::VolumeRefinementFailed {
                                target,
                                achieved: hi_vol,
                                iterations: doublings,
                            });
                        }
                    }
                    let level = self.refine(tin, target, (lo, lo_vol), (hi, hi_vol))?;
                    return Ok(self.settle(tin, level));
                }
            }
        }
        Err(DrainageError::degenerate("按体积求水位时扫描未结束"))
    }

    /// 求水位为 `z` 时的淹没范围，溢出高程低于 `z` 时停在溢出高程
    pub fn find_boundary_for_elevation<T: TinAccess>(
        &mut self,
        tin: &T,
        z: f64,
    ) -> DrainageResult<VolumeFit> {
        self.restart(tin)?;
        if let Some(h) = self.sweep.exit_level {
            return Ok(VolumeFit::Overflow {
                level: h,
                volume: 0.0,
            });
        }
        let guard = self.step_guard(tin);
        for _ in 0..guard {
            match self.sweep.peek_level() {
                Some(h) if h <= z => {
                    self.sweep.expand(tin, h, &self.tol, self.seed.base_exit());
                    if let Some(x) = self.sweep.exit_level {
                        self.sweep.level = x;
                        return Ok(VolumeFit::Overflow {
                            level: x,
                            volume: self.volume_at(tin, x),
                        });
                    }
                }
                _ => {
                    let level = z.max(self.sweep.level);
                    return Ok(self.settle(tin, level));
                }
            }
        }
        Err(DrainageError::degenerate("按高程求范围时扫描未结束"))
    }

    fn settle<T: TinAccess>(&mut self, tin: &T, level: f64) -> VolumeFit {
        self.sweep.level = level;
        VolumeFit::Reached {
            level,
            volume: self.volume_at(tin, level),
        }
    }

    /// 在 `[lo, hi]` 内求 `V(z) = target`，弦截法与二分交替
    fn refine<T: TinAccess>(
        &mut self,
        tin: &T,
        target: f64,
        (mut lo, mut vlo): (f64, f64),
        (mut hi, mut vhi): (f64, f64),
    ) -> DrainageResult<f64> {
        // 小体积时容差按目标的 1% 收紧
        let vol_tol = self.volume_tolerance.min(0.01 * target);
        for iteration in 0..self.max_iterations {
            self.bracket = RefineBracket {
                min_z: lo,
                max_z: hi,
                min_volume: vlo,
                max_volume: vhi,
            };
            if (vhi - target).abs() <= vol_tol {
                return Ok(hi);
            }
            if (target - vlo).abs() <= vol_tol {
                return Ok(lo);
            }
            if hi - lo < self.elevation_tolerance {
                let t = if vhi > vlo {
                    ((target - vlo) / (vhi - vlo)).clamp(0.0, 1.0)
                } else {
                    0.5
                };
                return Ok(lo + (hi - lo) * t);
            }
            let z = if iteration % 2 == 0 && vhi > vlo {
                lo + (hi - lo) * ((target - vlo) / (vhi - vlo)).clamp(0.0, 1.0)
            } else {
                0.5 * (lo + hi)
            };
            let v = self.volume_at(tin, z);
            if v < target {
                lo = z;
                vlo = v;
            } else {
                hi = z;
                vhi = v;
            }
        }
        Err(DrainageError::VolumeRefinementFailed {
            target,
            achieved: vhi,
            iterations: self.max_iterations,
        })
    }

    fn boundary_lists<T: TinAccess>(
        &mut self,
        tin: &T,
        merge_outer: bool,
    ) -> DrainageResult<Vec<BoundaryList>> {
        let rings = trace_rings(tin, &self.sweep.wet)?;
        let lists = {
            let mut scope = self.usage.scope();
            for ring in rings {
                scope.add(ring);
            }
            scope.split_self_touching();
            scope.classify(tin);
            if merge_outer {
                scope.merge_outer();
            }
            scope.to_lists()
        };
        debug_assert!(self.usage.is_clear());
        Ok(lists)
    }

    /// 当前水位下的水面多边形（外边界按面积从大到小在前，岛屿在后）
    pub fn get_boundary<T: TinAccess>(&mut self, tin: &T) -> DrainageResult<Vec<Vec<DVec3>>> {
        let level = self.sweep.level;
        let mut lists = self.boundary_lists(tin, false)?;
        lists.sort_by(|a, b| {
            let rank = |l: &BoundaryList| (l.location() != Location::Outer) as u8;
            rank(a)
                .cmp(&rank(b))
                .then_with(|| b.signed_area(tin).abs().total_cmp(&a.signed_area(tin).abs()))
        });
        let sweep = &self.sweep;
        let mut polygons = Vec::with_capacity(lists.len());
        for list in &lists {
            let poly = ring_polygon(tin, list, level, |p| sweep.is_owned(p))?;
            if poly.len() >= 4 && polygon_area(&poly[..poly.len() - 1]).abs() > self.tol.min_area {
                polygons.push(poly);
            }
        }
        Ok(polygons)
    }

    /// 当前水位下面积最大的外轮廓，共享顶点的外边界合并为一条
    pub fn get_outer_boundary<T: TinAccess>(&mut self, tin: &T) -> DrainageResult<Vec<DVec3>> {
        let level = self.sweep.level;
        let lists = self.boundary_lists(tin, true)?;
        let outer = lists
            .iter()
            .filter(|l| l.location() == Location::Outer)
            .max_by(|a, b| a.signed_area(tin).total_cmp(&b.signed_area(tin)));
        match outer {
            Some(list) => {
                let sweep = &self.sweep;
                ring_polygon(tin, list, level, |p| sweep.is_owned(p))
            }
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dt_tin::TinSurface;

    fn analysis(seed: PondSeed) -> PondAnalysis {
        PondAnalysis::new(seed, &DrainageConfig::default(), TraceTolerance::default())
    }

    /// 5x5 网格：中心 0，内圈 4，内圈东侧 (3,2) 为 3；外圈 10，东侧 (4,2) 为 1
    fn notched_bowl() -> TinSurface {
        TinSurface::from_grid(5, 5, 1.0, 1.0, |i, j| {
            let outer = i == 0 || j == 0 || i == 4 || j == 4;
            match (i, j) {
                (2, 2) => 0.0,
                (3, 2) => 3.0,
                (4, 2) => 1.0,
                _ if outer => 10.0,
                _ => 4.0,
            }
        })
        .unwrap()
    }

    /// 7x3 网格：中间一行 [10, 3, 1, 5, 2, 3, 10]，其余 10
    fn twin_basins() -> TinSurface {
        const MID: [f64; 7] = [10.0, 3.0, 1.0, 5.0, 2.0, 3.0, 10.0];
        TinSurface::from_grid(7, 3, 1.0, 1.0, |i, j| if j == 1 { MID[i] } else { 10.0 }).unwrap()
    }

    fn pit() -> TinSurface {
        TinSurface::from_grid(3, 3, 1.0, 1.0, |i, j| if (i, j) == (1, 1) { 0.0 } else { 2.0 }).unwrap()
    }

    #[test]
    fn test_hull_rim_spills_off_surface() {
        let tin = pit();
        let mut pond = analysis(PondSeed::Point(4));
        let extent = pond.find_pond(&tin).unwrap();
        assert_eq!(extent.exits, vec![0, 1, 2, 3, 5, 6, 7, 8]);
        assert_eq!(extent.level, 2.0);
        assert_eq!(extent.low_points, vec![4]);
        // 中心深 2，六个三角形各占其 1/3
        let capacity = extent.capacity.unwrap();
        assert!((capacity - 2.0).abs() < 1e-9, "capacity {capacity}");
        assert_eq!(pond.overflow_region(), &[4]);

        let over = pond.find_boundary_for_volume(&tin, 10.0).unwrap();
        assert!(over.is_overflow());
        assert_eq!(over.level(), 2.0);
    }

    #[test]
    fn test_enclosed_without_hull_exits() {
        let tin = pit();
        let mut pond = analysis(PondSeed::Point(4)).with_hull_exits(false);
        let extent = pond.find_pond(&tin).unwrap();
        assert!(extent.is_enclosed());
        assert_eq!(extent.capacity, None);
        assert_eq!(extent.level, 2.0);
        assert_eq!(pond.overflow_region().len(), 9);
    }

    #[test]
    fn test_hull_seed_is_zero_depth() {
        // 水平边 (1,0)-(1,1) 一端在凸包上
        let tin = TinSurface::from_grid(3, 3, 1.0, 1.0, |i, j| if i == 1 && j < 2 { 0.0 } else { 2.0 })
            .unwrap();
        let mut pond = analysis(PondSeed::Edge(1, 4));
        let extent = pond.find_pond(&tin).unwrap();
        assert_eq!(extent.exits, vec![1]);
        assert_eq!(extent.depth(), 0.0);
        assert!(extent.capacity.unwrap() < 1e-12);
    }

    #[test]
    fn test_refinement_gives_up_after_iteration_limit() {
        let tin = notched_bowl();
        let config = DrainageConfig {
            pond_volume_tolerance: 1e-12,
            pond_elevation_tolerance: 1e-12,
            max_refine_iterations: 1,
            ..Default::default()
        };
        let mut pond = PondAnalysis::new(PondSeed::Point(12), &config, TraceTolerance::default());
        let capacity = pond.find_pond(&tin).unwrap().capacity.unwrap();
        let err = pond.find_boundary_for_volume(&tin, capacity * 0.5).unwrap_err();
        assert!(matches!(
            err,
            DrainageError::VolumeRefinementFailed { iterations: 1, .. }
        ));
    }

    #[test]
    fn test_notched_bowl_exit() {
        let tin = notched_bowl();
        let mut pond = analysis(PondSeed::Point(12));
        let extent = pond.find_pond(&tin).unwrap();
        assert_eq!(extent.exits, vec![13]);
        assert_eq!(extent.level, 3.0);
        assert!((extent.depth() - 3.0).abs() < 1e-12);
        let capacity = extent.capacity.unwrap();
        assert!(capacity > 0.0);
        assert!(pond.contains_at_overflow(12));
        assert!(!pond.contains_at_overflow(13));
        assert_eq!(extent.boundaries.len(), 1);
        assert!(polygon_area(&extent.boundaries[0]) > 0.0);

        let half = pond.find_boundary_for_volume(&tin, capacity * 0.5).unwrap();
        assert!(!half.is_overflow());
        assert!(half.level() > 0.0 && half.level() < 3.0);
        assert!((half.volume() - capacity * 0.5).abs() <= 0.3);

        let over = pond.find_boundary_for_volume(&tin, capacity * 2.0).unwrap();
        assert!(over.is_overflow());
        assert_eq!(over.level(), 3.0);
        assert!((over.volume() - capacity).abs() < 1e-9);
    }

    #[test]
    fn test_volume_monotonic_in_elevation() {
        let tin = notched_bowl();
        let mut pond = analysis(PondSeed::Point(12));
        let mut last_volume = 0.0;
        let mut last_area = 0.0;
        for k in 1..=12 {
            let z = k as f64 * 0.25;
            let fit = pond.find_boundary_for_elevation(&tin, z).unwrap();
            let area = pond.area_at(&tin, fit.level());
            assert!(fit.volume() >= last_volume - 1e-12);
            assert!(area >= last_area - 1e-12);
            last_volume = fit.volume();
            last_area = area;
        }
    }

    #[test]
    fn test_twin_basins_share_exit() {
        let tin = twin_basins();
        let mut p = analysis(PondSeed::Point(9));
        let mut q = analysis(PondSeed::Point(11));
        let ep = p.find_pond(&tin).unwrap();
        let eq = q.find_pond(&tin).unwrap();
        assert_eq!(ep.exits, vec![10]);
        assert_eq!(eq.exits, vec![10]);
        assert_eq!(ep.level, 5.0);
        assert!(p.contains_at_overflow(8));
        assert!(q.contains_at_overflow(12));
    }

    #[test]
    fn test_merged_basins_measure_above_exit() {
        let tin = twin_basins();
        let mut merged = analysis(PondSeed::Exit {
            exit: 10,
            basins: vec![vec![9], vec![11]],
        });
        let extent = merged.find_pond(&tin).unwrap();
        // 整个复合体蓄满后从凸包流出
        assert!(!extent.is_enclosed());
        assert!(extent.exits.iter().all(|&e| tin.is_hull_point(e)));
        assert_eq!(extent.level, 10.0);
        // 只剩一个区域
        let roots = merged.regions().iter().filter(|r| r.n_points() > 0).count();
        assert_eq!(roots, 1);
        assert!(merged.volume_at(&tin, 5.0) < 1e-12);

        let fit = merged.find_boundary_for_volume(&tin, 2.0).unwrap();
        assert!(!fit.is_overflow());
        assert!(fit.level() > 5.0);
        assert!((fit.volume() - 2.0).abs() <= 0.3);
        let outline = merged.get_outer_boundary(&tin).unwrap();
        assert_eq!(outline.first(), outline.last());
    }

    #[test]
    fn test_seed_with_lower_neighbour_is_zero_depth() {
        // 种子点 (1,1) 旁边有更低的点
        let tin = TinSurface::from_grid(3, 3, 1.0, 1.0, |i, _| i as f64).unwrap();
        let mut pond = analysis(PondSeed::Point(4));
        let extent = pond.find_pond(&tin).unwrap();
        assert_eq!(extent.exits, vec![4]);
        assert_eq!(extent.depth(), 0.0);
        assert_eq!(extent.capacity, Some(0.0));
    }

    #[test]
    fn test_invalid_seed_is_degenerate() {
        let tin = notched_bowl();
        let mut pond = analysis(PondSeed::Point(999));
        assert!(matches!(
            pond.find_pond(&tin),
            Err(DrainageError::GeometryDegenerate { .. })
        ));
    }
}
