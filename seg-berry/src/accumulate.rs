//! 以二值模板为掩码, 对标量场做单遍统计.
//!
//! 均值与方差使用 Welford 在线算法. 按水平切片分块并行时,
//! 各分块的部分结果用 Chan 等人的合并公式归并, 结果与顺序遍历一致 (至多有舍入误差).

use ndarray::{ArrayView2, ArrayView3, Axis};
use num::ToPrimitive;

use crate::consts::CC_PER_CUBIC_MM;
use crate::error::{StatsError, StatsResult};

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::iter::{IndexedParallelIterator, IntoParallelIterator, ParallelIterator};
    }
}

/// 需要计算的统计量.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Reduction {
    /// 只统计前景体素个数.
    CountOnly,

    /// 同时统计最小值, 最大值, 均值和标准差.
    Full,
}

/// 前景体素上的强度统计量.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IntensityStats {
    /// 最小值.
    pub min: f64,
    /// 最大值.
    pub max: f64,
    /// 均值.
    pub mean: f64,
    /// 样本标准差 (除以 `N - 1`). 只有一个样本时为 0.
    pub stdev: f64,
}

/// 单次统计的结果.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Accumulated {
    /// 前景体素个数.
    pub voxel_count: u64,

    /// 强度统计量. 仅当 `Reduction::Full` 且 `voxel_count > 0` 时存在.
    pub intensity: Option<IntensityStats>,
}

impl Accumulated {
    /// 前景体积, 以立方毫米为单位. `voxel_volume` 为单个体素的体积.
    #[inline]
    pub fn volume_mm3(&self, voxel_volume: f64) -> f64 {
        self.voxel_count as f64 * voxel_volume
    }

    /// 前景体积, 以立方厘米为单位.
    #[inline]
    pub fn volume_cc(&self, voxel_volume: f64) -> f64 {
        self.volume_mm3(voxel_volume) * CC_PER_CUBIC_MM
    }
}

/// 在线累加器.
#[derive(Copy, Clone, Debug)]
pub struct StencilAccumulator {
    reduction: Reduction,
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl StencilAccumulator {
    /// 创建空的累加器.
    pub fn new(reduction: Reduction) -> Self {
        Self {
            reduction,
            count: 0,
            mean: 0.0,
            m2: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }

    /// 已累加的样本个数.
    #[inline]
    pub fn count(&self) -> u64 {
        self.count
    }

    /// 累加一个前景样本.
    #[inline]
    pub fn push(&mut self, x: f64) {
        self.count += 1;
        if self.reduction == Reduction::CountOnly {
            return;
        }
        let delta = x - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (x - self.mean);
        self.min = self.min.min(x);
        self.max = self.max.max(x);
    }

    /// 合并两个部分结果.
    pub fn merge(self, other: Self) -> Self {
        if other.count == 0 {
            return self;
        }
        if self.count == 0 {
            return other;
        }
        let count = self.count + other.count;
        let (na, nb, n) = (self.count as f64, other.count as f64, count as f64);
        let delta = other.mean - self.mean;
        Self {
            reduction: self.reduction,
            count,
            mean: self.mean + delta * nb / n,
            m2: self.m2 + other.m2 + delta * delta * na * nb / n,
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// 生成最终结果.
    pub fn finish(self) -> Accumulated {
        let intensity = match (self.reduction, self.count) {
            (Reduction::Full, n) if n > 0 => Some(IntensityStats {
                min: self.min,
                max: self.max,
                mean: self.mean,
                stdev: if n > 1 {
                    (self.m2 / (n - 1) as f64).max(0.0).sqrt()
                } else {
                    0.0
                },
            }),
            _ => None,
        };
        Accumulated {
            voxel_count: self.count,
            intensity,
        }
    }
}

/// 统计 `field` 中对应 `stencil` 值等于 `foreground` 的体素.
///
/// `field` 与 `stencil` 形状必须一致, 否则返回 `Err`.
pub fn accumulate<T>(
    field: ArrayView3<'_, T>,
    stencil: ArrayView3<'_, u8>,
    foreground: u8,
    reduction: Reduction,
) -> StatsResult<Accumulated>
where
    T: ToPrimitive + Copy + Sync,
{
    if field.dim() != stencil.dim() {
        return Err(StatsError::StencilShapeMismatch {
            field: field.dim(),
            stencil: stencil.dim(),
        });
    }

    let per_slice = |(f, s): (ArrayView2<'_, T>, ArrayView2<'_, u8>)| {
        let mut acc = StencilAccumulator::new(reduction);
        ndarray::Zip::from(&f).and(&s).for_each(|v, m| {
            if *m == foreground {
                acc.push(v.to_f64().unwrap_or(f64::NAN));
            }
        });
        acc
    };

    #[cfg(feature = "rayon")]
    let acc = field
        .axis_iter(Axis(0))
        .into_par_iter()
        .zip(stencil.axis_iter(Axis(0)).into_par_iter())
        .map(per_slice)
        .reduce(|| StencilAccumulator::new(reduction), StencilAccumulator::merge);

    #[cfg(not(feature = "rayon"))]
    let acc = field
        .axis_iter(Axis(0))
        .zip(stencil.axis_iter(Axis(0)))
        .map(per_slice)
        .fold(StencilAccumulator::new(reduction), StencilAccumulator::merge);

    Ok(acc.finish())
}

#[cfg(test)]
mod tests {
    use super::{accumulate, Reduction, StencilAccumulator};
    use crate::error::StatsError;
    use ndarray::Array3;

    fn f64_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_accumulator_merge_matches_sequential() {
        let xs = [3.0, -1.5, 8.0, 2.25, 2.25, 100.0, -40.0];
        let mut seq = StencilAccumulator::new(Reduction::Full);
        xs.iter().for_each(|x| seq.push(*x));

        let (a, b) = xs.split_at(3);
        let mut left = StencilAccumulator::new(Reduction::Full);
        let mut right = StencilAccumulator::new(Reduction::Full);
        a.iter().for_each(|x| left.push(*x));
        b.iter().for_each(|x| right.push(*x));
        let merged = left.merge(StencilAccumulator::new(Reduction::Full)).merge(right);

        let (s, m) = (seq.finish(), merged.finish());
        assert_eq!(s.voxel_count, 7);
        assert_eq!(m.voxel_count, 7);
        let (s, m) = (s.intensity.unwrap(), m.intensity.unwrap());
        assert!(f64_eq(s.mean, m.mean));
        assert!(f64_eq(s.stdev, m.stdev));
        assert_eq!(s.min, -40.0);
        assert_eq!(m.max, 100.0);

        let mean = xs.iter().sum::<f64>() / 7.0;
        let var = xs.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / 6.0;
        assert!(f64_eq(s.mean, mean));
        assert!(f64_eq(s.stdev, var.sqrt()));
    }

    #[test]
    fn test_accumulate_masked() {
        let field = Array3::from_shape_fn((3, 4, 5), |(z, y, x)| (z * 20 + y * 5 + x) as f32);
        // 只取 x == 0 的一列.
        let stencil = Array3::from_shape_fn((3, 4, 5), |(_, _, x)| u8::from(x == 0));
        let acc = accumulate(field.view(), stencil.view(), 1, Reduction::Full).unwrap();
        assert_eq!(acc.voxel_count, 12);
        let stats = acc.intensity.unwrap();
        assert_eq!(stats.min, 0.0);
        assert_eq!(stats.max, 55.0);
        assert!(f64_eq(stats.mean, 27.5));

        assert!(f64_eq(acc.volume_mm3(0.5), 6.0));
        assert!(f64_eq(acc.volume_cc(0.5), 0.006));
    }

    #[test]
    fn test_accumulate_count_only_and_empty() {
        let field = Array3::from_elem((2, 2, 2), -1000i16);
        let mut stencil = Array3::<u8>::zeros((2, 2, 2));
        let acc = accumulate(field.view(), stencil.view(), 1, Reduction::Full).unwrap();
        assert_eq!(acc.voxel_count, 0);
        assert!(acc.intensity.is_none());
        assert_eq!(acc.volume_mm3(2.0), 0.0);

        stencil[(1, 0, 1)] = 1;
        let acc = accumulate(field.view(), stencil.view(), 1, Reduction::CountOnly).unwrap();
        assert_eq!(acc.voxel_count, 1);
        assert!(acc.intensity.is_none());

        let acc = accumulate(field.view(), stencil.view(), 1, Reduction::Full).unwrap();
        let stats = acc.intensity.unwrap();
        assert_eq!(stats.mean, -1000.0);
        assert_eq!(stats.stdev, 0.0);
    }

    #[test]
    fn test_sample_stdev() {
        let field = Array3::from_shape_vec((1, 1, 3), vec![0.0f32, 2.0, 9.0]).unwrap();
        let stencil = Array3::from_shape_vec((1, 1, 3), vec![1u8, 1, 0]).unwrap();
        let stats = accumulate(field.view(), stencil.view(), 1, Reduction::Full)
            .unwrap()
            .intensity
            .unwrap();
        assert!(f64_eq(stats.mean, 1.0));
        // {0, 2}: 除以 N - 1.
        assert!(f64_eq(stats.stdev, 2f64.sqrt()));
    }

    #[test]
    fn test_accumulate_shape_mismatch() {
        let field = Array3::<f32>::zeros((2, 3, 4));
        let stencil = Array3::<u8>::zeros((2, 4, 3));
        let err = accumulate(field.view(), stencil.view(), 1, Reduction::Full).unwrap_err();
        assert!(matches!(
            err,
            StatsError::StencilShapeMismatch {
                field: (2, 3, 4),
                stencil: (2, 4, 3)
            }
        ));
    }
}
