//! 将标签网格重采样到参考几何描述上.
//!
//! 对参考网格的每个体素, 取其世界坐标, 经组合变换的逆映射回分割坐标系,
//! 再转换为源网格的连续索引并取值. 落在源网格范围外的采样点视为背景 (0).
//! 整个映射可以合并为一个 "目标索引 -> 源索引" 的仿射矩阵.

use nalgebra::{Matrix4, Point3};
use ndarray::{Array3, ArrayViewMut2, Axis};
use num::{NumCast, PrimInt};

use crate::geometry::{CoordinateTransform, Extent, Geometry};
use crate::grid::VoxelGrid;

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::iter::{IndexedParallelIterator, IntoParallelIterator, ParallelIterator};
    }
}

/// 插值方式.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum Interpolation {
    /// 最近邻插值. 统计计算固定使用该方式.
    #[default]
    NearestNeighbor,

    /// 三线性插值, 结果四舍五入到最近的整数标签.
    Linear,
}

/// 重采样选项.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct ResampleOptions {
    /// 插值方式.
    pub interpolation: Interpolation,

    /// 为 `true` 时, 输出范围在参考范围的基础上扩展到能容纳变换后的整个源网格.
    /// 为 `false` 时, 输出范围严格等于参考范围, 超出部分直接丢弃.
    pub pad: bool,
}

/// "目标绝对索引 -> 源连续索引" 的采样器.
struct Sampler<'a, T> {
    source: &'a VoxelGrid<T>,
    target_to_source: Matrix4<f64>,
    interpolation: Interpolation,
}

impl<'a, T: PrimInt> Sampler<'a, T> {
    fn new(
        source: &'a VoxelGrid<T>,
        target: &Geometry,
        transform: &CoordinateTransform,
        interpolation: Interpolation,
    ) -> Self {
        let target_to_source = source.geometry().world_to_image()
            * transform.inverse_matrix()
            * target.image_to_world();
        Self {
            source,
            target_to_source,
            interpolation,
        }
    }

    #[inline]
    fn value_at(&self, i: i64, j: i64, k: i64) -> T {
        let in_range = |v: i64| i32::try_from(v).ok();
        match (in_range(i), in_range(j), in_range(k)) {
            (Some(i), Some(j), Some(k)) => self.source.get([i, j, k]).copied().unwrap_or_else(T::zero),
            _ => T::zero(),
        }
    }

    fn sample(&self, [i, j, k]: [i32; 3]) -> T {
        let p = self
            .target_to_source
            .transform_point(&Point3::new(i as f64, j as f64, k as f64));
        if !(p.x.is_finite() && p.y.is_finite() && p.z.is_finite()) {
            return T::zero();
        }
        match self.interpolation {
            Interpolation::NearestNeighbor => {
                let nearest = |v: f64| (v + 0.5).floor() as i64;
                self.value_at(nearest(p.x), nearest(p.y), nearest(p.z))
            }
            Interpolation::Linear => self.sample_linear(&p),
        }
    }

    fn sample_linear(&self, p: &Point3<f64>) -> T {
        let base = [p.x.floor(), p.y.floor(), p.z.floor()];
        let frac = [p.x - base[0], p.y - base[1], p.z - base[2]];
        let [bi, bj, bk] = base.map(|v| v as i64);

        let mut acc = 0.0;
        for corner in 0..8u8 {
            let (di, dj, dk) = (corner & 1, (corner >> 1) & 1, (corner >> 2) & 1);
            let w = [di, dj, dk]
                .iter()
                .zip(frac.iter())
                .map(|(d, f)| if *d == 1 { *f } else { 1.0 - *f })
                .product::<f64>();
            if w == 0.0 {
                continue;
            }
            let v = self.value_at(bi + di as i64, bj + dj as i64, bk + dk as i64);
            acc += w * v.to_f64().unwrap_or(0.0);
        }
        <T as NumCast>::from(acc.round()).unwrap_or_else(T::zero)
    }

    /// 填充目标数组中第 `z` 层水平切片.
    fn fill_slice(&self, target: &Geometry, z: usize, mut slice: ArrayViewMut2<'_, T>) {
        for ((y, x), v) in slice.indexed_iter_mut() {
            *v = self.sample(target.voxel_index((z, y, x)));
        }
    }
}

/// 计算 `pad` 模式下的输出几何描述: 参考范围与变换后源网格包围盒的并集,
/// 仍位于参考网格的格点上.
fn padded_geometry<T>(
    source: &VoxelGrid<T>,
    reference: &Geometry,
    transform: &CoordinateTransform,
) -> Geometry {
    let src = source.geometry();
    if src.is_empty() {
        return reference.clone();
    }
    let mut extent: Extent = reference.extent();
    for corner in src.corners() {
        let world_seg = src.index_to_world(corner);
        let world_ref = transform.apply(&world_seg);
        let ijk = reference.world_to_index(&world_ref);
        for (axis, v) in ijk.iter().enumerate() {
            extent[2 * axis] = extent[2 * axis].min(v.floor() as i32);
            extent[2 * axis + 1] = extent[2 * axis + 1].max(v.ceil() as i32);
        }
    }
    reference.with_extent(extent)
}

/// 将 `source` 经组合变换 `transform` (分割 -> 参考) 重采样到 `reference` 几何描述上.
///
/// 输出网格的形状总是等于输出几何描述的形状, 每个体素都被赋值.
/// 恒等变换且几何描述相同时, 输出与输入完全一致.
pub fn resample_to_reference<T>(
    source: &VoxelGrid<T>,
    reference: &Geometry,
    transform: &CoordinateTransform,
    options: ResampleOptions,
) -> VoxelGrid<T>
where
    T: PrimInt + Send + Sync,
{
    let target = if options.pad {
        padded_geometry(source, reference, transform)
    } else {
        reference.clone()
    };
    log::trace!(
        "resampling {:?} voxels onto {:?} ({:?})",
        source.shape(),
        target.shape(),
        options
    );

    let sampler = Sampler::new(source, &target, transform, options.interpolation);
    let mut data = Array3::<T>::zeros(target.shape());

    #[cfg(feature = "rayon")]
    data.axis_iter_mut(Axis(0))
        .into_par_iter()
        .enumerate()
        .for_each(|(z, slice)| sampler.fill_slice(&target, z, slice));

    #[cfg(not(feature = "rayon"))]
    data.axis_iter_mut(Axis(0))
        .enumerate()
        .for_each(|(z, slice)| sampler.fill_slice(&target, z, slice));

    VoxelGrid::from_raw(target, data)
}
