//! 带几何描述的三维体素网格.

use std::ops::{Index, IndexMut};

use ndarray::{Array3, ArrayView3, ArrayViewMut3};

use crate::error::{StatsError, StatsResult};
use crate::geometry::{Geometry, VoxelIndex};
use crate::Idx3d;

/// 标签图体素值类型.
pub type LabelValue = i32;

/// 分段的二值标签图表示. 值 `<= 0` 为背景, 其余为前景.
pub type BinaryLabelmap = VoxelGrid<LabelValue>;

/// 严格二值的模板 (stencil), 只含前景/背景两种值.
pub type BinaryMask = VoxelGrid<u8>;

/// 标量体数据的体素网格 (如 CT HU 值).
pub type ScalarImage = VoxelGrid<f32>;

/// 三维体素网格, 包括几何描述和按 `(z, y, x)` 存储的数据.
///
/// 构造时保证数据形状与几何描述一致.
#[derive(Clone, Debug)]
pub struct VoxelGrid<T> {
    geometry: Geometry,
    data: Array3<T>,
}

impl<T> VoxelGrid<T> {
    /// 由几何描述和数据创建网格. 数据形状必须等于 `geometry.shape()`, 否则返回 `Err`.
    pub fn new(geometry: Geometry, data: Array3<T>) -> StatsResult<Self> {
        if data.dim() != geometry.shape() {
            return Err(StatsError::GridShapeMismatch {
                data: data.dim(),
                geometry: geometry.shape(),
            });
        }
        Ok(Self { geometry, data })
    }

    /// 由形状已知一致的数据直接创建网格.
    #[inline]
    pub(crate) fn from_raw(geometry: Geometry, data: Array3<T>) -> Self {
        debug_assert_eq!(geometry.shape(), data.dim());
        Self { geometry, data }
    }

    /// 用 `f(绝对索引)` 填充整个网格.
    pub fn from_fn<F>(geometry: Geometry, mut f: F) -> Self
    where
        F: FnMut(VoxelIndex) -> T,
    {
        let data = Array3::from_shape_fn(geometry.shape(), |pos| f(geometry.voxel_index(pos)));
        Self { geometry, data }
    }

    /// 用 `value` 填充整个网格.
    pub fn from_elem(geometry: Geometry, value: T) -> Self
    where
        T: Clone,
    {
        let data = Array3::from_elem(geometry.shape(), value);
        Self { geometry, data }
    }

    /// 几何描述.
    #[inline]
    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// 数据形状 `(z, y, x)`.
    #[inline]
    pub fn shape(&self) -> Idx3d {
        self.geometry.shape()
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView3<'_, T> {
        self.data.view()
    }

    /// 获得数据的一份可变 shallow copy.
    #[inline]
    pub fn data_mut(&mut self) -> ArrayViewMut3<'_, T> {
        self.data.view_mut()
    }

    /// 按绝对索引获取体素值. 越界时返回 `None`.
    #[inline]
    pub fn get(&self, ijk: VoxelIndex) -> Option<&T> {
        self.geometry
            .array_index(ijk)
            .and_then(|pos| self.data.get(pos))
    }

    /// 保持几何描述不变, 逐体素映射得到新网格.
    pub fn map<U, F>(&self, f: F) -> VoxelGrid<U>
    where
        F: FnMut(&T) -> U,
    {
        VoxelGrid {
            geometry: self.geometry.clone(),
            data: self.data.map(f),
        }
    }

    /// 拆分为几何描述和数据.
    #[inline]
    pub fn into_parts(self) -> (Geometry, Array3<T>) {
        (self.geometry, self.data)
    }
}

impl<T> Index<Idx3d> for VoxelGrid<T> {
    type Output = T;

    #[inline]
    fn index(&self, index: Idx3d) -> &Self::Output {
        &self.data[index]
    }
}

impl<T> IndexMut<Idx3d> for VoxelGrid<T> {
    #[inline]
    fn index_mut(&mut self, index: Idx3d) -> &mut Self::Output {
        &mut self.data[index]
    }
}

#[cfg(test)]
mod tests {
    use super::{BinaryLabelmap, VoxelGrid};
    use crate::error::StatsError;
    use crate::geometry::Geometry;
    use nalgebra::Point3;
    use ndarray::Array3;

    fn geometry() -> Geometry {
        Geometry::from_parts(
            [1, 3, 0, 1, 5, 5],
            Point3::origin(),
            [1.0; 3],
            nalgebra::Matrix3::identity(),
        )
        .unwrap()
    }

    #[test]
    fn test_grid_shape_check() {
        let g = geometry();
        assert!(VoxelGrid::new(g.clone(), Array3::<u8>::zeros((1, 2, 3))).is_ok());
        let err = VoxelGrid::new(g, Array3::<u8>::zeros((3, 2, 1))).unwrap_err();
        assert!(matches!(
            err,
            StatsError::GridShapeMismatch {
                data: (3, 2, 1),
                geometry: (1, 2, 3)
            }
        ));
    }

    #[test]
    fn test_grid_absolute_access() {
        let grid: BinaryLabelmap = VoxelGrid::from_fn(geometry(), |[i, j, k]| i * 100 + j * 10 + k);
        assert_eq!(grid.get([1, 0, 5]), Some(&105));
        assert_eq!(grid.get([3, 1, 5]), Some(&315));
        assert_eq!(grid.get([0, 0, 5]), None);
        assert_eq!(grid[(0, 1, 2)], 315);

        let doubled = grid.map(|v| v * 2);
        assert_eq!(doubled.get([2, 1, 5]), Some(&430));
        assert_eq!(doubled.geometry(), grid.geometry());
    }
}
