//! 体素网格的几何描述.
//!
//! 一个网格由索引范围 (extent), 体素间距 (spacing) 和 image-to-world 仿射矩阵描述.
//! 索引 `(i, j, k)` 为 **绝对** 索引, 即 extent 内的取值, 不一定从 0 开始.
//! 数据数组按照 `(z, y, x) == (k, j, i)` 的顺序存储, 与 nifti 加载后的布局一致.

use nalgebra::{Matrix3, Matrix4, Point3, Vector3};

use crate::error::{StatsError, StatsResult};
use crate::Idx3d;

pub mod transform;

pub use transform::{resolve, CoordinateTransform, TransformKind, TransformNode};

/// 索引范围 `[i_min, i_max, j_min, j_max, k_min, k_max]`, 闭区间.
///
/// 当某个维度 `max < min` 时, 网格为空.
pub type Extent = [i32; 6];

/// 绝对体素索引 `[i, j, k]`.
pub type VoxelIndex = [i32; 3];

/// 检查 `m` 是否是仿射矩阵.
pub(crate) fn check_affine(m: &Matrix4<f64>) -> StatsResult<()> {
    let last = [m[(3, 0)], m[(3, 1)], m[(3, 2)], m[(3, 3)]];
    if last == [0.0, 0.0, 0.0, 1.0] && m.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(StatsError::NonAffine)
    }
}

#[inline]
fn axis_len(min: i32, max: i32) -> usize {
    if max < min {
        0
    } else {
        (max as i64 - min as i64 + 1) as usize
    }
}

/// 体素网格几何描述.
///
/// 构造时保证: 间距的三个分量均为有限正数, image-to-world 矩阵可逆.
/// 该结构是只读的. 若要修改参数, 你应该创建新的实例.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Geometry {
    extent: Extent,
    spacing: [f64; 3],
    image_to_world: Matrix4<f64>,
    world_to_image: Matrix4<f64>,
}

impl Geometry {
    /// 由索引范围和 image-to-world 矩阵构建几何描述.
    ///
    /// 间距取矩阵前三列的长度, 方向取前三列归一化后的结果, 原点为第四列.
    pub fn from_image_to_world(extent: Extent, image_to_world: Matrix4<f64>) -> StatsResult<Self> {
        check_affine(&image_to_world)?;
        let spacing = [0, 1, 2].map(|c| {
            image_to_world
                .fixed_view::<3, 1>(0, c)
                .into_owned()
                .norm()
        });
        if !spacing.iter().all(|s| s.is_finite() && *s > 0.0) {
            return Err(StatsError::InvalidSpacing(spacing));
        }
        let world_to_image = image_to_world
            .try_inverse()
            .ok_or_else(|| StatsError::SingularTransform("image-to-world".to_string()))?;
        Ok(Self {
            extent,
            spacing,
            image_to_world,
            world_to_image,
        })
    }

    /// 由原点, 间距和方向矩阵 (每一列是一个单位轴向量) 构建几何描述.
    pub fn from_parts(
        extent: Extent,
        origin: Point3<f64>,
        spacing: [f64; 3],
        directions: Matrix3<f64>,
    ) -> StatsResult<Self> {
        if !spacing.iter().all(|s| s.is_finite() && *s > 0.0) {
            return Err(StatsError::InvalidSpacing(spacing));
        }
        let scaled = directions * Matrix3::from_diagonal(&Vector3::from(spacing));
        let mut m = Matrix4::identity();
        m.fixed_view_mut::<3, 3>(0, 0).copy_from(&scaled);
        m.fixed_view_mut::<3, 1>(0, 3).copy_from(&origin.coords);
        Self::from_image_to_world(extent, m)
    }

    /// 以 `[0, dims - 1]` 为索引范围, 沿坐标轴方向构建几何描述.
    pub fn axis_aligned(dims: [usize; 3], origin: Point3<f64>, spacing: [f64; 3]) -> StatsResult<Self> {
        let [ni, nj, nk] = dims.map(|d| d as i32 - 1);
        Self::from_parts(
            [0, ni, 0, nj, 0, nk],
            origin,
            spacing,
            Matrix3::identity(),
        )
    }

    /// 保持其余参数不变, 替换索引范围.
    pub fn with_extent(&self, extent: Extent) -> Self {
        Self {
            extent,
            ..self.clone()
        }
    }

    /// 索引范围.
    #[inline]
    pub fn extent(&self) -> Extent {
        self.extent
    }

    /// 体素间距, 以毫米为单位, 按 `[i, j, k]` 顺序.
    #[inline]
    pub fn spacing(&self) -> [f64; 3] {
        self.spacing
    }

    /// 单个体素的实际体积值, 以立方毫米为单位.
    #[inline]
    pub fn voxel_volume(&self) -> f64 {
        self.spacing.iter().product()
    }

    /// image-to-world 矩阵.
    #[inline]
    pub fn image_to_world(&self) -> &Matrix4<f64> {
        &self.image_to_world
    }

    /// world-to-image 矩阵.
    #[inline]
    pub fn world_to_image(&self) -> &Matrix4<f64> {
        &self.world_to_image
    }

    /// 索引 `(0, 0, 0)` 对应的世界坐标.
    #[inline]
    pub fn origin(&self) -> Point3<f64> {
        Point3::new(
            self.image_to_world[(0, 3)],
            self.image_to_world[(1, 3)],
            self.image_to_world[(2, 3)],
        )
    }

    /// 方向矩阵, 每一列是对应索引轴的单位向量.
    pub fn directions(&self) -> Matrix3<f64> {
        let mut dirs = self.image_to_world.fixed_view::<3, 3>(0, 0).into_owned();
        for (c, s) in self.spacing.iter().enumerate() {
            let unit = dirs.column(c) / *s;
            dirs.set_column(c, &unit);
        }
        dirs
    }

    /// 每个维度的体素个数, 按 `[i, j, k]` 顺序.
    #[inline]
    pub fn dims(&self) -> [usize; 3] {
        let [i0, i1, j0, j1, k0, k1] = self.extent;
        [axis_len(i0, i1), axis_len(j0, j1), axis_len(k0, k1)]
    }

    /// 数据数组形状 `(z, y, x)`.
    #[inline]
    pub fn shape(&self) -> Idx3d {
        let [ni, nj, nk] = self.dims();
        (nk, nj, ni)
    }

    /// 体素总数.
    #[inline]
    pub fn voxel_count(&self) -> usize {
        self.dims().iter().product()
    }

    /// 网格是否为空?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.voxel_count() == 0
    }

    /// 绝对索引是否在索引范围内?
    #[inline]
    pub fn contains(&self, [i, j, k]: VoxelIndex) -> bool {
        let [i0, i1, j0, j1, k0, k1] = self.extent;
        (i0..=i1).contains(&i) && (j0..=j1).contains(&j) && (k0..=k1).contains(&k)
    }

    /// 绝对索引转换为数据数组索引 `(z, y, x)`. 越界时返回 `None`.
    #[inline]
    pub fn array_index(&self, ijk: VoxelIndex) -> Option<Idx3d> {
        if !self.contains(ijk) {
            return None;
        }
        let [i, j, k] = ijk;
        let [i0, _, j0, _, k0, _] = self.extent;
        Some(((k - k0) as usize, (j - j0) as usize, (i - i0) as usize))
    }

    /// 数据数组索引 `(z, y, x)` 转换为绝对索引.
    #[inline]
    pub fn voxel_index(&self, (z, y, x): Idx3d) -> VoxelIndex {
        let [i0, _, j0, _, k0, _] = self.extent;
        [i0 + x as i32, j0 + y as i32, k0 + z as i32]
    }

    /// 将 (连续) 索引转换为世界坐标.
    #[inline]
    pub fn index_to_world(&self, ijk: [f64; 3]) -> Point3<f64> {
        self.image_to_world
            .transform_point(&Point3::from(ijk))
    }

    /// 将世界坐标转换为连续索引.
    #[inline]
    pub fn world_to_index(&self, p: &Point3<f64>) -> [f64; 3] {
        let q = self.world_to_image.transform_point(p);
        [q.x, q.y, q.z]
    }

    /// 索引范围八个角点的绝对索引.
    pub fn corners(&self) -> [[f64; 3]; 8] {
        let [i0, i1, j0, j1, k0, k1] = self.extent.map(f64::from);
        [
            [i0, j0, k0],
            [i1, j0, k0],
            [i0, j1, k0],
            [i1, j1, k0],
            [i0, j0, k1],
            [i1, j0, k1],
            [i0, j1, k1],
            [i1, j1, k1],
        ]
    }

    /// 判断两个几何描述是否描述同一个网格. 矩阵元素误差不超过 `tol`.
    pub fn same_grid(&self, other: &Geometry, tol: f64) -> bool {
        self.extent == other.extent
            && self
                .image_to_world
                .iter()
                .zip(other.image_to_world.iter())
                .all(|(a, b)| (a - b).abs() <= tol)
    }
}
