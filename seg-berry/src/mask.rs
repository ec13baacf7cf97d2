//! 由标签图构建二值模板 (stencil).

use num::Zero;

use crate::consts::{label, ElemType};
use crate::grid::{BinaryMask, VoxelGrid};

/// 二值模板构建器.
///
/// 值 `<= 0` 的体素为背景, 其余为前景. 输出网格与输入共享几何描述.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BinaryMaskBuilder {
    foreground: u8,
    background: u8,
}

impl Default for BinaryMaskBuilder {
    fn default() -> Self {
        Self {
            foreground: label::FOREGROUND,
            background: label::BACKGROUND,
        }
    }
}

impl BinaryMaskBuilder {
    /// 指定前景值和背景值. 两者相同时返回 `None`.
    pub fn new(foreground: u8, background: u8) -> Option<Self> {
        (foreground != background).then_some(Self {
            foreground,
            background,
        })
    }

    /// 前景值.
    #[inline]
    pub fn foreground(&self) -> u8 {
        self.foreground
    }

    /// 背景值.
    #[inline]
    pub fn background(&self) -> u8 {
        self.background
    }

    /// 对单个体素值分类.
    #[inline]
    pub fn classify<T: Zero + PartialOrd>(value: &T) -> ElemType {
        // NaN 与 0 不可比较, 按前景处理.
        if *value <= T::zero() {
            ElemType::Background
        } else {
            ElemType::Foreground
        }
    }

    /// 构建二值模板.
    pub fn build<T: Zero + PartialOrd>(&self, grid: &VoxelGrid<T>) -> BinaryMask {
        grid.map(|v| {
            if Self::classify(v).is_foreground() {
                self.foreground
            } else {
                self.background
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::BinaryMaskBuilder;
    use crate::consts::ElemType;
    use crate::geometry::Geometry;
    use crate::grid::VoxelGrid;
    use nalgebra::Point3;

    #[test]
    fn test_builder_init() {
        assert!(BinaryMaskBuilder::new(7, 7).is_none());
        let b = BinaryMaskBuilder::new(255, 0).unwrap();
        assert_eq!(b.foreground(), 255);
        assert_eq!(BinaryMaskBuilder::default().foreground(), 1);
        assert_eq!(BinaryMaskBuilder::default().background(), 0);
    }

    #[test]
    fn test_classify() {
        assert_eq!(BinaryMaskBuilder::classify(&0), ElemType::Background);
        assert_eq!(BinaryMaskBuilder::classify(&-3), ElemType::Background);
        assert_eq!(BinaryMaskBuilder::classify(&2), ElemType::Foreground);
        assert_eq!(BinaryMaskBuilder::classify(&0.25f32), ElemType::Foreground);
    }

    #[test]
    fn test_build_mask() {
        let g = Geometry::axis_aligned([4, 3, 2], Point3::new(5.0, 0.0, 0.0), [0.5; 3]).unwrap();
        let labelmap = VoxelGrid::from_fn(g, |[i, j, k]| i - j - k);
        let mask = BinaryMaskBuilder::default().build(&labelmap);

        assert_eq!(mask.geometry(), labelmap.geometry());
        assert!(mask.data().iter().all(|v| *v <= 1));
        // i - j - k > 0 的体素个数.
        let expected = (0..4)
            .flat_map(|i| (0..3).flat_map(move |j| (0..2).map(move |k| i - j - k)))
            .filter(|v| *v > 0)
            .count();
        assert_eq!(mask.data().iter().filter(|v| **v == 1).count(), expected);
        assert_eq!(mask.get([3, 0, 1]), Some(&1));
        assert_eq!(mask.get([1, 1, 0]), Some(&0));
    }
}
