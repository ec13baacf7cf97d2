//! 坐标变换链的组合.
//!
//! 分割和参考体数据各自可以挂在一条父变换链上 (链的末端为世界坐标系).
//! 统计计算需要的是 "分割坐标系 -> 参考体坐标系" 的组合变换:
//!
//! `T = inverse(reference_to_world) * segmentation_to_world`
//!
//! 缺失的一侧视为恒等变换. 每次统计请求都会重新组合, 不做缓存.

use nalgebra::{Matrix4, Point3};

use super::check_affine;
use crate::error::{StatsError, StatsResult};

/// 变换节点的类型.
#[derive(Clone, Debug, PartialEq)]
pub enum TransformKind {
    /// 线性 (仿射) 变换, 将本节点坐标映射到父节点坐标.
    Linear(Matrix4<f64>),

    /// 非线性变换 (如网格形变场, B 样条). 本引擎无法组合该类变换.
    Deformable,
}

/// 变换树上的一个节点. 没有父节点时, 其父坐标系即世界坐标系.
#[derive(Clone, Debug, PartialEq)]
pub struct TransformNode {
    name: String,
    kind: TransformKind,
    parent: Option<Box<TransformNode>>,
}

impl TransformNode {
    /// 创建一个线性变换节点.
    pub fn linear(name: impl Into<String>, to_parent: Matrix4<f64>) -> Self {
        Self {
            name: name.into(),
            kind: TransformKind::Linear(to_parent),
            parent: None,
        }
    }

    /// 创建一个非线性变换节点.
    pub fn deformable(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: TransformKind::Deformable,
            parent: None,
        }
    }

    /// 指定父节点.
    pub fn with_parent(mut self, parent: TransformNode) -> Self {
        self.parent = Some(Box::new(parent));
        self
    }

    /// 节点名称.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 节点类型.
    #[inline]
    pub fn kind(&self) -> &TransformKind {
        &self.kind
    }

    /// 父节点.
    #[inline]
    pub fn parent(&self) -> Option<&TransformNode> {
        self.parent.as_deref()
    }

    /// 沿父节点链组合出 "本节点坐标系 -> 世界坐标系" 的矩阵.
    ///
    /// 链上任意节点为非线性变换或非仿射矩阵时返回 `Err`.
    pub fn to_world(&self) -> StatsResult<Matrix4<f64>> {
        let mut acc = Matrix4::identity();
        let mut node = Some(self);
        while let Some(n) = node {
            match &n.kind {
                TransformKind::Linear(m) => {
                    check_affine(m)?;
                    acc = m * acc;
                }
                TransformKind::Deformable => {
                    return Err(StatsError::UnsupportedTransform(n.name.clone()));
                }
            }
            node = n.parent();
        }
        Ok(acc)
    }
}

/// 组合后的 "分割坐标系 -> 参考体坐标系" 仿射变换.
#[derive(Clone, Debug, PartialEq)]
pub struct CoordinateTransform {
    matrix: Matrix4<f64>,
    inverse: Matrix4<f64>,
}

impl Default for CoordinateTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl CoordinateTransform {
    /// 恒等变换.
    pub fn identity() -> Self {
        Self {
            matrix: Matrix4::identity(),
            inverse: Matrix4::identity(),
        }
    }

    /// 由仿射矩阵直接构建. 矩阵非仿射或不可逆时返回 `Err`.
    pub fn from_matrix(matrix: Matrix4<f64>) -> StatsResult<Self> {
        check_affine(&matrix)?;
        let inverse = matrix
            .try_inverse()
            .ok_or_else(|| StatsError::SingularTransform("segmentation-to-reference".to_string()))?;
        Ok(Self { matrix, inverse })
    }

    /// 正向矩阵.
    #[inline]
    pub fn matrix(&self) -> &Matrix4<f64> {
        &self.matrix
    }

    /// 逆矩阵 ("参考体坐标系 -> 分割坐标系").
    #[inline]
    pub fn inverse_matrix(&self) -> &Matrix4<f64> {
        &self.inverse
    }

    /// 将分割坐标系下的点映射到参考体坐标系.
    #[inline]
    pub fn apply(&self, p: &Point3<f64>) -> Point3<f64> {
        self.matrix.transform_point(p)
    }

    /// 将参考体坐标系下的点映射回分割坐标系.
    #[inline]
    pub fn apply_inverse(&self, p: &Point3<f64>) -> Point3<f64> {
        self.inverse.transform_point(p)
    }

    /// 是否 (在误差 `tol` 内) 为恒等变换?
    pub fn is_identity(&self, tol: f64) -> bool {
        self.matrix
            .iter()
            .zip(Matrix4::<f64>::identity().iter())
            .all(|(a, b)| (a - b).abs() <= tol)
    }
}

/// 组合分割与参考体之间的坐标变换.
///
/// `segmentation` 和 `reference` 分别是两者的父变换, `None` 代表恒等.
/// 仅在变换链结构非法时 (非线性变换, 非仿射矩阵, 不可逆) 返回 `Err`.
pub fn resolve(
    segmentation: Option<&TransformNode>,
    reference: Option<&TransformNode>,
) -> StatsResult<CoordinateTransform> {
    let seg_to_world = match segmentation {
        Some(node) => node.to_world()?,
        None => Matrix4::identity(),
    };
    let world_to_ref = match reference {
        Some(node) => node
            .to_world()?
            .try_inverse()
            .ok_or_else(|| StatsError::SingularTransform(node.name().to_string()))?,
        None => Matrix4::identity(),
    };
    CoordinateTransform::from_matrix(world_to_ref * seg_to_world)
}
