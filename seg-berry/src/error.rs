//! 运行时错误.
//!
//! "输入不可用" (缺少表示, 缺少参考体数据) 不属于错误, 计算器以空结果表示.
//! 这里只收录结构性错误, 它们会原样传递给调用方.

use thiserror::Error;

use crate::Idx3d;

/// 统计计算的结构性错误.
#[derive(Debug, Error)]
pub enum StatsError {
    /// 体素间距的某个分量不是有限正数.
    #[error("体素间距非法: {0:?}")]
    InvalidSpacing([f64; 3]),

    /// 矩阵不是仿射矩阵 (最后一行必须为 `[0, 0, 0, 1]`).
    #[error("矩阵不是仿射矩阵")]
    NonAffine,

    /// 变换不可逆. 参数为变换名称.
    #[error("变换 `{0}` 不可逆")]
    SingularTransform(String),

    /// 变换链中存在无法组合的 (非线性) 变换. 参数为变换名称.
    #[error("变换 `{0}` 不是线性变换, 无法组合")]
    UnsupportedTransform(String),

    /// 网格数据形状与几何描述不一致.
    #[error("网格数据形状 {data:?} 与几何描述 {geometry:?} 不一致")]
    GridShapeMismatch {
        /// 数据形状, `(z, y, x)`.
        data: Idx3d,
        /// 几何描述给出的形状, `(z, y, x)`.
        geometry: Idx3d,
    },

    /// 标量场与模板形状不一致.
    #[error("标量场形状 {field:?} 与模板形状 {stencil:?} 不一致")]
    StencilShapeMismatch {
        /// 标量场形状, `(z, y, x)`.
        field: Idx3d,
        /// 模板形状, `(z, y, x)`.
        stencil: Idx3d,
    },

    /// 网格 (mesh) 数据非法, 如三角形索引越界.
    #[error("三角网格非法: {0}")]
    InvalidMesh(String),

    /// 开启闭合检查时, 闭合曲面存在边界边.
    #[error("分段 `{segment}` 的闭合曲面存在 {boundary_edges} 条边界边")]
    OpenSurface {
        /// 分段 ID.
        segment: String,
        /// 边界边个数.
        boundary_edges: usize,
    },

    /// 分割中不存在该分段.
    #[error("分段 `{0}` 不存在")]
    UnknownSegment(String),

    /// 读取 nifti 文件错误.
    #[error(transparent)]
    Nifti(#[from] nifti::NiftiError),

    /// nifti 文件内容无法解释为三维体数据.
    #[error("体数据非法: {0}")]
    InvalidVolume(String),
}

/// 统计计算结果.
pub type StatsResult<T> = Result<T, StatsError>;
