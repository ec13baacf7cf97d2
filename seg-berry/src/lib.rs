#![warn(missing_docs)] // <= 合适时移除它.
// #![warn(clippy::missing_docs_in_private_items)]  // <= too strict.

//! 核心库. 对分割 (segmentation) 中的每个分段 (segment) 计算定量统计量,
//! 如体积, 表面积, 以及分段区域内参考体数据的强度统计.
//!
//! 该 crate 目前仅提供 `safe` 接口.
//!
//! # 计算器
//!
//! 统计量由若干计算器产生, 每个计算器负责一类分段表示:
//!
//! 1. 闭合曲面 (`Closed Surface`): 表面积, 体积.
//! 2. 二值标签图 (`Labelmap`): 前景体素个数, 体积.
//! 3. 标量体数据 (`Scalar Volume`): 将分段标签图重采样到参考体数据网格上,
//!   统计前景区域内的体素个数, 体积, 以及强度的最小值, 最大值, 均值和标准差.
//!
//! 测量键的格式为 `<计算器名称>.<指标名称>`, 如 `Labelmap.volume_mm3`.
//! [`CalculatorRegistry`] 保存当前请求的测量键, 负责逐分段分派计算并汇总成
//! [`StatisticsTable`].
//!
//! # 坐标约定
//!
//! 1. 体素数据按照 `(z, y, x)` 存储, 与 nifti 文件加载后的布局一致.
//! 2. 几何描述 [`Geometry`] 使用绝对索引 `[i, j, k]`, 对应 `(x, y, z)`.
//! 3. 世界坐标以毫米为单位.
//!
//! # 注意
//!
//! 缺少表示或缺少参考体数据时, 计算器返回空结果而不是错误.
//! 只有结构性问题 (如分段不存在, 变换不可组合) 才会返回 [`StatsError`].

/// 三维索引 `(z, y, x)`, 同时也可一定程度上用作非负整数向量.
pub type Idx3d = (usize, usize, usize);

pub mod accumulate;
pub mod calculator;
pub mod consts;
pub mod error;
pub mod geometry;
pub mod grid;
pub mod io;
pub mod mask;
pub mod measurement;
pub mod mesh;
pub mod report;
pub mod resample;
pub mod segmentation;

pub use calculator::{
    Calculator, CalculatorRegistry, ClosedSurfaceCalculator, LabelmapCalculator,
    ScalarVolumeCalculator, SegmentStatisticsCalculator, StatsInput,
};
pub use error::{StatsError, StatsResult};
pub use geometry::{CoordinateTransform, Extent, Geometry, TransformKind, TransformNode, VoxelIndex};
pub use grid::{BinaryLabelmap, BinaryMask, LabelValue, ScalarImage, VoxelGrid};
pub use measurement::{CodedEntry, MeasurementInfo, MeasurementKey, RequestedKeys, Statistics};
pub use mesh::ClosedSurface;
pub use report::{StatisticsRow, StatisticsTable};
pub use segmentation::{Representation, RepresentationKind, ScalarVolume, Segment, Segmentation};

pub mod prelude;
