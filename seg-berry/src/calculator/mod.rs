//! 分段统计量计算器.
//!
//! 每个计算器负责一组固定的测量键, 依赖分段的某一种表示. 单次计算依次经过以下检查,
//! 任一检查不通过时返回空结果 (不视为错误):
//!
//! 1. 请求的测量键中没有属于本计算器的;
//! 2. 分割 (或该分段) 不含所需的表示;
//! 3. (仅标量体计算器) 未提供参考体数据, 或参考体数据没有图像.
//!
//! 之后才会解析坐标变换, 重采样, 构建模板并统计. 结构性错误原样返回给调用方.

use crate::error::StatsResult;
use crate::measurement::{MeasurementInfo, MeasurementKey, RequestedKeys, Statistics};
use crate::segmentation::{ScalarVolume, Segmentation};

mod closed_surface;
mod labelmap;
mod registry;
mod scalar_volume;

pub use closed_surface::ClosedSurfaceCalculator;
pub use labelmap::LabelmapCalculator;
pub use registry::CalculatorRegistry;
pub use scalar_volume::ScalarVolumeCalculator;

/// 单次统计请求的输入. 所有数据均为只读借用.
#[derive(Copy, Clone, Debug)]
pub struct StatsInput<'a> {
    /// 分割.
    pub segmentation: &'a Segmentation,

    /// 参考标量体数据. 只有标量体计算器需要.
    pub reference_volume: Option<&'a ScalarVolume>,
}

impl<'a> StatsInput<'a> {
    /// 只含分割的输入.
    pub fn new(segmentation: &'a Segmentation) -> Self {
        Self {
            segmentation,
            reference_volume: None,
        }
    }

    /// 指定参考标量体数据.
    pub fn with_reference_volume(mut self, volume: &'a ScalarVolume) -> Self {
        self.reference_volume = Some(volume);
        self
    }
}

/// 分段统计量计算器的公共接口.
pub trait SegmentStatisticsCalculator {
    /// 计算器名称, 同时是测量键的前缀.
    fn name(&self) -> &'static str;

    /// 计算器简称.
    fn id(&self) -> &'static str;

    /// 本计算器支持的全部测量键, 顺序固定.
    fn keys(&self) -> &[MeasurementKey];

    /// 默认请求的测量键.
    fn default_keys(&self) -> &[MeasurementKey] {
        self.keys()
    }

    /// 为 `segment_id` 分段计算 `requested` 中属于本计算器的测量值.
    ///
    /// 输入不可用时返回空结果. 结果中只包含请求的键.
    fn compute(
        &self,
        input: &StatsInput<'_>,
        segment_id: &str,
        requested: &RequestedKeys,
    ) -> StatsResult<Statistics>;

    /// 测量键的元信息. 未知的键返回 `None`.
    fn measurement_info(&self, key: &str) -> Option<MeasurementInfo>;

    /// 该测量键是否属于本计算器?
    fn owns(&self, key: &str) -> bool {
        self.keys().iter().any(|k| k.as_str() == key)
    }
}

/// 计算器的一个指标.
pub(crate) trait Metric: Copy + Eq + 'static {
    /// 全部指标, 顺序即测量键的顺序.
    const ALL: &'static [Self];

    /// 指标名称, 即测量键 `.` 之后的部分.
    fn as_str(&self) -> &'static str;
}

/// 全部测量键.
pub(crate) fn keys_of<M: Metric>(calculator: &str) -> Vec<MeasurementKey> {
    M::ALL
        .iter()
        .map(|m| MeasurementKey::new(calculator, m.as_str()))
        .collect()
}

/// 从请求的测量键中挑出属于本计算器的指标, 按 `M::ALL` 的顺序排列.
pub(crate) fn select<M: Metric>(calculator: &str, requested: &RequestedKeys) -> Vec<M> {
    M::ALL
        .iter()
        .copied()
        .filter(|m| requested.contains(MeasurementKey::new(calculator, m.as_str()).as_str()))
        .collect()
}

/// 将选出的指标映射为统计结果. 值为 `None` 的指标被省略.
pub(crate) fn collect_stats<M, F>(calculator: &str, wanted: &[M], mut value: F) -> Statistics
where
    M: Metric,
    F: FnMut(M) -> Option<f64>,
{
    wanted
        .iter()
        .filter_map(|m| value(*m).map(|v| (MeasurementKey::new(calculator, m.as_str()), v)))
        .collect()
}

/// 若干计算器共用的 DICOM 编码项.
pub(crate) mod codes {
    use crate::measurement::CodedEntry;

    pub fn volume() -> CodedEntry {
        CodedEntry::new("G-D705", "SRT", "Volume")
    }

    pub fn cubic_millimeter() -> CodedEntry {
        CodedEntry::new("mm3", "UCUM", "cubic millimeter")
    }

    pub fn cubic_centimeter() -> CodedEntry {
        CodedEntry::new("cm3", "UCUM", "cubic centimeter")
    }

    pub fn number_of_voxels() -> CodedEntry {
        CodedEntry::new("nvoxels", "99QIICR", "Number of voxels")
    }

    pub fn sum_of_voxel_volumes() -> CodedEntry {
        CodedEntry::new("126030", "DCM", "Sum of segmented voxel volumes")
    }
}

/// 计算器的封闭集合.
#[derive(Clone, Debug)]
pub enum Calculator {
    /// 闭合曲面计算器.
    ClosedSurface(ClosedSurfaceCalculator),

    /// 标签图计算器.
    Labelmap(LabelmapCalculator),

    /// 标量体计算器.
    ScalarVolume(ScalarVolumeCalculator),
}

macro_rules! dispatch {
    ($self:ident, $c:ident => $e:expr) => {
        match $self {
            Calculator::ClosedSurface($c) => $e,
            Calculator::Labelmap($c) => $e,
            Calculator::ScalarVolume($c) => $e,
        }
    };
}

impl Calculator {
    /// 默认配置下的全部计算器: 闭合曲面, 标签图, 标量体.
    pub fn standard() -> Vec<Calculator> {
        vec![
            ClosedSurfaceCalculator::new().into(),
            LabelmapCalculator::new().into(),
            ScalarVolumeCalculator::new().into(),
        ]
    }

    /// 测量键的元信息. 标量体计算器的强度类指标会使用 `volume` 的体素值语义.
    pub fn measurement_info_for(
        &self,
        key: &str,
        volume: Option<&ScalarVolume>,
    ) -> Option<MeasurementInfo> {
        match self {
            Calculator::ScalarVolume(c) => c.measurement_info_for(key, volume),
            other => other.measurement_info(key),
        }
    }
}

impl SegmentStatisticsCalculator for Calculator {
    fn name(&self) -> &'static str {
        dispatch!(self, c => c.name())
    }

    fn id(&self) -> &'static str {
        dispatch!(self, c => c.id())
    }

    fn keys(&self) -> &[MeasurementKey] {
        dispatch!(self, c => c.keys())
    }

    fn default_keys(&self) -> &[MeasurementKey] {
        dispatch!(self, c => c.default_keys())
    }

    fn compute(
        &self,
        input: &StatsInput<'_>,
        segment_id: &str,
        requested: &RequestedKeys,
    ) -> StatsResult<Statistics> {
        dispatch!(self, c => c.compute(input, segment_id, requested))
    }

    fn measurement_info(&self, key: &str) -> Option<MeasurementInfo> {
        dispatch!(self, c => c.measurement_info(key))
    }
}

impl From<ClosedSurfaceCalculator> for Calculator {
    fn from(value: ClosedSurfaceCalculator) -> Self {
        Self::ClosedSurface(value)
    }
}

impl From<LabelmapCalculator> for Calculator {
    fn from(value: LabelmapCalculator) -> Self {
        Self::Labelmap(value)
    }
}

impl From<ScalarVolumeCalculator> for Calculator {
    fn from(value: ScalarVolumeCalculator) -> Self {
        Self::ScalarVolume(value)
    }
}
