//! 标量体计算器: 分段内的体素个数, 体积与强度统计量.
//!
//! 分段标签图先经组合变换重采样到参考体网格上 (最近邻插值, 不扩展范围),
//! 再作为模板对参考体图像做统计. 体积使用参考体网格的体素体积.

use std::collections::BTreeMap;

use log::{debug, trace};
use once_cell::sync::Lazy;

use super::{codes, collect_stats, keys_of, select, Metric, SegmentStatisticsCalculator, StatsInput};
use crate::accumulate::{accumulate, Reduction};
use crate::error::{StatsError, StatsResult};
use crate::geometry;
use crate::mask::BinaryMaskBuilder;
use crate::measurement::{CodedEntry, MeasurementInfo, MeasurementKey, RequestedKeys, Statistics};
use crate::resample::{resample_to_reference, ResampleOptions};
use crate::segmentation::{RepresentationKind, ScalarVolume};

const NAME: &str = "Scalar Volume";

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum ScalarMetric {
    VoxelCount,
    VolumeMm3,
    VolumeCc,
    Min,
    Max,
    Mean,
    Stdev,
}

impl ScalarMetric {
    /// 是否需要读取参考体的强度值?
    fn is_intensity(&self) -> bool {
        matches!(self, Self::Min | Self::Max | Self::Mean | Self::Stdev)
    }
}

impl Metric for ScalarMetric {
    const ALL: &'static [Self] = &[
        Self::VoxelCount,
        Self::VolumeMm3,
        Self::VolumeCc,
        Self::Min,
        Self::Max,
        Self::Mean,
        Self::Stdev,
    ];

    fn as_str(&self) -> &'static str {
        match self {
            Self::VoxelCount => "voxel_count",
            Self::VolumeMm3 => "volume_mm3",
            Self::VolumeCc => "volume_cc",
            Self::Min => "min",
            Self::Max => "max",
            Self::Mean => "mean",
            Self::Stdev => "stdev",
        }
    }
}

/// 与参考体无关的元信息.
static INFO: Lazy<BTreeMap<String, MeasurementInfo>> = Lazy::new(|| {
    let mut info = BTreeMap::new();
    info.insert(
        format!("{NAME}.voxel_count"),
        MeasurementInfo::new("voxel count", "number of voxels", "voxels")
            .with_quantity(codes::number_of_voxels())
            .with_units_code(CodedEntry::new("{voxels}", "UCUM", "voxels")),
    );
    info.insert(
        format!("{NAME}.volume_mm3"),
        MeasurementInfo::new("volume mm3", "volume in mm3", "mm3")
            .with_quantity(codes::volume())
            .with_units_code(codes::cubic_millimeter()),
    );
    info.insert(
        format!("{NAME}.volume_cc"),
        MeasurementInfo::new("volume cc", "volume in cc", "cc")
            .with_quantity(codes::volume())
            .with_units_code(codes::cubic_centimeter())
            .with_measurement_method(codes::sum_of_voxel_volumes()),
    );
    info
});

/// 基于二值标签图和参考标量体计算体素个数, 体积, 以及最小值, 最大值, 均值, 标准差.
///
/// 前景体素为 0 个时, 强度类指标被省略.
#[derive(Clone, Debug)]
pub struct ScalarVolumeCalculator {
    keys: Vec<MeasurementKey>,
    mask: BinaryMaskBuilder,
    resample: ResampleOptions,
}

impl Default for ScalarVolumeCalculator {
    fn default() -> Self {
        Self::new()
    }
}

impl ScalarVolumeCalculator {
    /// 创建计算器.
    pub fn new() -> Self {
        Self {
            keys: keys_of::<ScalarMetric>(NAME),
            mask: BinaryMaskBuilder::default(),
            resample: ResampleOptions::default(),
        }
    }

    /// 测量键的元信息.
    ///
    /// 强度类指标 (min, max, mean, stdev) 的量和单位取自 `volume` 的体素值语义,
    /// 缺失时使用空编码项.
    pub fn measurement_info_for(
        &self,
        key: &str,
        volume: Option<&ScalarVolume>,
    ) -> Option<MeasurementInfo> {
        if let Some(info) = INFO.get(key) {
            return Some(info.clone());
        }
        let metric = ScalarMetric::ALL
            .iter()
            .filter(|m| m.is_intensity())
            .find(|m| MeasurementKey::new(NAME, m.as_str()).as_str() == key)?;

        let quantity = volume
            .and_then(ScalarVolume::quantity)
            .cloned()
            .unwrap_or_default();
        let units = volume
            .and_then(ScalarVolume::units)
            .cloned()
            .unwrap_or_default();
        let (name, description, derivation) = match metric {
            ScalarMetric::Min => (
                "minimum",
                "minimum scalar value",
                CodedEntry::new("R-404FB", "SRT", "Minimum"),
            ),
            ScalarMetric::Max => (
                "maximum",
                "maximum scalar value",
                CodedEntry::new("G-A437", "SRT", "Maximum"),
            ),
            ScalarMetric::Mean => (
                "mean",
                "mean scalar value",
                CodedEntry::new("R-00317", "SRT", "Mean"),
            ),
            _ => (
                "standard deviation",
                "standard deviation of scalar values",
                CodedEntry::new("R-10047", "SRT", "Standard Deviation"),
            ),
        };
        let units_label = units.code_meaning().to_string();
        Some(
            MeasurementInfo::new(name, description, units_label)
                .with_quantity(quantity)
                .with_units_code(units)
                .with_derivation(derivation),
        )
    }
}

impl SegmentStatisticsCalculator for ScalarVolumeCalculator {
    fn name(&self) -> &'static str {
        NAME
    }

    fn id(&self) -> &'static str {
        "SV"
    }

    fn keys(&self) -> &[MeasurementKey] {
        &self.keys
    }

    fn compute(
        &self,
        input: &StatsInput<'_>,
        segment_id: &str,
        requested: &RequestedKeys,
    ) -> StatsResult<Statistics> {
        let wanted = select::<ScalarMetric>(NAME, requested);
        if wanted.is_empty() {
            debug!("{NAME}: no requested keys, skipped");
            return Ok(Statistics::new());
        }

        let kind = RepresentationKind::BinaryLabelmap;
        if !input.segmentation.contains_representation(kind) {
            debug!("{NAME}: segmentation has no {} representation", kind.name());
            return Ok(Statistics::new());
        }

        let Some((volume, image)) = input
            .reference_volume
            .filter(|v| v.has_image_data())
            .and_then(|v| v.image().map(|img| (v, img)))
        else {
            debug!("{NAME}: no reference volume image");
            return Ok(Statistics::new());
        };

        let segment = input
            .segmentation
            .segment(segment_id)
            .ok_or_else(|| StatsError::UnknownSegment(segment_id.to_string()))?;
        let Some(labelmap) = segment.binary_labelmap() else {
            debug!("{NAME}: segment `{segment_id}` has no {}", kind.name());
            return Ok(Statistics::new());
        };

        let transform = geometry::resolve(
            input.segmentation.parent_transform(),
            volume.parent_transform(),
        )?;
        let reference = image.geometry();
        trace!(
            "{NAME}: `{segment_id}` onto `{}` {:?}, spacing {:?}",
            volume.name(),
            reference.extent(),
            reference.spacing()
        );
        let resampled = resample_to_reference(labelmap, reference, &transform, self.resample);
        let stencil = self.mask.build(&resampled);

        let reduction = if wanted.iter().any(ScalarMetric::is_intensity) {
            Reduction::Full
        } else {
            Reduction::CountOnly
        };
        let acc = accumulate(image.data(), stencil.data(), self.mask.foreground(), reduction)?;
        let voxel_volume = reference.voxel_volume();
        trace!("{NAME}: `{segment_id}` {acc:?}");

        let intensity = acc.intensity;
        Ok(collect_stats(NAME, &wanted, |m| match m {
            ScalarMetric::VoxelCount => Some(acc.voxel_count as f64),
            ScalarMetric::VolumeMm3 => Some(acc.volume_mm3(voxel_volume)),
            ScalarMetric::VolumeCc => Some(acc.volume_cc(voxel_volume)),
            ScalarMetric::Min => intensity.map(|s| s.min),
            ScalarMetric::Max => intensity.map(|s| s.max),
            ScalarMetric::Mean => intensity.map(|s| s.mean),
            ScalarMetric::Stdev => intensity.map(|s| s.stdev),
        }))
    }

    fn measurement_info(&self, key: &str) -> Option<MeasurementInfo> {
        self.measurement_info_for(key, None)
    }
}
