//! 标签图计算器: 体素个数与体积.

use std::collections::BTreeMap;

use log::{debug, trace};
use once_cell::sync::Lazy;

use super::{codes, collect_stats, keys_of, select, Metric, SegmentStatisticsCalculator, StatsInput};
use crate::accumulate::{accumulate, Reduction};
use crate::error::{StatsError, StatsResult};
use crate::mask::BinaryMaskBuilder;
use crate::measurement::{CodedEntry, MeasurementInfo, MeasurementKey, RequestedKeys, Statistics};
use crate::segmentation::RepresentationKind;

const NAME: &str = "Labelmap";

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum LabelmapMetric {
    VoxelCount,
    VolumeMm3,
    VolumeCc,
}

impl Metric for LabelmapMetric {
    const ALL: &'static [Self] = &[Self::VoxelCount, Self::VolumeMm3, Self::VolumeCc];

    fn as_str(&self) -> &'static str {
        match self {
            Self::VoxelCount => "voxel_count",
            Self::VolumeMm3 => "volume_mm3",
            Self::VolumeCc => "volume_cc",
        }
    }
}

static INFO: Lazy<BTreeMap<String, MeasurementInfo>> = Lazy::new(|| {
    let mut info = BTreeMap::new();
    // 体素个数没有合适的标准编码, 暂用私有方案.
    info.insert(
        format!("{NAME}.voxel_count"),
        MeasurementInfo::new("voxel count", "number of voxels", "voxels")
            .with_quantity(codes::number_of_voxels())
            .with_units_code(CodedEntry::new("voxels", "UCUM", "voxels")),
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

/// 基于二值标签图计算前景体素个数和体积. 体素体积取标签图自身的间距.
#[derive(Clone, Debug)]
pub struct LabelmapCalculator {
    keys: Vec<MeasurementKey>,
    mask: BinaryMaskBuilder,
}

impl Default for LabelmapCalculator {
    fn default() -> Self {
        Self::new()
    }
}

impl LabelmapCalculator {
    /// 创建计算器.
    pub fn new() -> Self {
        Self {
            keys: keys_of::<LabelmapMetric>(NAME),
            mask: BinaryMaskBuilder::default(),
        }
    }
}

impl SegmentStatisticsCalculator for LabelmapCalculator {
    fn name(&self) -> &'static str {
        NAME
    }

    fn id(&self) -> &'static str {
        "LM"
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
        let wanted = select::<LabelmapMetric>(NAME, requested);
        if wanted.is_empty() {
            debug!("{NAME}: no requested keys, skipped");
            return Ok(Statistics::new());
        }

        let kind = RepresentationKind::BinaryLabelmap;
        if !input.segmentation.contains_representation(kind) {
            debug!("{NAME}: segmentation has no {} representation", kind.name());
            return Ok(Statistics::new());
        }
        let segment = input
            .segmentation
            .segment(segment_id)
            .ok_or_else(|| StatsError::UnknownSegment(segment_id.to_string()))?;
        let Some(labelmap) = segment.binary_labelmap() else {
            debug!("{NAME}: segment `{segment_id}` has no {}", kind.name());
            return Ok(Statistics::new());
        };

        let stencil = self.mask.build(labelmap);
        let acc = accumulate(
            stencil.data(),
            stencil.data(),
            self.mask.foreground(),
            Reduction::CountOnly,
        )?;
        let voxel_volume = labelmap.geometry().voxel_volume();
        trace!(
            "{NAME}: `{segment_id}` {} voxels of {voxel_volume} mm3",
            acc.voxel_count
        );

        Ok(collect_stats(NAME, &wanted, |m| {
            Some(match m {
                LabelmapMetric::VoxelCount => acc.voxel_count as f64,
                LabelmapMetric::VolumeMm3 => acc.volume_mm3(voxel_volume),
                LabelmapMetric::VolumeCc => acc.volume_cc(voxel_volume),
            })
        }))
    }

    fn measurement_info(&self, key: &str) -> Option<MeasurementInfo> {
        INFO.get(key).cloned()
    }
}
