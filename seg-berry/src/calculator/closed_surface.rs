//! 闭合曲面计算器: 表面积与体积.

use std::collections::BTreeMap;

use log::{debug, trace, warn};
use once_cell::sync::Lazy;

use super::{codes, collect_stats, keys_of, select, Metric, SegmentStatisticsCalculator, StatsInput};
use crate::error::{StatsError, StatsResult};
use crate::measurement::{CodedEntry, MeasurementInfo, MeasurementKey, RequestedKeys, Statistics};
use crate::segmentation::RepresentationKind;

const NAME: &str = "Closed Surface";

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum SurfaceMetric {
    SurfaceMm2,
    VolumeMm3,
    VolumeCc,
}

impl Metric for SurfaceMetric {
    const ALL: &'static [Self] = &[Self::SurfaceMm2, Self::VolumeMm3, Self::VolumeCc];

    fn as_str(&self) -> &'static str {
        match self {
            Self::SurfaceMm2 => "surface_mm2",
            Self::VolumeMm3 => "volume_mm3",
            Self::VolumeCc => "volume_cc",
        }
    }
}

static INFO: Lazy<BTreeMap<String, MeasurementInfo>> = Lazy::new(|| {
    let mut info = BTreeMap::new();
    // CHEMINF 不是 DICOM 认可的编码方案, 因此加 "99" 前缀.
    info.insert(
        format!("{NAME}.surface_mm2"),
        MeasurementInfo::new("surface mm2", "surface area in mm2", "mm2")
            .with_quantity(CodedEntry::new("000247", "99CHEMINF", "surface area"))
            .with_units_code(CodedEntry::new("mm2", "UCUM", "squared millimeters")),
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
            .with_units_code(codes::cubic_centimeter()),
    );
    info
});

/// 基于闭合曲面表示计算表面积 (平方毫米) 与体积 (立方毫米, 立方厘米).
///
/// 默认信任调用方提供的网格是闭合且朝向一致的. 开启闭合检查后,
/// 存在边界边的网格会导致 [`StatsError::OpenSurface`].
#[derive(Clone, Debug)]
pub struct ClosedSurfaceCalculator {
    keys: Vec<MeasurementKey>,
    closure_check: bool,
}

impl Default for ClosedSurfaceCalculator {
    fn default() -> Self {
        Self::new()
    }
}

impl ClosedSurfaceCalculator {
    /// 创建计算器, 不做闭合检查.
    pub fn new() -> Self {
        Self {
            keys: keys_of::<SurfaceMetric>(NAME),
            closure_check: false,
        }
    }

    /// 开启或关闭闭合检查.
    pub fn with_closure_check(mut self, enabled: bool) -> Self {
        self.closure_check = enabled;
        self
    }

    /// 是否开启了闭合检查?
    #[inline]
    pub fn closure_check(&self) -> bool {
        self.closure_check
    }
}

impl SegmentStatisticsCalculator for ClosedSurfaceCalculator {
    fn name(&self) -> &'static str {
        NAME
    }

    fn id(&self) -> &'static str {
        "CS"
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
        let wanted = select::<SurfaceMetric>(NAME, requested);
        if wanted.is_empty() {
            debug!("{NAME}: no requested keys, skipped");
            return Ok(Statistics::new());
        }

        let kind = RepresentationKind::ClosedSurface;
        if !input.segmentation.contains_representation(kind) {
            debug!("{NAME}: segmentation has no {} representation", kind.name());
            return Ok(Statistics::new());
        }
        let segment = input
            .segmentation
            .segment(segment_id)
            .ok_or_else(|| StatsError::UnknownSegment(segment_id.to_string()))?;
        let Some(surface) = segment.closed_surface() else {
            debug!("{NAME}: segment `{segment_id}` has no {}", kind.name());
            return Ok(Statistics::new());
        };

        if self.closure_check {
            let boundary_edges = surface.boundary_edge_count();
            if boundary_edges > 0 {
                warn!("{NAME}: surface of `{segment_id}` has {boundary_edges} boundary edges");
                return Err(StatsError::OpenSurface {
                    segment: segment_id.to_string(),
                    boundary_edges,
                });
            }
        }

        let need_area = wanted.contains(&SurfaceMetric::SurfaceMm2);
        let need_volume = wanted
            .iter()
            .any(|m| matches!(m, SurfaceMetric::VolumeMm3 | SurfaceMetric::VolumeCc));
        let props = surface.mass_properties(need_area, need_volume);
        trace!("{NAME}: `{segment_id}` {props:?}");

        Ok(collect_stats(NAME, &wanted, |m| match m {
            SurfaceMetric::SurfaceMm2 => props.surface_mm2,
            SurfaceMetric::VolumeMm3 => props.volume_mm3,
            SurfaceMetric::VolumeCc => props.volume_cc(),
        }))
    }

    fn measurement_info(&self, key: &str) -> Option<MeasurementInfo> {
        INFO.get(key).cloned()
    }
}
