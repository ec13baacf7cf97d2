//! 计算器注册表: 保存计算器列表与请求的测量键, 并将统计请求分派给各计算器.

use log::debug;

use super::{Calculator, SegmentStatisticsCalculator, StatsInput};
use crate::error::{StatsError, StatsResult};
use crate::measurement::{MeasurementInfo, MeasurementKey, RequestedKeys, Statistics};
use crate::report::StatisticsTable;
use crate::segmentation::{ScalarVolume, Segment};

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
    }
}

/// 计算器注册表.
///
/// 请求的测量键初始为所有计算器的默认键. 只有属于某个已注册计算器的键才能被请求.
#[derive(Clone, Debug)]
pub struct CalculatorRegistry {
    calculators: Vec<Calculator>,
    requested: RequestedKeys,
}

impl Default for CalculatorRegistry {
    fn default() -> Self {
        Self::new(Calculator::standard())
    }
}

impl CalculatorRegistry {
    /// 以给定的计算器列表创建注册表. 列表顺序决定报告中列的顺序.
    pub fn new(calculators: Vec<Calculator>) -> Self {
        let requested = calculators
            .iter()
            .flat_map(|c| c.default_keys().iter().cloned())
            .collect();
        Self {
            calculators,
            requested,
        }
    }

    /// 已注册的计算器.
    #[inline]
    pub fn calculators(&self) -> &[Calculator] {
        &self.calculators
    }

    /// 按计算器名称查找.
    pub fn calculator(&self, name: &str) -> Option<&Calculator> {
        self.calculators.iter().find(|c| c.name() == name)
    }

    /// 所有计算器的全部测量键, 按注册顺序排列.
    pub fn keys(&self) -> impl Iterator<Item = &MeasurementKey> + '_ {
        self.calculators.iter().flat_map(|c| c.keys().iter())
    }

    /// 当前请求的测量键.
    #[inline]
    pub fn requested_keys(&self) -> &RequestedKeys {
        &self.requested
    }

    /// 该测量键是否被请求?
    pub fn is_requested(&self, key: &str) -> bool {
        self.requested.contains(key)
    }

    fn owner(&self, key: &str) -> Option<&Calculator> {
        self.calculators.iter().find(|c| c.owns(key))
    }

    /// 请求一个测量键. 没有计算器支持该键时返回 `false`.
    pub fn request(&mut self, key: &str) -> bool {
        if self.owner(key).is_none() {
            debug!("no calculator provides `{key}`");
            return false;
        }
        self.requested.insert(MeasurementKey::from(key));
        true
    }

    /// 取消请求一个测量键. 该键原先未被请求时返回 `false`.
    pub fn unrequest(&mut self, key: &str) -> bool {
        self.requested.remove(key)
    }

    /// 以 `keys` 替换全部请求. 不被任何计算器支持的键被忽略.
    pub fn set_requested<I, K>(&mut self, keys: I)
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        self.requested.clear();
        for key in keys {
            self.request(key.as_ref());
        }
    }

    /// 请求所有计算器的全部测量键.
    pub fn request_all(&mut self) {
        self.requested = self.keys().cloned().collect();
    }

    /// 计算单个分段的统计量, 合并各计算器的结果.
    pub fn compute_segment(&self, input: &StatsInput<'_>, segment_id: &str) -> StatsResult<Statistics> {
        if input.segmentation.segment(segment_id).is_none() {
            return Err(StatsError::UnknownSegment(segment_id.to_string()));
        }
        let mut stats = Statistics::new();
        for calc in self.calculators.iter() {
            stats.extend(calc.compute(input, segment_id, &self.requested)?);
        }
        Ok(stats)
    }

    /// 按分段顺序计算所有分段的统计量. 返回 `(分段 ID, 统计量)` 列表.
    ///
    /// 开启 `rayon` feature 时各分段并行计算.
    pub fn compute_all(&self, input: &StatsInput<'_>) -> StatsResult<Vec<(String, Statistics)>> {
        let segments = input.segmentation.segments();
        let compute_one = |segment: &Segment| {
            self.compute_segment(input, segment.id())
                .map(|stats| (segment.id().to_string(), stats))
        };

        #[cfg(feature = "rayon")]
        let rows = segments.par_iter().map(compute_one).collect();

        #[cfg(not(feature = "rayon"))]
        let rows = segments.iter().map(compute_one).collect();

        rows
    }

    /// 计算所有分段并汇总为表格.
    pub fn report(&self, input: &StatsInput<'_>) -> StatsResult<StatisticsTable> {
        let rows = self.compute_all(input)?;
        Ok(StatisticsTable::new(self, input.segmentation, rows))
    }

    /// 测量键的元信息, 按键前缀 (计算器名称) 分派. 未知的键返回 `None`.
    pub fn measurement_info(&self, key: &str) -> Option<MeasurementInfo> {
        self.measurement_info_for(key, None)
    }

    /// 同 [`CalculatorRegistry::measurement_info`], 强度类指标使用 `volume` 的体素值语义.
    pub fn measurement_info_for(
        &self,
        key: &str,
        volume: Option<&ScalarVolume>,
    ) -> Option<MeasurementInfo> {
        let prefix = MeasurementKey::from(key);
        self.calculator(prefix.calculator())?
            .measurement_info_for(key, volume)
    }
}

#[cfg(test)]
mod tests {
    use super::CalculatorRegistry;
    use crate::calculator::fixtures::{f64_eq, image, init_logger, segmentation};
    use crate::calculator::{Calculator, ClosedSurfaceCalculator, LabelmapCalculator, StatsInput};
    use crate::error::StatsError;
    use crate::segmentation::ScalarVolume;

    #[test]
    fn test_default_requested_keys() {
        let registry = CalculatorRegistry::default();
        assert_eq!(registry.calculators().len(), 3);
        assert_eq!(registry.keys().count(), 13);
        assert_eq!(registry.requested_keys().len(), 13);
        let first: Vec<_> = registry.keys().take(4).map(|k| k.as_str()).collect();
        assert_eq!(
            first,
            vec![
                "Closed Surface.surface_mm2",
                "Closed Surface.volume_mm3",
                "Closed Surface.volume_cc",
                "Labelmap.voxel_count"
            ]
        );
    }

    #[test]
    fn test_request_and_unrequest() {
        let mut registry = CalculatorRegistry::default();
        registry.set_requested(["Labelmap.volume_mm3", "Bogus.key", "Scalar Volume.mean"]);
        assert_eq!(registry.requested_keys().len(), 2);
        assert!(registry.is_requested("Scalar Volume.mean"));
        assert!(!registry.request("Labelmap.surface_mm2"));
        assert!(registry.request("Closed Surface.volume_cc"));
        assert!(registry.unrequest("Scalar Volume.mean"));
        assert!(!registry.unrequest("Scalar Volume.mean"));
        registry.request_all();
        assert_eq!(registry.requested_keys().len(), 13);
    }

    #[test]
    fn test_compute_segment_merges() {
        init_logger();
        let seg = segmentation();
        let volume = ScalarVolume::new("ct").with_image(image());
        let input = StatsInput::new(&seg).with_reference_volume(&volume);
        let registry = CalculatorRegistry::default();

        let stats = registry.compute_segment(&input, "both").unwrap();
        assert_eq!(stats.len(), 13);
        assert!(f64_eq(stats["Closed Surface.volume_mm3"], 1000.0));
        assert_eq!(stats["Labelmap.voxel_count"], stats["Scalar Volume.voxel_count"]);

        // 只有闭合曲面的分段.
        let stats = registry.compute_segment(&input, "surface").unwrap();
        assert_eq!(stats.len(), 3);
        assert!(stats.keys().all(|k| k.calculator() == "Closed Surface"));

        let err = registry.compute_segment(&input, "ghost").unwrap_err();
        assert!(matches!(err, StatsError::UnknownSegment(_)));
    }

    #[test]
    fn test_compute_all_in_order() {
        let seg = segmentation();
        let mut registry = CalculatorRegistry::new(vec![
            Calculator::from(ClosedSurfaceCalculator::new()),
            LabelmapCalculator::new().into(),
        ]);
        registry.set_requested(["Labelmap.voxel_count"]);
        let rows = registry.compute_all(&StatsInput::new(&seg)).unwrap();
        let ids: Vec<_> = rows.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["both", "surface", "empty"]);
        assert_eq!(rows[0].1["Labelmap.voxel_count"], 64.0);
        assert!(rows[1].1.is_empty());
        assert_eq!(rows[2].1["Labelmap.voxel_count"], 0.0);

        registry.set_requested(Vec::<String>::new());
        let rows = registry.compute_all(&StatsInput::new(&seg)).unwrap();
        assert!(rows.iter().all(|(_, s)| s.is_empty()));
    }

    #[test]
    fn test_measurement_info_dispatch() {
        let registry = CalculatorRegistry::default();
        let info = registry.measurement_info("Labelmap.volume_mm3").unwrap();
        assert_eq!(info.units(), "mm3");
        assert!(registry.measurement_info("Scalar Volume.max").is_some());
        assert!(registry.measurement_info("Unknown.max").is_none());
        assert!(registry.measurement_info("Labelmap.max").is_none());
    }
}
