//! 测量键与测量元信息.
//!
//! 测量键的格式为 `"<计算器名称>.<指标>"`, 如 `"Labelmap.volume_mm3"`.

use std::borrow::Borrow;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

mod info;

pub use info::{CodedEntry, MeasurementInfo};

/// 测量键.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct MeasurementKey(String);

impl MeasurementKey {
    /// 由计算器名称和指标名称拼接出测量键.
    pub fn new(calculator: &str, metric: &str) -> Self {
        Self(format!("{calculator}.{metric}"))
    }

    /// 计算器名称部分. 不含 `.` 时返回整个键.
    pub fn calculator(&self) -> &str {
        self.0.split_once('.').map_or(self.0.as_str(), |(c, _)| c)
    }

    /// 指标名称部分. 不含 `.` 时返回空串.
    pub fn metric(&self) -> &str {
        self.0.split_once('.').map_or("", |(_, m)| m)
    }

    /// 完整字符串.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for MeasurementKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for MeasurementKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Borrow<str> for MeasurementKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for MeasurementKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MeasurementKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 单个分段的统计结果, 测量键 -> 数值.
pub type Statistics = BTreeMap<MeasurementKey, f64>;

/// 请求计算的测量键集合.
pub type RequestedKeys = BTreeSet<MeasurementKey>;

#[cfg(test)]
mod tests {
    use super::{MeasurementKey, RequestedKeys};

    #[test]
    fn test_key_parts() {
        let key = MeasurementKey::new("Scalar Volume", "stdev");
        assert_eq!(key.as_str(), "Scalar Volume.stdev");
        assert_eq!(key.calculator(), "Scalar Volume");
        assert_eq!(key.metric(), "stdev");
        assert_eq!(key.to_string(), "Scalar Volume.stdev");

        let odd = MeasurementKey::from("nodot");
        assert_eq!(odd.calculator(), "nodot");
        assert_eq!(odd.metric(), "");
    }

    #[test]
    fn test_key_lookup_by_str() {
        let keys: RequestedKeys = ["Labelmap.voxel_count", "Labelmap.volume_cc"]
            .into_iter()
            .map(MeasurementKey::from)
            .collect();
        assert!(keys.contains("Labelmap.volume_cc"));
        assert!(!keys.contains("Labelmap.volume_mm3"));
    }
}
