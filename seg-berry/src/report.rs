//! 多个分段统计结果的汇总表格.

use std::io::{self, Write};

use crate::calculator::CalculatorRegistry;
use crate::measurement::{MeasurementKey, Statistics};
use crate::segmentation::Segmentation;

/// 表格中的一行, 对应一个分段.
#[derive(Clone, Debug, PartialEq)]
pub struct StatisticsRow {
    /// 分段 ID.
    pub segment_id: String,
    /// 分段显示名称.
    pub segment_name: String,
    /// 统计量.
    pub values: Statistics,
}

/// 汇总表格. 列为至少一行含有值的测量键, 按注册表中的顺序排列.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StatisticsTable {
    columns: Vec<MeasurementKey>,
    rows: Vec<StatisticsRow>,
}

impl StatisticsTable {
    /// 由 `(分段 ID, 统计量)` 列表创建表格. 分段名称从 `segmentation` 中查找.
    pub fn new(
        registry: &CalculatorRegistry,
        segmentation: &Segmentation,
        results: Vec<(String, Statistics)>,
    ) -> Self {
        let columns = registry
            .keys()
            .filter(|k| results.iter().any(|(_, s)| s.contains_key(*k)))
            .cloned()
            .collect();
        let rows = results
            .into_iter()
            .map(|(segment_id, values)| StatisticsRow {
                segment_name: segmentation
                    .segment(&segment_id)
                    .map(|s| s.name().to_string())
                    .unwrap_or_default(),
                segment_id,
                values,
            })
            .collect();
        Self { columns, rows }
    }

    /// 列.
    #[inline]
    pub fn columns(&self) -> &[MeasurementKey] {
        &self.columns
    }

    /// 行.
    #[inline]
    pub fn rows(&self) -> &[StatisticsRow] {
        &self.rows
    }

    /// 行数.
    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// 是否没有任何行?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// 查询某分段某测量键的值.
    pub fn get(&self, segment_id: &str, key: &str) -> Option<f64> {
        self.rows
            .iter()
            .find(|r| r.segment_id == segment_id)
            .and_then(|r| r.values.get(key).copied())
    }

    /// 以 CSV 格式写出. 首列为分段名称, 缺失的值留空.
    pub fn write_csv<W: Write>(&self, mut w: W) -> io::Result<()> {
        let header = std::iter::once("Segment").chain(self.columns.iter().map(MeasurementKey::as_str));
        write_record(&mut w, header)?;
        for row in self.rows.iter() {
            let cells: Vec<String> = self
                .columns
                .iter()
                .map(|k| row.values.get(k).map(f64::to_string).unwrap_or_default())
                .collect();
            let record = std::iter::once(row.segment_name.as_str()).chain(cells.iter().map(String::as_str));
            write_record(&mut w, record)?;
        }
        w.flush()
    }
}

/// 写出一行. 含有逗号, 引号或换行的字段加引号, 内部引号双写.
fn write_record<'a, W: Write>(w: &mut W, fields: impl Iterator<Item = &'a str>) -> io::Result<()> {
    for (i, field) in fields.enumerate() {
        if i > 0 {
            w.write_all(b",")?;
        }
        if field.contains([',', '"', '\n', '\r']) {
            write!(w, "\"{}\"", field.replace('"', "\"\""))?;
        } else {
            w.write_all(field.as_bytes())?;
        }
    }
    w.write_all(b"\n")
}
