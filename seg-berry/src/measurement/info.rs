//! 测量元信息: 名称, 说明, 单位, 以及 DICOM 编码项.

use std::fmt;

/// DICOM 编码项 `(code value, coding scheme designator, code meaning)`.
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CodedEntry {
    code_value: String,
    coding_scheme_designator: String,
    code_meaning: String,
}

impl CodedEntry {
    /// 创建编码项.
    pub fn new(
        code_value: impl Into<String>,
        coding_scheme_designator: impl Into<String>,
        code_meaning: impl Into<String>,
    ) -> Self {
        Self {
            code_value: code_value.into(),
            coding_scheme_designator: coding_scheme_designator.into(),
            code_meaning: code_meaning.into(),
        }
    }

    /// Code value.
    #[inline]
    pub fn code_value(&self) -> &str {
        &self.code_value
    }

    /// Coding scheme designator.
    #[inline]
    pub fn coding_scheme_designator(&self) -> &str {
        &self.coding_scheme_designator
    }

    /// Code meaning.
    #[inline]
    pub fn code_meaning(&self) -> &str {
        &self.code_meaning
    }

    /// 三个字段是否都为空?
    pub fn is_empty(&self) -> bool {
        self.code_value.is_empty()
            && self.coding_scheme_designator.is_empty()
            && self.code_meaning.is_empty()
    }
}

/// 格式为 `CodeValue:<v>|CodingSchemeDesignator:<s>|CodeMeaning:<m>`.
/// 空字段被省略, 全空时输出空串.
impl fmt::Display for CodedEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields = [
            ("CodeValue", &self.code_value),
            ("CodingSchemeDesignator", &self.coding_scheme_designator),
            ("CodeMeaning", &self.code_meaning),
        ];
        let mut first = true;
        for (name, value) in fields.iter().filter(|(_, v)| !v.is_empty()) {
            if !first {
                f.write_str("|")?;
            }
            write!(f, "{name}:{value}")?;
            first = false;
        }
        Ok(())
    }
}

/// 一个测量键的元信息.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MeasurementInfo {
    name: String,
    description: String,
    units: String,
    quantity_code: Option<CodedEntry>,
    units_code: Option<CodedEntry>,
    derivation_code: Option<CodedEntry>,
    measurement_method_code: Option<CodedEntry>,
}

impl MeasurementInfo {
    /// 以名称, 说明和单位创建元信息, 编码项留空.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        units: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            units: units.into(),
            ..Default::default()
        }
    }

    /// 设置被测量的量 (quantity) 编码.
    pub fn with_quantity(mut self, code: CodedEntry) -> Self {
        self.quantity_code = Some(code);
        self
    }

    /// 设置单位编码.
    pub fn with_units_code(mut self, code: CodedEntry) -> Self {
        self.units_code = Some(code);
        self
    }

    /// 设置推导方式编码 (如最小值, 均值).
    pub fn with_derivation(mut self, code: CodedEntry) -> Self {
        self.derivation_code = Some(code);
        self
    }

    /// 设置测量方法编码.
    pub fn with_measurement_method(mut self, code: CodedEntry) -> Self {
        self.measurement_method_code = Some(code);
        self
    }

    /// 名称.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 说明.
    #[inline]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// 单位.
    #[inline]
    pub fn units(&self) -> &str {
        &self.units
    }

    /// Quantity 编码.
    #[inline]
    pub fn quantity_code(&self) -> Option<&CodedEntry> {
        self.quantity_code.as_ref()
    }

    /// 单位编码.
    #[inline]
    pub fn units_code(&self) -> Option<&CodedEntry> {
        self.units_code.as_ref()
    }

    /// 推导方式编码.
    #[inline]
    pub fn derivation_code(&self) -> Option<&CodedEntry> {
        self.derivation_code.as_ref()
    }

    /// 测量方法编码.
    #[inline]
    pub fn measurement_method_code(&self) -> Option<&CodedEntry> {
        self.measurement_method_code.as_ref()
    }

    /// 以 `DICOM.<字段名>` 为键, 列出所有已设置的编码项的字符串形式.
    pub fn dicom_fields(&self) -> Vec<(&'static str, String)> {
        [
            ("DICOM.QuantityCode", &self.quantity_code),
            ("DICOM.UnitsCode", &self.units_code),
            ("DICOM.DerivationCode", &self.derivation_code),
            ("DICOM.MeasurementMethodCode", &self.measurement_method_code),
        ]
        .into_iter()
        .filter_map(|(k, v)| v.as_ref().map(|e| (k, e.to_string())))
        .collect()
    }
}
