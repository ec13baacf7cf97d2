//! 通用常量.

/// 二值模板 (stencil) 使用的标签值.
pub mod label {
    /// 二值模板中, 背景体素的值.
    pub const BACKGROUND: u8 = 0;

    /// 二值模板中, 前景 (当前分段) 体素的值.
    pub const FOREGROUND: u8 = 1;
}

/// 立方毫米到立方厘米 (cc) 的换算系数.
pub const CC_PER_CUBIC_MM: f64 = 0.001;

/// 体素/像素类型.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ElemType {
    /// 标签值 `<= 0`, 代表背景.
    Background,

    /// 其余标签值, 代表前景.
    Foreground,
}

impl ElemType {
    /// 是否为前景.
    #[inline]
    pub fn is_foreground(&self) -> bool {
        matches!(self, Self::Foreground)
    }

    /// 是否为背景.
    #[inline]
    pub fn is_background(&self) -> bool {
        !self.is_foreground()
    }
}

#[cfg(test)]
mod tests {
    use super::{label, ElemType};

    #[test]
    fn test_elem_type() {
        assert!(ElemType::Foreground.is_foreground());
        assert!(ElemType::Background.is_background());
        assert_ne!(label::FOREGROUND, label::BACKGROUND);
    }
}
