//! 分割, 分段与参考标量体数据.

use std::collections::BTreeMap;

use crate::geometry::TransformNode;
use crate::grid::{BinaryLabelmap, ScalarImage};
use crate::measurement::CodedEntry;
use crate::mesh::ClosedSurface;

/// 分段表示的类型.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum RepresentationKind {
    /// 闭合三角网格.
    ClosedSurface,

    /// 二值标签图.
    BinaryLabelmap,
}

impl RepresentationKind {
    /// 表示名称.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::ClosedSurface => "Closed surface",
            Self::BinaryLabelmap => "Binary labelmap",
        }
    }
}

/// 分段的一种表示.
#[derive(Clone, Debug)]
pub enum Representation {
    /// 闭合三角网格.
    ClosedSurface(ClosedSurface),

    /// 二值标签图.
    BinaryLabelmap(BinaryLabelmap),
}

impl Representation {
    /// 表示类型.
    pub fn kind(&self) -> RepresentationKind {
        match self {
            Self::ClosedSurface(_) => RepresentationKind::ClosedSurface,
            Self::BinaryLabelmap(_) => RepresentationKind::BinaryLabelmap,
        }
    }
}

impl From<ClosedSurface> for Representation {
    fn from(value: ClosedSurface) -> Self {
        Self::ClosedSurface(value)
    }
}

impl From<BinaryLabelmap> for Representation {
    fn from(value: BinaryLabelmap) -> Self {
        Self::BinaryLabelmap(value)
    }
}

/// 分割中的一个分段 (如肝脏, 肿瘤). 每种表示至多一个.
#[derive(Clone, Debug)]
pub struct Segment {
    id: String,
    name: String,
    representations: BTreeMap<RepresentationKind, Representation>,
}

impl Segment {
    /// 创建不含任何表示的分段.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            representations: BTreeMap::new(),
        }
    }

    /// 添加 (或替换) 一种表示.
    pub fn with_representation(mut self, rep: impl Into<Representation>) -> Self {
        self.set_representation(rep);
        self
    }

    /// 添加 (或替换) 一种表示, 返回被替换的旧表示.
    pub fn set_representation(&mut self, rep: impl Into<Representation>) -> Option<Representation> {
        let rep = rep.into();
        self.representations.insert(rep.kind(), rep)
    }

    /// 移除一种表示.
    pub fn remove_representation(&mut self, kind: RepresentationKind) -> Option<Representation> {
        self.representations.remove(&kind)
    }

    /// 分段 ID.
    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// 显示名称.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 是否含有该类型的表示?
    #[inline]
    pub fn has_representation(&self, kind: RepresentationKind) -> bool {
        self.representations.contains_key(&kind)
    }

    /// 获取该类型的表示.
    #[inline]
    pub fn representation(&self, kind: RepresentationKind) -> Option<&Representation> {
        self.representations.get(&kind)
    }

    /// 闭合曲面表示.
    pub fn closed_surface(&self) -> Option<&ClosedSurface> {
        match self.representation(RepresentationKind::ClosedSurface) {
            Some(Representation::ClosedSurface(s)) => Some(s),
            _ => None,
        }
    }

    /// 二值标签图表示.
    pub fn binary_labelmap(&self) -> Option<&BinaryLabelmap> {
        match self.representation(RepresentationKind::BinaryLabelmap) {
            Some(Representation::BinaryLabelmap(l)) => Some(l),
            _ => None,
        }
    }
}

/// 分割: 有序的分段集合, 以及可选的父变换.
#[derive(Clone, Debug, Default)]
pub struct Segmentation {
    segments: Vec<Segment>,
    parent_transform: Option<TransformNode>,
}

impl Segmentation {
    /// 创建空分割.
    pub fn new() -> Self {
        Self::default()
    }

    /// 指定父变换.
    pub fn with_parent_transform(mut self, node: TransformNode) -> Self {
        self.parent_transform = Some(node);
        self
    }

    /// 设置或清除父变换.
    pub fn set_parent_transform(&mut self, node: Option<TransformNode>) {
        self.parent_transform = node;
    }

    /// 父变换. `None` 代表分割直接位于世界坐标系.
    #[inline]
    pub fn parent_transform(&self) -> Option<&TransformNode> {
        self.parent_transform.as_ref()
    }

    /// 添加分段. ID 已存在时原位替换并返回旧分段.
    pub fn add_segment(&mut self, segment: Segment) -> Option<Segment> {
        match self.segments.iter_mut().find(|s| s.id == segment.id) {
            Some(slot) => Some(std::mem::replace(slot, segment)),
            None => {
                self.segments.push(segment);
                None
            }
        }
    }

    /// 以 builder 形式添加分段.
    pub fn with_segment(mut self, segment: Segment) -> Self {
        self.add_segment(segment);
        self
    }

    /// 按 ID 查找分段.
    pub fn segment(&self, id: &str) -> Option<&Segment> {
        self.segments.iter().find(|s| s.id == id)
    }

    /// 按添加顺序排列的全部分段.
    #[inline]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// 按添加顺序排列的全部分段 ID.
    pub fn segment_ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.segments.iter().map(|s| s.id())
    }

    /// 分段个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// 是否没有任何分段?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// 是否至少有一个分段含有该类型的表示?
    pub fn contains_representation(&self, kind: RepresentationKind) -> bool {
        self.segments.iter().any(|s| s.has_representation(kind))
    }
}

/// 参考标量体数据 (如 CT 扫描).
#[derive(Clone, Debug, Default)]
pub struct ScalarVolume {
    name: String,
    image: Option<ScalarImage>,
    quantity: Option<CodedEntry>,
    units: Option<CodedEntry>,
    parent_transform: Option<TransformNode>,
}

impl ScalarVolume {
    /// 创建尚未加载图像数据的体数据.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// 指定图像数据.
    pub fn with_image(mut self, image: ScalarImage) -> Self {
        self.image = Some(image);
        self
    }

    /// 指定体素值语义: 被测量的量 (如 "Attenuation Coefficient") 和单位 (如 "Hounsfield unit").
    pub fn with_value_semantics(mut self, quantity: CodedEntry, units: CodedEntry) -> Self {
        self.quantity = Some(quantity);
        self.units = Some(units);
        self
    }

    /// 指定父变换.
    pub fn with_parent_transform(mut self, node: TransformNode) -> Self {
        self.parent_transform = Some(node);
        self
    }

    /// 名称.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 图像数据.
    #[inline]
    pub fn image(&self) -> Option<&ScalarImage> {
        self.image.as_ref()
    }

    /// 是否有可用的 (非空) 图像数据?
    pub fn has_image_data(&self) -> bool {
        self.image
            .as_ref()
            .is_some_and(|img| !img.geometry().is_empty())
    }

    /// 体素值的量.
    #[inline]
    pub fn quantity(&self) -> Option<&CodedEntry> {
        self.quantity.as_ref()
    }

    /// 体素值的单位.
    #[inline]
    pub fn units(&self) -> Option<&CodedEntry> {
        self.units.as_ref()
    }

    /// 父变换.
    #[inline]
    pub fn parent_transform(&self) -> Option<&TransformNode> {
        self.parent_transform.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::{RepresentationKind, ScalarVolume, Segment, Segmentation};
    use crate::geometry::Geometry;
    use crate::grid::VoxelGrid;
    use crate::mesh::cube;
    use nalgebra::Point3;

    #[test]
    fn test_segment_representations() {
        let g = Geometry::axis_aligned([2, 2, 2], Point3::origin(), [1.0; 3]).unwrap();
        let mut seg = Segment::new("s1", "liver")
            .with_representation(cube(1.0, Point3::origin()))
            .with_representation(VoxelGrid::from_elem(g.clone(), 1i32));
        assert!(seg.has_representation(RepresentationKind::ClosedSurface));
        assert!(seg.binary_labelmap().is_some());
        assert!(seg.closed_surface().is_some());

        let old = seg.set_representation(VoxelGrid::from_elem(g, 0i32));
        assert!(old.is_some());
        seg.remove_representation(RepresentationKind::ClosedSurface);
        assert!(seg.closed_surface().is_none());
        assert_eq!(seg.name(), "liver");
    }

    #[test]
    fn test_segmentation_lookup() {
        let mut s = Segmentation::new()
            .with_segment(Segment::new("a", "A"))
            .with_segment(Segment::new("b", "B").with_representation(cube(1.0, Point3::origin())));
        assert_eq!(s.len(), 2);
        assert!(s.contains_representation(RepresentationKind::ClosedSurface));
        assert!(!s.contains_representation(RepresentationKind::BinaryLabelmap));
        assert!(s.segment("c").is_none());

        let replaced = s.add_segment(Segment::new("a", "A2"));
        assert_eq!(replaced.unwrap().name(), "A");
        assert_eq!(s.segment_ids().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(s.segment("a").unwrap().name(), "A2");
        assert!(s.parent_transform().is_none());
    }

    #[test]
    fn test_volume_image_data() {
        let v = ScalarVolume::new("ct");
        assert!(!v.has_image_data());
        let empty = Geometry::from_parts(
            [0, -1, 0, 0, 0, 0],
            Point3::origin(),
            [1.0; 3],
            nalgebra::Matrix3::identity(),
        )
        .unwrap();
        let v = v.with_image(VoxelGrid::from_elem(empty, 0.0f32));
        assert!(!v.has_image_data());
    }
}
