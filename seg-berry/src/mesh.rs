//! 闭合三角网格 (closed surface) 及其质量属性.

use std::collections::HashMap;

use itertools::Itertools;
use nalgebra::Point3;

use crate::consts::CC_PER_CUBIC_MM;
use crate::error::{StatsError, StatsResult};

/// 闭合三角网格. 坐标单位为毫米.
///
/// 构造时只检查三角形索引是否越界. 网格是否闭合, 朝向是否一致由调用方保证,
/// 必要时可用 [`ClosedSurface::boundary_edge_count`] 检查.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClosedSurface {
    vertices: Vec<Point3<f64>>,
    triangles: Vec<[u32; 3]>,
}

/// 按需计算的质量属性. 未请求的量为 `None`.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct MassProperties {
    /// 表面积, 平方毫米.
    pub surface_mm2: Option<f64>,

    /// 体积, 立方毫米.
    pub volume_mm3: Option<f64>,
}

impl MassProperties {
    /// 体积, 立方厘米.
    #[inline]
    pub fn volume_cc(&self) -> Option<f64> {
        self.volume_mm3.map(|v| v * CC_PER_CUBIC_MM)
    }
}

impl ClosedSurface {
    /// 由顶点和三角形创建网格. 任一索引越界时返回 `Err`.
    pub fn new(vertices: Vec<Point3<f64>>, triangles: Vec<[u32; 3]>) -> StatsResult<Self> {
        let n = vertices.len();
        if let Some((t, idx)) = triangles
            .iter()
            .enumerate()
            .find_map(|(t, tri)| tri.iter().find(|i| **i as usize >= n).map(|i| (t, *i)))
        {
            return Err(StatsError::InvalidMesh(format!(
                "第 {t} 个三角形的顶点索引 {idx} 越界 (顶点数 {n})"
            )));
        }
        Ok(Self {
            vertices,
            triangles,
        })
    }

    /// 顶点.
    #[inline]
    pub fn vertices(&self) -> &[Point3<f64>] {
        &self.vertices
    }

    /// 三角形顶点索引.
    #[inline]
    pub fn triangles(&self) -> &[[u32; 3]] {
        &self.triangles
    }

    /// 是否没有任何三角形?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    #[inline]
    fn corners(&self, [a, b, c]: [u32; 3]) -> [&Point3<f64>; 3] {
        [
            &self.vertices[a as usize],
            &self.vertices[b as usize],
            &self.vertices[c as usize],
        ]
    }

    /// 表面积, 即每个三角形 `|(b - a) x (c - a)| / 2` 之和.
    pub fn surface_area(&self) -> f64 {
        self.triangles
            .iter()
            .map(|tri| {
                let [a, b, c] = self.corners(*tri);
                (b - a).cross(&(c - a)).norm() * 0.5
            })
            .sum()
    }

    /// 有向体积 `Σ a · (b x c) / 6`. 三角形朝外时为正.
    pub fn signed_volume(&self) -> f64 {
        self.triangles
            .iter()
            .map(|tri| {
                let [a, b, c] = self.corners(*tri);
                a.coords.dot(&b.coords.cross(&c.coords))
            })
            .sum::<f64>()
            / 6.0
    }

    /// 体积 (有向体积的绝对值), 与三角形朝向无关.
    #[inline]
    pub fn volume(&self) -> f64 {
        self.signed_volume().abs()
    }

    /// 只计算请求的质量属性.
    pub fn mass_properties(&self, need_area: bool, need_volume: bool) -> MassProperties {
        MassProperties {
            surface_mm2: need_area.then(|| self.surface_area()),
            volume_mm3: need_volume.then(|| self.volume()),
        }
    }

    /// 只被一个三角形使用的无向边个数. 闭合网格返回 0.
    pub fn boundary_edge_count(&self) -> usize {
        let mut uses: HashMap<(u32, u32), usize> = HashMap::with_capacity(self.triangles.len() * 3);
        for tri in self.triangles.iter() {
            for (a, b) in tri.iter().copied().circular_tuple_windows() {
                *uses.entry((a.min(b), a.max(b))).or_default() += 1;
            }
        }
        uses.values().filter(|n| **n == 1).count()
    }

    /// 网格是否闭合 (不存在边界边)?
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.boundary_edge_count() == 0
    }
}

/// 边长为 `side`, 最小角点为 `origin` 的立方体, 三角形朝外.
#[cfg(test)]
pub(crate) fn cube(side: f64, origin: Point3<f64>) -> ClosedSurface {
    let vertices = (0..8u32)
        .map(|bits| {
            let offset = nalgebra::Vector3::new(
                f64::from(bits & 1),
                f64::from((bits >> 1) & 1),
                f64::from((bits >> 2) & 1),
            );
            origin + offset * side
        })
        .collect();
    let triangles = vec![
        [0, 2, 1],
        [1, 2, 3],
        [4, 5, 6],
        [5, 7, 6],
        [0, 1, 4],
        [1, 5, 4],
        [2, 6, 3],
        [3, 6, 7],
        [0, 4, 2],
        [2, 4, 6],
        [1, 3, 5],
        [3, 7, 5],
    ];
    ClosedSurface::new(vertices, triangles).unwrap()
}

#[cfg(test)]
mod tests {
    use super::{cube, ClosedSurface};
    use crate::error::StatsError;
    use nalgebra::Point3;

    fn f64_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_cube_mass_properties() {
        let c = cube(10.0, Point3::new(-3.0, 7.0, 100.0));
        assert!(f64_eq(c.surface_area(), 600.0));
        assert!(f64_eq(c.signed_volume(), 1000.0));
        let props = c.mass_properties(true, true);
        assert!(f64_eq(props.surface_mm2.unwrap(), 600.0));
        assert!(f64_eq(props.volume_mm3.unwrap(), 1000.0));
        assert!(f64_eq(props.volume_cc().unwrap(), 1.0));
        assert!(c.is_closed());
    }

    #[test]
    fn test_partial_mass_properties() {
        let c = cube(2.0, Point3::origin());
        let props = c.mass_properties(false, true);
        assert!(props.surface_mm2.is_none());
        assert!(f64_eq(props.volume_mm3.unwrap(), 8.0));
        let props = c.mass_properties(true, false);
        assert!(props.volume_mm3.is_none());
        assert!(props.volume_cc().is_none());
        assert!(f64_eq(props.surface_mm2.unwrap(), 24.0));
    }

    #[test]
    fn test_inside_out_volume() {
        let c = cube(10.0, Point3::origin());
        let flipped = ClosedSurface::new(
            c.vertices().to_vec(),
            c.triangles().iter().map(|[a, b, c]| [*a, *c, *b]).collect(),
        )
        .unwrap();
        assert!(f64_eq(flipped.signed_volume(), -1000.0));
        assert!(f64_eq(flipped.volume(), 1000.0));
    }

    #[test]
    fn test_open_mesh() {
        let c = cube(1.0, Point3::origin());
        let open = ClosedSurface::new(c.vertices().to_vec(), c.triangles()[2..].to_vec()).unwrap();
        // 去掉底面两个三角形, 底面的四条边变为边界边.
        assert_eq!(open.boundary_edge_count(), 4);
        assert!(!open.is_closed());
        assert!(f64_eq(open.surface_area(), 5.0));
    }

    #[test]
    fn test_invalid_index() {
        let err = ClosedSurface::new(vec![Point3::origin(); 3], vec![[0, 1, 3]]).unwrap_err();
        assert!(matches!(err, StatsError::InvalidMesh(_)));
        let empty = ClosedSurface::new(vec![], vec![]).unwrap();
        assert!(empty.is_empty());
        assert_eq!(empty.volume(), 0.0);
    }
}
