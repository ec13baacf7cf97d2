//! nifti 文件读取.
//!
//! 体素数据按照 `(z, y, x)` 存储, 几何描述优先取 sform, 其次 qform,
//! 都没有时仅使用 `pixdim` 缩放.

use std::path::Path;

use log::{debug, warn};
use nalgebra::Matrix4;
use ndarray::{Array3, ArrayD, Axis, Ix3};
use nifti::{IntoNdArray, NiftiHeader, NiftiObject, ReaderOptions};

use crate::error::{StatsError, StatsResult};
use crate::geometry::Geometry;
use crate::grid::{BinaryLabelmap, VoxelGrid};
use crate::segmentation::ScalarVolume;

/// 取 `pixdim[1..=3]`. 非有限正数的分量按 1 处理.
fn pixdim(header: &NiftiHeader) -> [f64; 3] {
    [1, 2, 3].map(|i| {
        let v = header.pixdim[i] as f64;
        if v.is_finite() && v > 0.0 {
            v
        } else {
            warn!("pixdim[{i}] = {v} 非法, 按 1.0 处理");
            1.0
        }
    })
}

/// 由 qform 四元数参数构建 image-to-world 矩阵.
fn qform_matrix(header: &NiftiHeader) -> Matrix4<f64> {
    let b = header.quatern_b as f64;
    let c = header.quatern_c as f64;
    let d = header.quatern_d as f64;
    let a = (1.0 - (b * b + c * c + d * d)).max(0.0).sqrt();
    let qfac = if header.pixdim[0] < 0.0 { -1.0 } else { 1.0 };
    let [dx, dy, dz] = pixdim(header);
    let dz = dz * qfac;

    #[rustfmt::skip]
    let m = Matrix4::new(
        (a * a + b * b - c * c - d * d) * dx, 2.0 * (b * c - a * d) * dy, 2.0 * (b * d + a * c) * dz, header.quatern_x as f64,
        2.0 * (b * c + a * d) * dx, (a * a + c * c - b * b - d * d) * dy, 2.0 * (c * d - a * b) * dz, header.quatern_y as f64,
        2.0 * (b * d - a * c) * dx, 2.0 * (c * d + a * b) * dy, (a * a + d * d - b * b - c * c) * dz, header.quatern_z as f64,
        0.0, 0.0, 0.0, 1.0,
    );
    m
}

/// 由 nifti header 构建网格几何描述. 索引范围从 0 开始.
pub fn geometry_from_header(header: &NiftiHeader) -> StatsResult<Geometry> {
    let image_to_world = if header.sform_code > 0 {
        let [x, y, z] = [header.srow_x, header.srow_y, header.srow_z].map(|r| r.map(|v| v as f64));
        #[rustfmt::skip]
        let m = Matrix4::new(
            x[0], x[1], x[2], x[3],
            y[0], y[1], y[2], y[3],
            z[0], z[1], z[2], z[3],
            0.0, 0.0, 0.0, 1.0,
        );
        m
    } else if header.qform_code > 0 {
        qform_matrix(header)
    } else {
        debug!("nifti header 中没有 sform/qform, 只使用 pixdim");
        let [dx, dy, dz] = pixdim(header);
        Matrix4::new_nonuniform_scaling(&nalgebra::Vector3::new(dx, dy, dz))
    };

    let [_, w, h, z, ..] = header.dim;
    let len = |n: u16| n.max(1) as i32 - 1;
    Geometry::from_image_to_world([0, len(w), 0, len(h), 0, len(z)], image_to_world)
}

/// 将 `[W, H, z, 1, ...]` 形状的数据转换为 `(z, H, W)` 标准布局的三维数组.
fn into_volume3<T: Clone>(data: ArrayD<T>) -> StatsResult<Array3<T>> {
    let shape = data.shape().to_vec();
    if shape.len() < 3 {
        return Err(StatsError::InvalidVolume(format!("维度 {shape:?} 少于三维")));
    }
    if shape[3..].iter().any(|&n| n > 1) {
        return Err(StatsError::InvalidVolume(format!("维度 {shape:?} 不是单帧三维体数据")));
    }
    let mut data = data;
    while data.ndim() > 3 {
        let axis = Axis(data.ndim() - 1);
        data = data.index_axis_move(axis, 0);
    }
    let data = data
        .into_dimensionality::<Ix3>()
        .map_err(|e| StatsError::InvalidVolume(e.to_string()))?;

    // [W, H, z] -> [z, H, W].
    let data = data.permuted_axes([2, 1, 0]);
    let data = if data.is_standard_layout() {
        data
    } else {
        data.as_standard_layout().into_owned()
    };
    Ok(data)
}

fn into_grid<T: Clone>(path: &Path, geometry: Geometry, data: ArrayD<T>) -> StatsResult<VoxelGrid<T>> {
    let data = into_volume3(data)?;
    debug!("读取 {path:?}: {:?}", data.dim());
    VoxelGrid::new(geometry, data)
}

/// 读取标量体数据. 体数据名称取文件名 (去除 `.nii` / `.nii.gz` 后缀).
pub fn read_scalar_volume<P: AsRef<Path>>(path: P) -> StatsResult<ScalarVolume> {
    let path = path.as_ref();
    let obj = ReaderOptions::new().read_file(path)?;
    let geometry = geometry_from_header(obj.header())?;
    let image = into_grid(path, geometry, obj.into_volume().into_ndarray::<f32>()?)?;
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.trim_end_matches(".gz").trim_end_matches(".nii"))
        .unwrap_or_default();
    Ok(ScalarVolume::new(name).with_image(image))
}

/// 读取二值标签图. 体素值转换为整数标签.
pub fn read_binary_labelmap<P: AsRef<Path>>(path: P) -> StatsResult<BinaryLabelmap> {
    let path = path.as_ref();
    let obj = ReaderOptions::new().read_file(path)?;
    let geometry = geometry_from_header(obj.header())?;
    into_grid(path, geometry, obj.into_volume().into_ndarray::<i32>()?)
}

#[cfg(test)]
mod tests {
    use super::{geometry_from_header, into_volume3, read_binary_labelmap, read_scalar_volume};
    use crate::error::StatsError;
    use ndarray::{Array3, ArrayD, IxDyn};
    use nifti::writer::WriterOptions;
    use nifti::NiftiHeader;

    #[test]
    fn test_geometry_from_sform() {
        let header = NiftiHeader {
            dim: [3, 4, 5, 6, 1, 1, 1, 1],
            sform_code: 1,
            srow_x: [-0.5, 0.0, 0.0, 10.0],
            srow_y: [0.0, 0.5, 0.0, 20.0],
            srow_z: [0.0, 0.0, 2.0, 30.0],
            ..Default::default()
        };
        let g = geometry_from_header(&header).unwrap();
        assert_eq!(g.extent(), [0, 3, 0, 4, 0, 5]);
        assert_eq!(g.shape(), (6, 5, 4));
        assert_eq!(g.spacing(), [0.5, 0.5, 2.0]);
        let p = g.index_to_world([1.0, 1.0, 1.0]);
        assert_eq!([p.x, p.y, p.z], [9.5, 20.5, 32.0]);
    }

    #[test]
    fn test_geometry_from_qform() {
        // 绕 z 轴旋转 180 度: b = c = 0, d = 1.
        let header = NiftiHeader {
            dim: [3, 2, 2, 2, 1, 1, 1, 1],
            pixdim: [1.0, 2.0, 3.0, 4.0, 1.0, 1.0, 1.0, 1.0],
            sform_code: 0,
            qform_code: 1,
            quatern_b: 0.0,
            quatern_c: 0.0,
            quatern_d: 1.0,
            quatern_x: 1.0,
            quatern_y: 2.0,
            quatern_z: 3.0,
            ..Default::default()
        };
        let g = geometry_from_header(&header).unwrap();
        assert_eq!(g.spacing(), [2.0, 3.0, 4.0]);
        let p = g.index_to_world([1.0, 1.0, 1.0]);
        assert!((p.x - -1.0).abs() < 1e-9);
        assert!((p.y - -1.0).abs() < 1e-9);
        assert!((p.z - 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_geometry_pixdim_only() {
        let header = NiftiHeader {
            dim: [3, 2, 3, 4, 1, 1, 1, 1],
            pixdim: [0.0, 0.5, 0.0, 5.0, 0.0, 0.0, 0.0, 0.0],
            sform_code: 0,
            qform_code: 0,
            ..Default::default()
        };
        let g = geometry_from_header(&header).unwrap();
        assert_eq!(g.spacing(), [0.5, 1.0, 5.0]);
        assert_eq!(g.origin(), nalgebra::Point3::origin());
    }

    #[test]
    fn test_into_volume3() {
        // [W, H, z, t] = [2, 3, 4, 1].
        let data = ArrayD::from_shape_fn(IxDyn(&[2, 3, 4, 1]), |ix| (ix[0] + 10 * ix[1] + 100 * ix[2]) as i32);
        let vol = into_volume3(data).unwrap();
        assert_eq!(vol.dim(), (4, 3, 2));
        assert!(vol.is_standard_layout());
        assert_eq!(vol[(3, 2, 1)], 321);

        let err = into_volume3(ArrayD::<i32>::zeros(IxDyn(&[2, 3, 4, 2]))).unwrap_err();
        assert!(matches!(err, StatsError::InvalidVolume(_)));
        let err = into_volume3(ArrayD::<i32>::zeros(IxDyn(&[2, 3]))).unwrap_err();
        assert!(matches!(err, StatsError::InvalidVolume(_)));
    }

    #[test]
    fn test_read_written_file() {
        let dir = tempfile::tempdir().unwrap();

        // [W, H, z].
        let scan = Array3::from_shape_fn((3, 4, 5), |(x, y, z)| (x + 10 * y + 100 * z) as f32);
        let path = dir.path().join("scan.nii");
        WriterOptions::new(&path).write_nifti(&scan).unwrap();
        let volume = read_scalar_volume(&path).unwrap();
        assert_eq!(volume.name(), "scan");
        let image = volume.image().unwrap();
        assert_eq!(image.shape(), (5, 4, 3));
        assert_eq!(image.data()[(4, 3, 2)], 432.0);
        assert_eq!(image.data()[(1, 0, 2)], 102.0);

        let label = Array3::from_shape_fn((3, 4, 5), |(x, _, _)| (x == 1) as u8);
        let path = dir.path().join("label.nii.gz");
        WriterOptions::new(&path).write_nifti(&label).unwrap();
        let labelmap = read_binary_labelmap(&path).unwrap();
        assert_eq!(labelmap.shape(), (5, 4, 3));
        assert_eq!(labelmap.data().iter().filter(|&&v| v == 1).count(), 20);
        assert_eq!(labelmap.data()[(0, 0, 1)], 1);
    }

    #[test]
    fn test_read_missing_file() {
        let err = read_scalar_volume("/nonexistent/seg-berry/none.nii").unwrap_err();
        assert!(matches!(err, StatsError::Nifti(_)));
    }
}
