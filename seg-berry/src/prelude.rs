//! 🍇欢迎光临🍓
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::Idx3d;

pub use crate::geometry::{CoordinateTransform, Geometry, TransformNode};
pub use crate::grid::{BinaryLabelmap, ScalarImage, VoxelGrid};
pub use crate::mesh::ClosedSurface;
pub use crate::segmentation::{RepresentationKind, ScalarVolume, Segment, Segmentation};

pub use crate::calculator::{
    Calculator, CalculatorRegistry, ClosedSurfaceCalculator, LabelmapCalculator,
    ScalarVolumeCalculator, SegmentStatisticsCalculator, StatsInput,
};
pub use crate::measurement::{CodedEntry, MeasurementInfo, MeasurementKey, Statistics};
pub use crate::report::StatisticsTable;

pub use crate::consts::CC_PER_CUBIC_MM;
pub use crate::error::{StatsError, StatsResult};
pub use crate::io::{read_binary_labelmap, read_scalar_volume};
