use ndarray::{Array3, Array4};

use crate::prelude::{StageError, StageResult};
use crate::volume::affine::Affine4;

/// Tolerance when deciding that two images share a voxel grid.
pub const GRID_TOLERANCE_MM: f64 = 1e-3;

/// A 3D volume such as a labeled segmentation.
#[derive(Debug, Clone)]
pub struct Volume3 {
    pub data: Array3<f32>,
    pub affine: Affine4,
}

impl Volume3 {
    pub fn shape(&self) -> (usize, usize, usize) {
        self.data.dim()
    }
}

/// A 4D functional series with its repetition time in seconds.
#[derive(Debug, Clone)]
pub struct Volume4 {
    pub data: Array4<f32>,
    pub affine: Affine4,
    pub tr: f64,
}

impl Volume4 {
    pub fn new(data: Array4<f32>, affine: Affine4, tr: f64) -> StageResult<Self> {
        if tr <= 0.0 {
            return Err(StageError::InvalidInput(format!(
                "repetition time must be positive, got {}",
                tr
            )));
        }
        Ok(Self { data, affine, tr })
    }

    pub fn spatial_shape(&self) -> (usize, usize, usize) {
        let (x, y, z, _) = self.data.dim();
        (x, y, z)
    }

    pub fn timepoints(&self) -> usize {
        self.data.dim().3
    }

    pub fn sampling_rate(&self) -> f64 {
        1.0 / self.tr
    }
}

/// True when two images can be overlaid voxel-for-voxel.
pub fn grids_match(
    shape_a: (usize, usize, usize),
    affine_a: &Affine4,
    shape_b: (usize, usize, usize),
    affine_b: &Affine4,
) -> bool {
    shape_a == shape_b && affine_a.approx_eq(affine_b, GRID_TOLERANCE_MM)
}
