use ndarray::{s, Array2, Array3};

use crate::prelude::{PipelineStage, RegionConfig, StageError, StageResult};
use crate::volume::image::Volume4;

#[derive(Debug, Clone, Copy)]
pub struct ExtractInput<'a> {
    pub bold: &'a Volume4,
    pub mask: &'a Array3<u8>,
}

/// Per-voxel time series under a mask, one row per voxel.
#[derive(Debug, Clone)]
pub struct TimeSeriesMatrix {
    pub data: Array2<f64>,
}

impl TimeSeriesMatrix {
    pub fn voxels(&self) -> usize {
        self.data.nrows()
    }

    pub fn timepoints(&self) -> usize {
        self.data.ncols()
    }
}

/// Stage that gathers the BOLD series of every voxel inside a mask.
/// Rows follow the mask's row-major scan order.
pub struct ExtractStage {
    initialized: bool,
}

impl ExtractStage {
    pub fn new() -> Self {
        Self { initialized: false }
    }
}

impl Default for ExtractStage {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> PipelineStage<'a> for ExtractStage {
    type Input = ExtractInput<'a>;
    type Output = TimeSeriesMatrix;

    fn initialize(&mut self, _config: &RegionConfig) -> StageResult<()> {
        self.initialized = true;
        Ok(())
    }

    fn execute(&mut self, input: ExtractInput<'a>) -> StageResult<TimeSeriesMatrix> {
        if !self.initialized {
            return Err(StageError::Internal("extract stage not initialized".into()));
        }
        if input.bold.spatial_shape() != input.mask.dim() {
            return Err(StageError::InvalidInput(format!(
                "mask grid {:?} does not match functional grid {:?}",
                input.mask.dim(),
                input.bold.spatial_shape()
            )));
        }

        let timepoints = input.bold.timepoints();
        let mut rows = Vec::new();
        for ((x, y, z), &flag) in input.mask.indexed_iter() {
            if flag == 0 {
                continue;
            }
            rows.extend(
                input
                    .bold
                    .data
                    .slice(s![x, y, z, ..])
                    .iter()
                    .map(|&v| f64::from(v)),
            );
        }

        let voxels = rows.len() / timepoints.max(1);
        let data = Array2::from_shape_vec((voxels, timepoints), rows)
            .map_err(|e| StageError::Internal(format!("assembling series matrix: {}", e)))?;
        Ok(TimeSeriesMatrix { data })
    }

    fn cleanup(&mut self) {
        self.initialized = false;
    }
}
