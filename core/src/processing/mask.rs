use log::debug;
use ndarray::Array3;

use crate::prelude::{PipelineStage, RegionConfig, StageError, StageResult};
use crate::volume::image::Volume3;

/// Input for one region: the subject's segmentation and a label value.
#[derive(Debug, Clone, Copy)]
pub struct MaskInput<'a> {
    pub segmentation: &'a Volume3,
    pub label_value: i32,
}

/// Binary region mask on the segmentation grid, before and after erosion.
#[derive(Debug, Clone)]
pub struct MaskOutput {
    pub mask: Array3<u8>,
    pub voxels_before_erosion: usize,
    pub voxels_after_erosion: usize,
}

/// Stage that binarizes a segmentation at a label value and erodes the
/// result to shed boundary voxels prone to partial-volume effects.
pub struct MaskStage {
    config: Option<RegionConfig>,
}

impl MaskStage {
    pub fn new() -> Self {
        Self { config: None }
    }
}

impl Default for MaskStage {
    fn default() -> Self {
        Self::new()
    }
}

/// One erosion pass with the face-connected (6-neighbour) element.
/// Voxels outside the image count as background, so borders erode.
fn erode_once(mask: &Array3<u8>) -> Array3<u8> {
    let (nx, ny, nz) = mask.dim();
    let mut eroded = Array3::zeros(mask.raw_dim());
    for x in 0..nx {
        for y in 0..ny {
            for z in 0..nz {
                if mask[[x, y, z]] == 0 {
                    continue;
                }
                let interior = x > 0
                    && x + 1 < nx
                    && y > 0
                    && y + 1 < ny
                    && z > 0
                    && z + 1 < nz;
                if interior
                    && mask[[x - 1, y, z]] != 0
                    && mask[[x + 1, y, z]] != 0
                    && mask[[x, y - 1, z]] != 0
                    && mask[[x, y + 1, z]] != 0
                    && mask[[x, y, z - 1]] != 0
                    && mask[[x, y, z + 1]] != 0
                {
                    eroded[[x, y, z]] = 1;
                }
            }
        }
    }
    eroded
}

pub(crate) fn count_voxels(mask: &Array3<u8>) -> usize {
    mask.iter().filter(|&&v| v != 0).count()
}

impl<'a> PipelineStage<'a> for MaskStage {
    type Input = MaskInput<'a>;
    type Output = MaskOutput;

    fn initialize(&mut self, config: &RegionConfig) -> StageResult<()> {
        self.config = Some(config.clone());
        Ok(())
    }

    fn execute(&mut self, input: MaskInput<'a>) -> StageResult<MaskOutput> {
        let config = self
            .config
            .as_ref()
            .ok_or_else(|| StageError::Internal("mask stage not initialized".into()))?;

        let label = input.label_value;
        let mut mask = input
            .segmentation
            .data
            .mapv(|value| u8::from(value.round() as i32 == label));
        let voxels_before_erosion = count_voxels(&mask);

        if voxels_before_erosion > 0 {
            for _ in 0..config.erosion_iterations {
                mask = erode_once(&mask);
            }
        }
        let voxels_after_erosion = count_voxels(&mask);
        debug!(
            "label {}: {} voxels, {} after {} erosion pass(es)",
            label, voxels_before_erosion, voxels_after_erosion, config.erosion_iterations
        );

        Ok(MaskOutput {
            mask,
            voxels_before_erosion,
            voxels_after_erosion,
        })
    }

    fn cleanup(&mut self) {
        self.config = None;
    }
}
