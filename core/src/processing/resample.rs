use log::debug;
use ndarray::Array3;

use crate::prelude::{PipelineStage, RegionConfig, StageError, StageResult};
use crate::volume::affine::Affine4;
use crate::volume::image::grids_match;

/// A mask on its source grid plus the functional grid to land on.
#[derive(Debug, Clone, Copy)]
pub struct ResampleInput<'a> {
    pub mask: &'a Array3<u8>,
    pub mask_affine: &'a Affine4,
    pub target_shape: (usize, usize, usize),
    pub target_affine: &'a Affine4,
}

#[derive(Debug, Clone)]
pub struct ResampleOutput {
    pub mask: Array3<u8>,
    pub voxels: usize,
}

/// Nearest-neighbour resampling of a binary mask onto the functional
/// voxel grid, driven by the two images' affines. Segmentations already
/// delivered on the functional grid pass through unchanged.
pub struct ResampleStage {
    initialized: bool,
}

impl ResampleStage {
    pub fn new() -> Self {
        Self { initialized: false }
    }
}

impl Default for ResampleStage {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> PipelineStage<'a> for ResampleStage {
    type Input = ResampleInput<'a>;
    type Output = ResampleOutput;

    fn initialize(&mut self, _config: &RegionConfig) -> StageResult<()> {
        self.initialized = true;
        Ok(())
    }

    fn execute(&mut self, input: ResampleInput<'a>) -> StageResult<ResampleOutput> {
        if !self.initialized {
            return Err(StageError::Internal("resample stage not initialized".into()));
        }

        if grids_match(
            input.mask.dim(),
            input.mask_affine,
            input.target_shape,
            input.target_affine,
        ) {
            let mask = input.mask.clone();
            let voxels = super::mask::count_voxels(&mask);
            return Ok(ResampleOutput { mask, voxels });
        }

        // Maps target voxel indices through world space into source indices.
        let to_source = input
            .mask_affine
            .inverse()?
            .compose(input.target_affine);

        let (nx, ny, nz) = input.target_shape;
        let (sx, sy, sz) = input.mask.dim();
        let mut resampled = Array3::zeros((nx, ny, nz));
        let mut voxels = 0usize;
        for x in 0..nx {
            for y in 0..ny {
                for z in 0..nz {
                    let source =
                        to_source.voxel_to_world([x as f64, y as f64, z as f64]);
                    let i = source[0].round();
                    let j = source[1].round();
                    let k = source[2].round();
                    if i < 0.0 || j < 0.0 || k < 0.0 {
                        continue;
                    }
                    let (i, j, k) = (i as usize, j as usize, k as usize);
                    if i >= sx || j >= sy || k >= sz {
                        continue;
                    }
                    if input.mask[[i, j, k]] != 0 {
                        resampled[[x, y, z]] = 1;
                        voxels += 1;
                    }
                }
            }
        }

        debug!(
            "resampled mask {:?} -> {:?}, {} voxels survive",
            input.mask.dim(),
            input.target_shape,
            voxels
        );
        Ok(ResampleOutput {
            mask: resampled,
            voxels,
        })
    }

    fn cleanup(&mut self) {
        self.initialized = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prelude::RegionConfig;

    #[test]
    fn matching_grids_pass_through() {
        let mut mask = Array3::zeros((4, 4, 4));
        mask[[1, 2, 3]] = 1;
        let affine = Affine4::from_zooms(3.0, 3.0, 3.0);

        let mut stage = ResampleStage::new();
        stage.initialize(&RegionConfig::default()).unwrap();
        let output = stage
            .execute(ResampleInput {
                mask: &mask,
                mask_affine: &affine,
                target_shape: (4, 4, 4),
                target_affine: &affine,
            })
            .unwrap();
        assert_eq!(output.voxels, 1);
        assert_eq!(output.mask[[1, 2, 3]], 1);
    }

    #[test]
    fn downsamples_by_factor_three() {
        // 1 mm source grid, 3 mm target grid: target voxel (x,y,z) reads
        // source voxel (3x,3y,3z).
        let mut mask = Array3::zeros((12, 12, 12));
        for x in 2..8 {
            for y in 2..8 {
                for z in 2..8 {
                    mask[[x, y, z]] = 1;
                }
            }
        }
        let source_affine = Affine4::from_zooms(1.0, 1.0, 1.0);
        let target_affine = Affine4::from_zooms(3.0, 3.0, 3.0);

        let mut stage = ResampleStage::new();
        stage.initialize(&RegionConfig::default()).unwrap();
        let output = stage
            .execute(ResampleInput {
                mask: &mask,
                mask_affine: &source_affine,
                target_shape: (4, 4, 4),
                target_affine: &target_affine,
            })
            .unwrap();

        // Source block spans indices 2..8, so target indices 1 and 2 map
        // inside it (3 and 6), while 0 and 3 map outside (0 and 9).
        assert_eq!(output.voxels, 8);
        assert_eq!(output.mask[[1, 1, 1]], 1);
        assert_eq!(output.mask[[2, 2, 2]], 1);
        assert_eq!(output.mask[[0, 0, 0]], 0);
        assert_eq!(output.mask[[3, 3, 3]], 0);
    }

    #[test]
    fn out_of_bounds_targets_stay_empty() {
        let mut mask = Array3::zeros((2, 2, 2));
        mask[[0, 0, 0]] = 1;
        let source_affine = Affine4::from_zooms(1.0, 1.0, 1.0);
        let target_affine = Affine4::from_zooms(5.0, 5.0, 5.0);

        let mut stage = ResampleStage::new();
        stage.initialize(&RegionConfig::default()).unwrap();
        let output = stage
            .execute(ResampleInput {
                mask: &mask,
                mask_affine: &source_affine,
                target_shape: (3, 3, 3),
                target_affine: &target_affine,
            })
            .unwrap();
        assert_eq!(output.voxels, 1);
        assert_eq!(output.mask[[0, 0, 0]], 1);
    }
}
