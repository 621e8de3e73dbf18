use ndarray::{Array2, ArrayView2};

use crate::prelude::{StageError, StageResult};

/// 4x4 voxel-to-world transform in homogeneous coordinates.
///
/// The last row is assumed to be `[0, 0, 0, 1]`, which holds for every
/// affine produced by the supported image formats.
#[derive(Debug, Clone, PartialEq)]
pub struct Affine4 {
    matrix: Array2<f64>,
}

impl Affine4 {
    pub fn new(matrix: Array2<f64>) -> StageResult<Self> {
        if matrix.shape() != [4, 4] {
            return Err(StageError::InvalidInput(format!(
                "affine must be 4x4, got {:?}",
                matrix.shape()
            )));
        }
        Ok(Self { matrix })
    }

    pub fn identity() -> Self {
        Self {
            matrix: Array2::eye(4),
        }
    }

    /// Diagonal affine from voxel sizes in millimetres.
    pub fn from_zooms(dx: f64, dy: f64, dz: f64) -> Self {
        let mut matrix = Array2::eye(4);
        matrix[[0, 0]] = dx;
        matrix[[1, 1]] = dy;
        matrix[[2, 2]] = dz;
        Self { matrix }
    }

    /// Builds the transform from the three sform rows of a NIfTI header.
    pub fn from_srows(x: [f32; 4], y: [f32; 4], z: [f32; 4]) -> Self {
        let mut matrix = Array2::eye(4);
        for (row, values) in [x, y, z].iter().enumerate() {
            for (col, &value) in values.iter().enumerate() {
                matrix[[row, col]] = f64::from(value);
            }
        }
        Self { matrix }
    }

    pub fn matrix(&self) -> ArrayView2<'_, f64> {
        self.matrix.view()
    }

    /// Maps a voxel index to world coordinates in millimetres.
    pub fn voxel_to_world(&self, voxel: [f64; 3]) -> [f64; 3] {
        let m = &self.matrix;
        let mut world = [0.0; 3];
        for (row, out) in world.iter_mut().enumerate() {
            *out = m[[row, 0]] * voxel[0]
                + m[[row, 1]] * voxel[1]
                + m[[row, 2]] * voxel[2]
                + m[[row, 3]];
        }
        world
    }

    /// `self * other`, applying `other` first.
    pub fn compose(&self, other: &Affine4) -> Affine4 {
        Affine4 {
            matrix: self.matrix.dot(&other.matrix),
        }
    }

    /// Inverts the transform via the 3x3 rotation/scale block.
    pub fn inverse(&self) -> StageResult<Affine4> {
        let m = &self.matrix;
        let a = [
            [m[[0, 0]], m[[0, 1]], m[[0, 2]]],
            [m[[1, 0]], m[[1, 1]], m[[1, 2]]],
            [m[[2, 0]], m[[2, 1]], m[[2, 2]]],
        ];
        let det = a[0][0] * (a[1][1] * a[2][2] - a[1][2] * a[2][1])
            - a[0][1] * (a[1][0] * a[2][2] - a[1][2] * a[2][0])
            + a[0][2] * (a[1][0] * a[2][1] - a[1][1] * a[2][0]);
        if det.abs() < 1e-12 {
            return Err(StageError::InvalidInput(
                "affine is singular and cannot be inverted".into(),
            ));
        }

        let inv_det = 1.0 / det;
        let mut inv = Array2::eye(4);
        inv[[0, 0]] = (a[1][1] * a[2][2] - a[1][2] * a[2][1]) * inv_det;
        inv[[0, 1]] = (a[0][2] * a[2][1] - a[0][1] * a[2][2]) * inv_det;
        inv[[0, 2]] = (a[0][1] * a[1][2] - a[0][2] * a[1][1]) * inv_det;
        inv[[1, 0]] = (a[1][2] * a[2][0] - a[1][0] * a[2][2]) * inv_det;
        inv[[1, 1]] = (a[0][0] * a[2][2] - a[0][2] * a[2][0]) * inv_det;
        inv[[1, 2]] = (a[0][2] * a[1][0] - a[0][0] * a[1][2]) * inv_det;
        inv[[2, 0]] = (a[1][0] * a[2][1] - a[1][1] * a[2][0]) * inv_det;
        inv[[2, 1]] = (a[0][1] * a[2][0] - a[0][0] * a[2][1]) * inv_det;
        inv[[2, 2]] = (a[0][0] * a[1][1] - a[0][1] * a[1][0]) * inv_det;

        // -R^-1 * t
        let t = [m[[0, 3]], m[[1, 3]], m[[2, 3]]];
        for row in 0..3 {
            inv[[row, 3]] =
                -(inv[[row, 0]] * t[0] + inv[[row, 1]] * t[1] + inv[[row, 2]] * t[2]);
        }

        Ok(Affine4 { matrix: inv })
    }

    pub fn approx_eq(&self, other: &Affine4, tolerance: f64) -> bool {
        self.matrix
            .iter()
            .zip(other.matrix.iter())
            .all(|(a, b)| (a - b).abs() <= tolerance)
    }
}
