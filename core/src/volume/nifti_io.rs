use std::path::Path;

use log::debug;
use ndarray::{Ix3, Ix4};
use nifti::writer::WriterOptions;
use nifti::{IntoNdArray, NiftiHeader, NiftiObject, ReaderOptions};

use crate::prelude::{StageError, StageResult};
use crate::volume::affine::Affine4;
use crate::volume::image::{Volume3, Volume4};

fn io_error(path: &Path, err: impl std::fmt::Display) -> StageError {
    StageError::VolumeIo(format!("{}: {}", path.display(), err))
}

/// Voxel-to-world transform from a header, preferring the sform rows.
fn affine_from_header(header: &NiftiHeader) -> Affine4 {
    if header.sform_code > 0 {
        Affine4::from_srows(header.srow_x, header.srow_y, header.srow_z)
    } else {
        Affine4::from_zooms(
            f64::from(header.pixdim[1]),
            f64::from(header.pixdim[2]),
            f64::from(header.pixdim[3]),
        )
    }
}

/// Loads a labeled segmentation volume.
pub fn load_segmentation(path: &Path) -> StageResult<Volume3> {
    let object = ReaderOptions::new()
        .read_file(path)
        .map_err(|e| io_error(path, e))?;
    let affine = affine_from_header(object.header());

    let data = object
        .into_volume()
        .into_ndarray::<f32>()
        .map_err(|e| io_error(path, e))?;
    let data = data
        .into_dimensionality::<Ix3>()
        .map_err(|_| io_error(path, "expected a 3D segmentation image"))?;

    debug!("loaded segmentation {} {:?}", path.display(), data.dim());
    Ok(Volume3 { data, affine })
}

/// Loads a 4D BOLD series. The repetition time is taken from `pixdim[4]`.
pub fn load_bold(path: &Path) -> StageResult<Volume4> {
    let object = ReaderOptions::new()
        .read_file(path)
        .map_err(|e| io_error(path, e))?;
    let header = object.header();
    let affine = affine_from_header(header);
    let tr = f64::from(header.pixdim[4]);

    let data = object
        .into_volume()
        .into_ndarray::<f32>()
        .map_err(|e| io_error(path, e))?;
    let data = data
        .into_dimensionality::<Ix4>()
        .map_err(|_| io_error(path, "expected a 4D BOLD image"))?;

    debug!(
        "loaded BOLD series {} {:?}, TR {} s",
        path.display(),
        data.dim(),
        tr
    );
    Volume4::new(data, affine, tr)
        .map_err(|e| io_error(path, format!("bad repetition time in header ({})", e)))
}

fn header_for(affine: &Affine4, tr: f64) -> NiftiHeader {
    let m = affine.matrix();
    let row = |r: usize| {
        [
            m[[r, 0]] as f32,
            m[[r, 1]] as f32,
            m[[r, 2]] as f32,
            m[[r, 3]] as f32,
        ]
    };
    let zoom = |c: usize| {
        ((m[[0, c]].powi(2) + m[[1, c]].powi(2) + m[[2, c]].powi(2)).sqrt()) as f32
    };

    let mut pixdim = [0.0f32; 8];
    pixdim[0] = 1.0;
    pixdim[1] = zoom(0);
    pixdim[2] = zoom(1);
    pixdim[3] = zoom(2);
    pixdim[4] = tr as f32;

    NiftiHeader {
        pixdim,
        srow_x: row(0),
        srow_y: row(1),
        srow_z: row(2),
        sform_code: 1,
        ..NiftiHeader::default()
    }
}

/// Writes a segmentation volume, used by the synthetic-data tooling.
pub fn write_segmentation(path: &Path, volume: &Volume3) -> StageResult<()> {
    let header = header_for(&volume.affine, 0.0);
    WriterOptions::new(path)
        .reference_header(&header)
        .write_nifti(&volume.data)
        .map_err(|e| io_error(path, e))
}

/// Writes a BOLD series, used by the synthetic-data tooling.
pub fn write_bold(path: &Path, volume: &Volume4) -> StageResult<()> {
    let header = header_for(&volume.affine, volume.tr);
    WriterOptions::new(path)
        .reference_header(&header)
        .write_nifti(&volume.data)
        .map_err(|e| io_error(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_affine_prefers_sform_rows() {
        let header = NiftiHeader {
            sform_code: 1,
            srow_x: [3.0, 0.0, 0.0, -10.0],
            srow_y: [0.0, 3.0, 0.0, 0.0],
            srow_z: [0.0, 0.0, 3.0, 5.0],
            ..NiftiHeader::default()
        };
        let affine = affine_from_header(&header);
        assert_eq!(affine.voxel_to_world([1.0, 0.0, 0.0]), [-7.0, 0.0, 5.0]);
    }

    #[test]
    fn header_affine_falls_back_to_pixdim() {
        let mut pixdim = [0.0f32; 8];
        pixdim[1] = 2.0;
        pixdim[2] = 2.0;
        pixdim[3] = 2.0;
        let header = NiftiHeader {
            sform_code: 0,
            pixdim,
            ..NiftiHeader::default()
        };
        let affine = affine_from_header(&header);
        assert_eq!(affine.voxel_to_world([1.0, 1.0, 1.0]), [2.0, 2.0, 2.0]);
    }

    #[test]
    fn synthetic_header_carries_zooms_and_tr() {
        let header = header_for(&Affine4::from_zooms(3.0, 3.0, 3.0), 2.0);
        assert_eq!(header.pixdim[1], 3.0);
        assert_eq!(header.pixdim[4], 2.0);
        assert_eq!(header.sform_code, 1);
    }
}
