pub mod affine;
pub mod image;
pub mod nifti_io;

pub use affine::Affine4;
pub use image::{Volume3, Volume4};
