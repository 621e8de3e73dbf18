pub mod figures;
pub mod tables;
