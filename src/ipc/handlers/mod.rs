pub mod core;
pub mod dashboard;
pub mod sessions;
pub mod workbook;
