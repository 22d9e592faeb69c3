pub mod common;
pub mod gpu;
pub mod importer;
pub mod loader;
pub mod material;
