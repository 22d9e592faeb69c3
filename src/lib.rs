pub mod assets;
pub mod io;
pub mod rendering;
pub mod scene;
pub mod settings;
