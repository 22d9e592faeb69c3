/// Serves the nodes of a single UnityFS archive as if they were loose files.
pub mod loader;
