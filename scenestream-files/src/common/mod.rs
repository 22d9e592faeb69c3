pub mod reader;
pub mod types;
pub mod version;

#[cfg(test)]
mod tests;
