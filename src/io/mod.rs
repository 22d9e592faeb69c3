pub mod bundle;
pub mod coalescer;
pub mod common;
pub mod fs;
