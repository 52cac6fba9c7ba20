pub mod compression;
pub mod diff;
pub mod log;
