pub mod endian;
pub mod file;
pub mod stats;

#[cfg(feature = "cli")]
pub mod cli;
