use std::io::{Read, Seek};

pub mod bytereader;

#[cfg(feature = "remote")]
pub mod remote_file;

/// A helper trait that for things that implement `Read` and `Seek`
pub trait SeekableRead: Seek + Read {}
impl<T> SeekableRead for T where T: Seek + Read {}
