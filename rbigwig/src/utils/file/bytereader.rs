use std::io::{self, Read, SeekFrom};

use byteordered::Endianness;
use bytes::Bytes;
use log::trace;

use crate::utils::file::SeekableRead;

/// Size of the read-ahead window used for small reads.
pub const READ_AHEAD_SIZE: usize = 64 * 1024;

/// A positioned reader over a seekable (possibly remote) byte source.
///
/// Small reads are served from a read-ahead window, so walking the headers,
/// chromosome tree and index nodes (which are laid out close together) costs
/// few calls to the underlying source. Reads at least as large as the window
/// (typically data blocks) go straight to the source.
///
/// The endianness of the file is detected from the magic when the file is
/// opened; until then it defaults to little endian.
pub struct ByteReader<R> {
    read: R,
    endianness: Endianness,
    len: Option<u64>,
    buf: Bytes,
    buf_offset: u64,
}

impl<R: SeekableRead> ByteReader<R> {
    /// Wraps `read`. The length of the source is looked up once here; sources
    /// that can't seek from the end (`ErrorKind::Unsupported`) are read
    /// without bounds checks.
    pub fn new(mut read: R) -> io::Result<Self> {
        let len = match read.seek(SeekFrom::End(0)) {
            Ok(len) => Some(len),
            Err(e) if e.kind() == io::ErrorKind::Unsupported => None,
            Err(e) => return Err(e),
        };
        Ok(ByteReader {
            read,
            endianness: Endianness::Little,
            len,
            buf: Bytes::new(),
            buf_offset: 0,
        })
    }

    /// Reads exactly `length` bytes starting at `offset`. A source that ends
    /// early gives an `UnexpectedEof` error.
    pub fn read_at(&mut self, offset: u64, length: usize) -> io::Result<Bytes> {
        let buf_end = self.buf_offset + self.buf.len() as u64;
        if offset >= self.buf_offset && offset.saturating_add(length as u64) <= buf_end {
            let start = (offset - self.buf_offset) as usize;
            return Ok(self.buf.slice(start..start + length));
        }

        let mut want = length.max(READ_AHEAD_SIZE);
        if let Some(len) = self.len {
            let available = usize::try_from(len.saturating_sub(offset)).unwrap_or(usize::MAX);
            want = want.min(available).max(length);
        }
        trace!("Reading {} bytes at {} (requested {})", want, offset, length);

        // The length of a source without a known end is unchecked, so a
        // corrupt size must fail here rather than abort on allocation.
        let mut data = Vec::new();
        data.try_reserve_exact(want).map_err(|_| {
            io::Error::new(
                io::ErrorKind::OutOfMemory,
                format!("Unable to allocate {} bytes to read at offset {}.", want, offset),
            )
        })?;
        self.read.seek(SeekFrom::Start(offset))?;
        self.read.by_ref().take(want as u64).read_to_end(&mut data)?;
        let filled = data.len();
        if filled < length {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "Tried to read {} bytes at offset {}, but only {} were available.",
                    length, offset, filled
                ),
            ));
        }
        let data = Bytes::from(data);

        if length >= READ_AHEAD_SIZE {
            return Ok(data.slice(0..length));
        }
        self.buf = data;
        self.buf_offset = offset;
        Ok(self.buf.slice(0..length))
    }
}

impl<R> ByteReader<R> {
    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    pub(crate) fn set_endianness(&mut self, endianness: Endianness) {
        self.endianness = endianness;
    }

    /// The length of the source, if it is known.
    pub fn len(&self) -> Option<u64> {
        self.len
    }

    /// Whether `[offset, offset + length)` lies inside the source. Always
    /// true when the length of the source is unknown.
    pub fn contains(&self, offset: u64, length: u64) -> bool {
        match self.len {
            Some(len) => offset
                .checked_add(length)
                .map_or(false, |end| end <= len),
            None => true,
        }
    }

    pub fn inner(&self) -> &R {
        &self.read
    }

    pub fn into_inner(self) -> R {
        self.read
    }
}
