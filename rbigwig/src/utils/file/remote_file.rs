use std::io::{self, Read, Seek, SeekFrom};
use std::num::NonZeroUsize;

use bytes::Bytes;
use log::debug;
use lru::LruCache;

/// Size of the chunks requested from the server.
pub const CHUNK_SIZE: usize = 64 * 1024;
const DEFAULT_CACHED_CHUNKS: usize = 256;

/// A file read over HTTP(S) with range requests.
///
/// Data is requested in aligned chunks of [`CHUNK_SIZE`] bytes; a read
/// spanning several missing chunks requests them together. Fetched chunks are
/// kept in memory (least recently used first out). The length of the file is
/// learned from the `Content-Range` of the first response, which is what
/// makes `SeekFrom::End` work.
pub struct RemoteFile {
    url: String,
    current_position: u64,
    len: Option<u64>,
    chunks: LruCache<u64, Bytes>,
}

impl RemoteFile {
    pub fn new(url: &str) -> RemoteFile {
        Self::with_cached_chunks(url, DEFAULT_CACHED_CHUNKS)
    }

    /// Keeps at most `chunks` chunks (at least one) in memory.
    pub fn with_cached_chunks(url: &str, chunks: usize) -> RemoteFile {
        RemoteFile {
            url: url.to_string(),
            current_position: 0,
            len: None,
            chunks: LruCache::new(NonZeroUsize::new(chunks).unwrap_or(NonZeroUsize::MIN)),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn fetch_len(&mut self) -> io::Result<u64> {
        if let Some(len) = self.len {
            return Ok(len);
        }
        self.fetch_chunks(0, 1)?;
        self.len.ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::Unsupported,
                "The server did not report the length of the file.",
            )
        })
    }

    /// Requests `count` chunks starting at chunk `first` and caches them.
    fn fetch_chunks(&mut self, first: u64, count: u64) -> io::Result<()> {
        let range_start = first * CHUNK_SIZE as u64;
        let range_end = range_start + count * CHUNK_SIZE as u64 - 1;
        debug!("Requesting bytes {}-{} of {}", range_start, range_end, self.url);
        let resp = attohttpc::get(&self.url)
            .header("range", format!("bytes={}-{}", range_start, range_end))
            .send()?;
        if !resp.is_success() {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!(
                    "Unable to read {} from server (status {}).",
                    self.url,
                    resp.status()
                ),
            ));
        }
        let partial = resp.status().as_u16() == 206;
        let total_len = resp
            .headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range_len);
        let bytes = Bytes::from(resp.bytes()?);

        // A server that ignores the range sends the whole file
        let (data_start, data) = if partial {
            (range_start, bytes)
        } else {
            self.len = Some(bytes.len() as u64);
            (0, bytes)
        };
        if let Some(total_len) = total_len {
            self.len = Some(total_len);
        }

        for (i, chunk) in data.chunks(CHUNK_SIZE).enumerate() {
            let offset = data_start + (i * CHUNK_SIZE) as u64;
            let chunk = data.slice_ref(chunk);
            self.chunks.put(offset / CHUNK_SIZE as u64, chunk);
        }
        Ok(())
    }
}

/// Gets the total length from a `Content-Range` value like
/// `bytes 0-99/1234`.
fn parse_content_range_len(content_range: &str) -> Option<u64> {
    content_range
        .rsplit_once('/')
        .and_then(|(_, len)| len.trim().parse().ok())
}

impl Read for RemoteFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() || self.len.map_or(false, |len| self.current_position >= len) {
            return Ok(0);
        }
        let chunk_ix = self.current_position / CHUNK_SIZE as u64;
        let in_chunk = (self.current_position % CHUNK_SIZE as u64) as usize;
        if !self.chunks.contains(&chunk_ix) {
            let wanted = (in_chunk + buf.len()).div_ceil(CHUNK_SIZE) as u64;
            self.fetch_chunks(chunk_ix, wanted)?;
        }
        let chunk = match self.chunks.get(&chunk_ix) {
            Some(chunk) => chunk,
            // Past the end of the file
            None => return Ok(0),
        };
        if in_chunk >= chunk.len() {
            return Ok(0);
        }
        let read = buf.len().min(chunk.len() - in_chunk);
        buf[..read].copy_from_slice(&chunk[in_chunk..in_chunk + read]);
        self.current_position += read as u64;
        Ok(read)
    }
}

impl Seek for RemoteFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let (base, offset) = match pos {
            SeekFrom::Start(s) => {
                self.current_position = s;
                return Ok(s);
            }
            SeekFrom::End(offset) => (self.fetch_len()?, offset),
            SeekFrom::Current(offset) => (self.current_position, offset),
        };
        self.current_position = base.checked_add_signed(offset).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                "Invalid seek to a negative or overflowing position.",
            )
        })?;
        Ok(self.current_position)
    }
}

impl Clone for RemoteFile {
    fn clone(&self) -> Self {
        RemoteFile {
            url: self.url.clone(),
            current_position: 0,
            len: self.len,
            chunks: LruCache::new(self.chunks.cap()),
        }
    }
}
