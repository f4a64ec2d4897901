//! Container framing over byte sinks and files
//!
//! A container is `MAGIC | payload | offset (u64 LE) | MAGIC`. The writer
//! streams the payload through a counting sink, so the footer can be written
//! without the sink supporting position queries.

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::ops::Deref;
use std::path::Path;

use histbuf_core::format::constants::{FRAMING_OVERHEAD, MAGIC, MAGIC_SIZE};
use histbuf_core::format::frame;
use histbuf_core::wire::CollectionRecord;
use log::debug;

use crate::codec;
use crate::config::CodecConfig;
use crate::error::{container, Result};

/// Write sink that counts the bytes passed through it
pub(crate) struct CountingWriter<W> {
    inner: W,
    written: u64,
}

impl<W: Write> CountingWriter<W> {
    pub(crate) fn new(inner: W) -> Self {
        Self { inner, written: 0 }
    }

    pub(crate) fn written(&self) -> u64 {
        self.written
    }

    pub(crate) fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

/// Frame `record` into `sink`; returns the total number of bytes written
pub(crate) fn write<W: Write>(record: &CollectionRecord, sink: W) -> Result<u64> {
    let mut out = CountingWriter::new(sink);
    out.write_all(&MAGIC)?;
    let offset = out.written();
    codec::encode_into(record, &mut out)?;
    let payload_len = out.written() - offset;
    out.write_all(&frame::footer(offset))?;
    out.flush()?;
    debug!(
        "wrote container: payload of {payload_len} bytes at offset {offset}, {} bytes total",
        out.written()
    );
    Ok(out.written())
}

/// Frame `record` into a new byte vector
pub(crate) fn to_bytes(record: &CollectionRecord, config: &CodecConfig) -> Result<Vec<u8>> {
    let payload = codec::encode(record, config)?;
    let mut out = Vec::with_capacity(payload.len() + FRAMING_OVERHEAD);
    out.extend_from_slice(&MAGIC);
    out.extend_from_slice(&payload);
    out.extend_from_slice(&frame::footer(MAGIC_SIZE as u64));
    Ok(out)
}

/// Unframe and decode a complete container
pub(crate) fn from_bytes(bytes: &[u8], config: &CodecConfig) -> Result<CollectionRecord> {
    let range = frame::payload_range(bytes)?;
    debug!(
        "reading container: payload of {} bytes at offset {}",
        range.len(),
        range.start
    );
    codec::decode(&bytes[range], config)
}

pub(crate) fn to_file<P: AsRef<Path>>(record: &CollectionRecord, path: P) -> Result<u64> {
    let file = File::create(path.as_ref())?;
    let mut sink = BufWriter::new(file);
    let written = write(record, &mut sink)?;
    sink.into_inner()
        .map_err(|e| e.into_error())?
        .sync_all()?;
    Ok(written)
}

/// File contents, mapped or read
enum Contents {
    #[cfg(feature = "mmap")]
    Mapped(memmap2::Mmap),
    Read(Vec<u8>),
}

impl Deref for Contents {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            #[cfg(feature = "mmap")]
            Contents::Mapped(map) => map,
            Contents::Read(bytes) => bytes,
        }
    }
}

fn load(path: &Path, config: &CodecConfig) -> Result<Contents> {
    let mut file = File::open(path)?;
    let len = file.metadata()?.len();
    if len < FRAMING_OVERHEAD as u64 {
        return Err(container(format!(
            "{} is {len} bytes; at least {FRAMING_OVERHEAD} are needed for the framing",
            path.display()
        )));
    }
    #[cfg(feature = "mmap")]
    {
        if config.mmap {
            // SAFETY: the map is read-only and only lives while the payload
            // is decoded; the file must not be truncated meanwhile
            let map = unsafe { memmap2::MmapOptions::new().map(&file)? };
            return Ok(Contents::Mapped(map));
        }
    }
    #[cfg(not(feature = "mmap"))]
    let _ = config;
    let mut bytes = Vec::with_capacity(len as usize);
    file.read_to_end(&mut bytes)?;
    Ok(Contents::Read(bytes))
}

pub(crate) fn from_file<P: AsRef<Path>>(path: P, config: &CodecConfig) -> Result<CollectionRecord> {
    let path = path.as_ref();
    let contents = load(path, config)?;
    debug!("opened {} ({} bytes)", path.display(), contents.len());
    from_bytes(&contents, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorCategory;

    fn record() -> CollectionRecord {
        CollectionRecord {
            identifier: "root".to_string(),
            objects: Vec::new(),
            collections: Vec::new(),
            regions: Vec::new(),
            binned_regions: Vec::new(),
            variations: Vec::new(),
            title: "a title".to_string(),
            metadata: None,
            decoration: None,
        }
    }

    #[test]
    fn test_streamed_and_buffered_agree() {
        let mut streamed = Vec::new();
        let written = write(&record(), &mut streamed).unwrap();
        let buffered = to_bytes(&record(), &CodecConfig::default()).unwrap();
        assert_eq!(streamed, buffered);
        assert_eq!(written, buffered.len() as u64);
        assert_eq!(&buffered[..4], b"hist");
        assert_eq!(&buffered[buffered.len() - 4..], b"hist");
    }

    #[test]
    fn test_corrupt_trailing_magic() {
        let mut bytes = to_bytes(&record(), &CodecConfig::default()).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        let err = from_bytes(&bytes, &CodecConfig::default()).unwrap_err();
        assert_eq!(err.category(), Some(ErrorCategory::ContainerFormat));
    }

    #[test]
    fn test_file_roundtrip_with_and_without_mmap() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.hist");
        to_file(&record(), &path).unwrap();
        for mmap in [true, false] {
            let config = CodecConfig::default().with_mmap(mmap);
            assert_eq!(from_file(&path, &config).unwrap(), record());
        }
    }

    #[test]
    fn test_short_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.hist");
        std::fs::write(&path, b"hist").unwrap();
        let err = from_file(&path, &CodecConfig::default()).unwrap_err();
        assert_eq!(err.category(), Some(ErrorCategory::ContainerFormat));
    }

    #[test]
    fn test_counting_writer() {
        let mut w = CountingWriter::new(Vec::new());
        w.write_all(b"abc").unwrap();
        w.write_all(b"de").unwrap();
        assert_eq!(w.written(), 5);
        assert_eq!(w.into_inner(), b"abcde");
    }
}
