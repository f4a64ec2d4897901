//! Buffer filter pipelines
//!
//! A buffer's filter list is its decode pipeline, applied first to last when
//! the buffer is materialized. Writers build the stored bytes with
//! [`encode`], which applies the inverse steps in reverse order. Each codec
//! sits behind a cargo feature; a filter compiled out of the build fails
//! instead of passing bytes through.

use std::rc::Rc;

use histbuf_core::Filter;
use log::trace;

use crate::error::{structure, Result};

#[cfg(any(feature = "gzip", feature = "lzma"))]
use std::io::{BufReader, Read};
#[cfg(feature = "gzip")]
use std::io::Write;

/// Run `bytes` through the decode pipeline
pub fn decode(filters: &[Filter], bytes: &[u8]) -> Result<Vec<u8>> {
    let mut data = bytes.to_vec();
    for &filter in filters {
        data = decode_one(filter, &data)?;
    }
    Ok(data)
}

/// Produce stored bytes whose decode pipeline yields `bytes`
pub fn encode(filters: &[Filter], bytes: &[u8]) -> Result<Vec<u8>> {
    let mut data = bytes.to_vec();
    for &filter in filters.iter().rev() {
        data = encode_one(filter, &data)?;
    }
    Ok(data)
}

/// True if the pipeline leaves bytes unchanged
pub(crate) fn is_identity(filters: &[Filter]) -> bool {
    filters.iter().all(|&f| f == Filter::None)
}

/// Decode shared bytes, reusing the allocation when no step changes them
pub(crate) fn decode_shared(filters: &[Filter], bytes: Rc<[u8]>) -> Result<Rc<[u8]>> {
    if is_identity(filters) {
        return Ok(bytes);
    }
    Ok(decode(filters, &bytes)?.into())
}

fn decode_one(filter: Filter, data: &[u8]) -> Result<Vec<u8>> {
    let out = match filter {
        Filter::None => return Ok(data.to_vec()),
        Filter::Gzip => gunzip(data)?,
        Filter::Lz4 => lz4_decode(data)?,
        Filter::Lzma => lzma_decode(data)?,
    };
    trace!("{} filter: {} -> {} bytes", filter, data.len(), out.len());
    Ok(out)
}

fn encode_one(filter: Filter, data: &[u8]) -> Result<Vec<u8>> {
    match filter {
        Filter::None => Ok(data.to_vec()),
        Filter::Gzip => gzip(data),
        Filter::Lz4 => lz4_encode(data),
        Filter::Lzma => lzma_encode(data),
    }
}

#[cfg(not(all(feature = "gzip", feature = "lz4", feature = "lzma")))]
fn unavailable(filter: Filter) -> crate::error::Error {
    crate::error::configuration(format!(
        "the {filter} filter is not available; enable the \"{filter}\" feature"
    ))
}

#[cfg(feature = "gzip")]
fn gunzip(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    flate2::read::GzDecoder::new(BufReader::new(data))
        .read_to_end(&mut out)
        .map_err(|e| structure(format!("gzip filter failed: {e}")))?;
    Ok(out)
}

#[cfg(not(feature = "gzip"))]
fn gunzip(_data: &[u8]) -> Result<Vec<u8>> {
    Err(unavailable(Filter::Gzip))
}

#[cfg(feature = "gzip")]
fn gzip(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| structure(format!("gzip filter failed: {e}")))?;
    encoder
        .finish()
        .map_err(|e| structure(format!("gzip filter failed: {e}")))
}

#[cfg(not(feature = "gzip"))]
fn gzip(_data: &[u8]) -> Result<Vec<u8>> {
    Err(unavailable(Filter::Gzip))
}

#[cfg(feature = "lz4")]
fn lz4_decode(data: &[u8]) -> Result<Vec<u8>> {
    lz4_flex::decompress_size_prepended(data)
        .map_err(|e| structure(format!("lz4 filter failed: {e}")))
}

#[cfg(not(feature = "lz4"))]
fn lz4_decode(_data: &[u8]) -> Result<Vec<u8>> {
    Err(unavailable(Filter::Lz4))
}

#[cfg(feature = "lz4")]
fn lz4_encode(data: &[u8]) -> Result<Vec<u8>> {
    Ok(lz4_flex::compress_prepend_size(data))
}

#[cfg(not(feature = "lz4"))]
fn lz4_encode(_data: &[u8]) -> Result<Vec<u8>> {
    Err(unavailable(Filter::Lz4))
}

#[cfg(feature = "lzma")]
fn lzma_decode(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    lzma_rs::lzma_decompress(&mut BufReader::new(data), &mut out)
        .map_err(|e| structure(format!("lzma filter failed: {e:?}")))?;
    Ok(out)
}

#[cfg(not(feature = "lzma"))]
fn lzma_decode(_data: &[u8]) -> Result<Vec<u8>> {
    Err(unavailable(Filter::Lzma))
}

#[cfg(feature = "lzma")]
fn lzma_encode(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    lzma_rs::lzma_compress(&mut BufReader::new(data), &mut out)
        .map_err(|e| structure(format!("lzma filter failed: {e}")))?;
    Ok(out)
}

#[cfg(not(feature = "lzma"))]
fn lzma_encode(_data: &[u8]) -> Result<Vec<u8>> {
    Err(unavailable(Filter::Lzma))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorCategory;

    fn sample() -> Vec<u8> {
        (0..2000u32).flat_map(|i| (i % 17).to_le_bytes()).collect()
    }

    #[test]
    fn test_none_is_identity() {
        let data = sample();
        assert_eq!(decode(&[Filter::None], &data).unwrap(), data);
        assert_eq!(decode(&[], &data).unwrap(), data);

        let shared: Rc<[u8]> = data.clone().into();
        let out = decode_shared(&[Filter::None], shared.clone()).unwrap();
        assert!(Rc::ptr_eq(&out, &shared));
    }

    #[cfg(all(feature = "gzip", feature = "lz4", feature = "lzma"))]
    #[test]
    fn test_pipeline_order() {
        let data = sample();
        let pipeline = [Filter::Lz4, Filter::Gzip, Filter::Lzma];
        let stored = encode(&pipeline, &data).unwrap();
        assert!(stored.len() < data.len());
        assert_eq!(decode(&pipeline, &stored).unwrap(), data);
    }

    #[cfg(feature = "gzip")]
    #[test]
    fn test_corrupt_input_is_structural() {
        let err = decode(&[Filter::Gzip], b"definitely not gzip").unwrap_err();
        assert_eq!(err.category(), Some(ErrorCategory::Structure));
    }

    #[cfg(not(feature = "lzma"))]
    #[test]
    fn test_disabled_filter_fails() {
        let err = decode(&[Filter::Lzma], b"abc").unwrap_err();
        assert_eq!(err.category(), Some(ErrorCategory::Configuration));
    }
}
