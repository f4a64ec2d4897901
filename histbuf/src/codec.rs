//! Payload encoding
//!
//! The payload is the bincode encoding of a [`CollectionRecord`] with
//! fixed-width little-endian integers. Decoding is bounded by the payload
//! length so a corrupt length prefix cannot trigger a huge allocation, and
//! by [`CodecConfig::max_depth`] so nested collections cannot exhaust the
//! stack.

use std::fmt;
use std::rc::Rc;

use bincode::Options;
use histbuf_core::wire::CollectionRecord;
use serde::de::{self, DeserializeSeed, Deserializer, SeqAccess, Visitor};

use crate::config::CodecConfig;
use crate::error::{container, Result};

fn options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_little_endian()
}

/// Encode a record tree into a new payload
pub(crate) fn encode(record: &CollectionRecord, config: &CodecConfig) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(config.initial_capacity);
    encode_into(record, &mut out)?;
    Ok(out)
}

/// Encode a record tree onto the end of `out`
pub(crate) fn encode_into<W: std::io::Write>(record: &CollectionRecord, out: W) -> Result<()> {
    options()
        .serialize_into(out, record)
        .map_err(|e| container(format!("failed to encode payload: {e}")))
}

/// Decode a payload back into a record tree
pub(crate) fn decode(payload: &[u8], config: &CodecConfig) -> Result<CollectionRecord> {
    let len = payload.len() as u64;
    if let Some(limit) = config.payload_limit {
        if len > limit {
            return Err(container(format!(
                "payload of {len} bytes exceeds the configured limit of {limit}"
            )));
        }
    }
    options()
        .with_limit(len)
        .allow_trailing_bytes()
        .deserialize_seed(
            CollectionSeed {
                depth: 0,
                max_depth: config.max_depth,
            },
            payload,
        )
        .map_err(|e| container(format!("failed to decode payload: {e}")))
}

const COLLECTION_FIELDS: &[&str] = &[
    "identifier",
    "objects",
    "collections",
    "regions",
    "binned_regions",
    "variations",
    "title",
    "metadata",
    "decoration",
];

/// Reads one [`CollectionRecord`] nested `depth` levels below the root
#[derive(Clone, Copy)]
struct CollectionSeed {
    depth: usize,
    max_depth: usize,
}

impl<'de> DeserializeSeed<'de> for CollectionSeed {
    type Value = CollectionRecord;

    fn deserialize<D>(self, deserializer: D) -> std::result::Result<Self::Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        if self.depth > self.max_depth {
            return Err(de::Error::custom(format!(
                "collections nested deeper than {} levels",
                self.max_depth
            )));
        }
        deserializer.deserialize_struct("CollectionRecord", COLLECTION_FIELDS, self)
    }
}

impl<'de> Visitor<'de> for CollectionSeed {
    type Value = CollectionRecord;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("struct CollectionRecord")
    }

    fn visit_seq<A>(self, mut seq: A) -> std::result::Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let nested = SubcollectionsSeed {
            depth: self.depth + 1,
            max_depth: self.max_depth,
        };
        Ok(CollectionRecord {
            identifier: next(&mut seq, 0)?,
            objects: next(&mut seq, 1)?,
            collections: seq
                .next_element_seed(nested)?
                .ok_or_else(|| de::Error::invalid_length(2, &self))?,
            regions: next(&mut seq, 3)?,
            binned_regions: next(&mut seq, 4)?,
            variations: next(&mut seq, 5)?,
            title: next(&mut seq, 6)?,
            metadata: next(&mut seq, 7)?,
            decoration: next(&mut seq, 8)?,
        })
    }
}

fn next<'de, A, T>(seq: &mut A, index: usize) -> std::result::Result<T, A::Error>
where
    A: SeqAccess<'de>,
    T: serde::Deserialize<'de>,
{
    seq.next_element()?
        .ok_or_else(|| de::Error::invalid_length(index, &"struct CollectionRecord"))
}

/// Reads the `collections` vector of a record at `depth - 1`
struct SubcollectionsSeed {
    depth: usize,
    max_depth: usize,
}

impl<'de> DeserializeSeed<'de> for SubcollectionsSeed {
    type Value = Vec<Rc<CollectionRecord>>;

    fn deserialize<D>(self, deserializer: D) -> std::result::Result<Self::Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_seq(self)
    }
}

impl<'de> Visitor<'de> for SubcollectionsSeed {
    type Value = Vec<Rc<CollectionRecord>>;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a sequence of CollectionRecord")
    }

    fn visit_seq<A>(self, mut seq: A) -> std::result::Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let element = CollectionSeed {
            depth: self.depth,
            max_depth: self.max_depth,
        };
        // the length hint comes from the payload; the byte limit bounds it
        let mut out = Vec::with_capacity(seq.size_hint().unwrap_or(0).min(1024));
        while let Some(record) = seq.next_element_seed(element)? {
            out.push(Rc::new(record));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorCategory;

    fn empty_record() -> CollectionRecord {
        CollectionRecord {
            identifier: "c".to_string(),
            objects: Vec::new(),
            collections: Vec::new(),
            regions: Vec::new(),
            binned_regions: Vec::new(),
            variations: Vec::new(),
            title: String::new(),
            metadata: None,
            decoration: None,
        }
    }

    #[test]
    fn test_fixed_width_length_prefix() {
        let payload = encode(&empty_record(), &CodecConfig::default()).unwrap();
        // identifier length is a u64
        assert_eq!(&payload[..8], &1u64.to_le_bytes());
        assert_eq!(payload[8], b'c');
        assert_eq!(decode(&payload, &CodecConfig::default()).unwrap(), empty_record());
    }

    #[test]
    fn test_truncated_payload() {
        let payload = encode(&empty_record(), &CodecConfig::default()).unwrap();
        let err = decode(&payload[..payload.len() - 1], &CodecConfig::default()).unwrap_err();
        assert_eq!(err.category(), Some(ErrorCategory::ContainerFormat));
    }

    /// `depth` collections, each holding the next one
    fn nested_payload(depth: usize) -> Vec<u8> {
        let mut out = Vec::new();
        for level in 0..depth {
            out.extend_from_slice(&0u64.to_le_bytes()); // identifier
            out.extend_from_slice(&0u64.to_le_bytes()); // objects
            let children: u64 = if level + 1 < depth { 1 } else { 0 };
            out.extend_from_slice(&children.to_le_bytes());
        }
        for _ in 0..depth {
            for _ in 0..4 {
                // regions, binned_regions, variations, title
                out.extend_from_slice(&0u64.to_le_bytes());
            }
            out.extend_from_slice(&[0, 0]); // metadata, decoration
        }
        out
    }

    #[test]
    fn test_nesting_depth() {
        let payload = nested_payload(10);
        let mut record = decode(&payload, &CodecConfig::default()).unwrap();
        for _ in 1..10 {
            assert_eq!(record.collections.len(), 1);
            record = (*record.collections[0]).clone();
        }
        assert!(record.collections.is_empty());
        let back = decode(&payload, &CodecConfig::default()).unwrap();
        assert_eq!(encode(&back, &CodecConfig::default()).unwrap(), payload);

        let err = decode(&payload, &CodecConfig::default().with_max_depth(5)).unwrap_err();
        assert_eq!(err.category(), Some(ErrorCategory::ContainerFormat));
        assert!(err.to_string().contains("nested deeper"));
    }

    #[test]
    fn test_deep_nesting_is_rejected() {
        let err = decode(&nested_payload(100_000), &CodecConfig::default()).unwrap_err();
        assert_eq!(err.category(), Some(ErrorCategory::ContainerFormat));
    }

    #[test]
    fn test_payload_limit() {
        let payload = encode(&empty_record(), &CodecConfig::default()).unwrap();
        let config = CodecConfig::default().with_payload_limit(4);
        let err = decode(&payload, &config).unwrap_err();
        assert!(err.to_string().contains("limit"));
    }
}
