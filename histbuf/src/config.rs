//! Codec configuration

/// Options for reading and writing containers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecConfig {
    /// Memory-map files instead of reading them into memory
    pub mmap: bool,
    /// Largest payload, in bytes, a reader accepts
    pub payload_limit: Option<u64>,
    /// Initial capacity of the payload encoder buffer, in bytes
    pub initial_capacity: usize,
    /// Deepest chain of nested collections a reader accepts
    pub max_depth: usize,
}

impl CodecConfig {
    /// Set whether `from_file` memory-maps the container
    ///
    /// Has no effect when the `mmap` feature is disabled.
    pub fn with_mmap(mut self, mmap: bool) -> Self {
        self.mmap = mmap;
        self
    }

    /// Refuse payloads larger than `limit` bytes
    pub fn with_payload_limit(mut self, limit: u64) -> Self {
        self.payload_limit = Some(limit);
        self
    }

    pub fn with_initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            mmap: true,
            payload_limit: None,
            initial_capacity: 64 * 1024,
            max_depth: 256,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let config = CodecConfig::default()
            .with_mmap(false)
            .with_payload_limit(1 << 20)
            .with_initial_capacity(16)
            .with_max_depth(8);
        assert!(!config.mmap);
        assert_eq!(config.payload_limit, Some(1 << 20));
        assert_eq!(config.initial_capacity, 16);
        assert_eq!(config.max_depth, 8);
        assert_eq!(CodecConfig::default().max_depth, 256);
        assert!(CodecConfig::default().mmap);
    }
}
