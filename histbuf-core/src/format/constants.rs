//! Container framing constants
//!
//! ```text
//! +-------+-----------------+--------------+-------+
//! | MAGIC |     payload     | offset (u64) | MAGIC |
//! |  4 B  |   variable      |   8 B, LE    |  4 B  |
//! +-------+-----------------+--------------+-------+
//!         ^                 ^
//!         offset            len - FOOTER_SIZE
//! ```

/// Magic tag opening and closing every container
pub const MAGIC: [u8; 4] = *b"hist";

/// Width of a magic tag
pub const MAGIC_SIZE: usize = 4;

/// Width of the little-endian payload offset
pub const OFFSET_SIZE: usize = 8;

/// Trailing footer: payload offset followed by the closing magic
pub const FOOTER_SIZE: usize = OFFSET_SIZE + MAGIC_SIZE;

/// Total bytes a container adds around its payload
pub const FRAMING_OVERHEAD: usize = MAGIC_SIZE + FOOTER_SIZE;

/// Coverage probability of a one-sigma interval
pub const ONE_SIGMA: f64 = 0.6826894921370859;
