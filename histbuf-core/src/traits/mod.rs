//! Abstract interfaces for histbuf
//!
//! Traits are pure interfaces - no concrete implementations.

pub mod element;

pub use element::Element;
