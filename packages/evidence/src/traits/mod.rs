//! Narrow interfaces for the external capabilities and storage.
//!
//! Each capability is a single-method trait so deterministic fakes
//! (see [`crate::testing`]) can stand in for network calls in tests.

pub mod deep_reader;
pub mod extractor;
pub mod searcher;
pub mod store;
pub mod summarizer;
