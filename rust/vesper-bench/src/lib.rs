//! Vesper Bench
//!
//! Criterion harness for the futures engine; see `benches/`.
